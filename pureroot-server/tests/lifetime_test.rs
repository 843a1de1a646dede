mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pureroot::{Dispose, DisposeError, PureRootError};
use pureroot_server::handlers::Controller;
use pureroot_server::{AppError, CompositionRoot, HELLO_PATH, ScopedDependency, routes};
use tokio::sync::Barrier;

use common::{FakeFactory, get};

fn root_with(singletons: &Arc<FakeFactory>, scoped: &Arc<FakeFactory>) -> Arc<CompositionRoot> {
    Arc::new(
        CompositionRoot::builder()
            .singleton_dependency(singletons.producer())
            .scoped_dependency(scoped.producer())
            .build(),
    )
}

// ═══════════════════════════════════════════════════════════
// Singletons
// ═══════════════════════════════════════════════════════════

#[tokio::test]
async fn singleton_released_once_at_dispose() {
    let singletons = FakeFactory::new("singleton");
    let scoped = FakeFactory::new("scoped");
    let root = root_with(&singletons, &scoped);

    for _ in 0..3 {
        let (status, _) = get(routes::router(root.clone()), HELLO_PATH).await;
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(singletons.count(), 1);
    let singleton = &singletons.created()[0];
    assert_eq!(singleton.releases(), 0);

    root.dispose().unwrap();
    assert_eq!(singleton.releases(), 1);
}

#[tokio::test]
async fn disposing_twice_releases_singleton_once() {
    let singletons = FakeFactory::new("singleton");
    let scoped = FakeFactory::new("scoped");
    let root = root_with(&singletons, &scoped);
    get(routes::router(root.clone()), HELLO_PATH).await;

    root.dispose().unwrap();
    root.dispose().unwrap();
    drop(root);

    assert_eq!(singletons.created()[0].releases(), 1);
}

#[tokio::test]
async fn singleton_released_once_without_requests() {
    let singletons = FakeFactory::new("singleton");
    let scoped = FakeFactory::new("scoped");
    let root = root_with(&singletons, &scoped);
    assert_eq!(singletons.count(), 1);

    root.dispose().unwrap();
    root.dispose().unwrap();

    assert_eq!(singletons.created()[0].releases(), 1);
    assert_eq!(scoped.count(), 0);
}

#[tokio::test]
async fn dropping_the_root_disposes_it() {
    let singletons = FakeFactory::new("singleton");
    let scoped = FakeFactory::new("scoped");
    let root = root_with(&singletons, &scoped);
    get(routes::router(root.clone()), HELLO_PATH).await;

    drop(root);

    assert_eq!(singletons.created()[0].releases(), 1);
}

// ═══════════════════════════════════════════════════════════
// Scoped dependencies
// ═══════════════════════════════════════════════════════════

#[tokio::test]
async fn scoped_released_once_after_request() {
    let singletons = FakeFactory::new("singleton");
    let scoped = FakeFactory::new("scoped");
    let root = root_with(&singletons, &scoped);

    let (status, body) = get(routes::router(root.clone()), HELLO_PATH).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(scoped.count(), 1);
    let dependency = &scoped.created()[0];
    assert_eq!(dependency.releases(), 1);
    assert!(!dependency.shown_after_release());
    assert!(body.contains(dependency.name()));
    assert_eq!(root.registry().open_scopes(), 0);

    root.dispose().unwrap();
    assert_eq!(dependency.releases(), 1);
}

#[tokio::test]
async fn middleware_and_controller_share_scoped_instance() {
    let singletons = FakeFactory::new("singleton");
    let scoped = FakeFactory::new("scoped");
    let root = root_with(&singletons, &scoped);

    let (_, body) = get(routes::router(root), HELLO_PATH).await;

    assert_eq!(scoped.count(), 1);
    assert_eq!(body.matches("scoped1").count(), 2);
}

#[tokio::test]
async fn each_request_gets_its_own_scoped_instance() {
    let singletons = FakeFactory::new("singleton");
    let scoped = FakeFactory::new("scoped");
    let root = root_with(&singletons, &scoped);

    for n in 1..=3 {
        let (_, body) = get(routes::router(root.clone()), HELLO_PATH).await;
        assert!(body.contains(&format!("scoped{n}")));
    }

    assert_eq!(scoped.count(), 3);
    assert!(scoped.created().iter().all(|d| d.releases() == 1));
    assert_eq!(singletons.count(), 1);
}

/// Reports whether any scoped dependency was already released while it runs.
struct Tally {
    scoped: Arc<FakeFactory>,
}

#[async_trait]
impl Controller for Tally {
    async fn handle(&self, _request: Request) -> Result<Response, AppError> {
        let released = self.scoped.created().iter().any(|d| d.is_released());
        Ok(released.to_string().into_response())
    }
}

#[tokio::test]
async fn scoped_not_released_while_request_runs() {
    let singletons = FakeFactory::new("singleton");
    let scoped = FakeFactory::new("scoped");
    let tally_scoped = scoped.clone();
    let root = Arc::new(
        CompositionRoot::builder()
            .singleton_dependency(singletons.producer())
            .scoped_dependency(scoped.producer())
            .controller("tally", move |wiring, activation| {
                wiring.scoped_dependency(activation.scope())?;
                Ok(Arc::new(Tally {
                    scoped: tally_scoped.clone(),
                }) as Arc<dyn Controller>)
            })
            .route("/api/tally", "tally")
            .build(),
    );

    let (status, body) = get(routes::router(root), "/api/tally").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("false"));
    assert_eq!(scoped.created()[0].releases(), 1);
}

// ═══════════════════════════════════════════════════════════
// Dispatch failures
// ═══════════════════════════════════════════════════════════

#[tokio::test]
async fn unknown_controller_kind_constructs_nothing() {
    let singletons = FakeFactory::new("singleton");
    let scoped = FakeFactory::new("scoped");
    let root = Arc::new(
        CompositionRoot::builder()
            .singleton_dependency(singletons.producer())
            .scoped_dependency(scoped.producer())
            .route("/api/missing", "missing")
            .pipeline(Vec::new())
            .build(),
    );

    let (status, body) = get(routes::router(root.clone()), "/api/missing").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("missing"));
    assert_eq!(singletons.count(), 1);
    assert_eq!(scoped.count(), 0);
    assert_eq!(root.registry().open_scopes(), 0);
}

#[tokio::test]
async fn unknown_middleware_kind_stops_the_request() {
    let singletons = FakeFactory::new("singleton");
    let scoped = FakeFactory::new("scoped");
    let root = Arc::new(
        CompositionRoot::builder()
            .singleton_dependency(singletons.producer())
            .scoped_dependency(scoped.producer())
            .pipeline(vec!["greting".into()])
            .build(),
    );

    let (status, body) = get(routes::router(root), HELLO_PATH).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("greeting"));
    assert_eq!(scoped.count(), 0);
}

#[tokio::test]
async fn requests_after_dispose_fail() {
    let singletons = FakeFactory::new("singleton");
    let scoped = FakeFactory::new("scoped");
    let root = root_with(&singletons, &scoped);
    let router = routes::router(root.clone());

    root.dispose().unwrap();
    let (status, _) = get(router, HELLO_PATH).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(singletons.created()[0].releases(), 1);
    assert_eq!(scoped.count(), 0);
}

#[tokio::test]
async fn disposal_failures_are_reported_and_not_repeated() {
    let singletons = FakeFactory::failing("singleton");
    let scoped = FakeFactory::new("scoped");
    let root = root_with(&singletons, &scoped);
    get(routes::router(root.clone()), HELLO_PATH).await;

    let err = root.dispose().unwrap_err();

    assert!(matches!(err, PureRootError::DisposalFailed(_)));
    assert!(err.to_string().contains("singleton1 refused to close"));
    root.dispose().unwrap();
    assert_eq!(singletons.created()[0].releases(), 1);
}

// ═══════════════════════════════════════════════════════════
// Handler-owned resources
// ═══════════════════════════════════════════════════════════

#[derive(Default)]
struct Buffer {
    releases: std::sync::atomic::AtomicUsize,
}

impl Dispose for Buffer {
    fn dispose(&self) -> Result<(), DisposeError> {
        self.releases
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}

struct Owning;

#[async_trait]
impl Controller for Owning {
    async fn handle(&self, _request: Request) -> Result<Response, AppError> {
        Ok("owned".into_response())
    }
}

#[tokio::test]
async fn handler_owned_resources_released_with_the_handler() {
    let buffers: Arc<std::sync::Mutex<Vec<Arc<Buffer>>>> = Arc::default();
    let created = buffers.clone();
    let root = Arc::new(
        CompositionRoot::builder()
            .controller("owning", move |_wiring, activation| {
                let buffer = activation.own(Arc::new(Buffer::default()));
                created.lock().unwrap().push(buffer);
                Ok(Arc::new(Owning) as Arc<dyn Controller>)
            })
            .route("/api/owning", "owning")
            .build(),
    );

    for _ in 0..2 {
        let (status, _) = get(routes::router(root.clone()), "/api/owning").await;
        assert_eq!(status, StatusCode::OK);
    }

    let buffers = buffers.lock().unwrap();
    assert_eq!(buffers.len(), 2);
    assert!(
        buffers
            .iter()
            .all(|b| b.releases.load(std::sync::atomic::Ordering::SeqCst) == 1)
    );
    assert_eq!(root.registry().open_scopes(), 0);
}

// ═══════════════════════════════════════════════════════════
// Concurrency and cancellation
// ═══════════════════════════════════════════════════════════

/// Waits until every concurrent request has reached it, then answers with
/// its scoped dependency.
struct Gated {
    barrier: Arc<Barrier>,
    scoped: ScopedDependency,
}

#[async_trait]
impl Controller for Gated {
    async fn handle(&self, _request: Request) -> Result<Response, AppError> {
        self.barrier.wait().await;
        Ok(self.scoped.to_string().into_response())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_get_distinct_scoped_instances() {
    const REQUESTS: usize = 8;

    let singletons = FakeFactory::new("singleton");
    let scoped = FakeFactory::new("scoped");
    let barrier = Arc::new(Barrier::new(REQUESTS));
    let root = Arc::new(
        CompositionRoot::builder()
            .singleton_dependency(singletons.producer())
            .scoped_dependency(scoped.producer())
            .controller("gated", move |wiring, activation| {
                Ok(Arc::new(Gated {
                    barrier: barrier.clone(),
                    scoped: wiring.scoped_dependency(activation.scope())?,
                }) as Arc<dyn Controller>)
            })
            .route("/api/gated", "gated")
            .pipeline(Vec::new())
            .build(),
    );
    let router = routes::router(root.clone());

    let tasks: Vec<_> = (0..REQUESTS)
        .map(|_| tokio::spawn(get(router.clone(), "/api/gated")))
        .collect();

    let mut bodies = HashSet::new();
    for task in tasks {
        let (status, body) = tokio::time::timeout(Duration::from_secs(10), task)
            .await
            .expect("requests stalled")
            .unwrap();
        assert_eq!(status, StatusCode::OK);
        bodies.insert(body);
    }

    assert_eq!(bodies.len(), REQUESTS);
    assert_eq!(scoped.count(), REQUESTS);
    assert!(scoped.created().iter().all(|d| d.releases() == 1));
    assert_eq!(root.registry().open_scopes(), 0);
}

struct Stalled;

#[async_trait]
impl Controller for Stalled {
    async fn handle(&self, _request: Request) -> Result<Response, AppError> {
        std::future::pending::<Result<Response, AppError>>().await
    }
}

#[tokio::test]
async fn cancelled_request_still_releases_its_scope() {
    let singletons = FakeFactory::new("singleton");
    let scoped = FakeFactory::new("scoped");
    let root = Arc::new(
        CompositionRoot::builder()
            .singleton_dependency(singletons.producer())
            .scoped_dependency(scoped.producer())
            .controller("stalled", |wiring, activation| {
                wiring.scoped_dependency(activation.scope())?;
                Ok(Arc::new(Stalled) as Arc<dyn Controller>)
            })
            .route("/api/stalled", "stalled")
            .build(),
    );

    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        get(routes::router(root.clone()), "/api/stalled"),
    )
    .await;

    assert!(outcome.is_err());
    assert_eq!(scoped.count(), 1);
    assert_eq!(scoped.created()[0].releases(), 1);
    assert_eq!(root.registry().open_scopes(), 0);
}
