//! Instrumented dependencies and request helpers shared by the HTTP tests.

#![allow(dead_code)]

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use pureroot::{Dispose, DisposeError};
use pureroot_server::Dependency;
use tower::ServiceExt;

/// Counts its releases and notices if it is shown after being released.
pub struct FakeDependency {
    name: String,
    releases: AtomicUsize,
    shown_after_release: AtomicBool,
    fails: bool,
}

impl FakeDependency {
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn is_released(&self) -> bool {
        self.releases() > 0
    }

    pub fn shown_after_release(&self) -> bool {
        self.shown_after_release.load(Ordering::SeqCst)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for FakeDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_released() {
            self.shown_after_release.store(true, Ordering::SeqCst);
        }
        f.write_str(&self.name)
    }
}

impl Dispose for FakeDependency {
    fn dispose(&self) -> Result<(), DisposeError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        if self.fails {
            return Err(format!("{} refused to close", self.name).into());
        }
        Ok(())
    }

    fn label(&self) -> String {
        self.name.clone()
    }
}

impl Dependency for FakeDependency {
    fn disposer(self: Arc<Self>) -> Option<Arc<dyn Dispose>> {
        Some(self)
    }
}

/// Hands out numbered [`FakeDependency`] instances and remembers them.
pub struct FakeFactory {
    prefix: &'static str,
    fails: bool,
    created: Mutex<Vec<Arc<FakeDependency>>>,
}

impl FakeFactory {
    pub fn new(prefix: &'static str) -> Arc<Self> {
        Arc::new(Self {
            prefix,
            fails: false,
            created: Mutex::new(Vec::new()),
        })
    }

    /// Like [`new`](Self::new), but every release reports an error.
    pub fn failing(prefix: &'static str) -> Arc<Self> {
        Arc::new(Self {
            prefix,
            fails: true,
            created: Mutex::new(Vec::new()),
        })
    }

    pub fn create(&self) -> Arc<dyn Dependency> {
        let mut created = self.created.lock().unwrap();
        let dependency = Arc::new(FakeDependency {
            name: format!("{}{}", self.prefix, created.len() + 1),
            releases: AtomicUsize::new(0),
            shown_after_release: AtomicBool::new(false),
            fails: self.fails,
        });
        created.push(dependency.clone());
        dependency
    }

    /// A closure suitable for the composition root builder.
    pub fn producer(self: &Arc<Self>) -> impl Fn() -> Arc<dyn Dependency> + Send + Sync + 'static {
        let factory = Arc::clone(self);
        move || factory.create()
    }

    pub fn created(&self) -> Vec<Arc<FakeDependency>> {
        self.created.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

/// Sends `GET uri` through `router` and returns status and body text.
pub async fn get(router: Router, uri: &str) -> (StatusCode, String) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}
