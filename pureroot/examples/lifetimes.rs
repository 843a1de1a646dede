//! Singleton and scoped lifetimes without any HTTP in the way.
//!
//! Run with `cargo run -p pureroot --example lifetimes`.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pureroot::prelude::*;

static INSTANCES: AtomicUsize = AtomicUsize::new(0);

// === A disposable dependency ===

struct Connection {
    id: usize,
}

impl Connection {
    fn open() -> Arc<Self> {
        Arc::new(Self {
            id: INSTANCES.fetch_add(1, Ordering::SeqCst) + 1,
        })
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connection{}", self.id)
    }
}

impl Dispose for Connection {
    fn dispose(&self) -> std::result::Result<(), DisposeError> {
        println!("🧹 {self} released");
        Ok(())
    }
}

// === Handlers ===

trait Handler: Send + Sync {
    fn handle(&self) -> String;
}

struct Report {
    shared: Arc<Connection>,
    per_request: Arc<Connection>,
}

impl Handler for Report {
    fn handle(&self) -> String {
        format!("report using {} and {}", self.shared, self.per_request)
    }
}

#[derive(Clone)]
struct RequestConnection(Arc<Connection>);

struct Wiring {
    shared: Arc<Connection>,
}

fn report(wiring: &Wiring, activation: &mut Activation<'_>) -> Result<Arc<dyn Handler>> {
    let RequestConnection(per_request) = activation
        .scope()
        .get_or_try_insert_with(|scope| Ok(RequestConnection(scope.register(Connection::open())?)))?;

    Ok(Arc::new(Report {
        shared: wiring.shared.clone(),
        per_request,
    }))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("pureroot_container=debug")
        .init();

    let registry = Arc::new(DisposalRegistry::new());
    let wiring = Wiring {
        shared: registry.register_singleton(Connection::open())?,
    };

    let handlers = DispatchBuilder::<Wiring, dyn Handler>::new("handler")
        .register("report", report)
        .build(registry.clone());
    println!("✅ Dispatch table: {handlers:?}");

    let kind = HandlerKind::from_static("report");
    for request in 1..=2 {
        let scope = RequestScope::enter(registry.clone())?;

        let first = handlers.lease(&wiring, &kind, &scope)?;
        let second = handlers.lease(&wiring, &kind, &scope)?;
        println!("📨 request {request}: {}", first.handle());
        println!("📨 request {request}: {}", second.handle());
    }
    // each request scope dropped, its connection released

    match handlers.create(&wiring, &HandlerKind::new("repot"), &RequestScope::new(registry.clone())) {
        Err(err) => println!("❌ {err}"),
        Ok(_) => unreachable!("`repot` is not registered"),
    }

    registry.release_all()?;
    registry.release_all()?;
    println!("\n🎉 Shared connection released exactly once.");
    Ok(())
}
