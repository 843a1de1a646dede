//! The composition root: every object graph of the service is wired here.
//!
//! The root owns the disposal registry and two dispatch tables, one for
//! controllers and one for middleware. The singleton is created with the
//! root and released when the root is disposed; scoped dependencies live in
//! the request scope and are released when the request ends.

use std::fmt;
use std::sync::Arc;

use pureroot::{
    Activation, DispatchBuilder, DisposalRegistry, FactoryDispatch, HandlerKind, Lease, Lifetime,
    RequestScope, Result, ScopeGuard,
};
use tracing::{debug, error, info, instrument};

use crate::config::{DEFAULT_BODY_LIMIT, ServerConfig};
use crate::handlers::{self, Controller, GREETING, HELLO, Middleware};
use crate::models::{
    Dependency, DependencyFactory, DisposableDependency, ScopedDependency, SingletonDependency,
};

pub const HELLO_PATH: &str = "/api/hello";

/// What constructors receive: the dependency factories plus shared settings.
pub struct Wiring {
    registry: Arc<DisposalRegistry>,
    scoped_factory: DependencyFactory,
    singleton: SingletonDependency,
    body_limit: usize,
}

impl Wiring {
    /// Returns the singleton created with the root.
    ///
    /// Refused once the root has been disposed.
    pub fn singleton_dependency(&self) -> Result<SingletonDependency> {
        self.registry.ensure_open("use the singleton")?;
        Ok(self.singleton.clone())
    }

    /// Returns the scoped dependency of `scope`, creating it for the first
    /// handler that asks.
    pub fn scoped_dependency(&self, scope: &RequestScope) -> Result<ScopedDependency> {
        scope.get_or_try_insert_with(|scope| {
            let dependency = (self.scoped_factory)();
            if let Some(disposer) = dependency.clone().disposer() {
                scope.track(disposer)?;
            }
            debug!(dependency = %dependency, scope = %scope.id(), "Dependency created");
            Ok(ScopedDependency(dependency))
        })
    }

    pub fn body_limit(&self) -> usize {
        self.body_limit
    }

    pub fn registry(&self) -> &Arc<DisposalRegistry> {
        &self.registry
    }
}

/// Binds a path to the controller kind serving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub path: String,
    pub controller: HandlerKind,
}

pub struct CompositionRoot {
    registry: Arc<DisposalRegistry>,
    wiring: Wiring,
    controllers: FactoryDispatch<Wiring, dyn Controller>,
    middlewares: FactoryDispatch<Wiring, dyn Middleware>,
    routes: Vec<Route>,
    pipeline: Vec<HandlerKind>,
}

impl CompositionRoot {
    /// The production graph.
    pub fn new(config: &ServerConfig) -> Self {
        Self::builder().body_limit(config.body_limit).build()
    }

    pub fn builder() -> CompositionRootBuilder {
        CompositionRootBuilder::default()
    }

    /// Opens the scope of one request.
    pub fn begin_request(&self) -> Result<ScopeGuard> {
        RequestScope::enter(self.registry.clone())
    }

    // ═══════════════════════════════════════════════════════════
    // Controllers
    // ═══════════════════════════════════════════════════════════

    #[instrument(skip(self, scope), fields(scope = %scope.id()))]
    pub fn create_controller(
        &self,
        kind: &HandlerKind,
        scope: &RequestScope,
    ) -> Result<Arc<dyn Controller>> {
        self.controllers.create(&self.wiring, kind, scope)
    }

    pub fn release_controller(
        &self,
        kind: &HandlerKind,
        controller: &Arc<dyn Controller>,
    ) -> Result<usize> {
        self.controllers.release(kind, controller)
    }

    /// Creates a controller that is released when the lease drops.
    pub fn lease_controller(
        &self,
        kind: &HandlerKind,
        scope: &RequestScope,
    ) -> Result<Lease<'_, Wiring, dyn Controller>> {
        self.controllers.lease(&self.wiring, kind, scope)
    }

    // ═══════════════════════════════════════════════════════════
    // Middleware
    // ═══════════════════════════════════════════════════════════

    #[instrument(skip(self, scope), fields(scope = %scope.id()))]
    pub fn create_middleware(
        &self,
        kind: &HandlerKind,
        scope: &RequestScope,
    ) -> Result<Arc<dyn Middleware>> {
        self.middlewares.create(&self.wiring, kind, scope)
    }

    pub fn release_middleware(
        &self,
        kind: &HandlerKind,
        middleware: &Arc<dyn Middleware>,
    ) -> Result<usize> {
        self.middlewares.release(kind, middleware)
    }

    /// Creates a middleware that is released when the lease drops.
    pub fn lease_middleware(
        &self,
        kind: &HandlerKind,
        scope: &RequestScope,
    ) -> Result<Lease<'_, Wiring, dyn Middleware>> {
        self.middlewares.lease(&self.wiring, kind, scope)
    }

    // ═══════════════════════════════════════════════════════════
    // Introspection and shutdown
    // ═══════════════════════════════════════════════════════════

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Middleware kinds, outermost first.
    pub fn pipeline(&self) -> &[HandlerKind] {
        &self.pipeline
    }

    pub fn controller_kinds(&self) -> Vec<HandlerKind> {
        self.controllers.kinds()
    }

    pub fn middleware_kinds(&self) -> Vec<HandlerKind> {
        self.middlewares.kinds()
    }

    pub fn registry(&self) -> &Arc<DisposalRegistry> {
        &self.registry
    }

    pub fn wiring(&self) -> &Wiring {
        &self.wiring
    }

    pub fn is_disposed(&self) -> bool {
        self.registry.is_disposed()
    }

    /// Releases every outstanding disposable: leftover handler and request
    /// sets first, then singletons in reverse creation order.
    ///
    /// Later calls do nothing.
    pub fn dispose(&self) -> Result<()> {
        if self.registry.is_disposed() {
            return Ok(());
        }
        info!(
            singletons = self.registry.singleton_count(),
            open_scopes = self.registry.open_scopes(),
            "Disposing composition root"
        );
        self.registry.release_all()
    }
}

impl Drop for CompositionRoot {
    fn drop(&mut self) {
        if let Err(err) = self.dispose() {
            error!(error = %err, "Composition root disposal failed");
        }
    }
}

impl fmt::Debug for CompositionRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositionRoot")
            .field("controllers", &self.controllers)
            .field("middlewares", &self.middlewares)
            .field("routes", &self.routes)
            .field("pipeline", &self.pipeline)
            .field("registry", &self.registry)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════
// Builder
// ═══════════════════════════════════════════════════════════

/// Assembles a [`CompositionRoot`].
///
/// The defaults give the production graph; tests swap in their own
/// dependencies, handlers and routes.
pub struct CompositionRootBuilder {
    singleton_factory: DependencyFactory,
    scoped_factory: DependencyFactory,
    body_limit: usize,
    controllers: DispatchBuilder<Wiring, dyn Controller>,
    middlewares: DispatchBuilder<Wiring, dyn Middleware>,
    routes: Vec<Route>,
    pipeline: Vec<HandlerKind>,
}

impl Default for CompositionRootBuilder {
    fn default() -> Self {
        Self {
            singleton_factory: DisposableDependency::factory(),
            scoped_factory: DisposableDependency::factory(),
            body_limit: DEFAULT_BODY_LIMIT,
            controllers: DispatchBuilder::new("controller").register(HELLO, handlers::hello::activate),
            middlewares: DispatchBuilder::new("middleware")
                .register(GREETING, handlers::greeting::activate),
            routes: vec![Route {
                path: HELLO_PATH.to_string(),
                controller: HELLO,
            }],
            pipeline: vec![GREETING],
        }
    }
}

impl CompositionRootBuilder {
    pub fn singleton_dependency(
        mut self,
        factory: impl Fn() -> Arc<dyn Dependency> + Send + Sync + 'static,
    ) -> Self {
        self.singleton_factory = Arc::new(factory);
        self
    }

    pub fn scoped_dependency(
        mut self,
        factory: impl Fn() -> Arc<dyn Dependency> + Send + Sync + 'static,
    ) -> Self {
        self.scoped_factory = Arc::new(factory);
        self
    }

    pub fn body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    /// Registers a controller constructor, replacing any for the same kind.
    pub fn controller(
        mut self,
        kind: impl Into<HandlerKind>,
        constructor: impl Fn(&Wiring, &mut Activation<'_>) -> Result<Arc<dyn Controller>>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.controllers = self.controllers.register(kind, constructor);
        self
    }

    /// Registers a middleware constructor, replacing any for the same kind.
    pub fn middleware(
        mut self,
        kind: impl Into<HandlerKind>,
        constructor: impl Fn(&Wiring, &mut Activation<'_>) -> Result<Arc<dyn Middleware>>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.middlewares = self.middlewares.register(kind, constructor);
        self
    }

    /// Serves `path` with the controller registered under `kind`.
    ///
    /// The kind is resolved per request, so an unregistered kind fails at
    /// request time.
    pub fn route(mut self, path: impl Into<String>, kind: impl Into<HandlerKind>) -> Self {
        self.routes.push(Route {
            path: path.into(),
            controller: kind.into(),
        });
        self
    }

    /// Replaces the middleware pipeline, outermost first.
    pub fn pipeline(mut self, kinds: impl IntoIterator<Item = HandlerKind>) -> Self {
        self.pipeline = kinds.into_iter().collect();
        self
    }

    pub fn build(self) -> CompositionRoot {
        let registry = Arc::new(DisposalRegistry::new());
        let singleton = create_singleton(&registry, &self.singleton_factory);
        let wiring = Wiring {
            registry: registry.clone(),
            scoped_factory: self.scoped_factory,
            singleton,
            body_limit: self.body_limit,
        };
        let root = CompositionRoot {
            controllers: self.controllers.build(registry.clone()),
            middlewares: self.middlewares.build(registry.clone()),
            registry,
            wiring,
            routes: self.routes,
            pipeline: self.pipeline,
        };
        debug!(
            controllers = ?root.controller_kinds(),
            middlewares = ?root.middleware_kinds(),
            routes = root.routes.len(),
            "Composition root built"
        );
        root
    }
}

fn create_singleton(
    registry: &DisposalRegistry,
    factory: &DependencyFactory,
) -> SingletonDependency {
    let dependency = factory();
    if let Some(disposer) = dependency.clone().disposer() {
        if let Err(err) = registry.track_singleton(disposer) {
            error!(dependency = %dependency, error = %err, "Singleton registration failed");
        }
    }
    info!(dependency = %dependency, lifetime = %Lifetime::Singleton, "Dependency created");
    SingletonDependency(dependency)
}
