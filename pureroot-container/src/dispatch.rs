//! # Factory dispatch: handler kind to constructor
//!
//! A [`FactoryDispatch`] maps a stable [`HandlerKind`] to a hand-written
//! constructor, registered once at startup. Creating a handler wires it
//! against a shared context `C` (the composition root's singletons) and the
//! current [`RequestScope`].
//!
//! # Architecture
//! ```text
//! DispatchBuilder ──build()──> FactoryDispatch
//!                                   │
//!                      create(ctx, kind, scope) / lease(..)
//!                                   │
//!                                   ▼
//!                    Arc<H>  (+ handler-owned disposables
//!                             registered under OwnerKey::Handler)
//! ```
//!
//! # Examples
//! ```rust
//! use std::sync::Arc;
//! use pureroot_container::prelude::*;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct Plain(&'static str);
//! impl Greeter for Plain {
//!     fn greet(&self) -> String { format!("hello from {}", self.0) }
//! }
//!
//! struct Settings { name: &'static str }
//!
//! let registry = Arc::new(DisposalRegistry::new());
//! let greeters = DispatchBuilder::<Settings, dyn Greeter>::new("greeter")
//!     .register("plain", |settings: &Settings, _: &mut Activation<'_>| {
//!         Ok(Arc::new(Plain(settings.name)) as Arc<dyn Greeter>)
//!     })
//!     .build(registry.clone());
//!
//! let settings = Settings { name: "docs" };
//! let scope = RequestScope::enter(registry).unwrap();
//! let greeter = greeters.lease(&settings, &HandlerKind::new("plain"), &scope).unwrap();
//! assert_eq!(greeter.greet(), "hello from docs");
//! ```

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use pureroot_support::rendering::suggest_similar;
use tracing::{debug, instrument, trace, warn};

use crate::dispose::Dispose;
use crate::error::{PureRootError, Result, UnrecognizedKindError};
use crate::key::{HandlerKind, OwnerKey};
use crate::registry::{DisposalRegistry, release_now};
use crate::request_scope::RequestScope;
use crate::scope::Lifetime;

/// Hand-written constructor for one handler kind.
///
/// Receives the shared context and an [`Activation`] giving access to the
/// request scope.
pub type Constructor<C, H> =
    Arc<dyn Fn(&C, &mut Activation<'_>) -> Result<Arc<H>> + Send + Sync>;

// ============================================================
// Activation
// ============================================================

/// What a constructor can see and hand over while building one handler.
pub struct Activation<'a> {
    family: &'static str,
    kind: &'a HandlerKind,
    scope: &'a RequestScope,
    owned: Vec<Arc<dyn Dispose>>,
}

impl<'a> Activation<'a> {
    #[inline]
    pub fn kind(&self) -> &HandlerKind {
        self.kind
    }

    /// The scope of the request this handler is built for.
    #[inline]
    pub fn scope(&self) -> &'a RequestScope {
        self.scope
    }

    /// Hands a disposable to the handler being built. It is released by
    /// [`FactoryDispatch::release`] for that handler, not at request end.
    pub fn own<T: Dispose + 'static>(&mut self, resource: Arc<T>) -> Arc<T> {
        self.owned.push(resource.clone());
        resource
    }

    /// Wraps a constructor-specific failure.
    pub fn error(
        &self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> PureRootError {
        PureRootError::construction(self.family, self.kind, source)
    }
}

impl fmt::Debug for Activation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activation")
            .field("family", &self.family)
            .field("kind", self.kind)
            .field("scope", &self.scope.id())
            .field("owned", &self.owned.len())
            .finish()
    }
}

// ============================================================
// DispatchBuilder
// ============================================================

/// Collects constructors before the dispatch table is frozen.
pub struct DispatchBuilder<C, H: ?Sized> {
    family: &'static str,
    constructors: HashMap<HandlerKind, Constructor<C, H>>,
}

impl<C, H: ?Sized> DispatchBuilder<C, H> {
    /// `family` names the handler family in logs and errors
    /// (`"controller"`, `"middleware"`).
    pub fn new(family: &'static str) -> Self {
        Self {
            family,
            constructors: HashMap::new(),
        }
    }

    /// Registers the constructor for `kind`. A later registration for the
    /// same kind replaces the earlier one.
    pub fn register(
        mut self,
        kind: impl Into<HandlerKind>,
        constructor: impl Fn(&C, &mut Activation<'_>) -> Result<Arc<H>> + Send + Sync + 'static,
    ) -> Self {
        self.insert(kind.into(), Arc::new(constructor));
        self
    }

    /// Registers an already shared constructor.
    pub fn insert(&mut self, kind: HandlerKind, constructor: Constructor<C, H>) {
        if self.constructors.insert(kind.clone(), constructor).is_some() {
            warn!(family = self.family, kind = %kind, "Replaced constructor");
        } else {
            debug!(family = self.family, kind = %kind, "Registered constructor");
        }
    }

    /// Freezes the table.
    pub fn build(self, registry: Arc<DisposalRegistry>) -> FactoryDispatch<C, H> {
        debug!(
            family = self.family,
            registered = self.constructors.len(),
            "Dispatch table built"
        );
        FactoryDispatch {
            family: self.family,
            constructors: self.constructors,
            registry,
        }
    }
}

// ═══════════════════════════════════════════
// FactoryDispatch
// ═══════════════════════════════════════════

/// Immutable kind → constructor table for one handler family.
pub struct FactoryDispatch<C, H: ?Sized> {
    family: &'static str,
    constructors: HashMap<HandlerKind, Constructor<C, H>>,
    registry: Arc<DisposalRegistry>,
}

impl<C, H: ?Sized> FactoryDispatch<C, H> {
    pub fn builder(family: &'static str) -> DispatchBuilder<C, H> {
        DispatchBuilder::new(family)
    }

    #[inline]
    pub fn family(&self) -> &'static str {
        self.family
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<HandlerKind> {
        let mut kinds: Vec<_> = self.constructors.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn contains(&self, kind: &HandlerKind) -> bool {
        self.constructors.contains_key(kind)
    }

    /// Builds a handler of `kind` for the request behind `scope`.
    ///
    /// # Errors
    /// - [`PureRootError::RegistryClosed`] after shutdown
    /// - [`PureRootError::UnrecognizedKind`] if `kind` has no constructor;
    ///   nothing is constructed
    /// - whatever the constructor returns
    #[instrument(skip_all, fields(family = self.family, kind = %kind, scope = %scope.id()))]
    pub fn create(&self, ctx: &C, kind: &HandlerKind, scope: &RequestScope) -> Result<Arc<H>> {
        self.registry.ensure_open("create a handler")?;

        let constructor = self
            .constructors
            .get(kind)
            .ok_or_else(|| self.unrecognized(kind))?;

        let mut activation = Activation {
            family: self.family,
            kind,
            scope,
            owned: Vec::new(),
        };

        let handler = match constructor(ctx, &mut activation) {
            Ok(handler) => handler,
            Err(err) => {
                warn!(error = %err, "Constructor failed");
                return Err(err.with_cleanup(release_now(activation.owned, Lifetime::Scoped)));
            }
        };

        let owned = activation.owned.len();
        self.registry
            .track_scoped_all(OwnerKey::handler(&handler), activation.owned)?;

        trace!(owned, "Handler created");
        Ok(handler)
    }

    /// Releases the disposables owned by a handler built by [`create`](Self::create).
    pub fn release(&self, kind: &HandlerKind, handler: &Arc<H>) -> Result<usize> {
        let released = self.registry.release_scope(OwnerKey::handler(handler))?;
        trace!(family = self.family, kind = %kind, released, "Handler released");
        Ok(released)
    }

    /// [`create`](Self::create) bound to a [`Lease`] that releases the
    /// handler when dropped.
    pub fn lease(&self, ctx: &C, kind: &HandlerKind, scope: &RequestScope) -> Result<Lease<'_, C, H>> {
        let handler = self.create(ctx, kind, scope)?;
        Ok(Lease {
            dispatch: self,
            kind: kind.clone(),
            handler,
            released: false,
        })
    }

    fn unrecognized(&self, kind: &HandlerKind) -> PureRootError {
        let known = self.kinds();
        let names: Vec<&str> = known.iter().map(HandlerKind::as_str).collect();
        let suggestions = suggest_similar(kind.as_str(), &names, 3);

        warn!(family = self.family, kind = %kind, "Unrecognized handler kind");
        PureRootError::UnrecognizedKind(UnrecognizedKindError {
            family: self.family,
            requested: kind.clone(),
            known,
            suggestions,
        })
    }
}

impl<C, H: ?Sized> fmt::Debug for FactoryDispatch<C, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryDispatch")
            .field("family", &self.family)
            .field("kinds", &self.kinds())
            .finish()
    }
}

// ═══════════════════════════════════════════
// Lease
// ═══════════════════════════════════════════

/// A handler on loan from a [`FactoryDispatch`].
///
/// Dropping the lease releases the handler, so handler-owned disposables
/// go away even if the request future is cancelled mid-flight.
pub struct Lease<'d, C, H: ?Sized> {
    dispatch: &'d FactoryDispatch<C, H>,
    kind: HandlerKind,
    handler: Arc<H>,
    released: bool,
}

impl<C, H: ?Sized> Lease<'_, C, H> {
    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    pub fn kind(&self) -> &HandlerKind {
        &self.kind
    }

    /// Releases now and reports failures to the caller.
    pub fn release(mut self) -> Result<usize> {
        self.released = true;
        self.dispatch.release(&self.kind, &self.handler)
    }
}

impl<C, H: ?Sized> Deref for Lease<'_, C, H> {
    type Target = H;

    fn deref(&self) -> &H {
        &self.handler
    }
}

impl<C, H: ?Sized> Drop for Lease<'_, C, H> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.dispatch.release(&self.kind, &self.handler) {
            warn!(kind = %self.kind, error = %err, "Handler released with failures");
        }
    }
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
