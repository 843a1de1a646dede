//! Per-request scope: the value store shared by every handler built for one
//! request, and the owner of that request's scoped disposables.
//!
//! A scope is opened once when the request enters the pipeline and passed
//! explicitly to each factory call, so a middleware and a controller built
//! for the same request see the same scoped instances no matter which one
//! is constructed first.
//!
//! ```text
//! request ──enter()──> ScopeGuard ──> RequestScope ──> handlers
//!                          │
//!                       drop / finish()
//!                          ▼
//!               values cleared, disposables released
//! ```

use std::any::type_name;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use pureroot_support::rendering::shorten_type_name;
use tracing::{debug, trace, warn};

use crate::dispose::Dispose;
use crate::error::{PureRootError, Result};
use crate::key::{OwnerKey, ScopeId};
use crate::registry::{DisposalRegistry, release_now};
use crate::scope::Lifetime;

type ValueMap = anymap2::SendSyncAnyMap;

/// Values and disposables belonging to a single request.
///
/// Values are keyed by their type, so each capability gets its own
/// wrapper type (e.g. `struct ScopedDependency(Arc<dyn Dependency>)`).
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use pureroot_container::registry::DisposalRegistry;
/// use pureroot_container::request_scope::RequestScope;
///
/// #[derive(Clone)]
/// struct RequestLabel(&'static str);
///
/// let registry = Arc::new(DisposalRegistry::new());
/// let scope = RequestScope::enter(registry).unwrap();
///
/// scope.set(RequestLabel("first"));
/// assert_eq!(scope.get::<RequestLabel>().unwrap().0, "first");
///
/// scope.finish().unwrap();
/// ```
pub struct RequestScope {
    id: ScopeId,
    registry: Arc<DisposalRegistry>,
    values: Mutex<ValueMap>,
    ended: AtomicBool,
}

impl RequestScope {
    /// Creates a scope with a fresh id. Prefer [`RequestScope::enter`],
    /// which also ends the scope when the guard goes away.
    pub fn new(registry: Arc<DisposalRegistry>) -> Self {
        let id = ScopeId::next();
        trace!(scope = %id, "Request scope created");
        Self {
            id,
            registry,
            values: Mutex::new(ValueMap::new()),
            ended: AtomicBool::new(false),
        }
    }

    /// Opens a scope bound to a guard.
    ///
    /// # Errors
    /// [`PureRootError::RegistryClosed`] if the registry was already disposed.
    pub fn enter(registry: Arc<DisposalRegistry>) -> Result<ScopeGuard> {
        registry.ensure_open("open a request scope")?;
        let scope = Arc::new(Self::new(registry));
        debug!(scope = %scope.id, "Request scope entered");
        Ok(ScopeGuard {
            scope,
            finished: false,
        })
    }

    #[inline]
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// Key under which this scope's disposables are registered.
    #[inline]
    pub fn owner(&self) -> OwnerKey {
        OwnerKey::Request(self.id)
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    // ── Value store ──

    /// Stores `value` for the rest of this request, replacing any previous
    /// value of the same type.
    pub fn set<T: Send + Sync + 'static>(&self, value: T) {
        trace!(scope = %self.id, capability = %capability::<T>(), "Scoped value set");
        self.values.lock().insert(value);
    }

    /// Reads a value stored earlier in this request.
    ///
    /// # Errors
    /// [`PureRootError::ScopedValueNotFound`] if nothing stored a `T` yet.
    pub fn get<T: Clone + Send + Sync + 'static>(&self) -> Result<T> {
        self.values
            .lock()
            .get::<T>()
            .cloned()
            .ok_or_else(|| PureRootError::ScopedValueNotFound {
                capability: capability::<T>(),
                scope: self.id,
            })
    }

    /// Returns `true` if a `T` is stored.
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.values.lock().contains::<T>()
    }

    /// Returns the stored `T`, creating it with `init` on first use.
    ///
    /// `init` runs without the store locked, so it may register disposables
    /// or read other values of this scope. If two callers race, the first
    /// stored value wins and both get it.
    pub fn get_or_try_insert_with<T, F>(&self, init: F) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(&RequestScope) -> Result<T>,
    {
        if let Some(existing) = self.values.lock().get::<T>() {
            return Ok(existing.clone());
        }
        self.ensure_active("create a scoped value")?;

        let created = init(self)?;

        let mut values = self.values.lock();
        if let Some(existing) = values.get::<T>() {
            return Ok(existing.clone());
        }
        debug!(scope = %self.id, capability = %capability::<T>(), "Scoped value created");
        values.insert(created.clone());
        Ok(created)
    }

    /// Drops every stored value.
    pub fn clear(&self) {
        let mut values = self.values.lock();
        if !values.is_empty() {
            trace!(scope = %self.id, count = values.len(), "Scoped values cleared");
        }
        values.clear();
    }

    // ── Disposables ──

    /// Registers a disposable to be released when this scope ends.
    pub fn register<T: Dispose + 'static>(&self, resource: Arc<T>) -> Result<Arc<T>> {
        self.track(resource.clone())?;
        Ok(resource)
    }

    /// Type-erased form of [`register`](Self::register).
    ///
    /// After [`end`](Self::end) the resource is released immediately and
    /// [`PureRootError::ScopeEnded`] is returned.
    pub fn track(&self, resource: Arc<dyn Dispose>) -> Result<()> {
        const OPERATION: &str = "register a disposable";
        if let Err(err) = self.ensure_active(OPERATION) {
            return Err(err.with_cleanup(release_now(vec![resource], Lifetime::Scoped)));
        }
        self.registry.track_scoped(self.owner(), resource)?;

        // end() raced us: its sweep may have run before the insert.
        if let Err(err) = self.ensure_active(OPERATION) {
            return Err(err.after_cleanup(self.registry.release_scope(self.owner())));
        }
        Ok(())
    }

    /// Clears the store and releases this scope's disposables.
    ///
    /// Safe to call more than once; later calls release nothing.
    pub fn end(&self) -> Result<usize> {
        let first = !self.ended.swap(true, Ordering::SeqCst);
        self.clear();
        let released = self.registry.release_scope(self.owner())?;
        if first {
            debug!(scope = %self.id, released, "Request scope ended");
        }
        Ok(released)
    }

    fn ensure_active(&self, operation: &'static str) -> Result<()> {
        if self.is_ended() {
            return Err(PureRootError::ScopeEnded {
                operation,
                scope: self.id,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for RequestScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestScope")
            .field("id", &self.id)
            .field("values", &self.values.lock().len())
            .field("disposables", &self.registry.scoped_count(self.owner()))
            .field("ended", &self.is_ended())
            .finish()
    }
}

fn capability<T: ?Sized>() -> String {
    shorten_type_name(type_name::<T>())
}

// ═══════════════════════════════════════════
// ScopeGuard
// ═══════════════════════════════════════════

/// Ends its scope when dropped.
///
/// Completion, failure and cancellation of the request all drop the guard,
/// so the scope is released on every path.
pub struct ScopeGuard {
    scope: Arc<RequestScope>,
    finished: bool,
}

impl ScopeGuard {
    /// Shared handle to the scope, e.g. for request extensions.
    pub fn scope(&self) -> &Arc<RequestScope> {
        &self.scope
    }

    /// Ends the scope now and reports release failures to the caller.
    pub fn finish(mut self) -> Result<usize> {
        self.finished = true;
        self.scope.end()
    }
}

impl Deref for ScopeGuard {
    type Target = RequestScope;

    fn deref(&self) -> &RequestScope {
        &self.scope
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(err) = self.scope.end() {
            warn!(scope = %self.scope.id, error = %err, "Request scope released with failures");
        }
    }
}

impl fmt::Debug for ScopeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeGuard")
            .field("scope", &self.scope.id)
            .field("finished", &self.finished)
            .finish()
    }
}
