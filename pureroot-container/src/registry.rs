//! Disposal registry. Remembers every disposable the composition root
//! handed out and releases each exactly once.
//!
//! Two collections are kept:
//! - singleton disposables, released by [`DisposalRegistry::release_all`]
//! - scoped disposables grouped by [`OwnerKey`], released by
//!   [`DisposalRegistry::release_scope`] (or by `release_all` if the owner
//!   never finished)

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::dispose::Dispose;
use crate::error::{DisposalFailure, DisposalReport, PureRootError, Result};
use crate::key::OwnerKey;
use crate::scope::Lifetime;

/// Tracks disposables by lifetime and owner.
///
/// Safe to share between concurrently handled requests: the scoped map is
/// a [`DashMap`], the singleton list sits behind a [`Mutex`], and the
/// disposed flag is atomic.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use pureroot_container::dispose::{Dispose, DisposeError};
/// use pureroot_container::key::{OwnerKey, ScopeId};
/// use pureroot_container::registry::DisposalRegistry;
///
/// struct Connection;
/// impl Dispose for Connection {
///     fn dispose(&self) -> Result<(), DisposeError> { Ok(()) }
/// }
///
/// let registry = DisposalRegistry::new();
/// let owner = OwnerKey::from(ScopeId::next());
///
/// registry.register_scoped(owner, Arc::new(Connection)).unwrap();
/// assert_eq!(registry.release_scope(owner).unwrap(), 1);
/// assert_eq!(registry.release_scope(owner).unwrap(), 0);
/// ```
pub struct DisposalRegistry {
    singletons: Mutex<Vec<Arc<dyn Dispose>>>,
    scoped: DashMap<OwnerKey, Vec<Arc<dyn Dispose>>>,
    disposed: AtomicBool,
}

impl DisposalRegistry {
    /// Creates an empty, open registry.
    pub fn new() -> Self {
        Self {
            singletons: Mutex::new(Vec::new()),
            scoped: DashMap::new(),
            disposed: AtomicBool::new(false),
        }
    }

    /// Fails with [`PureRootError::RegistryClosed`] once `release_all` ran.
    pub fn ensure_open(&self, operation: &'static str) -> Result<()> {
        if self.is_disposed() {
            warn!(operation, "Operation attempted on a disposed registry");
            return Err(PureRootError::RegistryClosed { operation });
        }
        Ok(())
    }

    /// Returns `true` once `release_all` has started.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    // ── Singletons ──

    /// Registers a singleton disposable and hands it back for chaining.
    pub fn register_singleton<T: Dispose + 'static>(&self, resource: Arc<T>) -> Result<Arc<T>> {
        self.track_singleton(resource.clone())?;
        Ok(resource)
    }

    /// Type-erased form of [`register_singleton`](Self::register_singleton).
    pub fn track_singleton(&self, resource: Arc<dyn Dispose>) -> Result<()> {
        const OPERATION: &str = "register a singleton";
        if let Err(err) = self.ensure_open(OPERATION) {
            return Err(err.with_cleanup(release_now(vec![resource], Lifetime::Singleton)));
        }

        let mut singletons = self.singletons.lock();
        // release_all flips the flag before it drains this list
        if self.is_disposed() {
            drop(singletons);
            let report = release_now(vec![resource], Lifetime::Singleton);
            return Err(PureRootError::RegistryClosed { operation: OPERATION }.with_cleanup(report));
        }

        debug!(resource = %resource.label(), lifetime = %Lifetime::Singleton, "Registered disposable");
        singletons.push(resource);
        Ok(())
    }

    // ── Scoped ──

    /// Registers a scoped disposable under `owner` and hands it back.
    ///
    /// Registering the same allocation twice under one owner keeps a single
    /// entry, so it is still released once.
    pub fn register_scoped<T: Dispose + 'static>(
        &self,
        owner: OwnerKey,
        resource: Arc<T>,
    ) -> Result<Arc<T>> {
        self.track_scoped(owner, resource.clone())?;
        Ok(resource)
    }

    /// Type-erased form of [`register_scoped`](Self::register_scoped).
    pub fn track_scoped(&self, owner: OwnerKey, resource: Arc<dyn Dispose>) -> Result<()> {
        self.track_scoped_all(owner, vec![resource])
    }

    /// Registers several scoped disposables under `owner` in one step.
    ///
    /// On a disposed registry nothing is stored: the resources are released
    /// right away and [`PureRootError::RegistryClosed`] is returned.
    pub fn track_scoped_all(&self, owner: OwnerKey, resources: Vec<Arc<dyn Dispose>>) -> Result<()> {
        const OPERATION: &str = "register a scoped resource";
        if let Err(err) = self.ensure_open(OPERATION) {
            return Err(err.with_cleanup(release_now(resources, Lifetime::Scoped)));
        }
        if resources.is_empty() {
            return Ok(());
        }

        {
            let mut set = self.scoped.entry(owner).or_insert_with(Vec::new);
            for resource in resources {
                if set.iter().any(|existing| same_allocation(existing, &resource)) {
                    trace!(owner = %owner, resource = %resource.label(), "Already registered");
                    continue;
                }
                debug!(
                    owner = %owner,
                    resource = %resource.label(),
                    lifetime = %Lifetime::Scoped,
                    "Registered disposable"
                );
                set.push(resource);
            }
        }

        // Shutdown raced us: the sweep may have missed this owner.
        if self.is_disposed() {
            let closed = PureRootError::RegistryClosed { operation: OPERATION };
            return Err(closed.after_cleanup(self.release_scope(owner)));
        }
        Ok(())
    }

    /// Removes and releases everything registered under `owner`.
    ///
    /// Returns how many resources were released; `Ok(0)` if the owner is
    /// unknown or was already released.
    pub fn release_scope(&self, owner: OwnerKey) -> Result<usize> {
        let Some((_, resources)) = self.scoped.remove(&owner) else {
            trace!(owner = %owner, "Nothing to release");
            return Ok(0);
        };

        let count = resources.len();
        let report = release_now(resources, Lifetime::Scoped);
        debug!(owner = %owner, released = count, failed = report.len(), "Released scope");
        report.into_result(count)
    }

    // ── Shutdown ──

    /// Releases every outstanding scope, then every singleton.
    ///
    /// Only the first call does any work; later or concurrent calls return
    /// `Ok(())` straight away. Every resource is attempted even when some
    /// fail; the failures come back together as
    /// [`PureRootError::DisposalFailed`].
    pub fn release_all(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            trace!("Registry already disposed");
            return Ok(());
        }

        let owners: Vec<OwnerKey> = self.scoped.iter().map(|entry| *entry.key()).collect();
        info!(
            open_scopes = owners.len(),
            singletons = self.singleton_count(),
            "Releasing all disposables"
        );

        let mut report = DisposalReport::new();
        for owner in owners {
            if let Some((_, resources)) = self.scoped.remove(&owner) {
                warn!(owner = %owner, count = resources.len(), "Releasing unfinished scope");
                report.merge(release_now(resources, Lifetime::Scoped));
            }
        }

        let singletons = std::mem::take(&mut *self.singletons.lock());
        report.merge(release_now(singletons, Lifetime::Singleton));

        if report.is_empty() {
            info!("Registry disposed ✓");
        } else {
            warn!(failed = report.len(), "Registry disposed with failures");
        }
        report.into_result(())
    }

    // ── Introspection ──

    /// Number of singleton disposables still held.
    pub fn singleton_count(&self) -> usize {
        self.singletons.lock().len()
    }

    /// Number of owners with unreleased scoped disposables.
    pub fn open_scopes(&self) -> usize {
        self.scoped.len()
    }

    /// Number of disposables held for `owner`.
    pub fn scoped_count(&self, owner: OwnerKey) -> usize {
        self.scoped.get(&owner).map(|set| set.len()).unwrap_or(0)
    }
}

impl Default for DisposalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DisposalRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposalRegistry")
            .field("singletons", &self.singleton_count())
            .field("open_scopes", &self.open_scopes())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Releases newest first, attempting every resource.
///
/// Used for resources that never made it into (or were just taken out of)
/// the registry.
pub(crate) fn release_now(resources: Vec<Arc<dyn Dispose>>, lifetime: Lifetime) -> DisposalReport {
    let mut report = DisposalReport::new();
    for resource in resources.into_iter().rev() {
        let label = resource.label();
        match resource.dispose() {
            Ok(()) => trace!(resource = %label, lifetime = %lifetime, "Released"),
            Err(error) => {
                warn!(resource = %label, lifetime = %lifetime, error = %error, "Release failed");
                report.push(DisposalFailure {
                    resource: label,
                    lifetime,
                    error,
                });
            }
        }
    }
    report
}

fn same_allocation(a: &Arc<dyn Dispose>, b: &Arc<dyn Dispose>) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}
