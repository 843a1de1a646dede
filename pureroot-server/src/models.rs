//! Dependencies handed to controllers and middleware.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use pureroot::{Dispose, DisposeError};
use tracing::info;

/// Something a handler needs.
///
/// Implementations that hold resources expose them through
/// [`disposer`](Dependency::disposer) so the composition root can register
/// them for release.
pub trait Dependency: fmt::Display + Send + Sync + 'static {
    /// The disposal capability of this dependency, if it has one.
    fn disposer(self: Arc<Self>) -> Option<Arc<dyn Dispose>> {
        None
    }
}

/// Builds one dependency instance. Swapped for fakes in tests.
pub type DependencyFactory = Arc<dyn Fn() -> Arc<dyn Dependency> + Send + Sync>;

static INSTANCE_COUNT: AtomicUsize = AtomicUsize::new(0);

/// A dependency that must be released explicitly.
///
/// Every instance takes the next number of a process-wide counter so
/// log lines can tell instances apart.
#[derive(Debug)]
pub struct DisposableDependency {
    id: usize,
    released: AtomicBool,
}

impl DisposableDependency {
    pub fn new() -> Self {
        Self {
            id: INSTANCE_COUNT.fetch_add(1, Ordering::SeqCst) + 1,
            released: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Default factory used by the composition root.
    pub fn factory() -> DependencyFactory {
        Arc::new(|| Arc::new(DisposableDependency::new()) as Arc<dyn Dependency>)
    }
}

impl Default for DisposableDependency {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DisposableDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DisposableDependency{}", self.id)
    }
}

impl Dispose for DisposableDependency {
    fn dispose(&self) -> Result<(), DisposeError> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!(dependency = %self, "Dependency disposed");
        Ok(())
    }

    fn label(&self) -> String {
        self.to_string()
    }
}

impl Dependency for DisposableDependency {
    fn disposer(self: Arc<Self>) -> Option<Arc<dyn Dispose>> {
        Some(self)
    }
}

/// The dependency shared by every request.
#[derive(Clone)]
pub struct SingletonDependency(pub Arc<dyn Dependency>);

/// The dependency shared by every handler of one request.
#[derive(Clone)]
pub struct ScopedDependency(pub Arc<dyn Dependency>);

impl fmt::Display for SingletonDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for ScopedDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
