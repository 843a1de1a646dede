//! Dependency lifetimes.
//!
//! - [`Lifetime::Singleton`]: one instance per composition root
//! - [`Lifetime::Scoped`]: one instance per request
//!
//! # Ordering
//! `Singleton > Scoped`: a singleton outlives every request.
use std::fmt;

/// How long a disposable resource lives before it is released.
///
/// # Examples
/// ```
/// use pureroot_container::scope::Lifetime;
///
/// assert!(Lifetime::Singleton > Lifetime::Scoped);
/// assert_eq!(Lifetime::Scoped.to_string(), "Scoped");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// Shared by all requests, released once at shutdown.
    Singleton,

    /// Created fresh for a request, released when that request ends.
    Scoped,
}

impl Lifetime {
    /// Returns `true` if this lifetime ends with the process.
    #[inline]
    pub fn is_singleton(&self) -> bool {
        matches!(self, Lifetime::Singleton)
    }

    #[inline]
    fn ordering(&self) -> u8 {
        match self {
            Lifetime::Singleton => 1,
            Lifetime::Scoped => 0,
        }
    }
}

impl PartialOrd for Lifetime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Lifetime {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.ordering().cmp(&other.ordering())
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Singleton => write!(f, "Singleton"),
            Lifetime::Scoped => write!(f, "Scoped"),
        }
    }
}
