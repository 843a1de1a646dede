//! Identification keys.
//!
//! - [`HandlerKind`] names a constructible handler (controller, middleware).
//! - [`ScopeId`] identifies one request scope.
//! - [`OwnerKey`] identifies whoever owns a set of scoped disposables in the
//!   [`DisposalRegistry`](crate::registry::DisposalRegistry).

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Stable identifier of a handler kind.
///
/// Kinds are plain string tags registered at startup, so dispatch never
/// depends on runtime type comparison.
///
/// # Examples
/// ```
/// use pureroot_container::key::HandlerKind;
///
/// const HELLO: HandlerKind = HandlerKind::from_static("hello");
/// assert_eq!(HELLO, HandlerKind::new("hello"));
/// assert_eq!(HELLO.as_str(), "hello");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerKind(Cow<'static, str>);

impl HandlerKind {
    /// Creates a kind from a static tag, usable in `const` items.
    #[inline]
    pub const fn from_static(tag: &'static str) -> Self {
        Self(Cow::Borrowed(tag))
    }

    /// Creates a kind from any string.
    pub fn new(tag: impl Into<String>) -> Self {
        Self(Cow::Owned(tag.into()))
    }

    /// Returns the tag.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for HandlerKind {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for HandlerKind {
    fn from(tag: &'static str) -> Self {
        Self::from_static(tag)
    }
}

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of a single request scope.
///
/// Allocated from a process-wide counter, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    /// Allocates a fresh id.
    pub fn next() -> Self {
        Self(NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

/// Owner of a set of scoped disposables.
///
/// A request owns the scoped dependencies shared by all of its handlers;
/// a handler instance owns whatever its constructor handed over through
/// [`Activation::own`](crate::dispatch::Activation::own).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerKey {
    Request(ScopeId),
    /// Address of the handler allocation. Only meaningful while the
    /// handler is alive.
    Handler(usize),
}

impl OwnerKey {
    /// Key for a live handler instance.
    pub fn handler<H: ?Sized>(handler: &Arc<H>) -> Self {
        Self::Handler(Arc::as_ptr(handler).cast::<()>() as usize)
    }
}

impl From<ScopeId> for OwnerKey {
    fn from(id: ScopeId) -> Self {
        Self::Request(id)
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerKey::Request(id) => write!(f, "{id}"),
            OwnerKey::Handler(addr) => write!(f, "handler@{addr:#x}"),
        }
    }
}
