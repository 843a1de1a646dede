//! Explicit resource release.

use std::any::type_name;

use pureroot_support::rendering::shorten_type_name;

/// Error returned by a failed [`Dispose::dispose`] call.
pub type DisposeError = Box<dyn std::error::Error + Send + Sync>;

/// A resource that holds something worth releasing explicitly.
///
/// Registered with a [`DisposalRegistry`](crate::registry::DisposalRegistry),
/// which calls `dispose` exactly once per registration. Implementations
/// shared between several owners should make `dispose` idempotent themselves.
///
/// # Examples
/// ```
/// use pureroot_container::dispose::{Dispose, DisposeError};
///
/// struct Pool;
///
/// impl Dispose for Pool {
///     fn dispose(&self) -> Result<(), DisposeError> {
///         Ok(())
///     }
/// }
///
/// assert_eq!(Pool.label(), "Pool");
/// ```
pub trait Dispose: Send + Sync {
    /// Releases the underlying handles.
    fn dispose(&self) -> Result<(), DisposeError>;

    /// Name used in logs and disposal reports.
    fn label(&self) -> String {
        shorten_type_name(type_name::<Self>())
    }
}
