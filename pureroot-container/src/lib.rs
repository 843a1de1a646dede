//! Lifetime bookkeeping for hand-wired (Pure DI) object graphs.
//!
//! Nothing here resolves dependencies automatically: constructors are
//! ordinary functions written by hand. The crate only keeps track of who
//! owns which disposable and releases each one exactly once.

pub mod dispatch;
pub mod dispose;
pub mod error;
pub mod key;
pub mod registry;
pub mod request_scope;
pub mod scope;

pub use dispatch::{Activation, DispatchBuilder, FactoryDispatch, Lease};
pub use dispose::{Dispose, DisposeError};
pub use error::{PureRootError, Result};
pub use key::{HandlerKind, OwnerKey, ScopeId};
pub use registry::DisposalRegistry;
pub use request_scope::{RequestScope, ScopeGuard};
pub use scope::Lifetime;

pub mod prelude {
    pub use crate::dispatch::{Activation, Constructor, DispatchBuilder, FactoryDispatch, Lease};
    pub use crate::dispose::{Dispose, DisposeError};
    pub use crate::error::{PureRootError, Result};
    pub use crate::key::{HandlerKind, OwnerKey, ScopeId};
    pub use crate::registry::DisposalRegistry;
    pub use crate::request_scope::{RequestScope, ScopeGuard};
    pub use crate::scope::Lifetime;
}
