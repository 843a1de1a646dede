//! # PureRoot: Pure DI lifetimes for Rust services
//!
//! Compose handlers by hand, share singletons and per-request values
//! explicitly, and release every disposable exactly once.

pub use pureroot_container::*;
pub use pureroot_support::*;
