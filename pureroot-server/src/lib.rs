//! HTTP host for the pureroot composition root.
//!
//! Serves `GET /api/hello` through a greeting middleware. Both handlers
//! are built per request from one singleton and one request-scoped
//! dependency, and everything they own is released when the request or
//! the server ends.

pub mod composition;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod server;

pub use composition::{CompositionRoot, CompositionRootBuilder, HELLO_PATH, Route, Wiring};
pub use config::{LogFormat, LoggingConfig, ServerConfig};
pub use errors::{AppError, ServerError};
pub use models::{Dependency, DisposableDependency, ScopedDependency, SingletonDependency};
