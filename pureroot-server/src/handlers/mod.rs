//! Controllers and middleware.
//!
//! Each handler is built per request by the composition root and released
//! when the request is done with it.

pub mod greeting;
pub mod hello;

use async_trait::async_trait;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use pureroot::HandlerKind;

use crate::errors::AppError;

pub use greeting::GreetingMiddleware;
pub use hello::HelloController;

/// Controller serving `GET /api/hello`.
pub const HELLO: HandlerKind = HandlerKind::from_static("hello");

/// Middleware appending its greeting to every response.
pub const GREETING: HandlerKind = HandlerKind::from_static("greeting");

/// Terminal request handler.
#[async_trait]
pub trait Controller: Send + Sync {
    async fn handle(&self, request: Request) -> Result<Response, AppError>;
}

/// Wraps the rest of the pipeline.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn invoke(&self, request: Request, next: Next) -> Result<Response, AppError>;
}
