//! Per-request plumbing between axum and the composition root.
//!
//! Layer order for a route, outermost first: request scope, then each
//! configured middleware, then the controller endpoint.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use pureroot::{HandlerKind, RequestScope};
use tracing::{debug, error};

use crate::composition::CompositionRoot;
use crate::errors::AppError;

/// Opens the request scope, runs the rest of the stack, then ends it.
///
/// If the request future is dropped early the guard still ends the scope.
pub async fn request_scope(
    State(root): State<Arc<CompositionRoot>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let guard = root.begin_request()?;
    request.extensions_mut().insert(guard.scope().clone());

    let response = next.run(request).await;

    let scope = guard.id();
    match guard.finish() {
        Ok(released) => debug!(%scope, released, "Request scope released"),
        Err(err) => error!(%scope, error = %err, "Request scope release failed"),
    }
    Ok(response)
}

/// State of one middleware layer.
#[derive(Clone)]
pub struct MiddlewareSlot {
    root: Arc<CompositionRoot>,
    kind: HandlerKind,
}

impl MiddlewareSlot {
    pub fn new(root: Arc<CompositionRoot>, kind: HandlerKind) -> Self {
        Self { root, kind }
    }
}

/// Builds the slot's middleware for this request and runs it.
pub async fn activate_middleware(
    State(slot): State<MiddlewareSlot>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let scope = current_scope(&request)?;
    let middleware = slot.root.lease_middleware(&slot.kind, &scope)?;

    let response = middleware.invoke(request, next).await?;

    if let Err(err) = middleware.release() {
        error!(kind = %slot.kind, error = %err, "Middleware release failed");
    }
    Ok(response)
}

/// State of one route's endpoint.
#[derive(Clone)]
pub struct ControllerSlot {
    root: Arc<CompositionRoot>,
    kind: HandlerKind,
}

impl ControllerSlot {
    pub fn new(root: Arc<CompositionRoot>, kind: HandlerKind) -> Self {
        Self { root, kind }
    }
}

/// Builds the route's controller for this request and lets it answer.
pub async fn dispatch_controller(
    State(slot): State<ControllerSlot>,
    request: Request,
) -> Result<Response, AppError> {
    let scope = current_scope(&request)?;
    let controller = slot.root.lease_controller(&slot.kind, &scope)?;

    let response = controller.handle(request).await?;

    if let Err(err) = controller.release() {
        error!(kind = %slot.kind, error = %err, "Controller release failed");
    }
    Ok(response)
}

fn current_scope(request: &Request) -> Result<Arc<RequestScope>, AppError> {
    request
        .extensions()
        .get::<Arc<RequestScope>>()
        .cloned()
        .ok_or(AppError::MissingScope)
}
