use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Request;
use axum::http::header::CONTENT_LENGTH;
use axum::middleware::Next;
use axum::response::Response;
use pureroot::Activation;

use super::Middleware;
use crate::composition::Wiring;
use crate::errors::AppError;
use crate::models::{ScopedDependency, SingletonDependency};

/// Appends a greeting naming its own dependencies to the response body.
pub struct GreetingMiddleware {
    singleton: SingletonDependency,
    scoped: ScopedDependency,
    body_limit: usize,
}

impl GreetingMiddleware {
    pub fn new(singleton: SingletonDependency, scoped: ScopedDependency, body_limit: usize) -> Self {
        Self {
            singleton,
            scoped,
            body_limit,
        }
    }

    pub fn trailer(&self) -> String {
        format!(
            " Also, hello from middleware with {} and {}!\n",
            self.singleton, self.scoped
        )
    }
}

#[async_trait]
impl Middleware for GreetingMiddleware {
    async fn invoke(&self, request: Request, next: Next) -> Result<Response, AppError> {
        let response = next.run(request).await;

        let (mut parts, body) = response.into_parts();
        let bytes = axum::body::to_bytes(body, self.body_limit)
            .await
            .map_err(AppError::Body)?;

        let mut combined = Vec::with_capacity(bytes.len() + 96);
        combined.extend_from_slice(&bytes);
        combined.extend_from_slice(self.trailer().as_bytes());

        parts.headers.remove(CONTENT_LENGTH);
        Ok(Response::from_parts(parts, Body::from(combined)))
    }
}

/// Constructor registered under [`GREETING`](super::GREETING).
pub fn activate(
    wiring: &Wiring,
    activation: &mut Activation<'_>,
) -> pureroot::Result<Arc<dyn Middleware>> {
    let singleton = wiring.singleton_dependency()?;
    let scoped = wiring.scoped_dependency(activation.scope())?;
    Ok(Arc::new(GreetingMiddleware::new(
        singleton,
        scoped,
        wiring.body_limit(),
    )))
}
