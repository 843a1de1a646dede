use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pureroot::Activation;
use tracing::debug;

use super::Controller;
use crate::composition::Wiring;
use crate::errors::AppError;
use crate::models::{ScopedDependency, SingletonDependency};

pub struct HelloController {
    singleton: SingletonDependency,
    scoped: ScopedDependency,
}

impl HelloController {
    pub fn new(singleton: SingletonDependency, scoped: ScopedDependency) -> Self {
        Self { singleton, scoped }
    }

    pub fn greeting(&self) -> String {
        format!(
            "Hello from controller with {} and {}!",
            self.singleton, self.scoped
        )
    }
}

#[async_trait]
impl Controller for HelloController {
    async fn handle(&self, _request: Request) -> Result<Response, AppError> {
        let body = self.greeting();
        debug!(singleton = %self.singleton, scoped = %self.scoped, "Hello served");
        Ok((StatusCode::OK, body).into_response())
    }
}

/// Constructor registered under [`HELLO`](super::HELLO).
pub fn activate(
    wiring: &Wiring,
    activation: &mut Activation<'_>,
) -> pureroot::Result<Arc<dyn Controller>> {
    let singleton = wiring.singleton_dependency()?;
    let scoped = wiring.scoped_dependency(activation.scope())?;
    Ok(Arc::new(HelloController::new(singleton, scoped)))
}
