use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::composition::CompositionRoot;
use crate::pipeline::{
    ControllerSlot, MiddlewareSlot, activate_middleware, dispatch_controller, request_scope,
};

/// Builds the service for every route and middleware the root declares.
pub fn router(root: Arc<CompositionRoot>) -> Router {
    let mut router = Router::new();
    for route in root.routes() {
        let slot = ControllerSlot::new(root.clone(), route.controller.clone());
        router = router.route(&route.path, get(dispatch_controller).with_state(slot));
    }

    if root.routes().is_empty() {
        return router.layer(TraceLayer::new_for_http());
    }

    // later layers wrap earlier ones, so add the innermost first;
    // route layers leave the 404 fallback outside the pipeline
    for kind in root.pipeline().iter().rev() {
        let slot = MiddlewareSlot::new(root.clone(), kind.clone());
        router = router.route_layer(from_fn_with_state(slot, activate_middleware));
    }

    router
        .route_layer(from_fn_with_state(root, request_scope))
        .layer(TraceLayer::new_for_http())
}
