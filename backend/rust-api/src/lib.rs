use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;

pub use config::Config;
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        // Document events from the hosting event system
        .route(
            "/triggers",
            post(handlers::triggers::receive_trigger).layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::trigger_auth::trigger_secret_middleware,
            )),
        )
        .nest(
            "/admin",
            admin_routes().layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::auth::auth_middleware,
            )),
        )
        .with_state(app_state)
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/families", post(handlers::admin::create_family_account))
        .route("/staffs", post(handlers::admin::create_staff_account))
        .route(
            "/accounts/{uid}/reset-password",
            post(handlers::admin::reset_account_password),
        )
        .route("/accounts/{uid}", delete(handlers::admin::delete_account))
        .route_layer(middleware::from_fn(
            middlewares::auth::staff_guard_middleware,
        ))
}
