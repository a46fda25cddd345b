//! Application setup and server configuration.

use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware,
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::kernel::ServerDeps;
use crate::server::middleware::auth_middleware;
use crate::server::routes::{self, health_handler};

/// Build the Axum application router.
///
/// Every request passes through the auth middleware, which resolves the
/// bearer token (when present) into an `AuthUser` extension; handlers that
/// need authentication extract it and fail with 401 when absent.
pub fn build_app(deps: ServerDeps) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    let identity_for_middleware = deps.identity.clone();

    Router::new()
        .nest("/auth", routes::auth::router())
        .nest("/users", routes::users::router())
        .nest("/categories", routes::categories::router())
        .nest("/reports", routes::reports::router())
        .nest("/matches", routes::matches::router())
        .nest("/claims", routes::claims::router())
        .route("/health", get(health_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(middleware::from_fn(move |req, next| {
            auth_middleware(identity_for_middleware.clone(), req, next)
        }))
        .layer(Extension(deps))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
