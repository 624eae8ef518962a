pub mod auth;
pub mod auth_handlers;
pub mod flash;
pub mod pages;

use axum::{
    middleware,
    routing::get,
    Router,
};
use tower_cookies::CookieManagerLayer;
use tower_http::trace::TraceLayer;

use crate::security::request_id::request_id_middleware;
use crate::shared::state::AppState;
use crate::tickets::configure_tickets_routes;

pub use auth::{CurrentUser, RequestContext};

/// Builds the full application router.
///
/// Layers run outermost first: request id, tracing, cookies, then the
/// session lookup that fills in [`RequestContext`]. Guards sit on the route
/// groups that need them.
pub fn create_router(app_state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(pages::home))
        .route(
            "/register/",
            get(auth_handlers::register_page).post(auth_handlers::register_submit),
        )
        .route(
            "/login/",
            get(auth_handlers::login_page).post(auth_handlers::login_submit),
        )
        .route("/health", get(pages::health));

    let protected_routes = Router::new()
        .route(
            "/logout/",
            get(auth_handlers::logout).post(auth_handlers::logout),
        )
        .route("/forbidden/", get(pages::forbidden))
        .route_layer(middleware::from_fn(auth::require_login));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(configure_tickets_routes())
        .fallback(pages::fallback)
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth::context_middleware,
        ))
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(app_state)
}
