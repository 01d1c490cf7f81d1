//! Route configuration for the operational API.
//!
//! Assembles all handler routers under `/api`, mounts the generated
//! OpenAPI document and Swagger UI, then applies the middleware stack.

use axum::{Router, middleware};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::doc::ApiDoc;
use crate::api::handlers;
use crate::api::middleware::{logging_middleware, request_id_middleware};
use crate::state::EngineState;

/// Builds the application router with all routes and middleware.
///
/// # Middleware order (outermost first)
/// 1. Request ID assignment
/// 2. Request/response logging
/// 3. CORS
/// 4. Response compression
pub fn create_router(state: EngineState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .nest(
            "/api",
            OpenApiRouter::new()
                .merge(handlers::notifications::routes())
                .merge(handlers::connectivity::routes())
                .merge(handlers::queue::routes())
                .merge(handlers::health::routes()),
        )
        .split_for_parts();

    router
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}
