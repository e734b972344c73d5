// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    handlers::{certificates, questions, responses},
    openapi::ApiDoc,
    state::AppState,
};

/// Assembles the main application router.
///
/// * Merges the question, response and certificate routes.
/// * Serves the OpenAPI document and Swagger UI.
/// * Applies global middleware (body limit, Trace, CORS).
/// * Injects global state (pool, config, storage).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    let question_routes = Router::new()
        .route("/questions/", get(questions::list_questions))
        .route("/questions/{id}/", get(questions::get_question));

    let response_routes = Router::new()
        .route(
            "/responses/",
            get(responses::list_responses).post(responses::create_response),
        )
        .route(
            "/responses/{id}/",
            get(responses::get_response)
                .put(responses::update_response)
                .patch(responses::partial_update_response)
                .delete(responses::delete_response),
        );

    let certificate_routes = Router::new()
        .route("/upload-certificate/", post(certificates::upload_certificates))
        .route(
            "/download-certificate/{id}/",
            get(certificates::download_certificate),
        )
        .route(
            "/certificates/download/",
            get(certificates::download_certificates),
        );

    let max_upload_bytes = state.config.max_upload_bytes;

    Router::new()
        .merge(question_routes)
        .merge(response_routes)
        .merge(certificate_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Global Middleware (applied from outside in)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
