use axum::Router;
use axum::http::HeaderValue;
use shortly::kernel::server::ApiState;
use std::time::Duration;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_scalar::{Scalar, Servable};

const CORS_MAX_AGE: Duration = Duration::from_secs(3600);

#[derive(OpenApi)]
#[openapi(info(title = "Shortly API", description = "URL shortener, chat, mail parsing and assistant"))]
struct ApiDoc;

pub(crate) fn init(state: ApiState) -> Router {
    let cors_layer = cors(&state.config.server.cors_origins);

    let (routes, api_doc) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .merge(shortly::router())
        .with_state(state)
        .split_for_parts();

    Router::new()
        .merge(routes)
        .merge(Scalar::with_url("/api-docs", api_doc))
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

/// Credentialed CORS for the configured browser origins.
///
/// Methods and headers mirror the preflight request, since wildcards are not
/// allowed together with credentials. Unparseable origins are skipped.
#[must_use]
pub fn cors(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "Invalid CORS origin in config; skipping");
                None
            },
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
        .max_age(CORS_MAX_AGE)
}
