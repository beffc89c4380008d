use crate::server::state::ApiState;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::{Json, response::IntoResponse};
use shortly_derive::{api_handler, api_model};
use shortly_domain::constants::SYSTEM_TAG;

#[api_model]
/// Liveness of the API process and its database.
struct Health {
    /// `up`, or `degraded` when the database does not answer
    status: &'static str,
    version: &'static str,
    /// Seconds since the API state was built
    uptime: u64,
    database: &'static str,
    /// Queued background tasks not yet picked up by a worker
    queued_tasks: usize,
}

#[api_handler(
    get,
    path = "/health",
    responses(
        (status = OK, description = "Service and database are up", body = Health),
        (status = SERVICE_UNAVAILABLE, description = "Database unreachable", body = Health),
    ),
    tag = SYSTEM_TAG,
)]
pub(super) async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let database_up = state.database.health().await.is_ok();
    let (code, status, database) =
        if database_up { (StatusCode::OK, "up", "up") } else { (StatusCode::SERVICE_UNAVAILABLE, "degraded", "down") };

    let body = Health {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started.elapsed().as_secs(),
        database,
        queued_tasks: state.tasks.queued(),
    };

    (
        code,
        [
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
            (header::PRAGMA, "no-cache"),
        ],
        Json(body),
    )
}
