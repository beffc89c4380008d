use crate::Assistant;
use crate::error::AssistantError;
use crate::models::{Answer, Question};
use axum::Json;
use axum::extract::State;
use shortly_derive::api_handler;
use shortly_domain::constants::ASSISTANT_TAG;
use shortly_kernel::server::{ApiError, ApiState};

#[api_handler(
    post,
    path = "/api/ask",
    request_body = Question,
    responses(
        (status = OK, body = Answer),
        (status = BAD_REQUEST, description = "Empty question"),
        (status = SERVICE_UNAVAILABLE, description = "LLM service unavailable"),
    ),
    tag = ASSISTANT_TAG,
)]
pub(crate) async fn ask(
    State(state): State<ApiState>,
    Json(payload): Json<Question>,
) -> Result<Json<Answer>, ApiError> {
    let assistant = state.try_get_slice::<Assistant>()?;
    if payload.question.trim().is_empty() {
        return Err(AssistantError::Validation { message: "Question cannot be empty".into(), context: None }.into());
    }

    let answer = assistant.client().ask(&payload.question).await?;
    Ok(Json(Answer { question: payload.question, answer }))
}
