//! Curation prompt management.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rustrict::CensorStr;
use serde::{Deserialize, Serialize};

use citadel_common::models::Prompt;
use citadel_common::{DbTime, Error};

use super::error::ApiResult;
use super::server::AppState;

/// Prompt text goes straight to the model, so keep it bounded and clean.
const MAX_PROMPT_BYTES: usize = 5024;

#[derive(Debug, Serialize)]
pub struct PromptResp {
    pub id: String,
    pub content: String,
    pub active: bool,
    pub created_at: DbTime,
}

impl From<Prompt> for PromptResp {
    fn from(prompt: Prompt) -> Self {
        PromptResp {
            id: prompt.id,
            content: prompt.content,
            active: prompt.active,
            created_at: prompt.created_at,
        }
    }
}

/// GET /api/prompt: the active prompt, or 204 when curation is off.
pub async fn get_prompt(State(state): State<AppState>) -> ApiResult<Response> {
    match state.store.active_prompt().await? {
        None => Ok(StatusCode::NO_CONTENT.into_response()),
        Some(prompt) => Ok(Json(PromptResp::from(prompt)).into_response()),
    }
}

#[derive(Debug, Deserialize)]
pub struct SetPromptReq {
    #[serde(default)]
    prompt: String,
}

/// POST /api/prompt/precheck: run the validation the persisted call will
/// run, so the frontend can fail fast.
pub async fn precheck_prompt(Json(body): Json<SetPromptReq>) -> ApiResult<Json<serde_json::Value>> {
    validate_prompt(&body.prompt)?;
    Ok(Json(serde_json::json!({})))
}

/// PUT /api/prompt: validate and persist a new active prompt.
pub async fn set_prompt(
    State(state): State<AppState>,
    Json(body): Json<SetPromptReq>,
) -> ApiResult<Json<PromptResp>> {
    validate_prompt(&body.prompt)?;

    let prompt = state.store.set_prompt(&body.prompt).await?;
    tracing::info!(prompt_id = %prompt.id, "active prompt replaced");

    Ok(Json(PromptResp::from(prompt)))
}

fn validate_prompt(prompt: &str) -> std::result::Result<(), Error> {
    if prompt.is_empty() {
        return Err(Error::invalid("prompt is required").with_detail("prompt", "is required"));
    }
    if prompt.len() > MAX_PROMPT_BYTES {
        return Err(Error::unprocessable("prompt too long"));
    }
    if prompt.is_inappropriate() {
        return Err(Error::unprocessable("profanity detected in prompt"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_reasonable_prompt() {
        assert!(validate_prompt("only posts about rust and databases").is_ok());
    }

    #[test]
    fn rejects_empty_prompts() {
        assert_eq!(validate_prompt("").unwrap_err().status(), 400);
    }

    #[test]
    fn rejects_oversized_prompts() {
        let long = "a".repeat(MAX_PROMPT_BYTES + 1);
        assert_eq!(validate_prompt(&long).unwrap_err().status(), 422);

        let exactly = "a".repeat(MAX_PROMPT_BYTES);
        assert!(validate_prompt(&exactly).is_ok());
    }

    #[test]
    fn rejects_profanity() {
        assert_eq!(validate_prompt("only the fucking good posts").unwrap_err().status(), 422);
    }
}
