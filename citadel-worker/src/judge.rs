//! Claude client for timeline judgement.
//!
//! One batched Messages call with a JSON-schema-constrained output, so the
//! response is always an array of per-entry verdicts.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use citadel_common::{Error, Result};

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const CLAUDE_MODEL: &str = "claude-haiku-4-5";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const STRUCTURED_OUTPUTS_BETA: &str = "structured-outputs-2025-11-13";
const MAX_TOKENS: u32 = 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const SYSTEM_PROMPT: &str = include_str!("judge/system_prompt.txt");
const USER_CRITERIA: &str = include_str!("judge/user_criteria.txt");

/// One verdict from the model, keyed by the feed entry it judged.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Verdict {
    pub feed_entry_id: String,
    pub approved: bool,
}

#[derive(Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
    output_format: OutputFormat,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OutputFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    schema: serde_json::Value,
}

#[derive(Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

/// Constrain the output to `[{feed_entry_id, approved}]`.
fn output_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "feed_entry_id": {"type": "string"},
                "approved": {"type": "boolean"},
            },
            "required": ["feed_entry_id", "approved"],
        },
    })
}

/// Anthropic Messages client. Process-wide, safe to share.
pub struct ClaudeClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl ClaudeClient {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_api_url(DEFAULT_API_URL.to_string(), api_key)
    }

    /// Point the client somewhere else; tests use this to talk to a local
    /// stand-in server.
    pub fn with_api_url(api_url: String, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| Error::Internal(format!("error building claude client: {err}")))?;

        Ok(ClaudeClient {
            client,
            api_url,
            api_key,
        })
    }

    /// Judge the serialized entries against the reader's prompt.
    ///
    /// A 429 surfaces as `RateLimit` so workflow retry policy can back off;
    /// every other failure is `Internal` and non-retryable.
    pub async fn judge(&self, prompt: &str, entries_json: &str) -> Result<Vec<Verdict>> {
        let user_message = USER_CRITERIA
            .replace("{prompt}", prompt)
            .replace("{entries}", entries_json);

        let request = MessageRequest {
            model: CLAUDE_MODEL,
            max_tokens: MAX_TOKENS,
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: &user_message,
            }],
            output_format: OutputFormat {
                kind: "json_schema",
                schema: output_schema(),
            },
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("anthropic-beta", STRUCTURED_OUTPUTS_BETA)
            .json(&request)
            .send()
            .await
            .map_err(|err| Error::Internal(format!("claude request failed: {err}")))?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimit("claude rate limit hit".to_string()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Internal(format!("claude error ({status}): {body}")));
        }

        let message: MessageResponse = response
            .json()
            .await
            .map_err(|err| Error::Internal(format!("error decoding claude response: {err}")))?;

        let mut raw = String::new();
        for block in message.content {
            if let Some(text) = block.text {
                raw.push_str(&text);
            }
        }

        serde_json::from_str(&raw)
            .map_err(|err| Error::Internal(format!("error parsing claude judgements: {err}")))
    }
}
