//! Gemini REST backend for [`GenerationService`].
//!
//! Each request asks for `application/json` output constrained by the
//! request's schema. The model id, temperature and output budget come from
//! the request's [`ModelProfile`](crate::agent::ModelProfile) unless an
//! override model is configured.
//!
//! # Example
//!
//! ```rust,no_run
//! use roadmap_pipeline::service::gemini::GeminiGenerationService;
//!
//! # fn example() -> Result<(), roadmap_pipeline::ServiceError> {
//! // From environment variables (GEMINI_API_KEY, optional GEMINI_MODEL)
//! let service = GeminiGenerationService::try_from_env()?;
//!
//! // Direct API key
//! let service = GeminiGenerationService::new("your-api-key");
//! # Ok(())
//! # }
//! ```

use super::{GenerationRequest, GenerationService, ServiceError};
use crate::agent::GeminiModel;
use crate::extract::parse_json_value;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::env;
use std::time::Duration;
use tracing::debug;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const ERROR_BODY_PREVIEW: usize = 500;

/// Generation backend that talks to the Gemini HTTP API.
#[derive(Clone)]
pub struct GeminiGenerationService {
    client: Client,
    api_key: String,
    model_override: Option<String>,
}

impl GeminiGenerationService {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model_override: None,
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// - `GEMINI_API_KEY` (required)
    /// - `GEMINI_MODEL` (optional, forces one model for every role)
    pub fn try_from_env() -> Result<Self, ServiceError> {
        let api_key = env::var("GEMINI_API_KEY").map_err(|_| {
            ServiceError::Fatal("GEMINI_API_KEY environment variable not set".to_string())
        })?;

        let mut service = Self::new(api_key);
        if let Ok(model) = env::var("GEMINI_MODEL") {
            let model = model
                .parse::<GeminiModel>()
                .map_err(ServiceError::Fatal)?;
            service = service.with_model_override(&model);
        }
        Ok(service)
    }

    /// Uses `model` for every request regardless of the role's profile.
    pub fn with_model_override(mut self, model: &GeminiModel) -> Self {
        self.model_override = Some(model.as_api_id().to_string());
        self
    }

    fn build_body(request: &GenerationRequest) -> GenerateContentRequest {
        let response_json_schema = request.schema.clone().map(strip_schema_meta);
        GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: request.prompt.clone(),
                }],
            }],
            system_instruction: (!request.system_prompt.is_empty()).then(|| Content {
                role: "system".to_string(),
                parts: vec![Part {
                    text: request.system_prompt.clone(),
                }],
            }),
            generation_config: GenerationConfig {
                temperature: request.profile.temperature,
                max_output_tokens: request.profile.max_output_tokens,
                response_mime_type: "application/json".to_string(),
                response_json_schema,
            },
        }
    }

    async fn send_request(
        &self,
        model: &str,
        body: &GenerateContentRequest,
    ) -> Result<String, ServiceError> {
        let url = format!("{BASE_URL}/{model}:generateContent");

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(body)
            .send()
            .await
            .map_err(|err| {
                let message = format!("Gemini API request failed: {err}");
                if err.is_connect() || err.is_timeout() || err.is_request() {
                    ServiceError::Network(message)
                } else {
                    ServiceError::Fatal(message)
                }
            })?;

        let status = response.status();
        let body_text = response
            .text()
            .await
            .map_err(|err| ServiceError::Network(format!("Failed to read Gemini response: {err}")))?;

        if !status.is_success() {
            return Err(map_http_error(status, &body_text));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body_text).map_err(|err| {
            ServiceError::Fatal(format!(
                "Failed to parse Gemini response: {err}\n\nResponse body:\n{}",
                preview(&body_text)
            ))
        })?;

        extract_text_response(parsed)
    }
}

#[async_trait]
impl GenerationService for GeminiGenerationService {
    async fn generate(&self, request: GenerationRequest) -> Result<JsonValue, ServiceError> {
        let model = self
            .model_override
            .as_deref()
            .unwrap_or(&request.profile.model);
        debug!(
            model,
            role = %request.role,
            max_output_tokens = request.profile.max_output_tokens,
            "Sending Gemini request"
        );

        let body = Self::build_body(&request);
        let text = self.send_request(model, &body).await?;
        parse_json_value(&text).map_err(|e| {
            ServiceError::SchemaValidation(format!(
                "Gemini returned unparsable JSON: {e}\n\n{}",
                preview(&text)
            ))
        })
    }
}

impl std::fmt::Debug for GeminiGenerationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiGenerationService")
            .field("model_override", &self.model_override)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    response_mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_json_schema: Option<JsonValue>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// Removes keys Gemini rejects from a schemars document.
fn strip_schema_meta(mut schema: JsonValue) -> JsonValue {
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
    }
    schema
}

fn extract_text_response(response: GenerateContentResponse) -> Result<String, ServiceError> {
    response
        .candidates
        .and_then(|mut candidates| candidates.pop())
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| {
            ServiceError::SchemaValidation(
                "Gemini API returned no text in the response candidates".into(),
            )
        })
}

/// Maps an HTTP failure to a [`ServiceError`].
///
/// Per-minute rate limits are transient. A `RESOURCE_EXHAUSTED` that names a
/// daily quota will not clear within the retry window.
fn map_http_error(status: StatusCode, body: &str) -> ServiceError {
    let (status_text, message) = serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| {
            (
                wrapper.error.status.unwrap_or_default(),
                wrapper.error.message.unwrap_or_else(|| body.to_string()),
            )
        })
        .unwrap_or_else(|_| (String::new(), body.to_string()));

    let detail = if status_text.is_empty() {
        format!("{}: {message}", status.as_u16())
    } else {
        format!("{} {status_text}: {message}", status.as_u16())
    };

    if status_text == "RESOURCE_EXHAUSTED" && body.contains("PerDay") {
        return ServiceError::QuotaExhausted(detail);
    }

    match status {
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::REQUEST_TIMEOUT
        | StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => ServiceError::Network(detail),
        _ => ServiceError::Fatal(detail),
    }
}

fn preview(text: &str) -> String {
    if text.len() <= ERROR_BODY_PREVIEW {
        return text.to_string();
    }
    let cut = (0..=ERROR_BODY_PREVIEW)
        .rev()
        .find(|i| text.is_char_boundary(*i))
        .unwrap_or(0);
    format!("{}... (truncated, total {} bytes)", &text[..cut], text.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentRole, ModelProfile};
    use serde_json::json;

    #[test]
    fn test_body_uses_profile() {
        let request = GenerationRequest::new(
            AgentRole::Validator,
            "You design learning paths.",
            "Topic: Rust",
            ModelProfile::for_role(AgentRole::Validator),
        )
        .with_schema(json!({"$schema": "http://json-schema.org/draft-07/schema#", "title": "X", "type": "object"}));

        let body = serde_json::to_value(GeminiGenerationService::build_body(&request)).unwrap();
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 3072);
        assert_eq!(
            body["generationConfig"]["responseJsonSchema"],
            json!({"type": "object"})
        );
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "You design learning paths.");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Topic: Rust");
    }

    #[test]
    fn test_response_parsing() {
        let parsed: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "{\"a\":"}, {"text": " 1}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text_response(parsed).unwrap(), "{\"a\": 1}");

        let empty: GenerateContentResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(matches!(
            extract_text_response(empty),
            Err(ServiceError::SchemaValidation(_))
        ));
    }

    #[test]
    fn test_map_http_error() {
        let rate_limited = r#"{"error": {"code": 429, "status": "RESOURCE_EXHAUSTED", "message": "Resource has been exhausted (e.g. check quota)."}}"#;
        assert!(matches!(
            map_http_error(StatusCode::TOO_MANY_REQUESTS, rate_limited),
            ServiceError::Network(_)
        ));

        let daily = r#"{"error": {"code": 429, "status": "RESOURCE_EXHAUSTED", "message": "Quota exceeded for metric: GenerateRequestsPerDayPerProjectPerModel-FreeTier"}}"#;
        assert!(map_http_error(StatusCode::TOO_MANY_REQUESTS, daily).is_quota_exhausted());

        assert!(matches!(
            map_http_error(StatusCode::SERVICE_UNAVAILABLE, "overloaded"),
            ServiceError::Network(_)
        ));

        let bad_key = r#"{"error": {"code": 400, "status": "INVALID_ARGUMENT", "message": "API key not valid"}}"#;
        let err = map_http_error(StatusCode::BAD_REQUEST, bad_key);
        assert_eq!(
            err,
            ServiceError::Fatal("400 INVALID_ARGUMENT: API key not valid".into())
        );
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let text = "é".repeat(400);
        let short = preview(&text);
        assert!(short.contains("truncated, total 800 bytes"));
    }
}
