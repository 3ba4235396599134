//! Direct REST client for the Gemini `generateContent` endpoint, behind
//! the [`ModelCapability`] trait so the orchestrator can be driven by
//! any text/vision backend.
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::EngineError;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

// A hung request must not pin a session's awaiting flag forever.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// One piece of a model request: plain text or an inline binary payload
/// with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    Inline { data: String, mime_type: String },
}

#[async_trait]
pub trait ModelCapability: Send + Sync {
    /// Generates a whole response for the given parts, or fails. Callers
    /// treat every failure kind the same way.
    async fn generate(&self, model: &str, parts: &[ContentPart]) -> Result<String, EngineError>;
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
        }
    }

    /// Points the client at a different endpoint, for tests and proxies.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ModelCapability for GeminiClient {
    async fn generate(&self, model: &str, parts: &[ContentPart]) -> Result<String, EngineError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: parts.iter().map(Part::from).collect(),
            }],
        };

        let url = format!(
            "{}/{model}:generateContent?key={key}",
            self.base_url,
            model = model,
            key = self.api_key
        );

        let response = self
            .client
            .post(url)
            .timeout(REQUEST_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::Model {
                message: format!("request failed: {e}"),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Model {
                message: format!("status {}: {}", status, error_message(&body)),
            });
        }

        let parsed: GenerateContentResponse =
            response.json().await.map_err(|e| EngineError::Model {
                message: format!("failed to parse response: {e}"),
            })?;

        extract_text(parsed).ok_or_else(|| EngineError::Model {
            message: "no text in response candidates".to_string(),
        })
    }
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

impl From<&ContentPart> for Part {
    fn from(part: &ContentPart) -> Self {
        match part {
            ContentPart::Text(text) => Part::Text { text: text.clone() },
            ContentPart::Inline { data, mime_type } => Part::InlineData {
                inline_data: InlineData {
                    mime_type: mime_type.clone(),
                    data: data.clone(),
                },
            },
        }
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

fn extract_text(response: GenerateContentResponse) -> Option<String> {
    response
        .candidates
        .and_then(|mut candidates| candidates.pop())
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().find_map(|part| part.text))
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorWrapper>(body)
        .ok()
        .and_then(|wrapper| wrapper.error.message)
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_wire_shape_matches_the_api() {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![
                    Part::from(&ContentPart::Text("hi".to_string())),
                    Part::from(&ContentPart::Inline {
                        data: "dGVzdA==".to_string(),
                        mime_type: "image/png".to_string(),
                    }),
                ],
            }],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
        let inline = &json["contents"][0]["parts"][1]["inlineData"];
        assert_eq!(inline["mimeType"], "image/png");
        assert_eq!(inline["data"], "dGVzdA==");
    }

    #[test]
    fn extracts_first_candidate_text() {
        let payload = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "4"}]}}
            ]
        }"#;
        let parsed: GenerateContentResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(extract_text(parsed), Some("4".to_string()));
    }

    #[test]
    fn empty_candidates_yield_none() {
        let parsed: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(extract_text(parsed), None);
    }

    #[test]
    fn error_body_message_is_extracted() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid"}}"#;
        assert_eq!(error_message(body), "API key not valid");
        assert_eq!(error_message("plain failure"), "plain failure");
    }
}
