//! Gemini-backed rewrite collaborator.

use crate::prompts::typesetter_prompt;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use textbook_core::{RewriteError, Rewriter};

const ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize, Debug, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize, Debug)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Text of the first candidate, parts concatenated.
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

/// Rewrites chunks through the Gemini `generateContent` endpoint.
///
/// Once the service rejects the request outright (bad key, unknown model)
/// later calls fail fast without another round trip.
pub struct GeminiRewriter {
    client: Client,
    url: String,
    api_key: String,
    disabled: AtomicBool,
}

impl GeminiRewriter {
    pub fn new(api_key: String, model: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("textbook/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: format!("{}/{}:generateContent", ENDPOINT, model),
            api_key,
            disabled: AtomicBool::new(false),
        })
    }

    fn unavailable(&self, detail: String) -> RewriteError {
        self.disabled.store(true, Ordering::Relaxed);
        RewriteError::Unavailable(detail)
    }
}

impl Rewriter for GeminiRewriter {
    fn rewrite(&self, text: &str) -> Result<String, RewriteError> {
        if self.disabled.load(Ordering::Relaxed) {
            return Err(RewriteError::Unavailable(
                "disabled after an earlier rejection".to_string(),
            ));
        }

        let prompt = typesetter_prompt(text);
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: &prompt }],
            }],
        };

        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .map_err(|e| RewriteError::Transient(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let detail = format!("HTTP {}: {}", status, body.trim());
            return Err(match classify(status) {
                Failure::Transient => RewriteError::Transient(detail),
                Failure::Rejected => RewriteError::Unavailable(detail),
                Failure::Permanent => self.unavailable(detail),
            });
        }

        let body: GenerateResponse = response
            .json()
            .map_err(|e| RewriteError::Transient(format!("malformed response: {}", e)))?;
        body.text()
            .ok_or_else(|| RewriteError::Transient("response contained no text".to_string()))
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Failure {
    /// Retry the same chunk.
    Transient,
    /// This chunk was refused; later chunks may still go through.
    Rejected,
    /// Credentials or model are wrong; stop calling for the rest of the run.
    Permanent,
}

/// Rate limits, timeouts and server errors are worth retrying. Auth and
/// unknown-model errors end the run's rewriting. Any other client error
/// only gives up on the current chunk.
fn classify(status: StatusCode) -> Failure {
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        Failure::Transient
    } else if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || status == StatusCode::NOT_FOUND
    {
        Failure::Permanent
    } else {
        Failure::Rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(classify(StatusCode::TOO_MANY_REQUESTS), Failure::Transient);
        assert_eq!(classify(StatusCode::SERVICE_UNAVAILABLE), Failure::Transient);
        assert_eq!(classify(StatusCode::UNAUTHORIZED), Failure::Permanent);
        assert_eq!(classify(StatusCode::NOT_FOUND), Failure::Permanent);
        assert_eq!(classify(StatusCode::FORBIDDEN), Failure::Permanent);
    }

    #[test]
    fn test_bad_request_only_rejects_one_chunk() {
        assert_eq!(classify(StatusCode::BAD_REQUEST), Failure::Rejected);
        assert_eq!(classify(StatusCode::PAYLOAD_TOO_LARGE), Failure::Rejected);
        assert_eq!(classify(StatusCode::UNPROCESSABLE_ENTITY), Failure::Rejected);
    }

    #[test]
    fn test_response_text_joins_parts() {
        let body: GenerateResponse = serde_json::from_str(
            r##"{"candidates":[{"content":{"parts":[{"text":"# Cells\n"},{"text":"Body"}],"role":"model"}}]}"##,
        )
        .unwrap();
        assert_eq!(body.text().as_deref(), Some("# Cells\nBody"));
    }

    #[test]
    fn test_blocked_response_has_no_text() {
        let body: GenerateResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert_eq!(body.text(), None);

        let empty: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"STOP"}]}"#).unwrap();
        assert_eq!(empty.text(), None);
    }

    #[test]
    fn test_request_shape() {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: "hello" }],
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
    }

    #[test]
    fn test_disabled_rewriter_fails_fast() {
        let rewriter =
            GeminiRewriter::new("key".to_string(), DEFAULT_MODEL, Duration::from_secs(1)).unwrap();
        rewriter.disabled.store(true, Ordering::Relaxed);
        assert!(matches!(
            rewriter.rewrite("text"),
            Err(RewriteError::Unavailable(_))
        ));
    }
}
