//! Gemini (Google) image content backend.

use crate::error::{parse_retry_after, sanitize_error_message, RemoteError, Result};
use crate::image::provider::{
    ContentRequest, ContentResponse, ImageBackend, InlineImage, RequestPart, ResponsePart,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Default Gemini REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Builder for GeminiBackend.
#[derive(Debug, Clone, Default)]
pub struct GeminiBackendBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
}

impl GeminiBackendBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the API base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets a per-request timeout. Requests never time out by default.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the backend.
    pub fn build(self) -> Result<GeminiBackend> {
        let mut client = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            client = client.timeout(timeout);
        }

        Ok(GeminiBackend {
            client: client.build()?,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

/// Gemini image content backend.
pub struct GeminiBackend {
    client: reqwest::Client,
    base_url: String,
}

impl GeminiBackend {
    /// Creates a new `GeminiBackendBuilder`.
    pub fn builder() -> GeminiBackendBuilder {
        GeminiBackendBuilder::new()
    }

    async fn generate_impl(
        &self,
        api_key: &str,
        request: &ContentRequest,
    ) -> Result<ContentResponse> {
        let start = Instant::now();

        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url,
            request.model.as_str(),
        );

        let body = GeminiRequest::from_content_request(request);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text, &headers).into());
        }

        let gemini_response: GeminiResponse = response.json().await?;
        let content = gemini_response.into_content()?;

        tracing::debug!(
            model = request.model.as_str(),
            parts = content.parts.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "gemini response received"
        );

        Ok(content)
    }
}

#[async_trait]
impl ImageBackend for GeminiBackend {
    async fn generate_content(
        &self,
        api_key: &str,
        request: &ContentRequest,
    ) -> Result<ContentResponse> {
        self.generate_impl(api_key, request).await
    }

    fn name(&self) -> &str {
        "Gemini (Google)"
    }
}

/// Maps a non-2xx reply to a remote error, keeping the API's own message.
fn parse_error(status: u16, text: &str, headers: &reqwest::header::HeaderMap) -> RemoteError {
    let message = serde_json::from_str::<GeminiErrorEnvelope>(text)
        .ok()
        .and_then(|envelope| envelope.error.message)
        .map(|message| sanitize_error_message(&message))
        .unwrap_or_else(|| sanitize_error_message(text));

    match status {
        429 => RemoteError::RateLimited {
            message,
            retry_after: parse_retry_after(headers).map(Duration::from_secs),
        },
        // Safety rejections of the request itself come back as 400.
        400 if is_safety_message(&message) => RemoteError::ContentBlocked(message),
        _ => RemoteError::Api { status, message },
    }
}

fn is_safety_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("safety") || lower.contains("prohibited") || lower.contains("blocked")
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

/// A part in a Gemini request - can be text or inline image data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    image_config: GeminiImageConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiImageConfig {
    aspect_ratio: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_size: Option<&'static str>,
}

impl GeminiRequest {
    fn from_content_request(req: &ContentRequest) -> Self {
        let parts = req
            .parts
            .iter()
            .map(|part| match part {
                RequestPart::Text(text) => GeminiRequestPart::Text { text: text.clone() },
                RequestPart::InlineImage(image) => GeminiRequestPart::InlineData {
                    inline_data: GeminiInlineData {
                        mime_type: image.mime_type.clone(),
                        data: image.data.clone(),
                    },
                },
            })
            .collect();

        Self {
            contents: vec![GeminiContent { parts }],
            generation_config: GeminiConfig {
                image_config: GeminiImageConfig {
                    aspect_ratio: req.aspect_ratio.as_str(),
                    image_size: req.image_size.map(|size| size.as_str()),
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

impl GeminiResponse {
    /// Converts the reply into the parts of its first candidate.
    ///
    /// Safety blocks become errors. A reply with no candidate or no content
    /// yields no parts, which callers report as a missing image.
    fn into_content(self) -> std::result::Result<ContentResponse, RemoteError> {
        // Check prompt_feedback for blocks (returned as HTTP 200)
        if let Some(feedback) = self.prompt_feedback {
            if let Some(reason) = feedback.block_reason {
                let msg = feedback
                    .block_reason_message
                    .unwrap_or_else(|| format!("Prompt blocked: {}", reason));
                return Err(RemoteError::ContentBlocked(msg));
            }
        }

        let Some(candidate) = self.candidates.into_iter().next() else {
            return Ok(ContentResponse::default());
        };

        if let Some(ref finish_reason) = candidate.finish_reason {
            if matches!(
                finish_reason.as_str(),
                "SAFETY"
                    | "IMAGE_SAFETY"
                    | "IMAGE_PROHIBITED_CONTENT"
                    | "PROHIBITED_CONTENT"
                    | "BLOCKLIST"
            ) {
                return Err(RemoteError::ContentBlocked(format!(
                    "Content blocked by Gemini safety filter: {}",
                    finish_reason
                )));
            }
        }

        let parts = candidate
            .content
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .map(|part| ResponsePart {
                text: part.text,
                inline_image: part.inline_data.map(|inline| InlineImage {
                    mime_type: inline.mime_type.unwrap_or_default(),
                    data: inline.data.unwrap_or_default(),
                }),
            })
            .collect();

        Ok(ContentResponse { parts })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    #[serde(default)]
    message: Option<String>,
}
