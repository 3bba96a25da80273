//! Remote content API trait and the provider-neutral request/response shapes.

use crate::error::Result;
use crate::image::types::AspectRatio;
use async_trait::async_trait;

/// Image model tiers offered by the remote API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImageModel {
    /// Fast, economical first-pass generation.
    #[default]
    Standard,
    /// Highest quality, used for upscaling.
    HighQuality,
}

impl ImageModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "gemini-2.5-flash-image",
            Self::HighQuality => "gemini-3-pro-image-preview",
        }
    }
}

/// Output resolution that can be requested from the high-quality model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSize {
    /// 4K output.
    FourK,
}

impl ImageSize {
    /// Returns the API label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FourK => "4K",
        }
    }
}

/// Inline image payload as exchanged with the remote API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    /// Mime type, possibly empty when the remote omits it.
    pub mime_type: String,
    /// Base64-encoded payload.
    pub data: String,
}

/// A part of a content request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPart {
    /// Prompt text.
    Text(String),
    /// Reference image.
    InlineImage(InlineImage),
}

/// A request for image content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRequest {
    /// Model to call.
    pub model: ImageModel,
    /// Ordered request parts.
    pub parts: Vec<RequestPart>,
    /// Aspect ratio constraint.
    pub aspect_ratio: AspectRatio,
    /// Requested output size; `None` leaves the model default.
    pub image_size: Option<ImageSize>,
}

/// A part of a content reply. A part may carry text, an image, or neither.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponsePart {
    /// Commentary text.
    pub text: Option<String>,
    /// Inline image payload.
    pub inline_image: Option<InlineImage>,
}

/// The reply to a [`ContentRequest`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentResponse {
    /// Parts of the first candidate, in order.
    pub parts: Vec<ResponsePart>,
}

impl ContentResponse {
    /// Returns the first part carrying a non-empty inline image.
    pub fn first_inline_image(&self) -> Option<&InlineImage> {
        self.parts
            .iter()
            .filter_map(|part| part.inline_image.as_ref())
            .find(|image| !image.data.is_empty())
    }
}

/// Trait for remote image content backends.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Sends one content request authenticated with `api_key`.
    async fn generate_content(
        &self,
        api_key: &str,
        request: &ContentRequest,
    ) -> Result<ContentResponse>;

    /// Returns the name of this backend for display.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(data: &str) -> ResponsePart {
        ResponsePart {
            text: None,
            inline_image: Some(InlineImage {
                mime_type: "image/png".into(),
                data: data.into(),
            }),
        }
    }

    #[test]
    fn test_image_model_as_str() {
        assert_eq!(ImageModel::Standard.as_str(), "gemini-2.5-flash-image");
        assert_eq!(
            ImageModel::HighQuality.as_str(),
            "gemini-3-pro-image-preview"
        );
        assert_eq!(ImageSize::FourK.as_str(), "4K");
    }

    #[test]
    fn test_first_inline_image_skips_text_and_empty_parts() {
        let response = ContentResponse {
            parts: vec![
                ResponsePart {
                    text: Some("Here is your image".into()),
                    inline_image: None,
                },
                image(""),
                image("first"),
                image("second"),
            ],
        };
        assert_eq!(response.first_inline_image().unwrap().data, "first");
    }

    #[test]
    fn test_first_inline_image_none() {
        let response = ContentResponse {
            parts: vec![ResponsePart {
                text: Some("I cannot draw that".into()),
                inline_image: None,
            }],
        };
        assert!(response.first_inline_image().is_none());
        assert!(ContentResponse::default().first_inline_image().is_none());
    }
}
