//! Request client for the two image operations: generate and upscale.

use crate::credential::Credentials;
use crate::error::{Operation, PixelGenError, Result};
use crate::image::provider::{
    ContentRequest, ContentResponse, ImageBackend, ImageModel, ImageSize, InlineImage, RequestPart,
};
use crate::image::types::{AspectRatio, GeneratedImageRecord, ImageData, ResolutionTier};
use std::sync::Arc;
use std::time::Instant;

/// Maps generate/upscale calls onto the remote backend.
///
/// Holds no state of its own; the credential is resolved on every call.
#[derive(Clone)]
pub struct ImageRequestClient {
    backend: Arc<dyn ImageBackend>,
    credentials: Arc<Credentials>,
}

impl ImageRequestClient {
    /// Creates a client over `backend`.
    pub fn new(backend: Arc<dyn ImageBackend>, credentials: Arc<Credentials>) -> Self {
        Self {
            backend,
            credentials,
        }
    }

    /// Generates a standard-resolution image from a text prompt.
    pub async fn generate(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<GeneratedImageRecord> {
        let api_key = self.credentials.require()?;

        let request = ContentRequest {
            model: ImageModel::Standard,
            parts: vec![RequestPart::Text(prompt.to_string())],
            aspect_ratio,
            image_size: None,
        };
        let response = self.send(Operation::Generate, &api_key, &request).await?;
        let image = extract_image(Operation::Generate, &response)?;

        Ok(GeneratedImageRecord::new(
            image,
            prompt,
            aspect_ratio,
            ResolutionTier::Standard,
        ))
    }

    /// Regenerates `source` at 4K with the high-quality model.
    ///
    /// Returns a new record; `source` is not modified.
    pub async fn upscale(&self, source: &GeneratedImageRecord) -> Result<GeneratedImageRecord> {
        let api_key = self.credentials.require()?;
        let (mime_type, payload) = source.image_data.split()?;

        let request = ContentRequest {
            model: ImageModel::HighQuality,
            parts: vec![
                RequestPart::InlineImage(InlineImage {
                    mime_type: mime_type.to_string(),
                    data: payload.to_string(),
                }),
                RequestPart::Text(source.prompt.clone()),
            ],
            aspect_ratio: source.aspect_ratio,
            image_size: Some(ImageSize::FourK),
        };
        let response = self.send(Operation::Upscale, &api_key, &request).await?;
        let image = extract_image(Operation::Upscale, &response)?;

        Ok(GeneratedImageRecord::new(
            image,
            source.prompt.clone(),
            source.aspect_ratio,
            ResolutionTier::Upscaled,
        ))
    }

    async fn send(
        &self,
        operation: Operation,
        api_key: &str,
        request: &ContentRequest,
    ) -> Result<ContentResponse> {
        let start = Instant::now();
        let result = self.backend.generate_content(api_key, request).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(response) => tracing::info!(
                operation = operation.as_str(),
                backend = self.backend.name(),
                model = request.model.as_str(),
                parts = response.parts.len(),
                duration_ms,
                "image request completed"
            ),
            Err(e) => tracing::error!(
                operation = operation.as_str(),
                backend = self.backend.name(),
                model = request.model.as_str(),
                duration_ms,
                "image request failed: {e}"
            ),
        }
        result
    }
}

/// Takes the first inline image part; text and later parts are ignored.
fn extract_image(operation: Operation, response: &ContentResponse) -> Result<ImageData> {
    response
        .first_inline_image()
        .map(|image| ImageData::from_base64(&image.mime_type, &image.data))
        .ok_or(PixelGenError::NoImageInResponse(operation))
}
