//! Image generation: record types, the remote backend seam, and the request client.

mod client;
mod provider;
pub mod providers;
#[cfg(test)]
pub(crate) mod testing;
mod types;

pub use client::ImageRequestClient;
pub use provider::{
    ContentRequest, ContentResponse, ImageBackend, ImageModel, ImageSize, InlineImage,
    RequestPart, ResponsePart,
};
pub use types::{
    AspectRatio, GeneratedImageRecord, ImageData, ImageFormat, ResolutionTier, DEFAULT_MIME_TYPE,
};
