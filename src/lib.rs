#![warn(missing_docs)]
//! PixelGen - prompt-to-image generation with a persisted local history.
//!
//! The crate wraps a remote generative-image API behind two operations,
//! *generate* (text to image) and *upscale* (regenerate a prior image at
//! 4K), and keeps every result in a newest-first history stored on disk.
//!
//! # Quick Start
//!
//! ```no_run
//! use pixelgen::{AspectRatio, Config, GenerationController, HistoryStore, ImageRequestClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> pixelgen::Result<()> {
//!     let config = Config::from_env();
//!     let client = ImageRequestClient::new(
//!         Arc::new(config.backend()?),
//!         Arc::new(config.credentials()),
//!     );
//!     let controller =
//!         GenerationController::new(client, HistoryStore::open(&config.history_path));
//!
//!     let image = controller
//!         .generate("A futuristic city in the clouds", AspectRatio::Landscape)
//!         .await?;
//!     let upscaled = controller.upscale(&image.id).await?;
//!     upscaled.export_to(".")?;
//!     Ok(())
//! }
//! ```
//!
//! # Components
//!
//! - [`ImageRequestClient`]: maps generate/upscale onto an [`ImageBackend`]
//!   (the Gemini REST API by default).
//! - [`HistoryStore`]: newest-first record list persisted as one JSON file.
//! - [`GenerationController`]: single-flight guards per operation, error
//!   banner, and history updates.
//! - [`CredentialSelector`]: optional interactive key picker consulted
//!   before upscaling.

pub mod config;
pub mod controller;
pub mod credential;
mod error;
pub mod history;
pub mod image;

// Re-export error types at crate root
pub use error::{Operation, PixelGenError, RemoteError, Result};

pub use config::Config;
pub use controller::{FlightState, GenerationController};
pub use credential::{AlwaysSelected, CredentialSelector, Credentials, TerminalKeyPicker};
pub use history::HistoryStore;
pub use image::providers::{GeminiBackend, GeminiBackendBuilder};
pub use image::{
    AspectRatio, GeneratedImageRecord, ImageBackend, ImageData, ImageFormat, ImageRequestClient,
    ResolutionTier,
};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{PixelGenError, Result};
    pub use crate::image::{AspectRatio, GeneratedImageRecord, ImageBackend, ImageRequestClient};
    pub use crate::{Config, GenerationController, HistoryStore};
}
