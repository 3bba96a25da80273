//! Core types for generated images and their history records.

use crate::error::{PixelGenError, Result};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Mime type assumed when the remote reply or a data URL omits one.
pub const DEFAULT_MIME_TYPE: &str = "image/png";

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format (modern, efficient).
    WebP,
}

impl ImageFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    /// Maps a MIME type to a known format.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.trim().to_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// Aspect ratios offered for generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 1:1 square aspect ratio.
    #[default]
    #[serde(rename = "1:1")]
    Square,
    /// 16:9 landscape (widescreen) aspect ratio.
    #[serde(rename = "16:9")]
    Landscape,
    /// 9:16 portrait (tall) aspect ratio.
    #[serde(rename = "9:16")]
    Portrait,
    /// 4:3 wide aspect ratio.
    #[serde(rename = "4:3")]
    Wide,
    /// 3:4 tall aspect ratio.
    #[serde(rename = "3:4")]
    Tall,
}

impl AspectRatio {
    /// All supported ratios, in picker order.
    pub const ALL: [AspectRatio; 5] = [
        Self::Square,
        Self::Landscape,
        Self::Portrait,
        Self::Wide,
        Self::Tall,
    ];

    /// Returns the aspect ratio as a string (e.g., "16:9").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
            Self::Wide => "4:3",
            Self::Tall => "3:4",
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == s.trim())
            .ok_or_else(|| format!("unsupported aspect ratio: {s}"))
    }
}

/// Resolution tier of a record.
///
/// Stored as the resolution label the remote API understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResolutionTier {
    /// First-pass generation.
    #[default]
    #[serde(rename = "1K", alias = "2K")]
    Standard,
    /// Regenerated at 4K from a prior record.
    #[serde(rename = "4K")]
    Upscaled,
}

impl ResolutionTier {
    /// Returns the resolution label ("1K" or "4K").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "1K",
            Self::Upscaled => "4K",
        }
    }
}

impl std::fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An inline image resource held as a `data:<mime>;base64,<payload>` URL.
///
/// The string is kept verbatim so that a malformed value loaded from
/// storage survives until something tries to decode it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageData(String);

impl ImageData {
    /// Bundles an already base64-encoded payload with its mime type.
    pub fn from_base64(mime_type: &str, payload: &str) -> Self {
        let mime_type = if mime_type.is_empty() {
            DEFAULT_MIME_TYPE
        } else {
            mime_type
        };
        Self(format!("data:{mime_type};base64,{payload}"))
    }

    /// Encodes raw bytes into a data URL.
    pub fn from_bytes(mime_type: &str, data: &[u8]) -> Self {
        Self::from_base64(
            mime_type,
            &base64::engine::general_purpose::STANDARD.encode(data),
        )
    }

    /// Wraps a data URL string without validating it.
    pub fn from_data_url(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Returns the data URL.
    pub fn as_data_url(&self) -> &str {
        &self.0
    }

    /// Splits the data URL into its mime type and base64 payload.
    ///
    /// The URL must contain exactly one comma. A missing mime type in the
    /// header falls back to [`DEFAULT_MIME_TYPE`].
    pub fn split(&self) -> Result<(&str, &str)> {
        let mut pieces = self.0.split(',');
        let (header, payload) = match (pieces.next(), pieces.next(), pieces.next()) {
            (Some(header), Some(payload), None) => (header, payload),
            _ => {
                return Err(PixelGenError::InvalidSourceImage(
                    "Invalid image data URL".into(),
                ))
            }
        };

        let mime_type = header
            .split_once(':')
            .and_then(|(_, rest)| rest.split_once(';'))
            .map(|(mime, _)| mime)
            .filter(|mime| !mime.is_empty())
            .unwrap_or(DEFAULT_MIME_TYPE);

        Ok((mime_type, payload))
    }

    /// Returns the mime type and decoded binary payload.
    pub fn decode(&self) -> Result<(String, Vec<u8>)> {
        let (mime_type, payload) = self.split()?;
        let data = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| PixelGenError::InvalidSourceImage(e.to_string()))?;
        Ok((mime_type.to_string(), data))
    }

    /// Returns true if no payload is present.
    pub fn is_empty(&self) -> bool {
        self.split().map(|(_, payload)| payload.is_empty()).unwrap_or(true)
    }
}

/// One generated or upscaled image plus its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImageRecord {
    /// Unique identifier (random UUID).
    pub id: String,
    /// The image as an inline data URL.
    #[serde(rename = "url")]
    pub image_data: ImageData,
    /// The prompt that produced this image.
    pub prompt: String,
    /// Aspect ratio requested for the image.
    pub aspect_ratio: AspectRatio,
    /// Creation time.
    #[serde(rename = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    /// Standard for fresh generations, Upscaled for upscale results.
    #[serde(rename = "resolution", default)]
    pub resolution_tier: ResolutionTier,
}

impl GeneratedImageRecord {
    /// Creates a record with a fresh id and the current time.
    pub fn new(
        image_data: ImageData,
        prompt: impl Into<String>,
        aspect_ratio: AspectRatio,
        resolution_tier: ResolutionTier,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            image_data,
            prompt: prompt.into(),
            aspect_ratio,
            created_at: Utc::now(),
            resolution_tier,
        }
    }

    /// Returns the file name used when exporting this record's image.
    pub fn download_file_name(&self) -> String {
        let format = self
            .image_data
            .split()
            .ok()
            .and_then(|(mime, _)| ImageFormat::from_mime_type(mime))
            .or_else(|| {
                self.image_data
                    .decode()
                    .ok()
                    .and_then(|(_, data)| ImageFormat::from_magic_bytes(&data))
            })
            .unwrap_or_default();
        format!("pixelgen-{}.{}", self.id, format.extension())
    }

    /// Writes the decoded image into `dir`, returning the written path.
    pub fn export_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let (_, data) = self.image_data.decode()?;
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.download_file_name());
        std::fs::write(&path, data)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_MAGIC: [u8; 12] = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0];
    const WEBP_MAGIC: [u8; 12] = *b"RIFF\x00\x00\x00\x00WEBP";

    #[test]
    fn test_format_from_magic_bytes() {
        assert_eq!(
            ImageFormat::from_magic_bytes(&PNG_MAGIC),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&JPEG_MAGIC),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&WEBP_MAGIC),
            Some(ImageFormat::WebP)
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"short"), None);
    }

    #[test]
    fn test_aspect_ratio_round_trips_through_str() {
        for ratio in AspectRatio::ALL {
            assert_eq!(ratio.as_str().parse::<AspectRatio>().unwrap(), ratio);
        }
        assert!("21:9".parse::<AspectRatio>().is_err());
        assert_eq!(AspectRatio::Wide.to_string(), "4:3");
    }

    #[test]
    fn test_image_data_split() {
        let data = ImageData::from_base64("image/jpeg", "AAAA");
        assert_eq!(data.as_data_url(), "data:image/jpeg;base64,AAAA");
        assert_eq!(data.split().unwrap(), ("image/jpeg", "AAAA"));

        let no_mime = ImageData::from_data_url("data:;base64,AAAA");
        assert_eq!(no_mime.split().unwrap(), ("image/png", "AAAA"));
    }

    #[test]
    fn test_image_data_rejects_malformed_url() {
        let no_comma = ImageData::from_data_url("not a data url");
        assert!(matches!(
            no_comma.split(),
            Err(PixelGenError::InvalidSourceImage(_))
        ));

        let two_commas = ImageData::from_data_url("data:image/png;base64,AA,AA");
        assert!(matches!(
            two_commas.decode(),
            Err(PixelGenError::InvalidSourceImage(_))
        ));
    }

    #[test]
    fn test_image_data_decode() {
        let data = ImageData::from_bytes("image/png", &PNG_MAGIC);
        let (mime, bytes) = data.decode().unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, PNG_MAGIC);
        assert!(!data.is_empty());
        assert!(ImageData::from_base64("image/png", "").is_empty());
    }

    #[test]
    fn test_record_uses_storage_field_names() {
        let record = GeneratedImageRecord::new(
            ImageData::from_base64("image/png", "iVBORw0KGgo="),
            "a red cube",
            AspectRatio::Portrait,
            ResolutionTier::Upscaled,
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["url"], "data:image/png;base64,iVBORw0KGgo=");
        assert_eq!(json["aspectRatio"], "9:16");
        assert_eq!(json["resolution"], "4K");
        assert!(json["timestamp"].is_i64());
    }

    #[test]
    fn test_record_without_resolution_is_standard() {
        let json = r#"{
            "id": "abc123def",
            "url": "data:image/png;base64,AAAA",
            "prompt": "a lighthouse",
            "aspectRatio": "4:3",
            "timestamp": 1732000000000
        }"#;
        let record: GeneratedImageRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.resolution_tier, ResolutionTier::Standard);
        assert_eq!(record.aspect_ratio, AspectRatio::Wide);
        assert_eq!(record.created_at.timestamp_millis(), 1_732_000_000_000);

        let legacy = json.replace("\"4:3\"", "\"4:3\", \"resolution\": \"2K\"");
        let record: GeneratedImageRecord = serde_json::from_str(&legacy).unwrap();
        assert_eq!(record.resolution_tier, ResolutionTier::Standard);
    }

    #[test]
    fn test_fresh_records_get_distinct_ids() {
        let new_record = || {
            GeneratedImageRecord::new(
                ImageData::from_base64("image/png", "AAAA"),
                "p",
                AspectRatio::Square,
                ResolutionTier::Standard,
            )
        };
        let (a, b) = (new_record(), new_record());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_download_file_name() {
        let mut record = GeneratedImageRecord::new(
            ImageData::from_base64("image/jpeg", "AAAA"),
            "p",
            AspectRatio::Square,
            ResolutionTier::Standard,
        );
        record.id = "abc".into();
        assert_eq!(record.download_file_name(), "pixelgen-abc.jpg");

        record.image_data = ImageData::from_bytes("application/octet-stream", &WEBP_MAGIC);
        assert_eq!(record.download_file_name(), "pixelgen-abc.webp");
    }

    #[test]
    fn test_export_writes_decoded_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let record = GeneratedImageRecord::new(
            ImageData::from_bytes("image/png", &PNG_MAGIC),
            "p",
            AspectRatio::Square,
            ResolutionTier::Standard,
        );
        let path = record.export_to(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), record.download_file_name());
        assert_eq!(std::fs::read(path).unwrap(), PNG_MAGIC);
    }
}
