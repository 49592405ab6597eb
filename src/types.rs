//! Core types for render generation and editing.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::error::{NanoRenderError, Result};

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format.
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

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Attempts to detect format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Attempts to detect format from a MIME type string.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime {
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

/// Backend provider kind. Closed set: adding a provider means adding a case
/// here and a constructor in the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google Gemini, official endpoint (typed transport + REST fallback).
    Google,
    /// Yunwu.ai relay (Gemini-compatible wire format).
    Yunwu,
    /// OpenRouter (OpenAI-chat-compatible wire format).
    OpenRouter,
    /// GPTGod (OpenAI-chat-compatible, resolution via model-name suffix).
    GptGod,
}

impl ProviderKind {
    /// All provider kinds, in UI listing order.
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Google,
        ProviderKind::Yunwu,
        ProviderKind::OpenRouter,
        ProviderKind::GptGod,
    ];

    /// Stable identifier used in config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Yunwu => "yunwu",
            Self::OpenRouter => "openrouter",
            Self::GptGod => "gptgod",
        }
    }

    /// Human-readable provider name for display.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Google => "Google Gemini (Official)",
            Self::Yunwu => "Yunwu.ai",
            Self::OpenRouter => "OpenRouter",
            Self::GptGod => "GPTGod",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = NanoRenderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "yunwu" => Ok(Self::Yunwu),
            "openrouter" => Ok(Self::OpenRouter),
            "gptgod" => Ok(Self::GptGod),
            other => Err(NanoRenderError::Config(format!(
                "unknown provider type: {other}"
            ))),
        }
    }
}

/// What the structure image actually is. Changes the prompt template, not
/// the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Mist/depth pass: white = near, black = far.
    #[default]
    DepthMap,
    /// Regular color render used as a rough composition draft.
    ColorRender,
}

/// Coarse resolution bucket accepted by the backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionTier {
    /// Up to 2047 px on the longer axis.
    #[default]
    OneK,
    /// 2048-4095 px.
    TwoK,
    /// 4096 px and above.
    FourK,
}

impl ResolutionTier {
    /// Buckets a pixel resolution. Either axis crossing a threshold promotes
    /// the whole request.
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        if width >= 4096 || height >= 4096 {
            Self::FourK
        } else if width >= 2048 || height >= 2048 {
            Self::TwoK
        } else {
            Self::OneK
        }
    }

    /// API label ("1K"/"2K"/"4K").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneK => "1K",
            Self::TwoK => "2K",
            Self::FourK => "4K",
        }
    }

    /// Model-name suffix used by suffix-addressed backends, if any.
    pub fn model_suffix(&self) -> Option<&'static str> {
        match self {
            Self::OneK => None,
            Self::TwoK => Some("-2k"),
            Self::FourK => Some("-4k"),
        }
    }
}

impl std::fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to generate an image from a scene render.
///
/// The structure image is the geometry input (depth map or color render);
/// the optional reference image supplies style only. Immutable once built.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Structure image bytes (PNG from the scene renderer).
    pub structure_image: Vec<u8>,
    /// Optional style reference image bytes.
    pub reference_image: Option<Vec<u8>>,
    /// User's free-text prompt, appended verbatim to the template.
    pub prompt: String,
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// Whether the structure image is a depth map or a color render.
    pub mode: RenderMode,
}

impl GenerationRequest {
    /// Creates a new request with default 1024x1024 depth-map settings.
    pub fn new(structure_image: Vec<u8>, prompt: impl Into<String>) -> Self {
        Self {
            structure_image,
            reference_image: None,
            prompt: prompt.into(),
            width: 1024,
            height: 1024,
            mode: RenderMode::DepthMap,
        }
    }

    /// Sets the style reference image.
    pub fn with_reference(mut self, reference: Vec<u8>) -> Self {
        self.reference_image = Some(reference);
        self
    }

    /// Sets the target dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Sets the render mode.
    pub fn with_mode(mut self, mode: RenderMode) -> Self {
        self.mode = mode;
        self
    }

    /// Resolution tier for the requested dimensions.
    pub fn tier(&self) -> ResolutionTier {
        ResolutionTier::from_dimensions(self.width, self.height)
    }
}

/// A request to edit an existing image.
#[derive(Debug, Clone)]
pub struct EditRequest {
    /// The image being edited.
    pub source_image: Vec<u8>,
    /// Optional mask delimiting the editable region (white = editable).
    pub mask: Option<Vec<u8>>,
    /// Optional reference image to pull content/style from.
    pub reference_image: Option<Vec<u8>>,
    /// User's free-text edit instruction.
    pub prompt: String,
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
}

impl EditRequest {
    /// Creates a new edit request with default 1024x1024 output.
    pub fn new(source_image: Vec<u8>, prompt: impl Into<String>) -> Self {
        Self {
            source_image,
            mask: None,
            reference_image: None,
            prompt: prompt.into(),
            width: 1024,
            height: 1024,
        }
    }

    /// Sets the edit mask.
    pub fn with_mask(mut self, mask: Vec<u8>) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Sets the reference image.
    pub fn with_reference(mut self, reference: Vec<u8>) -> Self {
        self.reference_image = Some(reference);
        self
    }

    /// Sets the target dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Resolution tier for the requested dimensions.
    pub fn tier(&self) -> ResolutionTier {
        ResolutionTier::from_dimensions(self.width, self.height)
    }
}

/// A generated or edited image.
#[derive(Debug, Clone)]
#[must_use = "generated image should be saved or delivered to the host"]
pub struct GeneratedImage {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// Image format.
    pub format: ImageFormat,
    /// Provider that produced this image.
    pub provider: ProviderKind,
}

impl GeneratedImage {
    /// Creates a new generated image.
    pub fn new(data: Vec<u8>, format: ImageFormat, provider: ProviderKind) -> Self {
        Self {
            data,
            format,
            provider,
        }
    }

    /// Creates a generated image, detecting format from magic bytes and
    /// defaulting to PNG when the signature is unknown.
    pub fn from_bytes(data: Vec<u8>, provider: ProviderKind) -> Self {
        let format = ImageFormat::from_magic_bytes(&data).unwrap_or(ImageFormat::Png);
        Self::new(data, format, provider)
    }

    /// MIME type of the result.
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Saves the image to the given path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, &self.data)?;
        Ok(())
    }
}
