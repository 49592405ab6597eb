//! Google Gemini provider: typed primary transport with a transparent
//! REST fallback.
//!
//! The primary path speaks the strict camelCase wire with header auth. Any
//! failure there (transport, auth, unexpected shape) silently demotes the
//! call to the lenient REST path once; only the REST failure surfaces.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;

use crate::codec::solid_png;
use crate::config::ProviderConfig;
use crate::error::{classify_http_error, NanoRenderError, Result};
use crate::provider::{build_http_client, ImageProvider};
use crate::providers::gemini_wire;
use crate::ratio::find_closest_ratio;
use crate::types::{
    EditRequest, GeneratedImage, GenerationRequest, ImageFormat, ProviderKind, ResolutionTier,
};

/// Placeholder dimensions and color for text-only responses.
const PLACEHOLDER_SIZE: u32 = 100;
const PLACEHOLDER_RGB: [u8; 3] = [0, 100, 200];

/// Runs the primary transport; on any failure, retries the same logical
/// call over REST exactly once and returns the REST outcome.
pub(crate) async fn with_rest_fallback<T, P, F, Fut>(primary: P, fallback: F) -> Result<T>
where
    P: Future<Output = Result<T>>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match primary.await {
        Ok(value) => Ok(value),
        Err(primary_err) => {
            tracing::debug!("primary transport failed, retrying over REST: {primary_err}");
            fallback().await
        }
    }
}

/// Google Gemini image provider.
pub struct GoogleProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl GoogleProvider {
    /// Creates the provider from its config.
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: build_http_client(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.resolved_base_url(),
            self.config.resolved_model(),
        )
    }

    fn parse_error(status: u16, body: &str, headers: &reqwest::header::HeaderMap) -> NanoRenderError {
        match classify_http_error(status, body, headers) {
            NanoRenderError::Auth(_) => NanoRenderError::Auth(
                "API key invalid or quota exceeded. Check your Google AI Studio account."
                    .to_string(),
            ),
            other => other,
        }
    }

    fn placeholder(text: &str) -> GeneratedImage {
        tracing::warn!(
            "model returned text instead of an image, substituting placeholder: {}",
            text.chars().take(200).collect::<String>()
        );
        GeneratedImage::new(
            solid_png(PLACEHOLDER_SIZE, PLACEHOLDER_SIZE, PLACEHOLDER_RGB),
            ImageFormat::Png,
            ProviderKind::Google,
        )
    }

    async fn call_primary(
        &self,
        parts: Vec<PrimaryPart>,
        width: u32,
        height: u32,
    ) -> Result<GeneratedImage> {
        let api_key = self.config.require_api_key()?;
        let body = PrimaryRequest {
            contents: vec![PrimaryContent { parts }],
            generation_config: PrimaryGenerationConfig {
                response_modalities: vec!["TEXT", "IMAGE"],
                image_config: PrimaryImageConfig {
                    aspect_ratio: find_closest_ratio(i64::from(width), i64::from(height))
                        .to_string(),
                    image_size: ResolutionTier::from_dimensions(width, height).as_str(),
                },
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status.as_u16(), &text, &headers));
        }

        let parsed: PrimaryResponse = response.json().await?;
        let candidate = parsed.candidates.into_iter().next().ok_or_else(|| {
            NanoRenderError::MalformedResponse("no candidates in response".to_string())
        })?;
        let content = candidate.content.ok_or_else(|| {
            NanoRenderError::MalformedResponse("candidate has no content".to_string())
        })?;

        let mut texts = Vec::new();
        for part in content.parts {
            if let Some(inline) = part.inline_data {
                let data = base64::engine::general_purpose::STANDARD
                    .decode(&inline.data)
                    .map_err(|e| NanoRenderError::Decode(e.to_string()))?;
                let format = inline
                    .mime_type
                    .as_deref()
                    .and_then(ImageFormat::from_mime_type)
                    .unwrap_or(ImageFormat::Png);
                return Ok(GeneratedImage::new(data, format, ProviderKind::Google));
            }
            if let Some(text) = part.text {
                texts.push(text);
            }
        }

        if texts.is_empty() {
            return Err(NanoRenderError::MalformedResponse(
                "no image or text parts in response".to_string(),
            ));
        }
        Ok(Self::placeholder(&texts.join(" ")))
    }

    async fn call_rest(&self, parts: Vec<Value>, width: u32, height: u32) -> Result<GeneratedImage> {
        let api_key = self.config.require_api_key()?;
        let url = format!("{}?key={}", self.endpoint(), api_key);
        let body = gemini_wire::request_body(parts, width, height);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status.as_u16(), &text, &headers));
        }

        let parsed: Value = response.json().await?;
        match gemini_wire::extract_inline_image(&parsed)? {
            Some((data, mime)) => {
                let format = ImageFormat::from_mime_type(&mime).unwrap_or(ImageFormat::Png);
                Ok(GeneratedImage::new(data, format, ProviderKind::Google))
            }
            None => {
                let text = gemini_wire::collect_text(&parsed);
                if text.is_empty() {
                    Err(NanoRenderError::MalformedResponse(
                        "no image data found in response".to_string(),
                    ))
                } else {
                    Ok(Self::placeholder(&text))
                }
            }
        }
    }
}

#[async_trait]
impl ImageProvider for GoogleProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        with_rest_fallback(
            self.call_primary(primary_generate_parts(request), request.width, request.height),
            || self.call_rest(rest_generate_parts(request), request.width, request.height),
        )
        .await
    }

    async fn edit(&self, request: &EditRequest) -> Result<GeneratedImage> {
        with_rest_fallback(
            self.call_primary(primary_edit_parts(request), request.width, request.height),
            || self.call_rest(rest_edit_parts(request), request.width, request.height),
        )
        .await
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }
}

/// Generate part order: prompt, structure image, then reference. The
/// structure image always precedes the style reference so the model
/// privileges geometry over style.
fn primary_generate_parts(request: &GenerationRequest) -> Vec<PrimaryPart> {
    let mut parts = vec![
        PrimaryPart::text(&request.prompt),
        PrimaryPart::image(&request.structure_image),
    ];
    if let Some(reference) = &request.reference_image {
        parts.push(PrimaryPart::image(reference));
    }
    parts
}

/// Edit part order: prompt, reference, source, mask. The reference comes
/// BEFORE the image being edited - the reverse of the generate path. That
/// asymmetry matches the upstream convention; do not unify the two.
fn primary_edit_parts(request: &EditRequest) -> Vec<PrimaryPart> {
    let mut parts = vec![PrimaryPart::text(&request.prompt)];
    if let Some(reference) = &request.reference_image {
        parts.push(PrimaryPart::image(reference));
    }
    parts.push(PrimaryPart::image(&request.source_image));
    if let Some(mask) = &request.mask {
        parts.push(PrimaryPart::image(mask));
    }
    parts
}

fn rest_generate_parts(request: &GenerationRequest) -> Vec<Value> {
    let mut parts = vec![
        gemini_wire::text_part(&request.prompt),
        gemini_wire::inline_image_part(&request.structure_image),
    ];
    if let Some(reference) = &request.reference_image {
        parts.push(gemini_wire::inline_image_part(reference));
    }
    parts
}

fn rest_edit_parts(request: &EditRequest) -> Vec<Value> {
    let mut parts = vec![gemini_wire::text_part(&request.prompt)];
    if let Some(reference) = &request.reference_image {
        parts.push(gemini_wire::inline_image_part(reference));
    }
    parts.push(gemini_wire::inline_image_part(&request.source_image));
    if let Some(mask) = &request.mask {
        parts.push(gemini_wire::inline_image_part(mask));
    }
    parts
}

// Primary (strict camelCase) wire types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrimaryRequest {
    contents: Vec<PrimaryContent>,
    generation_config: PrimaryGenerationConfig,
}

#[derive(Debug, Serialize)]
struct PrimaryContent {
    parts: Vec<PrimaryPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum PrimaryPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: PrimaryInlineData,
    },
}

impl PrimaryPart {
    fn text(text: &str) -> Self {
        Self::Text {
            text: text.to_string(),
        }
    }

    fn image(bytes: &[u8]) -> Self {
        let mime = ImageFormat::from_magic_bytes(bytes)
            .map(|f| f.mime_type())
            .unwrap_or("image/png");
        Self::InlineData {
            inline_data: PrimaryInlineData {
                mime_type: mime.to_string(),
                data: base64::engine::general_purpose::STANDARD.encode(bytes),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrimaryInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrimaryGenerationConfig {
    response_modalities: Vec<&'static str>,
    image_config: PrimaryImageConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrimaryImageConfig {
    aspect_ratio: String,
    image_size: &'static str,
}

#[derive(Debug, Deserialize)]
struct PrimaryResponse {
    #[serde(default)]
    candidates: Vec<PrimaryCandidate>,
}

#[derive(Debug, Deserialize)]
struct PrimaryCandidate {
    #[serde(default)]
    content: Option<PrimaryContentResponse>,
}

#[derive(Debug, Deserialize)]
struct PrimaryContentResponse {
    #[serde(default)]
    parts: Vec<PrimaryPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrimaryPartResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<PrimaryInlineDataResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrimaryInlineDataResponse {
    #[serde(default)]
    mime_type: Option<String>,
    data: String,
}
