//! Yunwu.ai relay provider (Gemini-compatible wire format, REST only).

use async_trait::async_trait;
use serde_json::Value;

use crate::config::ProviderConfig;
use crate::error::{classify_http_error, NanoRenderError, Result};
use crate::provider::{build_http_client, ImageProvider};
use crate::providers::gemini_wire;
use crate::types::{EditRequest, GeneratedImage, GenerationRequest, ImageFormat, ProviderKind};

/// Yunwu.ai image provider.
pub struct YunwuProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl YunwuProvider {
    /// Creates the provider from its config.
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: build_http_client(),
            config,
        }
    }

    async fn call(&self, parts: Vec<Value>, width: u32, height: u32) -> Result<GeneratedImage> {
        let api_key = self.config.require_api_key()?;
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.config.resolved_base_url(),
            self.config.resolved_model(),
            api_key,
        );
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
            return Err(classify_http_error(status.as_u16(), &text, &headers));
        }

        let parsed: Value = response.json().await?;
        match gemini_wire::extract_inline_image(&parsed)? {
            Some((data, mime)) => {
                tracing::debug!("yunwu image received: {} bytes", data.len());
                let format = ImageFormat::from_mime_type(&mime).unwrap_or(ImageFormat::Png);
                Ok(GeneratedImage::new(data, format, ProviderKind::Yunwu))
            }
            None => {
                let text = gemini_wire::collect_text(&parsed);
                if text.is_empty() {
                    Err(NanoRenderError::MalformedResponse(
                        "no image found in response".to_string(),
                    ))
                } else {
                    Err(NanoRenderError::NoImageProduced(text))
                }
            }
        }
    }
}

#[async_trait]
impl ImageProvider for YunwuProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        self.call(generate_parts(request), request.width, request.height)
            .await
    }

    async fn edit(&self, request: &EditRequest) -> Result<GeneratedImage> {
        self.call(edit_parts(request), request.width, request.height)
            .await
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Yunwu
    }
}

/// Generate part order: prompt, primary image, reference last.
fn generate_parts(request: &GenerationRequest) -> Vec<Value> {
    let mut parts = vec![
        gemini_wire::text_part(&request.prompt),
        gemini_wire::inline_image_part(&request.structure_image),
    ];
    if let Some(reference) = &request.reference_image {
        parts.push(gemini_wire::inline_image_part(reference));
    }
    parts
}

/// Edit part order: prompt, source, reference, mask - the reference comes
/// before the mask here, unlike the google edit path. Each provider keeps
/// its own ordering.
fn edit_parts(request: &EditRequest) -> Vec<Value> {
    let mut parts = vec![
        gemini_wire::text_part(&request.prompt),
        gemini_wire::inline_image_part(&request.source_image),
    ];
    if let Some(reference) = &request.reference_image {
        parts.push(gemini_wire::inline_image_part(reference));
    }
    if let Some(mask) = &request.mask {
        parts.push(gemini_wire::inline_image_part(mask));
    }
    parts
}
