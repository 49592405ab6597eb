//! OpenRouter provider (OpenAI-chat-compatible wire format).
//!
//! Response images arrive either as inline data URLs or as remote HTTP
//! URLs; remote results are downloaded and normalized to PNG so callers see
//! uniform output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::ProviderConfig;
use crate::error::{classify_http_error, NanoRenderError, Result};
use crate::provider::{build_http_client, ImageProvider};
use crate::providers::openai_chat::{
    resolve_image_source, ChatMessage, ContentPart, ImageSource,
};
use crate::ratio::find_closest_ratio;
use crate::types::{
    EditRequest, GeneratedImage, GenerationRequest, ImageFormat, ProviderKind, ResolutionTier,
};

/// OpenRouter image provider.
pub struct OpenRouterProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl OpenRouterProvider {
    /// Creates the provider from its config.
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: build_http_client(),
            config,
        }
    }

    async fn call(
        &self,
        content: Vec<ContentPart>,
        width: u32,
        height: u32,
    ) -> Result<GeneratedImage> {
        let api_key = self.config.require_api_key()?;
        let url = format!("{}/chat/completions", self.config.resolved_base_url());

        let body = json!({
            "model": self.config.resolved_model(),
            "messages": [ChatMessage::user(content)],
            "modalities": ["image", "text"],
            "image_config": {
                "aspect_ratio": find_closest_ratio(i64::from(width), i64::from(height)),
                "image_size": ResolutionTier::from_dimensions(width, height).as_str(),
            },
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
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

        let parsed: ChatResponse = response.json().await?;
        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| {
                NanoRenderError::MalformedResponse("no choices in response".to_string())
            })?;

        let Some(source) = first_image_source(&message) else {
            return match message.content.filter(|t| !t.is_empty()) {
                Some(text) => Err(NanoRenderError::NoImageProduced(text)),
                None => Err(NanoRenderError::MalformedResponse(
                    "no image found in response".to_string(),
                )),
            };
        };

        let (bytes, mime) = resolve_image_source(&self.client, source).await?;
        let format = ImageFormat::from_mime_type(&mime).unwrap_or(ImageFormat::Png);
        Ok(GeneratedImage::new(bytes, format, ProviderKind::OpenRouter))
    }
}

#[async_trait]
impl ImageProvider for OpenRouterProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        let mut content = vec![
            ContentPart::text(&request.prompt),
            ContentPart::inline_image(&request.structure_image),
        ];
        if let Some(reference) = &request.reference_image {
            content.push(ContentPart::inline_image(reference));
        }
        self.call(content, request.width, request.height).await
    }

    async fn edit(&self, request: &EditRequest) -> Result<GeneratedImage> {
        let mut content = vec![
            ContentPart::text(&request.prompt),
            ContentPart::inline_image(&request.source_image),
        ];
        if let Some(reference) = &request.reference_image {
            content.push(ContentPart::inline_image(reference));
        }
        if let Some(mask) = &request.mask {
            content.push(ContentPart::inline_image(mask));
        }
        self.call(content, request.width, request.height).await
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenRouter
    }
}

/// Picks the first usable image reference out of a chat message.
fn first_image_source(message: &ResponseMessage) -> Option<ImageSource> {
    message
        .images
        .iter()
        .filter_map(|img| img.url())
        .find_map(ImageSource::from_url)
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    images: Vec<ResponseImage>,
    #[serde(default)]
    content: Option<String>,
}

/// An entry in the response `images` array; the URL appears either nested
/// under `image_url` or directly as `url` depending on the upstream model.
#[derive(Debug, Deserialize)]
struct ResponseImage {
    #[serde(default)]
    image_url: Option<ResponseImageUrl>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
struct ResponseImageUrl {
    url: String,
}

impl ResponseImage {
    fn url(&self) -> Option<&str> {
        self.image_url
            .as_ref()
            .map(|u| u.url.as_str())
            .or(self.url.as_deref())
    }
}
