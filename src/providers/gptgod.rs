//! GPTGod provider (OpenAI-chat-compatible, resolution via model suffix).
//!
//! GPTGod's response shape is the least consistent of the backends: the
//! image may arrive in a top-level field, an array, an OpenAI-style data
//! list, or embedded in free chat text. Parsing is an ordered list of pure
//! strategies tried strictly in sequence; the first hit wins.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::ProviderConfig;
use crate::error::{classify_http_error, NanoRenderError, Result};
use crate::provider::{build_http_client, ImageProvider};
use crate::providers::openai_chat::{
    resolve_image_source, ChatMessage, ContentPart, ImageSource,
};
use crate::types::{
    EditRequest, GeneratedImage, GenerationRequest, ImageFormat, ProviderKind, ResolutionTier,
};

/// One response-parsing strategy: a pure function over the response body.
type ResponseParser = fn(&Value) -> Option<ImageSource>;

/// Parsing strategies in priority order, strictest first. Order matters:
/// the markdown and bare-URL scanners would happily match text that the
/// structured fields describe precisely.
const RESPONSE_PARSERS: [(&str, ResponseParser); 5] = [
    ("image field", parse_image_field),
    ("images array", parse_images_array),
    ("data array", parse_data_array),
    ("markdown link", parse_markdown_link),
    ("bare url", parse_bare_url),
];

/// GPTGod image provider.
pub struct GptGodProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl GptGodProvider {
    /// Creates the provider from its config.
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: build_http_client(),
            config,
        }
    }

    /// Model id for a resolution tier: any stale `-2k`/`-4k` suffix is
    /// stripped before the new one is appended, so repeated calls cannot
    /// stack suffixes.
    fn model_for_tier(&self, tier: ResolutionTier) -> String {
        let base = self
            .config
            .resolved_model()
            .trim_end_matches("-2k")
            .trim_end_matches("-4k");
        match tier.model_suffix() {
            Some(suffix) => format!("{base}{suffix}"),
            None => base.to_string(),
        }
    }

    async fn call(
        &self,
        content: Vec<ContentPart>,
        tier: ResolutionTier,
    ) -> Result<GeneratedImage> {
        let api_key = self.config.require_api_key()?;
        let url = format!("{}/chat/completions", self.config.resolved_base_url());
        let model = self.model_for_tier(tier);

        let body = json!({
            "model": model,
            "stream": false,
            "n": 1,
            "messages": [ChatMessage::user(content)],
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

        let parsed: Value = response.json().await?;
        let Some((strategy, source)) = extract_image_source(&parsed) else {
            return match chat_text(&parsed).filter(|t| !t.is_empty()) {
                Some(text) => Err(NanoRenderError::NoImageProduced(text)),
                None => Err(NanoRenderError::MalformedResponse(
                    "no image found in response after all parse strategies".to_string(),
                )),
            };
        };
        tracing::debug!("gptgod image located via {strategy}");

        let (bytes, mime) = resolve_image_source(&self.client, source).await?;
        let format = ImageFormat::from_mime_type(&mime).unwrap_or(ImageFormat::Png);
        Ok(GeneratedImage::new(bytes, format, ProviderKind::GptGod))
    }
}

#[async_trait]
impl ImageProvider for GptGodProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        let mut content = vec![
            ContentPart::text(&request.prompt),
            ContentPart::inline_image(&request.structure_image),
        ];
        if let Some(reference) = &request.reference_image {
            content.push(ContentPart::inline_image(reference));
        }
        self.call(content, request.tier()).await
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
        self.call(content, request.tier()).await
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::GptGod
    }
}

/// Runs the parser cascade, returning the winning strategy's name for logs.
fn extract_image_source(body: &Value) -> Option<(&'static str, ImageSource)> {
    RESPONSE_PARSERS
        .iter()
        .find_map(|(name, parser)| parser(body).map(|source| (*name, source)))
}

/// Strategy 1: a top-level `image` URL field.
fn parse_image_field(body: &Value) -> Option<ImageSource> {
    body.get("image")
        .and_then(Value::as_str)
        .and_then(ImageSource::from_url)
}

/// Strategy 2: an `images` array of URL strings (or `{url}` objects).
fn parse_images_array(body: &Value) -> Option<ImageSource> {
    body.get("images")?
        .as_array()?
        .iter()
        .filter_map(|entry| {
            entry
                .as_str()
                .or_else(|| entry.get("url").and_then(Value::as_str))
        })
        .find_map(ImageSource::from_url)
}

/// Strategy 3: OpenAI images-endpoint style `data[0].url`.
fn parse_data_array(body: &Value) -> Option<ImageSource> {
    body.get("data")?
        .as_array()?
        .iter()
        .filter_map(|entry| entry.get("url").and_then(Value::as_str))
        .find_map(ImageSource::from_url)
}

/// Strategy 4: a markdown image link `![...](url)` in the chat text.
fn parse_markdown_link(body: &Value) -> Option<ImageSource> {
    let text = chat_text(body)?;
    let mut rest = text.as_str();
    while let Some(bang) = rest.find("![") {
        let after = &rest[bang..];
        let Some(open) = after.find("](") else {
            return None;
        };
        if let Some(close) = after[open + 2..].find(')') {
            let url = &after[open + 2..open + 2 + close];
            if let Some(source) = ImageSource::from_url(url) {
                return Some(source);
            }
        }
        rest = &after[open + 2..];
    }
    None
}

/// Strategy 5 (loosest): a bare data URL, or an http(s) URL with an image
/// file extension, anywhere in the chat text.
fn parse_bare_url(body: &Value) -> Option<ImageSource> {
    let text = chat_text(body)?;

    if let Some(start) = text.find("data:image") {
        let candidate: String = text[start..]
            .chars()
            .take_while(|c| !c.is_whitespace() && !"\"')".contains(*c))
            .collect();
        return ImageSource::from_url(&candidate);
    }

    let mut rest = text.as_str();
    while let Some(pos) = rest.find("http") {
        let candidate: String = rest[pos..]
            .chars()
            .take_while(|c| !c.is_whitespace() && !"\"')".contains(*c))
            .collect();
        if has_image_extension(&candidate) {
            if let Some(source) = ImageSource::from_url(&candidate) {
                return Some(source);
            }
        }
        rest = &rest[pos + 4..];
    }
    None
}

fn has_image_extension(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('.')
        .next()
        .map(|ext| ImageFormat::from_extension(ext).is_some())
        .unwrap_or(false)
}

/// Pulls the assistant text out of `choices[0].message.content`, which is
/// either a plain string or an array of typed parts.
fn chat_text(body: &Value) -> Option<String> {
    let content = body
        .get("choices")?
        .as_array()?
        .first()?
        .get("message")?
        .get("content")?;

    match content {
        Value::String(text) => Some(text.clone()),
        Value::Array(parts) => Some(
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(" "),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_with_model(model: &str) -> GptGodProvider {
        GptGodProvider::new(
            ProviderConfig::new(ProviderKind::GptGod, "sk-test").with_model(model),
        )
    }

    #[test]
    fn test_model_suffix_per_tier() {
        let provider = provider_with_model("banana-pro");
        assert_eq!(provider.model_for_tier(ResolutionTier::OneK), "banana-pro");
        assert_eq!(provider.model_for_tier(ResolutionTier::TwoK), "banana-pro-2k");
        assert_eq!(provider.model_for_tier(ResolutionTier::FourK), "banana-pro-4k");
    }

    #[test]
    fn test_model_suffix_never_stacks() {
        let provider = provider_with_model("banana-pro-4k");
        assert_eq!(provider.model_for_tier(ResolutionTier::TwoK), "banana-pro-2k");
        assert_eq!(provider.model_for_tier(ResolutionTier::OneK), "banana-pro");

        let provider = provider_with_model("banana-pro-2k");
        assert_eq!(provider.model_for_tier(ResolutionTier::FourK), "banana-pro-4k");
    }

    #[test]
    fn test_strategy_image_field() {
        let body = json!({ "image": "https://cdn.example/a.png" });
        let (name, source) = extract_image_source(&body).unwrap();
        assert_eq!(name, "image field");
        assert_eq!(source, ImageSource::Remote("https://cdn.example/a.png".into()));
    }

    #[test]
    fn test_strategy_images_array_data_url() {
        let body = json!({ "images": ["data:image/png;base64,AQID"] });
        let (name, source) = extract_image_source(&body).unwrap();
        assert_eq!(name, "images array");
        assert!(matches!(source, ImageSource::DataUrl(_)));
    }

    #[test]
    fn test_strategy_images_array_http_url() {
        let body = json!({ "images": [{ "url": "https://cdn.example/b.jpg" }] });
        let (name, source) = extract_image_source(&body).unwrap();
        assert_eq!(name, "images array");
        assert_eq!(source, ImageSource::Remote("https://cdn.example/b.jpg".into()));
    }

    #[test]
    fn test_strategy_data_array() {
        let body = json!({ "data": [{ "url": "https://cdn.example/c.png" }] });
        let (name, source) = extract_image_source(&body).unwrap();
        assert_eq!(name, "data array");
        assert_eq!(source, ImageSource::Remote("https://cdn.example/c.png".into()));
    }

    #[test]
    fn test_strategy_markdown_link() {
        let body = json!({
            "choices": [{ "message": {
                "content": "Here you go:\n\n![render](https://cdn.example/d.png)\n\nEnjoy!"
            }}]
        });
        let (name, source) = extract_image_source(&body).unwrap();
        assert_eq!(name, "markdown link");
        assert_eq!(source, ImageSource::Remote("https://cdn.example/d.png".into()));
    }

    #[test]
    fn test_strategy_bare_url() {
        let body = json!({
            "choices": [{ "message": {
                "content": "Result uploaded to https://cdn.example/e.webp?sig=zz for you"
            }}]
        });
        let (name, source) = extract_image_source(&body).unwrap();
        assert_eq!(name, "bare url");
        assert_eq!(
            source,
            ImageSource::Remote("https://cdn.example/e.webp?sig=zz".into())
        );
    }

    #[test]
    fn test_bare_url_requires_image_extension() {
        let body = json!({
            "choices": [{ "message": {
                "content": "see https://example.com/status and retry"
            }}]
        });
        assert!(extract_image_source(&body).is_none());
    }

    #[test]
    fn test_bare_data_url_in_text() {
        let body = json!({
            "choices": [{ "message": { "content": "data:image/png;base64,AQID" } }]
        });
        let (name, source) = extract_image_source(&body).unwrap();
        assert_eq!(name, "bare url");
        assert!(matches!(source, ImageSource::DataUrl(_)));
    }

    #[test]
    fn test_strategies_tried_in_declared_order() {
        // Both a structured field and a markdown link: the stricter wins.
        let body = json!({
            "image": "https://cdn.example/first.png",
            "choices": [{ "message": {
                "content": "![render](https://cdn.example/second.png)"
            }}]
        });
        let (name, source) = extract_image_source(&body).unwrap();
        assert_eq!(name, "image field");
        assert_eq!(source, ImageSource::Remote("https://cdn.example/first.png".into()));
    }

    #[test]
    fn test_chat_text_from_content_array() {
        let body = json!({
            "choices": [{ "message": { "content": [
                { "type": "text", "text": "part one" },
                { "type": "text", "text": "part two" }
            ]}}]
        });
        assert_eq!(chat_text(&body).unwrap(), "part one part two");
    }

    #[test]
    fn test_no_image_anywhere_is_none() {
        let body = json!({
            "choices": [{ "message": { "content": "I cannot generate images." } }]
        });
        assert!(extract_image_source(&body).is_none());
        assert_eq!(chat_text(&body).unwrap(), "I cannot generate images.");
    }
}
