//! OpenAI-chat wire helpers shared by the openrouter and gptgod providers.

use base64::Engine;
use serde::Serialize;

use crate::codec::{download_image, ensure_png};
use crate::error::{NanoRenderError, Result};
use crate::types::ImageFormat;

/// One chat message with mixed text/image content.
#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage {
    pub role: &'static str,
    pub content: Vec<ContentPart>,
}

impl ChatMessage {
    pub fn user(content: Vec<ContentPart>) -> Self {
        Self {
            role: "user",
            content,
        }
    }
}

/// A content part in a chat message.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrlRef },
}

/// Wrapper object the chat wire format uses around URLs.
#[derive(Debug, Serialize)]
pub(crate) struct ImageUrlRef {
    pub url: String,
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Embeds image bytes as a base64 data URL part.
    pub fn inline_image(bytes: &[u8]) -> Self {
        Self::ImageUrl {
            image_url: ImageUrlRef {
                url: to_data_url(bytes),
            },
        }
    }
}

/// Encodes image bytes as a `data:` URL, sniffing the MIME type.
pub(crate) fn to_data_url(bytes: &[u8]) -> String {
    let mime = ImageFormat::from_magic_bytes(bytes)
        .map(|f| f.mime_type())
        .unwrap_or("image/png");
    format!(
        "data:{mime};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Where a response image lives: embedded in the body or behind a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ImageSource {
    /// `data:image/...;base64,...`
    DataUrl(String),
    /// Remote `http(s)` URL that must be downloaded.
    Remote(String),
}

impl ImageSource {
    /// Classifies a URL-ish string, rejecting anything that is neither a
    /// data URL nor an http(s) URL.
    pub fn from_url(url: &str) -> Option<Self> {
        let url = url.trim();
        if url.starts_with("data:image") {
            Some(Self::DataUrl(url.to_string()))
        } else if url.starts_with("http://") || url.starts_with("https://") {
            Some(Self::Remote(url.to_string()))
        } else {
            None
        }
    }
}

/// Materializes an [`ImageSource`] into PNG-normalized bytes.
///
/// Remote images are downloaded and run through [`ensure_png`] so every
/// provider yields uniform PNG output regardless of upstream quirks.
pub(crate) async fn resolve_image_source(
    client: &reqwest::Client,
    source: ImageSource,
) -> Result<(Vec<u8>, String)> {
    match source {
        ImageSource::DataUrl(url) => {
            let encoded = url
                .split_once(',')
                .map(|(_, data)| data)
                .ok_or_else(|| NanoRenderError::Decode("data URL without payload".to_string()))?;
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|e| NanoRenderError::Decode(e.to_string()))?;
            let mime = ImageFormat::from_magic_bytes(&bytes)
                .map(|f| f.mime_type())
                .unwrap_or("image/png")
                .to_string();
            Ok((bytes, mime))
        }
        ImageSource::Remote(url) => {
            let (bytes, mime) = download_image(client, &url).await?;
            Ok(ensure_png(bytes, &mime))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_parts_serialize_to_chat_wire() {
        let message = ChatMessage::user(vec![
            ContentPart::text("hello"),
            ContentPart::inline_image(&crate::codec::solid_png(2, 2, [9, 9, 9])),
        ]);
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["role"], "user");
        assert_eq!(value["content"][0], json!({ "type": "text", "text": "hello" }));
        assert_eq!(value["content"][1]["type"], "image_url");
        assert!(value["content"][1]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_image_source_classification() {
        assert!(matches!(
            ImageSource::from_url("data:image/png;base64,AQID"),
            Some(ImageSource::DataUrl(_))
        ));
        assert!(matches!(
            ImageSource::from_url("https://cdn.example/img.png"),
            Some(ImageSource::Remote(_))
        ));
        assert_eq!(ImageSource::from_url("ftp://nope/img.png"), None);
        assert_eq!(ImageSource::from_url("just text"), None);
    }

    #[tokio::test]
    async fn test_resolve_data_url() {
        let client = reqwest::Client::new();
        let source = ImageSource::DataUrl("data:image/png;base64,AQID".to_string());
        let (bytes, mime) = resolve_image_source(&client, source).await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(mime, "image/png");
    }

    #[tokio::test]
    async fn test_resolve_malformed_data_url_is_decode_error() {
        let client = reqwest::Client::new();
        let source = ImageSource::DataUrl("data:image/png;base64".to_string());
        assert!(matches!(
            resolve_image_source(&client, source).await,
            Err(NanoRenderError::Decode(_))
        ));
    }
}
