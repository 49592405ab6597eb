//! Provider trait and factory.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::error::Result;
use crate::providers::{GoogleProvider, GptGodProvider, OpenRouterProvider, YunwuProvider};
use crate::types::{EditRequest, GeneratedImage, GenerationRequest, ProviderKind};

/// Backends routinely take minutes to produce an image; a slow success must
/// not be reported as a connection failure.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Builds the HTTP client every provider uses: shared explicit timeout
/// instead of transport defaults.
pub(crate) fn build_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("falling back to default HTTP client: {e}");
            reqwest::Client::new()
        })
}

/// Uniform interface over the image generation backends.
///
/// Implementations translate their own transport and parsing failures into
/// the shared error taxonomy; no wire-library error escapes this boundary.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generates an image from a scene render (depth map or color draft).
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage>;

    /// Edits an existing image, optionally constrained by a mask and guided
    /// by a reference image.
    async fn edit(&self, request: &EditRequest) -> Result<GeneratedImage>;

    /// Returns the kind of this provider.
    fn kind(&self) -> ProviderKind;

    /// Returns the name of this provider for display.
    fn name(&self) -> &'static str {
        self.kind().display_name()
    }
}

/// Creates the provider implementation for a config.
///
/// One constructor per [`ProviderKind`] case; an empty API key is rejected
/// here so dispatch never starts with an unusable config.
pub fn create_provider(config: &ProviderConfig) -> Result<Box<dyn ImageProvider>> {
    config.require_api_key()?;

    Ok(match config.kind {
        ProviderKind::Google => Box::new(GoogleProvider::new(config.clone())),
        ProviderKind::Yunwu => Box::new(YunwuProvider::new(config.clone())),
        ProviderKind::OpenRouter => Box::new(OpenRouterProvider::new(config.clone())),
        ProviderKind::GptGod => Box::new(GptGodProvider::new(config.clone())),
    })
}
