//! High-level dispatch: compose the final prompt, create the configured
//! provider, and run the call.
//!
//! Callers put the raw user text in the request; the instruction template
//! is selected and prepended here so every provider receives the same
//! composed prompt.

use crate::config::ProviderConfig;
use crate::error::Result;
use crate::prompt::{build_edit_prompt, build_generate_prompt};
use crate::provider::create_provider;
use crate::types::{EditRequest, GeneratedImage, GenerationRequest};

/// Generates an image from a scene render via the configured provider.
pub async fn generate_image(
    config: &ProviderConfig,
    request: &GenerationRequest,
) -> Result<GeneratedImage> {
    let provider = create_provider(config)?;
    let request = compose_generate(request);
    tracing::debug!(
        "dispatching generate to {} ({}x{})",
        provider.name(),
        request.width,
        request.height
    );
    provider.generate(&request).await
}

/// Edits an existing image via the configured provider.
pub async fn edit_image(config: &ProviderConfig, request: &EditRequest) -> Result<GeneratedImage> {
    let provider = create_provider(config)?;
    let request = compose_edit(request);
    tracing::debug!("dispatching edit to {}", provider.name());
    provider.edit(&request).await
}

/// Blocking variant of [`generate_image`] for non-async hosts; runs the
/// call on a throwaway current-thread runtime.
pub fn generate_image_blocking(
    config: &ProviderConfig,
    request: &GenerationRequest,
) -> Result<GeneratedImage> {
    runtime()?.block_on(generate_image(config, request))
}

/// Blocking variant of [`edit_image`] for non-async hosts.
pub fn edit_image_blocking(config: &ProviderConfig, request: &EditRequest) -> Result<GeneratedImage> {
    runtime()?.block_on(edit_image(config, request))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

fn compose_generate(request: &GenerationRequest) -> GenerationRequest {
    let mut composed = request.clone();
    composed.prompt = build_generate_prompt(
        &request.prompt,
        request.reference_image.is_some(),
        request.mode,
    );
    composed
}

fn compose_edit(request: &EditRequest) -> EditRequest {
    let mut composed = request.clone();
    composed.prompt = build_edit_prompt(
        &request.prompt,
        request.mask.is_some(),
        request.reference_image.is_some(),
    );
    composed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::error::NanoRenderError;
    use crate::types::{ProviderKind, RenderMode};

    #[test]
    fn test_compose_generate_wraps_user_text() {
        let request = GenerationRequest::new(vec![1], "make it cyberpunk")
            .with_mode(RenderMode::DepthMap);
        let composed = compose_generate(&request);

        assert!(composed.prompt.starts_with("You are receiving a DEPTH MAP"));
        assert!(composed.prompt.ends_with("User instructions: make it cyberpunk"));
        // Everything else is untouched
        assert_eq!(composed.structure_image, request.structure_image);
        assert_eq!((composed.width, composed.height), (request.width, request.height));
    }

    #[test]
    fn test_compose_edit_selects_mask_template() {
        let request = EditRequest::new(vec![1], "remove the chair").with_mask(vec![2]);
        let composed = compose_edit(&request);

        assert!(composed.prompt.contains("MASK"));
        assert!(composed.prompt.ends_with("User instructions: remove the chair"));
    }

    #[tokio::test]
    async fn test_dispatch_rejects_unconfigured_provider() {
        let config = ProviderConfig::new(ProviderKind::Google, "");
        let request = GenerationRequest::new(vec![1], "x");
        assert!(matches!(
            generate_image(&config, &request).await,
            Err(NanoRenderError::Config(_))
        ));
    }
}
