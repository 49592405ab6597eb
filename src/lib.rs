#![warn(missing_docs)]
//! NanoRender - multi-provider AI rendering core for 3D scenes.
//!
//! This crate turns a scene's depth/mist render (or a rough color render)
//! into an AI-generated image, then supports iterative editing of the
//! result (masked inpainting, style transfer, reference-object insertion)
//! through several interchangeable backends.
//!
//! # Quick Start - Generate
//!
//! ```no_run
//! use nanorender::{generate_image, GenerationRequest, ProviderConfig, ProviderKind};
//!
//! #[tokio::main]
//! async fn main() -> nanorender::Result<()> {
//!     let config = ProviderConfig::new(ProviderKind::Google, std::env::var("GEMINI_API_KEY").unwrap());
//!     let depth_map = std::fs::read("depth.png")?;
//!
//!     let request = GenerationRequest::new(depth_map, "a mossy forest ruin at dawn")
//!         .with_size(2048, 1152);
//!     let image = generate_image(&config, &request).await?;
//!     image.save("result.png")?;
//!     Ok(())
//! }
//! ```
//!
//! # Quick Start - Edit
//!
//! ```no_run
//! use nanorender::{edit_image, EditRequest, ProviderConfig, ProviderKind};
//!
//! #[tokio::main]
//! async fn main() -> nanorender::Result<()> {
//!     let config = ProviderConfig::new(ProviderKind::Google, std::env::var("GEMINI_API_KEY").unwrap());
//!     let source = std::fs::read("result.png")?;
//!     let mask = std::fs::read("mask.png")?;
//!
//!     let request = EditRequest::new(source, "replace the sky with a storm")
//!         .with_mask(mask);
//!     let image = edit_image(&config, &request).await?;
//!     image.save("edited.png")?;
//!     Ok(())
//! }
//! ```
//!
//! # Hosts with a blocking UI loop
//!
//! Editor hosts cannot block their UI thread for the minutes a backend may
//! take. [`Coordinator`] runs the pipeline on a worker thread and delivers
//! status/result events through a queue the host drains on its idle tick.
//!
//! # Providers
//!
//! - `google`: official Gemini endpoint; typed transport with a transparent
//!   REST fallback
//! - `yunwu`: Yunwu.ai relay, Gemini-compatible wire format
//! - `openrouter`: OpenRouter, OpenAI-chat-compatible wire format
//! - `gptgod`: GPTGod, OpenAI-chat-compatible with resolution-suffixed
//!   model ids

pub mod codec;
mod config;
pub mod coordinator;
mod dispatch;
mod error;
pub mod prompt;
mod provider;
pub mod providers;
pub mod ratio;
mod types;

pub use config::{default_base_url, default_model, ConfigStore, ProviderConfig};
pub use coordinator::{Coordinator, HostEvent, RequestState};
pub use dispatch::{edit_image, edit_image_blocking, generate_image, generate_image_blocking};
pub use error::{NanoRenderError, Result};
pub use provider::{create_provider, ImageProvider};
pub use types::{
    EditRequest, GeneratedImage, GenerationRequest, ImageFormat, ProviderKind, RenderMode,
    ResolutionTier,
};
