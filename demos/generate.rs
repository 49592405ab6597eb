//! Generate an image from a depth render.
//!
//! ```sh
//! GEMINI_API_KEY=... cargo run --example generate -- depth.png "a mossy forest ruin"
//! ```

use nanorender::{generate_image, GenerationRequest, ProviderConfig, ProviderKind, RenderMode};

#[tokio::main]
async fn main() -> nanorender::Result<()> {
    let mut args = std::env::args().skip(1);
    let depth_path = args.next().unwrap_or_else(|| "depth.png".to_string());
    let prompt = args.next().unwrap_or_default();

    let api_key = std::env::var("GEMINI_API_KEY").expect("GEMINI_API_KEY must be set");
    let config = ProviderConfig::new(ProviderKind::Google, api_key);

    let depth_map = std::fs::read(&depth_path)?;
    let request = GenerationRequest::new(depth_map, prompt)
        .with_size(1920, 1080)
        .with_mode(RenderMode::DepthMap);

    println!("Generating via {}...", config.kind.display_name());
    let image = generate_image(&config, &request).await?;

    image.save("generated.png")?;
    println!("Saved generated.png ({} bytes, {})", image.size(), image.mime_type());
    Ok(())
}
