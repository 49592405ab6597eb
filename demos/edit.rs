//! Edit an existing render, optionally with a mask.
//!
//! ```sh
//! GEMINI_API_KEY=... cargo run --example edit -- render.png "add warm sunset light" mask.png
//! ```

use nanorender::{edit_image, EditRequest, ProviderConfig, ProviderKind};

#[tokio::main]
async fn main() -> nanorender::Result<()> {
    let mut args = std::env::args().skip(1);
    let source_path = args.next().expect("usage: edit <image> <prompt> [mask]");
    let prompt = args.next().expect("usage: edit <image> <prompt> [mask]");
    let mask_path = args.next();

    let api_key = std::env::var("GEMINI_API_KEY").expect("GEMINI_API_KEY must be set");
    let config = ProviderConfig::new(ProviderKind::Google, api_key);

    let source = std::fs::read(&source_path)?;
    let mut request = EditRequest::new(source, prompt);
    if let Some(path) = mask_path {
        request = request.with_mask(std::fs::read(path)?);
    }

    println!("Editing via {}...", config.kind.display_name());
    let image = edit_image(&config, &request).await?;

    image.save("edited.png")?;
    println!("Saved edited.png ({} bytes, {})", image.size(), image.mime_type());
    Ok(())
}
