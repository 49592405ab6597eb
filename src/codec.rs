//! Image codec helpers: PNG normalization, remote downloads, and a
//! dependency-free solid-color PNG writer for placeholder results.

use std::io::Cursor;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{classify_http_error, Result};
use crate::types::ImageFormat;

/// PNG file signature.
const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Converts arbitrary raster bytes to PNG, degrading gracefully.
///
/// Already-PNG input passes through unchanged. Other decodable formats are
/// re-encoded as PNG with the pixel data normalized to RGB/RGBA. Bytes that
/// cannot be decoded are returned unchanged with their original MIME type;
/// this function never fails.
pub fn ensure_png(data: Vec<u8>, mime_type: &str) -> (Vec<u8>, String) {
    if data.starts_with(&PNG_SIGNATURE) {
        return (data, "image/png".to_string());
    }

    match image::load_from_memory(&data) {
        Ok(decoded) => {
            // The PNG encoder rejects exotic layouts; normalize first.
            let normalized = if decoded.color().has_alpha() {
                image::DynamicImage::ImageRgba8(decoded.to_rgba8())
            } else {
                image::DynamicImage::ImageRgb8(decoded.to_rgb8())
            };

            let mut out = Cursor::new(Vec::new());
            match normalized.write_to(&mut out, image::ImageFormat::Png) {
                Ok(()) => (out.into_inner(), "image/png".to_string()),
                Err(e) => {
                    tracing::warn!("PNG re-encode failed, passing bytes through: {e}");
                    (data, mime_type.to_string())
                }
            }
        }
        Err(e) => {
            tracing::warn!("image decode failed, passing bytes through: {e}");
            (data, mime_type.to_string())
        }
    }
}

/// Downloads an image over HTTP.
///
/// Generation backends hand out short-lived URLs that can take a long time
/// to serve; the caller's client must carry the shared 300 s timeout. MIME
/// type comes from the Content-Type header, falling back to the URL
/// extension, then to PNG.
pub async fn download_image(client: &reqwest::Client, url: &str) -> Result<(Vec<u8>, String)> {
    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        return Err(classify_http_error(status.as_u16(), &body, &headers));
    }

    let mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .filter(|v| v.starts_with("image/"))
        .or_else(|| mime_from_url(url).map(str::to_string))
        .unwrap_or_else(|| "image/png".to_string());

    let bytes = response.bytes().await?.to_vec();
    Ok((bytes, mime))
}

/// Sniffs a MIME type from a URL's file extension, ignoring query strings.
pub fn mime_from_url(url: &str) -> Option<&'static str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = path.rsplit('.').next()?;
    ImageFormat::from_extension(ext).map(|f| f.mime_type())
}

/// Encodes a solid-color 8-bit RGB PNG by hand.
///
/// Used for the google provider's text-only placeholder, which must work
/// even when the raster decoding stack is unusable, so this builds the
/// IHDR/IDAT/IEND chunks directly: filter-0 scanlines, zlib-compressed,
/// CRC32 per chunk.
pub fn solid_png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&PNG_SIGNATURE);

    // IHDR: 8-bit depth, color type 2 (RGB), default compression/filter/interlace
    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    ihdr.extend_from_slice(&[8, 2, 0, 0, 0]);
    write_chunk(&mut out, b"IHDR", &ihdr);

    // Each scanline: filter byte 0 followed by RGB pixels
    let stride = width as usize * 3;
    let mut raw = Vec::with_capacity((stride + 1) * height as usize);
    for _ in 0..height {
        raw.push(0u8);
        for _ in 0..width {
            raw.extend_from_slice(&rgb);
        }
    }

    // Compressing into a Vec cannot fail
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(&raw).expect("write zlib stream");
    let compressed = encoder.finish().expect("finish zlib stream");
    write_chunk(&mut out, b"IDAT", &compressed);

    write_chunk(&mut out, b"IEND", &[]);
    out
}

fn write_chunk(out: &mut Vec<u8>, tag: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(tag);
    out.extend_from_slice(data);
    out.extend_from_slice(&png_crc32(tag, data).to_be_bytes());
}

fn png_crc32(tag: &[u8], data: &[u8]) -> u32 {
    static TABLE: std::sync::OnceLock<[u32; 256]> = std::sync::OnceLock::new();
    let table = TABLE.get_or_init(|| {
        let mut t = [0u32; 256];
        for n in 0..256u32 {
            let mut c = n;
            for _ in 0..8 {
                c = if c & 1 != 0 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
            }
            t[n as usize] = c;
        }
        t
    });

    let mut c = 0xFFFF_FFFFu32;
    for &b in tag.iter().chain(data.iter()) {
        c = table[((c ^ u32::from(b)) & 0xFF) as usize] ^ (c >> 8);
    }
    c ^ 0xFFFF_FFFF
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, 99])
        });
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image::ImageFormat::Jpeg)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_ensure_png_passes_png_through_unchanged() {
        let png = solid_png(4, 4, [10, 20, 30]);
        let (out, mime) = ensure_png(png.clone(), "image/png");
        assert_eq!(out, png);
        assert_eq!(mime, "image/png");
    }

    #[test]
    fn test_ensure_png_reencodes_jpeg() {
        let jpeg = encode_jpeg(8, 8);
        let (out, mime) = ensure_png(jpeg.clone(), "image/jpeg");

        assert_eq!(mime, "image/png");
        assert_eq!(ImageFormat::from_magic_bytes(&out), Some(ImageFormat::Png));

        // Pixel data survives re-encoding (PNG is lossless over the decoded JPEG)
        let from_jpeg = image::load_from_memory(&jpeg).unwrap().to_rgb8();
        let from_png = image::load_from_memory(&out).unwrap().to_rgb8();
        assert_eq!(from_jpeg.as_raw(), from_png.as_raw());
    }

    #[test]
    fn test_ensure_png_round_trip_is_pixel_stable() {
        let jpeg = encode_jpeg(6, 6);
        let (first, _) = ensure_png(jpeg, "image/jpeg");
        let (second, mime) = ensure_png(first.clone(), "image/png");

        assert_eq!(mime, "image/png");
        let a = image::load_from_memory(&first).unwrap().to_rgb8();
        let b = image::load_from_memory(&second).unwrap().to_rgb8();
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn test_ensure_png_returns_undecodable_bytes_unchanged() {
        let garbage = b"definitely not an image".to_vec();
        let (out, mime) = ensure_png(garbage.clone(), "application/octet-stream");
        assert_eq!(out, garbage);
        assert_eq!(mime, "application/octet-stream");
    }

    #[test]
    fn test_mime_from_url() {
        assert_eq!(mime_from_url("https://x.test/a/b.png"), Some("image/png"));
        assert_eq!(
            mime_from_url("https://x.test/img.jpeg?sig=abc.def"),
            Some("image/jpeg")
        );
        assert_eq!(mime_from_url("https://x.test/img.webp#frag"), Some("image/webp"));
        assert_eq!(mime_from_url("https://x.test/api/result"), None);
    }

    #[test]
    fn test_solid_png_is_a_decodable_png() {
        let png = solid_png(100, 100, [0, 100, 200]);
        assert!(png.starts_with(&PNG_SIGNATURE));

        let decoded = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (100, 100));
        assert!(decoded
            .pixels()
            .all(|p| p.0 == [0, 100, 200]));
    }

    #[test]
    fn test_solid_png_is_deterministic() {
        assert_eq!(solid_png(32, 16, [1, 2, 3]), solid_png(32, 16, [1, 2, 3]));
    }

    #[test]
    fn test_png_crc32_reference_value() {
        // CRC-32 of "IEND" with no data, fixed by the PNG spec
        assert_eq!(png_crc32(b"IEND", &[]), 0xAE42_6082);
    }
}
