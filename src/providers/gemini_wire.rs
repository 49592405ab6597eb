//! Gemini-format wire helpers shared by the google REST fallback and the
//! yunwu relay.
//!
//! Requests use the snake_case spelling (`inline_data`). Responses are
//! walked tolerantly: live endpoints answer with either `inline_data` or
//! `inlineData`, `mime_type` or `mimeType`, `data` or `bytes`, so every
//! field lookup tries each spelling before declaring it absent.

use base64::Engine;
use serde_json::{json, Value};

use crate::error::{NanoRenderError, Result};
use crate::ratio::find_closest_ratio;
use crate::types::{ImageFormat, ResolutionTier};

/// Builds a text part.
pub(crate) fn text_part(text: &str) -> Value {
    json!({ "text": text })
}

/// Builds an inline image part, sniffing the MIME type from magic bytes.
pub(crate) fn inline_image_part(bytes: &[u8]) -> Value {
    let mime = ImageFormat::from_magic_bytes(bytes)
        .map(|f| f.mime_type())
        .unwrap_or("image/png");
    json!({
        "inline_data": {
            "mime_type": mime,
            "data": base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    })
}

/// Builds the `generationConfig` carrying resolution tier and aspect ratio.
pub(crate) fn generation_config(width: u32, height: u32) -> Value {
    json!({
        "responseModalities": ["TEXT", "IMAGE"],
        "imageConfig": {
            "aspectRatio": find_closest_ratio(i64::from(width), i64::from(height)),
            "imageSize": ResolutionTier::from_dimensions(width, height).as_str(),
        }
    })
}

/// Assembles the full request body from ordered parts.
pub(crate) fn request_body(parts: Vec<Value>, width: u32, height: u32) -> Value {
    json!({
        "contents": [{ "parts": parts }],
        "generationConfig": generation_config(width, height),
    })
}

fn field<'a>(value: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| value.get(name))
}

fn candidate_parts(body: &Value) -> Result<&Vec<Value>> {
    let candidates = body
        .get("candidates")
        .and_then(Value::as_array)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| {
            NanoRenderError::MalformedResponse("no candidates in response".to_string())
        })?;

    candidates[0]
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array)
        .ok_or_else(|| {
            NanoRenderError::MalformedResponse("candidate has no content parts".to_string())
        })
}

/// Extracts the first inline image from a Gemini-format response.
///
/// Returns `Ok(None)` when the response is well-formed but holds only text
/// parts; the caller decides whether that is an error or a placeholder.
pub(crate) fn extract_inline_image(body: &Value) -> Result<Option<(Vec<u8>, String)>> {
    for part in candidate_parts(body)? {
        let Some(inline) = field(part, &["inline_data", "inlineData"]) else {
            continue;
        };
        let Some(data) = field(inline, &["data", "bytes"]).and_then(Value::as_str) else {
            continue;
        };
        if data.is_empty() {
            continue;
        }

        let mime = field(inline, &["mime_type", "mimeType"])
            .and_then(Value::as_str)
            .unwrap_or("image/png")
            .to_string();

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| NanoRenderError::Decode(e.to_string()))?;

        return Ok(Some((decoded, mime)));
    }

    Ok(None)
}

/// Concatenates the text parts of a response, for diagnostics when no
/// image came back.
pub(crate) fn collect_text(body: &Value) -> String {
    candidate_parts(body)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_part_carries_sniffed_mime() {
        let png = crate::codec::solid_png(2, 2, [1, 2, 3]);
        let part = inline_image_part(&png);
        assert_eq!(part["inline_data"]["mime_type"], "image/png");
        assert!(part["inline_data"]["data"].as_str().unwrap().len() > 8);
    }

    #[test]
    fn test_generation_config_values() {
        let config = generation_config(3840, 2160);
        assert_eq!(config["imageConfig"]["aspectRatio"], "16:9");
        assert_eq!(config["imageConfig"]["imageSize"], "2K");
    }

    #[test]
    fn test_extract_snake_case_spelling() {
        let body = json!({
            "candidates": [{ "content": { "parts": [
                { "inline_data": { "mime_type": "image/png", "data": "AQID" } }
            ]}}]
        });
        let (bytes, mime) = extract_inline_image(&body).unwrap().unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(mime, "image/png");
    }

    #[test]
    fn test_extract_camel_case_spelling() {
        let body = json!({
            "candidates": [{ "content": { "parts": [
                { "inlineData": { "mimeType": "image/jpeg", "bytes": "AQID" } }
            ]}}]
        });
        let (bytes, mime) = extract_inline_image(&body).unwrap().unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(mime, "image/jpeg");
    }

    #[test]
    fn test_extract_skips_text_parts_before_image() {
        let body = json!({
            "candidates": [{ "content": { "parts": [
                { "text": "here is your render" },
                { "inlineData": { "mimeType": "image/png", "data": "AQID" } }
            ]}}]
        });
        assert!(extract_inline_image(&body).unwrap().is_some());
    }

    #[test]
    fn test_text_only_response_is_none_not_error() {
        let body = json!({
            "candidates": [{ "content": { "parts": [ { "text": "cannot draw that" } ]}}]
        });
        assert!(extract_inline_image(&body).unwrap().is_none());
        assert_eq!(collect_text(&body), "cannot draw that");
    }

    #[test]
    fn test_missing_candidates_is_malformed() {
        let body = json!({ "promptFeedback": {} });
        assert!(matches!(
            extract_inline_image(&body),
            Err(NanoRenderError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_empty_data_field_is_skipped() {
        let body = json!({
            "candidates": [{ "content": { "parts": [
                { "inline_data": { "mime_type": "image/png", "data": "" } }
            ]}}]
        });
        assert!(extract_inline_image(&body).unwrap().is_none());
    }

    #[test]
    fn test_bad_base64_is_decode_error() {
        let body = json!({
            "candidates": [{ "content": { "parts": [
                { "inline_data": { "data": "!!not-base64!!" } }
            ]}}]
        });
        assert!(matches!(
            extract_inline_image(&body),
            Err(NanoRenderError::Decode(_))
        ));
    }
}
