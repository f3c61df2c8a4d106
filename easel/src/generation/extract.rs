//! Image payload extraction from provider responses.
//!
//! Providers differ in how they return the image: some inline base64, some
//! return a hosted URL, and some nest the URL under an `image_url` object.
//! Extraction checks the first entry of `data` for each shape in a fixed
//! order, preferring inline bytes over URLs.

use crate::db::models::generations::GenerationOutput;
use serde_json::Value;

/// Pull the image out of a provider response body.
///
/// Checks `data[0]` for, in order: `b64_json`, `url`, `image_url.url`,
/// `image_url` as a plain string. Returns `None` when no recognized field
/// carries a non-empty value.
pub fn extract_image(response: &Value) -> Option<GenerationOutput> {
    let entry = response.get("data")?.get(0)?;

    if let Some(b64) = non_empty_str(entry.get("b64_json")) {
        return Some(GenerationOutput::Inline(b64.to_string()));
    }

    if let Some(url) = non_empty_str(entry.get("url")) {
        return Some(GenerationOutput::Url(url.to_string()));
    }

    if let Some(image_url) = entry.get("image_url") {
        if let Some(url) = non_empty_str(image_url.get("url")) {
            return Some(GenerationOutput::Url(url.to_string()));
        }
        if let Some(url) = image_url.as_str().filter(|s| !s.is_empty()) {
            return Some(GenerationOutput::Url(url.to_string()));
        }
    }

    None
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prefers_inline_bytes_over_url() {
        let response = json!({
            "data": [{"b64_json": "aGVsbG8=", "url": "https://img.example/1.png"}]
        });
        assert_eq!(
            extract_image(&response),
            Some(GenerationOutput::Inline("aGVsbG8=".to_string()))
        );
    }

    #[test]
    fn falls_back_to_url() {
        let response = json!({"data": [{"url": "https://img.example/1.png"}]});
        assert_eq!(
            extract_image(&response),
            Some(GenerationOutput::Url("https://img.example/1.png".to_string()))
        );
    }

    #[test]
    fn reads_nested_image_url_object() {
        let response = json!({"data": [{"image_url": {"url": "https://img.example/2.png"}}]});
        assert_eq!(
            extract_image(&response),
            Some(GenerationOutput::Url("https://img.example/2.png".to_string()))
        );
    }

    #[test]
    fn reads_plain_image_url_string() {
        let response = json!({"data": [{"image_url": "https://img.example/3.png"}]});
        assert_eq!(
            extract_image(&response),
            Some(GenerationOutput::Url("https://img.example/3.png".to_string()))
        );
    }

    #[test]
    fn rejects_empty_and_missing_payloads() {
        assert_eq!(extract_image(&json!({})), None);
        assert_eq!(extract_image(&json!({"data": []})), None);
        assert_eq!(extract_image(&json!({"data": [{"b64_json": ""}]})), None);
        assert_eq!(extract_image(&json!({"data": [{"revised_prompt": "x"}]})), None);
    }

    #[test]
    fn only_the_first_entry_counts() {
        let response = json!({
            "data": [
                {"note": "no image here"},
                {"url": "https://img.example/ignored.png"}
            ]
        });
        assert_eq!(extract_image(&response), None);
    }
}
