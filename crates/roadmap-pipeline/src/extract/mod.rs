//! Pulling JSON out of raw model text.
//!
//! Structured-output backends usually return clean JSON, but generative
//! models still wrap answers in markdown fences or prose, or leave trailing
//! commas behind. These helpers find the JSON document and repair the common
//! syntax slips before parsing.
//!
//! ```rust
//! use roadmap_pipeline::extract::parse_json_value;
//!
//! let raw = "Sure!\n```json\n{\"title\": \"Rust\", \"sessions\": 8,}\n```";
//! let value = parse_json_value(raw).unwrap();
//! assert_eq!(value["title"], "Rust");
//! ```

pub mod error;
pub mod extractors;

pub use self::error::ParseError;
pub use self::extractors::{JsonEntityExtractor, MarkdownCodeBlockExtractor};
pub use fuzzy_parser::sanitize_json;

use serde_json::Value as JsonValue;

/// Extracts the JSON document embedded in `text`.
///
/// Tries a ```` ```json ```` block, then any fenced block containing JSON,
/// then the first balanced object or array in the text.
pub fn extract_json(text: &str) -> Result<String, ParseError> {
    if let Ok(content) = MarkdownCodeBlockExtractor::with_language("json").extract(text) {
        return Ok(content);
    }

    if let Ok(content) = MarkdownCodeBlockExtractor::new().extract(text)
        && let Ok(json) = JsonEntityExtractor::new().extract(&content)
    {
        return Ok(json);
    }

    JsonEntityExtractor::new().extract(text)
}

/// Extracts and parses the JSON document in `text`, repairing it if needed.
pub fn parse_json_value(text: &str) -> Result<JsonValue, ParseError> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    let extracted = extract_json(trimmed)?;
    match serde_json::from_str(&extracted) {
        Ok(value) => Ok(value),
        Err(_) => {
            let repaired = sanitize_json(&extracted);
            serde_json::from_str(&repaired).map_err(|e| ParseError::InvalidJson(e.to_string()))
        }
    }
}
