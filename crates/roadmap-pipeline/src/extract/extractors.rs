use super::error::ParseError;
use regex::Regex;
use tracing::debug;

/// Finds the first balanced JSON object or array in free text.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonEntityExtractor;

impl JsonEntityExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract first complete JSON entity (object or array) from text
    pub fn extract(&self, text: &str) -> Result<String, ParseError> {
        let mut depth = 0usize;
        let mut start_pos = None;
        let mut in_string = false;
        let mut escape_next = false;
        let mut opening_char = None;

        for (i, ch) in text.char_indices() {
            if escape_next {
                escape_next = false;
                continue;
            }

            match ch {
                '\\' if in_string => escape_next = true,
                '"' if start_pos.is_some() => in_string = !in_string,
                '{' | '[' if !in_string => {
                    if depth == 0 {
                        start_pos = Some(i);
                        opening_char = Some(ch);
                    }
                    depth += 1;
                }
                '}' | ']' if !in_string && depth > 0 => {
                    depth -= 1;
                    if depth == 0
                        && let Some(p) = start_pos
                        && let Some(opening) = opening_char
                    {
                        let is_matched = (opening == '{' && ch == '}') || (opening == '[' && ch == ']');
                        if is_matched {
                            return Ok(text[p..=i].to_string());
                        }
                        start_pos = None;
                        opening_char = None;
                    }
                }
                _ => {}
            }
        }

        debug!("No balanced JSON entity in text");
        Err(ParseError::NoJsonFound)
    }
}

/// Extractor for Markdown code blocks
#[derive(Debug, Default, Clone)]
pub struct MarkdownCodeBlockExtractor {
    /// Optional language to filter by (e.g., "json")
    pub language: Option<String>,
}

impl MarkdownCodeBlockExtractor {
    pub fn new() -> Self {
        Self { language: None }
    }

    pub fn with_language(language: impl Into<String>) -> Self {
        Self {
            language: Some(language.into()),
        }
    }

    /// Extract content from the first matching code block.
    pub fn extract(&self, text: &str) -> Result<String, ParseError> {
        let pattern = match &self.language {
            Some(lang) => format!(
                r"(?ms)^\s*```\s*{}\s*\n(.*?)^\s*```\s*$",
                regex::escape(lang)
            ),
            None => r"(?ms)^\s*```[^\n]*\n(.*?)^\s*```\s*$".to_string(),
        };

        let regex = Regex::new(&pattern)
            .map_err(|e| ParseError::NoCodeBlock(format!(" (bad pattern: {e})")))?;

        if let Some(captures) = regex.captures(text)
            && let Some(content) = captures.get(1)
        {
            return Ok(content.as_str().trim_end().to_string());
        }

        Err(ParseError::NoCodeBlock(match &self.language {
            Some(lang) => format!(" with language '{lang}'"),
            None => String::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_object_from_prose() {
        let text = "Here is some JSON: {\"key\": \"value\"} and more text";
        assert_eq!(
            JsonEntityExtractor::new().extract(text).unwrap(),
            "{\"key\": \"value\"}"
        );
    }

    #[test]
    fn test_extract_first_of_two_objects() {
        let text = "Some text {\"first\": 1} more text {\"second\": 2}";
        assert_eq!(
            JsonEntityExtractor::new().extract(text).unwrap(),
            "{\"first\": 1}"
        );
    }

    #[test]
    fn test_extract_array_with_braces_in_strings() {
        let text = r#"Videos: [{"title": "Use {braces} ]"}] done"#;
        assert_eq!(
            JsonEntityExtractor::new().extract(text).unwrap(),
            r#"[{"title": "Use {braces} ]"}]"#
        );
    }

    #[test]
    fn test_no_json() {
        assert_eq!(
            JsonEntityExtractor::new().extract("plain words"),
            Err(ParseError::NoJsonFound)
        );
    }

    #[test]
    fn test_markdown_block_with_language() {
        let text = "Result:\n```json\n{\"a\": 1}\n```\n";
        let extractor = MarkdownCodeBlockExtractor::with_language("json");
        assert_eq!(extractor.extract(text).unwrap(), "{\"a\": 1}");
        assert!(
            MarkdownCodeBlockExtractor::with_language("rust")
                .extract(text)
                .is_err()
        );
    }
}
