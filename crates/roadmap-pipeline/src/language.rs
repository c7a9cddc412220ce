//! Input language detection.
//!
//! Detection is a pure inspection of the topic text. It never calls out to a
//! generation backend, so it is safe to run before any agent is constructed.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use strum::{Display, EnumString};

const HEBREW_BLOCK: RangeInclusive<char> = '\u{0590}'..='\u{05FF}';

/// Output language of a pipeline run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    He,
}

impl Language {
    /// ISO 639-1 code, as passed to the video search backend.
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::He => "he",
        }
    }

    /// Instruction prepended to content-generation prompts, if any.
    pub fn prompt_instruction(&self) -> Option<&'static str> {
        match self {
            Language::En => None,
            Language::He => Some(
                "IMPORTANT: The learner wrote in Hebrew. Write every human-readable field \
                 of your response in Hebrew. Keep JSON keys, enum values and code in English.",
            ),
        }
    }
}

/// Detects the language of `text`.
///
/// Any character from the Hebrew block selects Hebrew; everything else is English.
pub fn detect_language(text: &str) -> Language {
    if text.chars().any(|c| HEBREW_BLOCK.contains(&c)) {
        Language::He
    } else {
        Language::En
    }
}
