use thiserror::Error;

/// Failures while pulling structured data out of raw model text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("No JSON document found in response")]
    NoJsonFound,

    #[error("No markdown code block found{0}")]
    NoCodeBlock(String),

    #[error("Invalid JSON after repair: {0}")]
    InvalidJson(String),
}
