//! Per-agent model selection.
//!
//! Output-length limits are fixed per role. There is no runtime switch that
//! lifts them for every agent at once.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString};

/// Gemini models used by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum GeminiModel {
    /// Gemini 2.5 Flash Lite - cheapest, for simple structured tasks
    FlashLite25,
    /// Gemini 2.5 Flash - balanced cost and quality (default)
    #[default]
    Flash25,
    /// Gemini 2.0 Flash - previous generation
    Flash20,
    /// Any other model id starting with "gemini-"
    Custom(String),
}

impl GeminiModel {
    /// Returns the full API model identifier.
    pub fn as_api_id(&self) -> &str {
        match self {
            Self::FlashLite25 => "gemini-2.5-flash-lite",
            Self::Flash25 => "gemini-2.5-flash",
            Self::Flash20 => "gemini-2.0-flash",
            Self::Custom(s) => s,
        }
    }
}

impl std::str::FromStr for GeminiModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flash-lite" | "lite" | "gemini-2.5-flash-lite" => Ok(Self::FlashLite25),
            "flash" | "flash-2.5" | "gemini-2.5-flash" => Ok(Self::Flash25),
            "flash-2.0" | "flash20" | "gemini-2.0-flash" => Ok(Self::Flash20),
            other if other.starts_with("gemini-") => Ok(Self::Custom(s.to_string())),
            _ => Err(format!("unknown Gemini model '{s}'")),
        }
    }
}

impl fmt::Display for GeminiModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_api_id())
    }
}

/// Which step of the pipeline is calling the generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AgentRole {
    Interviewer,
    Architect,
    Researcher,
    Validator,
    Editor,
    /// The small gap-fill call issued by the editor.
    EditorResearch,
    /// Candidate generation when video search is unavailable.
    VideoFallback,
}

/// Model, sampling temperature and output budget for one role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl ModelProfile {
    pub fn new(model: &GeminiModel, temperature: f32, max_output_tokens: u32) -> Self {
        Self {
            model: model.as_api_id().to_string(),
            temperature,
            max_output_tokens,
        }
    }

    /// Default profile for each role.
    pub fn for_role(role: AgentRole) -> Self {
        use GeminiModel::*;
        match role {
            AgentRole::Interviewer => Self::new(&FlashLite25, 0.7, 3072),
            AgentRole::Architect => Self::new(&Flash25, 0.7, 6144),
            AgentRole::Researcher => Self::new(&Flash25, 0.7, 12288),
            AgentRole::Validator => Self::new(&FlashLite25, 0.3, 3072),
            AgentRole::Editor => Self::new(&Flash25, 0.7, 12288),
            AgentRole::EditorResearch => Self::new(&FlashLite25, 0.5, 3072),
            AgentRole::VideoFallback => Self::new(&Flash20, 0.3, 6144),
        }
    }

    pub fn with_model(mut self, model: &GeminiModel) -> Self {
        self.model = model.as_api_id().to_string();
        self
    }
}
