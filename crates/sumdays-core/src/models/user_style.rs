//! Writing style profile model

use serde::{Deserialize, Serialize};

/// A writing style extracted from the user's own diaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStyle {
    pub style_id: i64,
    pub style_name: String,
    /// Style embedding vector
    pub style_vector: Vec<f32>,
    /// Example sentences the style was extracted from
    pub style_examples: Vec<String>,
    /// Structured prompt description (tone, formality, endings, ...)
    pub style_prompt: serde_json::Value,
    /// Sample diary generated with the style applied
    pub sample_diary: String,
}
