//! Shared types for the dish-explanation service.
//!
//! Display language is always the language the user asked the explanation
//! to be written in. The detected language of the menu text itself is
//! metadata only and never gates matching.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error for language codes outside the supported set.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unsupported language code: {0}")]
pub struct UnsupportedLanguage(pub String);

/// Languages an explanation can be rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayLanguage {
    En,
    Es,
    Zh,
    Fr,
}

impl DisplayLanguage {
    pub const ALL: [DisplayLanguage; 4] = [
        DisplayLanguage::En,
        DisplayLanguage::Es,
        DisplayLanguage::Zh,
        DisplayLanguage::Fr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayLanguage::En => "en",
            DisplayLanguage::Es => "es",
            DisplayLanguage::Zh => "zh",
            DisplayLanguage::Fr => "fr",
        }
    }

    /// Full language name, used when prompting the generator.
    pub fn name(&self) -> &'static str {
        match self {
            DisplayLanguage::En => "English",
            DisplayLanguage::Es => "Spanish",
            DisplayLanguage::Zh => "Simplified Chinese",
            DisplayLanguage::Fr => "French",
        }
    }

    /// Cuisine sentinel for submissions that are not food at all.
    pub fn not_food_cuisine(&self) -> &'static str {
        match self {
            DisplayLanguage::En => "Not applicable",
            DisplayLanguage::Es => "No aplicable",
            DisplayLanguage::Zh => "不适用",
            DisplayLanguage::Fr => "Non applicable",
        }
    }

    /// Explanation sentinel paired with [`not_food_cuisine`](Self::not_food_cuisine).
    pub fn not_food_explanation(&self) -> &'static str {
        match self {
            DisplayLanguage::En => "This does not appear to be a food item.",
            DisplayLanguage::Es => "Esto no parece ser un alimento.",
            DisplayLanguage::Zh => "这似乎不是食物。",
            DisplayLanguage::Fr => "Ceci ne semble pas être un aliment.",
        }
    }
}

impl FromStr for DisplayLanguage {
    type Err = UnsupportedLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" => Ok(DisplayLanguage::En),
            "es" => Ok(DisplayLanguage::Es),
            "zh" => Ok(DisplayLanguage::Zh),
            "fr" => Ok(DisplayLanguage::Fr),
            other => Err(UnsupportedLanguage(other.to_string())),
        }
    }
}

impl fmt::Display for DisplayLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One known dish + display-language pairing in the corpus.
///
/// Created exactly once, on a cache miss that survives the dedup re-check.
/// Never updated or deleted by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DishRecord {
    /// Row id, absent before the record is stored.
    pub id: Option<i64>,
    /// Dish name as originally submitted (source-language spelling).
    pub name: String,
    pub display_language: DisplayLanguage,
    /// Heuristically detected language of the menu text. Metadata only.
    pub menu_language: String,
    pub explanation: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Each entry formatted as "Contains X".
    #[serde(default)]
    pub allergens: Vec<String>,
    pub cuisine: String,
    /// Weak reference, used only to bias matching.
    pub restaurant_id: Option<i64>,
    pub restaurant_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Wire types (daemon <-> clients)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainRequest {
    pub dish_name: String,
    /// Language code, validated against [`DisplayLanguage`] at the edge.
    pub language: String,
    #[serde(default)]
    pub restaurant_id: Option<String>,
    #[serde(default)]
    pub restaurant_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainResponse {
    pub explanation: String,
    pub tags: Vec<String>,
    pub allergens: Vec<String>,
    pub cuisine: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCandidate {
    pub name: String,
    pub explanation: String,
    pub cuisine: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub candidates: Vec<SearchCandidate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub corpus_entries: u64,
}

/// Error body for 5xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
