use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use uuid::Uuid;

pub mod catalog;
pub mod chat;

pub use catalog::*;
pub use chat::*;

/// Kind of media a recommendation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
    Book,
}

impl MediaType {
    /// Human label used in prompts and chat messages
    pub fn label(&self) -> &'static str {
        match self {
            MediaType::Movie => "Movie",
            MediaType::Tv => "TV Show",
            MediaType::Book => "Book",
        }
    }

    /// Plural noun used in generated prompts
    pub fn plural(&self) -> &'static str {
        match self {
            MediaType::Movie => "movies",
            MediaType::Tv => "TV shows",
            MediaType::Book => "books",
        }
    }

    pub fn is_screen(&self) -> bool {
        matches!(self, MediaType::Movie | MediaType::Tv)
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaType::Movie => write!(f, "movie"),
            MediaType::Tv => write!(f, "tv"),
            MediaType::Book => write!(f, "book"),
        }
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "movie" | "movies" => Ok(MediaType::Movie),
            "tv" | "tv show" | "tv_show" | "series" => Ok(MediaType::Tv),
            "book" | "books" => Ok(MediaType::Book),
            other => Err(format!("Unknown media type: {}", other)),
        }
    }
}

/// Film industry filter offered by the guided chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Industry {
    Hollywood,
    Bollywood,
    Both,
}

impl Industry {
    pub fn label(&self) -> &'static str {
        match self {
            Industry::Hollywood => "Hollywood",
            Industry::Bollywood => "Bollywood",
            Industry::Both => "Both",
        }
    }

    /// Phrase appended to composite prompts
    pub fn prompt_phrase(&self) -> &'static str {
        match self {
            Industry::Hollywood => "from Hollywood (American and English-language productions)",
            Industry::Bollywood => "from Bollywood (Indian Hindi-language productions)",
            Industry::Both => "from either Hollywood or Bollywood",
        }
    }
}

/// A submitted request for recommendations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub prompt: String,
    pub media_type: MediaType,
    #[serde(default)]
    pub genres: Vec<String>,
}

/// Model output prior to enrichment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecommendation {
    pub title: String,
    pub description: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
}

/// Identifier in a third-party catalog: numeric for TMDB, textual for books
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CatalogId {
    Tmdb(u64),
    Book(String),
}

impl Display for CatalogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogId::Tmdb(id) => write!(f, "{}", id),
            CatalogId::Book(id) => write!(f, "{}", id),
        }
    }
}

/// A recommendation with catalog id and poster attached when a match was found
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecommendation {
    #[serde(flatten)]
    pub recommendation: RawRecommendation,
    pub catalog_id: Option<CatalogId>,
    pub poster_url: Option<String>,
}

impl EnrichedRecommendation {
    /// Enrichment found nothing for this item
    pub fn unmatched(recommendation: RawRecommendation) -> Self {
        Self {
            recommendation,
            catalog_id: None,
            poster_url: None,
        }
    }
}

/// A stored generation in the recommendation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub prompt: String,
    pub media_type: MediaType,
    pub created_at: DateTime<Utc>,
    pub results: Vec<EnrichedRecommendation>,
}

impl HistoryEntry {
    pub fn new(prompt: String, media_type: MediaType, results: Vec<EnrichedRecommendation>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            prompt,
            media_type,
            created_at: Utc::now(),
            results,
        }
    }

    /// Two entries with the same key are the same generation
    pub fn same_key(&self, other: &HistoryEntry) -> bool {
        self.prompt == other.prompt && self.media_type == other.media_type
    }
}

/// A theme suggestion offered during the guided chat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Theme {
    pub name: String,
    pub description: String,
    pub keywords: Vec<String>,
}
