use serde::{Deserialize, Serialize};

use super::{Industry, MediaType};

/// Steps of the guided chat, in the only order they can be visited
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatStep {
    Initial,
    MediaType,
    GenreSelection,
    ThemeSelection,
    IndustrySelection,
    Generating,
    Results,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    Agent,
    User,
}

/// One message in the chat transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: ChatRole,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl TranscriptEntry {
    pub fn agent(text: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            role: ChatRole::Agent,
            text: text.into(),
            options,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
            options: Vec::new(),
        }
    }
}

/// User input accepted by the guided chat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ChatAction {
    Start,
    SelectMediaType(MediaType),
    ToggleGenre(String),
    ConfirmGenres,
    ToggleTheme(String),
    ConfirmThemes,
    SelectIndustry(Industry),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_action_deserialization() {
        let action: ChatAction =
            serde_json::from_str(r#"{"type": "select_media_type", "value": "book"}"#).unwrap();
        assert_eq!(action, ChatAction::SelectMediaType(MediaType::Book));

        let action: ChatAction = serde_json::from_str(r#"{"type": "confirm_genres"}"#).unwrap();
        assert_eq!(action, ChatAction::ConfirmGenres);

        let action: ChatAction =
            serde_json::from_str(r#"{"type": "toggle_genre", "value": "Sci-Fi"}"#).unwrap();
        assert_eq!(action, ChatAction::ToggleGenre("Sci-Fi".to_string()));
    }

    #[test]
    fn test_steps_are_ordered() {
        assert!(ChatStep::Initial < ChatStep::MediaType);
        assert!(ChatStep::ThemeSelection < ChatStep::IndustrySelection);
        assert!(ChatStep::Generating < ChatStep::Results);
    }

    #[test]
    fn test_transcript_entry_skips_empty_options() {
        let value = serde_json::to_value(TranscriptEntry::user("Movie")).unwrap();
        assert_eq!(value["role"], "user");
        assert!(value.get("options").is_none());
    }
}
