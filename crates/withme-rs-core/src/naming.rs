//! Companion name suggestion.

use crate::provider::{ChatMessage, CompletionRequest, ReplyProvider};
use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};

const NAMING_PROMPT: &str = r#"You are a gentle, supportive AI companion being asked to choose your own name.

You should choose a name that:
- Is warm, calming, and approachable
- Evokes feelings of safety, presence, and gentle support
- Is short (1-2 syllables preferred)
- Feels like a trusted friend, not clinical or robotic
- Could work for any gender

Examples of good names: Haven, Sage, Echo, Ember, Quinn, River, Aura, Lyra, Ori, Sol, Nova

Respond with ONLY a JSON object in this exact format, nothing else:
{"name": "YourChosenName", "meaning": "A brief 3-5 word meaning"}"#;

const NAMING_QUESTION: &str = "What name would you like to be called? Choose something that feels right for a compassionate companion.";

/// A proposed companion name with a short meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameSuggestion {
    pub name: String,
    pub meaning: String,
}

impl NameSuggestion {
    fn new(name: &str, meaning: &str) -> Self {
        Self {
            name: name.to_string(),
            meaning: meaning.to_string(),
        }
    }

    /// Used when the model answered but not with usable JSON.
    pub fn unparsed_fallback() -> Self {
        Self::new("Haven", "A safe place to land")
    }

    /// Used when the model call itself failed.
    pub fn failure_fallback() -> Self {
        Self::new("Still", "A calm, steady presence")
    }
}

/// Pull the first flat `{...}` object out of `text`.
pub fn parse_suggestion(text: &str) -> Option<NameSuggestion> {
    let object = Regex::new(r"\{[^}]+\}").ok()?.find(text)?;
    serde_json::from_str(object.as_str()).ok()
}

/// Ask the model to name itself. Never fails; falls back to a fixed name.
pub async fn suggest_companion_name(provider: &dyn ReplyProvider) -> NameSuggestion {
    let request = CompletionRequest {
        messages: vec![
            ChatMessage::system(NAMING_PROMPT),
            ChatMessage::user(NAMING_QUESTION),
        ],
        max_tokens: 100,
        temperature: 0.9,
    };
    match provider.complete(request).await {
        Ok(text) => parse_suggestion(&text).unwrap_or_else(|| {
            warn!("name suggestion was not valid json (len={})", text.len());
            NameSuggestion::unparsed_fallback()
        }),
        Err(err) => {
            warn!("name suggestion failed (kind={:?}): {}", err.kind(), err);
            NameSuggestion::failure_fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_object_surrounded_by_prose() {
        let text = "Sure! {\"name\": \"Ember\", \"meaning\": \"A small steady warmth\"} Hope you like it.";
        assert_eq!(
            parse_suggestion(text),
            Some(NameSuggestion::new("Ember", "A small steady warmth"))
        );
    }

    #[test]
    fn rejects_missing_or_malformed_objects() {
        assert_eq!(parse_suggestion("I like the name River."), None);
        assert_eq!(parse_suggestion("{name: River}"), None);
        assert_eq!(parse_suggestion("{\"name\": \"River\"}"), None);
    }
}
