//! Remote card store
//!
//! The sync engine talks to the store through [`CardStore`]. [`MochiClient`]
//! is the HTTP implementation; [`MemoryCardStore`] keeps everything in memory
//! and records calls, for tests and dry runs.

mod client;
mod memory;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::attachments::Attachment;

pub use client::{MochiClient, DEFAULT_API_URL};
pub use memory::{Call, MemoryCardStore};

/// A card as stored remotely
///
/// Unknown fields in API responses are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCard {
    pub id: String,
    pub content: String,
    #[serde(rename = "deck-id")]
    pub deck_id: String,
    #[serde(rename = "archived?", default)]
    pub archived: bool,
    #[serde(rename = "trashed?", default)]
    pub trashed: Option<String>,
    #[serde(rename = "review-reverse?", default)]
    pub reverse_display: bool,
    #[serde(rename = "template-id", default)]
    pub template_id: Option<String>,
}

impl RemoteCard {
    /// A plain card with all flags at their defaults
    pub fn new(id: impl Into<String>, deck_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            deck_id: deck_id.into(),
            archived: false,
            trashed: None,
            reverse_display: false,
            template_id: None,
        }
    }

    /// The first flag set away from its default, if any
    ///
    /// Archived, trashed, reverse-displayed and templated cards are not
    /// managed by sync.
    pub fn unsupported_field(&self) -> Option<&'static str> {
        if self.archived {
            Some("archived?")
        } else if self.trashed.is_some() {
            Some("trashed?")
        } else if self.reverse_display {
            Some("review-reverse?")
        } else if self.template_id.is_some() {
            Some("template-id")
        } else {
            None
        }
    }
}

/// Fields sent when updating a card
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardUpdate {
    pub content: String,
    #[serde(rename = "deck-id")]
    pub deck_id: String,
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("Unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Not found: {url}")]
    NotFound { url: String },
}

/// Operations the sync engine needs from a remote card store
///
/// Every call blocks until the store has answered.
pub trait CardStore {
    /// All cards, optionally restricted to one deck
    fn list_cards(&self, deck_id: Option<&str>) -> Result<Vec<RemoteCard>, TransportError>;

    fn retrieve_card(&self, id: &str) -> Result<RemoteCard, TransportError>;

    fn create_card(&self, deck_id: &str, content: &str) -> Result<RemoteCard, TransportError>;

    fn update_card(&self, id: &str, update: &CardUpdate) -> Result<RemoteCard, TransportError>;

    fn delete_card(&self, id: &str) -> Result<(), TransportError>;

    /// Upload (or replace) an attachment of a card
    fn upload_attachment(&self, card_id: &str, attachment: &Attachment)
        -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_card_wire_names() {
        let json = r#"{
            "id": "abc",
            "content": "Q\n---\nA",
            "deck-id": "D1",
            "archived?": false,
            "review-reverse?": false,
            "tags": [],
            "pos": "m"
        }"#;

        let card: RemoteCard = serde_json::from_str(json).unwrap();
        assert_eq!(card, RemoteCard::new("abc", "D1", "Q\n---\nA"));
        assert_eq!(card.unsupported_field(), None);
    }

    #[test]
    fn test_unsupported_fields() {
        let mut card = RemoteCard::new("a", "D", "c");
        card.trashed = Some("2024-01-01".to_string());
        assert_eq!(card.unsupported_field(), Some("trashed?"));

        let mut card = RemoteCard::new("a", "D", "c");
        card.template_id = Some("t".to_string());
        assert_eq!(card.unsupported_field(), Some("template-id"));

        let mut card = RemoteCard::new("a", "D", "c");
        card.archived = true;
        assert_eq!(card.unsupported_field(), Some("archived?"));
    }

    #[test]
    fn test_update_body() {
        let update = CardUpdate {
            content: "c".to_string(),
            deck_id: "D".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            serde_json::json!({"content": "c", "deck-id": "D"})
        );
    }
}
