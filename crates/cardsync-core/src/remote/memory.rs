//! In-memory card store
//!
//! Holds cards in a map, hands out sequential ids (`card0001`, `card0002`,
//! ...) and records every call. A failure can be scheduled after a number of
//! mutating calls to simulate an interrupted run.

use std::cell::RefCell;
use std::collections::BTreeMap;

use super::{CardStore, CardUpdate, RemoteCard, TransportError};
use crate::attachments::Attachment;

/// A call made against a [`MemoryCardStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List { deck_id: Option<String> },
    Retrieve { id: String },
    Create { deck_id: String, content: String },
    Update { id: String, update: CardUpdate },
    Delete { id: String },
    Upload { card_id: String, name: String },
}

impl Call {
    fn is_mutation(&self) -> bool {
        match self {
            Call::List { .. } | Call::Retrieve { .. } => false,
            Call::Create { .. } | Call::Update { .. } | Call::Delete { .. } | Call::Upload { .. } => {
                true
            }
        }
    }
}

#[derive(Debug, Default)]
struct State {
    cards: BTreeMap<String, RemoteCard>,
    attachments: BTreeMap<(String, String), Vec<u8>>,
    calls: Vec<Call>,
    next_id: usize,
    fail_after: Option<usize>,
    mutations: usize,
}

/// A [`CardStore`] kept in memory
#[derive(Debug, Default)]
pub struct MemoryCardStore {
    state: RefCell<State>,
}

impl MemoryCardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store already holding `cards`
    pub fn with_cards(cards: impl IntoIterator<Item = RemoteCard>) -> Self {
        let store = Self::new();
        store.state.borrow_mut().cards = cards
            .into_iter()
            .map(|card| (card.id.clone(), card))
            .collect();
        store
    }

    /// Fail every mutating call after the first `count` succeed
    pub fn fail_after(&self, count: usize) {
        let mut state = self.state.borrow_mut();
        state.fail_after = Some(state.mutations + count);
    }

    /// Stop failing
    pub fn recover(&self) {
        self.state.borrow_mut().fail_after = None;
    }

    /// Calls made so far
    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Current cards by id
    pub fn cards(&self) -> BTreeMap<String, RemoteCard> {
        self.state.borrow().cards.clone()
    }

    pub fn card(&self, id: &str) -> Option<RemoteCard> {
        self.state.borrow().cards.get(id).cloned()
    }

    /// Uploaded attachment bytes
    pub fn attachment(&self, card_id: &str, name: &str) -> Option<Vec<u8>> {
        self.state
            .borrow()
            .attachments
            .get(&(card_id.to_string(), name.to_string()))
            .cloned()
    }

    /// Record a call, failing it if a failure is scheduled
    fn record(&self, call: Call) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        let mutation = call.is_mutation();
        let url = format!("memory://{:?}", call);
        state.calls.push(call);

        if mutation {
            if let Some(limit) = state.fail_after {
                if state.mutations >= limit {
                    return Err(TransportError::Status {
                        method: "POST".to_string(),
                        url,
                        status: 503,
                        body: "scheduled failure".to_string(),
                    });
                }
            }
            state.mutations += 1;
        }
        Ok(())
    }

    fn not_found(id: &str) -> TransportError {
        TransportError::NotFound {
            url: format!("memory://cards/{}", id),
        }
    }
}

impl CardStore for MemoryCardStore {
    fn list_cards(&self, deck_id: Option<&str>) -> Result<Vec<RemoteCard>, TransportError> {
        self.record(Call::List {
            deck_id: deck_id.map(str::to_string),
        })?;
        let state = self.state.borrow();
        Ok(state
            .cards
            .values()
            .filter(|card| deck_id.map_or(true, |deck| card.deck_id == deck))
            .cloned()
            .collect())
    }

    fn retrieve_card(&self, id: &str) -> Result<RemoteCard, TransportError> {
        self.record(Call::Retrieve { id: id.to_string() })?;
        self.card(id).ok_or_else(|| Self::not_found(id))
    }

    fn create_card(&self, deck_id: &str, content: &str) -> Result<RemoteCard, TransportError> {
        self.record(Call::Create {
            deck_id: deck_id.to_string(),
            content: content.to_string(),
        })?;

        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let card = RemoteCard::new(format!("card{:04}", state.next_id), deck_id, content);
        state.cards.insert(card.id.clone(), card.clone());
        Ok(card)
    }

    fn update_card(&self, id: &str, update: &CardUpdate) -> Result<RemoteCard, TransportError> {
        self.record(Call::Update {
            id: id.to_string(),
            update: update.clone(),
        })?;

        let mut state = self.state.borrow_mut();
        let card = state.cards.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        card.content = update.content.clone();
        card.deck_id = update.deck_id.clone();
        Ok(card.clone())
    }

    fn delete_card(&self, id: &str) -> Result<(), TransportError> {
        self.record(Call::Delete { id: id.to_string() })?;
        self.state
            .borrow_mut()
            .cards
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(id))
    }

    fn upload_attachment(&self, card_id: &str, attachment: &Attachment) -> Result<(), TransportError> {
        self.record(Call::Upload {
            card_id: card_id.to_string(),
            name: attachment.name.clone(),
        })?;

        let mut state = self.state.borrow_mut();
        if !state.cards.contains_key(card_id) {
            return Err(Self::not_found(card_id));
        }
        state.attachments.insert(
            (card_id.to_string(), attachment.name.clone()),
            attachment.bytes.clone(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ids_and_call_log() {
        let store = MemoryCardStore::new();

        let a = store.create_card("D1", "a").unwrap();
        let b = store.create_card("D2", "b").unwrap();

        assert_eq!(a.id, "card0001");
        assert_eq!(b.id, "card0002");
        assert_eq!(store.list_cards(Some("D1")).unwrap(), vec![a]);
        assert_eq!(store.calls().len(), 3);
    }

    #[test]
    fn test_update_and_delete() {
        let store = MemoryCardStore::with_cards([RemoteCard::new("x", "D1", "old")]);

        let updated = store
            .update_card(
                "x",
                &CardUpdate {
                    content: "new".to_string(),
                    deck_id: "D2".to_string(),
                },
            )
            .unwrap();
        assert_eq!(updated, RemoteCard::new("x", "D2", "new"));

        store.delete_card("x").unwrap();
        assert!(store.cards().is_empty());
        assert!(matches!(
            store.delete_card("x").unwrap_err(),
            TransportError::NotFound { .. }
        ));
    }

    #[test]
    fn test_scheduled_failure() {
        let store = MemoryCardStore::new();
        store.fail_after(1);

        assert!(store.create_card("D", "one").is_ok());
        assert!(matches!(
            store.create_card("D", "two").unwrap_err(),
            TransportError::Status { status: 503, .. }
        ));
        // Reads still work
        assert_eq!(store.list_cards(None).unwrap().len(), 1);

        store.recover();
        assert!(store.create_card("D", "two").is_ok());
    }

    #[test]
    fn test_attachments_are_stored_per_card() {
        let store = MemoryCardStore::with_cards([RemoteCard::new("x", "D1", "c")]);
        let attachment = Attachment {
            name: "i00000000.png".to_string(),
            bytes: vec![1, 2, 3],
        };

        store.upload_attachment("x", &attachment).unwrap();

        assert_eq!(store.attachment("x", "i00000000.png"), Some(vec![1, 2, 3]));
        assert!(store.upload_attachment("missing", &attachment).is_err());
    }
}
