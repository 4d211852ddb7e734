use crate::domain::{LibraryCard, value_objects::CardNumber};
use crate::ports::library_card_service::{LibraryCardService as LibraryCardServiceTrait, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Mock implementation of LibraryCardService
///
/// Keeps cards in memory, keyed by card number.
pub struct LibraryCardService {
    cards: Mutex<HashMap<CardNumber, LibraryCard>>,
}

impl LibraryCardService {
    pub fn new() -> Self {
        Self {
            cards: Mutex::new(HashMap::new()),
        }
    }

    /// Register a card, replacing any card with the same number
    pub fn add_card(&self, card: LibraryCard) {
        self.cards
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(card.card_number.clone(), card);
    }

    /// Lock or unlock a registered card
    pub fn set_locked(&self, card_number: &CardNumber, is_locked: bool) {
        if let Some(card) = self
            .cards
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get_mut(card_number)
        {
            card.is_locked = is_locked;
        }
    }
}

impl Default for LibraryCardService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LibraryCardServiceTrait for LibraryCardService {
    async fn get_card(&self, card_number: &CardNumber) -> Result<Option<LibraryCard>> {
        let cards = self.cards.lock().map_err(|e| e.to_string())?;
        Ok(cards.get(card_number).cloned())
    }
}
