use crate::clock::Clock;
use crate::error::ServiceError;
use crate::import::ArchiveImporter;
use crate::models::{Card, CardView, CreateCardRequest, CreateDeckRequest, Deck, DeckStats, DueStatus, Grade};
use crate::session::{GradeOutcome, SessionManager};
use crate::spaced_repetition::SpacedRepetition;
use crate::storage::DeckStore;
use log::{info, warn};
use rand::Rng;

pub const SAMPLE_DECK_NAME: &str = "Basic German";

const SAMPLE_CARDS: [(&str, &str); 3] = [("Hallo", "Hello"), ("Danke", "Thank you"), ("Guten Morgen", "Good morning")];

/// Owns the ordered deck collection and writes every change through the store.
pub struct DeckService<S: DeckStore, C: Clock> {
    decks: Vec<Deck>,
    store: S,
    clock: C,
}

impl<S: DeckStore, C: Clock> DeckService<S, C> {
    pub fn new(store: S, clock: C) -> Result<Self, ServiceError> {
        let decks = store.load_all()?;
        info!("Loaded {} decks", decks.len());
        Ok(DeckService { decks, store, clock })
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Adds the sample deck when there are no decks at all.
    pub fn seed_sample_deck(&mut self) -> Result<bool, ServiceError> {
        if !self.decks.is_empty() {
            return Ok(false);
        }
        let now = self.clock.now();
        let mut deck = Deck::new(SAMPLE_DECK_NAME);
        deck.cards = SAMPLE_CARDS
            .iter()
            .map(|(front, back)| Card::new(*front, *back, now))
            .collect();

        self.store.save(&deck)?;
        info!("Created sample deck {}", deck.name);
        self.decks.push(deck);
        Ok(true)
    }

    pub fn get_decks(&self) -> &[Deck] {
        &self.decks
    }

    /// Looks a deck up by id, then by name.
    pub fn get_deck(&self, key: &str) -> Option<&Deck> {
        self.position(key).map(|index| &self.decks[index])
    }

    pub fn create_deck(&mut self, request: CreateDeckRequest) -> Result<Deck, ServiceError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ServiceError::EmptyField("Deck name"));
        }

        let deck = Deck::new(name);
        self.store.save(&deck)?;
        info!("Created deck {}", deck.name);
        self.decks.push(deck.clone());
        Ok(deck)
    }

    pub fn delete_deck(&mut self, key: &str) -> Result<Deck, ServiceError> {
        let index = self.index_of(key)?;
        self.store.remove(&self.decks[index].id)?;
        let deck = self.decks.remove(index);
        info!("Deleted deck {} with {} cards", deck.name, deck.cards.len());
        Ok(deck)
    }

    pub fn add_card(&mut self, key: &str, request: CreateCardRequest) -> Result<Card, ServiceError> {
        let (front, back) = (request.front.trim(), request.back.trim());
        if front.is_empty() {
            return Err(ServiceError::EmptyField("Front"));
        }
        if back.is_empty() {
            return Err(ServiceError::EmptyField("Back"));
        }

        let card = Card::new(front, back, self.clock.now());
        let index = self.index_of(key)?;
        let mut updated = self.decks[index].clone();
        updated.cards.push(card.clone());
        self.commit_deck(index, updated)?;
        Ok(card)
    }

    pub fn delete_card(&mut self, key: &str, card_id: &str) -> Result<(), ServiceError> {
        let index = self.index_of(key)?;
        let mut updated = self.decks[index].clone();
        let before = updated.cards.len();
        updated.cards.retain(|card| card.id != card_id);
        if updated.cards.len() == before {
            return Err(ServiceError::CardNotFound(card_id.to_string()));
        }
        self.commit_deck(index, updated)
    }

    pub fn get_deck_stats(&self, key: &str) -> Result<DeckStats, ServiceError> {
        let deck = self.deck(key)?;
        Ok(SpacedRepetition::calculate_stats(deck, self.clock.now()))
    }

    /// Cards in deck order with their due label classification.
    pub fn get_cards_with_status(&self, key: &str) -> Result<Vec<(Card, DueStatus)>, ServiceError> {
        let deck = self.deck(key)?;
        let now = self.clock.now();
        Ok(deck
            .cards
            .iter()
            .map(|card| (card.clone(), SpacedRepetition::due_status(card, now)))
            .collect())
    }

    pub fn export_deck(&self, key: &str) -> Result<String, ServiceError> {
        let deck = self.deck(key)?;
        serde_json::to_string_pretty(deck).map_err(|e| ServiceError::Store(e.into()))
    }

    /// Runs an importer and keeps the result, unless a deck with that name exists.
    pub fn import_deck<I: ArchiveImporter + ?Sized>(&mut self, importer: &I, bytes: &[u8]) -> Result<Deck, ServiceError> {
        let deck = importer.import_archive(bytes, self.clock.now())?;

        if self.decks.iter().any(|existing| existing.name == deck.name) {
            warn!("Duplicate deck name detected: {}. Import cancelled.", deck.name);
            return Err(ServiceError::DuplicateDeckName(deck.name));
        }

        self.store.save(&deck)?;
        info!("Imported deck {} with {} cards", deck.name, deck.cards.len());
        self.decks.push(deck.clone());
        Ok(deck)
    }

    // Study session methods
    pub fn start_session<R: Rng>(&self, manager: &mut SessionManager<R>, key: &str) -> Result<CardView, ServiceError> {
        let deck = self.deck(key)?;
        manager.start(deck, self.clock.now())?;
        manager
            .snapshot(deck)
            .ok_or_else(|| ServiceError::DeckNotFound(key.to_string()))
    }

    pub fn snapshot<R: Rng>(&self, manager: &SessionManager<R>) -> Option<CardView> {
        let deck_id = manager.session()?.deck_id();
        let deck = self.decks.iter().find(|deck| deck.id == deck_id)?;
        manager.snapshot(deck)
    }

    /// Grades the current card of `manager`'s session and saves its deck.
    pub fn grade<R: Rng>(&mut self, manager: &mut SessionManager<R>, grade: Grade) -> Result<GradeOutcome, ServiceError> {
        let Some(session) = manager.session() else {
            return Ok(GradeOutcome::Ignored);
        };
        let deck_id = session.deck_id().to_string();
        let now = self.clock.now();

        let deck = self
            .decks
            .iter_mut()
            .find(|deck| deck.id == deck_id)
            .ok_or(ServiceError::DeckNotFound(deck_id))?;
        Ok(manager.grade(deck, &mut self.store, grade, now)?)
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.decks
            .iter()
            .position(|deck| deck.id == key)
            .or_else(|| self.decks.iter().position(|deck| deck.name == key))
    }

    fn deck(&self, key: &str) -> Result<&Deck, ServiceError> {
        self.get_deck(key).ok_or_else(|| ServiceError::DeckNotFound(key.to_string()))
    }

    fn index_of(&self, key: &str) -> Result<usize, ServiceError> {
        self.position(key).ok_or_else(|| ServiceError::DeckNotFound(key.to_string()))
    }

    // Memory only changes once the store has the new deck
    fn commit_deck(&mut self, index: usize, deck: Deck) -> Result<(), ServiceError> {
        self.store.save(&deck)?;
        self.decks[index] = deck;
        Ok(())
    }
}
