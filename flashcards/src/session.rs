//! Review sessions over a deck's due cards.
//!
//! A session is a fixed, shuffled snapshot of the cards that were due when it
//! started. Each card is shown front first; once revealed it can be graded,
//! which reschedules the card, writes the deck through the store and moves
//! on. Grading the last card ends the session.

use crate::error::SessionError;
use crate::models::{Card, CardView, Deck, Grade};
use crate::spaced_repetition::SpacedRepetition;
use crate::storage::DeckStore;
use log::{debug, info};
use rand::rngs::ThreadRng;
use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudySession {
    deck_id: String,
    queue: Vec<String>,
    position: usize,
    revealed: bool,
}

impl StudySession {
    pub fn deck_id(&self) -> &str {
        &self.deck_id
    }

    /// Card ids in presentation order.
    pub fn queue(&self) -> &[String] {
        &self.queue
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn revealed(&self) -> bool {
        self.revealed
    }

    pub fn current_card_id(&self) -> Option<&str> {
        self.queue.get(self.position).map(String::as_str)
    }

    pub fn remaining(&self) -> usize {
        self.queue.len().saturating_sub(self.position)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GradeOutcome {
    /// Nothing to grade: no session, or the answer is not showing yet.
    Ignored,
    /// The card was rescheduled and the next one is up.
    Advanced(Card),
    /// The card was rescheduled and it was the last one.
    Finished(Card),
}

pub struct SessionManager<R: Rng = ThreadRng> {
    rng: R,
    session: Option<StudySession>,
}

impl SessionManager<ThreadRng> {
    pub fn new() -> Self {
        Self::with_rng(rand::thread_rng())
    }
}

impl Default for SessionManager<ThreadRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> SessionManager<R> {
    pub fn with_rng(rng: R) -> Self {
        SessionManager { rng, session: None }
    }

    pub fn session(&self) -> Option<&StudySession> {
        self.session.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Start reviewing every card in `deck` due at `now`, in random order.
    ///
    /// Replaces any session already in progress. When nothing is due the
    /// current state is left untouched.
    pub fn start(&mut self, deck: &Deck, now: i64) -> Result<&StudySession, SessionError> {
        let mut queue: Vec<String> = SpacedRepetition::get_due_cards(&deck.cards, now)
            .into_iter()
            .map(|card| card.id.clone())
            .collect();

        if queue.is_empty() {
            debug!("No cards due in deck {}", deck.name);
            return Err(SessionError::NoCardsDue);
        }

        // Fisher-Yates
        queue.shuffle(&mut self.rng);
        info!("Started session on deck {} with {} cards", deck.name, queue.len());

        Ok(self.session.insert(StudySession {
            deck_id: deck.id.clone(),
            queue,
            position: 0,
            revealed: false,
        }))
    }

    pub fn reveal(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.revealed = true;
        }
    }

    /// Reschedule the current card and advance.
    ///
    /// The deck is saved before the session moves on. If saving fails the card
    /// is restored and the session stays on it, so the grade can be retried.
    pub fn grade<S: DeckStore + ?Sized>(
        &mut self,
        deck: &mut Deck,
        store: &mut S,
        grade: Grade,
        now: i64,
    ) -> Result<GradeOutcome, SessionError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(GradeOutcome::Ignored);
        };
        if !session.revealed {
            return Ok(GradeOutcome::Ignored);
        }
        if session.deck_id != deck.id {
            return Err(SessionError::DeckMismatch {
                expected: session.deck_id.clone(),
                found: deck.id.clone(),
            });
        }

        let card_id = session.queue[session.position].clone();
        let card = deck
            .card_mut(&card_id)
            .ok_or_else(|| SessionError::CardNotFound(card_id.clone()))?;

        let previous = card.clone();
        SpacedRepetition::calculate_next_review(card, grade, now).apply_to(card);
        let graded = card.clone();

        if let Err(e) = store.save(deck) {
            if let Some(card) = deck.card_mut(&card_id) {
                *card = previous;
            }
            return Err(e.into());
        }
        debug!(
            "Graded card {} as {:?}: interval {} days, ease factor {:.2}",
            graded.id, grade, graded.interval, graded.ease_factor
        );

        session.position += 1;
        session.revealed = false;

        if session.position >= session.queue.len() {
            info!("Finished session on deck {}", deck.name);
            self.session = None;
            Ok(GradeOutcome::Finished(graded))
        } else {
            Ok(GradeOutcome::Advanced(graded))
        }
    }

    /// Drop the session. Cards graded so far keep their new schedule.
    pub fn abort(&mut self) {
        if let Some(session) = self.session.take() {
            info!(
                "Aborted session on deck {} with {} cards left",
                session.deck_id,
                session.remaining()
            );
        }
    }

    /// The current step as the presentation layer should render it.
    pub fn snapshot(&self, deck: &Deck) -> Option<CardView> {
        let session = self.session.as_ref()?;
        if session.deck_id != deck.id {
            return None;
        }
        let card = deck.card(session.current_card_id()?)?;
        Some(CardView {
            front_text: card.front.clone(),
            back_text: card.back.clone(),
            revealed: session.revealed,
            position_in_queue: session.position,
            queue_length: session.queue.len(),
        })
    }
}
