use crate::models::{Card, Deck, DeckStats, DueStatus, Grade, ReviewUpdate, DAY_MS, MAX_INTERVAL_DAYS, MIN_EASE_FACTOR};

/// SM-2 spaced repetition algorithm implementation
pub struct SpacedRepetition;

impl SpacedRepetition {
    /// Calculate next review parameters based on performance
    pub fn calculate_next_review(card: &Card, grade: Grade, now: i64) -> ReviewUpdate {
        let quality = grade.quality();

        let (interval, repetition) = if quality >= 3 {
            let interval = match card.repetition {
                0 => 1,
                1 => 6,
                _ => (((card.interval as f64) * card.ease_factor).round() as i64).min(MAX_INTERVAL_DAYS),
            };
            (interval, card.repetition + 1)
        } else {
            // Lapse
            (1, 0)
        };

        // EF' = EF + (0.1 - (5 - q) * (0.08 + (5 - q) * 0.02))
        let q = f64::from(quality);
        let ease_factor = (card.ease_factor + (0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02))).max(MIN_EASE_FACTOR);

        ReviewUpdate {
            interval,
            repetition,
            ease_factor,
            due_date: now.saturating_add(interval.saturating_mul(DAY_MS)),
            last_review: now,
        }
    }

    /// Check if a card is due for review
    pub fn is_due(card: &Card, now: i64) -> bool {
        card.due_date <= now
    }

    /// Get cards that are due for review, in deck order
    pub fn get_due_cards(cards: &[Card], now: i64) -> Vec<&Card> {
        cards.iter().filter(|card| Self::is_due(card, now)).collect()
    }

    /// Display classification only; selection uses `is_due`.
    pub fn due_status(card: &Card, now: i64) -> DueStatus {
        if card.due_date <= now {
            DueStatus::Overdue
        } else if card.due_date <= now.saturating_add(DAY_MS) {
            DueStatus::DueToday
        } else {
            DueStatus::Future
        }
    }

    /// Calculate review statistics for a deck
    pub fn calculate_stats(deck: &Deck, now: i64) -> DeckStats {
        let total_cards = deck.cards.len();
        let due_cards = deck.cards.iter().filter(|card| Self::is_due(card, now)).count();
        let new_cards = deck.cards.iter().filter(|card| card.is_new()).count();
        let progress = if total_cards > 0 {
            (total_cards - due_cards) as f64 / total_cards as f64 * 100.0
        } else {
            0.0
        };

        DeckStats {
            total_cards,
            due_cards,
            new_cards,
            progress,
        }
    }
}
