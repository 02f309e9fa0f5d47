use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// One day in epoch milliseconds.
pub const DAY_MS: i64 = 86_400_000;
/// Longest interval whose due date still fits in epoch milliseconds.
pub const MAX_INTERVAL_DAYS: i64 = i64::MAX / DAY_MS;
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
pub const MIN_EASE_FACTOR: f64 = 1.3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    #[serde(alias = "german")]
    pub front: String,
    #[serde(alias = "english")]
    pub back: String,
    pub interval: i64, // days
    pub repetition: u32,
    pub ease_factor: f64, // SM-2 ease factor
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub due_date: i64, // epoch ms
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub last_review: Option<i64>,
}

impl Card {
    /// A fresh card, due immediately.
    pub fn new(front: impl Into<String>, back: impl Into<String>, now: i64) -> Self {
        Card {
            id: Uuid::new_v4().to_string(),
            front: front.into(),
            back: back.into(),
            interval: 1,
            repetition: 0,
            ease_factor: DEFAULT_EASE_FACTOR,
            due_date: now,
            last_review: None,
        }
    }

    pub fn is_new(&self) -> bool {
        self.last_review.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub cards: Vec<Card>,
}

impl Deck {
    pub fn new(name: impl Into<String>) -> Self {
        Deck {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            cards: Vec::new(),
        }
    }

    pub fn card(&self, id: &str) -> Option<&Card> {
        self.cards.iter().find(|card| card.id == id)
    }

    pub fn card_mut(&mut self, id: &str) -> Option<&mut Card> {
        self.cards.iter_mut().find(|card| card.id == id)
    }
}

/// Recall quality reported by the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Again,
    Hard,
    Good,
    Easy,
}

impl Grade {
    /// Parses a response name. Anything unrecognized is treated as `Good`.
    pub fn from_response(response: &str) -> Self {
        match response.trim().to_ascii_lowercase().as_str() {
            "again" => Grade::Again,
            "hard" => Grade::Hard,
            "good" => Grade::Good,
            "easy" => Grade::Easy,
            _ => Grade::Good,
        }
    }

    /// Answer buttons are numbered 1 through 4.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Grade::Again),
            2 => Some(Grade::Hard),
            3 => Some(Grade::Good),
            4 => Some(Grade::Easy),
            _ => None,
        }
    }

    /// SM-2 quality on the 0-5 scale.
    pub fn quality(self) -> u8 {
        match self {
            Grade::Again => 0,
            Grade::Hard => 2,
            Grade::Good => 3,
            Grade::Easy => 5,
        }
    }
}

/// Scheduling fields produced by a review.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewUpdate {
    pub interval: i64,
    pub repetition: u32,
    pub ease_factor: f64,
    pub due_date: i64,
    pub last_review: i64,
}

impl ReviewUpdate {
    pub fn apply_to(&self, card: &mut Card) {
        card.interval = self.interval;
        card.repetition = self.repetition;
        card.ease_factor = self.ease_factor;
        card.due_date = self.due_date;
        card.last_review = Some(self.last_review);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeckStats {
    pub total_cards: usize,
    pub due_cards: usize,
    pub new_cards: usize,
    /// Percentage of cards not currently due.
    pub progress: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueStatus {
    Overdue,
    DueToday,
    Future,
}

impl DueStatus {
    pub fn label(self, due_date: i64) -> String {
        match self {
            DueStatus::Overdue => "Due now".to_string(),
            DueStatus::DueToday => "Due today".to_string(),
            DueStatus::Future => match Local.timestamp_millis_opt(due_date).single() {
                Some(date) => format!("Due {}", date.format("%Y-%m-%d")),
                None => "Due later".to_string(),
            },
        }
    }
}

/// What the presentation layer shows for the current step of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct CardView {
    pub front_text: String,
    pub back_text: String,
    pub revealed: bool,
    pub position_in_queue: usize,
    pub queue_length: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDeckRequest {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCardRequest {
    pub front: String,
    pub back: String,
}

// Older data stored due dates as ISO-8601 strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredTimestamp {
    Millis(i64),
    Fractional(f64),
    Text(String),
}

impl StoredTimestamp {
    fn into_millis<E: serde::de::Error>(self) -> Result<i64, E> {
        match self {
            StoredTimestamp::Millis(ms) => Ok(ms),
            StoredTimestamp::Fractional(ms) => Ok(ms.round() as i64),
            StoredTimestamp::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|date| date.timestamp_millis())
                .map_err(|e| E::custom(format!("invalid date {text:?}: {e}"))),
        }
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    StoredTimestamp::deserialize(deserializer)?.into_millis()
}

fn deserialize_optional_timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<StoredTimestamp>::deserialize(deserializer)?
        .map(StoredTimestamp::into_millis)
        .transpose()
}
