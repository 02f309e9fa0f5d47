use crate::error::ImportError;
use crate::models::{Card, Deck};
use log::{debug, warn};

pub const DEFAULT_DECK_NAME: &str = "Imported Deck";

/// Anki separates note fields with the unit separator.
const FIELD_SEPARATOR: char = '\x1f';
const DECK_NAME_PREFIX: &str = "#deck:";

/// Turns an archive into a fully-formed deck.
///
/// Every produced card carries the same scheduling state as a newly created
/// one, due at `now`.
pub trait ArchiveImporter {
    fn import_archive(&self, bytes: &[u8], now: i64) -> Result<Deck, ImportError>;
}

/// Reads decks written by `DeckService::export_deck`.
pub struct JsonDeckImporter;

impl ArchiveImporter for JsonDeckImporter {
    fn import_archive(&self, bytes: &[u8], now: i64) -> Result<Deck, ImportError> {
        let exported: Deck =
            serde_json::from_slice(bytes).map_err(|e| ImportError::new(format!("invalid deck file: {e}")))?;

        let name = match exported.name.trim() {
            "" => DEFAULT_DECK_NAME,
            name => name,
        };
        let mut deck = Deck::new(name);
        deck.cards = exported
            .cards
            .iter()
            .filter_map(|card| new_card(&card.front, &card.back, now))
            .collect();

        if deck.cards.is_empty() {
            return Err(ImportError::no_valid_cards());
        }
        debug!("Read {} cards from exported deck {}", deck.cards.len(), deck.name);
        Ok(deck)
    }
}

/// Reads Anki-style notes: one note per line, fields separated by `\x1f`.
///
/// An optional first line `#deck:<name>` names the deck. The first two fields
/// of each note become front and back with markup removed; notes missing
/// either side are skipped.
pub struct NoteImporter;

impl ArchiveImporter for NoteImporter {
    fn import_archive(&self, bytes: &[u8], now: i64) -> Result<Deck, ImportError> {
        let text = std::str::from_utf8(bytes).map_err(|_| ImportError::new("notes are not valid UTF-8"))?;

        let mut lines = text.lines().filter(|line| !line.trim().is_empty()).peekable();
        let mut name = DEFAULT_DECK_NAME.to_string();
        let header = lines
            .peek()
            .and_then(|line| line.trim().strip_prefix(DECK_NAME_PREFIX))
            .map(|header| header.trim().to_string());
        if let Some(header) = header {
            if !header.is_empty() {
                name = header;
            }
            lines.next();
        }

        let notes: Vec<&str> = lines.collect();
        if notes.is_empty() {
            return Err(ImportError::no_notes());
        }

        let mut deck = Deck::new(name);
        for (index, note) in notes.iter().enumerate() {
            let fields: Vec<&str> = note.split(FIELD_SEPARATOR).collect();
            if fields.len() < 2 {
                warn!("Note {} has less than 2 fields, skipping", index);
                continue;
            }
            if let Some(card) = new_card(&strip_html(fields[0]), &strip_html(fields[1]), now) {
                deck.cards.push(card);
            }
        }

        if deck.cards.is_empty() {
            return Err(ImportError::no_valid_cards());
        }
        debug!("Extracted {} cards from {} notes", deck.cards.len(), notes.len());
        Ok(deck)
    }
}

fn new_card(front: &str, back: &str, now: i64) -> Option<Card> {
    let (front, back) = (front.trim(), back.trim());
    if front.is_empty() || back.is_empty() {
        return None;
    }
    Some(Card::new(front, back, now))
}

/// Strip HTML tags and decode entities
fn strip_html(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;

    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }

    result
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
