use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported data version {0}")]
    UnsupportedVersion(u32),
}

/// Archive parsing failed. The reason is shown to the user as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct ImportError {
    pub reason: String,
}

impl ImportError {
    pub fn new(reason: impl Into<String>) -> Self {
        ImportError { reason: reason.into() }
    }

    pub fn no_database() -> Self {
        Self::new("no database found")
    }

    pub fn no_notes() -> Self {
        Self::new("no notes found")
    }

    pub fn no_valid_cards() -> Self {
        Self::new("no valid cards extracted")
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No cards are due for review in this deck")]
    NoCardsDue,

    #[error("Session belongs to deck {expected}, not {found}")]
    DeckMismatch { expected: String, found: String },

    #[error("Card {0} is no longer in the deck")]
    CardNotFound(String),

    #[error("Failed to save deck: {0}")]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Deck not found: {0}")]
    DeckNotFound(String),

    #[error("Card not found: {0}")]
    CardNotFound(String),

    #[error("A deck with the name \"{0}\" already exists")]
    DuplicateDeckName(String),

    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Import failed: {0}")]
    Import(#[from] ImportError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}
