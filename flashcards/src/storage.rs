use crate::error::StoreError;
use crate::models::Deck;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const DATA_VERSION: u32 = 2;

/// Where decks live between runs.
pub trait DeckStore {
    fn load_all(&self) -> Result<Vec<Deck>, StoreError>;

    /// Insert or replace a deck, keeping the position of an existing one.
    fn save(&mut self, deck: &Deck) -> Result<(), StoreError>;

    fn remove(&mut self, deck_id: &str) -> Result<(), StoreError>;
}

#[derive(Serialize)]
struct DataFile<'a> {
    version: u32,
    decks: &'a [Deck],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredData {
    Versioned { version: u32, decks: Vec<Deck> },
    Unversioned { decks: Vec<Deck> },
    Legacy(Vec<Deck>),
}

/// Decks stored as one pretty-printed JSON file.
pub struct Storage {
    data_file: PathBuf,
}

impl Storage {
    pub fn new_with_path(data_file: impl Into<PathBuf>) -> Self {
        Storage { data_file: data_file.into() }
    }

    pub fn get_data_file_path(&self) -> &Path {
        &self.data_file
    }

    fn read_decks(&self) -> Result<Option<StoredData>, StoreError> {
        if !self.data_file.exists() {
            return Ok(None);
        }
        let file = File::open(&self.data_file)?;
        let reader = BufReader::new(file);
        Ok(Some(serde_json::from_reader(reader)?))
    }

    fn temp_file_path(&self) -> PathBuf {
        let mut name = OsString::from(self.data_file.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Writes to a sibling temp file and renames it over the data file, so a
    /// crash never leaves a truncated data file behind.
    fn write_decks(&self, decks: &[Deck]) -> Result<(), StoreError> {
        if let Some(parent) = self.data_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = self.temp_file_path();
        let file = File::create(&tmp_path)?;
        let file = write_data(file, decks)?;
        file.sync_all()?;
        fs::rename(&tmp_path, &self.data_file)?;

        debug!("Wrote {} decks to {}", decks.len(), self.data_file.display());
        Ok(())
    }
}

/// Serializes the current file format and flushes, so write errors surface here.
fn write_data<W: Write>(writer: W, decks: &[Deck]) -> Result<W, StoreError> {
    let mut writer = BufWriter::new(writer);
    serde_json::to_writer_pretty(
        &mut writer,
        &DataFile {
            version: DATA_VERSION,
            decks,
        },
    )?;
    writer.flush()?;
    writer.into_inner().map_err(|e| StoreError::Io(e.into_error()))
}

impl DeckStore for Storage {
    fn load_all(&self) -> Result<Vec<Deck>, StoreError> {
        let decks = match self.read_decks()? {
            None => return Ok(Vec::new()),
            Some(StoredData::Versioned { version, decks }) if version == DATA_VERSION => return Ok(decks),
            Some(StoredData::Versioned { version, .. }) if version > DATA_VERSION => {
                return Err(StoreError::UnsupportedVersion(version));
            }
            Some(StoredData::Versioned { version, decks }) => {
                warn!("Migrating flashcard data from version {}", version);
                decks
            }
            Some(StoredData::Unversioned { decks }) | Some(StoredData::Legacy(decks)) => {
                warn!("Migrating unversioned flashcard data");
                decks
            }
        };

        // Legacy field names and date strings were normalized while parsing.
        self.write_decks(&decks)?;
        info!("Migrated {} decks to version {}", decks.len(), DATA_VERSION);
        Ok(decks)
    }

    fn save(&mut self, deck: &Deck) -> Result<(), StoreError> {
        let mut decks = self.load_all()?;
        match decks.iter_mut().find(|existing| existing.id == deck.id) {
            Some(existing) => *existing = deck.clone(),
            None => decks.push(deck.clone()),
        }
        self.write_decks(&decks)
    }

    fn remove(&mut self, deck_id: &str) -> Result<(), StoreError> {
        let mut decks = self.load_all()?;
        let before = decks.len();
        decks.retain(|deck| deck.id != deck_id);
        if decks.len() != before {
            self.write_decks(&decks)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Card;
    use tempfile::TempDir;

    fn create_test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new_with_path(temp_dir.path().join("decks.json"));
        (storage, temp_dir)
    }

    fn deck_with_cards(name: &str, fronts: &[&str]) -> Deck {
        let mut deck = Deck::new(name);
        for front in fronts {
            deck.cards.push(Card::new(*front, format!("{front} (en)"), 1_000));
        }
        deck
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let (storage, _temp_dir) = create_test_storage();
        assert!(storage.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_save_keeps_insertion_order() {
        let (mut storage, _temp_dir) = create_test_storage();
        let first = deck_with_cards("First", &["a"]);
        let mut second = deck_with_cards("Second", &["b", "c"]);
        storage.save(&first).unwrap();
        storage.save(&second).unwrap();

        second.name = "Second (renamed)".to_string();
        storage.save(&second).unwrap();

        let decks = storage.load_all().unwrap();
        assert_eq!(decks.len(), 2);
        assert_eq!(decks[0], first);
        assert_eq!(decks[1], second);
    }

    #[test]
    fn test_remove_deck() {
        let (mut storage, _temp_dir) = create_test_storage();
        let first = deck_with_cards("First", &["a"]);
        let second = deck_with_cards("Second", &["b"]);
        storage.save(&first).unwrap();
        storage.save(&second).unwrap();

        storage.remove(&first.id).unwrap();
        storage.remove("missing").unwrap();

        let decks = storage.load_all().unwrap();
        assert_eq!(decks, vec![second]);
    }

    #[test]
    fn test_file_is_versioned() {
        let (mut storage, _temp_dir) = create_test_storage();
        storage.save(&deck_with_cards("Deck", &["a"])).unwrap();

        let raw = std::fs::read_to_string(storage.get_data_file_path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], 2);
        assert_eq!(value["decks"][0]["cards"][0]["front"], "a");
        assert_eq!(value["decks"][0]["cards"][0]["easeFactor"], 2.5);
    }

    #[test]
    fn test_migrates_legacy_array() {
        let (storage, _temp_dir) = create_test_storage();
        let legacy = r#"[
            {
                "id": "sample_deck_1",
                "name": "Basic German",
                "cards": [
                    {
                        "id": "card_1",
                        "german": "Hallo",
                        "english": "Hello",
                        "interval": 1,
                        "repetition": 0,
                        "easeFactor": 2.5,
                        "dueDate": "2024-01-02T00:00:00.000Z",
                        "lastReview": null
                    }
                ]
            }
        ]"#;
        std::fs::write(storage.get_data_file_path(), legacy).unwrap();

        let decks = storage.load_all().unwrap();
        assert_eq!(decks.len(), 1);
        assert_eq!(decks[0].cards[0].front, "Hallo");
        assert_eq!(decks[0].cards[0].back, "Hello");
        assert_eq!(decks[0].cards[0].due_date, 1_704_153_600_000);

        // Rewritten in the current format
        let raw = std::fs::read_to_string(storage.get_data_file_path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], 2);
        assert_eq!(value["decks"][0]["cards"][0]["dueDate"], 1_704_153_600_000i64);
        assert!(value["decks"][0]["cards"][0].get("german").is_none());
    }

    #[test]
    fn test_migrates_old_version() {
        let (storage, _temp_dir) = create_test_storage();
        std::fs::write(
            storage.get_data_file_path(),
            r#"{"version": 1, "decks": [{"id": "d", "name": "Old", "cards": []}]}"#,
        )
        .unwrap();

        let decks = storage.load_all().unwrap();
        assert_eq!(decks[0].name, "Old");
        let raw = std::fs::read_to_string(storage.get_data_file_path()).unwrap();
        assert!(raw.contains("\"version\": 2"));
    }

    #[test]
    fn test_migrates_envelope_without_version() {
        let (storage, _temp_dir) = create_test_storage();
        std::fs::write(
            storage.get_data_file_path(),
            r#"{"decks": [{"id": "d", "name": "Loose", "cards": []}]}"#,
        )
        .unwrap();

        assert_eq!(storage.load_all().unwrap()[0].name, "Loose");
        let raw = std::fs::read_to_string(storage.get_data_file_path()).unwrap();
        assert!(raw.contains("\"version\": 2"));
    }

    #[test]
    fn test_rejects_newer_version() {
        let (storage, _temp_dir) = create_test_storage();
        std::fs::write(storage.get_data_file_path(), r#"{"version": 3, "decks": []}"#).unwrap();
        assert!(matches!(storage.load_all(), Err(StoreError::UnsupportedVersion(3))));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_write_error_is_returned() {
        let device = std::fs::OpenOptions::new().write(true).open("/dev/full").unwrap();
        let result = write_data(device, &[deck_with_cards("Deck", &["a"])]);
        assert!(matches!(result, Err(StoreError::Io(_))));
    }

    #[test]
    fn test_save_fails_when_directory_is_a_file() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();

        let mut storage = Storage::new_with_path(blocker.join("decks.json"));
        assert!(matches!(storage.save(&Deck::new("Deck")), Err(StoreError::Io(_))));
    }

    #[test]
    fn test_failed_write_keeps_previous_file() {
        let (mut storage, _temp_dir) = create_test_storage();
        let first = deck_with_cards("First", &["a"]);
        storage.save(&first).unwrap();

        // Temp file cannot be created
        std::fs::create_dir(storage.temp_file_path()).unwrap();
        assert!(storage.save(&deck_with_cards("Second", &["b"])).is_err());

        assert_eq!(storage.load_all().unwrap(), vec![first]);
    }

    #[test]
    fn test_no_temp_file_left_after_save() {
        let (mut storage, _temp_dir) = create_test_storage();
        storage.save(&deck_with_cards("Deck", &["a"])).unwrap();
        assert!(storage.get_data_file_path().exists());
        assert!(!storage.temp_file_path().exists());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let (storage, _temp_dir) = create_test_storage();
        std::fs::write(storage.get_data_file_path(), "not json").unwrap();
        assert!(matches!(storage.load_all(), Err(StoreError::Json(_))));
    }
}
