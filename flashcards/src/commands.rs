use crate::clock::Clock;
use crate::deck_service::DeckService;
use crate::error::{ServiceError, SessionError};
use crate::import::{ArchiveImporter, JsonDeckImporter, NoteImporter};
use crate::models::{CardView, CreateCardRequest, CreateDeckRequest, Grade};
use crate::session::{GradeOutcome, SessionManager};
use crate::spaced_repetition::SpacedRepetition;
use crate::storage::DeckStore;
use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use rand::Rng;
use std::io::{BufRead, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "flashcards", about = "Spaced repetition vocabulary flashcards", version)]
pub struct Cli {
    /// Use a different data file
    #[arg(long, global = true)]
    pub data_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum ImportFormat {
    /// A deck written by `export`
    Json,
    /// One note per line, fields separated by \x1f
    Notes,
}

#[derive(Subcommand)]
pub enum Command {
    /// List decks with their card and due counts
    Decks,

    /// Create an empty deck
    CreateDeck { name: String },

    /// Delete a deck and all of its cards
    DeleteDeck {
        /// Deck id or name
        deck: String,
    },

    /// List the cards of a deck
    Cards {
        /// Deck id or name
        deck: String,
    },

    /// Add a card to a deck
    AddCard {
        /// Deck id or name
        deck: String,
        /// Term
        front: String,
        /// Translation
        back: String,
    },

    /// Remove a card from a deck
    DeleteCard {
        /// Deck id or name
        deck: String,
        card_id: String,
    },

    /// Review the cards of a deck that are due now
    Study {
        /// Deck id or name
        deck: String,
    },

    /// Write a deck as JSON
    Export {
        /// Deck id or name
        deck: String,
        /// Output file (defaults to stdout)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Import a deck from a file
    Import {
        path: PathBuf,
        #[arg(long, value_enum, default_value = "json")]
        format: ImportFormat,
    },
}

pub fn execute<S, C, I, W>(
    service: &mut DeckService<S, C>,
    command: Command,
    input: &mut I,
    out: &mut W,
) -> anyhow::Result<()>
where
    S: DeckStore,
    C: Clock,
    I: BufRead,
    W: Write,
{
    match command {
        Command::Decks => list_decks(service, out),
        Command::CreateDeck { name } => {
            let deck = service.create_deck(CreateDeckRequest { name })?;
            writeln!(out, "Created deck \"{}\" ({})", deck.name, deck.id)?;
            Ok(())
        }
        Command::DeleteDeck { deck } => {
            let deck = service.delete_deck(&deck)?;
            writeln!(out, "Deleted deck \"{}\"", deck.name)?;
            Ok(())
        }
        Command::Cards { deck } => list_cards(service, &deck, out),
        Command::AddCard { deck, front, back } => {
            let card = service.add_card(&deck, CreateCardRequest { front, back })?;
            writeln!(out, "Added card {} ({} = {})", card.id, card.front, card.back)?;
            Ok(())
        }
        Command::DeleteCard { deck, card_id } => {
            service.delete_card(&deck, &card_id)?;
            writeln!(out, "Deleted card {}", card_id)?;
            Ok(())
        }
        Command::Study { deck } => {
            let mut manager = SessionManager::new();
            study(service, &mut manager, &deck, input, out)
        }
        Command::Export { deck, output } => {
            let json = service.export_deck(&deck)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
                    writeln!(out, "Exported \"{}\" to {}", deck, path.display())?;
                }
                None => writeln!(out, "{}", json)?,
            }
            Ok(())
        }
        Command::Import { path, format } => {
            let bytes = std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
            let importer: &dyn ArchiveImporter = match format {
                ImportFormat::Json => &JsonDeckImporter,
                ImportFormat::Notes => &NoteImporter,
            };
            let deck = service.import_deck(importer, &bytes)?;
            writeln!(out, "Successfully imported \"{}\" with {} cards", deck.name, deck.cards.len())?;
            Ok(())
        }
    }
}

fn list_decks<S: DeckStore, C: Clock, W: Write>(service: &DeckService<S, C>, out: &mut W) -> anyhow::Result<()> {
    if service.get_decks().is_empty() {
        writeln!(out, "No decks available. Create a new deck or import one.")?;
        return Ok(());
    }
    let now = service.now();
    for deck in service.get_decks() {
        let stats = SpacedRepetition::calculate_stats(deck, now);
        writeln!(
            out,
            "{}  {} cards  {} due  {:.0}%  ({})",
            deck.name, stats.total_cards, stats.due_cards, stats.progress, deck.id
        )?;
    }
    Ok(())
}

fn list_cards<S: DeckStore, C: Clock, W: Write>(service: &DeckService<S, C>, deck: &str, out: &mut W) -> anyhow::Result<()> {
    let cards = service.get_cards_with_status(deck)?;
    if cards.is_empty() {
        writeln!(out, "No cards in this deck yet.")?;
    }
    for (card, status) in cards {
        writeln!(out, "{}  {} = {}  [{}]", card.id, card.front, card.back, status.label(card.due_date))?;
    }
    Ok(())
}

/// Terminal front end for a review session.
///
/// Each card is shown front first; Enter reveals the back, then a grade of
/// 1-4 (or again/hard/good/easy) reschedules it. `q` or end of input aborts.
pub fn study<S, C, R, I, W>(
    service: &mut DeckService<S, C>,
    manager: &mut SessionManager<R>,
    deck: &str,
    input: &mut I,
    out: &mut W,
) -> anyhow::Result<()>
where
    S: DeckStore,
    C: Clock,
    R: Rng,
    I: BufRead,
    W: Write,
{
    let mut view = match service.start_session(manager, deck) {
        Ok(view) => view,
        Err(ServiceError::Session(SessionError::NoCardsDue)) => {
            writeln!(out, "No cards are due for review in this deck!")?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let mut reviewed = 0;
    loop {
        show_front(&view, out)?;
        if !matches!(read_answer(input)?, Some(answer) if answer != "q") {
            return end_early(manager, reviewed, out);
        }

        manager.reveal();
        writeln!(out, "  {}", view.back_text)?;
        write!(out, "How well did you remember? [1] again [2] hard [3] good [4] easy: ")?;
        out.flush()?;
        let grade = match read_answer(input)? {
            Some(answer) if answer != "q" => parse_grade(&answer),
            _ => return end_early(manager, reviewed, out),
        };

        match service.grade(manager, grade)? {
            GradeOutcome::Advanced(card) => {
                reviewed += 1;
                writeln!(out, "Next review in {} day(s)", card.interval)?;
            }
            GradeOutcome::Finished(card) => {
                reviewed += 1;
                writeln!(out, "Next review in {} day(s)", card.interval)?;
                writeln!(out, "Session complete. Reviewed {} card(s).", reviewed)?;
                return Ok(());
            }
            GradeOutcome::Ignored => {}
        }

        view = service
            .snapshot(manager)
            .ok_or_else(|| anyhow!("study session ended unexpectedly"))?;
    }
}

fn show_front<W: Write>(view: &CardView, out: &mut W) -> anyhow::Result<()> {
    writeln!(out)?;
    writeln!(out, "[{} / {}] {}", view.position_in_queue + 1, view.queue_length, view.front_text)?;
    write!(out, "Press Enter to show the answer (q to quit) ")?;
    out.flush()?;
    Ok(())
}

fn end_early<R: Rng, W: Write>(manager: &mut SessionManager<R>, reviewed: usize, out: &mut W) -> anyhow::Result<()> {
    manager.abort();
    writeln!(out)?;
    writeln!(out, "Session ended. Reviewed {} card(s).", reviewed)?;
    Ok(())
}

/// `None` at end of input.
fn read_answer<I: BufRead>(input: &mut I) -> anyhow::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_ascii_lowercase()))
}

fn parse_grade(answer: &str) -> Grade {
    answer
        .parse::<u8>()
        .ok()
        .and_then(Grade::from_u8)
        .unwrap_or_else(|| Grade::from_response(answer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::deck_service::SAMPLE_DECK_NAME;
    use crate::models::DAY_MS;
    use crate::storage::Storage;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Cursor;
    use tempfile::TempDir;

    const T: i64 = 1_700_000_000_000;

    fn seeded_service(clock: &FixedClock) -> (DeckService<Storage, &FixedClock>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new_with_path(temp_dir.path().join("decks.json"));
        let mut service = DeckService::new(storage, clock).unwrap();
        service.seed_sample_deck().unwrap();
        (service, temp_dir)
    }

    fn run_study(service: &mut DeckService<Storage, &FixedClock>, script: &str) -> String {
        let mut manager = SessionManager::with_rng(StdRng::seed_from_u64(3));
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut out = Vec::new();
        study(service, &mut manager, SAMPLE_DECK_NAME, &mut input, &mut out).unwrap();
        assert!(!manager.is_active());
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_grade() {
        assert_eq!(parse_grade("1"), Grade::Again);
        assert_eq!(parse_grade("4"), Grade::Easy);
        assert_eq!(parse_grade("hard"), Grade::Hard);
        assert_eq!(parse_grade("9"), Grade::Good);
        assert_eq!(parse_grade("?"), Grade::Good);
    }

    #[test]
    fn test_study_whole_deck() {
        let clock = FixedClock::new(T);
        let (mut service, _temp_dir) = seeded_service(&clock);

        let output = run_study(&mut service, "\n3\n\n4\n\nagain\n");

        assert!(output.contains("[1 / 3]"));
        assert!(output.contains("[3 / 3]"));
        assert!(output.contains("Session complete. Reviewed 3 card(s)."));
        let deck = service.get_deck(SAMPLE_DECK_NAME).unwrap();
        assert!(deck.cards.iter().all(|c| c.last_review == Some(T)));
        assert!(deck.cards.iter().all(|c| c.due_date == T + DAY_MS));
    }

    #[test]
    fn test_study_quit_keeps_graded_cards() {
        let clock = FixedClock::new(T);
        let (mut service, _temp_dir) = seeded_service(&clock);

        let output = run_study(&mut service, "\n3\nq\n");

        assert!(output.contains("Session ended. Reviewed 1 card(s)."));
        let deck = service.get_deck(SAMPLE_DECK_NAME).unwrap();
        assert_eq!(deck.cards.iter().filter(|c| c.last_review.is_some()).count(), 1);
    }

    #[test]
    fn test_study_end_of_input_aborts() {
        let clock = FixedClock::new(T);
        let (mut service, _temp_dir) = seeded_service(&clock);

        let output = run_study(&mut service, "\n");
        assert!(output.contains("Session ended. Reviewed 0 card(s)."));
        let deck = service.get_deck(SAMPLE_DECK_NAME).unwrap();
        assert!(deck.cards.iter().all(|c| c.last_review.is_none()));
    }

    #[test]
    fn test_study_nothing_due() {
        let clock = FixedClock::new(T);
        let (mut service, _temp_dir) = seeded_service(&clock);
        run_study(&mut service, "\n3\n\n3\n\n3\n");

        let output = run_study(&mut service, "");
        assert!(output.contains("No cards are due for review in this deck!"));
    }

    #[test]
    fn test_execute_deck_commands() {
        let clock = FixedClock::new(T);
        let (mut service, temp_dir) = seeded_service(&clock);
        let mut input = Cursor::new(Vec::new());
        let mut out = Vec::new();

        execute(&mut service, Command::CreateDeck { name: "Verbs".to_string() }, &mut input, &mut out).unwrap();
        execute(
            &mut service,
            Command::AddCard {
                deck: "Verbs".to_string(),
                front: "gehen".to_string(),
                back: "to go".to_string(),
            },
            &mut input,
            &mut out,
        )
        .unwrap();
        execute(&mut service, Command::Decks, &mut input, &mut out).unwrap();
        execute(&mut service, Command::Cards { deck: "Verbs".to_string() }, &mut input, &mut out).unwrap();

        let export_path = temp_dir.path().join("verbs.json");
        execute(
            &mut service,
            Command::Export {
                deck: "Verbs".to_string(),
                output: Some(export_path.clone()),
            },
            &mut input,
            &mut out,
        )
        .unwrap();
        execute(&mut service, Command::DeleteDeck { deck: "Verbs".to_string() }, &mut input, &mut out).unwrap();
        execute(
            &mut service,
            Command::Import {
                path: export_path,
                format: ImportFormat::Json,
            },
            &mut input,
            &mut out,
        )
        .unwrap();

        let output = String::from_utf8(out).unwrap();
        assert!(output.contains("Created deck \"Verbs\""));
        assert!(output.contains("Basic German  3 cards  3 due  0%"));
        assert!(output.contains("Verbs  1 cards  1 due  0%"));
        assert!(output.contains("gehen = to go  [Due now]"));
        assert!(output.contains("Successfully imported \"Verbs\" with 1 cards"));
        assert_eq!(service.get_decks().len(), 2);
    }

    #[test]
    fn test_execute_reports_missing_deck() {
        let clock = FixedClock::new(T);
        let (mut service, _temp_dir) = seeded_service(&clock);
        let mut input = Cursor::new(Vec::new());
        let mut out = Vec::new();

        let err = execute(&mut service, Command::Cards { deck: "Nope".to_string() }, &mut input, &mut out).unwrap_err();
        assert_eq!(err.to_string(), "Deck not found: Nope");
    }
}
