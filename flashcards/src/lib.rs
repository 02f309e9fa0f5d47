pub mod clock;
pub mod commands;
pub mod config;
pub mod deck_service;
pub mod error;
pub mod import;
pub mod models;
pub mod session;
pub mod spaced_repetition;
pub mod storage;

use clap::Parser;
use clock::SystemClock;
use commands::Cli;
use config::Config;
use deck_service::DeckService;
use storage::Storage;

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(data_file) = cli.data_file.clone() {
        config.data_file = data_file;
    }

    env_logger::Builder::new()
        .filter_level(config.log_level)
        .parse_default_env()
        .init();
    log::debug!("Using data file {}", config.data_file.display());

    let storage = Storage::new_with_path(config.data_file.clone());
    let mut service = DeckService::new(storage, SystemClock)?;
    if config.seed_sample_deck {
        service.seed_sample_deck()?;
    }

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    commands::execute(&mut service, cli.command, &mut stdin.lock(), &mut stdout.lock())
}
