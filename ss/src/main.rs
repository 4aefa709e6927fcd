use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;

use sessionstore::SessionStore;
use sessionstore::cli::Cli;
use sessionstore::config::Config;

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("sessionstore starting");

    match cli.command {
        sessionstore::cli::Command::Create => {
            let store = SessionStore::open(&config.store_path)?;
            let session_id = store.create()?;
            println!("{} Created session: {}", "✓".green(), session_id.cyan());
        }
        sessionstore::cli::Command::List => {
            let store = SessionStore::open(&config.store_path)?;
            let summaries = store.list_summaries()?;
            if summaries.is_empty() {
                println!("No sessions found");
            } else {
                for summary in summaries {
                    println!("{}  {}", summary.session_id.yellow(), summary.first_message);
                }
            }
        }
        sessionstore::cli::Command::Show { session_id } => {
            let store = SessionStore::open(&config.store_path)?;
            let session = store.get(&session_id)?;
            for message in session.messages {
                println!("{}: {}", message.role.to_string().cyan(), message.content);
            }
        }
    }

    Ok(())
}
