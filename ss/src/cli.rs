//! CLI argument parsing for sessionstore

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ss")]
#[command(author, version, about = "Durable session store for the study assistant", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new empty session
    Create,

    /// List sessions that have at least one user message
    List,

    /// Print a session's message history
    Show {
        /// Session ID to display
        #[arg(required = true)]
        session_id: String,
    },
}
