//! Configuration types and constants for the messaging server.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub(crate) const DEFAULT_PAGE_LIMIT: u32 = 50;
pub(crate) const MAX_PAGE_LIMIT: u32 = 200;
pub(crate) const DEFAULT_SEARCH_LIMIT: u32 = 20;
/// Longest message body accepted by `POST /chat/messages`, in characters.
pub(crate) const MAX_MESSAGE_CHARS: usize = 10_000;

/// Direct messaging service for students, teachers and supervisors.
///
/// Configuration can be set via CLI arguments or environment variables.
/// CLI arguments take precedence over environment variables.
#[derive(Parser, Debug)]
#[command(name = "practicum-chat", version, about)]
pub struct Cli {
    /// HTTP server bind address [env: PRACTICUM_CHAT_BIND] [default: 127.0.0.1:4000]
    #[arg(long, short = 'b', global = true)]
    pub bind: Option<String>,

    /// Data directory holding the database [env: PRACTICUM_CHAT_HOME] [default: ~/.practicum-chat]
    #[arg(long, short = 'd', global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Register a user and print their API token
    AddUser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        full_name: String,
        /// student, teacher or supervisor
        #[arg(long)]
        role: String,
        #[arg(long)]
        email: Option<String>,
    },
}

pub struct Config {
    pub bind_addr: String,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn from_cli_and_env(cli: &Cli) -> Self {
        let data_dir = cli
            .data_dir
            .clone()
            .or_else(|| std::env::var("PRACTICUM_CHAT_HOME").ok().map(PathBuf::from))
            .unwrap_or_else(|| {
                std::env::var("HOME")
                    .map(|h| PathBuf::from(h).join(".practicum-chat"))
                    .unwrap_or_else(|_| PathBuf::from(".practicum-chat"))
            });

        let bind_addr = cli
            .bind
            .clone()
            .or_else(|| std::env::var("PRACTICUM_CHAT_BIND").ok())
            .unwrap_or_else(|| "127.0.0.1:4000".to_string());

        Self {
            bind_addr,
            data_dir,
        }
    }
}
