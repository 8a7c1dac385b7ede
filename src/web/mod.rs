//! HTTP server for practicum messaging.
//!
//! Exposes the REST API under `/chat`, authenticates callers by bearer token,
//! and persists everything in SQLite through [`crate::storage::Storage`].

pub mod auth;
pub mod config;
pub mod handlers;
pub mod router;
pub mod state;
pub mod utils;

use std::error::Error;

use clap::Parser;

use crate::storage::{db_path, Role, Storage};

use config::{Cli, Command, Config};
use state::AppState;

/// Entry point: parse CLI, open the database, then serve or run a command.
pub async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = Config::from_cli_and_env(&cli);

    crate::logging::init();

    let path = db_path(&config.data_dir);
    let storage = Storage::open(&path)?;

    match cli.command {
        Some(Command::AddUser {
            username,
            full_name,
            role,
            email,
        }) => {
            let role = Role::parse(&role)
                .ok_or_else(|| format!("unknown role '{role}' (student, teacher, supervisor)"))?;
            let (user, token) = storage.create_user(&username, &full_name, role, email.as_deref())?;
            crate::clog!(
                "added {} {} as {}",
                role.as_str(),
                user.username,
                crate::logging::user_id(user.id)
            );
            println!("{token}");
            Ok(())
        }
        Some(Command::Serve) | None => serve(config, storage).await,
    }
}

async fn serve(config: Config, storage: Storage) -> Result<(), Box<dyn Error>> {
    crate::clog!("practicum-chat starting");
    crate::clog!("  data directory: {}", config.data_dir.display());
    crate::clog!("  users: {}", storage.count_users()?);

    let state = AppState::shared(storage);
    let app = router::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    crate::clog!("practicum-chat listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    crate::clog!("practicum-chat stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        crate::clog!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
