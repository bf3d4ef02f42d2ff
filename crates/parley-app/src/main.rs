//! Parley application binary - composition root.
//!
//! 1. Parse arguments and load configuration from TOML
//! 2. Initialize logging
//! 3. Either serve the HTTP API or run single-shot / REPL generation

use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use parley_api::{routes, AppState};
use parley_app::{AppError, CliArgs, Command, Console, ServeArgs};
use parley_chat::ConversationStore;
use parley_core::config::ParleyConfig;

fn init_tracing(level: Option<String>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn serve(serve_args: &ServeArgs, mut config: ParleyConfig) -> Result<(), AppError> {
    serve_args.apply_to(&mut config);
    let state_file = serve_args.resolve_state_file(&config);

    let store = Arc::new(ConversationStore::load(&state_file));
    tracing::info!(
        path = %state_file.display(),
        messages = store.len(),
        "Conversation state ready"
    );

    let server = config.server.clone();
    let state = AppState::new(config, store, Some(state_file));

    routes::start_server(&server, state).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = ParleyConfig::load_or_default(&config_file);

    // Tracing.
    init_tracing(args.resolve_log_level(&config));
    tracing::info!("Starting Parley v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    config.apply_env_overrides();

    let result = match args.command {
        Some(Command::Serve(ref serve_args)) => serve(serve_args, config).await,
        None => {
            let stdin = io::stdin();
            let interactive = stdin.is_terminal();
            let mut console = Console::new(stdin.lock(), io::stdout().lock(), interactive);
            parley_app::run(&args, &config, &mut console)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
