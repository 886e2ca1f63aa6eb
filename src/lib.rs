pub mod cli;
mod commands;
pub mod db;
pub mod dedup;
pub mod export;
pub mod payload;
pub mod scanner;
pub mod settings;
pub mod store;
mod utils;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{CommandFactory, Parser};
use log::error;

use cli::{Cli, Commands};
use scanner::ScanController;
use settings::{SettingsStore, SETTINGS_FILE};
use store::{AttendanceStore, StoragePreference};

pub use db::AttendanceRecord;
pub use dedup::{decide, Decision, SeenSet};
pub use payload::{parse_payload, Identity};

/// Everything one invocation works with: the settings file, the store chosen
/// for this session and the scan controller built on top of it.
pub struct AppContext {
    pub data_dir: PathBuf,
    pub settings: SettingsStore,
    pub controller: ScanController,
}

impl AppContext {
    pub async fn open(data_dir: &Path, force_local: bool) -> Result<Self> {
        let settings = SettingsStore::new(data_dir.join(SETTINGS_FILE))?;
        let scanner_settings = settings.scanner();

        let preference = if force_local {
            StoragePreference::Local
        } else {
            scanner_settings.storage
        };
        let store = AttendanceStore::open(data_dir, preference)?;
        let controller = ScanController::open(store, scanner_settings).await?;

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            settings,
            controller,
        })
    }
}

async fn dispatch(ctx: &AppContext, command: Commands) -> Result<()> {
    match command {
        Commands::Scan {
            input,
            unescape_newlines,
        } => commands::scan(ctx, input, unescape_newlines).await,
        Commands::Record { payload } => commands::record(ctx, &payload).await,
        Commands::List { json } => commands::list(ctx, json).await,
        Commands::Delete { id } => commands::delete(ctx, &id).await,
        Commands::Clear { yes } => commands::clear(ctx, yes).await,
        Commands::Export { output, stdout } => commands::export(ctx, output, stdout).await,
        Commands::Stats => commands::stats(ctx).await,
        Commands::Settings {
            cooldown_ms,
            poll_interval_ms,
            storage,
        } => commands::settings(ctx, cooldown_ms, poll_interval_ms, storage.map(Into::into)),
    }
}

pub fn run() {
    // Initialize logging (reads RUST_LOG env var)
    let default_filter = if settings::debug_mode() { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let args = Cli::parse();

    let Some(command) = args.command else {
        let _ = Cli::command().print_long_help();
        return;
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("Failed to start async runtime: {err}");
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(async {
        let ctx = AppContext::open(&args.data_dir, args.local).await?;
        dispatch(&ctx, command).await
    });

    if let Err(err) = result {
        error!("{err:#}");
        std::process::exit(1);
    }
}
