use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::store::StoragePreference;

#[derive(Debug, Parser)]
#[command(name = "qr-attendance")]
#[command(about = "Record attendance from scanned QR codes", long_about = None)]
pub struct Cli {
    /// Directory holding the database, the fallback file and settings
    #[arg(
        long,
        env = "QR_ATTENDANCE_DATA_DIR",
        default_value = "attendance-data",
        global = true
    )]
    pub data_dir: PathBuf,

    /// Keep records in the local JSON file instead of the database
    #[arg(long, global = true)]
    pub local: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Read decoded payloads (one per line) and record attendance until input ends
    Scan {
        /// Read payloads from a file instead of stdin
        #[arg(long)]
        input: Option<PathBuf>,
        /// Treat literal "\n" in a line as a line break inside the payload
        #[arg(long)]
        unescape_newlines: bool,
    },
    /// Record a single payload
    Record { payload: String },
    /// List records, newest scan first
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete one record by id
    Delete { id: String },
    /// Delete every record
    Clear {
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Export records as CSV
    Export {
        /// Output file (defaults to attendance_<date>.csv)
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Write the CSV to stdout instead of a file
        #[arg(long, conflicts_with = "output")]
        stdout: bool,
    },
    /// Show record totals
    Stats,
    /// Print or change scanner settings
    Settings {
        #[arg(long)]
        cooldown_ms: Option<u64>,
        #[arg(long)]
        poll_interval_ms: Option<u64>,
        #[arg(long, value_enum)]
        storage: Option<StorageArg>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StorageArg {
    Auto,
    Local,
}

impl From<StorageArg> for StoragePreference {
    fn from(value: StorageArg) -> Self {
        match value {
            StorageArg::Auto => StoragePreference::Auto,
            StorageArg::Local => StoragePreference::Local,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["qr-attendance", "list", "--json", "--data-dir", "/tmp/x", "--local"]);
        assert_eq!(cli.data_dir, PathBuf::from("/tmp/x"));
        assert!(cli.local);
        assert!(matches!(cli.command, Some(Commands::List { json: true })));
    }

    #[test]
    fn export_output_and_stdout_conflict() {
        let result = Cli::try_parse_from(["qr-attendance", "export", "-o", "a.csv", "--stdout"]);
        assert!(result.is_err());
    }
}
