// Vendstock CLI - vending-machine stock table and sales reconciliation

mod exit_codes;
mod machines;
mod recon;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vendstock_config::Settings;
use vendstock_recon::{ParseError, ReconError, StoreError};

use exit_codes::{recon_exit_code, store_exit_code, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};

/// Table used when neither `--table`, `VENDSTOCK_TABLE` nor settings name one.
pub const DEFAULT_TABLE: &str = "vending_machines.csv";

#[derive(Parser)]
#[command(name = "vstock")]
#[command(about = "Track vending-machine stock and reconcile it against sales reports")]
#[command(version)]
#[command(long_version = long_version())]
struct Cli {
    /// Machine table CSV
    #[arg(long, global = true, env = "VENDSTOCK_TABLE")]
    table: Option<PathBuf>,

    /// Reconciliation config (.toml)
    #[arg(long, global = true, env = "VENDSTOCK_RECON_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty machine table
    #[command(after_help = "\
Examples:
  vstock init
  vstock --table /srv/vending/machines.csv init --force")]
    Init {
        /// Overwrite an existing table
        #[arg(long)]
        force: bool,
    },

    /// List machines
    #[command(after_help = "\
Examples:
  vstock list
  vstock list --search lobby
  vstock list --json")]
    List {
        /// Case-insensitive substring filter on location
        #[arg(long, short = 's')]
        search: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// List machines at or below their refill threshold
    NeedsRefill {
        #[arg(long)]
        json: bool,
    },

    /// Fleet totals
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Register a new machine
    #[command(after_help = "\
Examples:
  vstock add \"Main St\" --total 120 --threshold 20
  vstock add \"Airport Gate 4\"")]
    Add {
        location: String,

        /// Items currently stocked (default 0)
        #[arg(long)]
        total: Option<u32>,

        /// Refill threshold (default 0)
        #[arg(long)]
        threshold: Option<u32>,
    },

    /// Set a machine's stock after restocking it
    Refill { location: String, total: u32 },

    /// Change a machine's refill threshold
    SetThreshold { location: String, threshold: u32 },

    /// Apply a sales report to the machine table
    #[command(after_help = "\
Examples:
  vstock reconcile sales-2025-03-01.csv
  vstock reconcile export.html --dry-run
  vstock reconcile export.txt --format markup --json
  vstock --config site.recon.toml reconcile sales.csv --output run.json")]
    Reconcile(recon::ReconcileArgs),

    /// Reconciliation config tools
    Config {
        #[command(subcommand)]
        command: recon::ConfigCommands,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("VSTOCK_GIT_HASH"), ")",
        "\nengine:  vendstock-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("VSTOCK_TARGET"),
    )
}

/// Resolved per-invocation context: flags, then env, then settings.
pub struct Context {
    pub table: PathBuf,
    pub config: Option<PathBuf>,
    pub max_items: u32,
    table_from_default: bool,
}

impl Context {
    fn resolve(cli_table: Option<PathBuf>, cli_config: Option<PathBuf>, settings: &Settings) -> Self {
        let settings_table = settings.store_path.as_ref().map(PathBuf::from);
        let table_from_default = cli_table.is_none() && settings_table.is_none();
        Self {
            table: cli_table
                .or(settings_table)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TABLE)),
            config: cli_config.or_else(|| settings.recon_config_path.as_ref().map(PathBuf::from)),
            max_items: settings.max_items,
            table_from_default,
        }
    }

    /// Reject operator-entered counts above the configured limit.
    pub fn check_limit(&self, what: &str, value: u32) -> Result<u32, CliError> {
        if value > self.max_items {
            return Err(CliError::usage(format!(
                "{what} {value} is above the limit of {}",
                self.max_items
            ))
            .with_hint(format!(
                "raise \"limits.maxItems\" in {}",
                Settings::config_path_display()
            )));
        }
        Ok(value)
    }
}

pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn store(err: StoreError, ctx: &Context) -> Self {
        let hint = match &err {
            StoreError::Unavailable(_) if ctx.table_from_default => Some(format!(
                "run `vstock init`, pass --table, or set \"store.path\" in {}",
                Settings::config_path_display()
            )),
            StoreError::Unavailable(_) => Some("run `vstock init` to create the table".to_string()),
            StoreError::Conflict { .. } => {
                Some("the table was modified while this command ran; re-run it".to_string())
            }
            _ => None,
        };
        Self { code: store_exit_code(&err), message: err.to_string(), hint }
    }

    pub fn recon(err: ReconError, ctx: &Context) -> Self {
        match err {
            ReconError::Reconciliation(store) => {
                let mut out = Self::store(store, ctx);
                out.message = format!("reconciliation aborted: {}", out.message);
                out
            }
            other => {
                let hint = match &other {
                    ReconError::Parse(ParseError::MissingColumns { .. }) => {
                        Some("map report columns under [columns] in the --config file".to_string())
                    }
                    ReconError::UnknownMachine(_) => {
                        Some("`vstock list` shows registered locations".to_string())
                    }
                    ReconError::DuplicateMachine(_) => {
                        Some("use `vstock refill` to change its stock".to_string())
                    }
                    _ => None,
                };
                Self { code: recon_exit_code(&other), message: other.to_string(), hint }
            }
        }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// `VENDSTOCK_LOG`, then settings `log.filter`, then `warn`. Logs go to
/// stderr so stdout stays clean for `--json`.
fn init_tracing(settings_filter: Option<&str>) {
    let filter = EnvFilter::try_from_env("VENDSTOCK_LOG")
        .ok()
        .or_else(|| settings_filter.and_then(|f| EnvFilter::try_new(f).ok()))
        .unwrap_or_else(|| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = Settings::load_from(&Settings::config_path());
    init_tracing(loaded.as_ref().ok().and_then(|s| s.log_filter.as_deref()));
    let settings = loaded.unwrap_or_else(|e| {
        tracing::warn!("{e}; using default settings");
        Settings::default()
    });

    let ctx = Context::resolve(cli.table, cli.config, &settings);

    let result = match cli.command {
        Commands::Init { force } => machines::cmd_init(&ctx, force),
        Commands::List { search, json } => machines::cmd_list(&ctx, search.as_deref(), json),
        Commands::NeedsRefill { json } => machines::cmd_needs_refill(&ctx, json),
        Commands::Stats { json } => machines::cmd_stats(&ctx, json),
        Commands::Add { location, total, threshold } => {
            machines::cmd_add(&ctx, &location, total, threshold)
        }
        Commands::Refill { location, total } => machines::cmd_refill(&ctx, &location, total),
        Commands::SetThreshold { location, threshold } => {
            machines::cmd_set_threshold(&ctx, &location, threshold)
        }
        Commands::Reconcile(args) => recon::cmd_reconcile(&ctx, args),
        Commands::Config { command } => recon::cmd_config(command),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}
