//! `vstock reconcile` and `vstock config validate`.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand, ValueEnum};
use vendstock_io::{load_report, CsvTableStore};
use vendstock_recon::config::CountScheme;
use vendstock_recon::{run_against_store, DocumentFormat, ParseError, ReconConfig, ReconResult};

use crate::exit_codes::{EXIT_ERROR, EXIT_INVALID_CONFIG, EXIT_USAGE};
use crate::{CliError, Context};

#[derive(Clone, Copy, ValueEnum)]
pub enum ReportFormat {
    /// Delimited export with a header row
    Csv,
    /// HTML or text export with Device:/Location: blocks
    Markup,
}

impl From<ReportFormat> for DocumentFormat {
    fn from(f: ReportFormat) -> Self {
        match f {
            ReportFormat::Csv => DocumentFormat::Tabular,
            ReportFormat::Markup => DocumentFormat::Markup,
        }
    }
}

#[derive(Args)]
pub struct ReconcileArgs {
    /// Sales report file
    report: PathBuf,

    /// Report format (default: by extension, then by content)
    #[arg(long, short = 'f')]
    format: Option<ReportFormat>,

    /// Compute and report without writing the table
    #[arg(long)]
    dry_run: bool,

    /// Output JSON to stdout instead of human summary
    #[arg(long)]
    json: bool,

    /// Write JSON output to file
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a reconciliation config without running
    #[command(after_help = "\
Examples:
  vstock config validate site.recon.toml")]
    Validate {
        /// Path to the .toml config file
        config: PathBuf,
    },
}

fn recon_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into(), hint: None }
}

fn load_config(path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(path).map_err(|e| {
        recon_err(EXIT_USAGE, format!("cannot read config {}: {e}", path.display()))
    })?;
    ReconConfig::from_toml(&config_str).map_err(|e| recon_err(EXIT_INVALID_CONFIG, e.to_string()))
}

pub fn cmd_reconcile(ctx: &Context, args: ReconcileArgs) -> Result<(), CliError> {
    let config = match &ctx.config {
        Some(path) => load_config(path)?,
        None => ReconConfig::default(),
    };

    let doc = load_report(&args.report, args.format.map(DocumentFormat::from)).map_err(|e| {
        let err = ParseError::Unreadable(format!("{}: {e}", args.report.display()));
        CliError::recon(err.into(), ctx)
    })?;

    let mut store = CsvTableStore::new(&ctx.table);
    let result = run_against_store(&mut store, &doc.content, doc.format, &config, args.dry_run)
        .map_err(|e| CliError::recon(e, ctx))?;

    let json_str = serde_json::to_string_pretty(&result)
        .map_err(|e| recon_err(EXIT_ERROR, format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &json_str)
            .map_err(|e| recon_err(EXIT_ERROR, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if args.json {
        println!("{json_str}");
    }

    print_summary(&result);
    Ok(())
}

/// Human summary to stderr.
fn print_summary(result: &ReconResult) {
    let s = &result.summary;
    eprintln!(
        "{} report: {} line(s), {} transaction(s) counted, {} entr{} excluded",
        result.meta.source_format,
        s.lines_read,
        s.transactions_counted,
        s.entries_excluded,
        if s.entries_excluded == 1 { "y" } else { "ies" },
    );
    eprintln!(
        "applied to {} machine(s), {} unmatched location(s), {} skipped line(s), {} machine(s) need refill",
        s.applied.len(),
        s.unmatched.len(),
        s.skipped.len(),
        s.needs_refill,
    );

    for a in s.applied.iter().filter(|a| a.clamped) {
        eprintln!(
            "  clamped: {} sold {} with {} on hand",
            a.location, a.transactions, a.before
        );
    }
    for u in &s.unmatched {
        eprintln!("  unmatched: {} ({} transaction(s))", u.location, u.transactions);
    }
    for k in &s.skipped {
        match &k.location {
            Some(loc) => eprintln!("  skipped line {} ({loc}): {}", k.line, k.reason),
            None => eprintln!("  skipped line {}: {}", k.line, k.reason),
        }
    }

    if result.meta.dry_run {
        eprintln!("dry run: table not written");
    }
}

pub fn cmd_config(cmd: ConfigCommands) -> Result<(), CliError> {
    match cmd {
        ConfigCommands::Validate { config } => cmd_config_validate(config),
    }
}

fn cmd_config_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let scheme = match config.classify.scheme {
        CountScheme::Delimited => "delimited",
        CountScheme::AmountPattern => "amount_pattern",
    };
    eprintln!(
        "valid: {scheme} counting, columns '{}' / '{}', {} exclusion marker(s)",
        config.columns.location,
        config.columns.details,
        config.classify.exclude.len(),
    );
    Ok(())
}
