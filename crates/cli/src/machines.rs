//! `vstock init | list | needs-refill | stats | add | refill | set-threshold`

use vendstock_io::CsvTableStore;
use vendstock_recon::store::commit;
use vendstock_recon::table::{self, fleet_stats};
use vendstock_recon::{MachineRecord, MachineStore, ReconError};

use crate::{CliError, Context};

fn open(ctx: &Context) -> CsvTableStore {
    CsvTableStore::new(&ctx.table)
}

fn read(ctx: &Context) -> Result<Vec<MachineRecord>, CliError> {
    open(ctx).read_all().map_err(|e| CliError::store(e, ctx))
}

/// Snapshot, apply one edit, commit against the snapshot version.
fn edit<F>(ctx: &Context, f: F) -> Result<MachineRecord, CliError>
where
    F: FnOnce(&mut Vec<MachineRecord>) -> Result<MachineRecord, ReconError>,
{
    let mut store = open(ctx);
    let snapshot = store.snapshot().map_err(|e| CliError::store(e, ctx))?;

    let mut records = snapshot.records;
    let updated = f(&mut records).map_err(|e| CliError::recon(e, ctx))?;

    commit(&mut store, &snapshot.version, &records).map_err(|e| CliError::store(e, ctx))?;
    Ok(updated)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
    println!("{json}");
    Ok(())
}

fn print_table(records: &[&MachineRecord]) {
    let width = records
        .iter()
        .map(|r| r.location.chars().count())
        .max()
        .unwrap_or(0)
        .max("LOCATION".len());

    println!("{:<width$}  {:>5}  {:>9}  REFILL", "LOCATION", "ITEMS", "THRESHOLD");
    for r in records {
        println!(
            "{:<width$}  {:>5}  {:>9}  {}",
            r.location,
            r.total_items,
            r.threshold,
            if r.ready_to_fill() { "yes" } else { "" }
        );
    }
}

fn describe(r: &MachineRecord) -> String {
    let flag = if r.ready_to_fill() { ", needs refill" } else { "" };
    format!("{}: {} items (threshold {}){flag}", r.location, r.total_items, r.threshold)
}

// ============================================================================
// Commands
// ============================================================================

pub fn cmd_init(ctx: &Context, force: bool) -> Result<(), CliError> {
    let mut store = open(ctx);
    if store.exists() && !force {
        return Err(CliError::usage(format!(
            "{} already exists",
            ctx.table.display()
        ))
        .with_hint("pass --force to replace it with an empty table"));
    }
    store.initialize().map_err(|e| CliError::store(e, ctx))?;
    eprintln!("initialized {}", ctx.table.display());
    Ok(())
}

pub fn cmd_list(ctx: &Context, search: Option<&str>, json: bool) -> Result<(), CliError> {
    let records = read(ctx)?;
    let shown = table::search(&records, search.unwrap_or(""));
    if json {
        return print_json(&shown);
    }
    if shown.is_empty() {
        eprintln!("no machines");
        return Ok(());
    }
    print_table(&shown);
    Ok(())
}

pub fn cmd_needs_refill(ctx: &Context, json: bool) -> Result<(), CliError> {
    let records = read(ctx)?;
    let ready = table::needs_refill(&records);
    if json {
        return print_json(&ready);
    }
    if ready.is_empty() {
        eprintln!("no machines need a refill");
        return Ok(());
    }
    print_table(&ready);
    Ok(())
}

pub fn cmd_stats(ctx: &Context, json: bool) -> Result<(), CliError> {
    let records = read(ctx)?;
    let stats = fleet_stats(&records);
    if json {
        return print_json(&stats);
    }
    println!("locations:    {}", stats.locations);
    println!("total items:  {}", stats.total_items);
    println!("needs refill: {}", stats.needs_refill);
    Ok(())
}

pub fn cmd_add(
    ctx: &Context,
    location: &str,
    total: Option<u32>,
    threshold: Option<u32>,
) -> Result<(), CliError> {
    let total = total.map(|n| ctx.check_limit("total", n)).transpose()?;
    let threshold = threshold.map(|n| ctx.check_limit("threshold", n)).transpose()?;

    let added = edit(ctx, |records| table::add_machine(records, location, total, threshold))?;
    println!("added {}", describe(&added));
    Ok(())
}

pub fn cmd_refill(ctx: &Context, location: &str, total: u32) -> Result<(), CliError> {
    let total = ctx.check_limit("total", total)?;
    let updated = edit(ctx, |records| table::set_stock(records, location, total))?;
    println!("{}", describe(&updated));
    Ok(())
}

pub fn cmd_set_threshold(ctx: &Context, location: &str, threshold: u32) -> Result<(), CliError> {
    let threshold = ctx.check_limit("threshold", threshold)?;
    let updated = edit(ctx, |records| table::set_threshold(records, location, threshold))?;
    println!("{}", describe(&updated));
    Ok(())
}
