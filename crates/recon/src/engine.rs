use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::aggregate::{aggregate_counts, LocationSalesAggregate};
use crate::classify::classify;
use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::evidence::{compute_summary, RunTally};
use crate::extract::extract;
use crate::model::{
    AppliedSale, DocumentFormat, MachineRecord, ReconMeta, ReconOutcome, ReconResult, SkipReason,
    SkippedLine, UnmatchedLocation,
};
use crate::store::{commit, MachineStore, TableVersion};

/// Reconcile one sales report against a table snapshot.
///
/// Pure: the input table is not modified and nothing is persisted. The
/// returned table has the same rows in the same order, with stock of every
/// matched machine decremented and floored at zero.
pub fn reconcile(
    document: &str,
    format: DocumentFormat,
    current: &[MachineRecord],
    config: &ReconConfig,
) -> Result<ReconOutcome, ReconError> {
    let extraction = extract(document, format, &config.columns)?;

    // A markup line with several amounts yields several items.
    let item_lines: BTreeSet<usize> = extraction.items.iter().map(|i| i.line).collect();
    let mut tally = RunTally {
        lines_read: item_lines.len() + extraction.skipped.len(),
        skipped: extraction.skipped,
        ..RunTally::default()
    };

    let mut counted: Vec<(&str, u32)> = Vec::with_capacity(extraction.items.len());
    for item in &extraction.items {
        let c = classify(&item.details, &config.classify);
        tally.entries_excluded += c.excluded;

        if c.ambiguous {
            warn!(
                line = item.line,
                location = %item.location,
                "line holds several amounts in one sub-entry; not counted"
            );
            tally.skipped.push(SkippedLine {
                line: item.line,
                location: Some(item.location.clone()),
                reason: SkipReason::AmbiguousSubEntries,
            });
            continue;
        }

        tally.transactions_counted = tally.transactions_counted.saturating_add(c.count);
        counted.push((item.location.as_str(), c.count));
    }

    let totals = aggregate_counts(counted);
    let (table, applied, unmatched) = apply_sales(current, &totals);
    tally.applied = applied;
    tally.unmatched = unmatched;

    let summary = compute_summary(tally, &table);
    debug!(
        lines = summary.lines_read,
        transactions = summary.transactions_counted,
        applied = summary.applied.len(),
        unmatched = summary.unmatched.len(),
        skipped = summary.skipped.len(),
        "reconciliation computed"
    );

    Ok(ReconOutcome { table, summary })
}

/// Subtract aggregated sales from every record whose key matches.
///
/// Aggregate locations with no stored machine are returned as unmatched and
/// never create a record.
pub fn apply_sales(
    current: &[MachineRecord],
    totals: &LocationSalesAggregate,
) -> (Vec<MachineRecord>, Vec<AppliedSale>, Vec<UnmatchedLocation>) {
    let mut table = current.to_vec();
    let mut applied = Vec::new();
    let mut matched = vec![false; totals.len()];

    for record in table.iter_mut() {
        let key = record.key();
        let Some((pos, total)) = totals
            .iter()
            .enumerate()
            .find_map(|(i, (k, t))| (k == &key).then_some((i, t)))
        else {
            continue;
        };
        matched[pos] = true;

        let before = record.total_items;
        let after = before.saturating_sub(total.transactions);
        let clamped = total.transactions > before;
        if clamped {
            warn!(
                location = %record.location,
                stock = before,
                sold = total.transactions,
                "sales exceed stock on hand; floored at zero"
            );
        }
        record.total_items = after;

        applied.push(AppliedSale {
            location: record.location.clone(),
            transactions: total.transactions,
            before,
            after,
            clamped,
        });
    }

    let unmatched: Vec<UnmatchedLocation> = totals
        .values()
        .zip(matched)
        .filter(|(_, hit)| !hit)
        .map(|(t, _)| UnmatchedLocation {
            location: t.label.clone(),
            transactions: t.transactions,
        })
        .collect();

    for u in &unmatched {
        warn!(location = %u.location, transactions = u.transactions, "no machine for location; sales dropped");
    }

    (table, applied, unmatched)
}

/// Snapshot the store, reconcile, and commit unless `dry_run`.
///
/// The commit carries the snapshot version, so a table edited by someone
/// else in the meantime fails with a conflict and is left as they wrote it.
pub fn run_against_store<S: MachineStore + ?Sized>(
    store: &mut S,
    document: &str,
    format: DocumentFormat,
    config: &ReconConfig,
    dry_run: bool,
) -> Result<ReconResult, ReconError> {
    let snapshot = store.snapshot()?;
    let outcome = reconcile(document, format, &snapshot.records, config)?;

    let version_after = if dry_run {
        TableVersion::of(&outcome.table)
    } else {
        commit(store, &snapshot.version, &outcome.table)?
    };

    Ok(ReconResult {
        meta: ReconMeta {
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            source_format: format,
            table_version_before: snapshot.version.to_string(),
            table_version_after: version_after.to_string(),
            dry_run,
        },
        summary: outcome.summary,
        table: outcome.table,
    })
}
