use std::path::PathBuf;

use vendstock_recon::model::{SkipReason, UnmatchedLocation};
use vendstock_recon::store::commit;
use vendstock_recon::{
    reconcile, run_against_store, DocumentFormat, MachineRecord, MachineStore, MemoryStore,
    ReconConfig, ReconError, StoreError,
};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture(name: &str) -> String {
    let path = fixtures_dir().join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}

fn fleet() -> Vec<MachineRecord> {
    vec![
        MachineRecord::new("Main St", 10, 5),
        MachineRecord::new("Gym", 5, 3),
        MachineRecord::new("Lobby", 20, 4),
        MachineRecord::new("Airport", 2, 5),
    ]
}

// -------------------------------------------------------------------------
// Tabular
// -------------------------------------------------------------------------

#[test]
fn tabular_report_end_to_end() {
    let out = reconcile(
        &fixture("sales_report.csv"),
        DocumentFormat::Tabular,
        &fleet(),
        &ReconConfig::default(),
    )
    .unwrap();

    assert_eq!(
        out.table,
        vec![
            MachineRecord::new("Main St", 7, 5),
            MachineRecord::new("Gym", 1, 3),
            MachineRecord::new("Lobby", 20, 4),
            MachineRecord::new("Airport", 2, 5),
        ]
    );

    let s = &out.summary;
    assert_eq!(s.lines_read, 8);
    assert_eq!(s.transactions_counted, 8);
    assert_eq!(s.entries_excluded, 2);
    assert_eq!(s.needs_refill, 2);
    assert_eq!(
        s.unmatched,
        vec![UnmatchedLocation {
            location: "Unknown Kiosk".into(),
            transactions: 1
        }]
    );

    let skipped: Vec<_> = s.skipped.iter().map(|k| (k.line, k.reason.clone())).collect();
    assert_eq!(
        skipped,
        vec![
            (7, SkipReason::MissingLocation),
            (8, SkipReason::MissingDetails),
            (9, SkipReason::AmbiguousSubEntries),
        ]
    );
}

#[test]
fn custom_columns_and_amount_pattern_scheme() {
    let config = ReconConfig::from_toml(&fixture("depot.recon.toml")).unwrap();
    let out = reconcile(
        &fixture("depot_report.csv"),
        DocumentFormat::Tabular,
        &[MachineRecord::new("Depot", 50, 10)],
        &config,
    )
    .unwrap();

    assert_eq!(out.table[0].total_items, 46);
    assert_eq!(out.summary.entries_excluded, 1);
    assert!(out.summary.skipped.is_empty());
}

#[test]
fn default_columns_reject_custom_report() {
    let err = reconcile(
        &fixture("depot_report.csv"),
        DocumentFormat::Tabular,
        &fleet(),
        &ReconConfig::default(),
    )
    .unwrap_err();
    let msg = err.to_string();
    assert!(matches!(err, ReconError::Parse(_)));
    assert!(msg.contains("location, details"), "{msg}");
    assert!(msg.contains("Site, Items"), "{msg}");
}

// -------------------------------------------------------------------------
// Markup
// -------------------------------------------------------------------------

#[test]
fn markup_report_end_to_end() {
    let out = reconcile(
        &fixture("sales_report.html"),
        DocumentFormat::Markup,
        &fleet(),
        &ReconConfig::default(),
    )
    .unwrap();

    assert_eq!(out.table[0], MachineRecord::new("Main St", 8, 5));
    assert_eq!(out.table[1], MachineRecord::new("Gym", 4, 3));
    assert_eq!(out.summary.entries_excluded, 1);
    assert_eq!(out.summary.skipped.len(), 1);
    assert_eq!(out.summary.skipped[0].reason, SkipReason::MissingLocation);
    assert!(out.summary.unmatched.is_empty());
}

// -------------------------------------------------------------------------
// Store runs
// -------------------------------------------------------------------------

#[test]
fn store_run_persists_and_reports_versions() {
    let mut store = MemoryStore::new(fleet());
    let before = store.version().unwrap();

    let result = run_against_store(
        &mut store,
        &fixture("sales_report.csv"),
        DocumentFormat::Tabular,
        &ReconConfig::default(),
        false,
    )
    .unwrap();

    assert_eq!(result.meta.table_version_before, before.to_string());
    assert_eq!(result.meta.table_version_after, store.version().unwrap().to_string());
    assert_eq!(store.records(), result.table.as_slice());
    assert_eq!(result.meta.engine_version, env!("CARGO_PKG_VERSION"));
}

#[test]
fn stale_snapshot_conflicts_and_keeps_other_writer() {
    let mut store = MemoryStore::new(fleet());
    let snap = store.snapshot().unwrap();
    let out = reconcile(
        &fixture("sales_report.csv"),
        DocumentFormat::Tabular,
        &snap.records,
        &ReconConfig::default(),
    )
    .unwrap();

    // An operator refills the airport machine while the run is computing.
    let mut refilled = snap.records.clone();
    refilled[3].total_items = 40;
    store.write_all(&refilled).unwrap();

    let err = commit(&mut store, &snap.version, &out.table).unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }));
    assert_eq!(store.records(), refilled.as_slice());
}

#[test]
fn every_record_flag_matches_threshold_after_run() {
    let mut store = MemoryStore::new(fleet());
    let result = run_against_store(
        &mut store,
        &fixture("sales_report.csv"),
        DocumentFormat::Tabular,
        &ReconConfig::default(),
        false,
    )
    .unwrap();

    let json = serde_json::to_value(&result.table).unwrap();
    for (rec, value) in result.table.iter().zip(json.as_array().unwrap()) {
        assert_eq!(value["ready_to_fill"], rec.total_items <= rec.threshold);
    }
}
