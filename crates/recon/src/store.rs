//! Store adapter boundary.
//!
//! The machine table is only ever read and written whole. [`commit`] adds an
//! optimistic version check on top, so a write that races another writer
//! fails with [`StoreError::Conflict`] instead of silently clobbering it.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::model::MachineRecord;

pub trait MachineStore {
    fn read_all(&self) -> Result<Vec<MachineRecord>, StoreError>;

    /// Replace the entire table. Implementations must not leave a partial
    /// table behind on failure.
    fn write_all(&mut self, records: &[MachineRecord]) -> Result<(), StoreError>;

    fn snapshot(&self) -> Result<Snapshot, StoreError> {
        let records = self.read_all()?;
        let version = TableVersion::of(&records);
        Ok(Snapshot { records, version })
    }

    fn version(&self) -> Result<TableVersion, StoreError> {
        self.read_all().map(|records| TableVersion::of(&records))
    }
}

/// Content hash of a table in stored order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TableVersion(String);

impl TableVersion {
    pub fn of(records: &[MachineRecord]) -> Self {
        let mut hasher = Sha256::new();
        for r in records {
            hasher.update(r.location.as_bytes());
            hasher.update([0x1f]);
            hasher.update(r.total_items.to_le_bytes());
            hasher.update(r.threshold.to_le_bytes());
            hasher.update([0x1e]);
        }
        let digest = hasher.finalize();
        Self(digest.iter().map(|b| format!("{b:02x}")).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, for messages.
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for TableVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A full copy of the table at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub records: Vec<MachineRecord>,
    pub version: TableVersion,
}

/// Shape rules every written table must satisfy.
pub fn validate_table(records: &[MachineRecord]) -> Result<(), StoreError> {
    let mut seen = HashSet::new();
    for (i, r) in records.iter().enumerate() {
        let key = r.key();
        if key.is_empty() {
            return Err(StoreError::Rejected(format!("record #{} has an empty location", i + 1)));
        }
        if !seen.insert(key) {
            return Err(StoreError::Rejected(format!(
                "duplicate location '{}'",
                r.location.trim()
            )));
        }
    }
    Ok(())
}

/// Write `records` only if the table still has version `expected`.
/// Returns the version of the table as written.
pub fn commit<S: MachineStore + ?Sized>(
    store: &mut S,
    expected: &TableVersion,
    records: &[MachineRecord],
) -> Result<TableVersion, StoreError> {
    validate_table(records)?;

    let found = store.version()?;
    if &found != expected {
        return Err(StoreError::Conflict {
            expected: expected.short().to_string(),
            found: found.short().to_string(),
        });
    }

    store.write_all(records)?;
    let written = TableVersion::of(records);
    info!(rows = records.len(), version = written.short(), "machine table committed");
    Ok(written)
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Table held in memory. Used by tests and dry runs; can be switched
/// offline to exercise `Unavailable` handling.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Vec<MachineRecord>,
    offline: bool,
    writes: usize,
}

impl MemoryStore {
    pub fn new(records: Vec<MachineRecord>) -> Self {
        Self {
            records,
            offline: false,
            writes: 0,
        }
    }

    pub fn records(&self) -> &[MachineRecord] {
        &self.records
    }

    /// Number of successful `write_all` calls.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline {
            Err(StoreError::Unavailable("in-memory store is offline".into()))
        } else {
            Ok(())
        }
    }
}

impl MachineStore for MemoryStore {
    fn read_all(&self) -> Result<Vec<MachineRecord>, StoreError> {
        self.check_online()?;
        Ok(self.records.clone())
    }

    fn write_all(&mut self, records: &[MachineRecord]) -> Result<(), StoreError> {
        self.check_online()?;
        validate_table(records)?;
        debug!(rows = records.len(), "memory store replaced");
        self.records = records.to_vec();
        self.writes += 1;
        Ok(())
    }
}
