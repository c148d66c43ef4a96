//! Operator edits on the machine table: add, refill, threshold changes, and
//! the read-only views the dashboard shows.
//!
//! All functions work on an in-memory snapshot; persisting the result is the
//! caller's job (see [`crate::store::commit`]). There is deliberately no
//! delete operation.

use serde::Serialize;

use crate::error::ReconError;
use crate::model::{LocationKey, MachineRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FleetStats {
    pub locations: usize,
    pub total_items: u64,
    pub needs_refill: usize,
}

pub fn find<'a>(table: &'a [MachineRecord], location: &str) -> Option<&'a MachineRecord> {
    let key = LocationKey::new(location);
    table.iter().find(|r| r.key() == key)
}

fn find_mut<'a>(
    table: &'a mut [MachineRecord],
    location: &str,
) -> Result<&'a mut MachineRecord, ReconError> {
    let key = LocationKey::new(location);
    table
        .iter_mut()
        .find(|r| r.key() == key)
        .ok_or_else(|| ReconError::UnknownMachine(location.trim().to_string()))
}

/// Append a machine. Missing counts default to zero; the label is trimmed
/// but keeps its casing.
pub fn add_machine(
    table: &mut Vec<MachineRecord>,
    location: &str,
    total_items: Option<u32>,
    threshold: Option<u32>,
) -> Result<MachineRecord, ReconError> {
    let label = location.trim();
    if label.is_empty() {
        return Err(ReconError::InvalidLocation("location must not be empty".into()));
    }
    if find(table, label).is_some() {
        return Err(ReconError::DuplicateMachine(label.to_string()));
    }

    let record = MachineRecord::new(label, total_items.unwrap_or(0), threshold.unwrap_or(0));
    table.push(record.clone());
    Ok(record)
}

/// Refill: set the stock count of one machine.
pub fn set_stock(
    table: &mut [MachineRecord],
    location: &str,
    total_items: u32,
) -> Result<MachineRecord, ReconError> {
    let record = find_mut(table, location)?;
    record.total_items = total_items;
    Ok(record.clone())
}

pub fn set_threshold(
    table: &mut [MachineRecord],
    location: &str,
    threshold: u32,
) -> Result<MachineRecord, ReconError> {
    let record = find_mut(table, location)?;
    record.threshold = threshold;
    Ok(record.clone())
}

/// Case-insensitive substring match on location. An empty query matches all.
pub fn search<'a>(table: &'a [MachineRecord], query: &str) -> Vec<&'a MachineRecord> {
    let needle = query.trim().to_lowercase();
    table
        .iter()
        .filter(|r| r.location.to_lowercase().contains(&needle))
        .collect()
}

pub fn needs_refill(table: &[MachineRecord]) -> Vec<&MachineRecord> {
    table.iter().filter(|r| r.ready_to_fill()).collect()
}

pub fn fleet_stats(table: &[MachineRecord]) -> FleetStats {
    FleetStats {
        locations: table.len(),
        total_items: table.iter().map(|r| u64::from(r.total_items)).sum(),
        needs_refill: table.iter().filter(|r| r.ready_to_fill()).count(),
    }
}
