use crate::model::{AppliedSale, MachineRecord, ReconSummary, SkippedLine, UnmatchedLocation};

/// Raw counters collected while a run is in flight.
#[derive(Debug, Clone, Default)]
pub struct RunTally {
    pub lines_read: usize,
    pub transactions_counted: u32,
    pub entries_excluded: usize,
    pub applied: Vec<AppliedSale>,
    pub unmatched: Vec<UnmatchedLocation>,
    pub skipped: Vec<SkippedLine>,
}

/// Fold a run's tally and the resulting table into the reported summary.
pub fn compute_summary(tally: RunTally, table: &[MachineRecord]) -> ReconSummary {
    let RunTally {
        lines_read,
        transactions_counted,
        entries_excluded,
        applied,
        unmatched,
        mut skipped,
    } = tally;

    skipped.sort_by_key(|s| s.line);

    ReconSummary {
        lines_read,
        transactions_counted,
        entries_excluded,
        applied,
        unmatched,
        skipped,
        needs_refill: table.iter().filter(|r| r.ready_to_fill()).count(),
    }
}
