use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Machine table
// ---------------------------------------------------------------------------

/// One row per physical vending machine.
///
/// `ready_to_fill` is never stored: it is derived from `total_items` and
/// `threshold` every time it is asked for. It is written on serialization so
/// downstream consumers see it, and ignored on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MachineRecord {
    pub location: String,
    #[serde(default)]
    pub total_items: u32,
    #[serde(default)]
    pub threshold: u32,
}

impl MachineRecord {
    pub fn new(location: impl Into<String>, total_items: u32, threshold: u32) -> Self {
        Self {
            location: location.into(),
            total_items,
            threshold,
        }
    }

    /// Stock at or below the refill threshold.
    pub fn ready_to_fill(&self) -> bool {
        self.total_items <= self.threshold
    }

    pub fn key(&self) -> LocationKey {
        LocationKey::new(&self.location)
    }
}

impl Serialize for MachineRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("MachineRecord", 4)?;
        s.serialize_field("location", &self.location)?;
        s.serialize_field("total_items", &self.total_items)?;
        s.serialize_field("threshold", &self.threshold)?;
        s.serialize_field("ready_to_fill", &self.ready_to_fill())?;
        s.end()
    }
}

/// Normalized location used for every comparison: trimmed and case-folded.
/// Inner whitespace is kept as written.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LocationKey(String);

impl LocationKey {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Sales report input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    /// Delimited text with a header row.
    Tabular,
    /// Scraped HTML / text with `Device:` / `Location:` blocks.
    Markup,
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tabular => write!(f, "tabular"),
            Self::Markup => write!(f, "markup"),
        }
    }
}

/// One row of a raw sales export. Lives for a single reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesLineItem {
    /// 1-based line in the source document.
    pub line: usize,
    pub location: String,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingLocation,
    MissingDetails,
    MalformedRecord(String),
    OutsideDeviceBlock,
    AmbiguousSubEntries,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingLocation => write!(f, "missing location"),
            Self::MissingDetails => write!(f, "missing details"),
            Self::MalformedRecord(msg) => write!(f, "malformed record: {msg}"),
            Self::OutsideDeviceBlock => write!(f, "transaction outside a device block"),
            Self::AmbiguousSubEntries => write!(f, "ambiguous sub-entries"),
        }
    }
}

/// A source line that contributed nothing, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedLine {
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub reason: SkipReason,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedSale {
    /// Stored label of the machine the sales were applied to.
    pub location: String,
    pub transactions: u32,
    pub before: u32,
    pub after: u32,
    /// The decrement exceeded the stock on hand and was floored at zero.
    pub clamped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmatchedLocation {
    pub location: String,
    pub transactions: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ReconSummary {
    pub lines_read: usize,
    pub transactions_counted: u32,
    pub entries_excluded: usize,
    pub applied: Vec<AppliedSale>,
    pub unmatched: Vec<UnmatchedLocation>,
    pub skipped: Vec<SkippedLine>,
    pub needs_refill: usize,
}

/// Updated table plus what happened, before anything is persisted.
#[derive(Debug, Clone)]
pub struct ReconOutcome {
    pub table: Vec<MachineRecord>,
    pub summary: ReconSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    pub table: Vec<MachineRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub engine_version: String,
    pub run_at: String,
    pub source_format: DocumentFormat,
    pub table_version_before: String,
    pub table_version_after: String,
    pub dry_run: bool,
}
