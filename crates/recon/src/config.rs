use serde::Deserialize;

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Reconciliation settings, usually read from a `recon.toml`.
/// Every section is optional; an empty document yields the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReconConfig {
    #[serde(default)]
    pub columns: ColumnMapping,
    #[serde(default)]
    pub classify: ClassifyConfig,
}

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

/// Header names of the tabular export. Matched case-insensitively.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub location: String,
    pub details: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            location: "location".into(),
            details: "details".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountScheme {
    /// Every surviving sub-entry is one sale.
    #[default]
    Delimited,
    /// Count `<digits>($<amount>)` occurrences in surviving sub-entries.
    AmountPattern,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifyConfig {
    pub scheme: CountScheme,
    pub delimiter: String,
    /// Sub-entries containing any of these (case-insensitive) are not sales.
    pub exclude: Vec<String>,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            scheme: CountScheme::Delimited,
            delimiter: ",".into(),
            exclude: vec!["two-tier pricing".into(), "discrepancy".into()],
        }
    }
}

impl ClassifyConfig {
    pub fn delimiter_char(&self) -> char {
        self.delimiter.chars().next().unwrap_or(',')
    }

    pub fn is_excluded(&self, entry: &str) -> bool {
        let lowered = entry.to_lowercase();
        self.exclude
            .iter()
            .any(|marker| lowered.contains(&marker.trim().to_lowercase()))
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let location = self.columns.location.trim();
        let details = self.columns.details.trim();

        if location.is_empty() || details.is_empty() {
            return Err(ReconError::ConfigValidation(
                "column names must not be empty".into(),
            ));
        }

        if location.eq_ignore_ascii_case(details) {
            return Err(ReconError::ConfigValidation(format!(
                "location and details columns must differ, both are '{location}'"
            )));
        }

        if self.classify.delimiter.chars().count() != 1 {
            return Err(ReconError::ConfigValidation(format!(
                "delimiter must be exactly one character, got '{}'",
                self.classify.delimiter
            )));
        }

        if let Some(pos) = self.classify.exclude.iter().position(|m| m.trim().is_empty()) {
            return Err(ReconError::ConfigValidation(format!(
                "exclusion marker #{} is empty",
                pos + 1
            )));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
