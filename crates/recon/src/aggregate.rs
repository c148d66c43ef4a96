use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::LocationKey;

/// Per-location total for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationTotal {
    /// Representative raw label (the smallest trimmed label seen, so the
    /// result does not depend on input order).
    pub label: String,
    pub transactions: u32,
}

pub type LocationSalesAggregate = BTreeMap<LocationKey, LocationTotal>;

/// Group `(location, count)` pairs by normalized location and sum counts.
///
/// Zero counts still create an entry, so a location whose lines were all
/// excluded is reported as matched-with-nothing rather than disappearing.
pub fn aggregate_counts<'a, I>(pairs: I) -> LocationSalesAggregate
where
    I: IntoIterator<Item = (&'a str, u32)>,
{
    let mut groups = LocationSalesAggregate::new();

    for (location, count) in pairs {
        let key = LocationKey::new(location);
        if key.is_empty() {
            continue;
        }
        let label = location.trim();
        let entry = groups.entry(key).or_insert_with(|| LocationTotal {
            label: label.to_string(),
            transactions: 0,
        });
        entry.transactions = entry.transactions.saturating_add(count);
        if label < entry.label.as_str() {
            entry.label = label.to_string();
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_aggregation() {
        let totals = aggregate_counts(vec![("Main St", 2), ("Gym", 1), ("Main St", 3)]);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[&LocationKey::new("main st")].transactions, 5);
        assert_eq!(totals[&LocationKey::new("gym")].transactions, 1);
    }

    #[test]
    fn case_and_whitespace_fold_together() {
        let totals = aggregate_counts(vec![(" main st ", 1), ("MAIN ST", 1), ("Main  St", 1)]);
        assert_eq!(totals.len(), 1);
        let total = totals.values().next().unwrap();
        assert_eq!(total.transactions, 3);
        assert_eq!(total.label, "MAIN ST");
    }

    #[test]
    fn zero_counts_keep_their_key() {
        let totals = aggregate_counts(vec![("Lobby", 0)]);
        assert_eq!(totals[&LocationKey::new("lobby")].transactions, 0);
    }

    #[test]
    fn empty_input_yields_empty_mapping() {
        assert!(aggregate_counts(Vec::<(&str, u32)>::new()).is_empty());
    }

    #[test]
    fn blank_locations_are_ignored() {
        assert!(aggregate_counts(vec![("   ", 4)]).is_empty());
    }

    #[test]
    fn sums_saturate() {
        let totals = aggregate_counts(vec![("A", u32::MAX), ("A", 10)]);
        assert_eq!(totals[&LocationKey::new("a")].transactions, u32::MAX);
    }
}
