use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{ClassifyConfig, CountScheme};

/// `<item code>($<amount>)`, e.g. `13($1.00)` or `2 ( $1,250.00 )`.
static AMOUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d+\s*\(\s*\$\s*\d[\d,]*(?:\.\d+)?\s*\)").expect("amount pattern is valid")
});

/// How many countable sales one line item holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Classification {
    pub count: u32,
    /// Sub-entries dropped by an exclusion marker.
    pub excluded: usize,
    /// A surviving sub-entry held several amounts under the delimited scheme.
    /// The line then counts zero.
    pub ambiguous: bool,
}

/// Number of transaction-amount patterns in `text`.
pub fn count_amounts(text: &str) -> u32 {
    AMOUNT_RE.find_iter(text).count() as u32
}

pub fn contains_amount(text: &str) -> bool {
    AMOUNT_RE.is_match(text)
}

/// Every transaction-amount pattern in `text`, in order.
pub fn find_amounts(text: &str) -> Vec<&str> {
    AMOUNT_RE.find_iter(text).map(|m| m.as_str()).collect()
}

/// `text` with its amounts removed. List separators left behind are dropped
/// and whitespace is collapsed.
pub fn strip_amounts(text: &str) -> String {
    AMOUNT_RE
        .replace_all(text, " ")
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '|'))
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split `details` on `delimiter`, ignoring delimiters inside parentheses so
/// that `1($1,000.00)` stays one entry. Pieces are trimmed; empty ones dropped.
pub fn split_entries(details: &str, delimiter: char) -> Vec<&str> {
    let mut entries = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (i, ch) in details.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c == delimiter && depth == 0 => {
                entries.push(&details[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    entries.push(&details[start..]);

    entries
        .into_iter()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .collect()
}

/// Classify one line item's details field.
///
/// Exclusion filtering runs first and is identical for both schemes.
pub fn classify(details: &str, config: &ClassifyConfig) -> Classification {
    let mut result = Classification::default();

    for entry in split_entries(details, config.delimiter_char()) {
        if config.is_excluded(entry) {
            result.excluded += 1;
            continue;
        }

        let amounts = count_amounts(entry);
        match config.scheme {
            CountScheme::Delimited => {
                if amounts > 1 {
                    result.ambiguous = true;
                }
                result.count += 1;
            }
            CountScheme::AmountPattern => result.count += amounts,
        }
    }

    if result.ambiguous {
        result.count = 0;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delimited() -> ClassifyConfig {
        ClassifyConfig::default()
    }

    fn amount_pattern() -> ClassifyConfig {
        ClassifyConfig {
            scheme: CountScheme::AmountPattern,
            ..ClassifyConfig::default()
        }
    }

    #[test]
    fn amounts_are_found_and_stripped() {
        let line = "12($1.25), 13 ( $1,250.00 ) Two-Tier Pricing";
        assert_eq!(find_amounts(line), vec!["12($1.25)", "13 ( $1,250.00 )"]);
        assert_eq!(strip_amounts(line), "Two-Tier Pricing");
        assert_eq!(strip_amounts("1($1.00) | 2($1.00)"), "");
    }

    #[test]
    fn two_tier_pricing_is_excluded() {
        let c = classify("1($1.00), 2($1.00), Two-Tier Pricing ($1.00)", &delimited());
        assert_eq!(c.count, 2);
        assert_eq!(c.excluded, 1);
        assert!(!c.ambiguous);
    }

    #[test]
    fn both_schemes_agree_on_exclusions() {
        let details = "1($1.00), 2($1.00), Two-Tier Pricing ($1.00), 4($2.00) Discrepancy";
        assert_eq!(classify(details, &delimited()).count, 2);
        assert_eq!(classify(details, &amount_pattern()).count, 2);
    }

    #[test]
    fn fully_excluded_line_counts_zero() {
        let c = classify("Two-Tier Pricing ($1.00), DISCREPANCY 3($1.00)", &delimited());
        assert_eq!(c.count, 0);
        assert_eq!(c.excluded, 2);
        assert!(!c.ambiguous);
    }

    #[test]
    fn amount_pattern_counts_unseparated_entries() {
        let c = classify("1($1.00) 2($1.50) 3($0.75)", &amount_pattern());
        assert_eq!(c.count, 3);
    }

    #[test]
    fn unseparated_amounts_are_ambiguous_when_delimited() {
        let c = classify("1($1.00) 2($1.50), 3($0.75)", &delimited());
        assert!(c.ambiguous);
        assert_eq!(c.count, 0);
    }

    #[test]
    fn delimited_counts_entries_without_amounts() {
        let c = classify("Chips, Soda, Water", &delimited());
        assert_eq!(c.count, 3);
        assert_eq!(classify("Chips, Soda, Water", &amount_pattern()).count, 0);
    }

    #[test]
    fn thousands_separator_inside_parens_is_not_a_delimiter() {
        assert_eq!(split_entries("1($1,000.00), 2($1.00)", ','), vec!["1($1,000.00)", "2($1.00)"]);
        assert_eq!(classify("1($1,000.00), 2($1.00)", &delimited()).count, 2);
    }

    #[test]
    fn empty_pieces_are_dropped() {
        assert_eq!(split_entries(" , 1($1.00),, ", ','), vec!["1($1.00)"]);
        assert_eq!(classify("", &delimited()), Classification::default());
    }

    #[test]
    fn custom_delimiter() {
        let config = ClassifyConfig {
            delimiter: ";".into(),
            ..ClassifyConfig::default()
        };
        assert_eq!(classify("1($1.00); 2($1.00)", &config).count, 2);
    }

    #[test]
    fn amount_pattern_shapes() {
        assert!(contains_amount("13($1.00)"));
        assert!(contains_amount("2 ( $1,250.00 )"));
        assert!(contains_amount("7($2)"));
        assert!(!contains_amount("Two-Tier Pricing ($1.00)"));
        assert!(!contains_amount("($1.00)"));
    }
}
