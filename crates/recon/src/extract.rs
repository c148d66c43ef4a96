//! Turn a raw sales export into [`SalesLineItem`]s.
//!
//! Two shapes are understood: delimited text with a header row, and scraped
//! markup made of `Device:` / `Location:` blocks followed by
//! `<code>($<amount>)` transaction lines.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::classify::{contains_amount, find_amounts, strip_amounts};
use crate::config::ColumnMapping;
use crate::error::ParseError;
use crate::model::{DocumentFormat, SalesLineItem, SkipReason, SkippedLine};

static DEVICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^device\s*:\s*([a-z0-9][a-z0-9_-]*)").expect("device pattern is valid")
});
static LOCATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^location\s*:\s*(\S.*?)\s*$").expect("location pattern is valid")
});
static LOCATION_INLINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\blocation\s*:\s*(\S.*?)\s*$").expect("inline location pattern is valid")
});
static TAG_START_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[a-zA-Z!/]").expect("tag pattern is valid"));
static SKIP_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<!--.*?-->|<script\b.*?</script\s*>|<style\b.*?</style\s*>")
        .expect("skip pattern is valid")
});
static BREAK_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)<\s*/?\s*(?:br|p|div|tr|li|ul|ol|table|tbody|thead|tfoot|h[1-6]|section|article|header|footer|pre)\b[^>]*>",
    )
    .expect("break tag pattern is valid")
});
static INLINE_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]*>").expect("inline tag pattern is valid"));

/// Line items plus the source lines that produced nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub items: Vec<SalesLineItem>,
    pub skipped: Vec<SkippedLine>,
}

pub fn extract(
    document: &str,
    format: DocumentFormat,
    columns: &ColumnMapping,
) -> Result<Extraction, ParseError> {
    match format {
        DocumentFormat::Tabular => extract_tabular(document, columns),
        DocumentFormat::Markup => Ok(extract_markup(document)),
    }
}

/// Guess the format from content: any HTML tag or `Device:` marker line
/// means markup.
pub fn sniff_format(document: &str) -> DocumentFormat {
    let has_device_marker = document
        .lines()
        .take(200)
        .any(|line| DEVICE_RE.is_match(line.trim()));

    if has_device_marker || TAG_START_RE.is_match(document) {
        DocumentFormat::Markup
    } else {
        DocumentFormat::Tabular
    }
}

// ---------------------------------------------------------------------------
// Tabular
// ---------------------------------------------------------------------------

/// Read a delimited export. The header row decides which columns carry the
/// location and details; a header missing either is the only hard failure.
pub fn extract_tabular(document: &str, columns: &ColumnMapping) -> Result<Extraction, ParseError> {
    let document = document.strip_prefix('\u{feff}').unwrap_or(document);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(document.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ParseError::Unreadable(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let idx = |name: &str| -> Option<usize> {
        let wanted = name.trim().to_lowercase();
        headers.iter().position(|h| h.to_lowercase() == wanted)
    };

    let location_idx = idx(&columns.location);
    let details_idx = idx(&columns.details);

    let (location_idx, details_idx) = match (location_idx, details_idx) {
        (Some(l), Some(d)) => (l, d),
        _ => {
            let mut missing = Vec::new();
            if location_idx.is_none() {
                missing.push(columns.location.clone());
            }
            if details_idx.is_none() {
                missing.push(columns.details.clone());
            }
            return Err(ParseError::MissingColumns {
                missing,
                found: headers.into_iter().filter(|h| !h.is_empty()).collect(),
            });
        }
    };

    let mut out = Extraction::default();

    for (i, record) in reader.records().enumerate() {
        // Header is line 1; fall back to record order when the reader has no position.
        let fallback_line = i + 2;

        let record = match record {
            Ok(r) => r,
            Err(e) => {
                let line = e
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(fallback_line);
                debug!(line, error = %e, "skipping undecodable sales record");
                out.skipped.push(SkippedLine {
                    line,
                    location: None,
                    reason: SkipReason::MalformedRecord(e.to_string()),
                });
                continue;
            }
        };

        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(fallback_line);

        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        let location = record.get(location_idx).unwrap_or("").trim();
        let details = record.get(details_idx).unwrap_or("").trim();

        if location.is_empty() {
            out.skipped.push(SkippedLine {
                line,
                location: None,
                reason: SkipReason::MissingLocation,
            });
            continue;
        }

        if details.is_empty() {
            out.skipped.push(SkippedLine {
                line,
                location: Some(location.to_string()),
                reason: SkipReason::MissingDetails,
            });
            continue;
        }

        out.items.push(SalesLineItem {
            line,
            location: location.to_string(),
            details: details.to_string(),
        });
    }

    debug!(
        items = out.items.len(),
        skipped = out.skipped.len(),
        "tabular sales report extracted"
    );

    Ok(out)
}

// ---------------------------------------------------------------------------
// Markup
// ---------------------------------------------------------------------------

/// Flatten markup to text lines: block-level tags become line breaks, inline
/// tags become spaces, comments/scripts/styles vanish, common entities decode.
fn flatten_markup(document: &str) -> String {
    let text = SKIP_BLOCK_RE.replace_all(document, "");
    let text = BREAK_TAG_RE.replace_all(&text, "\n");
    let text = INLINE_TAG_RE.replace_all(&text, " ");
    decode_entities(&text)
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&#36;", "$")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// One details string per amount on a transaction line. Text that is not an
/// amount, such as an exclusion label, travels with every piece.
fn split_transactions(line: &str) -> Vec<String> {
    let rest = strip_amounts(line);
    find_amounts(line)
        .into_iter()
        .map(|amount| {
            if rest.is_empty() {
                amount.to_string()
            } else {
                format!("{amount} {rest}")
            }
        })
        .collect()
}

struct DeviceBlock {
    device: String,
    location: Option<String>,
    /// Transaction lines seen before the block's location marker.
    pending: Vec<(usize, String)>,
}

impl DeviceBlock {
    fn close(self, out: &mut Extraction) {
        if !self.pending.is_empty() {
            debug!(
                device = %self.device,
                lines = self.pending.len(),
                "device block ended without a location"
            );
        }
        for (line, _) in self.pending {
            out.skipped.push(SkippedLine {
                line,
                location: None,
                reason: SkipReason::MissingLocation,
            });
        }
    }
}

/// Scan a markup export for device blocks.
///
/// Line numbers refer to the flattened text, which matches the source for
/// plain-text exports and for markup that keeps one block element per line.
/// A document without device markers yields an empty extraction.
pub fn extract_markup(document: &str) -> Extraction {
    let text = flatten_markup(document);
    let mut out = Extraction::default();
    let mut block: Option<DeviceBlock> = None;

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            continue;
        }

        if let Some(caps) = DEVICE_RE.captures(&line) {
            if let Some(prev) = block.take() {
                prev.close(&mut out);
            }
            // Table rows flatten device and location cells onto one line.
            let location = caps
                .get(0)
                .and_then(|m| LOCATION_INLINE_RE.captures(&line[m.end()..]))
                .map(|c| c[1].to_string());
            block = Some(DeviceBlock {
                device: caps[1].to_string(),
                location,
                pending: Vec::new(),
            });
            continue;
        }

        if let Some(caps) = LOCATION_RE.captures(&line) {
            match block.as_mut() {
                Some(b) if b.location.is_none() => {
                    let location = caps[1].to_string();
                    for (line, text) in b.pending.drain(..) {
                        for details in split_transactions(&text) {
                            out.items.push(SalesLineItem {
                                line,
                                location: location.clone(),
                                details,
                            });
                        }
                    }
                    b.location = Some(location);
                }
                Some(b) => debug!(device = %b.device, line = line_no, "extra location marker ignored"),
                None => debug!(line = line_no, "location marker outside a device block"),
            }
            continue;
        }

        if !contains_amount(&line) {
            continue;
        }

        match block.as_mut() {
            Some(DeviceBlock { location: Some(location), .. }) => {
                for details in split_transactions(&line) {
                    out.items.push(SalesLineItem {
                        line: line_no,
                        location: location.clone(),
                        details,
                    });
                }
            }
            Some(b) => b.pending.push((line_no, line)),
            None => out.skipped.push(SkippedLine {
                line: line_no,
                location: None,
                reason: SkipReason::OutsideDeviceBlock,
            }),
        }
    }

    if let Some(last) = block.take() {
        last.close(&mut out);
    }

    debug!(
        items = out.items.len(),
        skipped = out.skipped.len(),
        "markup sales report extracted"
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> ColumnMapping {
        ColumnMapping::default()
    }

    #[test]
    fn tabular_headers_match_case_insensitively() {
        let doc = " Location ,DETAILS,Date\nMain St,\"1($1.00), 2($1.00)\",2025-03-01\n";
        let out = extract_tabular(doc, &columns()).unwrap();
        assert_eq!(out.items.len(), 1);
        assert_eq!(out.items[0].location, "Main St");
        assert_eq!(out.items[0].details, "1($1.00), 2($1.00)");
        assert_eq!(out.items[0].line, 2);
    }

    #[test]
    fn tabular_missing_column_is_an_error() {
        let err = extract_tabular("Location,Amount\nA,1\n", &columns()).unwrap_err();
        match err {
            ParseError::MissingColumns { missing, found } => {
                assert_eq!(missing, vec!["details".to_string()]);
                assert_eq!(found, vec!["Location".to_string(), "Amount".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn tabular_empty_document_is_missing_both_columns() {
        let err = extract_tabular("", &columns()).unwrap_err();
        assert!(matches!(err, ParseError::MissingColumns { ref missing, .. } if missing.len() == 2));
        assert!(err.to_string().contains("no header row"));
    }

    #[test]
    fn tabular_rows_without_values_are_skipped() {
        let doc = "location,details\n,1($1.00)\nLobby,\nGym,3($1.00)\n,\n";
        let out = extract_tabular(doc, &columns()).unwrap();
        assert_eq!(out.items.len(), 1);
        assert_eq!(out.items[0].location, "Gym");
        assert_eq!(out.skipped.len(), 2);
        assert_eq!(out.skipped[0].reason, SkipReason::MissingLocation);
        assert_eq!(out.skipped[0].line, 2);
        assert_eq!(out.skipped[1].reason, SkipReason::MissingDetails);
        assert_eq!(out.skipped[1].location.as_deref(), Some("Lobby"));
    }

    #[test]
    fn tabular_short_rows_are_tolerated() {
        let doc = "details,location\n1($1.00)\n2($1.00),Gym\n";
        let out = extract_tabular(doc, &columns()).unwrap();
        assert_eq!(out.items.len(), 1);
        assert_eq!(out.skipped[0].reason, SkipReason::MissingLocation);
    }

    #[test]
    fn tabular_custom_columns() {
        let cols = ColumnMapping {
            location: "Site".into(),
            details: "Items".into(),
        };
        let out = extract_tabular("site,items\nDepot,1($1.00)\n", &cols).unwrap();
        assert_eq!(out.items[0].location, "Depot");
    }

    #[test]
    fn tabular_strips_bom() {
        let out = extract_tabular("\u{feff}Location,Details\nA,1($1.00)\n", &columns()).unwrap();
        assert_eq!(out.items.len(), 1);
    }

    const PLAIN_MARKUP: &str = "\
Device: VM001
Location: Main St
1($1.00)
2($1.50) Two-Tier Pricing
Device: VM002
3($2.00)
Location: Gym
4($2.00)
";

    #[test]
    fn markup_blocks_attribute_to_location() {
        let out = extract_markup(PLAIN_MARKUP);
        let locs: Vec<_> = out.items.iter().map(|i| (i.location.as_str(), i.line)).collect();
        assert_eq!(
            locs,
            vec![("Main St", 3), ("Main St", 4), ("Gym", 6), ("Gym", 8)]
        );
        assert_eq!(out.items[1].details, "2($1.50) Two-Tier Pricing");
        assert!(out.skipped.is_empty());
    }

    #[test]
    fn markup_block_without_location_skips_its_lines() {
        let doc = "Device: VM9\n1($1.00)\n2($1.00)\nDevice: VM10\nLocation: Lobby\n3($1.00)\n";
        let out = extract_markup(doc);
        assert_eq!(out.items.len(), 1);
        assert_eq!(out.skipped.len(), 2);
        assert!(out.skipped.iter().all(|s| s.reason == SkipReason::MissingLocation));
    }

    #[test]
    fn markup_transactions_before_any_device_are_skipped() {
        let out = extract_markup("1($1.00)\nDevice: A1\nLocation: X\n");
        assert!(out.items.is_empty());
        assert_eq!(out.skipped[0].reason, SkipReason::OutsideDeviceBlock);
    }

    #[test]
    fn markup_without_devices_is_empty() {
        let out = extract_markup("<html><body><p>No sales today</p></body></html>");
        assert_eq!(out, Extraction::default());
    }

    #[test]
    fn html_table_cells_flatten_into_lines() {
        let doc = r#"<html><head><style>td { color: red; }</style></head><body>
<table>
<tr><td>Device:</td><td>KX42</td></tr>
<tr><td>Location:</td><td>Corner &amp; Deli</td></tr>
<tr><td>12(&#36;1.25)</td></tr>
<tr><td>13($1.25)</td><td>Two-Tier Pricing</td></tr>
</table><!-- Device: HIDDEN --></body></html>"#;
        let out = extract_markup(doc);
        assert_eq!(out.items.len(), 2);
        assert_eq!(out.items[0].location, "Corner & Deli");
        assert_eq!(out.items[0].details, "12($1.25)");
        assert_eq!(out.items[1].details, "13($1.25) Two-Tier Pricing");
    }

    #[test]
    fn markup_line_with_several_amounts_yields_one_item_each() {
        let doc = r#"<p>Device: VM1</p><p>Location: Gym</p>
<table><tr><td>12($1.25)</td><td>13($1.25)</td></tr>
<tr><td>14($1.25)</td><td>15($1.25)</td><td>Discrepancy</td></tr></table>
<p>1($1.00) 2($1.00)</p>"#;
        let out = extract_markup(doc);
        let details: Vec<_> = out.items.iter().map(|i| i.details.as_str()).collect();
        assert_eq!(
            details,
            vec![
                "12($1.25)",
                "13($1.25)",
                "14($1.25) Discrepancy",
                "15($1.25) Discrepancy",
                "1($1.00)",
                "2($1.00)",
            ]
        );
        assert!(out.items.iter().all(|i| i.location == "Gym"));
        assert_eq!(out.items[0].line, out.items[1].line);
        assert!(out.skipped.is_empty());
    }

    #[test]
    fn pending_line_with_several_amounts_is_split_once_located() {
        let out = extract_markup("Device: VM1\n1($1.00), 2($1.00)\nLocation: Lobby\n");
        assert_eq!(out.items.len(), 2);
        assert!(out.items.iter().all(|i| i.location == "Lobby" && i.line == 2));
    }

    #[test]
    fn device_and_location_in_one_table_row() {
        let doc = "<table><tr><td>Device: VM1</td><td>Location: Gym</td></tr>\n<tr><td>1($1.00)</td></tr></table>";
        let out = extract_markup(doc);
        assert_eq!(out.items.len(), 1);
        assert_eq!(out.items[0].location, "Gym");
        assert!(out.skipped.is_empty());
    }

    #[test]
    fn sniff_detects_formats() {
        assert_eq!(sniff_format("location,details\nA,1($1.00)\n"), DocumentFormat::Tabular);
        assert_eq!(sniff_format("Device: VM1\nLocation: A\n"), DocumentFormat::Markup);
        assert_eq!(sniff_format("<html></html>"), DocumentFormat::Markup);
    }

    #[test]
    fn extract_dispatches_on_format() {
        let out = extract(PLAIN_MARKUP, DocumentFormat::Markup, &columns()).unwrap();
        assert_eq!(out.items.len(), 4);
        assert!(extract(PLAIN_MARKUP, DocumentFormat::Tabular, &columns()).is_err());
    }
}
