// Sales report documents

use std::io::{self, Read};
use std::path::Path;

use vendstock_recon::extract::sniff_format;
use vendstock_recon::DocumentFormat;

/// A sales export loaded into memory, with the format it will be parsed as.
#[derive(Debug, Clone)]
pub struct SalesDocument {
    pub content: String,
    pub format: DocumentFormat,
}

/// Load a sales export. `format` overrides detection.
pub fn load_report(path: &Path, format: Option<DocumentFormat>) -> io::Result<SalesDocument> {
    let content = read_file_as_utf8(path)?;
    let format = format.unwrap_or_else(|| detect_format(path, &content));
    tracing::debug!(path = %path.display(), %format, bytes = content.len(), "sales report loaded");
    Ok(SalesDocument { content, format })
}

/// Extension first (`.csv` is tabular, `.html`/`.htm` is markup), then content.
pub fn detect_format(path: &Path, content: &str) -> DocumentFormat {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("csv") => DocumentFormat::Tabular,
        Some("html") | Some("htm") | Some("xhtml") => DocumentFormat::Markup,
        _ => sniff_format(content),
    }
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
pub fn read_file_as_utf8(path: &Path) -> io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    // Try UTF-8 first; on failure, recover the buffer from the error
    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            // Fall back to Windows-1252 (common for Excel-exported CSVs)
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            tracing::debug!(path = %path.display(), "file is not UTF-8; decoded as Windows-1252");
            Ok(decoded.into_owned())
        }
    }
}
