//! CSV export of evaluated display values

use crate::document::Document;
use crate::error::Result;
use cellflow_engine::engine::CellRef;
use std::path::Path;

/// Render the whole sheet as CSV, one line per row.
pub fn to_csv(doc: &Document) -> String {
    let mut out = String::new();
    for row in 0..doc.height() {
        let fields: Vec<String> = (0..doc.width())
            .map(|col| {
                doc.display(&CellRef::new(col, row))
                    .map(|value| escape_csv_field(&value))
                    .unwrap_or_default()
            })
            .collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

/// Export the sheet to `path` using evaluated display values.
pub fn write_csv(path: &Path, doc: &Document) -> Result<()> {
    std::fs::write(path, to_csv(doc))?;
    tracing::debug!(path = %path.display(), rows = doc.height(), "wrote csv");
    Ok(())
}

/// Escape a field for CSV output
fn escape_csv_field(field: &str) -> String {
    // Guard against CSV formula injection in spreadsheet apps.
    let first_non_space = field.trim_start_matches([' ', '\t']).chars().next();
    let safe_field = if matches!(first_non_space, Some('=' | '+' | '-' | '@')) {
        format!("'{}", field)
    } else {
        field.to_string()
    };

    if safe_field.contains(',')
        || safe_field.contains('"')
        || safe_field.contains('\n')
        || safe_field.contains('\r')
    {
        format!("\"{}\"", safe_field.replace('"', "\"\""))
    } else {
        safe_field
    }
}
