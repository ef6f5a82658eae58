// file: src/exporter/sanitize.rs
// description: spreadsheet formula injection guard for csv cells

use std::borrow::Cow;

const FORMULA_TRIGGERS: [char; 4] = ['=', '+', '-', '@'];

/// Prefixes cells a spreadsheet would evaluate as a formula with `'`.
pub fn escape_formula(cell: &str) -> Cow<'_, str> {
    if cell.starts_with(FORMULA_TRIGGERS) {
        Cow::Owned(format!("'{}", cell))
    } else {
        Cow::Borrowed(cell)
    }
}
