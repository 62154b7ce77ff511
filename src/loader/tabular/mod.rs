#[cfg(test)]
mod tests;

use crate::{RagError, Result};

const COLUMN_SEPARATOR: &str = "  ";

/// Render CSV bytes as an aligned text table, header row first
#[inline]
pub fn render_csv(bytes: &[u8]) -> Result<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| RagError::Load(format!("Invalid CSV: {e}")))?;
        rows.push(record.iter().map(|cell| cell.trim().to_string()).collect());
    }

    let column_count = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0_usize; column_count];
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let lines: Vec<String> = rows
        .iter()
        .map(|row| {
            let cells: Vec<String> = widths
                .iter()
                .enumerate()
                .map(|(i, &width)| {
                    let cell = row.get(i).map_or("", String::as_str);
                    format!("{cell:<width$}")
                })
                .collect();
            cells.join(COLUMN_SEPARATOR).trim_end().to_string()
        })
        .collect();

    Ok(lines.join("\n"))
}
