//! Moves the initiatives between the local store and the sheet. Only whole-collection transfers
//! exist: a pull replaces everything local, a push replaces everything in the range.

use crate::api::Sheet;
use crate::model::{grid, Initiative};
use crate::Result;
use anyhow::Context;
use tracing::{debug, info};

/// Reads `range` and parses its rows. `None` means the sheet holds no initiatives and local data
/// should be left alone.
pub(crate) async fn pull(
    sheet: &mut (dyn Sheet + Send),
    range: &str,
) -> Result<Option<Vec<Initiative>>> {
    let rows = sheet
        .get(range)
        .await
        .with_context(|| format!("Unable to read the initiatives from {range}"))?;
    debug!("Received {} rows from {range}", rows.len());
    let initiatives = grid::from_rows(rows)?;
    match &initiatives {
        Some(initiatives) => info!("Pulled {} initiatives from the sheet", initiatives.len()),
        None => info!("The sheet has no initiatives, keeping local data"),
    }
    Ok(initiatives)
}

/// Writes `rows` at the top of `range`, then clears whatever is left below them.
///
/// The rows are written before anything is cleared, so a failed request leaves the previous
/// content of the sheet in place.
pub(crate) async fn push(
    sheet: &mut (dyn Sheet + Send),
    range: &str,
    rows: &[Vec<String>],
) -> Result<()> {
    sheet
        .write(range, rows)
        .await
        .with_context(|| format!("Unable to write the initiatives to {range}"))?;
    if let Some(below) = rows_below(range, rows.len())? {
        sheet
            .clear(&below)
            .await
            .with_context(|| format!("Unable to clear the stale rows in {below}"))?;
    }
    // The header row is not an initiative.
    info!(
        "Pushed {} initiatives to the sheet",
        rows.len().saturating_sub(1)
    );
    Ok(())
}

/// The part of the A1 range `range` that starts `count` rows below its first row, e.g.
/// `Sheet1!A4:F` for `Sheet1!A:F` and 3. `None` when the range has no rows left.
pub(crate) fn rows_below(range: &str, count: usize) -> Result<Option<String>> {
    let (prefix, cells) = match range.rsplit_once('!') {
        Some((sheet, cells)) => (format!("{sheet}!"), cells),
        None => (String::new(), range),
    };
    let (start, end) = cells.split_once(':').unwrap_or((cells, cells));
    let (start_col, start_row) =
        split_cell(start).with_context(|| format!("Unable to understand the range {range}"))?;
    let (end_col, end_row) =
        split_cell(end).with_context(|| format!("Unable to understand the range {range}"))?;

    let first = u64::from(start_row.unwrap_or(1)) + count as u64;
    let end = match end_row {
        Some(end_row) if first > u64::from(end_row) => return Ok(None),
        Some(end_row) => format!("{end_col}{end_row}"),
        None => end_col.to_string(),
    };
    Ok(Some(format!("{prefix}{start_col}{first}:{end}")))
}

/// Splits an A1 cell reference like `B12` or a bare column like `F` into column and row.
fn split_cell(cell: &str) -> Result<(&str, Option<u32>)> {
    let cell = cell.trim();
    let split = cell
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(cell.len());
    let (col, row) = cell.split_at(split);
    anyhow::ensure!(!col.is_empty(), "'{cell}' does not start with a column");
    if row.is_empty() {
        return Ok((col, None));
    }
    let row = row
        .parse::<u32>()
        .with_context(|| format!("'{cell}' is not a cell reference"))?;
    Ok((col, Some(row)))
}
