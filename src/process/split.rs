// src/process/split.rs

use tracing::{debug, instrument, trace, warn};

use crate::config::Settings;
use crate::error::IngestError;
use crate::load::Grid;
use crate::process::raw_table::RawTable;
use crate::process::utils::{clean_header, clean_str};

/// The two stacked tables of a monthly sheet.
#[derive(Debug)]
pub struct SplitSheet {
    /// Individual interview records.
    pub primary: RawTable,
    /// Legend rows, absent when the sheet has a single marker row.
    pub secondary: Option<RawTable>,
}

/// Row indices whose `column` cell reads `marker` once cleaned.
pub fn find_markers(grid: &Grid, column: usize, marker: &str) -> Vec<usize> {
    grid.iter()
        .enumerate()
        .filter(|(_, row)| {
            row.get(column)
                .is_some_and(|cell| clean_header(&cell.text()) == marker)
        })
        .map(|(idx, _)| idx)
        .collect()
}

fn header_row(grid: &Grid, idx: usize) -> Vec<String> {
    grid.get(idx)
        .map(|row| row.iter().map(|c| clean_header(&c.text())).collect())
        .unwrap_or_default()
}

/// Cell text of `grid[start..end]` restricted to `columns`, missing cells as "".
fn slice_rows(grid: &Grid, start: usize, end: usize, columns: &[usize]) -> Vec<Vec<String>> {
    let end = end.min(grid.len());
    if start >= end {
        return Vec::new();
    }
    grid[start..end]
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|&c| row.get(c).map(|cell| clean_str(&cell.text())).unwrap_or_default())
                .collect()
        })
        .collect()
}

/// Locate the marker rows of `grid` and slice out the record and legend tables.
///
/// The record table sits between the first two markers, the legend table
/// starts two rows below the second. With a single marker the record table
/// runs to the end of the sheet and there is no legend.
#[instrument(level = "debug", skip(grid, settings), fields(rows = grid.len()))]
pub fn split_sheet(sheet: &str, grid: &Grid, settings: &Settings) -> Result<SplitSheet, IngestError> {
    let marker = clean_header(&settings.marker_value);
    let edge = clean_header(&settings.right_edge_column);

    let markers = find_markers(grid, settings.marker_column, &marker);
    trace!(?markers, "marker rows");
    let Some(&first) = markers.first() else {
        return Err(IngestError::malformed(
            sheet,
            format!(
                "no '{}' marker in column {}",
                settings.marker_value, settings.marker_column
            ),
        ));
    };
    if markers.len() > 2 {
        warn!(sheet, extra = markers.len() - 2, "more than two marker rows, extras ignored");
    }
    let second = markers.get(1).copied();

    let head = header_row(grid, first);
    let edge_idx = head.iter().position(|h| *h == edge).ok_or_else(|| {
        IngestError::malformed(
            sheet,
            format!("record header (row {}) has no '{}' column", first + 1, edge),
        )
    })?;
    let columns: Vec<usize> = (0..=edge_idx).collect();
    let primary = RawTable {
        headers: head[..=edge_idx].to_vec(),
        rows: slice_rows(grid, first + 1, second.unwrap_or(grid.len()), &columns),
        first_row: first + 1,
    };

    let secondary = match second {
        Some(m) => Some(legend_table(sheet, grid, m, &edge, settings)?),
        None => {
            debug!(sheet, "single marker row, no legend table");
            None
        }
    };

    debug!(
        sheet,
        records = primary.rows.len(),
        legend_rows = secondary.as_ref().map_or(0, |t| t.rows.len()),
        "sheet split"
    );
    Ok(SplitSheet { primary, secondary })
}

fn legend_table(
    sheet: &str,
    grid: &Grid,
    marker: usize,
    edge: &str,
    settings: &Settings,
) -> Result<RawTable, IngestError> {
    let head = header_row(grid, marker);
    let edge_idx = head.iter().position(|h| h == edge).ok_or_else(|| {
        IngestError::malformed(
            sheet,
            format!("legend header (row {}) has no '{}' column", marker + 1, edge),
        )
    })?;

    let dropped: Vec<String> = settings
        .non_categorical_columns
        .iter()
        .map(|c| clean_header(c))
        .collect();
    let columns: Vec<usize> = (0..edge_idx)
        .filter(|&i| !dropped.contains(&head[i]))
        .collect();

    let start = marker + 2;
    Ok(RawTable {
        headers: columns.iter().map(|&i| head[i].clone()).collect(),
        rows: slice_rows(grid, start, grid.len(), &columns),
        first_row: start,
    })
}
