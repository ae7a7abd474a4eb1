// src/load/mod.rs

use calamine::{open_workbook_auto, Data, Range, Reader};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::IngestError;

/// One untyped spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    /// Display form of the cell. Whole numbers lose their `.0` so that a
    /// numeric `2` reads the same as the text `"2"`.
    pub fn text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        if s.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }
}

impl From<&Data> for Cell {
    fn from(d: &Data) -> Self {
        match d {
            Data::Empty => Cell::Empty,
            Data::String(s) => Cell::from(s.as_str()),
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            other => Cell::Text(other.to_string()),
        }
    }
}

/// Header-less cell grid, anchored at A1.
pub type Grid = Vec<Vec<Cell>>;

/// A monthly sheet selected for ingestion.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    /// Calendar month, 1-based.
    pub month: u32,
    pub grid: Grid,
}

/// The month sheets of a workbook, in processing order.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

/// Convert a calamine range into a grid whose indices are absolute sheet
/// coordinates, padding for ranges that start below or right of A1.
pub fn grid_from_range(range: &Range<Data>) -> Grid {
    let (row_off, col_off) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut grid: Grid = vec![Vec::new(); row_off];
    for row in range.rows() {
        let mut cells = vec![Cell::Empty; col_off];
        cells.extend(row.iter().map(Cell::from));
        grid.push(cells);
    }
    grid
}

/// Open `path` and return the sheets named in `months`, in that order.
///
/// Sheets listed in `skip`, or not listed in `months`, are left out. A month
/// with no matching sheet is logged and skipped; an unreadable workbook or
/// sheet aborts with `SourceNotFound`.
#[tracing::instrument(level = "info", skip(path, months, skip), fields(path = %path.as_ref().display()))]
pub fn load_workbook<P: AsRef<Path>>(
    path: P,
    months: &[String],
    skip: &[String],
) -> Result<Workbook, IngestError> {
    let path = path.as_ref();
    let not_found = |reason: String| IngestError::SourceNotFound {
        path: path.to_path_buf(),
        reason,
    };

    if !path.is_file() {
        return Err(not_found("no such file".into()));
    }
    let mut workbook = open_workbook_auto(path).map_err(|e| not_found(e.to_string()))?;

    let available: Vec<String> = workbook.sheet_names().to_vec();
    debug!(sheets = ?available, "workbook opened");

    for name in &available {
        if !months.iter().any(|m| m.trim() == name.trim()) {
            debug!(sheet = %name, "not a month sheet, ignored");
        }
    }

    let mut sheets = Vec::new();
    for (idx, month) in months.iter().enumerate() {
        if skip.iter().any(|s| s.trim() == month.trim()) {
            debug!(sheet = %month, "in skip list");
            continue;
        }
        let Some(actual) = available.iter().find(|n| n.trim() == month.trim()) else {
            warn!(sheet = %month, "month sheet missing from workbook, skipped");
            continue;
        };
        let range = workbook
            .worksheet_range(actual)
            .map_err(|e| not_found(format!("sheet '{}': {}", actual, e)))?;
        let grid = grid_from_range(&range);
        debug!(sheet = %actual, rows = grid.len(), "sheet read");
        sheets.push(Sheet {
            name: actual.clone(),
            month: idx as u32 + 1,
            grid,
        });
    }

    info!(sheets = sheets.len(), "workbook loaded");
    Ok(Workbook { sheets })
}
