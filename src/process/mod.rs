// src/process/mod.rs

pub mod codebook;
pub mod date_parser;
pub mod lookup;
pub mod normalize;
pub mod raw_table;
pub mod split;
pub mod utils;

use anyhow::Result;
use std::time::Instant;
use tracing::{error, info, instrument, trace, warn};

use crate::config::Settings;
use crate::error::IngestError;
use crate::load::{load_workbook, Sheet, Workbook};
use crate::store::Store;

use codebook::CodeBook;
use date_parser::month_stamp;
use normalize::{InvalidValue, RecordNormalizer, ValueTable};
use split::{split_sheet, SplitSheet};

/// Counters for one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub sheets_ingested: usize,
    pub sheets_skipped: usize,
    /// Interviews written to the store.
    pub inserted: usize,
    /// Filler rows with neither mode nor sex.
    pub discarded: usize,
    /// Rows stopped by a value their column cannot hold.
    pub invalid: usize,
    /// Rows the store rejected.
    pub failed: usize,
}

/// Load the configured workbook and append every month sheet to the database.
///
/// Fails only if the workbook or the database cannot be opened; sheet and
/// record problems are logged and counted in the report.
pub fn run(settings: &Settings) -> Result<IngestReport> {
    let start = Instant::now();
    info!(
        workbook = %settings.data_file_path.display(),
        database = %settings.database_path.display(),
        "starting ingestion"
    );

    let workbook = load_workbook(
        &settings.data_file_path,
        &settings.months,
        &settings.skip_sheets,
    )?;
    let mut store = Store::open(&settings.database_path)?;
    let report = ingest_workbook(&workbook, &mut store, settings);

    info!(elapsed = ?start.elapsed(), "completed");
    Ok(report)
}

/// Run split → codebook → normalize → insert over each sheet, in order.
pub fn ingest_workbook(workbook: &Workbook, store: &mut Store, settings: &Settings) -> IngestReport {
    let values = ValueTable::from_settings(settings);
    let mut report = IngestReport::default();

    for sheet in &workbook.sheets {
        match ingest_sheet(sheet, store, settings, &values, &mut report) {
            Ok(()) => report.sheets_ingested += 1,
            Err(e) => {
                warn!(sheet = %sheet.name, error = %e, "sheet skipped");
                report.sheets_skipped += 1;
            }
        }
    }

    info!(
        sheets = report.sheets_ingested,
        skipped = report.sheets_skipped,
        inserted = report.inserted,
        discarded = report.discarded,
        invalid = report.invalid,
        failed = report.failed,
        "ingestion summary"
    );
    report
}

#[instrument(level = "info", skip_all, fields(sheet = %sheet.name))]
fn ingest_sheet(
    sheet: &Sheet,
    store: &mut Store,
    settings: &Settings,
    values: &ValueTable,
    report: &mut IngestReport,
) -> Result<(), IngestError> {
    let date = month_stamp(settings.year, sheet.month).ok_or_else(|| {
        IngestError::malformed(&sheet.name, format!("month {} has no date", sheet.month))
    })?;

    let SplitSheet { primary, secondary } = split_sheet(&sheet.name, &sheet.grid, settings)?;
    let codebook = secondary
        .as_ref()
        .map(|legend| {
            CodeBook::build(legend, &settings.demand_columns, &settings.solution_columns)
        })
        .unwrap_or_default();
    let normalizer = RecordNormalizer::new(settings, values, &codebook, &primary.headers);

    let before = report.inserted;
    for (idx, row) in primary.rows.iter().enumerate() {
        let sheet_row = primary.sheet_row(idx);
        match normalizer.normalize(row, date) {
            Ok(Some(record)) => match store.insert_case(&record) {
                Ok(_) => report.inserted += 1,
                Err(source) => {
                    let err = IngestError::PersistenceFailure {
                        sheet: sheet.name.clone(),
                        row: sheet_row,
                        source,
                    };
                    error!(month = sheet.month, row = sheet_row, "{}", err);
                    report.failed += 1;
                }
            },
            Ok(None) => {
                trace!(row = sheet_row, "filler row discarded");
                report.discarded += 1;
            }
            Err(InvalidValue { field, value }) => {
                let raw = primary
                    .headers
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .filter(|(_, v)| !v.is_empty())
                    .collect();
                let err = IngestError::InvalidNormalizedValue {
                    sheet: sheet.name.clone(),
                    row: sheet_row,
                    field: field.to_string(),
                    value,
                    raw,
                };
                error!(column = %field, row = sheet_row, "{}", err);
                report.invalid += 1;
            }
        }
    }

    info!(
        records = primary.rows.len(),
        inserted = report.inserted - before,
        legend_columns = codebook.len(),
        "sheet ingested"
    );
    Ok(())
}
