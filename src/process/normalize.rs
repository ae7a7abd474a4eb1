// src/process/normalize.rs

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, trace};

use crate::config::Settings;
use crate::process::codebook::CodeBook;
use crate::process::lookup::{Field, FieldKind};
use crate::process::utils::{clean_header, clean_str, is_placeholder, label_key, truncate_chars};
use crate::store::CaseRecord;

static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").expect("integer pattern"));
static SHORT_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+[a-z]?$").expect("short code pattern"));

/// Outcome of resolving one cell against one target field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Code(String),
    Text(String),
    Null,
    /// A lookup produced something the field cannot hold.
    Invalid(String),
}

/// A resolved value that breaks its column's contract.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidValue {
    pub field: Field,
    pub value: String,
}

fn matches_kind(kind: FieldKind, s: &str) -> bool {
    match kind {
        FieldKind::Integer => INTEGER.is_match(s),
        FieldKind::ShortCode => SHORT_CODE.is_match(&s.to_lowercase()),
        FieldKind::Text => true,
    }
}

/// Tag `code` for a field of `kind`, or mark it invalid.
fn typed(kind: FieldKind, code: &str) -> FieldValue {
    let code = code.trim();
    if !matches_kind(kind, code) {
        return FieldValue::Invalid(code.to_string());
    }
    match kind {
        FieldKind::Integer => code
            .parse()
            .map(FieldValue::Int)
            .unwrap_or_else(|_| FieldValue::Invalid(code.to_string())),
        FieldKind::ShortCode => FieldValue::Code(code.to_lowercase()),
        FieldKind::Text => FieldValue::Text(code.to_string()),
    }
}

/// The configured label → code table, keyed for case-insensitive lookup.
#[derive(Debug, Default)]
pub struct ValueTable {
    codes: HashMap<Field, HashMap<String, String>>,
}

impl ValueTable {
    pub fn from_settings(settings: &Settings) -> Self {
        let codes = settings
            .value_codes
            .iter()
            .filter_map(|(name, pairs)| {
                let field = Field::from_name(name)?;
                let keyed = pairs
                    .iter()
                    .map(|(label, code)| (label_key(label), code.trim().to_string()))
                    .collect();
                Some((field, keyed))
            })
            .collect();
        ValueTable { codes }
    }

    pub fn code(&self, field: Field, raw: &str) -> Option<&str> {
        self.codes
            .get(&field)
            .and_then(|m| m.get(&label_key(raw)))
            .map(String::as_str)
    }
}

/// Where each field and demand/solution slot sits in a sheet's record table,
/// worked out once per sheet from the header row.
#[derive(Debug, Default)]
pub struct ColumnMap {
    fields: HashMap<Field, usize>,
    demand_slots: Vec<(usize, String)>,
    solution_slots: Vec<(usize, String)>,
}

impl ColumnMap {
    pub fn resolve(headers: &[String], settings: &Settings) -> Self {
        let position = |name: &str| {
            let wanted = clean_header(name);
            headers.iter().position(|h| *h == wanted)
        };

        let mut fields = HashMap::new();
        for field in Field::ALL {
            match settings.aliases(field).iter().find_map(|a| position(a)) {
                Some(idx) => {
                    trace!(%field, column = %headers[idx], "field column");
                    fields.insert(field, idx);
                }
                None => debug!(%field, "no column for field"),
            }
        }

        let slots = |names: &[String]| -> Vec<(usize, String)> {
            names
                .iter()
                .filter_map(|n| position(n).map(|idx| (idx, clean_header(n))))
                .collect()
        };

        ColumnMap {
            fields,
            demand_slots: slots(&settings.demand_columns),
            solution_slots: slots(&settings.solution_columns),
        }
    }

    pub fn index(&self, field: Field) -> Option<usize> {
        self.fields.get(&field).copied()
    }
}

/// Turns record-table rows into `CaseRecord`s for one sheet.
pub struct RecordNormalizer<'a> {
    settings: &'a Settings,
    values: &'a ValueTable,
    codebook: &'a CodeBook,
    columns: ColumnMap,
    /// Legend column consulted for each field, if the sheet has one.
    legends: HashMap<Field, String>,
}

impl<'a> RecordNormalizer<'a> {
    pub fn new(
        settings: &'a Settings,
        values: &'a ValueTable,
        codebook: &'a CodeBook,
        headers: &[String],
    ) -> Self {
        let legends = Field::ALL
            .iter()
            .filter_map(|&field| {
                settings
                    .aliases(field)
                    .iter()
                    .map(|a| clean_header(a))
                    .find(|a| codebook.get(a).is_some())
                    .map(|column| (field, column))
            })
            .collect();

        RecordNormalizer {
            settings,
            values,
            codebook,
            columns: ColumnMap::resolve(headers, settings),
            legends,
        }
    }

    fn raw<'r>(&self, field: Field, row: &'r [String]) -> Option<&'r str> {
        self.columns
            .index(field)
            .and_then(|idx| row.get(idx))
            .map(String::as_str)
            .filter(|raw| !is_placeholder(raw))
    }

    /// Resolve one field: static table, then the sheet legend, then the raw
    /// value if it already has the field's shape, otherwise NULL.
    pub fn resolve(&self, field: Field, row: &[String]) -> FieldValue {
        let Some(raw) = self.raw(field, row) else {
            return FieldValue::Null;
        };
        let raw = clean_str(raw);

        let kind = field.kind();
        if kind == FieldKind::Text {
            let text = match self.settings.string_limit(field) {
                Some(max) => truncate_chars(&raw, max),
                None => raw,
            };
            return typed(kind, &text);
        }

        if let Some(code) = self.values.code(field, &raw) {
            return typed(kind, code);
        }
        if let Some(code) = self
            .legends
            .get(&field)
            .and_then(|column| self.codebook.code_for_label(column, &raw))
        {
            return typed(kind, code);
        }
        if matches_kind(kind, &raw) {
            return typed(kind, &raw);
        }
        trace!(%field, raw = %raw, "unmapped value");
        FieldValue::Null
    }

    /// Slot cells joined with ", ", legend codes replaced by their label.
    fn slot_text(&self, slots: &[(usize, String)], row: &[String]) -> String {
        slots
            .iter()
            .filter_map(|(idx, column)| {
                let raw = row.get(*idx).filter(|r| !is_placeholder(r))?;
                let raw = clean_str(raw);
                Some(
                    self.codebook
                        .label(column, &raw)
                        .map(str::to_string)
                        .unwrap_or(raw),
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Build the record for `row`, or `None` for a filler row (no mode and
    /// no sex). A missing children count becomes 0.
    pub fn normalize(
        &self,
        row: &[String],
        date: NaiveDate,
    ) -> Result<Option<CaseRecord>, InvalidValue> {
        let mode = self.resolve(Field::Mode, row);
        let sexe = self.resolve(Field::Sexe, row);
        if mode == FieldValue::Null && sexe == FieldValue::Null {
            return Ok(None);
        }

        let int = |field: Field| int_field(field, self.resolve(field, row));

        Ok(Some(CaseRecord {
            date,
            mode: int_field(Field::Mode, mode)?,
            duree: int(Field::Duree)?,
            sexe: int_field(Field::Sexe, sexe)?,
            age: int(Field::Age)?,
            vient_pr: int(Field::VientPr)?,
            sit_fam: code_field(Field::SitFam, self.resolve(Field::SitFam, row))?,
            enfant: int(Field::Enfant)?.unwrap_or(0),
            modele_fam: int(Field::ModeleFam)?,
            profession: int(Field::Profession)?,
            ress: int(Field::Ress)?,
            origine: int(Field::Origine)?,
            commune: text_field(Field::Commune, self.resolve(Field::Commune, row))?,
            partenaire: text_field(Field::Partenaire, self.resolve(Field::Partenaire, row))?,
            demande_txt: self.slot_text(&self.columns.demand_slots, row),
            solution_txt: self.slot_text(&self.columns.solution_slots, row),
        }))
    }
}

fn int_field(field: Field, value: FieldValue) -> Result<Option<i64>, InvalidValue> {
    match value {
        FieldValue::Int(n) => Ok(Some(n)),
        FieldValue::Null => Ok(None),
        FieldValue::Code(v) | FieldValue::Text(v) | FieldValue::Invalid(v) => {
            Err(InvalidValue { field, value: v })
        }
    }
}

fn code_field(field: Field, value: FieldValue) -> Result<Option<String>, InvalidValue> {
    match value {
        FieldValue::Code(c) => Ok(Some(c)),
        FieldValue::Int(n) => Ok(Some(n.to_string())),
        FieldValue::Null => Ok(None),
        FieldValue::Text(v) | FieldValue::Invalid(v) => Err(InvalidValue { field, value: v }),
    }
}

fn text_field(field: Field, value: FieldValue) -> Result<Option<String>, InvalidValue> {
    match value {
        FieldValue::Text(t) => Ok(Some(t)),
        FieldValue::Null => Ok(None),
        FieldValue::Int(n) => Ok(Some(n.to_string())),
        FieldValue::Code(v) | FieldValue::Invalid(v) => Err(InvalidValue { field, value: v }),
    }
}
