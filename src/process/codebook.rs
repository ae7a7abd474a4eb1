// src/process/codebook.rs

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::process::raw_table::RawTable;
use crate::process::utils::{clean_header, label_key};

static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").expect("digits pattern"));

/// Split a legend cell such as `"12. Logement"` into `("12", "Logement")`.
///
/// The code ends at the first `.` when that dot sits in the first half of
/// the text, otherwise at the first space. Only pure-digit codes with a
/// non-empty label are accepted.
pub fn split_code_label(cell: &str) -> Option<(String, String)> {
    let text = cell.trim();
    let half = text.len() / 2;
    let cut = match text.find('.') {
        Some(dot) if dot < half => dot,
        _ => text.find(' ')?,
    };
    let code = text[..cut].trim();
    let label = text[cut..].trim_start().trim_start_matches('.').trim();
    if !DIGITS.is_match(code) || label.is_empty() {
        return None;
    }
    Some((code.to_string(), label.to_string()))
}

/// Code ↔ label dictionary of one legend column.
#[derive(Debug, Default, PartialEq)]
pub struct Legend {
    labels: BTreeMap<String, String>,
    codes: HashMap<String, String>,
}

impl Legend {
    fn insert(&mut self, code: String, label: String) {
        // first code seen for a label wins the reverse direction
        self.codes.entry(label_key(&label)).or_insert_with(|| code.clone());
        self.labels.insert(code, label);
    }

    pub fn label(&self, code: &str) -> Option<&str> {
        self.labels.get(code.trim()).map(String::as_str)
    }

    /// Reverse lookup, case- and whitespace-insensitive.
    pub fn code(&self, label: &str) -> Option<&str> {
        self.codes.get(&label_key(label)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.labels.iter().map(|(c, l)| (c.as_str(), l.as_str()))
    }
}

/// Per-sheet legends keyed by column header. Built once, then read-only.
#[derive(Debug, Default)]
pub struct CodeBook {
    columns: HashMap<String, Arc<Legend>>,
}

impl CodeBook {
    /// Build from a sheet's legend table, then point the later demand and
    /// solution slot columns at the first slot's legend.
    pub fn build(legend: &RawTable, demand_columns: &[String], solution_columns: &[String]) -> Self {
        let mut columns = HashMap::new();

        for (idx, header) in legend.headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let mut entries = Legend::default();
            for row in &legend.rows {
                let Some(cell) = row.get(idx) else { continue };
                match split_code_label(cell) {
                    Some((code, label)) => entries.insert(code, label),
                    None if !cell.is_empty() => {
                        trace!(column = %header, cell = %cell, "legend cell skipped")
                    }
                    None => {}
                }
            }
            if !entries.is_empty() {
                debug!(column = %header, entries = entries.len(), "legend column");
                columns.insert(header.clone(), Arc::new(entries));
            }
        }

        let mut book = CodeBook { columns };
        book.alias_slots(demand_columns);
        book.alias_slots(solution_columns);
        book
    }

    fn alias_slots(&mut self, slots: &[String]) {
        let Some((first, rest)) = slots.split_first() else {
            return;
        };
        let shared = self.columns.get(&clean_header(first)).cloned();
        for slot in rest {
            let key = clean_header(slot);
            match &shared {
                Some(legend) => {
                    self.columns.insert(key, Arc::clone(legend));
                }
                None => {
                    self.columns.remove(&key);
                }
            }
        }
    }

    pub fn get(&self, column: &str) -> Option<&Arc<Legend>> {
        self.columns.get(column)
    }

    pub fn label(&self, column: &str, code: &str) -> Option<&str> {
        self.get(column).and_then(|l| l.label(code))
    }

    pub fn code_for_label(&self, column: &str, label: &str) -> Option<&str> {
        self.get(column).and_then(|l| l.code(label))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
