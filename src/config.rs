// src/config.rs

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

use crate::error::IngestError;
use crate::process::lookup::{default_field_aliases, default_value_codes, Field, FieldKind};

const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Everything the ingestion run reads from `config.json` and the environment.
///
/// Only `DATA_FILE_PATH` is required; every sheet-layout constant has a
/// default matching the association's monthly workbook.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(rename = "DATA_FILE_PATH")]
    pub data_file_path: PathBuf,
    #[serde(rename = "DATABASE_PATH")]
    pub database_path: PathBuf,

    /// The twelve month sheet names, January first; position + 1 is the
    /// calendar month. Use `skip_sheets` to leave a month out.
    pub months: Vec<String>,
    pub skip_sheets: Vec<String>,

    /// Zero-based column holding the sub-table marker.
    pub marker_column: usize,
    pub marker_value: String,
    /// Last useful primary column (inclusive); secondary tables stop just before it.
    pub right_edge_column: String,
    pub non_categorical_columns: Vec<String>,
    pub demand_columns: Vec<String>,
    pub solution_columns: Vec<String>,

    /// Year stamped on every record, the sheets only carry a month.
    pub year: i32,

    pub field_aliases: BTreeMap<String, Vec<String>>,
    pub value_codes: BTreeMap<String, BTreeMap<String, String>>,
    pub string_limits: BTreeMap<String, usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            data_file_path: PathBuf::new(),
            database_path: PathBuf::from("database.db"),
            months: [
                "Jan", "Fev", "Mar", "Avr", "Mai", "Juin", "Juil", "Aoû", "Sep", "Oct", "Nov",
                "Déc",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            skip_sheets: vec!["N°".into(), "Total quartiers".into()],
            marker_column: 1,
            marker_value: "Mode".into(),
            right_edge_column: "Domicile".into(),
            non_categorical_columns: vec!["Tot.Dem.".into(), "Tot.Sol".into(), "N°".into()],
            demand_columns: vec!["Dem.1".into(), "Dem.2".into(), "Dem.3".into()],
            solution_columns: vec!["Sol.1".into(), "Sol.2".into(), "Sol.3".into()],
            year: 2024,
            field_aliases: BTreeMap::new(),
            value_codes: BTreeMap::new(),
            string_limits: default_string_limits(),
        }
    }
}

fn default_string_limits() -> BTreeMap<String, usize> {
    BTreeMap::from([
        ("COMMUNE".to_string(), 50),
        ("PARTENAIRE".to_string(), 100),
    ])
}

impl Settings {
    /// Resolve the config file (argument, then `MDD_CONFIG`, then `config.json`),
    /// apply `MDD_*` overrides and validate.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = config_path
            .map(Path::to_path_buf)
            .or_else(|| env::var_os("MDD_CONFIG").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut settings = if path.is_file() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading config file {:?}", path))?;
            let parsed = Self::from_json_str(&text)
                .with_context(|| format!("parsing config file {:?}", path))?;
            info!(config = %path.display(), "loaded configuration");
            parsed
        } else if env::var_os("MDD_DATA_FILE_PATH").is_some() {
            debug!(config = %path.display(), "no config file, using defaults + environment");
            Settings::default()
        } else {
            bail!(
                "config file {:?} not found and MDD_DATA_FILE_PATH is not set",
                path
            );
        };

        if let Some(p) = env::var_os("MDD_DATA_FILE_PATH") {
            settings.data_file_path = PathBuf::from(p);
        }
        if let Some(p) = env::var_os("MDD_DATABASE_PATH") {
            settings.database_path = PathBuf::from(p);
        }
        if let Ok(y) = env::var("MDD_YEAR") {
            settings.year = y
                .trim()
                .parse()
                .with_context(|| format!("MDD_YEAR={:?} is not a year", y))?;
        }

        settings.finish()?;
        Ok(settings)
    }

    /// Parse a JSON document without merging defaults; call [`Settings::finish`] after.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Merge the built-in alias and value tables under the configured ones and
    /// check the result is usable.
    pub fn finish(&mut self) -> Result<(), IngestError> {
        // configured aliases are tried before the built-in spellings
        for (field, defaults) in default_field_aliases() {
            let entry = self.field_aliases.entry(field).or_default();
            for alias in defaults {
                if !entry.contains(&alias) {
                    entry.push(alias);
                }
            }
        }
        // configured value codes win over the built-in table on the same label
        for (field, defaults) in default_value_codes() {
            let entry = self.value_codes.entry(field).or_default();
            for (label, code) in defaults {
                entry.entry(label).or_insert(code);
            }
        }
        for (field, limit) in default_string_limits() {
            self.string_limits.entry(field).or_insert(limit);
        }
        self.validate()
    }

    fn validate(&self) -> Result<(), IngestError> {
        if self.data_file_path.as_os_str().is_empty() {
            return Err(IngestError::Config("DATA_FILE_PATH is empty".into()));
        }
        // a sheet's calendar month is its position in this list
        if self.months.len() != 12 {
            return Err(IngestError::Config(format!(
                "expected 12 month sheet names, January first, got {}",
                self.months.len()
            )));
        }
        if self.marker_value.trim().is_empty() || self.right_edge_column.trim().is_empty() {
            return Err(IngestError::Config(
                "marker_value and right_edge_column must be set".into(),
            ));
        }
        if self.demand_columns.is_empty() || self.solution_columns.is_empty() {
            return Err(IngestError::Config(
                "demand_columns and solution_columns need at least one column".into(),
            ));
        }
        if chrono::NaiveDate::from_ymd_opt(self.year, 1, 1).is_none() {
            return Err(IngestError::Config(format!("year {} is out of range", self.year)));
        }
        for name in self
            .field_aliases
            .keys()
            .chain(self.value_codes.keys())
            .chain(self.string_limits.keys())
        {
            if Field::from_name(name).is_none() {
                return Err(IngestError::Config(format!("unknown field {:?}", name)));
            }
        }
        for (name, limit) in &self.string_limits {
            if *limit == 0 {
                return Err(IngestError::Config(format!("string limit for {} is zero", name)));
            }
        }
        Ok(())
    }

    pub fn aliases(&self, field: Field) -> &[String] {
        self.field_aliases
            .get(field.name())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Character limit for a text field; `None` keeps the value whole.
    pub fn string_limit(&self, field: Field) -> Option<usize> {
        debug_assert_eq!(field.kind(), FieldKind::Text);
        self.string_limits.get(field.name()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_config_only_needs_data_path() -> Result<()> {
        let mut s = Settings::from_json_str(r#"{"DATA_FILE_PATH": "data/stats.xlsx"}"#)?;
        s.finish()?;
        assert_eq!(s.data_file_path, PathBuf::from("data/stats.xlsx"));
        assert_eq!(s.months.len(), 12);
        assert_eq!(s.marker_value, "Mode");
        assert!(s.aliases(Field::SitFam).iter().any(|a| a == "Sit° Fam"));
        assert_eq!(s.string_limit(Field::Commune), Some(50));
        Ok(())
    }

    #[test]
    fn configured_aliases_come_first_and_codes_override() -> Result<()> {
        let mut s = Settings::from_json_str(
            r#"{
                "DATA_FILE_PATH": "x.xlsx",
                "field_aliases": {"MODE": ["Type RDV"]},
                "value_codes": {"MODE": {"RDV": "9", "Visio": "6"}}
            }"#,
        )?;
        s.finish()?;
        assert_eq!(s.aliases(Field::Mode)[0], "Type RDV");
        assert!(s.aliases(Field::Mode).iter().any(|a| a == "Mode"));
        assert_eq!(s.value_codes["MODE"]["RDV"], "9");
        assert_eq!(s.value_codes["MODE"]["Visio"], "6");
        assert_eq!(s.value_codes["MODE"]["Sans RDV"], "2");
        Ok(())
    }

    #[test]
    fn unknown_field_is_rejected() -> Result<()> {
        let mut s = Settings::from_json_str(
            r#"{"DATA_FILE_PATH": "x.xlsx", "field_aliases": {"QUARTIER": ["Quartier"]}}"#,
        )?;
        assert!(matches!(s.finish(), Err(IngestError::Config(_))));
        Ok(())
    }

    #[test]
    fn partial_string_limits_keep_the_other_bounds() -> Result<()> {
        let mut s = Settings::from_json_str(
            r#"{"DATA_FILE_PATH": "x.xlsx", "string_limits": {"COMMUNE": 20}}"#,
        )?;
        s.finish()?;
        assert_eq!(s.string_limit(Field::Commune), Some(20));
        assert_eq!(s.string_limit(Field::Partenaire), Some(100));
        Ok(())
    }

    #[test]
    fn month_list_must_cover_the_whole_year() -> Result<()> {
        let mut s = Settings::from_json_str(
            r#"{"DATA_FILE_PATH": "x.xlsx", "months": ["Sep", "Oct"]}"#,
        )?;
        assert!(matches!(s.finish(), Err(IngestError::Config(_))));

        let mut s = Settings::from_json_str(
            r#"{"DATA_FILE_PATH": "x.xlsx", "skip_sheets": ["Jan", "Fev"]}"#,
        )?;
        s.finish()?;
        assert_eq!(s.months.iter().position(|m| m == "Sep"), Some(8));
        Ok(())
    }

    #[test]
    fn missing_data_path_is_rejected() {
        let mut s = Settings::default();
        assert!(matches!(s.finish(), Err(IngestError::Config(_))));
    }
}
