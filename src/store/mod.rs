// src/store/mod.rs

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Transaction};
use std::path::Path;
use tracing::{debug, warn};

use crate::process::utils::split_entries;

const SCHEMA: &str = include_str!("schema.sql");

/// At most this many demand (and solution) entries per interview.
pub const MAX_ENTRIES: usize = 3;

/// One normalized interview, ready for the `entretien` table.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseRecord {
    /// First day of the sheet's month.
    pub date: NaiveDate,
    pub mode: Option<i64>,
    pub duree: Option<i64>,
    pub sexe: Option<i64>,
    pub age: Option<i64>,
    pub vient_pr: Option<i64>,
    pub sit_fam: Option<String>,
    pub enfant: i64,
    pub modele_fam: Option<i64>,
    pub profession: Option<i64>,
    pub ress: Option<i64>,
    pub origine: Option<i64>,
    pub commune: Option<String>,
    pub partenaire: Option<String>,
    /// Comma-separated demand natures, one `demande` row each.
    pub demande_txt: String,
    /// Comma-separated solution natures, one `solution` row each.
    pub solution_txt: String,
}

impl CaseRecord {
    pub fn new(date: NaiveDate) -> Self {
        CaseRecord {
            date,
            mode: None,
            duree: None,
            sexe: None,
            age: None,
            vient_pr: None,
            sit_fam: None,
            enfant: 0,
            modele_fam: None,
            profession: None,
            ress: None,
            origine: None,
            commune: None,
            partenaire: None,
            demande_txt: String::new(),
            solution_txt: String::new(),
        }
    }
}

/// Child tables holding the free-text annotations of an interview.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Demande,
    Solution,
}

impl EntryKind {
    pub fn table(&self) -> &'static str {
        match self {
            EntryKind::Demande => "demande",
            EntryKind::Solution => "solution",
        }
    }
}

/// The destination database. Every insert appends; nothing is deduplicated,
/// so running the same workbook twice doubles the rows.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the SQLite file at `path` and make sure the schema exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("opening database {:?}", path))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA).context("creating schema")?;
        Ok(Store { conn })
    }

    /// Insert `record` and its demand/solution entries in one transaction;
    /// nothing is kept if any statement fails. Returns the new `num`.
    pub fn insert_case(&mut self, record: &CaseRecord) -> rusqlite::Result<i64> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO entretien (date_ent, mode, duree, sexe, age, vient_pr, sit_fam, enfant,
                modele_fam, profession, ress, origine, commune, partenaire)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                record.date.format("%Y-%m-%d").to_string(),
                record.mode,
                record.duree,
                record.sexe,
                record.age,
                record.vient_pr,
                record.sit_fam,
                record.enfant,
                record.modele_fam,
                record.profession,
                record.ress,
                record.origine,
                record.commune,
                record.partenaire,
            ],
        )?;
        let num = tx.last_insert_rowid();

        insert_entries(&tx, EntryKind::Demande, num, &record.demande_txt)?;
        insert_entries(&tx, EntryKind::Solution, num, &record.solution_txt)?;
        tx.commit()?;
        debug!(num, "interview inserted");
        Ok(num)
    }

    pub fn count_cases(&self) -> rusqlite::Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM entretien", [], |r| r.get(0))
    }

    pub fn count_entries(&self, kind: EntryKind) -> rusqlite::Result<i64> {
        self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", kind.table()),
            [],
            |r| r.get(0),
        )
    }

    /// `(pos, nature)` of an interview's entries, by position.
    pub fn entries(&self, kind: EntryKind, num: i64) -> rusqlite::Result<Vec<(i64, String)>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT pos, nature FROM {} WHERE num = ?1 ORDER BY pos",
            kind.table()
        ))?;
        let rows = stmt.query_map([num], |r| Ok((r.get(0)?, r.get(1)?)))?;
        rows.collect()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn insert_entries(tx: &Transaction<'_>, kind: EntryKind, num: i64, text: &str) -> rusqlite::Result<()> {
    let mut entries = split_entries(text);
    if entries.len() > MAX_ENTRIES {
        warn!(
            num,
            table = kind.table(),
            dropped = ?&entries[MAX_ENTRIES..],
            "more than {} entries, extras dropped",
            MAX_ENTRIES
        );
        entries.truncate(MAX_ENTRIES);
    }
    let sql = format!(
        "INSERT INTO {} (num, pos, nature) VALUES (?1, ?2, ?3)",
        kind.table()
    );
    for (i, nature) in entries.iter().enumerate() {
        tx.execute(&sql, params![num, i as i64 + 1, nature])?;
    }
    Ok(())
}
