use anyhow::Result;
use mdd_ingest::{
    ingest_workbook,
    load::{Cell, Grid, Sheet, Workbook},
    store::{EntryKind, Store},
    IngestError, IngestReport, Settings,
};
use tempfile::NamedTempFile;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn init_test_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,mdd_ingest=debug")),
        )
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn settings() -> Result<Settings> {
    let mut s = Settings::from_json_str(r#"{"DATA_FILE_PATH": "stats.xlsx", "year": 2023}"#)?;
    s.finish()?;
    Ok(s)
}

fn grid(rows: &[&[&str]]) -> Grid {
    rows.iter()
        .map(|r| r.iter().map(|s| Cell::from(*s)).collect())
        .collect()
}

const HEADER: &[&str] = &[
    "N°", "Mode", "Durée", "Sexe", "Age", "Sit° Fam", "Enfants", "Dem.1", "Dem.2", "Dem.3",
    "Sol.1", "Sol.2", "Sol.3", "Tot.Dem.", "Domicile",
];

/// A month sheet with the record rows given, followed by a small legend.
fn month_sheet(records: &[&[&str]]) -> Grid {
    let mut rows: Vec<&[&str]> = Vec::new();
    rows.push(&["Maison du Droit - statistiques"]);
    rows.push(HEADER);
    rows.extend_from_slice(records);
    rows.push(HEADER);
    rows.push(&["", "Légende"]);
    rows.push(&[
        "", "1. RDV", "", "1. Homme", "", "", "", "12. Logement", "", "", "1. Information", "", "",
        "", "",
    ]);
    rows.push(&[
        "", "2. Sans RDV", "", "2. Femme", "", "", "", "13. Travail", "", "", "2. Orientation",
        "", "", "", "",
    ]);
    grid(&rows)
}

fn sheet(name: &str, month: u32, grid: Grid) -> Sheet {
    Sheet {
        name: name.into(),
        month,
        grid,
    }
}

fn db() -> Result<(NamedTempFile, Store)> {
    let file = NamedTempFile::new()?;
    let store = Store::open(file.path())?;
    Ok((file, store))
}

#[test]
fn blank_filler_rows_never_reach_the_store() -> Result<()> {
    init_test_logging();
    let s = settings()?;
    let (_file, mut store) = db()?;
    let wb = Workbook {
        sheets: vec![sheet(
            "Jan",
            1,
            month_sheet(&[&["", "", "", "", "", "", "", "", "", "", "", "", "", "", "Vannes"]]),
        )],
    };

    let report = ingest_workbook(&wb, &mut store, &s);

    assert_eq!(report.discarded, 1);
    assert_eq!(report.inserted, 0);
    assert_eq!(store.count_cases()?, 0);
    Ok(())
}

#[test]
fn records_land_with_codes_date_and_entries() -> Result<()> {
    init_test_logging();
    let s = settings()?;
    let (_file, mut store) = db()?;
    let wb = Workbook {
        sheets: vec![sheet(
            "Mar",
            3,
            month_sheet(&[
                &[
                    "1", "RDV", "2", "Femme", "-18 ans", "Divorcé", "", "12", "13", "", "Information",
                    "", "", "2", "Vannes",
                ],
                &[
                    "2", "Sans RDV", "", "Homme", "", "", "3", "13", "", "", "", "", "", "1",
                    "Auray",
                ],
            ]),
        )],
    };

    let report = ingest_workbook(&wb, &mut store, &s);
    assert_eq!(
        report,
        IngestReport {
            sheets_ingested: 1,
            inserted: 2,
            ..IngestReport::default()
        }
    );

    let rows: Vec<(i64, String, Option<i64>, Option<i64>, Option<String>, i64, Option<String>)> = {
        let conn = store.connection();
        let mut stmt = conn.prepare(
            "SELECT num, date_ent, mode, age, sit_fam, enfant, commune FROM entretien ORDER BY num",
        )?;
        let mapped = stmt.query_map([], |r| {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?, r.get(6)?))
        })?;
        let out = mapped.collect::<Result<Vec<_>, _>>()?;
        out
    };
    assert_eq!(rows.len(), 2);
    let (first, date, mode, age, sit_fam, enfant, commune) = rows[0].clone();
    assert_eq!(date, "2023-03-01");
    assert_eq!(mode, Some(1));
    assert_eq!(age, Some(1));
    assert_eq!(sit_fam.as_deref(), Some("5b"));
    assert_eq!(enfant, 0);
    assert_eq!(commune.as_deref(), Some("Vannes"));
    assert_eq!(rows[1].2, Some(2));
    assert_eq!(rows[1].5, 3);

    assert_eq!(
        store.entries(EntryKind::Demande, first)?,
        vec![(1, "Logement".to_string()), (2, "Travail".to_string())]
    );
    assert_eq!(
        store.entries(EntryKind::Solution, first)?,
        vec![(1, "Information".to_string())]
    );
    Ok(())
}

#[test]
fn rerunning_appends_instead_of_deduplicating() -> Result<()> {
    // Re-running over the same workbook is expected to append duplicates;
    // callers treat a re-run as "append".
    init_test_logging();
    let s = settings()?;
    let (_file, mut store) = db()?;
    let wb = Workbook {
        sheets: vec![sheet(
            "Fev",
            2,
            month_sheet(&[
                &["1", "RDV", "", "Femme", "", "", "", "12", "", "", "", "", "", "", "Vannes"],
                &["2", "RDV", "", "Homme", "", "", "", "", "", "", "", "", "", "", "Séné"],
            ]),
        )],
    };

    ingest_workbook(&wb, &mut store, &s);
    let once = store.count_cases()?;
    let once_demandes = store.count_entries(EntryKind::Demande)?;
    ingest_workbook(&wb, &mut store, &s);

    assert_eq!(once, 2);
    assert_eq!(store.count_cases()?, 2 * once);
    assert_eq!(store.count_entries(EntryKind::Demande)?, 2 * once_demandes);
    Ok(())
}

#[test]
fn malformed_sheet_is_skipped_and_run_continues() -> Result<()> {
    init_test_logging();
    let s = settings()?;
    let (_file, mut store) = db()?;
    let wb = Workbook {
        sheets: vec![
            sheet("Jan", 1, grid(&[&["Totaux", "12"], &["", "3"]])),
            sheet(
                "Fev",
                2,
                month_sheet(&[&["1", "RDV", "", "Femme", "", "", "", "", "", "", "", "", "", "", "Theix"]]),
            ),
        ],
    };

    let report = ingest_workbook(&wb, &mut store, &s);
    assert_eq!(report.sheets_skipped, 1);
    assert_eq!(report.sheets_ingested, 1);
    assert_eq!(store.count_cases()?, 1);
    Ok(())
}

#[test]
fn single_marker_sheet_is_ingested_to_the_end() -> Result<()> {
    init_test_logging();
    let s = settings()?;
    let (_file, mut store) = db()?;
    let wb = Workbook {
        sheets: vec![sheet(
            "Déc",
            12,
            grid(&[
                HEADER,
                &["1", "RDV", "", "Femme", "", "", "", "", "", "", "", "", "", "", "Vannes"],
                &["2", "Sans RDV", "", "Homme", "", "", "", "", "", "", "", "", "", "", "Auray"],
                &["3", "RDV", "", "Couple", "", "", "", "", "", "", "", "", "", "", "Theix"],
            ]),
        )],
    };

    let report = ingest_workbook(&wb, &mut store, &s);
    assert_eq!(report.sheets_skipped, 0);
    assert_eq!(store.count_cases()?, 3);
    Ok(())
}

#[test]
fn invalid_value_stops_only_its_record() -> Result<()> {
    init_test_logging();
    let mut s = Settings::from_json_str(
        r#"{"DATA_FILE_PATH": "stats.xlsx", "value_codes": {"DUREE": {"Longue": "L"}}}"#,
    )?;
    s.finish()?;
    let (_file, mut store) = db()?;
    let wb = Workbook {
        sheets: vec![sheet(
            "Avr",
            4,
            month_sheet(&[
                &["1", "RDV", "Longue", "Femme", "", "", "", "12", "", "", "", "", "", "", "Vannes"],
                &["2", "RDV", "3", "Homme", "", "", "", "", "", "", "", "", "", "", "Auray"],
            ]),
        )],
    };

    let report = ingest_workbook(&wb, &mut store, &s);
    assert_eq!(report.invalid, 1);
    assert_eq!(report.inserted, 1);
    assert_eq!(store.count_cases()?, 1);
    assert_eq!(store.count_entries(EntryKind::Demande)?, 0);
    Ok(())
}

#[test]
fn rejected_insert_rolls_back_and_run_continues() -> Result<()> {
    init_test_logging();
    let s = settings()?;
    let (_file, mut store) = db()?;
    store.connection().execute_batch(
        "CREATE TRIGGER no_lorient BEFORE INSERT ON entretien WHEN NEW.commune = 'Lorient'
         BEGIN SELECT RAISE(ABORT, 'commune refused'); END;",
    )?;
    let wb = Workbook {
        sheets: vec![sheet(
            "Mai",
            5,
            month_sheet(&[
                &["1", "RDV", "", "Femme", "", "", "", "12", "", "", "", "", "", "", "Lorient"],
                &["2", "RDV", "", "Homme", "", "", "", "13", "", "", "", "", "", "", "Vannes"],
            ]),
        )],
    };

    let report = ingest_workbook(&wb, &mut store, &s);
    assert_eq!(report.failed, 1);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.sheets_ingested, 1);
    assert_eq!(store.count_cases()?, 1);

    let commune: String =
        store
            .connection()
            .query_row("SELECT commune FROM entretien", [], |r| r.get(0))?;
    assert_eq!(commune, "Vannes");
    let (num, nature): (i64, String) = store.connection().query_row(
        "SELECT num, nature FROM demande",
        [],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    assert_eq!(nature, "Travail");
    assert_eq!(store.count_entries(EntryKind::Demande)?, 1);
    assert_eq!(store.entries(EntryKind::Demande, num)?.len(), 1);
    Ok(())
}

#[test]
fn unreadable_workbook_aborts_the_run() -> Result<()> {
    init_test_logging();
    let dir = tempfile::tempdir()?;
    let mut s = settings()?;
    s.data_file_path = dir.path().join("missing.xlsx");
    s.database_path = dir.path().join("database.db");

    let err = mdd_ingest::run(&s).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<IngestError>(),
        Some(IngestError::SourceNotFound { .. })
    ));
    Ok(())
}
