//! Guarded write-back into a CSV sheet of record.

#![allow(clippy::unwrap_used)]

use std::path::Path;

use rescue_core::config::SourceSettings;
use rescue_core::{
    CsvRecordSheet, Database, LedgerStatus, Phase, ProgressLedger, ReconcileError,
    ReconciliationRecord, ReconciliationWriter, ServiceIdentity,
};

const SHEET: &str = "Row,Claimed,Office,Agency,Title,Notes,URL,H,I,J,K,Download Location,Status\n\
                     1,,Office,CDC,Vaccines,,https://data.cdc.gov/d/aaaa,,,,,,\n\
                     2,,Office,CDC,Births,,https://data.cdc.gov/d/bbbb,,,,,,\n";

fn record(row: usize, id: &str) -> ReconciliationRecord {
    ReconciliationRecord {
        source_row: row,
        source_url: format!("https://data.cdc.gov/d/{id}"),
        status: "Done".to_string(),
        published_url: format!("https://archive.test/project/{id}"),
    }
}

async fn writer(path: &Path) -> (ReconciliationWriter, ProgressLedger) {
    let sheet = CsvRecordSheet::open(path, &SourceSettings::default(), Some("Status")).unwrap();
    let db = Database::new_in_memory().await.unwrap();
    let ledger = ProgressLedger::new(db, Phase::Reconcile, "sheet.csv");
    (
        ReconciliationWriter::new(Box::new(sheet), "bot@project.iam.example").with_ledger(ledger.clone()),
        ledger,
    )
}

#[tokio::test]
async fn test_update_claims_row_and_sets_status() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("sheet.csv");
    std::fs::write(&path, SHEET).unwrap();
    let (mut writer, ledger) = writer(&path).await;

    writer.update(&record(1, "bbbb")).await.unwrap();

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(&rows[0][1], "");
    assert_eq!(&rows[1][1], "bot@project.iam.example");
    assert_eq!(&rows[1][11], "https://archive.test/project/bbbb");
    assert_eq!(&rows[1][12], "Done");

    let entry = ledger.latest(1).await.unwrap().unwrap();
    assert_eq!(entry.status().unwrap(), LedgerStatus::Ok);
    assert_eq!(entry.stage, "reconciled");
}

#[tokio::test]
async fn test_concurrent_claim_leaves_sheet_untouched() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("sheet.csv");
    std::fs::write(&path, SHEET).unwrap();
    let (mut writer, ledger) = writer(&path).await;

    // Someone else claims row 0 after the sheet was loaded.
    let edited = SHEET.replacen(
        "1,,Office,CDC,Vaccines",
        "1,alice,Office,CDC,Vaccines",
        1,
    );
    std::fs::write(&path, &edited).unwrap();

    let error = writer.update(&record(0, "aaaa")).await.unwrap_err();
    assert!(matches!(error, ReconcileError::Conflict { row: 0, .. }));
    assert_eq!(std::fs::read(&path).unwrap(), edited.as_bytes());

    let entry = ledger.latest(0).await.unwrap().unwrap();
    assert_eq!(entry.status().unwrap(), LedgerStatus::Failed);
    assert!(entry.note.unwrap().contains("conflicts"));
}

#[tokio::test]
async fn test_reordered_sheet_is_refused() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("sheet.csv");
    std::fs::write(&path, SHEET).unwrap();
    let (mut writer, _ledger) = writer(&path).await;

    let mut lines: Vec<&str> = SHEET.lines().collect();
    lines.swap(1, 2);
    let reordered = format!("{}\n", lines.join("\n"));
    std::fs::write(&path, &reordered).unwrap();

    let error = writer.update(&record(0, "aaaa")).await.unwrap_err();
    assert!(error.to_string().contains("instead of"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), reordered);
}

#[test]
fn test_service_identity_needs_client_email() {
    let temp = tempfile::tempdir().unwrap();
    let good = temp.path().join("good.json");
    std::fs::write(
        &good,
        r#"{"type":"service_account","client_email":"bot@project.iam.example"}"#,
    )
    .unwrap();
    assert_eq!(
        ServiceIdentity::load(&good).unwrap().client_email,
        "bot@project.iam.example"
    );

    let blank = temp.path().join("blank.json");
    std::fs::write(&blank, r#"{"client_email":"  "}"#).unwrap();
    assert!(matches!(
        ServiceIdentity::load(&blank),
        Err(ReconcileError::Credentials { .. })
    ));
    assert!(ServiceIdentity::load(&temp.path().join("missing.json")).is_err());
}
