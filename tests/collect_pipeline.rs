//! Collection pipeline against a scripted browser.

#![allow(clippy::unwrap_used)]

mod support;

use std::path::Path;

use rescue_core::collect::{CollectionPipeline, INTERMEDIATE_COLUMNS, IntermediateWriter};
use rescue_core::config::{CollectSettings, SourceSettings};
use rescue_core::{Database, LedgerStatus, Phase, ProgressLedger, RowSelector, SourceTable, WorkItem};
use support::FakeBrowser;

const HEADER: &str = "Row,Claimed,Office,Agency,Title of Site,Notes,URL,H,I,J,K,Download Location";

fn fast_settings() -> CollectSettings {
    CollectSettings {
        probe: false,
        navigation_timeout_ms: 1_000,
        settle_ms: 1,
        render_timeout_ms: 1_000,
        export_timeout_ms: 150,
        poll_interval_ms: 5,
        expand_selector: ".more".to_string(),
        title_selectors: vec!["h1".to_string()],
        summary_selectors: vec![".summary".to_string()],
        keyword_selectors: vec![".tag".to_string()],
        export_selectors: vec!["#export".to_string()],
        expected_exports: 1,
        ..CollectSettings::default()
    }
}

fn url(id: &str) -> String {
    format!("https://data.cdc.gov/d/{id}")
}

/// Three eligible rows at source indices 0, 2 and 3; row 1 is already claimed.
fn work_items() -> Vec<WorkItem> {
    let lines = [
        HEADER.to_string(),
        format!("1,,Office A,CDC,Vaccines,,{},,,,,", url("aaaa")),
        format!("2,alice,Office B,CDC,Claimed,,{},,,,,", url("bbbb")),
        format!("3,,Office C,CDC,Births,,{},,,,,", url("cccc")),
        format!("4,,Office D,CDC,Deaths,,{},,,,,", url("dddd")),
    ];
    let table = SourceTable::from_reader(lines.join("\n").as_bytes()).unwrap();
    let layout = SourceSettings::default();
    RowSelector::new(&layout).select(&table, 0, None).unwrap()
}

fn browser() -> FakeBrowser {
    let mut browser = FakeBrowser::with_present(&["#export"]);
    browser.export_selector = "#export".to_string();
    for (id, title) in [("aaaa", "Vaccines"), ("cccc", "Births"), ("dddd", "Deaths")] {
        let page = url(id);
        browser.set_texts(&page, "h1", &[title]);
        browser.set_texts(&page, ".summary", &[&format!("About {title}")]);
        browser.set_texts(&page, ".tag", &["health", "health", "cdc"]);
        browser.set_exports(&page, &[&format!("{id}.csv")]);
    }
    browser
}

async fn ledger() -> ProgressLedger {
    let db = Database::new_in_memory().await.unwrap();
    ProgressLedger::new(db, Phase::Collect, "sites.csv")
}

fn read_output(path: &Path) -> Vec<csv::StringRecord> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
    assert_eq!(headers, INTERMEDIATE_COLUMNS);
    reader.records().map(Result::unwrap).collect()
}

fn column(name: &str) -> usize {
    INTERMEDIATE_COLUMNS.iter().position(|c| *c == name).unwrap()
}

#[tokio::test]
async fn test_collects_every_selected_row() {
    let temp = tempfile::tempdir().unwrap();
    let settings = fast_settings();
    let ledger = ledger().await;
    let output_path = temp.path().join("out.csv");
    let output = IntermediateWriter::open(&output_path).unwrap();
    let items = work_items();
    assert_eq!(items.iter().map(|i| i.index).collect::<Vec<_>>(), vec![0, 2, 3]);

    let mut pipeline =
        CollectionPipeline::new(&settings, temp.path().join("collected"), &ledger, output).unwrap();
    let mut browser = browser();
    let summary = pipeline.run(&mut browser, &items).await.unwrap();

    assert_eq!(summary.ok, 3);
    assert_eq!(summary.total(), 3);

    let rows = read_output(&output_path);
    assert_eq!(rows.len(), 3);
    let first = &rows[0];
    assert_eq!(&first[column("source_row")], "0");
    assert_eq!(&first[column("4_title")], "Vaccines");
    assert_eq!(&first[column("6_summary_description")], "About Vaccines");
    assert_eq!(&first[column("8_keywords")], "health, cdc");
    assert_eq!(&first[column("files")], "aaaa.csv");
    assert_eq!(&first[column("status")], "ok");
    assert_eq!(&first[column("stage")], "done");

    let dir = temp.path().join("collected").join("row-00000");
    assert!(dir.join("Vaccines.pdf").is_file());
    assert!(dir.join("aaaa.csv").is_file());

    let entry = ledger.latest(0).await.unwrap().unwrap();
    assert_eq!(entry.status().unwrap(), LedgerStatus::Ok);
    assert_eq!(entry.stage, "done");
    assert_eq!(entry.artifacts().len(), 2);
}

#[tokio::test]
async fn test_missing_title_is_partial_with_files() {
    let temp = tempfile::tempdir().unwrap();
    let settings = fast_settings();
    let ledger = ledger().await;
    let output_path = temp.path().join("out.csv");
    let output = IntermediateWriter::open(&output_path).unwrap();
    let items = work_items();

    let mut browser = browser();
    browser.set_texts(&url("aaaa"), "h1", &["   "]);

    let mut pipeline =
        CollectionPipeline::new(&settings, temp.path().join("collected"), &ledger, output).unwrap();
    let summary = pipeline.run(&mut browser, &items[..1]).await.unwrap();
    assert_eq!(summary.partial, 1);

    let rows = read_output(&output_path);
    assert_eq!(&rows[0][column("status")], "partial");
    assert_eq!(&rows[0][column("stage")], "done");
    assert_eq!(&rows[0][column("files")], "aaaa.csv");
    assert!(rows[0][column("error")].contains("title"));
    assert!(
        temp.path()
            .join("collected/row-00000/snapshot.pdf")
            .is_file()
    );
    assert!(!ledger.has_succeeded(0).await.unwrap());
}

#[tokio::test]
async fn test_export_timeout_fails_row_and_continues() {
    let temp = tempfile::tempdir().unwrap();
    let settings = fast_settings();
    let ledger = ledger().await;
    let output_path = temp.path().join("out.csv");
    let output = IntermediateWriter::open(&output_path).unwrap();
    let items = work_items();

    let mut browser = browser();
    browser.exports.remove(&url("cccc"));

    let mut pipeline =
        CollectionPipeline::new(&settings, temp.path().join("collected"), &ledger, output).unwrap();
    let summary = pipeline.run(&mut browser, &items).await.unwrap();
    assert_eq!((summary.ok, summary.failed), (2, 1));

    let rows = read_output(&output_path);
    assert_eq!(&rows[1][column("source_row")], "2");
    assert_eq!(&rows[1][column("status")], "failed");
    assert_eq!(&rows[1][column("stage")], "dataset_exported");
    assert!(rows[1][column("error")].contains("export did not finish"));
    assert_eq!(&rows[2][column("status")], "ok");

    let failed = ledger.latest(2).await.unwrap().unwrap();
    assert_eq!(failed.stage, "dataset_exported");
    assert!(ledger.has_succeeded(3).await.unwrap());
}

#[tokio::test]
async fn test_navigation_failure_fails_at_metadata() {
    let temp = tempfile::tempdir().unwrap();
    let settings = fast_settings();
    let ledger = ledger().await;
    let output = IntermediateWriter::open(&temp.path().join("out.csv")).unwrap();
    let items = work_items();

    let mut browser = browser();
    browser.failing_urls.insert(url("aaaa"));

    let pipeline =
        CollectionPipeline::new(&settings, temp.path().join("collected"), &ledger, output).unwrap();
    let result = pipeline.collect_row(&mut browser, &items[0]).await;

    assert_eq!(result.status, LedgerStatus::Failed);
    assert_eq!(result.stage.as_str(), "metadata_fetched");
    assert!(result.error.unwrap().contains("ERR_NAME_NOT_RESOLVED"));
    assert!(result.snapshot.is_none());
}

#[tokio::test]
async fn test_rerun_gets_fresh_directory() {
    let temp = tempfile::tempdir().unwrap();
    let settings = fast_settings();
    let ledger = ledger().await;
    let output_path = temp.path().join("out.csv");
    let items = work_items();
    let mut browser = browser();

    for _ in 0..2 {
        let output = IntermediateWriter::open(&output_path).unwrap();
        let mut pipeline =
            CollectionPipeline::new(&settings, temp.path().join("collected"), &ledger, output)
                .unwrap();
        pipeline.run(&mut browser, &items[..1]).await.unwrap();
    }

    let root = temp.path().join("collected");
    assert!(root.join("row-00000/aaaa.csv").is_file());
    assert!(root.join("row-00000-2/aaaa.csv").is_file());
    assert_eq!(read_output(&output_path).len(), 2);
    assert_eq!(ledger.history(0).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_skip_succeeded_leaves_browser_idle() {
    let temp = tempfile::tempdir().unwrap();
    let settings = fast_settings();
    let ledger = ledger().await;
    let output_path = temp.path().join("out.csv");
    let items = work_items();

    let mut first = browser();
    let output = IntermediateWriter::open(&output_path).unwrap();
    CollectionPipeline::new(&settings, temp.path().join("collected"), &ledger, output)
        .unwrap()
        .run(&mut first, &items[..1])
        .await
        .unwrap();

    let mut second = browser();
    let output = IntermediateWriter::open(&output_path).unwrap();
    let summary = CollectionPipeline::new(&settings, temp.path().join("collected"), &ledger, output)
        .unwrap()
        .skip_succeeded(true)
        .run(&mut second, &items[..1])
        .await
        .unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(second.mutations(), 0);
    assert_eq!(read_output(&output_path).len(), 1);

    let history = ledger.history(0).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].status().unwrap(), LedgerStatus::Skipped);
    // A skip never shadows the success it skipped over.
    assert!(ledger.has_succeeded(0).await.unwrap());
}

mod probe {
    use super::*;
    use rescue_core::collect::Probe;
    use rescue_core::source::SourceRow;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn item(url: String) -> WorkItem {
        WorkItem {
            index: 7,
            source_url: url.clone(),
            title: "Probe".to_string(),
            office: String::new(),
            agency: String::new(),
            row: SourceRow::new(7, vec![url]),
        }
    }

    #[tokio::test]
    async fn test_probe_accepts_only_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/live"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let probe = Probe::new(Duration::from_secs(5)).unwrap();
        probe.check(&format!("{}/live", server.uri())).await.unwrap();
        let error = probe
            .check(&format!("{}/gone", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "source unreachable: HTTP 404");
    }

    #[tokio::test]
    async fn test_unreachable_source_fails_at_start_without_browser() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let temp = tempfile::tempdir().unwrap();
        let settings = CollectSettings {
            probe: true,
            probe_timeout_ms: 5_000,
            ..fast_settings()
        };
        let ledger = ledger().await;
        let output = IntermediateWriter::open(&temp.path().join("out.csv")).unwrap();
        let pipeline =
            CollectionPipeline::new(&settings, temp.path().join("collected"), &ledger, output)
                .unwrap();

        let mut browser = browser();
        let result = pipeline
            .collect_row(&mut browser, &item(format!("{}/d/x", server.uri())))
            .await;

        assert_eq!(result.status, LedgerStatus::Failed);
        assert_eq!(result.stage.as_str(), "start");
        assert!(result.error.unwrap().contains("HTTP 503"));
        assert!(result.artifact_dir.is_none());
        assert_eq!(browser.mutations(), 0);
    }
}
