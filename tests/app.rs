use std::fs;
use std::path::Path;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use gide_search::app::{self, App};
use gide_search::config::ResolvedConfig;
use gide_search::domain::{RecordId, Source, UnifiedRecord};
use gide_search::error::GideError;
use gide_search::index::{BulkSummary, SearchIndex};
use gide_search::output::{JsonOutput, write_json_atomic};
use gide_search::record::RecordBuilder;
use gide_search::transform::IdrTransformer;

#[derive(Default)]
struct MockIndex {
    down: bool,
    failing: usize,
    upserted: Mutex<Vec<String>>,
}

impl SearchIndex for MockIndex {
    fn health(&self) -> Result<(), GideError> {
        if self.down {
            return Err(GideError::IndexUnavailable("connection refused".to_string()));
        }
        Ok(())
    }

    fn bulk_upsert(&self, records: &[UnifiedRecord]) -> Result<BulkSummary, GideError> {
        let mut guard = self.upserted.lock().unwrap();
        guard.extend(records.iter().map(|record| record.id.to_string()));
        Ok(BulkSummary {
            indexed: records.len() - self.failing,
            errors: self.failing,
        })
    }

    fn count(&self) -> Result<u64, GideError> {
        Ok(self.upserted.lock().unwrap().len() as u64)
    }
}

fn fixtures() -> &'static Path {
    Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures"))
}

fn temp_root(temp: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap()
}

fn app_in(root: &Utf8PathBuf) -> App {
    App::new(ResolvedConfig {
        output_dir: root.join("output"),
        ..ResolvedConfig::default()
    })
}

fn records() -> Vec<UnifiedRecord> {
    vec![
        RecordBuilder::new(Source::Idr, "idr0001").build(),
        RecordBuilder::new(Source::Bia, "S-BIAD1").build(),
    ]
}

#[test]
fn transform_writes_records_to_default_output() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp_root(&temp);
    let app = app_in(&root);

    let mut transformer = IdrTransformer::new(fixtures());
    let output = app.default_output("idr");
    let summary = app.transform(&mut transformer, &output, &JsonOutput).unwrap();

    assert_eq!(summary.source, "idr");
    assert_eq!(summary.written, 1);
    assert!(summary.failed.is_empty());
    assert_eq!(output, root.join("output").join("idr.json"));

    let written = app::load_records(&output).unwrap();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].id.as_str(), "idr:idr0001");
}

#[test]
fn transform_missing_input_is_fatal_and_writes_nothing() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp_root(&temp);
    let app = app_in(&root);

    let mut transformer = IdrTransformer::new(temp.path().join("absent"));
    let output = app.default_output("idr");
    let err = app
        .transform(&mut transformer, &output, &JsonOutput)
        .unwrap_err();

    assert_matches!(err, GideError::InputNotFound(_));
    assert!(!output.exists());
}

#[test]
fn index_reports_bulk_and_total_counts() {
    let app = App::new(ResolvedConfig::default());
    let index = MockIndex {
        failing: 1,
        ..MockIndex::default()
    };

    let report = app.index(&records(), &index, &JsonOutput).unwrap();

    assert_eq!(report.indexed, 1);
    assert_eq!(report.errors, 1);
    assert_eq!(report.total, 2);
    assert_eq!(
        *index.upserted.lock().unwrap(),
        vec!["idr:idr0001".to_string(), "bia:S-BIAD1".to_string()]
    );
}

#[test]
fn unreachable_index_aborts_before_upsert() {
    let app = App::new(ResolvedConfig::default());
    let index = MockIndex {
        down: true,
        ..MockIndex::default()
    };

    let err = app.index(&records(), &index, &JsonOutput).unwrap_err();

    assert_matches!(err, GideError::IndexUnavailable(_));
    assert!(index.upserted.lock().unwrap().is_empty());
}

#[test]
fn load_records_reads_every_json_file_in_directory() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp_root(&temp);
    let [idr, bia]: [UnifiedRecord; 2] = records().try_into().unwrap();
    write_json_atomic(&root.join("b.json"), &vec![bia]).unwrap();
    write_json_atomic(&root.join("a.json"), &vec![idr]).unwrap();
    fs::write(root.join("notes.txt"), "ignored").unwrap();

    let loaded = app::load_records(&root).unwrap();
    let ids: Vec<&str> = loaded.iter().map(|record| record.id.as_str()).collect();
    assert_eq!(ids, vec!["idr:idr0001", "bia:S-BIAD1"]);
}

#[test]
fn load_records_rejects_non_record_json() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp_root(&temp);
    fs::write(root.join("broken.json"), r#"{"not": "a list"}"#).unwrap();

    let err = app::load_records(&root).unwrap_err();
    assert_matches!(err, GideError::InvalidJson(_));
}

#[test]
fn export_crate_writes_selected_record() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp_root(&temp);
    let app = app_in(&root);
    let output = root.join("crates").join("ro-crate-metadata.json");
    let id: RecordId = "bia:S-BIAD1".parse().unwrap();

    let result = app.export_crate(&records(), &id, &output).unwrap();

    assert_eq!(result.id, "bia:S-BIAD1");
    let document: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    let root_node = document["@graph"]
        .as_array()
        .unwrap()
        .iter()
        .find(|node| node["@id"] == "./")
        .unwrap();
    assert_eq!(root_node["accessionId"], "S-BIAD1");
}

#[test]
fn export_crate_unknown_id_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp_root(&temp);
    let app = app_in(&root);
    let output = root.join("missing.json");
    let id: RecordId = "ssbd:ssbd-dataset-9".parse().unwrap();

    let err = app.export_crate(&records(), &id, &output).unwrap_err();

    assert_matches!(err, GideError::InvalidRecordId(_));
    assert!(!output.exists());
}
