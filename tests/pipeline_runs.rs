// Extraction through persisted reports, on temporary files.

use recondiff::pipeline::{run, RunResult};
use recondiff::progress::ProgressManager;
use recondiff::report::{cleanup_spill, Report};
use recondiff::{CancelFlag, Config, KeyOrigin, ReconError};
use std::fs;
use std::path::Path;

const HR: &str = "\
CREATE TABLE users (
  id INT,
  name VARCHAR(50),
  employee_id INT,
  PRIMARY KEY (id)
);
INSERT INTO users (id, name, employee_id) VALUES (1, 'Alice', 10), (2, 'Bob', 11), (3, 'Cy', 12);
INSERT INTO legacy (id) VALUES (1);
";

const PAYROLL: &str = "\
INSERT INTO users (id, name, employee_id) VALUES
  (1, 'Alice', 99),
  (2, 'Bobby', 11),
  (4, 'Dee', 13);
";

fn config(dir: &Path) -> Config {
    Config {
        source_schema: "hr".into(),
        destination_schema: "payroll".into(),
        inputs: vec![dir.join("in")],
        output_dir: dir.join("out"),
        ..Config::default()
    }
}

fn write_inputs(dir: &Path) {
    fs::create_dir_all(dir.join("in")).unwrap();
    fs::write(dir.join("in/hr.sql"), HR).unwrap();
    fs::write(dir.join("in/payroll.txt"), PAYROLL).unwrap();
}

#[test]
fn run_writes_reports_and_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let cfg = config(dir.path());

    let artifacts = run(&cfg, &ProgressManager::disabled(), &CancelFlag::new()).unwrap();
    let report = &artifacts.report;
    let users = &report.tables["users"];
    assert_eq!(users.summary.counts(), (1, 1, 1, 1));
    assert_eq!(users.key.as_ref().unwrap().origin, KeyOrigin::Declared);
    // employee_id is ignored when comparing rows.
    let details = users.load_details().unwrap();
    assert_eq!(details.different.len(), 1);
    assert!(details.different[0].differences.contains_key("name"));
    assert!(report.schema_only_tables.source_only.contains("legacy"));

    let html = artifacts.paths.html.as_ref().unwrap();
    assert!(fs::read_to_string(html).unwrap().contains("Bobby"));
    let loaded = Report::load(artifacts.paths.json.as_ref().unwrap()).unwrap();
    assert_eq!(loaded.meta, report.meta);
    assert_eq!(loaded.tables["users"].summary.counts(), (1, 1, 1, 1));
    assert_eq!(loaded.tables["users"].load_details().unwrap(), details);

    let result = RunResult::from_outcome(&Ok(artifacts));
    assert!(result.success);
    assert!(result.json_report.unwrap().starts_with(dir.path().join("out")));
}

#[test]
fn large_tables_spill_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let cfg = Config {
        save_large_tables_to_disk: true,
        large_table_threshold: 2,
        write_html: false,
        ..config(dir.path())
    };

    let artifacts = run(&cfg, &ProgressManager::disabled(), &CancelFlag::new()).unwrap();
    let users = &artifacts.report.tables["users"];
    assert!(users.details.is_none());
    let spilled = users.details_path.as_ref().unwrap();
    assert!(spilled.exists());
    assert_eq!(users.load_details().unwrap().missing.len(), 1);
    assert!(artifacts.paths.html.is_none());

    cleanup_spill(&cfg.output_dir, Some(&artifacts.report.meta.report_id)).unwrap();
    assert!(!spilled.exists());
}

#[test]
fn explicit_key_and_index_output() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let mut cfg = config(dir.path());
    cfg.keys.insert("users".into(), vec!["name".into()]);
    cfg.index_path = Some(dir.path().join("rows.jsonl"));

    let artifacts = run(&cfg, &ProgressManager::disabled(), &CancelFlag::new()).unwrap();
    let users = &artifacts.report.tables["users"];
    assert_eq!(users.key.as_ref().unwrap().origin, KeyOrigin::Explicit);
    // By name: Alice matches, Bob/Cy missing, Bobby/Dee extra.
    assert_eq!(users.summary.counts(), (1, 0, 2, 2));
    assert_eq!(artifacts.indexed_rows, Some(7));
    let lines = fs::read_to_string(dir.path().join("rows.jsonl")).unwrap();
    assert_eq!(lines.lines().count(), 7);
}

#[test]
fn unknown_schema_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let cfg = Config {
        destination_schema: "finance".into(),
        ..config(dir.path())
    };
    let outcome = run(&cfg, &ProgressManager::disabled(), &CancelFlag::new());
    assert!(matches!(outcome, Err(ReconError::SchemaNotFound(_))));
    let result = RunResult::from_outcome(&outcome);
    assert!(!result.success);
    assert!(result.error.unwrap().contains("finance"));
}

#[test]
fn no_common_tables_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("in")).unwrap();
    fs::write(dir.path().join("in/hr.sql"), "INSERT INTO a (id) VALUES (1);").unwrap();
    fs::write(dir.path().join("in/payroll.sql"), "INSERT INTO b (id) VALUES (1);").unwrap();
    let outcome = run(&config(dir.path()), &ProgressManager::disabled(), &CancelFlag::new());
    assert!(matches!(outcome, Err(ReconError::NoCommonTables { .. })));
}

#[test]
fn unwritable_output_dir_still_returns_the_report() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let blocker = dir.path().join("out");
    fs::write(&blocker, "a file, not a directory").unwrap();

    let artifacts = run(&config(dir.path()), &ProgressManager::disabled(), &CancelFlag::new()).unwrap();
    assert!(artifacts.paths.json.is_none());
    assert!(artifacts.paths.html.is_none());
    assert_eq!(artifacts.report.tables["users"].summary.counts(), (1, 1, 1, 1));

    let result = RunResult::from_outcome(&Ok(artifacts));
    assert!(result.success);
    assert!(result.report_id.is_some());
    assert!(result.json_report.is_none());
}

#[test]
fn missing_input_next_to_valid_directory() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let cfg = Config {
        inputs: vec![dir.path().join("gone.docx"), dir.path().join("in")],
        ..config(dir.path())
    };
    let artifacts = run(&cfg, &ProgressManager::disabled(), &CancelFlag::new()).unwrap();
    assert_eq!(artifacts.report.tables["users"].summary.counts(), (1, 1, 1, 1));
}

#[test]
fn prose_before_inserts_keeps_every_row() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("in")).unwrap();
    fs::write(
        dir.path().join("in/hr.txt"),
        "Here's the HR export.\nINSERT INTO users (id, name) VALUES (1, 'Ann');\n\
         INSERT INTO users (id, name) VALUES (2, 'Bob');",
    )
    .unwrap();
    fs::write(
        dir.path().join("in/payroll.txt"),
        "Payroll's copy:\nINSERT INTO users (id, name) VALUES (1, 'Ann'), (2, 'Bob');",
    )
    .unwrap();
    let artifacts = run(&config(dir.path()), &ProgressManager::disabled(), &CancelFlag::new()).unwrap();
    let users = &artifacts.report.tables["users"];
    assert_eq!(users.summary.rows_in_source, 2);
    assert_eq!(users.summary.counts(), (2, 0, 0, 0));
}
