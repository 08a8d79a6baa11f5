// Table- and report-level behavior through the public API.

use recondiff::reconcile::{match_rows, Differ, Normalizer};
use recondiff::{
    assemble_schemas, reconcile_table, AggregateOptions, ColumnPolicy, KeyResolver, ReportAggregator,
    Row, Schema, SchemaSet, Table, TableOptions,
};

fn row(schema: &str, table: &str, cols: &[&str], vals: &[Option<&str>]) -> Row {
    Row::new(
        schema,
        table,
        cols.iter().map(|c| c.to_string()).collect(),
        vals.iter().map(|v| v.map(str::to_string)).collect(),
    )
}

fn users(schema: &str, data: &[(&str, Option<&str>)]) -> Vec<Row> {
    data.iter()
        .map(|(id, name)| row(schema, "users", &["id", "name"], &[Some(*id), *name]))
        .collect()
}

fn build(rows: Vec<Row>) -> SchemaSet {
    assemble_schemas(rows, ColumnPolicy::Union)
}

fn options(chunk_size: usize) -> TableOptions {
    TableOptions {
        chunk_size,
        ..TableOptions::default()
    }
}

fn aggregate(set: &SchemaSet, opts: AggregateOptions) -> recondiff::Report {
    let src = set.get("src").unwrap();
    let dst = set.get("dst").unwrap();
    ReportAggregator::new(opts).aggregate(src, dst).unwrap()
}

#[test]
fn scenario_a_one_field_differs() {
    let mut rows = users("src", &[("1", Some("Alice")), ("2", Some("Bob"))]);
    rows.extend(users("dst", &[("1", Some("Alice")), ("2", Some("Bobby"))]));
    let set = build(rows);
    let result = reconcile_table(
        set.get("src").unwrap().table("users").unwrap(),
        set.get("dst").unwrap().table("users").unwrap(),
        None,
        &options(0),
    );
    assert_eq!(result.summary.counts(), (1, 1, 0, 0));
    let diff = &result.details.different[0];
    assert_eq!(diff.key, "2");
    assert_eq!(diff.differences["name"].source.as_deref(), Some("Bob"));
    assert_eq!(diff.differences["name"].destination.as_deref(), Some("Bobby"));
}

#[test]
fn scenario_b_missing_and_extra() {
    let mut rows = users("src", &[("1", Some("a")), ("3", Some("c"))]);
    rows.extend(users("dst", &[("1", Some("a")), ("4", Some("d"))]));
    let set = build(rows);
    let report = aggregate(&set, AggregateOptions::default());
    let s = &report.tables["users"].summary;
    assert_eq!((s.missing, s.extra), (1, 1));
    assert!(s.has_differences);
    assert!(!report.summary.all_matched);
}

#[test]
fn scenario_c_null_is_not_empty_string() {
    let mut rows = users("src", &[("1", None)]);
    rows.extend(users("dst", &[("1", Some(""))]));
    let set = build(rows);
    let report = aggregate(&set, AggregateOptions::default());
    assert_eq!(report.tables["users"].summary.different, 1);
}

#[test]
fn scenario_d_source_only_table() {
    let mut rows = users("src", &[("1", Some("a"))]);
    rows.extend(users("dst", &[("1", Some("a"))]));
    rows.push(row("src", "legacy", &["id"], &[Some("9")]));
    let set = build(rows);
    let report = aggregate(&set, AggregateOptions::default());
    assert!(report.schema_only_tables.source_only.contains("legacy"));
    assert!(!report.tables.contains_key("legacy"));
    assert_eq!(report.summary.total_tables, 1);
    assert_eq!(report.summary.total_rows_source, 1);
    assert!(report.summary.all_matched);
}

#[test]
fn key_resolution_ignores_row_content() {
    let resolver = KeyResolver::new(vec!["employee_id".into()]);
    let cols = vec!["employee_id".to_string(), "order_id".to_string(), "x".to_string()];
    let a = Table::new("s", "t", cols.clone());
    let mut b = Table::new("s", "t", cols.clone());
    b.rows.push(Row::new("s", "t", cols, vec![Some("1".into()), None, Some("z".into())]));
    let empty = resolver.resolve(&a, &a).unwrap();
    let filled = resolver.resolve(&b, &b).unwrap();
    assert_eq!(empty, filled);
    assert_eq!(filled.columns, vec!["order_id"]);
    assert_eq!(resolver.resolve(&b, &b).unwrap(), filled);
}

fn mixed_tables() -> (Table, Table) {
    let mut src = Vec::new();
    let mut dst = Vec::new();
    for i in 0..40 {
        let id = i.to_string();
        let v = format!("v{}", i);
        if i % 7 != 0 {
            src.push(row("src", "t", &["id", "v"], &[Some(id.as_str()), Some(v.as_str())]));
        }
        if i % 5 != 0 {
            let dv = if i % 3 == 0 { format!("w{}", i) } else { v.clone() };
            dst.push(row("dst", "t", &["id", "v"], &[Some(id.as_str()), Some(dv.as_str())]));
        }
    }
    // Duplicate destination key.
    dst.push(row("dst", "t", &["id", "v"], &[Some("1"), Some("dup")]));
    let set = build(src.into_iter().chain(dst).collect());
    (
        set.get("src").unwrap().table("t").unwrap().clone(),
        set.get("dst").unwrap().table("t").unwrap().clone(),
    )
}

#[test]
fn matcher_partitions_both_sides() {
    let (src, dst) = mixed_tables();
    let key = KeyResolver::default().resolve(&src, &dst).unwrap();
    let m = match_rows(&src.rows, &dst.rows, &key, Normalizer::default());
    assert_eq!(m.matched.len() + m.source_only.len(), src.rows.len());
    assert_eq!(m.matched.len() + m.destination_only.len(), dst.rows.len());
}

#[test]
fn diff_emptiness_is_symmetric() {
    let differ = Differ::new(vec!["employee_id".into()], Normalizer::default());
    let pairs = [
        (vec![Some("1"), Some(" a ")], vec![Some("1"), Some("a")]),
        (vec![Some("1"), None], vec![Some("1"), Some("")]),
        (vec![Some("1"), Some("a")], vec![Some("2"), Some("a")]),
    ];
    for (a, b) in pairs {
        let ra = row("s", "t", &["employee_id", "name"], &a);
        let rb = row("s", "t", &["employee_id", "name"], &b);
        assert_eq!(differ.diff(&ra, &rb).is_empty(), differ.diff(&rb, &ra).is_empty());
    }
}

#[test]
fn chunk_size_never_changes_counts() {
    let (src, dst) = mixed_tables();
    let baseline = reconcile_table(&src, &dst, None, &options(0)).summary;
    for chunk in 1..=src.rows.len() + 1 {
        let summary = reconcile_table(&src, &dst, None, &options(chunk)).summary;
        assert_eq!(summary.counts(), baseline.counts(), "chunk size {}", chunk);
    }
}

#[test]
fn rerun_is_idempotent() {
    let (src, dst) = mixed_tables();
    let a = reconcile_table(&src, &dst, None, &options(7));
    let b = reconcile_table(&src, &dst, None, &options(7));
    assert_eq!(a.summary, b.summary);
    assert_eq!(a.details, b.details);
}

#[test]
fn sequential_and_parallel_reports_agree() {
    let mut rows = Vec::new();
    for t in 0..9 {
        let table = format!("t{}", t);
        for i in 0..(t * 3 + 1) {
            let id = i.to_string();
            rows.push(row("src", &table, &["id", "v"], &[Some(id.as_str()), Some("x")]));
            if i % 2 == 0 {
                rows.push(row("dst", &table, &["id", "v"], &[Some(id.as_str()), Some("x")]));
            }
        }
    }
    let set = build(rows);
    let parallel = aggregate(
        &set,
        AggregateOptions {
            batch_size: 2,
            max_workers: 4,
            ..AggregateOptions::default()
        },
    );
    let sequential = aggregate(
        &set,
        AggregateOptions {
            use_parallel: false,
            ..AggregateOptions::default()
        },
    );
    assert_eq!(parallel.tables, sequential.tables);
    assert_eq!(parallel.summary, sequential.summary);
    assert_eq!(parallel.tables.len(), 9);
}

#[test]
fn key_failure_is_recorded_on_the_table() {
    let mut src = Schema::new("src");
    src.insert(Table::new("src", "empty", Vec::new()));
    src.insert(Table::new("src", "t", vec!["id".into()]));
    let mut dst = Schema::new("dst");
    let mut bad = Table::new("dst", "empty", Vec::new());
    bad.rows.push(Row::new("dst", "empty", Vec::new(), Vec::new()));
    dst.insert(bad);
    dst.insert(Table::new("dst", "t", vec!["id".into()]));

    let report = ReportAggregator::new(AggregateOptions::default())
        .aggregate(&src, &dst)
        .unwrap();
    assert!(report.tables["empty"].error.is_some());
    assert_eq!(report.summary.tables_with_errors, 1);
    assert_eq!(report.tables["t"].summary.match_percentage, 0.0);
}
