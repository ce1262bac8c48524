mod common;

use common::TestWorkspace;
use db_importer::{
    data::Value,
    error::{ImportError, ImportWarning},
    import_spec::{ExistingTablePolicy, ImportSpec},
    infer::StorageType,
    loader::{self, ChunkedLoader, LogSink},
    store::MemoryStore,
};

fn two_file_spec(workspace: &TestWorkspace) -> ImportSpec {
    let a = workspace.write(
        "a.csv",
        "Export from branch A,\nid,name\n1,Alice\n2,Bob\n3,Carol\n",
    );
    let b = workspace.write(
        "b.csv",
        "Export from branch B,\nid,name\n4,Dave\n5,Erin\n",
    );
    let mut spec = ImportSpec::new(vec![a, b], "customers");
    spec.transform.rows_to_skip = 1;
    spec.transform.promote_headers = true;
    spec
}

#[test]
fn two_csv_files_merge_under_promoted_headers() {
    let workspace = TestWorkspace::new();
    let spec = two_file_spec(&workspace);

    let (grids, warnings) = loader::read_sources(&spec).expect("read");
    assert_eq!(grids.len(), 2);
    let (dataset, warnings) = loader::merge_sources(&spec, grids, warnings).expect("merge");
    assert!(warnings.is_empty(), "{warnings:?}");
    assert_eq!(dataset.columns, vec!["id", "name"]);
    // (5 - 1 skipped - 1 promoted) + (4 - 1 skipped - 1 header)
    assert_eq!(dataset.len(), 3 + 2);
    assert_eq!(dataset.files, vec!["a.csv", "b.csv"]);
}

#[test]
fn two_csv_files_import_into_created_table() {
    let workspace = TestWorkspace::new();
    let spec = two_file_spec(&workspace);
    let mut store = MemoryStore::new();

    let report = ChunkedLoader::new(spec, &mut store, LogSink)
        .run()
        .expect("import");
    assert_eq!(report.rows_written, 5);
    assert_eq!(report.batches, 1);

    let table = store.table("customers").expect("table created");
    assert_eq!(table.column_names(), vec!["id", "name"]);
    assert_eq!(
        table.columns.iter().map(|c| c.storage).collect::<Vec<_>>(),
        vec![StorageType::Integer, StorageType::Text]
    );
    assert_eq!(
        table.rows.last(),
        Some(&vec![Value::Integer(5), Value::Text("Erin".to_string())])
    );
    assert_eq!(store.commits(), &[5]);
}

#[test]
fn source_column_and_dedupe_apply_across_files() {
    let workspace = TestWorkspace::new();
    let a = workspace.write("jan.csv", "sku,qty\nA1,3\nA1,3\nB2,1\n");
    let b = workspace.write("feb.csv", "sku,qty\nA1,3\n");
    let mut spec = ImportSpec::new(vec![a, b], "stock");
    spec.transform.promote_headers = true;
    spec.transform.deduplicate = true;
    spec.transform.add_source_column = true;

    let mut store = MemoryStore::new();
    ChunkedLoader::new(spec, &mut store, LogSink)
        .run()
        .expect("import");
    let table = store.table("stock").expect("table");
    assert_eq!(table.column_names(), vec!["source_file", "sku", "qty"]);
    let sources = table
        .rows
        .iter()
        .map(|row| row[0].as_display())
        .collect::<Vec<_>>();
    assert_eq!(sources, vec!["jan.csv", "jan.csv", "feb.csv"]);
}

#[test]
fn mismatched_and_unreadable_files_become_warnings() {
    let workspace = TestWorkspace::new();
    let one = workspace.write("one.csv", "1,a\n2,b\n");
    let two = workspace.write("two.csv", "3,c,x\n");
    let three = workspace.write("three.csv", "4,d\n");
    let broken = workspace.write_bytes("broken.csv", &[b'a', b',', 0x80, b'\n']);
    let spec = ImportSpec::new(vec![one, two, broken, three], "t");

    let mut store = MemoryStore::new();
    let report = ChunkedLoader::new(spec, &mut store, LogSink)
        .run()
        .expect("import");
    assert_eq!(report.files, vec!["one.csv", "three.csv"]);
    assert_eq!(report.rows_written, 3);
    assert!(report.warnings.iter().any(|w| matches!(
        w,
        ImportWarning::SchemaMismatch { file, expected: 2, found: 3 } if file == "two.csv"
    )));
    assert!(report.warnings.iter().any(|w| matches!(
        w,
        ImportWarning::SkippedFile { file, .. } if file == "broken.csv"
    )));
}

#[test]
fn nothing_usable_is_fatal() {
    let workspace = TestWorkspace::new();
    let header_only = workspace.write("header.csv", "id,name\n");
    let mut spec = ImportSpec::new(vec![header_only], "t");
    spec.transform.promote_headers = true;
    spec.if_exists = ExistingTablePolicy::Overwrite;

    let mut store = MemoryStore::new();
    let err = ChunkedLoader::new(spec, &mut store, LogSink)
        .run()
        .unwrap_err();
    assert!(matches!(err, ImportError::NoUsableInput));
    assert!(store.table("t").is_none());
}
