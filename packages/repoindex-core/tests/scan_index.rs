//! Scanner-to-index integration: a scratch repository walked into a real
//! context through the default contributor registry.

use std::io::Write;
use std::path::Path;

use repoindex_core::creator::default_creators;
use repoindex_core::record::{FLD_CLASSNAMES, FLD_NAME, FLD_PACKAGING, FLD_SHA1};
use repoindex_core::{ArtifactInfo, DefaultScannerListener, IndexingContext, Record, Scanner};
use tempfile::TempDir;

fn write_file(root: &Path, relative: &str, contents: &[u8]) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

fn write_jar(root: &Path, relative: &str, class_entries: &[&str]) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let file = std::fs::File::create(path).unwrap();
    let mut jar = zip::ZipWriter::new(file);
    for entry in class_entries {
        jar.start_file(*entry, zip::write::SimpleFileOptions::default())
            .unwrap();
        jar.write_all(b"\xca\xfe\xba\xbe").unwrap();
    }
    jar.finish().unwrap();
}

fn artifact_records(context: &IndexingContext) -> Vec<Record> {
    let searcher = context.acquire_searcher();
    context
        .live_records(&searcher)
        .unwrap()
        .into_iter()
        .map(|(_, record)| record)
        .filter(|record| !record.is_descriptor() && !record.is_tombstone())
        .collect()
}

#[test]
fn test_scan_populates_index_through_creators() {
    let workspace = TempDir::new().unwrap();
    let repository = workspace.path().join("repository");
    std::fs::create_dir_all(&repository).unwrap();

    write_jar(
        &repository,
        "org/ex/a/1.0/a-1.0.jar",
        &["org/ex/App.class", "org/ex/util/Helper.class"],
    );
    write_file(
        &repository,
        "org/ex/a/1.0/a-1.0.pom",
        b"<project><packaging>jar</packaging><name>A</name>\
          <description>example</description></project>",
    );

    let context = IndexingContext::open_or_create(
        "scan-test",
        workspace.path().join("index"),
        default_creators(),
    )
    .unwrap();

    let mut listener = DefaultScannerListener::new(&context);
    let result = Scanner::scan(&repository, &mut listener).unwrap();
    context.commit().unwrap();

    assert_eq!(result.total_artifacts, 1);
    assert_eq!(listener.updated, 1);

    let records = artifact_records(&context);
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.uinfo(), Some("org.ex|a|1.0|NA|jar"));
    assert_eq!(record.get(FLD_PACKAGING), Some("jar"));
    assert_eq!(record.get(FLD_NAME), Some("A"));
    assert!(record.get(FLD_SHA1).is_some());
    assert_eq!(
        record.get(FLD_CLASSNAMES),
        Some("org/ex/App\norg/ex/util/Helper")
    );

    // The record projects back into an artifact info.
    let info = ArtifactInfo::from_record(record, context.index_creators()).unwrap();
    assert_eq!(info.artifact_id, "a");
    assert_eq!(info.name.as_deref(), Some("A"));
    assert!(info.classnames.is_some());
}

#[test]
fn test_rescan_skips_unchanged_artifacts() {
    let workspace = TempDir::new().unwrap();
    let repository = workspace.path().join("repository");
    std::fs::create_dir_all(&repository).unwrap();
    write_file(&repository, "org/ex/a/1.0/a-1.0.jar", b"DATA");

    let context = IndexingContext::open_or_create(
        "rescan-test",
        workspace.path().join("index"),
        default_creators(),
    )
    .unwrap();

    let mut listener = DefaultScannerListener::new(&context);
    Scanner::scan(&repository, &mut listener).unwrap();
    context.commit().unwrap();
    assert_eq!((listener.updated, listener.skipped), (1, 0));

    let mut listener = DefaultScannerListener::new(&context);
    Scanner::scan(&repository, &mut listener).unwrap();
    assert_eq!((listener.updated, listener.skipped), (0, 1));
}

#[test]
fn test_removal_pass_deletes_missing_artifacts() {
    let workspace = TempDir::new().unwrap();
    let repository = workspace.path().join("repository");
    std::fs::create_dir_all(&repository).unwrap();
    write_file(&repository, "org/ex/a/1.0/a-1.0.jar", b"DATA");
    write_file(&repository, "org/ex/b/1.0/b-1.0.jar", b"DATA");

    let context = IndexingContext::open_or_create(
        "removal-test",
        workspace.path().join("index"),
        default_creators(),
    )
    .unwrap();

    let mut listener = DefaultScannerListener::new(&context).remove_missing();
    Scanner::scan(&repository, &mut listener).unwrap();
    context.commit().unwrap();
    assert_eq!(artifact_records(&context).len(), 2);

    std::fs::remove_dir_all(repository.join("org/ex/b")).unwrap();
    let mut listener = DefaultScannerListener::new(&context).remove_missing();
    Scanner::scan(&repository, &mut listener).unwrap();
    context.commit().unwrap();

    assert_eq!(listener.removed, 1);
    let records = artifact_records(&context);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].uinfo(), Some("org.ex|a|1.0|NA|jar"));
}
