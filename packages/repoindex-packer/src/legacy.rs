//! Legacy archive writer: rebuilds the committed records into the compact
//! legacy schema inside a scratch index directory, compacts it, and zips
//! the directory at maximum compression.
//!
//! The scratch directory is owned by the call and removed on every exit
//! path; the zip always carries the timestamp sidecar entry.

use std::fs::{self, File};
use std::io::{Seek, Write};

use tantivy::{Index, IndexWriter, TantivyDocument};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use repoindex_core::context::SchemaFields;
use repoindex_core::error::Result;
use repoindex_core::record::{Record, LEGACY_FIELDS};
use repoindex_core::{ArtifactInfo, IndexingContext, TIMESTAMP_FILE};

const LEGACY_WRITER_HEAP_BYTES: usize = 15_000_000;

/// Rebuild one artifact into its legacy record by running every
/// contributor's legacy capability.
fn legacy_record(context: &IndexingContext, info: &ArtifactInfo) -> Record {
    let mut record = Record::new();
    for creator in context.index_creators() {
        if let Some(updater) = creator.legacy_updater() {
            updater.update_legacy_record(info, &mut record);
        }
    }
    record
}

/// Write the legacy zip archive of the snapshot into `out`.
pub fn write_index_archive(
    context: &IndexingContext,
    searcher: &tantivy::Searcher,
    out: impl Write + Seek,
    max_segments: usize,
) -> Result<()> {
    let scratch = tempfile::TempDir::new()?;
    let fields = SchemaFields::build(LEGACY_FIELDS.to_vec());
    let index = Index::create_in_dir(scratch.path(), fields.schema.clone())?;

    {
        let mut writer: IndexWriter = index.writer(LEGACY_WRITER_HEAP_BYTES)?;

        writer.add_document(to_document(&fields, &context.descriptor_record()))?;

        let mut rebuilt = 0u64;
        for (_, record) in context.live_records(searcher)? {
            if record.is_descriptor() || record.is_tombstone() {
                continue;
            }
            let Some(info) = ArtifactInfo::from_record(&record, context.index_creators()) else {
                continue;
            };
            writer.add_document(to_document(&fields, &legacy_record(context, &info)))?;
            rebuilt += 1;
        }

        writer.commit()?;
        let segment_ids = index.searchable_segment_ids()?;
        if segment_ids.len() > max_segments.max(1) {
            writer.merge(&segment_ids).wait()?;
        }
        writer.wait_merging_threads()?;
        debug!(records = rebuilt, "rebuilt legacy index");
    }

    // The sidecar must travel with the archive.
    fs::write(
        scratch.path().join(TIMESTAMP_FILE),
        context.timestamp().unwrap_or(0).to_be_bytes(),
    )?;

    pack_directory(scratch.path(), out)
}

fn to_document(fields: &SchemaFields, record: &Record) -> TantivyDocument {
    let mut document = TantivyDocument::default();
    for entry in record.entries() {
        if let Some(field) = fields.field(&entry.name) {
            document.add_text(field, &entry.value);
        }
    }
    document
}

/// Zip every file of a flat directory, sorted by name, deflate level 9.
fn pack_directory(dir: &std::path::Path, out: impl Write + Seek) -> Result<()> {
    let mut names: Vec<String> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| !name.ends_with(".lock"))
        .collect();
    names.sort_unstable();

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9));

    let mut archive = zip::ZipWriter::new(out);
    for name in names {
        archive.start_file(name.as_str(), options)?;
        let mut file = File::open(dir.join(&name))?;
        std::io::copy(&mut file, &mut archive)?;
    }
    archive.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use repoindex_core::creator::default_creators;
    use repoindex_core::record::{
        FieldFlags, FLD_LAST_MODIFIED, FLD_PACKAGING, FLD_SIZE, FLD_UINFO, LEGACY_UINFO,
    };
    use std::io::{Cursor, Read};
    use tempfile::TempDir;

    fn context_with_artifact(dir: &TempDir) -> IndexingContext {
        let context = IndexingContext::open_or_create(
            "legacy",
            dir.path().join("index"),
            default_creators(),
        )
        .unwrap();
        let mut record = Record::new();
        record.put_entry(FLD_UINFO, "org.ex|a|1.0|NA|jar", FieldFlags::KEYWORD);
        record.put_entry(FLD_LAST_MODIFIED, "12345", FieldFlags::STORED);
        record.put_entry(FLD_PACKAGING, "jar", FieldFlags::KEYWORD);
        record.put_entry(FLD_SIZE, "4", FieldFlags::STORED);
        context.add_record(record).unwrap();
        context.commit().unwrap();
        context
    }

    #[test]
    fn test_archive_contains_timestamp_and_segments() {
        let dir = TempDir::new().unwrap();
        let context = context_with_artifact(&dir);
        let searcher = context.acquire_searcher();

        let mut buf = Cursor::new(Vec::new());
        write_index_archive(&context, &searcher, &mut buf, 1).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(buf.into_inner())).unwrap();
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();
        assert!(names.iter().any(|n| n == TIMESTAMP_FILE));
        assert!(names.len() > 1, "expected index files next to the timestamp");

        let mut timestamp = archive.by_name(TIMESTAMP_FILE).unwrap();
        let mut bytes = Vec::new();
        timestamp.read_to_end(&mut bytes).unwrap();
        let millis = i64::from_be_bytes(bytes.try_into().unwrap());
        assert_eq!(millis, context.timestamp().unwrap());
    }

    #[test]
    fn test_archive_rebuilds_legacy_schema() {
        let dir = TempDir::new().unwrap();
        let context = context_with_artifact(&dir);
        let searcher = context.acquire_searcher();

        let mut buf = Cursor::new(Vec::new());
        write_index_archive(&context, &searcher, &mut buf, 1).unwrap();

        // Reopen the zipped directory as an index and check the schema.
        let scratch = TempDir::new().unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(buf.into_inner())).unwrap();
        archive.extract(scratch.path()).unwrap();

        let index = Index::open_in_dir(scratch.path()).unwrap();
        let field = index.schema().get_field(LEGACY_UINFO).unwrap();
        let reader = index.reader().unwrap();
        let searcher = reader.searcher();
        let query = tantivy::query::TermQuery::new(
            tantivy::Term::from_field_text(field, "org.ex|a|1.0|NA|jar"),
            tantivy::schema::IndexRecordOption::Basic,
        );
        let hits = searcher
            .search(&query, &tantivy::collector::TopDocs::with_limit(1))
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_empty_context_archive_still_has_timestamp() {
        let dir = TempDir::new().unwrap();
        let context = IndexingContext::open_or_create(
            "legacy-empty",
            dir.path().join("index"),
            default_creators(),
        )
        .unwrap();
        let searcher = context.acquire_searcher();

        let mut buf = Cursor::new(Vec::new());
        write_index_archive(&context, &searcher, &mut buf, 1).unwrap();

        let archive = zip::ZipArchive::new(Cursor::new(buf.into_inner())).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert!(names.contains(&TIMESTAMP_FILE));
    }
}
