//! Indexing context: a durable, single-writer inverted index plus its
//! commit/timestamp discipline.
//!
//! # Architecture
//!
//! ```text
//! ArtifactContext → Record → TantivyDocument → IndexWriter → index dir
//!                                                  ↓ commit
//!                                           timestamp sidecar
//! ```
//!
//! One writer, many readers. The writer holds tantivy's directory lock for
//! the lifetime of the context; a second writer on the same directory
//! fails fast. Searchers are point-in-time snapshots: the reader reloads
//! only on commit, and an acquired searcher keeps observing its snapshot
//! until dropped.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tantivy::collector::TopDocs;
use tantivy::query::TermQuery;
use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, STORED, TEXT,
};
use tantivy::{DocAddress, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info, warn};

use crate::artifact::{current_time_millis, ArtifactContext};
use crate::creator::IndexCreator;
use crate::error::{IndexError, Result};
use crate::record::{
    descriptor_record, FieldDef, Record, BASE_FIELDS, DESCRIPTOR_CONTENTS, FLD_DELETED,
    FLD_DESCRIPTOR, FLD_IDXINFO, FLD_LAST_MODIFIED, FLD_UINFO, FS,
};

/// Sidecar file holding the last commit time, epoch millis, big-endian.
pub const TIMESTAMP_FILE: &str = "timestamp";

const WRITER_HEAP_BYTES: usize = 50_000_000;

/// Resolved schema handles, cached once per context.
pub struct SchemaFields {
    pub schema: Schema,
    defs: Vec<FieldDef>,
    by_name: HashMap<&'static str, Field>,
}

impl SchemaFields {
    /// Build a fresh schema from field defs.
    pub fn build(defs: Vec<FieldDef>) -> SchemaFields {
        let mut builder = Schema::builder();
        for def in &defs {
            builder.add_text_field(def.name, field_options(def));
        }
        let schema = builder.build();
        let by_name = defs
            .iter()
            .map(|def| (def.name, schema.get_field(def.name).expect("just added")))
            .collect();
        SchemaFields { schema, defs, by_name }
    }

    /// Resolve defs against a schema loaded from disk.
    pub fn resolve(schema: Schema, defs: Vec<FieldDef>) -> Result<SchemaFields> {
        let mut by_name = HashMap::new();
        for def in &defs {
            let field = schema.get_field(def.name).map_err(|_| {
                IndexError::Corruption(format!("index schema is missing field '{}'", def.name))
            })?;
            by_name.insert(def.name, field);
        }
        Ok(SchemaFields { schema, defs, by_name })
    }

    pub fn field(&self, name: &str) -> Option<Field> {
        self.by_name.get(name).copied()
    }

    pub fn defs(&self) -> &[FieldDef] {
        &self.defs
    }
}

fn field_options(def: &FieldDef) -> TextOptions {
    let flags = def.flags;
    if !flags.indexed {
        return TextOptions::default().set_stored();
    }
    if flags.tokenized {
        if flags.stored {
            TEXT | STORED
        } else {
            TEXT
        }
    } else {
        let options = TextOptions::default().set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer("raw")
                .set_index_option(IndexRecordOption::Basic),
        );
        if flags.stored {
            options.set_stored()
        } else {
            options
        }
    }
}

/// Union of the base fields and every contributor's declared fields,
/// first declaration wins.
pub fn context_field_defs(creators: &[Arc<dyn IndexCreator>]) -> Vec<FieldDef> {
    let mut defs: Vec<FieldDef> = Vec::new();
    for def in BASE_FIELDS
        .iter()
        .chain(creators.iter().flat_map(|c| c.fields().iter()))
    {
        if !defs.iter().any(|d| d.name == def.name) {
            defs.push(*def);
        }
    }
    defs
}

pub struct IndexingContext {
    id: String,
    index_dir: PathBuf,
    index: Index,
    writer: Mutex<IndexWriter>,
    reader: IndexReader,
    fields: SchemaFields,
    creators: Vec<Arc<dyn IndexCreator>>,
}

impl IndexingContext {
    /// Open an existing context or create a fresh one. A fresh index gets
    /// its descriptor record committed immediately; an existing index must
    /// carry a descriptor record for the same context id.
    pub fn open_or_create(
        id: impl Into<String>,
        index_dir: impl Into<PathBuf>,
        creators: Vec<Arc<dyn IndexCreator>>,
    ) -> Result<IndexingContext> {
        let id = id.into();
        let index_dir = index_dir.into();
        let defs = context_field_defs(&creators);

        let exists = index_dir.join("meta.json").is_file();
        let (index, fields) = if exists {
            let index = Index::open_in_dir(&index_dir)?;
            let fields = SchemaFields::resolve(index.schema(), defs)?;
            (index, fields)
        } else {
            fs::create_dir_all(&index_dir)?;
            let fields = SchemaFields::build(defs);
            let index = Index::create_in_dir(&index_dir, fields.schema.clone())?;
            (index, fields)
        };

        let writer: IndexWriter = index.writer(WRITER_HEAP_BYTES)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        let context = IndexingContext {
            id,
            index_dir,
            index,
            writer: Mutex::new(writer),
            reader,
            fields,
            creators,
        };

        if exists {
            context.validate_descriptor()?;
            debug!(id = %context.id, "opened existing indexing context");
        } else {
            context.install_descriptor()?;
            info!(id = %context.id, dir = %context.index_dir.display(), "created indexing context");
        }

        Ok(context)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    /// The ordered contributor registry.
    pub fn index_creators(&self) -> &[Arc<dyn IndexCreator>] {
        &self.creators
    }

    pub fn fields(&self) -> &SchemaFields {
        &self.fields
    }

    pub fn descriptor_record(&self) -> Record {
        descriptor_record(&self.id)
    }

    /// Upsert by UINFO: delete any prior document (and tombstone) with the
    /// same key, then add the new one, all inside the same pending commit.
    pub fn add_artifact(&self, artifact_context: &mut ArtifactContext) -> Result<()> {
        let record = artifact_context.create_record(&self.creators);
        self.add_record(record)
    }

    /// Lower-level upsert for callers that already hold a record.
    pub fn add_record(&self, record: Record) -> Result<()> {
        let uinfo = record
            .uinfo()
            .ok_or_else(|| IndexError::invalid("record without a UINFO key"))?
            .to_string();
        let document = self.record_to_document(&record);

        let mut writer = self.writer.lock().expect("writer lock poisoned");
        writer.delete_term(self.term(FLD_UINFO, &uinfo));
        writer.delete_term(self.term(FLD_DELETED, &uinfo));
        writer.add_document(document)?;
        Ok(())
    }

    /// Delete by exact UINFO and leave a tombstone record behind so
    /// incremental chunks can propagate the deletion.
    pub fn delete_artifact(&self, coordinate: &crate::coordinate::Coordinate) -> Result<()> {
        let uinfo = coordinate.uinfo();
        let mut tombstone = Record::new();
        tombstone.put_entry(FLD_DELETED, &uinfo, crate::record::FieldFlags::KEYWORD);
        tombstone.put_entry(
            FLD_LAST_MODIFIED,
            current_time_millis().to_string(),
            crate::record::FieldFlags::STORED,
        );
        let document = self.record_to_document(&tombstone);

        let mut writer = self.writer.lock().expect("writer lock poisoned");
        writer.delete_term(self.term(FLD_UINFO, &uinfo));
        writer.delete_term(self.term(FLD_DELETED, &uinfo));
        writer.add_document(document)?;
        debug!(uinfo = %uinfo, "recorded artifact deletion");
        Ok(())
    }

    /// Flush pending mutations and advance the timestamp sidecar to the
    /// wall-clock time at commit start. The sidecar is written atomically
    /// and only after the commit is durable, so a reader that observes the
    /// new timestamp also observes the committed state.
    pub fn commit(&self) -> Result<i64> {
        let commit_start = current_time_millis();
        {
            let mut writer = self.writer.lock().expect("writer lock poisoned");
            writer.commit()?;
        }
        self.reader.reload()?;

        let timestamp = self.timestamp().unwrap_or(0).max(commit_start);
        self.write_timestamp(timestamp)?;
        debug!(id = %self.id, timestamp, "committed indexing context");
        Ok(timestamp)
    }

    /// Last commit time, epoch millis. `None` before the first commit.
    pub fn timestamp(&self) -> Option<i64> {
        let bytes = fs::read(self.index_dir.join(TIMESTAMP_FILE)).ok()?;
        Some(i64::from_be_bytes(bytes.try_into().ok()?))
    }

    fn write_timestamp(&self, millis: i64) -> Result<()> {
        let path = self.index_dir.join(TIMESTAMP_FILE);
        let tmp = self.index_dir.join(format!("{}.tmp", TIMESTAMP_FILE));
        fs::write(&tmp, millis.to_be_bytes())?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// A point-in-time snapshot of the committed state. Reference-counted;
    /// dropping the searcher releases it. Acquisition never blocks the
    /// writer.
    pub fn acquire_searcher(&self) -> tantivy::Searcher {
        self.reader.searcher()
    }

    /// Force-merge down to at most `max_segments` segments.
    pub fn optimize(&self, max_segments: usize) -> Result<()> {
        let segment_ids = self.index.searchable_segment_ids()?;
        if segment_ids.len() <= max_segments.max(1) {
            return Ok(());
        }
        info!(segments = segment_ids.len(), max_segments, "merging index segments");
        {
            let mut writer = self.writer.lock().expect("writer lock poisoned");
            writer.merge(&segment_ids).wait()?;
        }
        self.reader.reload()?;
        Ok(())
    }

    /// Fetch the live record for a UINFO, if any.
    pub fn record_for_uinfo(
        &self,
        searcher: &tantivy::Searcher,
        uinfo: &str,
    ) -> Result<Option<Record>> {
        let query = TermQuery::new(self.term(FLD_UINFO, uinfo), IndexRecordOption::Basic);
        let hits = searcher.search(&query, &TopDocs::with_limit(1))?;
        match hits.first() {
            Some((_, address)) => {
                let document: TantivyDocument = searcher.doc(*address)?;
                Ok(Some(self.document_to_record(&document)))
            }
            None => Ok(None),
        }
    }

    /// Every live document of the snapshot, in segment order. Callers
    /// filter descriptor and tombstone records by field.
    pub fn live_records(
        &self,
        searcher: &tantivy::Searcher,
    ) -> Result<Vec<(DocAddress, Record)>> {
        let mut records = Vec::new();
        for (segment_ord, segment_reader) in searcher.segment_readers().iter().enumerate() {
            let store_reader = segment_reader.get_store_reader(1)?;
            for doc_id in segment_reader.doc_ids_alive() {
                let document: TantivyDocument = store_reader.get(doc_id)?;
                records.push((
                    DocAddress::new(segment_ord as u32, doc_id),
                    self.document_to_record(&document),
                ));
            }
        }
        Ok(records)
    }

    /// Resolve a single document address back into a record.
    pub fn record_at(&self, searcher: &tantivy::Searcher, address: DocAddress) -> Result<Record> {
        let document: TantivyDocument = searcher.doc(address)?;
        Ok(self.document_to_record(&document))
    }

    pub fn document_to_record(&self, document: &TantivyDocument) -> Record {
        let mut record = Record::new();
        for def in self.fields.defs() {
            let Some(field) = self.fields.field(def.name) else {
                continue;
            };
            if let Some(value) = document.get_first(field).and_then(|v| v.as_str()) {
                record.put(*def, value);
            }
        }
        record
    }

    pub fn record_to_document(&self, record: &Record) -> TantivyDocument {
        let mut document = TantivyDocument::default();
        for entry in record.entries() {
            match self.fields.field(&entry.name) {
                Some(field) => document.add_text(field, &entry.value),
                None => warn!(field = %entry.name, "dropping field unknown to this context"),
            }
        }
        document
    }

    fn term(&self, field_name: &str, value: &str) -> Term {
        let field = self
            .fields
            .field(field_name)
            .expect("base fields are always registered");
        Term::from_field_text(field, value)
    }

    fn install_descriptor(&self) -> Result<()> {
        let document = self.record_to_document(&self.descriptor_record());
        {
            let mut writer = self.writer.lock().expect("writer lock poisoned");
            writer.add_document(document)?;
        }
        self.commit()?;
        Ok(())
    }

    fn validate_descriptor(&self) -> Result<()> {
        let searcher = self.acquire_searcher();
        let query = TermQuery::new(
            self.term(FLD_DESCRIPTOR, DESCRIPTOR_CONTENTS),
            IndexRecordOption::Basic,
        );
        let hits = searcher.search(&query, &TopDocs::with_limit(1))?;
        let (_, address) = hits
            .first()
            .ok_or_else(|| IndexError::Corruption("index has no descriptor record".into()))?;
        let document: TantivyDocument = searcher.doc(*address)?;
        let record = self.document_to_record(&document);
        let idxinfo = record
            .get(FLD_IDXINFO)
            .ok_or_else(|| IndexError::Corruption("descriptor record lacks index info".into()))?;
        let recorded_id = idxinfo.split(FS).nth(1).unwrap_or_default();
        if recorded_id != self.id {
            return Err(IndexError::Corruption(format!(
                "index belongs to context '{}', not '{}'",
                recorded_id, self.id
            )));
        }
        Ok(())
    }
}
