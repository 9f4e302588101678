//! Packer orchestrator: one publication cycle from a committed snapshot
//! to the on-disk publication set.
//!
//! Ordering matters: an incremental chunk is computed and emitted before
//! the full dump is rewritten, because regenerating the dump may change
//! document ordinals and invalidate the chunk computation. Every
//! publication file is written to a temp sibling and renamed into place;
//! the descriptor is only updated after its files are durable.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use repoindex_core::error::{IndexError, Result};
use repoindex_core::IndexingContext;

use crate::data::IndexDataWriter;
use crate::digest::write_checksum_files;
use crate::fsutil::write_atomic_with;
use crate::incremental::IncrementalHandler;
use crate::legacy::write_index_archive;
use crate::properties::{
    format_timestamp, IndexProperties, INDEX_FILE_PREFIX, INDEX_ID, INDEX_LEGACY_TIMESTAMP,
    INDEX_PACKER_PROPERTIES_FILE, INDEX_REMOTE_PROPERTIES_FILE, INDEX_TIMESTAMP,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexFormat {
    V1,
    Legacy,
}

/// One publication cycle's configuration.
#[derive(Debug, Clone)]
pub struct IndexPackingRequest {
    pub target_dir: PathBuf,
    pub formats: Vec<IndexFormat>,
    pub create_incremental_chunks: bool,
    pub create_checksum_files: bool,
    /// Seed the cycle from the target directory's descriptor instead of
    /// the context sidecar. Off by default: the sidecar is authoritative.
    pub use_target_properties: bool,
    /// How many chunk markers the descriptor retains. Clients further
    /// behind than this must fall back to the full dump.
    pub max_index_chunks: u32,
    /// Segment ceiling for the compacted legacy index.
    pub max_segments: usize,
}

impl IndexPackingRequest {
    pub fn new(target_dir: impl Into<PathBuf>) -> IndexPackingRequest {
        IndexPackingRequest {
            target_dir: target_dir.into(),
            formats: vec![IndexFormat::V1],
            create_incremental_chunks: false,
            create_checksum_files: true,
            use_target_properties: false,
            max_index_chunks: 30,
            max_segments: 1,
        }
    }

    pub fn with_formats(mut self, formats: Vec<IndexFormat>) -> Self {
        self.formats = formats;
        self
    }

    pub fn with_incremental_chunks(mut self) -> Self {
        self.create_incremental_chunks = true;
        self
    }
}

/// What a publication cycle produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackOutcome {
    /// Number of the chunk emitted this cycle, if any.
    pub chunk_emitted: Option<u32>,
    /// Publication files written (checksum siblings not listed).
    pub published: Vec<PathBuf>,
    /// True when incremental state had to be reset and clients must take
    /// the full dump.
    pub reset_incremental: bool,
}

pub struct IndexPacker {
    incremental: IncrementalHandler,
}

impl Default for IndexPacker {
    fn default() -> Self {
        IndexPacker::new()
    }
}

impl IndexPacker {
    pub fn new() -> IndexPacker {
        IndexPacker {
            incremental: IncrementalHandler::new(),
        }
    }

    pub fn pack_index(
        &mut self,
        context: &IndexingContext,
        request: &IndexPackingRequest,
    ) -> Result<PackOutcome> {
        validate_target_dir(&request.target_dir)?;

        let sidecar = context.index_dir().join(INDEX_PACKER_PROPERTIES_FILE);
        let target_properties = request.target_dir.join(INDEX_REMOTE_PROPERTIES_FILE);
        let seed = if request.use_target_properties {
            &target_properties
        } else {
            &sidecar
        };

        let mut outcome = PackOutcome::default();
        let mut properties = match IndexProperties::load(seed) {
            Ok(properties) => properties,
            Err(e) => {
                info!(error = %e, "unable to read descriptor, forcing full regeneration");
                let mut properties = IndexProperties::new();
                self.incremental.initialize_properties(&mut properties, context);
                outcome.reset_incremental = true;
                properties
            }
        };

        let searcher = context.acquire_searcher();

        if request.create_incremental_chunks && !outcome.reset_incremental {
            // Corruption while computing the delta downgrades to a full
            // regeneration; the cycle still succeeds if the dump can be
            // produced.
            let computed = match self
                .incremental
                .compute_incremental(context, &searcher, &properties)
            {
                Ok(computed) => computed,
                Err(IndexError::Corruption(e)) => {
                    warn!(error = %e, "index corruption during incremental computation");
                    None
                }
                Err(e) => return Err(e),
            };
            match computed {
                None => {
                    warn!("incremental state unusable, regenerating whole index");
                    self.incremental.initialize_properties(&mut properties, context);
                    outcome.reset_incremental = true;
                }
                Some(chunk) if chunk.is_empty() => {
                    debug!("no incremental changes, not writing a chunk");
                }
                Some(chunk) => {
                    let number = properties.chunk_counter();
                    let file = request
                        .target_dir
                        .join(format!("{}.{}.gz", INDEX_FILE_PREFIX, number));
                    write_atomic_with(&file, |out| {
                        IndexDataWriter::write(context, &searcher, Some(&chunk), out).map(|_| ())
                    })?;
                    if request.create_checksum_files {
                        write_checksum_files(&file)?;
                    }
                    self.incremental
                        .update_properties_after_chunk(&mut properties, request.max_index_chunks);
                    info!(chunk = number, records = chunk.len(), "published incremental chunk");
                    outcome.chunk_emitted = Some(number);
                    outcome.published.push(file);
                }
            }
        }

        let timestamp = context.timestamp().unwrap_or(0);

        if request.formats.contains(&IndexFormat::Legacy) {
            properties.set(INDEX_LEGACY_TIMESTAMP, format_timestamp(timestamp));
            let file = request.target_dir.join(format!("{}.zip", INDEX_FILE_PREFIX));
            write_atomic_with(&file, |out| {
                write_index_archive(context, &searcher, out, request.max_segments)
            })?;
            if request.create_checksum_files {
                write_checksum_files(&file)?;
            }
            outcome.published.push(file);
        }

        if request.formats.contains(&IndexFormat::V1) {
            properties.set(INDEX_TIMESTAMP, format_timestamp(timestamp));
            let file = request.target_dir.join(format!("{}.gz", INDEX_FILE_PREFIX));
            write_atomic_with(&file, |out| {
                IndexDataWriter::write(context, &searcher, None, out).map(|_| ())
            })?;
            if request.create_checksum_files {
                write_checksum_files(&file)?;
            }
            outcome.published.push(file);

            // A dump that opens a fresh chain is publication zero of that
            // chain; the next chunk gets number one.
            if outcome.reset_incremental && request.create_incremental_chunks {
                properties.set_chunk_counter(properties.chunk_counter() + 1);
            }
        }

        properties.set(INDEX_ID, context.id());
        properties.store(&sidecar)?;
        properties.store(&target_properties)?;
        if request.create_checksum_files {
            write_checksum_files(&target_properties)?;
        }
        outcome.published.push(target_properties);

        Ok(outcome)
    }
}

fn validate_target_dir(target_dir: &Path) -> Result<()> {
    if target_dir.exists() {
        if !target_dir.is_dir() {
            return Err(IndexError::invalid(format!(
                "target path {} is not a directory",
                target_dir.display()
            )));
        }
        let readonly = fs::metadata(target_dir)?.permissions().readonly();
        if readonly {
            return Err(IndexError::invalid(format!(
                "target path {} is not writable",
                target_dir.display()
            )));
        }
    } else {
        fs::create_dir_all(target_dir).map_err(|e| {
            IndexError::invalid(format!("cannot create {}: {}", target_dir.display(), e))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_creates_missing_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("publish/nested");
        validate_target_dir(&target).unwrap();
        assert!(target.is_dir());
    }

    #[test]
    fn test_validate_rejects_file_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("occupied");
        std::fs::write(&target, b"x").unwrap();
        assert!(matches!(
            validate_target_dir(&target),
            Err(IndexError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_request_defaults() {
        let request = IndexPackingRequest::new("/tmp/out");
        assert_eq!(request.formats, vec![IndexFormat::V1]);
        assert!(!request.create_incremental_chunks);
        assert!(request.create_checksum_files);
        assert_eq!(request.max_index_chunks, 30);
    }
}
