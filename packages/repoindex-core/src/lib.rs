//! Artifact repository indexing core.
//!
//! # Architecture
//!
//! ```text
//! Scanner ─► ArtifactContext ─► IndexCreators ─► Record
//!                                                  │
//!                                          IndexingContext
//!                                       (tantivy + timestamp)
//! ```
//!
//! The scanner walks a repository tree and produces one [`ArtifactContext`]
//! per coordinate. An ordered registry of [`IndexCreator`]s enriches each
//! artifact and projects it into a typed [`Record`], which the
//! [`IndexingContext`] upserts by UINFO into a durable tantivy index under
//! a single-writer, many-readers discipline. Publication of the committed
//! state (full dumps, incremental chunks, legacy archives) lives in the
//! `repoindex-packer` crate.

pub mod artifact;
pub mod context;
pub mod coordinate;
pub mod creator;
pub mod error;
pub mod pom;
pub mod record;
pub mod scanner;

pub use artifact::{current_time_millis, ArtifactContext, ArtifactInfo};
pub use context::{IndexingContext, SchemaFields, TIMESTAMP_FILE};
pub use coordinate::{base_version_of, Coordinate};
pub use creator::{
    creator_ids, default_creators, IndexCreator, JarEntriesCreator, LegacyRecordUpdater,
    MinimalArtifactInfoCreator,
};
pub use error::{IndexError, Result};
pub use pom::PomModel;
pub use record::{descriptor_record, FieldDef, FieldFlags, Record, RecordEntry};
pub use scanner::{ArtifactScanningListener, DefaultScannerListener, Scanner, ScanningResult};
