//! Publication-set packer for the artifact repository index.
//!
//! # Architecture
//!
//! ```text
//! IndexingContext (committed snapshot)
//!        │
//!        ├─ IncrementalHandler ──► <prefix>.<n>.gz   (delta chunks)
//!        ├─ IndexDataWriter ─────► <prefix>.gz       (v1 full dump)
//!        ├─ legacy writer ───────► <prefix>.zip      (legacy archive)
//!        └─ IndexProperties ─────► <prefix>.properties
//!                                   + .sha1 / .md5 siblings
//! ```
//!
//! Clients download the full dump once, then resume from the descriptor
//! and pull only chunks. The chain id ties a chunk sequence together;
//! resetting it tells clients to start over from the dump.

pub mod data;
pub mod digest;
mod fsutil;
pub mod incremental;
pub mod legacy;
pub mod packer;
pub mod properties;

pub use data::{IndexDataHeader, IndexDataReader, IndexDataWriter, DATA_FORMAT_VERSION};
pub use digest::{md5_hex, sha1_hex, write_checksum_files};
pub use incremental::{HandlerState, IncrementalHandler};
pub use legacy::write_index_archive;
pub use packer::{IndexFormat, IndexPacker, IndexPackingRequest, PackOutcome};
pub use properties::{
    format_timestamp, parse_timestamp, IndexProperties, INDEX_CHAIN_ID, INDEX_CHUNK_COUNTER,
    INDEX_CHUNK_PREFIX, INDEX_CREATORS, INDEX_FILE_PREFIX, INDEX_ID, INDEX_LEGACY_TIMESTAMP,
    INDEX_PACKER_PROPERTIES_FILE, INDEX_REMOTE_PROPERTIES_FILE, INDEX_TIMESTAMP,
};
