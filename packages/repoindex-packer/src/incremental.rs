//! Incremental handler: decides whether a publication cycle can emit a
//! delta chunk, and keeps the descriptor's chunk bookkeeping.
//!
//! The contract mirrors a three-way answer:
//! - `None` — incremental state is unusable; the caller must reset it and
//!   regenerate from scratch;
//! - `Some(empty)` — nothing changed since the last publication, no chunk;
//! - `Some(addresses)` — emit exactly these documents as the next chunk.

use tantivy::DocAddress;
use tracing::{debug, warn};
use uuid::Uuid;

use repoindex_core::creator::creator_ids;
use repoindex_core::error::Result;
use repoindex_core::IndexingContext;

use crate::properties::{
    IndexProperties, INDEX_CHAIN_ID, INDEX_CHUNK_PREFIX, INDEX_CREATORS,
};

/// Lifecycle of the incremental state across publications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    /// No usable incremental state yet.
    Uninitialized,
    /// Chunks may be computed against the recorded chain.
    Ready,
    /// State was found inconsistent; a reset is required.
    Broken,
}

pub struct IncrementalHandler {
    state: HandlerState,
}

impl Default for IncrementalHandler {
    fn default() -> Self {
        IncrementalHandler::new()
    }
}

impl IncrementalHandler {
    pub fn new() -> IncrementalHandler {
        IncrementalHandler {
            state: HandlerState::Uninitialized,
        }
    }

    pub fn state(&self) -> HandlerState {
        self.state
    }

    /// Reset the incremental state: counter zero, a fresh chain id, and
    /// the live contributor set. Invalidates every previously published
    /// chunk from the clients' perspective.
    pub fn initialize_properties(
        &mut self,
        properties: &mut IndexProperties,
        context: &IndexingContext,
    ) {
        for (number, _) in properties.chunk_markers() {
            properties.remove(&format!("{}{}", INDEX_CHUNK_PREFIX, number));
        }
        properties.set_chunk_counter(0);
        properties.set(INDEX_CHAIN_ID, Uuid::new_v4().simple().to_string());
        properties.set(
            INDEX_CREATORS,
            creator_ids(context.index_creators()).join(","),
        );
        self.state = HandlerState::Ready;
        debug!(chain_id = properties.get(INDEX_CHAIN_ID), "initialized incremental state");
    }

    /// Compute the next chunk against the committed snapshot.
    pub fn compute_incremental(
        &mut self,
        context: &IndexingContext,
        searcher: &tantivy::Searcher,
        properties: &IndexProperties,
    ) -> Result<Option<Vec<DocAddress>>> {
        if properties.get(INDEX_CHAIN_ID).is_none() {
            warn!("descriptor has no chain id, forcing full regeneration");
            self.state = HandlerState::Broken;
            return Ok(None);
        }

        let recorded_creators = properties.get(INDEX_CREATORS).unwrap_or_default();
        let live_creators = creator_ids(context.index_creators()).join(",");
        if recorded_creators != live_creators {
            warn!(
                recorded = recorded_creators,
                live = %live_creators,
                "contributor set changed, forcing full regeneration"
            );
            self.state = HandlerState::Broken;
            return Ok(None);
        }

        let Some(last_published) = properties.timestamp_millis() else {
            debug!("descriptor has no publication timestamp yet");
            self.state = HandlerState::Broken;
            return Ok(None);
        };

        let context_timestamp = context.timestamp().unwrap_or(0);
        if context_timestamp < last_published {
            warn!(
                context_timestamp,
                last_published, "index commit is older than the last publication"
            );
            self.state = HandlerState::Broken;
            return Ok(None);
        }

        let mut changed = Vec::new();
        for (address, record) in context.live_records(searcher)? {
            if record.is_descriptor() {
                continue;
            }
            match record.last_modified() {
                Some(modified) if modified > last_published => changed.push(address),
                _ => {}
            }
        }

        debug!(changed = changed.len(), "computed incremental chunk");
        self.state = HandlerState::Ready;
        Ok(Some(changed))
    }

    /// Bookkeeping after a chunk file became durable: record the marker
    /// under the chunk's number, advance the counter by exactly one, and
    /// evict markers that fell out of the retained window.
    pub fn update_properties_after_chunk(
        &self,
        properties: &mut IndexProperties,
        max_index_chunks: u32,
    ) {
        let chunk_number = properties.chunk_counter();
        let chain_id = properties.get(INDEX_CHAIN_ID).unwrap_or_default().to_string();
        properties.set(format!("{}{}", INDEX_CHUNK_PREFIX, chunk_number), chain_id);
        properties.set_chunk_counter(chunk_number + 1);

        let markers = properties.chunk_markers();
        if markers.len() as u32 > max_index_chunks {
            let evict: Vec<u32> = markers
                .keys()
                .copied()
                .take(markers.len() - max_index_chunks as usize)
                .collect();
            for number in evict {
                properties.remove(&format!("{}{}", INDEX_CHUNK_PREFIX, number));
            }
        }
    }
}
