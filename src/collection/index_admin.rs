use super::core::Collection;
use crate::errors::DbError;
use crate::index::{IndexAck, IndexDescriptor, IndexSpec};

impl Collection {
    // --- Index admin helpers ---

    /// Create an index and build it from the current documents. Creating an index that
    /// already exists with the same keys is acknowledged without rebuilding.
    ///
    /// # Errors
    /// Propagates `InvalidArgument` / `IndexConflict` from the index manager.
    pub fn create_index(&self, spec: &IndexSpec) -> Result<IndexAck, DbError> {
        let _wguard = self.build_lock.write();
        let docs = self.docs.read();
        let mut mgr = self.indexes.write();
        let ack = mgr.create_index(spec)?;
        if !ack.created {
            log::debug!("index {} already present on {}", ack.name, self.name);
            return Ok(ack);
        }
        // offline build: populate from the current documents
        let start = std::time::Instant::now();
        if let Some(idx) = mgr.get_mut(&ack.name) {
            for doc in docs.by_seq.values() {
                idx.insert(&doc.data, &doc.id);
            }
            idx.stats.build_time_ms =
                u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
            log::info!(
                "built index {} on {} ({} entries, {} ms)",
                ack.name,
                self.name,
                idx.stats.entries,
                idx.stats.build_time_ms
            );
        }
        Ok(ack)
    }

    #[must_use]
    pub fn list_indexes(&self) -> Vec<IndexDescriptor> {
        let count = self.len();
        self.indexes.read().descriptors(count)
    }

    #[must_use]
    pub fn index_specs(&self) -> Vec<IndexSpec> {
        self.indexes.read().specs()
    }
}
