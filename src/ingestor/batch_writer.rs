//! Sequential, chunked persistence of transformed records

use tracing::{error, info};

use crate::errors::{ImportError, ImportResult};
use crate::models::OperationRecord;
use crate::repositories::OperationStore;

/// Commits records in atomic groups, one group at a time
///
/// A failed group stops the job. Groups committed before it stay committed.
pub struct BatchWriter<'a> {
    store: &'a dyn OperationStore,
    group_size: usize,
}

impl<'a> BatchWriter<'a> {
    /// Group size is the configured size capped by what the store accepts
    pub fn new(store: &'a dyn OperationStore, configured_group_size: usize) -> Self {
        let group_size = configured_group_size
            .min(store.max_write_group_size())
            .max(1);
        Self { store, group_size }
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    /// Write every record; returns the number created
    pub async fn write_all(&self, records: &[OperationRecord]) -> ImportResult<usize> {
        let total_groups = records.len().div_ceil(self.group_size);
        let mut committed = 0;

        for (chunk_index, chunk) in records.chunks(self.group_size).enumerate() {
            match self.store.commit_group(chunk).await {
                Ok(written) => {
                    committed += written;
                    info!(
                        "Committed write group {}/{} ({} records, {} total)",
                        chunk_index + 1,
                        total_groups,
                        written,
                        committed
                    );
                }
                Err(e) => {
                    error!(
                        "Write group {}/{} failed after {} records were committed: {}",
                        chunk_index + 1,
                        total_groups,
                        committed,
                        e
                    );
                    return Err(ImportError::ChunkCommitFailed {
                        chunk_index,
                        committed,
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok(committed)
    }
}
