//! Audit plumbing for metadata changes.
//!
//! Every successful mutation produces one [`MetadataChange`] describing the
//! pre-state and the exact delta. Publishing is best-effort: the store logs
//! sink failures and never fails the originating mutation.

use metacat_common::MetadataRecord;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// One audited mutation: the full previous record plus what was added and
/// what was removed. Unchanged pairs appear in neither delta.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataChange {
    pub previous: MetadataRecord,
    pub additions: MetadataRecord,
    pub deletions: MetadataRecord,
}

/// Error type for audit publishing.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

/// Destination for metadata change records.
pub trait AuditSink: Send + Sync {
    fn publish(&self, change: MetadataChange) -> Result<(), AuditError>;
}

/// Sink that buffers changes in memory, for embedders and tests.
#[derive(Default)]
pub struct InMemoryAuditSink {
    changes: Mutex<Vec<MetadataChange>>,
}

impl InMemoryAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains and returns everything published so far, oldest first.
    pub fn drain(&self) -> Vec<MetadataChange> {
        std::mem::take(&mut *self.changes.lock())
    }

    pub fn len(&self) -> usize {
        self.changes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.lock().is_empty()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn publish(&self, change: MetadataChange) -> Result<(), AuditError> {
        self.changes.lock().push(change);
        Ok(())
    }
}
