//! Archive seam for completed audits.

use penny_core::report::AuditRecord;

/// Receives every successfully parsed audit.
///
/// The orchestrator constructs the record and hands it off; where it
/// lands (device storage, sync queue) is the host's concern. Persistence
/// is best-effort, so the trait is infallible and implementations log
/// their own failures.
pub trait AuditSink: Send + Sync {
    /// Archive one completed audit.
    fn persist(&self, record: &AuditRecord);
}

/// Keeps records in memory. Used by tests and by hosts that read the
/// outcome from the handle instead of an archive.
#[derive(Default)]
pub struct MemorySink {
    records: parking_lot::Mutex<Vec<AuditRecord>>,
}

impl MemorySink {
    /// Everything persisted so far, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }
}

impl AuditSink for MemorySink {
    fn persist(&self, record: &AuditRecord) {
        self.records.lock().push(record.clone());
    }
}
