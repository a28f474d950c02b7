use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::routing_log::RoutingLogEntry;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("routing log write failed: {0}")]
pub struct LoggingFailure(pub String);

/// Append-only sink for routing decisions. Entries are never updated once written.
#[async_trait]
pub trait AuditLogger: Send + Sync {
    async fn record(&self, entry: RoutingLogEntry) -> Result<(), LoggingFailure>;
}

#[derive(Clone, Default)]
pub struct InMemoryAuditLogger {
    entries: Arc<Mutex<Vec<RoutingLogEntry>>>,
    reject_writes: Arc<AtomicBool>,
}

impl InMemoryAuditLogger {
    pub fn entries(&self) -> Vec<RoutingLogEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Makes subsequent writes fail, to exercise audit-gap handling.
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuditLogger for InMemoryAuditLogger {
    async fn record(&self, entry: RoutingLogEntry) -> Result<(), LoggingFailure> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(LoggingFailure("in-memory audit log is rejecting writes".to_string()));
        }

        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
        Ok(())
    }
}
