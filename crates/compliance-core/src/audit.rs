//! Append-only audit sink
//!
//! Every pipeline mutation writes an entry: rule create/update/activate/
//! deactivate, document checks, content generation, approval decisions.

use async_trait::async_trait;
use compliance_types::AuditLogEntry;
use tokio::sync::RwLock;

#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one entry. Never mutates or deletes prior entries.
    async fn log(&self, entry: AuditLogEntry);

    async fn entries(&self) -> Vec<AuditLogEntry>;
}

/// In-memory audit sink retaining entries for inspection
#[derive(Default)]
pub struct MemoryAuditSink {
    entries: RwLock<Vec<AuditLogEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn log(&self, entry: AuditLogEntry) {
        tracing::info!(
            action = %entry.action_type,
            actor = %entry.actor_id,
            resource = ?entry.resource_id,
            "audit"
        );
        self.entries.write().await.push(entry);
    }

    async fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries.read().await.clone()
    }
}
