//! Audit storage backends
//!
//! The contract is append and read. No backend exposes update or delete.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;
use crate::event::{AuditEvent, AuditFilter};

/// Append-only audit storage.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append one event.
    async fn append(&self, event: AuditEvent) -> Result<()>;

    /// Every event in append order.
    async fn all(&self) -> Result<Vec<AuditEvent>>;

    /// Events matching `filter`, in append order, before sorting and limits.
    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>> {
        Ok(self
            .all()
            .await?
            .into_iter()
            .filter(|event| filter.matches(event))
            .collect())
    }
}

/// In-memory audit store (for testing and single-process deployments).
pub struct InMemoryAuditStore {
    events: RwLock<Vec<AuditEvent>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl Default for InMemoryAuditStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, event: AuditEvent) -> Result<()> {
        self.events.write().push(event);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<AuditEvent>> {
        Ok(self.events.read().clone())
    }

    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>> {
        Ok(self
            .events
            .read()
            .iter()
            .filter(|event| filter.matches(event))
            .cloned()
            .collect())
    }
}
