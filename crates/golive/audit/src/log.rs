//! Audit log facade

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{AuditError, Result};
use crate::event::{AuditAction, AuditEvent, AuditFilter};
use crate::store::{AuditStore, InMemoryAuditStore};

/// Counts over a rolling window, recomputed from the log on every call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub window_hours: u32,
    pub since: DateTime<Utc>,
    pub total_events: usize,
    pub successful_events: usize,
    pub failed_events: usize,
    pub by_action: BTreeMap<String, usize>,
}

/// Audit log
#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn AuditStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Audit log backed by a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryAuditStore::new()))
    }

    /// Append an event. Store failures propagate unchanged.
    #[instrument(skip(self, action, description), fields(action = %action))]
    pub async fn log_audit_event(
        &self,
        action: AuditAction,
        description: impl Into<String>,
        actor: &str,
        success: bool,
    ) -> Result<AuditEvent> {
        let event = AuditEvent::new(action, description, actor, success);

        if let Err(e) = self.store.append(event.clone()).await {
            warn!(action = %event.action, error = %e, "Failed to append audit event");
            return Err(e);
        }

        debug!(
            event_id = %event.id,
            action = %event.action,
            actor = %event.actor,
            success = event.success,
            "Audit event recorded"
        );

        Ok(event)
    }

    /// Matching events, newest first.
    pub async fn get_audit_log(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>> {
        if let (Some(since), Some(until)) = (filter.since, filter.until) {
            if since > until {
                return Err(AuditError::InvalidFilter(format!(
                    "since ({since}) is after until ({until})"
                )));
            }
        }

        let mut events = self.store.query(filter).await?;

        // Newest first; append order breaks timestamp ties
        events.reverse();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        if let Some(limit) = filter.limit {
            events.truncate(limit);
        }

        Ok(events)
    }

    /// Totals over the last `window_hours` hours. A window reaching past the
    /// earliest representable time covers the whole log.
    pub async fn get_activity_summary(&self, window_hours: u32) -> Result<ActivitySummary> {
        let since = Utc::now()
            .checked_sub_signed(Duration::hours(i64::from(window_hours)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let filter = AuditFilter {
            since: Some(since),
            ..AuditFilter::default()
        };
        let events = self.store.query(&filter).await?;

        let mut by_action: BTreeMap<String, usize> = BTreeMap::new();
        let mut successful_events = 0;
        for event in &events {
            *by_action.entry(event.action.to_string()).or_insert(0) += 1;
            if event.success {
                successful_events += 1;
            }
        }

        Ok(ActivitySummary {
            window_hours,
            since,
            total_events: events.len(),
            successful_events,
            failed_events: events.len() - successful_events,
            by_action,
        })
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_filter_by_action() {
        let log = AuditLog::in_memory();
        log.log_audit_event(AuditAction::PlanCreated, "plan created", "alice", true)
            .await
            .unwrap();
        log.log_audit_event(AuditAction::ExecutionStarted, "execution started", "alice", true)
            .await
            .unwrap();
        log.log_audit_event(AuditAction::ExecutionFailed, "step 3 failed", "alice", false)
            .await
            .unwrap();

        let started = log
            .get_audit_log(&AuditFilter::action(AuditAction::ExecutionStarted))
            .await
            .unwrap();
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].description, "execution started");
    }

    #[tokio::test]
    async fn test_newest_first_and_limit() {
        let log = AuditLog::in_memory();
        for i in 0..5 {
            log.log_audit_event(AuditAction::Custom("note".into()), format!("note {i}"), "ops", true)
                .await
                .unwrap();
        }

        let events = log
            .get_audit_log(&AuditFilter::default().with_limit(2))
            .await
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].description, "note 4");
        assert_eq!(events[1].description, "note 3");
    }

    #[tokio::test]
    async fn test_invalid_window_rejected() {
        let log = AuditLog::in_memory();
        let now = Utc::now();
        let filter = AuditFilter {
            since: Some(now),
            until: Some(now - Duration::hours(1)),
            ..AuditFilter::default()
        };
        assert!(matches!(
            log.get_audit_log(&filter).await,
            Err(AuditError::InvalidFilter(_))
        ));
    }

    #[tokio::test]
    async fn test_activity_summary() {
        let log = AuditLog::in_memory();
        log.log_audit_event(AuditAction::PlanApproved, "approved", "bob", true)
            .await
            .unwrap();
        log.log_audit_event(AuditAction::ExecutionFailed, "failed", "bob", false)
            .await
            .unwrap();
        log.log_audit_event(AuditAction::ExecutionFailed, "failed again", "bob", false)
            .await
            .unwrap();

        let summary = log.get_activity_summary(24).await.unwrap();
        assert_eq!(summary.total_events, 3);
        assert_eq!(summary.successful_events, 1);
        assert_eq!(summary.failed_events, 2);
        assert_eq!(summary.by_action.get("execution_failed"), Some(&2));
    }

    #[tokio::test]
    async fn test_activity_summary_with_unbounded_window() {
        let log = AuditLog::in_memory();
        log.log_audit_event(AuditAction::PlanCreated, "created", "alice", true)
            .await
            .unwrap();

        let summary = log.get_activity_summary(u32::MAX).await.unwrap();
        assert_eq!(summary.window_hours, u32::MAX);
        assert_eq!(summary.since, DateTime::<Utc>::MIN_UTC);
        assert_eq!(summary.total_events, 1);
    }

    proptest! {
        #[test]
        fn prop_reads_never_alter_past_entries(outcomes in prop::collection::vec(any::<bool>(), 1..20)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let log = AuditLog::in_memory();
                let mut written = Vec::new();
                for (i, success) in outcomes.iter().enumerate() {
                    let event = log
                        .log_audit_event(AuditAction::StepApplied, format!("step {i}"), "exec", *success)
                        .await
                        .unwrap();
                    written.push(event);
                }

                // Reading, filtering and summarizing leave every entry intact
                let _ = log.get_audit_log(&AuditFilter::default().with_limit(1)).await.unwrap();
                let _ = log.get_activity_summary(1).await.unwrap();

                let mut stored = log.get_audit_log(&AuditFilter::default()).await.unwrap();
                stored.reverse();
                assert_eq!(stored, written);
            });
        }
    }
}
