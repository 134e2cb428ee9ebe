//! Stale trigger detection.
//!
//! A record can legitimately sit in `triggered` for as long as the pipeline
//! runs, but a record that stays there past a generous threshold usually
//! means either the start action failed after the state write or the
//! pipeline's completion callback was lost. Both need an operator decision:
//! retrying blindly could double-start a pipeline whose callback merely went
//! missing. This monitor therefore only reports; it never mutates state.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::StatusDocument;
use crate::state_machine::BatchState;

/// One record that has been `triggered` longer than the threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaleTrigger {
    pub project_key: String,
    pub batch_id: String,
    pub triggered_at: DateTime<Utc>,
    /// Whole seconds since the trigger write
    pub age_seconds: i64,
}

/// Read-only scan for triggered-but-silent records.
pub struct StaleTriggerMonitor {
    threshold: Duration,
}

impl StaleTriggerMonitor {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    /// Records `triggered` for longer than the threshold as of `now`,
    /// oldest first. A `triggered` record without a `triggered_at`
    /// timestamp cannot happen through this crate's writers and is reported
    /// immediately as stale with zero age.
    pub fn scan(&self, document: &StatusDocument, now: DateTime<Utc>) -> Vec<StaleTrigger> {
        let mut stale: Vec<StaleTrigger> = document
            .projects
            .values()
            .filter(|record| record.status == BatchState::Triggered)
            .filter_map(|record| {
                let Some(triggered_at) = record.triggered_at else {
                    return Some(StaleTrigger {
                        project_key: record.project_key.clone(),
                        batch_id: record.batch_id.clone(),
                        triggered_at: now,
                        age_seconds: 0,
                    });
                };
                let age = now - triggered_at;
                (age >= self.threshold).then(|| StaleTrigger {
                    project_key: record.project_key.clone(),
                    batch_id: record.batch_id.clone(),
                    triggered_at,
                    age_seconds: age.num_seconds(),
                })
            })
            .collect();
        stale.sort_by_key(|s| s.triggered_at);
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BatchRecord, BatchType};
    use crate::state_machine::BatchEvent;

    fn triggered_record(key: &str, batch_id: &str, triggered_at: DateTime<Utc>) -> BatchRecord {
        let mut record = BatchRecord::new(
            key,
            batch_id,
            BatchType::PromptGeneration,
            format!("output/{key}"),
            "claude",
            triggered_at - Duration::hours(1),
        );
        record
            .apply(&BatchEvent::MarkCompleted, triggered_at)
            .unwrap();
        record.apply(&BatchEvent::Trigger, triggered_at).unwrap();
        record
    }

    #[test]
    fn test_scan_reports_only_past_threshold() {
        let now = Utc::now();
        let mut document = StatusDocument::new();
        document
            .insert_new(triggered_record("old", "b1", now - Duration::hours(8)))
            .unwrap();
        document
            .insert_new(triggered_record("fresh", "b2", now - Duration::minutes(10)))
            .unwrap();

        let monitor = StaleTriggerMonitor::new(Duration::hours(6));
        let stale = monitor.scan(&document, now);
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].project_key, "old");
        assert!(stale[0].age_seconds >= 8 * 3600);
    }

    #[test]
    fn test_scan_ignores_other_states() {
        let now = Utc::now();
        let mut document = StatusDocument::new();
        document
            .insert_new(BatchRecord::new(
                "ep1",
                "b1",
                BatchType::PromptGeneration,
                "output/ep1",
                "claude",
                now - Duration::days(7),
            ))
            .unwrap();
        let mut done = triggered_record("ep2", "b2", now - Duration::days(7));
        done.apply(&BatchEvent::ReportDone, now - Duration::days(6))
            .unwrap();
        document.insert_new(done).unwrap();

        let monitor = StaleTriggerMonitor::new(Duration::hours(6));
        assert!(monitor.scan(&document, now).is_empty());
    }

    #[test]
    fn test_scan_orders_oldest_first() {
        let now = Utc::now();
        let mut document = StatusDocument::new();
        document
            .insert_new(triggered_record("mid", "b1", now - Duration::hours(10)))
            .unwrap();
        document
            .insert_new(triggered_record("oldest", "b2", now - Duration::hours(20)))
            .unwrap();

        let monitor = StaleTriggerMonitor::new(Duration::hours(6));
        let stale = monitor.scan(&document, now);
        assert_eq!(stale[0].project_key, "oldest");
        assert_eq!(stale[1].project_key, "mid");
    }
}
