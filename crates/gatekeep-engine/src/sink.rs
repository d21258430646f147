//! Output sinks: the decision log and configuration alerts.

use std::sync::{Mutex, PoisonError};

use tracing::{error, info, warn};

use crate::engine::DecisionRecord;
use crate::error::ConfigurationError;

// ============================================================================
// Decision log
// ============================================================================

/// Append-only destination for decision records.
pub trait DecisionLog: Send + Sync {
    fn append(&self, record: &DecisionRecord);
}

/// Emits one structured `tracing` event per decision.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDecisionLog;

impl DecisionLog for TracingDecisionLog {
    fn append(&self, record: &DecisionRecord) {
        let rule = record.rule.map(u64::from);
        if record.allowed {
            info!(
                card = %record.card,
                access_point = %record.access_point,
                controller = ?record.controller_id.map(u64::from),
                rule = ?rule,
                snapshot = record.snapshot_version,
                reason = %record.reason,
                "Access granted"
            );
        } else {
            warn!(
                card = %record.card,
                access_point = %record.access_point,
                controller = ?record.controller_id.map(u64::from),
                rule = ?rule,
                snapshot = record.snapshot_version,
                reason = %record.reason,
                "Access denied"
            );
        }
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemoryDecisionLog {
    records: Mutex<Vec<DecisionRecord>>,
}

impl MemoryDecisionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything appended so far.
    pub fn records(&self) -> Vec<DecisionRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DecisionLog for MemoryDecisionLog {
    fn append(&self, record: &DecisionRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
    }
}

// ============================================================================
// Alerts
// ============================================================================

/// Receives configuration problems hit while evaluating.
pub trait AlertSink: Send + Sync {
    fn alert(&self, error: &ConfigurationError);
}

/// Logs alerts at `error` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn alert(&self, error: &ConfigurationError) {
        error!(error = %error, "Configuration error");
    }
}

/// Collects alerts in memory.
#[derive(Debug, Default)]
pub struct MemoryAlertSink {
    alerts: Mutex<Vec<ConfigurationError>>,
}

impl MemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<ConfigurationError> {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AlertSink for MemoryAlertSink {
    fn alert(&self, error: &ConfigurationError) {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error.clone());
    }
}
