//! Rule resolution.
//!
//! Scans the rules of one access point type from highest to lowest priority
//! and returns the first one whose time window and identity expression both
//! accept the event. Quarantined rules are skipped and reported.

use gatekeep_types::{AccessPointTypeId, IdentityId, RuleId, Verdict};
use serde::Serialize;
use tracing::{debug, trace};

use crate::sink::AlertSink;
use crate::snapshot::{CompiledRule, Snapshot};
use crate::window::{self, EventTime};

/// Outcome of scanning the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "outcome")]
pub enum Resolution {
    Matched { rule: RuleId, verdict: Verdict },
    NoMatch,
}

impl Resolution {
    pub fn verdict(&self) -> Option<Verdict> {
        match self {
            Self::Matched { verdict, .. } => Some(*verdict),
            Self::NoMatch => None,
        }
    }

    pub fn rule(&self) -> Option<RuleId> {
        match self {
            Self::Matched { rule, .. } => Some(*rule),
            Self::NoMatch => None,
        }
    }
}

/// Finds the winning rule for `identity` at an access point of the given type.
pub fn resolve(
    snapshot: &Snapshot,
    access_point_type: AccessPointTypeId,
    identity: IdentityId,
    time: &EventTime,
    alerts: &dyn AlertSink,
) -> Resolution {
    for compiled in snapshot.rules_for(access_point_type) {
        if let Some(defect) = compiled.defect() {
            alerts.alert(defect);
            continue;
        }

        if !window_passes(compiled, time) {
            trace!(rule = %compiled.rule.id, "Time window rejected");
            continue;
        }

        match snapshot.expressions().matches(compiled.rule.expression, identity) {
            Ok(true) => {
                debug!(
                    rule = %compiled.rule.id,
                    identity = %identity,
                    priority = compiled.rule.priority,
                    verdict = %compiled.rule.verdict,
                    "Rule matched"
                );
                return Resolution::Matched {
                    rule: compiled.rule.id,
                    verdict: compiled.rule.verdict,
                };
            }
            Ok(false) => {
                trace!(
                    rule = %compiled.rule.id,
                    identity = %identity,
                    "Identity not in expression"
                );
            }
            Err(e) => alerts.alert(&e),
        }
    }

    Resolution::NoMatch
}

/// A rule without a time spec covers exactly the events of unknown time.
fn window_passes(compiled: &CompiledRule, time: &EventTime) -> bool {
    match time {
        EventTime::Unknown => compiled.time_spec.is_none(),
        EventTime::Known(instant) => {
            compiled.time_spec.is_some() && window::matches(compiled.time_spec.as_ref(), instant)
        }
    }
}
