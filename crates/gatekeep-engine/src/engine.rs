//! Access decision engine.
//!
//! Turns a card presented at an access point into an ALLOW/DENY decision:
//!
//! 1. Resolve the access point to its type and controller.
//! 2. Resolve the card to identities, applying the [`AmbiguityPolicy`] when
//!    more than one identity holds it.
//! 3. Resolve the winning rule; no match means the default verdict.
//! 4. Append the [`DecisionRecord`] to the decision log.
//!
//! Every step that cannot produce an answer falls back to the configured
//! default verdict. `decide` never fails and never panics.

use std::fmt::Display;
use std::sync::Arc;

use gatekeep_types::{
    AccessPointId, AccessPointTypeId, Card, ControllerId, IdentityId, RuleId, Verdict,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::directory::Directory;
use crate::resolver::{self, Resolution};
use crate::sink::{AlertSink, DecisionLog, TracingAlertSink, TracingDecisionLog};
use crate::snapshot::{Snapshot, SnapshotHandle};
use crate::window::EventTime;

// ============================================================================
// Settings
// ============================================================================

/// How to decide when a card is held by several identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AmbiguityPolicy {
    /// Evaluate every holder; an ALLOW for any of them wins.
    AnyMatchGrants,
    /// Refuse to pick: the default verdict applies.
    #[default]
    RequireUnique,
    /// Evaluate only the holder with the lowest identity id.
    LowestIdentity,
}

impl Display for AmbiguityPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AnyMatchGrants => write!(f, "any-match-grants"),
            Self::RequireUnique => write!(f, "require-unique"),
            Self::LowestIdentity => write!(f, "lowest-identity"),
        }
    }
}

/// Engine behaviour that is not part of the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Verdict when nothing else decides.
    pub default_verdict: Verdict,
    pub ambiguity_policy: AmbiguityPolicy,
}

// ============================================================================
// Decision record
// ============================================================================

/// Why a decision came out the way it did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum DecisionReason {
    RuleMatched { rule: RuleId },
    NoMatchingRule,
    UnknownAccessPoint,
    LookupFailed { error: String },
    UnknownCard,
    AmbiguousCard { identities: Vec<IdentityId> },
}

impl Display for DecisionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RuleMatched { rule } => write!(f, "rule {rule} matched"),
            Self::NoMatchingRule => write!(f, "no rule matched; default verdict"),
            Self::UnknownAccessPoint => write!(f, "unknown access point; default verdict"),
            Self::LookupFailed { error } => write!(f, "lookup failed ({error}); default verdict"),
            Self::UnknownCard => write!(f, "unknown card; default verdict"),
            Self::AmbiguousCard { identities } => write!(
                f,
                "card held by {} identities; default verdict",
                identities.len()
            ),
        }
    }
}

/// One access decision. Written to the [`DecisionLog`] and returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionRecord {
    pub time: EventTime,
    pub controller_id: Option<ControllerId>,
    pub access_point: AccessPointId,
    pub card: Card,
    pub allowed: bool,
    pub verdict: Verdict,
    /// The identity whose rule decided, if any.
    pub identity: Option<IdentityId>,
    pub rule: Option<RuleId>,
    pub reason: DecisionReason,
    pub snapshot_version: u64,
}

struct Outcome {
    controller: Option<ControllerId>,
    verdict: Verdict,
    identity: Option<IdentityId>,
    rule: Option<RuleId>,
    reason: DecisionReason,
}

impl Outcome {
    fn fallback(
        settings: EngineSettings,
        controller: Option<ControllerId>,
        reason: DecisionReason,
    ) -> Self {
        Self {
            controller,
            verdict: settings.default_verdict,
            identity: None,
            rule: None,
            reason,
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Decides access requests against the active snapshot.
///
/// Cheap to share across threads; every call pins one snapshot version.
pub struct AccessDecisionEngine {
    snapshots: SnapshotHandle,
    settings: EngineSettings,
    /// When unset, the pinned snapshot answers lookups itself.
    directory: Option<Arc<dyn Directory>>,
    decision_log: Arc<dyn DecisionLog>,
    alerts: Arc<dyn AlertSink>,
}

impl std::fmt::Debug for AccessDecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessDecisionEngine")
            .field("snapshot_version", &self.snapshots.current().version())
            .field("settings", &self.settings)
            .field("external_directory", &self.directory.is_some())
            .finish_non_exhaustive()
    }
}

impl AccessDecisionEngine {
    /// Creates an engine that logs decisions and alerts through `tracing`.
    pub fn new(snapshots: SnapshotHandle, settings: EngineSettings) -> Self {
        Self {
            snapshots,
            settings,
            directory: None,
            decision_log: Arc::new(TracingDecisionLog),
            alerts: Arc::new(TracingAlertSink),
        }
    }

    /// Uses an external directory instead of the snapshot's own tables.
    pub fn with_directory(mut self, directory: Arc<dyn Directory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn with_decision_log(mut self, log: Arc<dyn DecisionLog>) -> Self {
        self.decision_log = log;
        self
    }

    pub fn with_alert_sink(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn snapshots(&self) -> &SnapshotHandle {
        &self.snapshots
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    /// Decides whether `card` may pass `access_point` at `time`.
    pub fn decide(
        &self,
        card: &Card,
        access_point: AccessPointId,
        time: EventTime,
    ) -> DecisionRecord {
        let snapshot = self.snapshots.current();
        let directory: &dyn Directory = match &self.directory {
            Some(external) => external.as_ref(),
            None => snapshot.as_ref(),
        };

        let outcome = self.evaluate(&snapshot, directory, card, access_point, &time);

        let record = DecisionRecord {
            time,
            controller_id: outcome.controller,
            access_point,
            card: card.clone(),
            allowed: outcome.verdict.is_allow(),
            verdict: outcome.verdict,
            identity: outcome.identity,
            rule: outcome.rule,
            reason: outcome.reason,
            snapshot_version: snapshot.version(),
        };
        self.decision_log.append(&record);
        record
    }

    fn evaluate(
        &self,
        snapshot: &Snapshot,
        directory: &dyn Directory,
        card: &Card,
        access_point: AccessPointId,
        time: &EventTime,
    ) -> Outcome {
        let binding = match directory.access_point(access_point) {
            Ok(Some(binding)) => binding,
            Ok(None) => {
                debug!(access_point = %access_point, "Unknown access point");
                return Outcome::fallback(self.settings, None, DecisionReason::UnknownAccessPoint);
            }
            Err(e) => {
                warn!(access_point = %access_point, error = %e, "Access point lookup failed");
                return Outcome::fallback(
                    self.settings,
                    None,
                    DecisionReason::LookupFailed { error: e.to_string() },
                );
            }
        };
        let controller = binding.controller;

        let holders = match directory.identities_for_card(card) {
            Ok(holders) => holders,
            Err(e) => {
                warn!(card = %card, error = %e, "Card lookup failed");
                return Outcome::fallback(
                    self.settings,
                    controller,
                    DecisionReason::LookupFailed { error: e.to_string() },
                );
            }
        };

        let candidates: Vec<IdentityId> = match holders.as_slice() {
            [] => {
                debug!(card = %card, "Unknown card");
                return Outcome::fallback(self.settings, controller, DecisionReason::UnknownCard);
            }
            [single] => vec![*single],
            several => {
                warn!(
                    card = %card,
                    identities = ?several.iter().map(|id| u64::from(*id)).collect::<Vec<_>>(),
                    policy = %self.settings.ambiguity_policy,
                    "Ambiguous identity: card held by several identities"
                );
                match self.settings.ambiguity_policy {
                    AmbiguityPolicy::RequireUnique => {
                        return Outcome::fallback(
                            self.settings,
                            controller,
                            DecisionReason::AmbiguousCard {
                                identities: several.to_vec(),
                            },
                        );
                    }
                    AmbiguityPolicy::LowestIdentity => {
                        several.iter().min().copied().into_iter().collect()
                    }
                    AmbiguityPolicy::AnyMatchGrants => several.to_vec(),
                }
            }
        };

        self.resolve_candidates(snapshot, binding.access_point_type, controller, &candidates, time)
    }

    /// Resolves every candidate; an ALLOW wins, otherwise the first DENY.
    fn resolve_candidates(
        &self,
        snapshot: &Snapshot,
        access_point_type: AccessPointTypeId,
        controller: Option<ControllerId>,
        candidates: &[IdentityId],
        time: &EventTime,
    ) -> Outcome {
        let mut denial = None;

        for &identity in candidates {
            let resolution = resolver::resolve(
                snapshot,
                access_point_type,
                identity,
                time,
                self.alerts.as_ref(),
            );
            if let Resolution::Matched { rule, verdict } = resolution {
                let outcome = Outcome {
                    controller,
                    verdict,
                    identity: Some(identity),
                    rule: Some(rule),
                    reason: DecisionReason::RuleMatched { rule },
                };
                if verdict.is_allow() {
                    return outcome;
                }
                denial.get_or_insert(outcome);
            }
        }

        denial.unwrap_or_else(|| {
            Outcome::fallback(self.settings, controller, DecisionReason::NoMatchingRule)
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
