//! Immutable, versioned configuration snapshots.
//!
//! [`Snapshot::compile`] turns raw [`SnapshotData`] into indexed, validated
//! tables. It never fails: every defect becomes a [`ConfigurationError`] in
//! [`Snapshot::diagnostics`] and quarantines only the item it describes.
//!
//! [`SnapshotHandle`] publishes the active snapshot. Readers clone an
//! `Arc<Snapshot>` and keep it for the whole evaluation, so an install
//! between two evaluations never changes the data under a running one.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::IpAddr;
use std::sync::{Arc, PoisonError, RwLock};

use gatekeep_types::{
    AccessPointId, AccessPointTypeId, Card, ControllerId, ExpressionId, IdentityId, RuleId,
    TimeSpecId,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::directory::{AccessPointBinding, Directory};
use crate::error::{ConfigurationError, LookupError, SourceError};
use crate::expression::{ExpressionGraph, IdentitySet};
use crate::model::{AccessPoint, AccessPointType, Controller, Identity, Rule, SnapshotData};
use crate::source::SnapshotSource;
use crate::window::TimeSpecification;

// ============================================================================
// Compiled rules
// ============================================================================

/// A rule with its time specification resolved.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: Rule,
    pub time_spec: Option<TimeSpecification>,
    defect: Option<ConfigurationError>,
}

impl CompiledRule {
    /// Returns the reason this rule is quarantined, if it is.
    pub fn defect(&self) -> Option<&ConfigurationError> {
        self.defect.as_ref()
    }

    pub fn is_usable(&self) -> bool {
        self.defect.is_none()
    }
}

/// Entity counts, for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotCounts {
    pub access_point_types: usize,
    pub controllers: usize,
    pub access_points: usize,
    pub identities: usize,
    pub expressions: usize,
    pub time_specs: usize,
    pub rules: usize,
}

// ============================================================================
// Snapshot
// ============================================================================

/// One validated version of the access configuration.
#[derive(Debug, Default)]
pub struct Snapshot {
    version: u64,
    access_point_types: HashMap<AccessPointTypeId, AccessPointType>,
    controllers: HashMap<ControllerId, Controller>,
    /// Only access points that passed validation.
    access_points: HashMap<AccessPointId, AccessPoint>,
    identities: HashMap<IdentityId, Identity>,
    cards: HashMap<Card, Vec<IdentityId>>,
    expressions: ExpressionGraph,
    time_specs: usize,
    /// Per type, sorted by priority descending then rule id.
    rules: HashMap<AccessPointTypeId, Vec<CompiledRule>>,
    rule_count: usize,
    diagnostics: Vec<ConfigurationError>,
}

impl Snapshot {
    /// A snapshot with no entities. Every decision falls to the default.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validates and indexes `data`.
    pub fn compile(data: SnapshotData) -> Self {
        let SnapshotData {
            version,
            access_point_types,
            controllers,
            access_points,
            identities,
            expressions,
            time_specs,
            rules,
        } = data;

        let mut diagnostics = Vec::new();

        let access_point_types: HashMap<AccessPointTypeId, _> = index_unique(
            access_point_types,
            |t| t.id.into(),
            "access point type",
            &mut diagnostics,
        );
        let controllers: HashMap<ControllerId, _> =
            index_unique(controllers, |c| c.id.into(), "controller", &mut diagnostics);
        let identities: HashMap<IdentityId, _> =
            index_unique(identities, |i| i.id.into(), "identity", &mut diagnostics);

        let access_points = validate_access_points(
            access_points,
            &access_point_types,
            &controllers,
            &mut diagnostics,
        );

        let mut cards: HashMap<Card, Vec<IdentityId>> = HashMap::new();
        for identity in identities.values() {
            cards.entry(identity.card.clone()).or_default().push(identity.id);
        }
        for holders in cards.values_mut() {
            holders.sort_unstable();
        }

        let known_identities: HashSet<IdentityId> = identities.keys().copied().collect();
        let (expressions, expression_errors) =
            ExpressionGraph::build(expressions, &known_identities);
        diagnostics.extend(expression_errors);

        let mut compiled_specs: HashMap<TimeSpecId, Result<TimeSpecification, ConfigurationError>> =
            HashMap::with_capacity(time_specs.len());
        for row in &time_specs {
            if compiled_specs.contains_key(&row.id) {
                diagnostics.push(ConfigurationError::DuplicateId {
                    kind: "time spec",
                    id: row.id.into(),
                });
                continue;
            }
            let spec = TimeSpecification::from_row(row);
            if let Err(e) = &spec {
                diagnostics.push(e.clone());
            }
            compiled_specs.insert(row.id, spec);
        }

        let rule_count = rules.len();
        let rules = compile_rules(
            rules,
            &access_point_types,
            &compiled_specs,
            &expressions,
            &mut diagnostics,
        );

        for error in &diagnostics {
            error!(snapshot = version, error = %error, "Configuration error");
        }

        let shared = cards.values().filter(|holders| holders.len() > 1).count();
        if shared > 0 {
            warn!(
                snapshot = version,
                shared_cards = shared,
                "Cards held by more than one identity"
            );
        }

        info!(
            snapshot = version,
            access_points = access_points.len(),
            identities = identities.len(),
            expressions = expressions.len(),
            rules = rule_count,
            diagnostics = diagnostics.len(),
            "Compiled snapshot"
        );

        Self {
            version,
            access_point_types,
            controllers,
            access_points,
            identities,
            cards,
            expressions,
            time_specs: compiled_specs.len(),
            rules,
            rule_count,
            diagnostics,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Every configuration error found at compile time.
    pub fn diagnostics(&self) -> &[ConfigurationError] {
        &self.diagnostics
    }

    pub fn counts(&self) -> SnapshotCounts {
        SnapshotCounts {
            access_point_types: self.access_point_types.len(),
            controllers: self.controllers.len(),
            access_points: self.access_points.len(),
            identities: self.identities.len(),
            expressions: self.expressions.len(),
            time_specs: self.time_specs,
            rules: self.rule_count,
        }
    }

    /// Cards held by more than one identity, in card order.
    pub fn shared_cards(&self) -> BTreeMap<&Card, &[IdentityId]> {
        self.cards
            .iter()
            .filter(|(_, holders)| holders.len() > 1)
            .map(|(card, holders)| (card, holders.as_slice()))
            .collect()
    }

    pub fn access_point_type(&self, id: AccessPointTypeId) -> Option<&AccessPointType> {
        self.access_point_types.get(&id)
    }

    pub fn controller(&self, id: ControllerId) -> Option<&Controller> {
        self.controllers.get(&id)
    }

    pub fn identity(&self, id: IdentityId) -> Option<&Identity> {
        self.identities.get(&id)
    }

    pub fn expressions(&self) -> &ExpressionGraph {
        &self.expressions
    }

    /// Rules of one access point type in evaluation order.
    pub fn rules_for(&self, access_point_type: AccessPointTypeId) -> &[CompiledRule] {
        self.rules
            .get(&access_point_type)
            .map_or(&[][..], Vec::as_slice)
    }

    /// Materialized, cached member set of an expression.
    pub fn members(
        &self,
        expression: ExpressionId,
    ) -> Result<Arc<IdentitySet>, ConfigurationError> {
        self.expressions.members(expression)
    }

    /// Direct membership test that bypasses the member cache.
    pub fn membership(
        &self,
        expression: ExpressionId,
        identity: IdentityId,
    ) -> Result<bool, ConfigurationError> {
        self.expressions.contains(expression, identity)
    }
}

impl Directory for Snapshot {
    fn access_point(&self, id: AccessPointId) -> Result<Option<AccessPointBinding>, LookupError> {
        Ok(self.access_points.get(&id).map(|ap| AccessPointBinding {
            access_point: ap.id,
            access_point_type: ap.access_point_type,
            controller: ap.controller,
        }))
    }

    fn identities_for_card(&self, card: &Card) -> Result<Vec<IdentityId>, LookupError> {
        Ok(self.cards.get(card).cloned().unwrap_or_default())
    }
}

/// Indexes `items` by id, keeping the first of any duplicates.
fn index_unique<K, T>(
    items: Vec<T>,
    key: impl Fn(&T) -> u64,
    kind: &'static str,
    diagnostics: &mut Vec<ConfigurationError>,
) -> HashMap<K, T>
where
    K: From<u64> + Eq + std::hash::Hash,
{
    let mut map = HashMap::with_capacity(items.len());
    for item in items {
        let id = key(&item);
        if map.contains_key(&K::from(id)) {
            diagnostics.push(ConfigurationError::DuplicateId { kind, id });
            continue;
        }
        map.insert(K::from(id), item);
    }
    map
}

fn validate_access_points(
    mut access_points: Vec<AccessPoint>,
    types: &HashMap<AccessPointTypeId, AccessPointType>,
    controllers: &HashMap<ControllerId, Controller>,
    diagnostics: &mut Vec<ConfigurationError>,
) -> HashMap<AccessPointId, AccessPoint> {
    // Id order decides which of two conflicting access points keeps a
    // controller or address.
    access_points.sort_by_key(|ap| ap.id);

    let mut valid = HashMap::with_capacity(access_points.len());
    let mut bound: HashMap<ControllerId, AccessPointId> = HashMap::new();
    let mut addresses: HashMap<IpAddr, AccessPointId> = HashMap::new();

    for ap in access_points {
        if valid.contains_key(&ap.id) {
            diagnostics.push(ConfigurationError::DuplicateId {
                kind: "access point",
                id: ap.id.into(),
            });
            continue;
        }

        if !types.contains_key(&ap.access_point_type) {
            diagnostics.push(ConfigurationError::AccessPointUnknownType {
                access_point: ap.id,
                access_point_type: ap.access_point_type,
            });
            continue;
        }

        if let Some(controller) = ap.controller {
            if !controllers.contains_key(&controller) {
                diagnostics.push(ConfigurationError::AccessPointUnknownController {
                    access_point: ap.id,
                    controller,
                });
                continue;
            }
            if let Some(&bound_to) = bound.get(&controller) {
                diagnostics.push(ConfigurationError::ControllerAlreadyBound {
                    controller,
                    access_point: ap.id,
                    bound_to,
                });
                continue;
            }
        }

        if let Some(&existing) = addresses.get(&ap.address) {
            diagnostics.push(ConfigurationError::DuplicateAccessPointAddress {
                address: ap.address,
                access_point: ap.id,
                existing,
            });
            continue;
        }

        if let Some(controller) = ap.controller {
            bound.insert(controller, ap.id);
        }
        addresses.insert(ap.address, ap.id);
        valid.insert(ap.id, ap);
    }

    valid
}

fn compile_rules(
    rules: Vec<Rule>,
    types: &HashMap<AccessPointTypeId, AccessPointType>,
    time_specs: &HashMap<TimeSpecId, Result<TimeSpecification, ConfigurationError>>,
    expressions: &ExpressionGraph,
    diagnostics: &mut Vec<ConfigurationError>,
) -> HashMap<AccessPointTypeId, Vec<CompiledRule>> {
    let mut seen: HashSet<RuleId> = HashSet::with_capacity(rules.len());
    let mut by_type: HashMap<AccessPointTypeId, Vec<CompiledRule>> = HashMap::new();

    for rule in rules {
        if !seen.insert(rule.id) {
            diagnostics.push(ConfigurationError::DuplicateId {
                kind: "rule",
                id: rule.id.into(),
            });
            continue;
        }

        if !types.contains_key(&rule.access_point_type) {
            diagnostics.push(ConfigurationError::RuleUnknownAccessPointType {
                rule: rule.id,
                access_point_type: rule.access_point_type,
            });
            continue;
        }

        let mut defect = None;
        let mut time_spec = None;

        if let Some(spec_id) = rule.time_spec {
            match time_specs.get(&spec_id) {
                None => {
                    defect = Some(ConfigurationError::RuleUnknownTimeSpec {
                        rule: rule.id,
                        time_spec: spec_id,
                    });
                }
                Some(Err(cause)) => {
                    defect = Some(ConfigurationError::RuleQuarantined {
                        rule: rule.id,
                        cause: Box::new(cause.clone()),
                    });
                }
                Some(Ok(spec)) => time_spec = Some(spec.clone()),
            }
        }

        if defect.is_none() {
            if expressions.get(rule.expression).is_none() {
                defect = Some(ConfigurationError::RuleUnknownExpression {
                    rule: rule.id,
                    expression: rule.expression,
                });
            } else if let Err(cause) = expressions.check(rule.expression) {
                defect = Some(ConfigurationError::RuleQuarantined {
                    rule: rule.id,
                    cause: Box::new(cause),
                });
            }
        }

        if let Some(e) = &defect {
            diagnostics.push(e.clone());
        }

        by_type
            .entry(rule.access_point_type)
            .or_default()
            .push(CompiledRule {
                rule,
                time_spec,
                defect,
            });
    }

    for (access_point_type, rules) in &mut by_type {
        rules.sort_by(|a, b| {
            b.rule
                .priority
                .cmp(&a.rule.priority)
                .then(a.rule.id.cmp(&b.rule.id))
        });

        // Equal priorities are adjacent after sorting.
        let mut start = 0;
        while start < rules.len() {
            let priority = rules[start].rule.priority;
            let end = rules[start..]
                .iter()
                .position(|r| r.rule.priority != priority)
                .map_or(rules.len(), |offset| start + offset);

            if end - start > 1 {
                let error = ConfigurationError::DuplicatePriority {
                    access_point_type: *access_point_type,
                    priority,
                    rules: rules[start..end].iter().map(|r| r.rule.id).collect(),
                };
                diagnostics.push(error.clone());
                for rule in &mut rules[start..end] {
                    rule.defect.get_or_insert_with(|| error.clone());
                }
            }
            start = end;
        }
    }

    by_type
}

// ============================================================================
// SnapshotHandle
// ============================================================================

/// Shared pointer to the active snapshot.
///
/// The lock only guards the `Arc` itself: it is held to clone or replace the
/// pointer, never during evaluation.
#[derive(Debug, Clone)]
pub struct SnapshotHandle {
    inner: Arc<RwLock<Arc<Snapshot>>>,
}

impl Default for SnapshotHandle {
    fn default() -> Self {
        Self::new(Snapshot::empty())
    }
}

impl SnapshotHandle {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(snapshot))),
        }
    }

    /// Pins the active snapshot.
    pub fn current(&self) -> Arc<Snapshot> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Publishes `snapshot` and returns the one it replaced.
    ///
    /// Evaluations already holding the old snapshot finish against it.
    pub fn install(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        self.publish(Arc::new(snapshot))
    }

    fn publish(&self, next: Arc<Snapshot>) -> Arc<Snapshot> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let previous = std::mem::replace(&mut *guard, Arc::clone(&next));
        drop(guard);

        info!(
            previous = previous.version(),
            current = next.version(),
            "Installed snapshot"
        );
        previous
    }

    /// Loads, compiles and installs a snapshot from `source`.
    ///
    /// Returns the snapshot built from `source`, even if another install
    /// has replaced it since. On failure the active snapshot is left in place.
    pub fn reload(&self, source: &dyn SnapshotSource) -> Result<Arc<Snapshot>, SourceError> {
        let data = source.load().inspect_err(|e| {
            warn!(error = %e, "Snapshot reload failed; keeping current snapshot");
        })?;
        let loaded = Arc::new(Snapshot::compile(data));
        self.publish(Arc::clone(&loaded));
        Ok(loaded)
    }
}

// ============================================================================
// Tests
// ============================================================================
