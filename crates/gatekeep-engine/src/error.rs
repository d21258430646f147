//! Error types for snapshot loading and decision making.
//!
//! None of these are fatal to the process. Configuration errors quarantine
//! the item they describe; lookup errors fall through to the default verdict.

use std::net::IpAddr;
use std::path::PathBuf;

use chrono::NaiveDate;
use gatekeep_types::{
    AccessPointId, AccessPointTypeId, ControllerId, ExpressionId, RuleId, TimeSpecId,
};
use thiserror::Error;

use crate::expression::EdgeTarget;

/// A defect in a loaded snapshot.
///
/// Detected by [`Snapshot::compile`](crate::Snapshot::compile). The affected
/// expression, time specification, rule or access point is quarantined and
/// never matches; everything else in the snapshot keeps working.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: u64 },

    // -- Identity expressions --
    #[error("Cyclic identity expression: {}", format_path(.path))]
    CyclicExpression { path: Vec<ExpressionId> },

    #[error("Expression {expression} is nested more than {limit} levels deep")]
    ExpressionTooDeep {
        expression: ExpressionId,
        limit: usize,
    },

    #[error("Expression {expression} references unknown {target}")]
    DanglingEdge {
        expression: ExpressionId,
        target: EdgeTarget,
    },

    #[error("Expression {expression} depends on quarantined expression {dependency}")]
    DependsOnQuarantined {
        expression: ExpressionId,
        dependency: ExpressionId,
    },

    // -- Time specifications --
    #[error("Time spec {time_spec} sets only one end of its time-of-day range")]
    UnpairedTimeBounds { time_spec: TimeSpecId },

    #[error("Time spec {time_spec} sets only one end of its date range")]
    UnpairedDateBounds { time_spec: TimeSpecId },

    #[error("Time spec {time_spec} has weekday mask {mask:#04x} with bits above Sunday")]
    InvalidWeekdayMask { time_spec: TimeSpecId, mask: u8 },

    #[error("Time spec {time_spec} has date range {from}..{to} ending before it starts")]
    InvertedDateRange {
        time_spec: TimeSpecId,
        from: NaiveDate,
        to: NaiveDate,
    },

    #[error("Time spec {time_spec} has out-of-range UTC offset of {minutes} minutes")]
    InvalidUtcOffset { time_spec: TimeSpecId, minutes: i32 },

    // -- Rules --
    #[error("Rule {rule} references unknown access point type {access_point_type}")]
    RuleUnknownAccessPointType {
        rule: RuleId,
        access_point_type: AccessPointTypeId,
    },

    #[error("Rule {rule} references unknown time spec {time_spec}")]
    RuleUnknownTimeSpec { rule: RuleId, time_spec: TimeSpecId },

    #[error("Rule {rule} references unknown expression {expression}")]
    RuleUnknownExpression {
        rule: RuleId,
        expression: ExpressionId,
    },

    #[error("Rules {rules:?} share priority {priority} on access point type {access_point_type}")]
    DuplicatePriority {
        access_point_type: AccessPointTypeId,
        priority: i32,
        rules: Vec<RuleId>,
    },

    #[error("Rule {rule} is quarantined: {cause}")]
    RuleQuarantined {
        rule: RuleId,
        cause: Box<ConfigurationError>,
    },

    // -- Access points --
    #[error("Access point {access_point} references unknown access point type {access_point_type}")]
    AccessPointUnknownType {
        access_point: AccessPointId,
        access_point_type: AccessPointTypeId,
    },

    #[error("Access point {access_point} references unknown controller {controller}")]
    AccessPointUnknownController {
        access_point: AccessPointId,
        controller: ControllerId,
    },

    #[error("Controller {controller} is bound to access point {bound_to}; {access_point} cannot share it")]
    ControllerAlreadyBound {
        controller: ControllerId,
        access_point: AccessPointId,
        bound_to: AccessPointId,
    },

    #[error("Access point {access_point} reuses address {address} of access point {existing}")]
    DuplicateAccessPointAddress {
        address: IpAddr,
        access_point: AccessPointId,
        existing: AccessPointId,
    },
}

/// Failure of the external access point / card lookup collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("Directory unavailable: {0}")]
    Unavailable(String),

    #[error("Directory lookup failed: {0}")]
    Failed(String),
}

/// Failure to obtain snapshot data from a [`SnapshotSource`](crate::SnapshotSource).
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to read snapshot file at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse snapshot file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Snapshot source unavailable: {0}")]
    Unavailable(String),
}

fn format_path(path: &[ExpressionId]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}
