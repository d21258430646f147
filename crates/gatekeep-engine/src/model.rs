//! Entities loaded from the configuration store.
//!
//! [`SnapshotData`] is the unvalidated bundle handed over by a
//! [`SnapshotSource`](crate::SnapshotSource). It is compiled into an immutable
//! [`Snapshot`](crate::Snapshot) before any decision is made.

use std::net::IpAddr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use gatekeep_types::{
    AccessPointId, AccessPointTypeId, Card, ControllerId, ExpressionId, IdentityId, MacAddress,
    RuleId, SecretKey, TimeSpecId, Verdict,
};
use serde::{Deserialize, Serialize};

use crate::expression::IdentityExpression;

/// A named category of access points. Rules attach to types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPointType {
    pub id: AccessPointTypeId,
    pub name: String,
}

/// A door controller.
///
/// Version and contact fields are bookkeeping for the surrounding system;
/// the decision engine only reads `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Controller {
    pub id: ControllerId,
    pub mac: MacAddress,
    pub key: SecretKey,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub firmware_version: Option<String>,
    #[serde(default)]
    pub db_version: Option<String>,
}

/// A physical door or gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPoint {
    pub id: AccessPointId,
    pub name: String,
    pub address: IpAddr,
    #[serde(rename = "type")]
    pub access_point_type: AccessPointTypeId,
    #[serde(default)]
    pub controller: Option<ControllerId>,
}

/// A credential holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    pub card: Card,
}

/// Raw recurring time window, as stored.
///
/// Every field is independently optional. Validation into a
/// [`TimeSpecification`](crate::TimeSpecification) enforces that bounds come
/// in pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpecRow {
    pub id: TimeSpecId,
    #[serde(default)]
    pub weekday_mask: Option<u8>,
    #[serde(default)]
    pub time_from: Option<NaiveTime>,
    #[serde(default)]
    pub time_to: Option<NaiveTime>,
    #[serde(default)]
    pub date_from: Option<NaiveDate>,
    #[serde(default)]
    pub date_to: Option<NaiveDate>,
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

/// An access rule.
///
/// A rule without a time spec applies only to events whose time is unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub access_point_type: AccessPointTypeId,
    #[serde(default)]
    pub time_spec: Option<TimeSpecId>,
    pub expression: ExpressionId,
    /// Higher values are evaluated first. Unique per access point type.
    pub priority: i32,
    pub verdict: Verdict,
}

/// Everything needed to evaluate decisions, loaded as one versioned unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotData {
    pub version: u64,
    pub access_point_types: Vec<AccessPointType>,
    pub controllers: Vec<Controller>,
    pub access_points: Vec<AccessPoint>,
    pub identities: Vec<Identity>,
    pub expressions: Vec<IdentityExpression>,
    pub time_specs: Vec<TimeSpecRow>,
    pub rules: Vec<Rule>,
}
