//! # gatekeep-engine: Physical Access Decisions
//!
//! Decides whether a card presented at an access point may pass, from a
//! versioned snapshot of access points, identities, identity expressions,
//! time windows and prioritized rules.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Lookup Event                                │
//! │  (Card + Access Point + Time)                │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  AccessDecisionEngine                        │
//! │  ├─ Directory: access point, card holders    │
//! │  ├─ Ambiguity policy for shared cards        │
//! │  └─ Default verdict when nothing matches     │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Rule Resolver (priority descending)         │
//! │  ├─ Time Window Matcher                      │
//! │  └─ Identity Set Evaluator (cached DAG)      │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  DecisionRecord -> DecisionLog               │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Snapshots are immutable. A [`SnapshotHandle`] swaps in new versions
//! between decisions; each decision pins one version from start to end.
//!
//! ## Examples
//!
//! ```
//! use gatekeep_engine::{
//!     AccessDecisionEngine, Edge, EngineSettings, EventTime, IdentityExpression, Snapshot,
//!     SnapshotData, SnapshotHandle,
//! };
//! use gatekeep_engine::model::{AccessPoint, AccessPointType, Identity, Rule};
//! use gatekeep_types::{
//!     AccessPointId, AccessPointTypeId, Card, ExpressionId, IdentityId, RuleId, Verdict,
//! };
//!
//! let office = AccessPointTypeId::new(1);
//! let data = SnapshotData {
//!     version: 1,
//!     access_point_types: vec![AccessPointType { id: office, name: "office".into() }],
//!     access_points: vec![AccessPoint {
//!         id: AccessPointId::new(1),
//!         name: "front door".into(),
//!         address: "10.0.0.1".parse().unwrap(),
//!         access_point_type: office,
//!         controller: None,
//!     }],
//!     identities: vec![Identity { id: IdentityId::new(1), card: Card::from_hex("c0ffee").unwrap() }],
//!     expressions: vec![IdentityExpression::new(ExpressionId::new(1), "staff")
//!         .with_edge(Edge::include_identity(IdentityId::new(1)))],
//!     rules: vec![Rule {
//!         id: RuleId::new(1),
//!         access_point_type: office,
//!         time_spec: None,
//!         expression: ExpressionId::new(1),
//!         priority: 10,
//!         verdict: Verdict::Allow,
//!     }],
//!     ..SnapshotData::default()
//! };
//!
//! let engine = AccessDecisionEngine::new(
//!     SnapshotHandle::new(Snapshot::compile(data)),
//!     EngineSettings::default(),
//! );
//!
//! // An untimed rule only covers events whose time the controller did not know.
//! let card = Card::from_hex("c0ffee").unwrap();
//! let record = engine.decide(&card, AccessPointId::new(1), EventTime::Unknown);
//! assert!(record.allowed);
//! ```

pub mod directory;
pub mod engine;
pub mod error;
pub mod expression;
pub mod model;
pub mod resolver;
pub mod sink;
pub mod snapshot;
pub mod source;
pub mod window;

pub use directory::{AccessPointBinding, Directory};
pub use engine::{
    AccessDecisionEngine, AmbiguityPolicy, DecisionReason, DecisionRecord, EngineSettings,
};
pub use error::{ConfigurationError, LookupError, SourceError};
pub use expression::{
    Edge, EdgeOp, EdgeTarget, ExpressionGraph, IdentityExpression, IdentitySet,
    MAX_EXPRESSION_DEPTH, RepeatedEdge,
};
pub use model::SnapshotData;
pub use resolver::{Resolution, resolve};
pub use sink::{
    AlertSink, DecisionLog, MemoryAlertSink, MemoryDecisionLog, TracingAlertSink,
    TracingDecisionLog,
};
pub use snapshot::{CompiledRule, Snapshot, SnapshotCounts, SnapshotHandle};
pub use source::{JsonFileSource, SnapshotSource};
pub use window::{DateRange, EventTime, TimeOfDayRange, TimeSpecification, WeekdayMask};
