//! Lookup collaborator for access points and cards.
//!
//! The decision engine never reads entity tables directly. It asks a
//! [`Directory`], which may be the active [`Snapshot`](crate::Snapshot) or an
//! external service with its own failure modes.

use gatekeep_types::{AccessPointId, AccessPointTypeId, Card, ControllerId, IdentityId};
use serde::Serialize;

use crate::error::LookupError;

/// What the engine needs to know about an access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccessPointBinding {
    pub access_point: AccessPointId,
    pub access_point_type: AccessPointTypeId,
    pub controller: Option<ControllerId>,
}

/// Resolves access points and cards.
///
/// Implementations must be callable from many threads at once. Timeouts are
/// the implementation's business; a lookup that gives up should return
/// [`LookupError::Unavailable`].
pub trait Directory: Send + Sync {
    /// Returns `Ok(None)` for an access point that does not exist.
    fn access_point(&self, id: AccessPointId) -> Result<Option<AccessPointBinding>, LookupError>;

    /// Returns every identity holding `card`, in ascending id order.
    fn identities_for_card(&self, card: &Card) -> Result<Vec<IdentityId>, LookupError>;
}
