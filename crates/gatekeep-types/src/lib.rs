//! # gatekeep-types: Core types for `Gatekeep`
//!
//! This crate contains shared types used across the `Gatekeep` system:
//! - Entity IDs ([`ControllerId`], [`AccessPointId`], [`AccessPointTypeId`],
//!   [`IdentityId`], [`ExpressionId`], [`TimeSpecId`], [`RuleId`])
//! - Credential bytes ([`Card`])
//! - Controller hardware addresses and keys ([`MacAddress`], [`SecretKey`])
//! - Rule outcomes ([`Verdict`])

use std::{
    fmt::{Debug, Display},
    str::FromStr,
};

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ============================================================================
// Entity IDs - All Copy (cheap 8-byte values)
// ============================================================================

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(id: u64) -> Self {
                Self(id)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

entity_id!(
    /// Unique identifier for a door controller.
    ControllerId
);

entity_id!(
    /// Unique identifier for a physical access point (door, gate).
    AccessPointId
);

entity_id!(
    /// Unique identifier for an access point category. Rules bind to types,
    /// not to individual access points.
    AccessPointTypeId
);

entity_id!(
    /// Unique identifier for a credential holder.
    IdentityId
);

entity_id!(
    /// Unique identifier for a node in the identity expression graph.
    ExpressionId
);

entity_id!(
    /// Unique identifier for a recurring time specification.
    TimeSpecId
);

entity_id!(
    /// Unique identifier for an access rule.
    RuleId
);

// ============================================================================
// Card - Clone (cheap reference-counted bytes)
// ============================================================================

/// Error returned when parsing a hex-encoded value fails.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseHexError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("expected {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },
}

/// Opaque credential bytes read from a card.
///
/// The engine never interprets the contents. Two identities may carry the
/// same card value; resolving that ambiguity is left to the decision layer.
///
/// Serialized as a lowercase hex string.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Card(Bytes);

impl Card {
    /// Creates a card from raw bytes.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Parses a card from a hex string. Whitespace, `:` and `-` separators
    /// are ignored.
    pub fn from_hex(s: &str) -> Result<Self, ParseHexError> {
        decode_hex(s).map(|v| Self(Bytes::from(v)))
    }

    /// Returns the raw card bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Debug for Card {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Card({self})")
    }
}

impl Display for Card {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl FromStr for Card {
    type Err = ParseHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<&[u8]> for Card {
    fn from(bytes: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(bytes))
    }
}

impl From<Vec<u8>> for Card {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl AsRef<[u8]> for Card {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Card {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Card {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Card::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// SecretKey - Clone (never printed)
// ============================================================================

/// Shared secret used to authenticate a controller's packets.
///
/// `Debug` is redacted. Serialized as a lowercase hex string so snapshot
/// files stay text.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct SecretKey(Bytes);

impl SecretKey {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretKey(<{} bytes redacted>)", self.0.len())
    }
}

impl Serialize for SecretKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&Card(self.0.clone()))
    }
}

impl<'de> Deserialize<'de> for SecretKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        decode_hex(&s)
            .map(|v| Self(Bytes::from(v)))
            .map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// MacAddress - Copy (fixed 6-byte value)
// ============================================================================

/// Length of a controller hardware address in bytes.
pub const MAC_LENGTH: usize = 6;

/// Hardware address identifying a door controller on the wire.
///
/// Displayed and parsed in the usual `aa:bb:cc:dd:ee:ff` form.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MacAddress([u8; MAC_LENGTH]);

impl MacAddress {
    pub fn from_bytes(bytes: [u8; MAC_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; MAC_LENGTH] {
        &self.0
    }
}

impl Debug for MacAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MacAddress({self})")
    }
}

impl Display for MacAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddress {
    type Err = ParseHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = decode_hex(s)?;
        let array: [u8; MAC_LENGTH] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| ParseHexError::WrongLength {
                    expected: MAC_LENGTH,
                    actual: bytes.len(),
                })?;
        Ok(Self(array))
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Verdict - Copy (rule outcome)
// ============================================================================

/// The outcome a rule assigns when it matches. Defaults to `Deny`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    /// Open the door.
    Allow,
    /// Keep the door closed.
    #[default]
    Deny,
}

impl Verdict {
    /// Returns true for [`Verdict::Allow`].
    pub fn is_allow(self) -> bool {
        matches!(self, Self::Allow)
    }
}

impl Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allow => write!(f, "allow"),
            Self::Deny => write!(f, "deny"),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Decodes hex after dropping whitespace, `:` and `-` separators.
fn decode_hex(s: &str) -> Result<Vec<u8>, ParseHexError> {
    let digits: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':' && *c != '-')
        .collect();
    Ok(hex::decode(digits)?)
}
