//! Protocol version field.

use crate::error::{DecodeErrorKind, Error, Result};

/// The SNMP protocol version, as carried in the first field of every
/// message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum Version {
    /// SNMPv1 (RFC 1157), wire value 0.
    V1,
    /// SNMPv2c (RFC 1901), wire value 1.
    #[default]
    V2c,
    /// SNMPv3 (RFC 3411), wire value 3.
    V3,
}

impl Version {
    /// The integer this version encodes as. Note the gap: wire value 2
    /// belonged to the party-based SNMPv2 that never shipped widely.
    pub const fn wire(self) -> i32 {
        match self {
            Self::V1 => 0,
            Self::V2c => 1,
            Self::V3 => 3,
        }
    }

    /// Map a wire integer back to a version, failing with the decode
    /// offset on anything outside {0, 1, 3}.
    pub fn from_wire(value: i32, offset: usize) -> Result<Self> {
        match value {
            0 => Ok(Self::V1),
            1 => Ok(Self::V2c),
            3 => Ok(Self::V3),
            other => Err(Error::decode(offset, DecodeErrorKind::UnknownVersion(other))),
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V1 => write!(f, "SNMPv1"),
            Self::V2c => write!(f, "SNMPv2c"),
            Self::V3 => write!(f, "SNMPv3"),
        }
    }
}
