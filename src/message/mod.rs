//! SNMP message envelopes.
//!
//! v1 and v2c share the community envelope; v3 has its own header, security
//! parameters, and scoped PDU (see [`v3`]). [`Message::decode`] dispatches on
//! the version field.

mod v3;

pub use v3::*;

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::pdu::Pdu;
use crate::version::Version;

/// A community-based message (SNMPv1 or SNMPv2c).
#[derive(Debug, Clone, PartialEq)]
pub struct CommunityMessage {
    /// Protocol version (V1 or V2c).
    pub version: Version,
    /// Community string.
    pub community: Bytes,
    /// The operation payload.
    pub pdu: Pdu,
}

impl CommunityMessage {
    /// Create a new community message.
    pub fn new(version: Version, community: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self {
            version,
            community: community.into(),
            pdu,
        }
    }

    /// Encode to wire bytes.
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.community);
            buf.push_integer(self.version.wire());
        });
        buf.finish()
    }

    /// Decode from wire bytes.
    pub fn decode(bytes: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(bytes);
        let mut outer = decoder.read_sequence()?;

        let version_offset = outer.position();
        let version = Version::from_wire(outer.read_integer()?, version_offset)?;
        if version == Version::V3 {
            return Err(Error::decode(
                version_offset,
                DecodeErrorKind::UnknownVersion(3),
            ));
        }

        let community = outer.read_octet_string()?;
        let pdu = Pdu::decode(&mut outer)?;

        Ok(Self {
            version,
            community,
            pdu,
        })
    }
}

/// Any SNMP message, decoded by version dispatch.
#[derive(Debug)]
pub enum Message {
    /// SNMPv1 or SNMPv2c.
    Community(CommunityMessage),
    /// SNMPv3 (with parse offsets retained for USM processing).
    V3(DecodedV3Message),
}

impl Message {
    /// Decode any SNMP message, dispatching on the version field.
    pub fn decode(bytes: Bytes) -> Result<Self> {
        // Peek the version without consuming: parse the outer sequence and
        // its first integer, then hand the whole datagram to the right codec.
        let mut decoder = Decoder::new(bytes.clone());
        let mut outer = decoder.read_sequence()?;
        let version_offset = outer.position();
        let version = Version::from_wire(outer.read_integer()?, version_offset)?;

        match version {
            Version::V1 | Version::V2c => Ok(Self::Community(CommunityMessage::decode(bytes)?)),
            Version::V3 => Ok(Self::V3(V3Message::decode(bytes)?)),
        }
    }

    /// The message version.
    pub fn version(&self) -> Version {
        match self {
            Self::Community(m) => m.version,
            Self::V3(_) => Version::V3,
        }
    }
}
