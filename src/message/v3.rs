//! SNMPv3 message envelope (RFC 3412).
//!
//! ```text
//! SNMPv3Message ::= SEQUENCE {
//!     msgVersion            INTEGER (3),
//!     msgGlobalData         HeaderData,
//!     msgSecurityParameters OCTET STRING,   -- USM SEQUENCE inside
//!     msgData               ScopedPduData   -- plaintext or encrypted
//! }
//! ```
//!
//! Encoding and decoding both record the absolute offset of the 12-byte
//! msgAuthenticationParameters slot so the USM layer can patch and verify
//! the HMAC in place, without searching the byte stream.

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{AuthErrorKind, DecodeErrorKind, Error, Result};
use crate::pdu::Pdu;
use crate::v3::auth::AUTH_PARAMS_LEN;
use crate::v3::UsmSecurityParams;
use crate::version::Version;

/// The USM security model number carried in msgSecurityModel.
pub const USM_SECURITY_MODEL: i32 = 3;

/// Minimum msgMaxSize an implementation must accept (RFC 3412).
pub const MSG_MAX_SIZE_MIN: i32 = 484;

/// msgFlags bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MsgFlags {
    /// Bit 0: message is authenticated.
    pub auth: bool,
    /// Bit 1: scoped PDU is encrypted.
    pub privacy: bool,
    /// Bit 2: sender expects a response or report.
    pub reportable: bool,
}

impl MsgFlags {
    const AUTH: u8 = 0x01;
    const PRIV: u8 = 0x02;
    const REPORTABLE: u8 = 0x04;

    /// Flags for a discovery probe: noAuthNoPriv, reportable.
    pub fn discovery() -> Self {
        Self {
            auth: false,
            privacy: false,
            reportable: true,
        }
    }

    /// The single flags octet.
    pub fn as_byte(self) -> u8 {
        let mut byte = 0;
        if self.auth {
            byte |= Self::AUTH;
        }
        if self.privacy {
            byte |= Self::PRIV;
        }
        if self.reportable {
            byte |= Self::REPORTABLE;
        }
        byte
    }

    /// Parse the flags octet, rejecting privacy-without-auth.
    pub fn from_byte(byte: u8, offset: usize) -> Result<Self> {
        let flags = Self {
            auth: byte & Self::AUTH != 0,
            privacy: byte & Self::PRIV != 0,
            reportable: byte & Self::REPORTABLE != 0,
        };
        if flags.privacy && !flags.auth {
            return Err(Error::decode(offset, DecodeErrorKind::InvalidMsgFlags));
        }
        Ok(flags)
    }
}

/// msgGlobalData (RFC 3412 Section 6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderData {
    /// Message identifier used for response correlation.
    pub msg_id: i32,
    /// Largest message the sender can accept.
    pub msg_max_size: i32,
    /// Security and report flags.
    pub flags: MsgFlags,
    /// Security model; 3 selects USM.
    pub security_model: i32,
}

impl HeaderData {
    /// Header for a USM message.
    pub fn usm(msg_id: i32, msg_max_size: i32, flags: MsgFlags) -> Self {
        Self {
            msg_id,
            msg_max_size,
            flags,
            security_model: USM_SECURITY_MODEL,
        }
    }

    fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            buf.push_integer(self.security_model);
            buf.push_octet_string(&[self.flags.as_byte()]);
            buf.push_integer(self.msg_max_size);
            buf.push_integer(self.msg_id);
        });
    }

    fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;

        let msg_id = seq.read_integer()?;

        let size_offset = seq.position();
        let msg_max_size = seq.read_integer()?;
        if msg_max_size < MSG_MAX_SIZE_MIN {
            return Err(Error::decode(
                size_offset,
                DecodeErrorKind::MsgMaxSizeTooSmall {
                    value: msg_max_size,
                    minimum: MSG_MAX_SIZE_MIN,
                },
            ));
        }

        let (flag_bytes, flags_offset) = seq.read_octet_string_tracked()?;
        if flag_bytes.len() != 1 {
            return Err(Error::decode(flags_offset, DecodeErrorKind::InvalidMsgFlags));
        }
        let flags = MsgFlags::from_byte(flag_bytes[0], flags_offset)?;

        let model_offset = seq.position();
        let security_model = seq.read_integer()?;
        if security_model != USM_SECURITY_MODEL {
            return Err(Error::decode(
                model_offset,
                DecodeErrorKind::UnknownSecurityModel(security_model),
            ));
        }

        Ok(Self {
            msg_id,
            msg_max_size,
            flags,
            security_model,
        })
    }
}

/// A scoped PDU: context plus operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedPdu {
    /// Engine in whose context the PDU is processed (empty = authoritative).
    pub context_engine_id: Bytes,
    /// Context name (usually empty).
    pub context_name: Bytes,
    /// The operation.
    pub pdu: Pdu,
}

impl ScopedPdu {
    /// Create a scoped PDU with an empty context name.
    pub fn new(context_engine_id: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self {
            context_engine_id: context_engine_id.into(),
            context_name: Bytes::new(),
            pdu,
        }
    }

    /// Encode into `buf` (reverse order).
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.context_name);
            buf.push_octet_string(&self.context_engine_id);
        });
    }

    /// Encode into a standalone byte string (the privacy plaintext).
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        self.encode(&mut buf);
        buf.finish()
    }

    /// Decode from a decoder positioned at the scoped-PDU SEQUENCE.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;
        let context_engine_id = seq.read_octet_string()?;
        let context_name = seq.read_octet_string()?;
        let pdu = Pdu::decode(&mut seq)?;
        Ok(Self {
            context_engine_id,
            context_name,
            pdu,
        })
    }

    /// Decode from standalone bytes (the privacy decryption output).
    ///
    /// Trailing bytes are tolerated: block ciphers pad the plaintext, and
    /// BER parsing terminates naturally at the end of the SEQUENCE.
    pub fn from_bytes(bytes: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(bytes);
        Self::decode(&mut decoder)
    }
}

/// The msgData field: plaintext scoped PDU or ciphertext.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopedPduData {
    /// Unencrypted scoped PDU.
    Plaintext(ScopedPdu),
    /// Encrypted scoped PDU as an OCTET STRING.
    Encrypted(Bytes),
}

impl ScopedPduData {
    /// The plaintext scoped PDU, or a decode error if still encrypted.
    pub fn plaintext(&self) -> Result<&ScopedPdu> {
        match self {
            Self::Plaintext(scoped) => Ok(scoped),
            Self::Encrypted(_) => Err(Error::decode(0, DecodeErrorKind::UnexpectedEncryption)),
        }
    }
}

/// A complete SNMPv3 message.
#[derive(Debug, Clone, PartialEq)]
pub struct V3Message {
    /// Global header data.
    pub header: HeaderData,
    /// USM security parameters.
    pub security_params: UsmSecurityParams,
    /// Scoped PDU, possibly encrypted.
    pub scoped_pdu: ScopedPduData,
}

/// Encoded v3 message with the auth-params slot location.
pub struct EncodedV3Message {
    /// The wire bytes. Mutable so the HMAC can be patched in place.
    pub bytes: Vec<u8>,
    /// Absolute offset of the 12-byte auth-params content, when present.
    pub auth_params_offset: Option<usize>,
}

/// Decoded v3 message with parse artifacts needed by the USM layer.
#[derive(Debug)]
pub struct DecodedV3Message {
    /// The parsed message.
    pub message: V3Message,
    /// Absolute offset of the auth-params content, when present.
    pub auth_params_offset: Option<usize>,
    /// The raw datagram, retained for HMAC verification.
    pub raw: Bytes,
}

impl V3Message {
    /// Encode to wire bytes, reporting where the auth-params slot landed.
    pub fn encode(&self) -> EncodedV3Message {
        let mut buf = EncodeBuf::new();
        let mut auth_marker = None;

        buf.push_sequence(|buf| {
            match &self.scoped_pdu {
                ScopedPduData::Plaintext(scoped) => scoped.encode(buf),
                ScopedPduData::Encrypted(ciphertext) => buf.push_octet_string(ciphertext),
            }

            buf.push_constructed(tag::OCTET_STRING, |buf| {
                auth_marker = self.security_params.encode_fields(buf);
            });

            self.header.encode(buf);
            buf.push_integer(Version::V3.wire());
        });

        let bytes = buf.finish_vec();
        let auth_params_offset = auth_marker.map(|marker| bytes.len() - marker);

        EncodedV3Message {
            bytes,
            auth_params_offset,
        }
    }

    /// Decode from wire bytes.
    pub fn decode(bytes: Bytes) -> Result<DecodedV3Message> {
        let mut decoder = Decoder::new(bytes.clone());
        let mut outer = decoder.read_sequence()?;

        let version_offset = outer.position();
        let version = outer.read_integer()?;
        if version != Version::V3.wire() {
            return Err(Error::decode(
                version_offset,
                DecodeErrorKind::UnknownVersion(version),
            ));
        }

        let header = HeaderData::decode(&mut outer)?;

        let (sec_bytes, sec_offset) = outer.read_octet_string_tracked()?;
        let (security_params, auth_params_offset) =
            UsmSecurityParams::decode_tracked(sec_bytes, sec_offset)?;

        if header.flags.auth && security_params.auth_params.len() != AUTH_PARAMS_LEN {
            return Err(Error::auth(
                None,
                AuthErrorKind::WrongMacLength {
                    expected: AUTH_PARAMS_LEN,
                    actual: security_params.auth_params.len(),
                },
            ));
        }

        let scoped_pdu = if header.flags.privacy {
            let next = outer.peek_tag()?;
            if next != tag::OCTET_STRING {
                return Err(Error::decode(
                    outer.position(),
                    DecodeErrorKind::ExpectedEncryption,
                ));
            }
            ScopedPduData::Encrypted(outer.read_octet_string()?)
        } else {
            ScopedPduData::Plaintext(ScopedPdu::decode(&mut outer)?)
        };

        Ok(DecodedV3Message {
            message: V3Message {
                header,
                security_params,
                scoped_pdu,
            },
            auth_params_offset,
            raw: bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use crate::pdu::Pdu;

    fn engine_id() -> Bytes {
        Bytes::from_static(&[0x80, 0x00, 0x1F, 0x88, 0x05, 1, 2, 3, 4, 5, 6, 7, 8])
    }

    fn plaintext_message(flags: MsgFlags) -> V3Message {
        let auth_params = if flags.auth {
            Bytes::from_static(&[0u8; 12])
        } else {
            Bytes::new()
        };
        V3Message {
            header: HeaderData::usm(100, 65507, flags),
            security_params: UsmSecurityParams {
                engine_id: engine_id(),
                engine_boots: 1,
                engine_time: 42,
                user_name: Bytes::from_static(b"operator"),
                auth_params,
                priv_params: Bytes::new(),
            },
            scoped_pdu: ScopedPduData::Plaintext(ScopedPdu::new(
                engine_id(),
                Pdu::get_request(7, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]),
            )),
        }
    }

    #[test]
    fn test_flags_byte() {
        assert_eq!(MsgFlags::discovery().as_byte(), 0x04);
        let all = MsgFlags {
            auth: true,
            privacy: true,
            reportable: true,
        };
        assert_eq!(all.as_byte(), 0x07);
        assert_eq!(MsgFlags::from_byte(0x07, 0).unwrap(), all);
    }

    #[test]
    fn test_flags_priv_without_auth_rejected() {
        let err = MsgFlags::from_byte(0x02, 9).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                offset: 9,
                kind: DecodeErrorKind::InvalidMsgFlags,
            }
        ));
    }

    #[test]
    fn test_noauth_roundtrip() {
        let msg = plaintext_message(MsgFlags::discovery());
        let encoded = msg.encode();
        assert_eq!(encoded.auth_params_offset, None);

        let decoded = V3Message::decode(Bytes::from(encoded.bytes)).unwrap();
        assert_eq!(decoded.message, msg);
        assert_eq!(decoded.auth_params_offset, None);
    }

    #[test]
    fn test_auth_roundtrip_offset_agreement() {
        let flags = MsgFlags {
            auth: true,
            privacy: false,
            reportable: true,
        };
        let msg = plaintext_message(flags);
        let encoded = msg.encode();
        let encode_offset = encoded.auth_params_offset.unwrap();
        assert_eq!(
            &encoded.bytes[encode_offset..encode_offset + 12],
            &[0u8; 12]
        );

        let decoded = V3Message::decode(Bytes::from(encoded.bytes)).unwrap();
        assert_eq!(decoded.auth_params_offset, Some(encode_offset));
        assert_eq!(decoded.message, msg);
    }

    #[test]
    fn test_auth_flag_requires_12_byte_params() {
        let flags = MsgFlags {
            auth: true,
            privacy: false,
            reportable: false,
        };
        let mut msg = plaintext_message(flags);
        msg.security_params.auth_params = Bytes::from_static(&[0u8; 4]);
        let encoded = msg.encode();
        let err = V3Message::decode(Bytes::from(encoded.bytes)).unwrap_err();
        assert!(matches!(
            err,
            Error::AuthenticationFailed {
                kind: AuthErrorKind::WrongMacLength {
                    expected: 12,
                    actual: 4
                },
                ..
            }
        ));
    }

    #[test]
    fn test_encrypted_roundtrip() {
        let flags = MsgFlags {
            auth: true,
            privacy: true,
            reportable: true,
        };
        let msg = V3Message {
            header: HeaderData::usm(5, 65507, flags),
            security_params: UsmSecurityParams {
                engine_id: engine_id(),
                engine_boots: 2,
                engine_time: 9,
                user_name: Bytes::from_static(b"operator"),
                auth_params: Bytes::from_static(&[0u8; 12]),
                priv_params: Bytes::from_static(&[9, 8, 7, 6, 5, 4, 3, 2]),
            },
            scoped_pdu: ScopedPduData::Encrypted(Bytes::from_static(&[0xDE, 0xAD, 0xBE, 0xEF])),
        };

        let encoded = msg.encode();
        let decoded = V3Message::decode(Bytes::from(encoded.bytes)).unwrap();
        assert_eq!(decoded.message, msg);
        match decoded.message.scoped_pdu {
            ScopedPduData::Encrypted(ct) => assert_eq!(&ct[..], &[0xDE, 0xAD, 0xBE, 0xEF]),
            ScopedPduData::Plaintext(_) => panic!("expected ciphertext"),
        }
    }

    #[test]
    fn test_msg_max_size_validated() {
        let mut msg = plaintext_message(MsgFlags::discovery());
        msg.header.msg_max_size = 100;
        let encoded = msg.encode();
        let err = V3Message::decode(Bytes::from(encoded.bytes)).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                kind: DecodeErrorKind::MsgMaxSizeTooSmall {
                    value: 100,
                    minimum: 484
                },
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_security_model_rejected() {
        let mut msg = plaintext_message(MsgFlags::discovery());
        msg.header.security_model = 2;
        let encoded = msg.encode();
        let err = V3Message::decode(Bytes::from(encoded.bytes)).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                kind: DecodeErrorKind::UnknownSecurityModel(2),
                ..
            }
        ));
    }

    #[test]
    fn test_scoped_pdu_tolerates_padding_tail() {
        let scoped = ScopedPdu::new(engine_id(), Pdu::get_request(1, &[oid!(1, 3, 6)]));
        let mut padded = scoped.to_bytes().to_vec();
        padded.extend_from_slice(&[0u8; 6]);
        let decoded = ScopedPdu::from_bytes(Bytes::from(padded)).unwrap();
        assert_eq!(decoded, scoped);
    }
}
