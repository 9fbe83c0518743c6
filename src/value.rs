//! SMI value type.
//!
//! One enumerated variant per wire tag; encode/decode dispatch on the tag.

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;

/// Deepest SEQUENCE nesting accepted while decoding.
const MAX_SEQUENCE_DEPTH: usize = 64;

/// An SMI value as carried in a VarBind.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// INTEGER (tag 0x02).
    Integer(i32),
    /// OCTET STRING (tag 0x04).
    OctetString(Bytes),
    /// NULL (tag 0x05).
    Null,
    /// OBJECT IDENTIFIER (tag 0x06).
    ObjectIdentifier(Oid),
    /// IpAddress (tag 0x40), exactly four octets.
    IpAddress([u8; 4]),
    /// Counter32 (tag 0x41).
    Counter32(u32),
    /// Gauge32 / Unsigned32 (tag 0x42).
    Gauge32(u32),
    /// TimeTicks (tag 0x43), hundredths of a second.
    TimeTicks(u32),
    /// Opaque (tag 0x44).
    Opaque(Bytes),
    /// Counter64 (tag 0x46).
    Counter64(u64),
    /// noSuchObject exception (tag 0x80).
    NoSuchObject,
    /// noSuchInstance exception (tag 0x81).
    NoSuchInstance,
    /// endOfMibView exception (tag 0x82).
    EndOfMibView,
    /// SEQUENCE (tag 0x30) of nested values.
    Sequence(Vec<Value>),
}

impl Value {
    /// The BER tag for this value.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Integer(_) => tag::INTEGER,
            Self::OctetString(_) => tag::OCTET_STRING,
            Self::Null => tag::NULL,
            Self::ObjectIdentifier(_) => tag::OBJECT_IDENTIFIER,
            Self::IpAddress(_) => tag::IP_ADDRESS,
            Self::Counter32(_) => tag::COUNTER32,
            Self::Gauge32(_) => tag::GAUGE32,
            Self::TimeTicks(_) => tag::TIMETICKS,
            Self::Opaque(_) => tag::OPAQUE,
            Self::Counter64(_) => tag::COUNTER64,
            Self::NoSuchObject => tag::NO_SUCH_OBJECT,
            Self::NoSuchInstance => tag::NO_SUCH_INSTANCE,
            Self::EndOfMibView => tag::END_OF_MIB_VIEW,
            Self::Sequence(_) => tag::SEQUENCE,
        }
    }

    /// Whether this is one of the v2c exception markers.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Self::NoSuchObject | Self::NoSuchInstance | Self::EndOfMibView
        )
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        match self {
            Self::Integer(v) => buf.push_integer(*v),
            Self::OctetString(data) => buf.push_octet_string(data),
            Self::Null => buf.push_null(),
            Self::ObjectIdentifier(oid) => buf.push_oid(oid),
            Self::IpAddress(addr) => buf.push_ip_address(*addr),
            Self::Counter32(v) => buf.push_unsigned32(tag::COUNTER32, *v),
            Self::Gauge32(v) => buf.push_unsigned32(tag::GAUGE32, *v),
            Self::TimeTicks(v) => buf.push_unsigned32(tag::TIMETICKS, *v),
            Self::Opaque(data) => buf.push_opaque(data),
            Self::Counter64(v) => buf.push_counter64(*v),
            Self::NoSuchObject => buf.push_empty(tag::NO_SUCH_OBJECT),
            Self::NoSuchInstance => buf.push_empty(tag::NO_SUCH_INSTANCE),
            Self::EndOfMibView => buf.push_empty(tag::END_OF_MIB_VIEW),
            Self::Sequence(children) => buf.push_sequence(|buf| {
                for child in children.iter().rev() {
                    child.encode(buf);
                }
            }),
        }
    }

    /// Decode from BER, dispatching on the tag.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        Self::decode_nested(decoder, 0)
    }

    fn decode_nested(decoder: &mut Decoder, depth: usize) -> Result<Self> {
        let next = decoder.peek_tag()?;
        match next {
            tag::INTEGER => Ok(Self::Integer(decoder.read_integer()?)),
            tag::OCTET_STRING => Ok(Self::OctetString(decoder.read_octet_string()?)),
            tag::NULL => {
                decoder.read_null()?;
                Ok(Self::Null)
            }
            tag::OBJECT_IDENTIFIER => {
                Ok(Self::ObjectIdentifier(decoder.read_oid()?))
            }
            tag::SEQUENCE => {
                // Parsed structures are trees on the call stack; without a
                // depth cap one datagram could overflow it.
                if depth >= MAX_SEQUENCE_DEPTH {
                    return Err(Error::decode(
                        decoder.position(),
                        DecodeErrorKind::SequenceTooDeep {
                            max: MAX_SEQUENCE_DEPTH,
                        },
                    ));
                }
                let mut seq = decoder.read_sequence()?;
                let mut children = Vec::new();
                while !seq.is_empty() {
                    children.push(Value::decode_nested(&mut seq, depth + 1)?);
                }
                Ok(Self::Sequence(children))
            }
            tag::IP_ADDRESS => Ok(Self::IpAddress(decoder.read_ip_address()?)),
            tag::COUNTER32 => Ok(Self::Counter32(
                decoder.read_unsigned32(tag::COUNTER32)?,
            )),
            tag::GAUGE32 => Ok(Self::Gauge32(
                decoder.read_unsigned32(tag::GAUGE32)?,
            )),
            tag::TIMETICKS => Ok(Self::TimeTicks(
                decoder.read_unsigned32(tag::TIMETICKS)?,
            )),
            tag::OPAQUE => {
                let (content, _) = decoder.read_expected(tag::OPAQUE)?;
                Ok(Self::Opaque(content))
            }
            tag::COUNTER64 => Ok(Self::Counter64(decoder.read_counter64()?)),
            tag::NO_SUCH_OBJECT => {
                read_exception(decoder, tag::NO_SUCH_OBJECT)?;
                Ok(Self::NoSuchObject)
            }
            tag::NO_SUCH_INSTANCE => {
                read_exception(decoder, tag::NO_SUCH_INSTANCE)?;
                Ok(Self::NoSuchInstance)
            }
            tag::END_OF_MIB_VIEW => {
                read_exception(decoder, tag::END_OF_MIB_VIEW)?;
                Ok(Self::EndOfMibView)
            }
            other => Err(Error::decode(
                decoder.position(),
                DecodeErrorKind::UnsupportedType(other),
            )),
        }
    }
}

fn read_exception(decoder: &mut Decoder, tag: u8) -> Result<()> {
    let (content, offset) = decoder.read_expected(tag)?;
    if !content.is_empty() {
        return Err(Error::decode(offset, DecodeErrorKind::InvalidNull));
    }
    Ok(())
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::OctetString(data) => match std::str::from_utf8(data) {
                Ok(s) if !s.contains(|c: char| c.is_control()) => write!(f, "{}", s),
                _ => write!(f, "0x{}", ber_hex(data)),
            },
            Self::Null => write!(f, "null"),
            Self::ObjectIdentifier(oid) => write!(f, "{}", oid),
            Self::IpAddress([a, b, c, d]) => write!(f, "{}.{}.{}.{}", a, b, c, d),
            Self::Counter32(v) | Self::Gauge32(v) | Self::TimeTicks(v) => write!(f, "{}", v),
            Self::Opaque(data) => write!(f, "0x{}", ber_hex(data)),
            Self::Counter64(v) => write!(f, "{}", v),
            Self::NoSuchObject => write!(f, "noSuchObject"),
            Self::NoSuchInstance => write!(f, "noSuchInstance"),
            Self::EndOfMibView => write!(f, "endOfMibView"),
            Self::Sequence(children) => {
                write!(f, "(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, ")")
            }
        }
    }
}

fn ber_hex(data: &[u8]) -> String {
    crate::util::encode_hex(data)
}

/// Encode a single value into a fresh byte string.
pub fn encode_value(value: &Value) -> Bytes {
    let mut buf = EncodeBuf::new();
    value.encode(&mut buf);
    buf.finish()
}

/// Decode a single value from a byte string, requiring full consumption.
pub fn decode_value(bytes: Bytes) -> Result<Value> {
    let mut decoder = Decoder::new(bytes);
    let value = Value::decode(&mut decoder)?;
    if !decoder.is_empty() {
        return Err(Error::decode(
            decoder.position(),
            DecodeErrorKind::TlvOverflow,
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    fn roundtrip(value: Value) -> Value {
        let bytes = encode_value(&value);
        decode_value(bytes).unwrap()
    }

    #[test]
    fn test_integer_boundary_wire_form() {
        // 128 needs a 0x00 pad; -128 does not
        assert_eq!(&encode_value(&Value::Integer(128))[..], &[0x02, 0x02, 0x00, 0x80]);
        assert_eq!(&encode_value(&Value::Integer(-128))[..], &[0x02, 0x01, 0x80]);
    }

    #[test]
    fn test_unsigned_high_bit_pad() {
        assert_eq!(
            &encode_value(&Value::Counter32(0x8000_0000))[..],
            &[0x41, 0x05, 0x00, 0x80, 0x00, 0x00, 0x00]
        );
        assert_eq!(&encode_value(&Value::Gauge32(0x7F))[..], &[0x42, 0x01, 0x7F]);
    }

    #[test]
    fn test_roundtrip_all_variants() {
        let values = vec![
            Value::Integer(-12345),
            Value::OctetString(Bytes::from_static(b"Linux router")),
            Value::Null,
            Value::ObjectIdentifier(oid!(1, 3, 6, 1, 4, 1)),
            Value::IpAddress([10, 0, 0, 1]),
            Value::Counter32(u32::MAX),
            Value::Gauge32(500),
            Value::TimeTicks(123_456),
            Value::Opaque(Bytes::from_static(&[0x9F, 0x78, 0x04, 0x42, 0x28, 0x00, 0x00])),
            Value::Counter64(u64::MAX),
            Value::NoSuchObject,
            Value::NoSuchInstance,
            Value::EndOfMibView,
        ];
        for value in values {
            assert_eq!(roundtrip(value.clone()), value);
        }
    }

    #[test]
    fn test_roundtrip_sequence() {
        let value = Value::Sequence(vec![
            Value::Integer(1),
            Value::Sequence(vec![Value::OctetString(Bytes::from_static(b"x"))]),
            Value::Null,
        ]);
        assert_eq!(roundtrip(value.clone()), value);
    }

    #[test]
    fn test_nesting_depth_capped() {
        use crate::ber::encode_tlv;

        let mut bytes = encode_value(&Value::Null);
        for _ in 0..MAX_SEQUENCE_DEPTH + 8 {
            bytes = encode_tlv(tag::SEQUENCE, &bytes);
        }
        let err = decode_value(bytes).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                kind: DecodeErrorKind::SequenceTooDeep { max: 64 },
                ..
            }
        ));
    }

    #[test]
    fn test_moderate_nesting_accepted() {
        let mut value = Value::Integer(1);
        for _ in 0..10 {
            value = Value::Sequence(vec![value]);
        }
        assert_eq!(roundtrip(value.clone()), value);
    }

    #[test]
    fn test_exception_with_content_rejected() {
        let err = decode_value(Bytes::from_static(&[0x80, 0x01, 0x00])).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                kind: DecodeErrorKind::InvalidNull,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let err = decode_value(Bytes::from_static(&[0x47, 0x01, 0x00])).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                kind: DecodeErrorKind::UnsupportedType(0x47),
                ..
            }
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Integer(42).to_string(), "42");
        assert_eq!(
            Value::OctetString(Bytes::from_static(b"hello")).to_string(),
            "hello"
        );
        assert_eq!(
            Value::OctetString(Bytes::from_static(&[0x00, 0xFF])).to_string(),
            "0x00ff"
        );
        assert_eq!(Value::IpAddress([192, 168, 1, 1]).to_string(), "192.168.1.1");
        assert_eq!(Value::NoSuchObject.to_string(), "noSuchObject");
        assert_eq!(Value::EndOfMibView.to_string(), "endOfMibView");
    }

    #[test]
    fn test_tag_assignments() {
        assert_eq!(Value::Integer(0).tag(), 0x02);
        assert_eq!(Value::OctetString(Bytes::new()).tag(), 0x04);
        assert_eq!(Value::Null.tag(), 0x05);
        assert_eq!(Value::ObjectIdentifier(oid!(1, 3)).tag(), 0x06);
        assert_eq!(Value::Sequence(vec![]).tag(), 0x30);
        assert_eq!(Value::IpAddress([0; 4]).tag(), 0x40);
        assert_eq!(Value::Counter32(0).tag(), 0x41);
        assert_eq!(Value::Gauge32(0).tag(), 0x42);
        assert_eq!(Value::TimeTicks(0).tag(), 0x43);
        assert_eq!(Value::Opaque(Bytes::new()).tag(), 0x44);
        assert_eq!(Value::Counter64(0).tag(), 0x46);
        assert_eq!(Value::NoSuchObject.tag(), 0x80);
        assert_eq!(Value::NoSuchInstance.tag(), 0x81);
        assert_eq!(Value::EndOfMibView.tag(), 0x82);
    }
}
