//! BER decoding.
//!
//! [`Decoder`] is a cursor over a byte slice. Every read records the absolute
//! offset of the bytes it consumed, measured from the start of the outermost
//! message, so decode errors carry exact positions and the v3 layer can locate
//! the authentication-parameters slot without searching.

use bytes::Bytes;

use super::length::decode_length;
use super::tag;
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;

/// Cursor for BER decoding with absolute offset tracking.
pub struct Decoder {
    data: Bytes,
    pos: usize,
    /// Absolute offset of `data[0]` within the outermost message.
    base: usize,
}

impl Decoder {
    /// Create a decoder over a complete message.
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            pos: 0,
            base: 0,
        }
    }

    /// Create a decoder over a slice extracted from a larger message.
    ///
    /// `base` is the absolute offset of `data[0]` in the outer message, so
    /// positions reported by this decoder stay absolute.
    pub fn with_offset(data: Bytes, base: usize) -> Self {
        Self { data, pos: 0, base }
    }

    /// Absolute offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.base + self.pos
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Check whether all input has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Peek the next tag byte without consuming it.
    pub fn peek_tag(&self) -> Result<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or_else(|| Error::decode(self.position(), DecodeErrorKind::TruncatedData))
    }

    /// Read one TLV, returning (tag, content, absolute offset of content).
    ///
    /// Rejects multi-byte tags and any declared length that exceeds the
    /// remaining input.
    pub fn read_tlv(&mut self) -> Result<(u8, Bytes, usize)> {
        let tag_offset = self.position();
        let tag_byte = self.peek_tag()?;
        if tag::is_multi_byte(tag_byte) {
            return Err(Error::decode(tag_offset, DecodeErrorKind::MultiByteTag));
        }
        self.pos += 1;

        let (len, len_octets) = decode_length(&self.data[self.pos..], self.position())?;
        self.pos += len_octets;

        if len > self.remaining() {
            return Err(Error::decode(self.position(), DecodeErrorKind::TlvOverflow));
        }

        let content_offset = self.position();
        let content = self.data.slice(self.pos..self.pos + len);
        self.pos += len;

        Ok((tag_byte, content, content_offset))
    }

    /// Read a TLV and require a specific tag.
    pub fn read_expected(&mut self, expected: u8) -> Result<(Bytes, usize)> {
        let tag_offset = self.position();
        let (actual, content, content_offset) = self.read_tlv()?;
        if actual != expected {
            return Err(Error::decode(
                tag_offset,
                DecodeErrorKind::UnexpectedTag { expected, actual },
            ));
        }
        Ok((content, content_offset))
    }

    /// Read a constructed TLV and return a sub-decoder over its content.
    ///
    /// The sub-decoder's offsets remain absolute with respect to the
    /// outermost message.
    pub fn read_constructed(&mut self, expected: u8) -> Result<Decoder> {
        let (content, content_offset) = self.read_expected(expected)?;
        Ok(Decoder {
            data: content,
            pos: 0,
            base: content_offset,
        })
    }

    /// Read a SEQUENCE and return a sub-decoder over its content.
    pub fn read_sequence(&mut self) -> Result<Decoder> {
        self.read_constructed(tag::SEQUENCE)
    }

    /// Read an INTEGER.
    pub fn read_integer(&mut self) -> Result<i32> {
        let (content, offset) = self.read_expected(tag::INTEGER)?;
        decode_integer(&content, offset)
    }

    /// Read an OCTET STRING.
    pub fn read_octet_string(&mut self) -> Result<Bytes> {
        let (content, _) = self.read_expected(tag::OCTET_STRING)?;
        Ok(content)
    }

    /// Read an OCTET STRING, also returning the absolute offset of its content.
    pub fn read_octet_string_tracked(&mut self) -> Result<(Bytes, usize)> {
        self.read_expected(tag::OCTET_STRING)
    }

    /// Read a NULL.
    pub fn read_null(&mut self) -> Result<()> {
        let (content, offset) = self.read_expected(tag::NULL)?;
        if !content.is_empty() {
            return Err(Error::decode(offset, DecodeErrorKind::InvalidNull));
        }
        Ok(())
    }

    /// Read an OBJECT IDENTIFIER.
    pub fn read_oid(&mut self) -> Result<Oid> {
        let (content, offset) = self.read_expected(tag::OBJECT_IDENTIFIER)?;
        Oid::from_ber(&content).map_err(|_| Error::decode(offset, DecodeErrorKind::InvalidOidEncoding))
    }

    /// Read an IP address (application tag 0x40, exactly four bytes).
    pub fn read_ip_address(&mut self) -> Result<[u8; 4]> {
        let (content, offset) = self.read_expected(tag::IP_ADDRESS)?;
        if content.len() != 4 {
            return Err(Error::decode(
                offset,
                DecodeErrorKind::InvalidIpAddressLength {
                    length: content.len(),
                },
            ));
        }
        Ok([content[0], content[1], content[2], content[3]])
    }

    /// Read an unsigned 32-bit application type with a specific tag.
    pub fn read_unsigned32(&mut self, expected: u8) -> Result<u32> {
        let (content, offset) = self.read_expected(expected)?;
        decode_unsigned32(&content, offset)
    }

    /// Read a Counter64.
    pub fn read_counter64(&mut self) -> Result<u64> {
        let (content, offset) = self.read_expected(tag::COUNTER64)?;
        decode_unsigned64(&content, offset)
    }
}

/// Decode a two's-complement integer body into an i32.
///
/// Sign-extends from the first byte; accepts a redundant sign octet as
/// produced by permissive encoders, rejects empty bodies and values
/// outside the i32 range.
pub fn decode_integer(content: &[u8], offset: usize) -> Result<i32> {
    if content.is_empty() {
        return Err(Error::decode(offset, DecodeErrorKind::ZeroLengthInteger));
    }
    if content.len() > 5 {
        return Err(Error::decode(offset, DecodeErrorKind::IntegerOverflow));
    }

    let mut acc: i64 = if content[0] & 0x80 != 0 { -1 } else { 0 };
    for &b in content {
        acc = (acc << 8) | b as i64;
    }

    i32::try_from(acc).map_err(|_| Error::decode(offset, DecodeErrorKind::IntegerOverflow))
}

/// Decode an unsigned big-endian body into a u32.
pub fn decode_unsigned32(content: &[u8], offset: usize) -> Result<u32> {
    if content.is_empty() {
        return Err(Error::decode(offset, DecodeErrorKind::ZeroLengthInteger));
    }

    let mut acc: u64 = 0;
    for &b in content {
        acc = (acc << 8) | b as u64;
        if acc > u32::MAX as u64 {
            return Err(Error::decode(offset, DecodeErrorKind::IntegerOverflow));
        }
    }
    Ok(acc as u32)
}

/// Decode an unsigned big-endian body into a u64.
pub fn decode_unsigned64(content: &[u8], offset: usize) -> Result<u64> {
    if content.is_empty() {
        return Err(Error::decode(offset, DecodeErrorKind::ZeroLengthInteger));
    }

    let mut acc: u64 = 0;
    for &b in content {
        if acc >> 56 != 0 {
            return Err(Error::decode(offset, DecodeErrorKind::IntegerOverflow));
        }
        acc = (acc << 8) | b as u64;
    }
    Ok(acc)
}
