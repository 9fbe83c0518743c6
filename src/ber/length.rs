//! BER definite-length encoding and decoding.
//!
//! Only definite lengths are supported: short form for lengths below 128,
//! long form (0x80 | n, followed by n big-endian octets) otherwise. The
//! indefinite form (0x80 alone) is rejected.

use crate::error::{DecodeErrorKind, Error, Result};

/// Maximum number of long-form length octets accepted on decode.
///
/// Four octets cover lengths up to u32::MAX, far beyond any UDP datagram.
pub const MAX_LENGTH_OCTETS: usize = 4;

/// Encode a BER length.
///
/// Returns a stack-allocated array holding the length octets in REVERSE
/// order (for the backwards writer) and the number of valid octets.
#[inline]
pub fn encode_length(len: usize) -> ([u8; 1 + MAX_LENGTH_OCTETS], usize) {
    let mut out = [0u8; 1 + MAX_LENGTH_OCTETS];

    if len < 128 {
        out[0] = len as u8;
        return (out, 1);
    }

    // Long form: emit value octets first (reversed), then the 0x80|n marker.
    let mut rest = len;
    let mut count = 0;
    while rest > 0 {
        out[count] = (rest & 0xFF) as u8;
        rest >>= 8;
        count += 1;
    }
    out[count] = 0x80 | count as u8;
    (out, count + 1)
}

/// Decode a BER length from the start of `input`.
///
/// Returns the length and the number of octets consumed. The caller is
/// responsible for checking the declared length against the remaining
/// input; `offset` is only used for error reporting.
pub fn decode_length(input: &[u8], offset: usize) -> Result<(usize, usize)> {
    let first = *input
        .first()
        .ok_or_else(|| Error::decode(offset, DecodeErrorKind::TruncatedData))?;

    if first < 0x80 {
        return Ok((first as usize, 1));
    }

    let octets = (first & 0x7F) as usize;
    if octets == 0 {
        return Err(Error::decode(offset, DecodeErrorKind::IndefiniteLength));
    }
    if octets > MAX_LENGTH_OCTETS {
        return Err(Error::decode(offset, DecodeErrorKind::LengthTooLong { octets }));
    }
    if input.len() < 1 + octets {
        return Err(Error::decode(offset, DecodeErrorKind::TruncatedData));
    }

    let mut len: usize = 0;
    for &b in &input[1..1 + octets] {
        len = (len << 8) | b as usize;
    }

    Ok((len, 1 + octets))
}
