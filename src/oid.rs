//! Object identifier (OID) type.
//!
//! An OID is an ordered sequence of unsigned 32-bit arcs. The first arc is
//! 0, 1, or 2; the second is constrained so the packed leading octet of the
//! BER form (`40*first + second`) fits in a single byte. Comparison is
//! arc-by-arc, which matches the lexicographic MIB ordering agents use for
//! GETNEXT.

use smallvec::SmallVec;

use crate::error::{Error, OidErrorKind, Result};

/// Maximum number of arcs accepted in an OID (matches net-snmp's limit).
pub const MAX_OID_LEN: usize = 128;

/// Inline arc capacity. Most real-world OIDs (MIB-2, enterprise trees) fit
/// without spilling to the heap.
const INLINE_ARCS: usize = 12;

/// Object identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid {
    arcs: SmallVec<[u32; INLINE_ARCS]>,
}

impl Oid {
    /// Create an OID from a slice of arcs, validating SNMP conventions.
    pub fn new(arcs: &[u32]) -> Result<Self> {
        if arcs.is_empty() {
            return Err(Error::invalid_oid(OidErrorKind::Empty));
        }
        if arcs.len() < 2 {
            return Err(Error::invalid_oid(OidErrorKind::TooShort));
        }
        if arcs.len() > MAX_OID_LEN {
            return Err(Error::invalid_oid(OidErrorKind::TooManyArcs {
                count: arcs.len(),
                max: MAX_OID_LEN,
            }));
        }

        let first = arcs[0];
        let second = arcs[1];
        if first > 2 {
            return Err(Error::invalid_oid(OidErrorKind::InvalidFirstArc(first)));
        }
        // The packed first octet 40*first + second must stay below 0x80 so the
        // encoding remains a single byte and round-trips are exact.
        let second_max = if first < 2 { 39 } else { 47 };
        if second > second_max {
            return Err(Error::invalid_oid(OidErrorKind::InvalidSecondArc {
                first,
                second,
            }));
        }

        Ok(Self {
            arcs: SmallVec::from_slice(arcs),
        })
    }

    /// Parse an OID from dotted-decimal notation, e.g. `"1.3.6.1.2.1.1.1.0"`.
    ///
    /// A leading dot is accepted (`".1.3.6.1"`).
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.strip_prefix('.').unwrap_or(s);
        if trimmed.is_empty() {
            return Err(Error::invalid_oid_with_input(OidErrorKind::Empty, s));
        }

        let mut arcs: SmallVec<[u32; INLINE_ARCS]> = SmallVec::new();
        for part in trimmed.split('.') {
            let arc: u32 = part
                .parse()
                .map_err(|_| Error::invalid_oid_with_input(OidErrorKind::InvalidArc, s))?;
            arcs.push(arc);
        }

        match Self::new(&arcs) {
            Ok(oid) => Ok(oid),
            Err(Error::InvalidOid { kind, .. }) => {
                Err(Error::invalid_oid_with_input(kind, s))
            }
            Err(e) => Err(e),
        }
    }

    /// The arcs as a slice.
    pub fn as_slice(&self) -> &[u32] {
        &self.arcs
    }

    /// Number of arcs.
    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    /// Always false for a constructed OID; present for API completeness.
    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    /// Check whether `self` is equal to or lies under `prefix`.
    pub fn starts_with(&self, prefix: &Oid) -> bool {
        self.arcs.len() >= prefix.arcs.len() && self.arcs[..prefix.arcs.len()] == prefix.arcs[..]
    }

    /// Return a new OID with `arc` appended.
    pub fn child(&self, arc: u32) -> Result<Self> {
        if self.arcs.len() + 1 > MAX_OID_LEN {
            return Err(Error::invalid_oid(OidErrorKind::TooManyArcs {
                count: self.arcs.len() + 1,
                max: MAX_OID_LEN,
            }));
        }
        let mut arcs = self.arcs.clone();
        arcs.push(arc);
        Ok(Self { arcs })
    }

    /// Encode the OID content octets (no tag/length) into a small vector.
    ///
    /// The first two arcs pack into one octet; every further arc is base-128
    /// with the continuation bit on all but the final octet.
    pub fn to_ber_smallvec(&self) -> SmallVec<[u8; 24]> {
        let mut out: SmallVec<[u8; 24]> = SmallVec::new();

        // Validated at construction: 40*a + b <= 127
        out.push((self.arcs[0] * 40 + self.arcs[1]) as u8);

        for &arc in &self.arcs[2..] {
            push_base128(&mut out, arc);
        }
        out
    }

    /// Decode an OID from BER content octets (no tag/length).
    pub fn from_ber(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::invalid_oid(OidErrorKind::Empty));
        }

        let packed = data[0];
        if packed & 0x80 != 0 {
            // A continuation bit in the leading octet means the encoder used a
            // multi-octet first group, which this codec never produces.
            return Err(Error::invalid_oid(OidErrorKind::InvalidArc));
        }

        let mut arcs: SmallVec<[u32; INLINE_ARCS]> = SmallVec::new();
        if packed < 40 {
            arcs.push(0);
            arcs.push(packed as u32);
        } else if packed < 80 {
            arcs.push(1);
            arcs.push(packed as u32 - 40);
        } else {
            arcs.push(2);
            arcs.push(packed as u32 - 80);
        }

        let mut acc: u32 = 0;
        let mut in_group = false;
        for &b in &data[1..] {
            if !in_group && b == 0x80 {
                // Redundant leading zero group is non-canonical
                return Err(Error::invalid_oid(OidErrorKind::InvalidArc));
            }
            if acc >> 25 != 0 {
                return Err(Error::invalid_oid(OidErrorKind::SubidentifierOverflow));
            }
            acc = (acc << 7) | (b & 0x7F) as u32;
            if b & 0x80 != 0 {
                in_group = true;
                continue;
            }
            if arcs.len() == MAX_OID_LEN {
                return Err(Error::invalid_oid(OidErrorKind::TooManyArcs {
                    count: arcs.len() + 1,
                    max: MAX_OID_LEN,
                }));
            }
            arcs.push(acc);
            acc = 0;
            in_group = false;
        }

        if in_group {
            // Continuation bit set on the final octet: unterminated group
            return Err(Error::invalid_oid(OidErrorKind::InvalidArc));
        }

        Ok(Self { arcs })
    }
}

fn push_base128(out: &mut SmallVec<[u8; 24]>, arc: u32) {
    if arc < 0x80 {
        out.push(arc as u8);
        return;
    }

    // Most significant group first; all but the last carry the high bit.
    let mut groups = [0u8; 5];
    let mut n = 0;
    let mut rest = arc;
    while rest > 0 {
        groups[n] = (rest & 0x7F) as u8;
        rest >>= 7;
        n += 1;
    }
    for i in (1..n).rev() {
        out.push(groups[i] | 0x80);
    }
    out.push(groups[0]);
}

impl std::str::FromStr for Oid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for arc in &self.arcs {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{}", arc)?;
            first = false;
        }
        Ok(())
    }
}

impl TryFrom<&[u32]> for Oid {
    type Error = Error;

    fn try_from(arcs: &[u32]) -> Result<Self> {
        Self::new(arcs)
    }
}

/// Construct an [`Oid`] from literal arcs, panicking on invalid input.
///
/// ```
/// use rsnmp::oid;
/// let sys_descr = oid!(1, 3, 6, 1, 2, 1, 1, 1, 0);
/// assert_eq!(sys_descr.to_string(), "1.3.6.1.2.1.1.1.0");
/// ```
#[macro_export]
macro_rules! oid {
    ($($arc:expr),+ $(,)?) => {
        $crate::oid::Oid::new(&[$($arc),+]).expect("invalid OID literal")
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ber::{Decoder, EncodeBuf};
    use crate::oid;
    use bytes::Bytes;

    #[test]
    fn test_sys_descr_wire_form() {
        // 1.3.6.1.2.1.1.1.0 => 06 08 2B 06 01 02 01 01 01 00
        let oid = oid!(1, 3, 6, 1, 2, 1, 1, 1, 0);
        let mut buf = EncodeBuf::new();
        buf.push_oid(&oid);
        let bytes = buf.finish();
        assert_eq!(
            &bytes[..],
            &[0x06, 0x08, 0x2B, 0x06, 0x01, 0x02, 0x01, 0x01, 0x01, 0x00]
        );

        let decoded = Decoder::new(bytes).read_oid().unwrap();
        assert_eq!(decoded, oid);
        assert_eq!(decoded.len(), 9);
    }

    #[test]
    fn test_multi_octet_arcs() {
        // 1.2.840.113549 => 2A 86 48 86 F7 0D (PKCS arc, classic vector)
        let oid = oid!(1, 2, 840, 113549);
        let ber = oid.to_ber_smallvec();
        assert_eq!(&ber[..], &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D]);
        assert_eq!(Oid::from_ber(&ber).unwrap(), oid);
    }

    #[test]
    fn test_max_arc_roundtrip() {
        let oid = oid!(1, 3, u32::MAX);
        let ber = oid.to_ber_smallvec();
        assert_eq!(&ber[..], &[0x2B, 0x8F, 0xFF, 0xFF, 0xFF, 0x7F]);
        assert_eq!(Oid::from_ber(&ber).unwrap(), oid);
    }

    #[test]
    fn test_from_ber_rejects_arc_overflow() {
        // One more significant bit than u32::MAX
        let err = Oid::from_ber(&[0x2B, 0x90, 0x80, 0x80, 0x80, 0x00]).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidOid {
                kind: OidErrorKind::SubidentifierOverflow,
                ..
            }
        ));
    }

    #[test]
    fn test_from_ber_rejects_unterminated_group() {
        let err = Oid::from_ber(&[0x2B, 0x86]).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidOid {
                kind: OidErrorKind::InvalidArc,
                ..
            }
        ));
    }

    #[test]
    fn test_from_ber_rejects_empty() {
        assert!(Oid::from_ber(&[]).is_err());
    }

    #[test]
    fn test_first_arc_validation() {
        assert!(Oid::new(&[3, 1]).is_err());
        assert!(Oid::new(&[0, 39]).is_ok());
        assert!(Oid::new(&[0, 40]).is_err());
        assert!(Oid::new(&[1, 39]).is_ok());
        assert!(Oid::new(&[1, 40]).is_err());
        assert!(Oid::new(&[2, 47]).is_ok());
        assert!(Oid::new(&[2, 48]).is_err());
    }

    #[test]
    fn test_too_short() {
        let err = Oid::new(&[1]).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidOid {
                kind: OidErrorKind::TooShort,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_dotted() {
        let oid = Oid::parse("1.3.6.1.2.1.1.1.0").unwrap();
        assert_eq!(oid, oid!(1, 3, 6, 1, 2, 1, 1, 1, 0));

        // Leading dot tolerated
        assert_eq!(Oid::parse(".1.3.6").unwrap(), oid!(1, 3, 6));

        assert!(Oid::parse("").is_err());
        assert!(Oid::parse("1.3.abc").is_err());
        assert!(Oid::parse("1..3").is_err());
    }

    #[test]
    fn test_parse_error_carries_input() {
        let err = Oid::parse("9.9.9").unwrap_err();
        match err {
            Error::InvalidOid { input, .. } => assert_eq!(input.as_deref(), Some("9.9.9")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_ordering_is_arcwise() {
        let a = oid!(1, 3, 6, 1, 2);
        let b = oid!(1, 3, 6, 1, 2, 1);
        let c = oid!(1, 3, 6, 1, 3);
        assert!(a < b);
        assert!(b < c);
        assert!(a < c);
    }

    #[test]
    fn test_starts_with() {
        let base = oid!(1, 3, 6, 1, 2, 1, 1);
        assert!(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0).starts_with(&base));
        assert!(base.starts_with(&base));
        assert!(!oid!(1, 3, 6, 1, 2, 1, 2, 1, 0).starts_with(&base));
        assert!(!oid!(1, 3, 6).starts_with(&base));
    }

    #[test]
    fn test_display() {
        assert_eq!(oid!(1, 3, 6, 1).to_string(), "1.3.6.1");
    }

    #[test]
    fn test_child() {
        let base = oid!(1, 3, 6);
        assert_eq!(base.child(1).unwrap(), oid!(1, 3, 6, 1));
    }

    #[test]
    fn test_canonical_encoding_distinct() {
        // Distinct OIDs must never share a byte encoding.
        let mut decoder_input: Vec<(Oid, Vec<u8>)> = Vec::new();
        for oid in [
            oid!(1, 3, 6),
            oid!(1, 3, 6, 1),
            oid!(1, 3, 127),
            oid!(1, 3, 128),
            oid!(0, 1),
            oid!(2, 47),
        ] {
            let ber = oid.to_ber_smallvec().to_vec();
            assert!(
                !decoder_input.iter().any(|(_, b)| *b == ber),
                "duplicate encoding for {oid}"
            );
            decoder_input.push((oid, ber));
        }
    }

    #[test]
    fn test_decoder_read_oid_via_bytes() {
        let bytes = Bytes::from_static(&[0x06, 0x03, 0x2B, 0x06, 0x01]);
        let oid = Decoder::new(bytes).read_oid().unwrap();
        assert_eq!(oid, oid!(1, 3, 6, 1));
    }
}
