//! Internal utilities.

use std::fmt;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

/// Encode bytes as a lowercase hex string.
pub fn encode_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Decode a hex string to bytes.
///
/// Available in tests and when the `testing` feature is enabled.
#[cfg(any(test, feature = "testing"))]
pub fn decode_hex(s: &str) -> Result<Vec<u8>, HexDecodeError> {
    let digits = s.as_bytes();
    if digits.len() % 2 != 0 {
        return Err(HexDecodeError::OddLength);
    }

    digits
        .chunks_exact(2)
        .map(|pair| {
            let hi = (pair[0] as char)
                .to_digit(16)
                .ok_or(HexDecodeError::InvalidChar)?;
            let lo = (pair[1] as char)
                .to_digit(16)
                .ok_or(HexDecodeError::InvalidChar)?;
            Ok((hi * 16 + lo) as u8)
        })
        .collect()
}

/// Error type for hex decoding.
#[cfg(any(test, feature = "testing"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HexDecodeError {
    /// Input has odd length (must be pairs of hex digits)
    OddLength,
    /// Invalid hexadecimal character
    InvalidChar,
}

/// Hex formatter for tracing fields; formats only if the event is enabled.
pub(crate) struct HexBytes<'a>(pub &'a [u8]);

impl fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|b| write!(f, "{b:02x}"))
    }
}

impl fmt::Debug for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Bind a UDP socket suitable for SNMP traffic.
///
/// v6 sockets are kept v6-only (no mapped-v4 traffic), the address is
/// reusable so quick restarts do not fail, and the socket goes
/// non-blocking before tokio takes it over.
pub(crate) async fn bind_udp_socket(addr: SocketAddr) -> io::Result<UdpSocket> {
    let socket = match addr {
        SocketAddr::V4(_) => Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?,
        SocketAddr::V6(_) => {
            let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
            socket.set_only_v6(true)?;
            socket
        }
    };

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;

    UdpSocket::from_std(socket.into())
}

/// Bind an ephemeral socket in the same address family as `target`.
pub(crate) async fn bind_ephemeral_udp_socket(target: SocketAddr) -> io::Result<UdpSocket> {
    let wildcard: SocketAddr = if target.is_ipv6() {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    };

    bind_udp_socket(wildcard).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_hex() {
        assert_eq!(encode_hex(&[]), "");
        assert_eq!(encode_hex(&[0x00]), "00");
        assert_eq!(encode_hex(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
        assert_eq!(encode_hex(b"SNMP"), "534e4d50");
    }

    #[test]
    fn test_decode_hex() {
        assert_eq!(decode_hex("").unwrap(), Vec::<u8>::new());
        assert_eq!(decode_hex("00ff").unwrap(), vec![0x00, 0xff]);
        // Case-insensitive
        assert_eq!(decode_hex("DeAdBeEf").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn test_decode_hex_errors() {
        assert_eq!(decode_hex("abc"), Err(HexDecodeError::OddLength));
        assert_eq!(decode_hex("zz"), Err(HexDecodeError::InvalidChar));
        assert_eq!(decode_hex("0 "), Err(HexDecodeError::InvalidChar));
    }

    #[test]
    fn test_hex_roundtrip() {
        let all: Vec<u8> = (0..=255).collect();
        assert_eq!(decode_hex(&encode_hex(&all)).unwrap(), all);
    }

    #[test]
    fn test_hex_bytes_formatter() {
        assert_eq!(HexBytes(&[0x80, 0x00, 0x1f]).to_string(), "80001f");
        assert_eq!(format!("{:?}", HexBytes(&[0xab])), "ab");
    }

    #[tokio::test]
    async fn test_bind_v4_wildcard() {
        let socket = bind_udp_socket((Ipv4Addr::LOCALHOST, 0).into()).await.unwrap();
        let local = socket.local_addr().unwrap();
        assert!(local.is_ipv4());
        assert_ne!(local.port(), 0);
    }

    #[tokio::test]
    async fn test_ephemeral_follows_target_family() {
        let target: SocketAddr = "192.0.2.1:161".parse().unwrap();
        let socket = bind_ephemeral_udp_socket(target).await.unwrap();
        assert!(socket.local_addr().unwrap().is_ipv4());
    }
}
