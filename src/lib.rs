//! Async SNMP v1/v2c/v3 core for Rust.
//!
//! This crate implements the wire-level heart of SNMP: a BER codec for the
//! SMI type system, PDU and message assembly for all three protocol
//! versions, and the User-based Security Model (USM) for authenticated and
//! encrypted v3 exchanges (RFC 3411-3416, RFC 3826).
//!
//! # Layers
//!
//! - [`ber`] - tag/length/value encoding and decoding (definite lengths,
//!   single-byte tags, deterministic minimal output).
//! - [`oid`], [`value`], [`varbind`] - the SMI data model.
//! - [`pdu`], [`message`] - operations and their v1/v2c/v3 envelopes.
//! - [`v3`] - key localization, HMAC authentication, DES/AES privacy,
//!   engine identity and discovery, and the agent-side inbound pipeline.
//! - [`client`] - the request/response engine: id allocation, timeouts and
//!   retries, duplicate discard, cancellation, walks, traps.
//! - [`transport`] - the byte channel the client drives; one UDP
//!   implementation is included.
//!
//! # Example
//!
//! ```rust,no_run
//! use rsnmp::{Client, ClientConfig, oid};
//! use rsnmp::transport::UdpTransport;
//!
//! # async fn example() -> rsnmp::Result<()> {
//! let transport = UdpTransport::connect("192.0.2.1:161".parse().unwrap()).await?;
//! let client = Client::new(transport, ClientConfig::default());
//!
//! let vb = client.get(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await?;
//! println!("sysDescr = {}", vb.value);
//! # Ok(())
//! # }
//! ```
//!
//! # SNMPv3
//!
//! ```rust,no_run
//! use rsnmp::{Client, ClientConfig, Version, oid};
//! use rsnmp::client::V3Security;
//! use rsnmp::transport::UdpTransport;
//! use rsnmp::v3::{AuthProtocol, PrivProtocol, V3User};
//!
//! # async fn example() -> rsnmp::Result<()> {
//! let transport = UdpTransport::connect("192.0.2.1:161".parse().unwrap()).await?;
//! let config = ClientConfig {
//!     version: Version::V3,
//!     v3_security: Some(V3Security::new(V3User::with_auth_priv(
//!         "operator",
//!         AuthProtocol::Sha256,
//!         "authpass123",
//!         PrivProtocol::Aes128,
//!         "privpass123",
//!     ))),
//!     ..Default::default()
//! };
//! let client = Client::new(transport, config);
//!
//! // Engine discovery and key localization happen on first use.
//! let vb = client.get(&oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)).await?;
//! println!("sysName = {}", vb.value);
//! # Ok(())
//! # }
//! ```

pub mod ber;
pub mod client;
pub mod error;
pub mod message;
pub mod oid;
pub mod pdu;
pub mod prelude;
pub mod transport;
pub mod util;
pub mod v3;
pub mod value;
pub mod varbind;
pub mod version;

pub use client::{Client, ClientConfig, V3Security};
pub use error::{Error, ErrorStatus, Result};
pub use oid::Oid;
pub use pdu::Pdu;
pub use value::Value;
pub use varbind::VarBind;
pub use version::Version;
