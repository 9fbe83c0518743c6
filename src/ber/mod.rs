//! BER (Basic Encoding Rules) codec for SNMP.
//!
//! This module provides encoding and decoding of BER-encoded data as used in SNMP:
//! definite lengths only, single-byte tags only, deterministic minimal output.

mod decode;
mod encode;
mod length;
pub mod tag;

pub use decode::*;
pub use encode::*;
pub use length::*;
