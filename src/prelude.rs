//! Prelude module for convenient imports.
//!
//! # Usage
//!
//! ```rust,no_run
//! use rsnmp::prelude::*;
//! ```
//!
//! This imports:
//! - Core types: [`Client`], [`Oid`], [`Value`], [`VarBind`]
//! - Error handling: [`Error`], [`Result`]
//! - V3 protocols: [`AuthProtocol`], [`PrivProtocol`], [`V3User`]
//! - The [`oid!`] macro for OID literals

pub use crate::client::{Client, ClientConfig, V3Security};
pub use crate::error::{Error, Result};
pub use crate::oid::Oid;
pub use crate::v3::{AuthProtocol, PrivProtocol, SecurityLevel, V3User};
pub use crate::value::Value;
pub use crate::varbind::VarBind;
pub use crate::version::Version;

#[doc(no_inline)]
pub use crate::oid;
