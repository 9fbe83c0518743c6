//! USM security parameters and the user database.
//!
//! The security parameters travel inside the v3 message as an OCTET STRING
//! wrapping a SEQUENCE (RFC 3414 Section 2.4):
//!
//! ```text
//! UsmSecurityParameters ::= SEQUENCE {
//!     msgAuthoritativeEngineID     OCTET STRING,
//!     msgAuthoritativeEngineBoots  INTEGER (0..2147483647),
//!     msgAuthoritativeEngineTime   INTEGER (0..2147483647),
//!     msgUserName                  OCTET STRING (SIZE(0..32)),
//!     msgAuthenticationParameters  OCTET STRING,
//!     msgPrivacyParameters         OCTET STRING
//! }
//! ```

use std::collections::HashMap;
use std::sync::RwLock;

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{EncodeErrorKind, Error, Result};
use crate::message::{HeaderData, MsgFlags, ScopedPdu, ScopedPduData, V3Message};
use crate::v3::auth::{AUTH_PARAMS_LEN, LocalizedKey, password_to_key, sign_message};
use crate::v3::engine::DEFAULT_MSG_MAX_SIZE;
use crate::v3::privacy::{PRIV_PARAMS_LEN, PrivKey, encrypt_scoped_pdu};
use crate::v3::{AuthProtocol, PrivProtocol, SecurityLevel};

/// USM security parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UsmSecurityParams {
    /// Authoritative engine identifier (5-32 bytes; empty during discovery).
    pub engine_id: Bytes,
    /// Authoritative engine boot counter.
    pub engine_boots: i32,
    /// Authoritative engine seconds since boot.
    pub engine_time: i32,
    /// User name (empty during discovery).
    pub user_name: Bytes,
    /// HMAC output, 12 bytes when auth is active, else empty.
    pub auth_params: Bytes,
    /// Privacy salt, 8 bytes when privacy is active, else empty.
    pub priv_params: Bytes,
}

impl UsmSecurityParams {
    /// Parameters for a discovery probe: everything empty.
    pub fn discovery() -> Self {
        Self::default()
    }

    /// Encode the parameter SEQUENCE into `buf` (reverse order).
    ///
    /// Returns the reverse-buffer marker taken just after the
    /// msgAuthenticationParameters content was pushed, or `None` when the
    /// auth slot is empty. The caller converts the marker into an absolute
    /// offset once the total message length is known
    /// (`offset = total_len - marker`).
    pub fn encode_fields(&self, buf: &mut EncodeBuf) -> Option<usize> {
        let mut auth_marker = None;
        buf.push_sequence(|buf| {
            buf.push_octet_string(&self.priv_params);

            // Auth params octet string, with a marker on its content so the
            // HMAC can be patched in place later.
            buf.push_bytes(&self.auth_params);
            if !self.auth_params.is_empty() {
                auth_marker = Some(buf.len());
            }
            buf.push_length(self.auth_params.len());
            buf.push_tag(tag::OCTET_STRING);

            buf.push_octet_string(&self.user_name);
            buf.push_integer(self.engine_time);
            buf.push_integer(self.engine_boots);
            buf.push_octet_string(&self.engine_id);
        });
        auth_marker
    }

    /// Decode from the content of the security-parameters OCTET STRING.
    ///
    /// `base` is the absolute offset of that content in the outer message;
    /// the returned offset (when auth params are present) is the absolute
    /// position of the first HMAC byte.
    pub fn decode_tracked(bytes: Bytes, base: usize) -> Result<(Self, Option<usize>)> {
        let mut decoder = Decoder::with_offset(bytes, base);
        let mut seq = decoder.read_sequence()?;

        let engine_id = seq.read_octet_string()?;
        let engine_boots = seq.read_integer()?;
        let engine_time = seq.read_integer()?;
        let user_name = seq.read_octet_string()?;
        let (auth_params, auth_offset) = seq.read_octet_string_tracked()?;
        let priv_params = seq.read_octet_string()?;

        let auth_offset = (!auth_params.is_empty()).then_some(auth_offset);

        Ok((
            Self {
                engine_id,
                engine_boots,
                engine_time,
                user_name,
                auth_params,
                priv_params,
            },
            auth_offset,
        ))
    }
}

/// Configured credentials for one USM user.
#[derive(Debug, Clone)]
pub struct V3User {
    /// User name.
    pub name: Bytes,
    /// Authentication protocol and password, if any.
    pub auth: Option<(AuthProtocol, String)>,
    /// Privacy protocol and password, if any. Requires `auth`.
    pub privacy: Option<(PrivProtocol, String)>,
}

impl V3User {
    /// A noAuthNoPriv user.
    pub fn no_auth(name: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            auth: None,
            privacy: None,
        }
    }

    /// An authNoPriv user.
    pub fn with_auth(
        name: impl Into<Bytes>,
        protocol: AuthProtocol,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            auth: Some((protocol, password.into())),
            privacy: None,
        }
    }

    /// An authPriv user.
    pub fn with_auth_priv(
        name: impl Into<Bytes>,
        auth_protocol: AuthProtocol,
        auth_password: impl Into<String>,
        priv_protocol: PrivProtocol,
        priv_password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            auth: Some((auth_protocol, auth_password.into())),
            privacy: Some((priv_protocol, priv_password.into())),
        }
    }

    /// The security level implied by the configured protocols.
    pub fn security_level(&self) -> SecurityLevel {
        match (&self.auth, &self.privacy) {
            (None, _) => SecurityLevel::NoAuthNoPriv,
            (Some(_), None) => SecurityLevel::AuthNoPriv,
            (Some(_), Some(_)) => SecurityLevel::AuthPriv,
        }
    }

    /// Derive the user's keys localized to `engine_id`.
    pub fn localize(&self, engine_id: &[u8]) -> Result<LocalizedUser> {
        let auth_key = match &self.auth {
            Some((protocol, password)) => {
                let master = password_to_key(password.as_bytes(), *protocol);
                Some((
                    *protocol,
                    master.localize(engine_id),
                ))
            }
            None => None,
        };

        let priv_key = match (&self.privacy, &auth_key) {
            (Some((protocol, password)), Some((auth_protocol, _))) => {
                let master = password_to_key(password.as_bytes(), *auth_protocol);
                let localized = master.localize(engine_id);
                Some((*protocol, PrivKey::derive(&localized, *protocol)))
            }
            _ => None,
        };

        Ok(LocalizedUser {
            name: self.name.clone(),
            level: self.security_level(),
            auth: auth_key,
            privacy: priv_key,
        })
    }
}

/// A user with keys bound to one engine.
#[derive(Debug, Clone)]
pub struct LocalizedUser {
    /// User name.
    pub name: Bytes,
    /// Security level implied by the available keys.
    pub level: SecurityLevel,
    /// Localized authentication key.
    pub auth: Option<(AuthProtocol, LocalizedKey)>,
    /// Derived privacy key.
    pub privacy: Option<(PrivProtocol, PrivKey)>,
}

/// Everything needed to seal an outbound v3 message for a localized user.
///
/// Requests use the remote (discovered) engine parameters; responses use
/// the local authoritative ones.
pub struct SealContext<'a> {
    /// msgID for the envelope.
    pub msg_id: i32,
    /// Whether the sender expects a response or report.
    pub reportable: bool,
    /// Security level to apply. Must not exceed the user's capabilities.
    pub level: SecurityLevel,
    /// Authoritative engine identifier.
    pub engine_id: Bytes,
    /// Authoritative engine boot counter.
    pub engine_boots: i32,
    /// Authoritative engine time.
    pub engine_time: i32,
    /// The user whose keys sign and encrypt the message.
    pub user: &'a LocalizedUser,
    /// Fresh salt; required when `level` includes privacy.
    pub salt: Option<[u8; PRIV_PARAMS_LEN]>,
}

/// Seal a scoped PDU into a complete v3 wire message.
///
/// Privacy first (the scoped PDU becomes ciphertext), then the envelope is
/// encoded with a zeroed auth slot, then the HMAC is patched in by the
/// offset the encoder reported.
pub fn seal_message(ctx: SealContext<'_>, scoped: ScopedPdu) -> Result<Vec<u8>> {
    let auth_active = ctx.level.has_auth();
    let priv_active = ctx.level.has_privacy();

    let auth_key = match (auth_active, &ctx.user.auth) {
        (false, _) => None,
        (true, Some((_, key))) => Some(key),
        (true, None) => return Err(Error::encode(EncodeErrorKind::MissingAuthKey)),
    };

    let (scoped_data, priv_params) = if priv_active {
        let (_, key) = ctx
            .user
            .privacy
            .as_ref()
            .ok_or_else(|| Error::encode(EncodeErrorKind::NoPrivKey))?;
        let salt = ctx
            .salt
            .ok_or_else(|| Error::encode(EncodeErrorKind::NoPrivKey))?;
        let ciphertext = encrypt_scoped_pdu(
            key,
            ctx.engine_boots,
            ctx.engine_time,
            salt,
            &scoped.to_bytes(),
        )?;
        (
            ScopedPduData::Encrypted(Bytes::from(ciphertext)),
            Bytes::copy_from_slice(&salt),
        )
    } else {
        (ScopedPduData::Plaintext(scoped), Bytes::new())
    };

    let mut security_params = UsmSecurityParams {
        engine_id: ctx.engine_id,
        engine_boots: ctx.engine_boots,
        engine_time: ctx.engine_time,
        user_name: ctx.user.name.clone(),
        auth_params: Bytes::new(),
        priv_params,
    };
    if auth_active {
        security_params.auth_params = Bytes::from_static(&[0u8; AUTH_PARAMS_LEN]);
    }

    let flags = MsgFlags {
        auth: auth_active,
        privacy: priv_active,
        reportable: ctx.reportable,
    };
    let message = V3Message {
        header: HeaderData::usm(ctx.msg_id, DEFAULT_MSG_MAX_SIZE, flags),
        security_params,
        scoped_pdu: scoped_data,
    };

    let encoded = message.encode();
    let mut bytes = encoded.bytes;

    if let Some(key) = auth_key {
        let offset = encoded
            .auth_params_offset
            .ok_or_else(|| Error::encode(EncodeErrorKind::MissingAuthParams))?;
        sign_message(key, &mut bytes, offset)?;
    }

    Ok(bytes)
}

/// Process-wide user database.
///
/// Reads are concurrent; mutation is serialized behind the lock. Users are
/// localized to the owning engine when added, so lookups on the hot inbound
/// path never re-derive keys.
pub struct UserDb {
    engine_id: Bytes,
    users: RwLock<HashMap<Bytes, LocalizedUser>>,
}

impl UserDb {
    /// Create an empty database owned by the engine with `engine_id`.
    pub fn new(engine_id: Bytes) -> Self {
        Self {
            engine_id,
            users: RwLock::new(HashMap::new()),
        }
    }

    /// Add (or replace) a user, deriving its localized keys.
    pub fn add_user(&self, user: V3User) -> Result<()> {
        let localized = user.localize(&self.engine_id)?;
        tracing::debug!(
            snmp.user = %String::from_utf8_lossy(&localized.name),
            snmp.level = ?localized.level,
            "adding USM user"
        );
        self.users
            .write()
            .expect("user db lock poisoned")
            .insert(localized.name.clone(), localized);
        Ok(())
    }

    /// Remove a user by name. Returns true if it existed.
    pub fn remove_user(&self, name: &[u8]) -> bool {
        self.users
            .write()
            .expect("user db lock poisoned")
            .remove(name)
            .is_some()
    }

    /// Look up a user by name.
    pub fn lookup(&self, name: &[u8]) -> Option<LocalizedUser> {
        self.users
            .read()
            .expect("user db lock poisoned")
            .get(name)
            .cloned()
    }
}
