//! Agent-side USM inbound processing.
//!
//! [`UsmProcessor`] takes a raw v3 datagram and either yields a cleartext
//! scoped PDU for dispatch, produces a Report message for the peer, or
//! drops the datagram. Policy failures answer with the matching usmStats
//! report; malformed or undecryptable input is dropped without a reply so
//! the agent never amplifies garbage.

use std::sync::Arc;

use bytes::Bytes;

use crate::message::{
    HeaderData, MsgFlags, ScopedPdu, ScopedPduData, V3Message,
};
use crate::oid::Oid;
use crate::pdu::Pdu;
use crate::v3::auth::verify_message;
use crate::v3::engine::{
    DEFAULT_MSG_MAX_SIZE, EngineState, usm_stats_not_in_time_windows, usm_stats_unknown_engine_ids,
    usm_stats_unknown_user_names, usm_stats_unsupported_sec_levels, usm_stats_wrong_digests,
};
use crate::v3::privacy::{SaltCounter, decrypt_scoped_pdu};
use crate::v3::usm::{LocalizedUser, SealContext, UserDb, UsmSecurityParams, seal_message};
use crate::v3::SecurityLevel;
use crate::value::Value;
use crate::varbind::VarBind;
use crate::error::Result;

/// Context carried from an accepted request to its response, so the reply
/// mirrors the request's msgID, security level, and scoped-PDU context.
#[derive(Debug)]
pub struct ReplyContext {
    /// msgID to echo.
    pub msg_id: i32,
    /// Security level the request used (response mirrors it).
    pub level: SecurityLevel,
    /// The authenticated user, when the level includes auth.
    pub user: Option<LocalizedUser>,
    /// Context name to echo.
    pub context_name: Bytes,
}

/// Outcome of inbound processing.
pub enum Inbound {
    /// Verified (and decrypted) request, ready for dispatch.
    Request {
        /// The cleartext scoped PDU.
        scoped: ScopedPdu,
        /// Context for sealing the response.
        reply: ReplyContext,
    },
    /// A Report message to send back to the peer.
    Report(Vec<u8>),
    /// Drop silently (malformed input, decryption failure).
    Drop,
}

/// The USM inbound/outbound pipeline of an authoritative engine.
pub struct UsmProcessor {
    engine: Arc<EngineState>,
    users: Arc<UserDb>,
    salts: SaltCounter,
}

impl UsmProcessor {
    /// Create a processor over the engine state and user database.
    pub fn new(engine: Arc<EngineState>, users: Arc<UserDb>) -> Result<Self> {
        Ok(Self {
            engine,
            users,
            salts: SaltCounter::new()?,
        })
    }

    /// The engine this processor speaks for.
    pub fn engine(&self) -> &EngineState {
        &self.engine
    }

    /// Run the inbound pipeline over a raw datagram.
    pub fn process_incoming(&self, bytes: Bytes) -> Inbound {
        let decoded = match V3Message::decode(bytes) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::debug!(error = %e, "dropping malformed v3 message");
                return Inbound::Drop;
            }
        };

        let msg = &decoded.message;
        let flags = msg.header.flags;
        let msg_id = msg.header.msg_id;
        let params = &msg.security_params;

        // Echo the inner request-id in reports when the PDU is readable.
        let request_id = match &msg.scoped_pdu {
            ScopedPduData::Plaintext(scoped) => scoped.pdu.request_id().unwrap_or(0),
            ScopedPduData::Encrypted(_) => 0,
        };

        // Discovery probe or stale engine id
        if params.engine_id.is_empty() || params.engine_id != *self.engine.engine_id() {
            if params.engine_id.is_empty() {
                tracing::trace!(snmp.msg_id = msg_id, "engine discovery probe");
            } else {
                tracing::debug!(
                    snmp.engine_id = %crate::util::HexBytes(&params.engine_id),
                    "unknown engine id"
                );
            }
            return self.report(
                msg_id,
                request_id,
                &params.user_name,
                usm_stats_unknown_engine_ids(),
            );
        }

        // Timeliness applies to authenticated traffic
        if flags.auth && !self.engine.is_time_valid(params.engine_boots, params.engine_time) {
            tracing::debug!(
                snmp.peer_boots = params.engine_boots,
                snmp.peer_time = params.engine_time,
                snmp.boots = self.engine.boots(),
                snmp.time = self.engine.engine_time(),
                "message outside time window"
            );
            return self.report(
                msg_id,
                request_id,
                &params.user_name,
                usm_stats_not_in_time_windows(),
            );
        }

        let Some(user) = self.users.lookup(&params.user_name) else {
            tracing::debug!(
                snmp.user = %String::from_utf8_lossy(&params.user_name),
                "unknown user name"
            );
            return self.report(
                msg_id,
                request_id,
                &params.user_name,
                usm_stats_unknown_user_names(),
            );
        };

        // Message security level must not exceed the user's capabilities
        if (flags.auth && user.auth.is_none()) || (flags.privacy && user.privacy.is_none()) {
            return self.report(
                msg_id,
                request_id,
                &params.user_name,
                usm_stats_unsupported_sec_levels(),
            );
        }

        if flags.auth {
            let verified = decoded
                .auth_params_offset
                .and_then(|offset| {
                    let (_, key) = user.auth.as_ref()?;
                    verify_message(key, &decoded.raw, offset).ok()
                })
                .is_some();
            if !verified {
                tracing::debug!(
                    snmp.user = %String::from_utf8_lossy(&params.user_name),
                    "HMAC verification failed"
                );
                return self.report(
                    msg_id,
                    request_id,
                    &params.user_name,
                    usm_stats_wrong_digests(),
                );
            }
        }

        let scoped = match &msg.scoped_pdu {
            ScopedPduData::Plaintext(scoped) => {
                if flags.privacy {
                    return Inbound::Drop;
                }
                scoped.clone()
            }
            ScopedPduData::Encrypted(ciphertext) => {
                let Some((_, key)) = user.privacy.as_ref() else {
                    return Inbound::Drop;
                };
                let plaintext = match decrypt_scoped_pdu(
                    key,
                    params.engine_boots,
                    params.engine_time,
                    &params.priv_params,
                    ciphertext,
                ) {
                    Ok(plaintext) => plaintext,
                    Err(e) => {
                        tracing::debug!(error = %e, "dropping undecryptable message");
                        return Inbound::Drop;
                    }
                };
                match ScopedPdu::from_bytes(Bytes::from(plaintext)) {
                    Ok(scoped) => scoped,
                    Err(e) => {
                        tracing::debug!(error = %e, "decrypted scoped PDU is malformed");
                        return Inbound::Drop;
                    }
                }
            }
        };

        let level = match (flags.auth, flags.privacy) {
            (false, _) => SecurityLevel::NoAuthNoPriv,
            (true, false) => SecurityLevel::AuthNoPriv,
            (true, true) => SecurityLevel::AuthPriv,
        };

        tracing::trace!(
            snmp.msg_id = msg_id,
            snmp.user = %String::from_utf8_lossy(&params.user_name),
            snmp.level = %level,
            "inbound v3 request accepted"
        );

        Inbound::Request {
            scoped,
            reply: ReplyContext {
                msg_id,
                level,
                user: flags.auth.then_some(user),
                context_name: Bytes::new(),
            },
        }
    }

    /// Seal a response PDU so it mirrors the request's security level and
    /// carries this engine's parameters.
    pub fn seal_response(&self, reply: &ReplyContext, pdu: Pdu) -> Result<Vec<u8>> {
        let scoped = ScopedPdu {
            context_engine_id: self.engine.engine_id().clone(),
            context_name: reply.context_name.clone(),
            pdu,
        };

        match (&reply.user, reply.level) {
            (Some(user), level) if level.has_auth() => {
                let salt = level.has_privacy().then(|| self.salts.next_salt());
                seal_message(
                    SealContext {
                        msg_id: reply.msg_id,
                        reportable: false,
                        level,
                        engine_id: self.engine.engine_id().clone(),
                        engine_boots: self.engine.boots(),
                        engine_time: self.engine.engine_time(),
                        user,
                        salt,
                    },
                    scoped,
                )
            }
            _ => Ok(self.unauthenticated_message(reply.msg_id, scoped)),
        }
    }

    /// Build a noAuthNoPriv Report carrying the given usmStats varbind and
    /// this engine's parameters.
    fn report(&self, msg_id: i32, request_id: i32, user_name: &Bytes, stat: Oid) -> Inbound {
        let pdu = Pdu::report(request_id, vec![VarBind::new(stat, Value::Counter32(1))]);
        let scoped = ScopedPdu {
            context_engine_id: self.engine.engine_id().clone(),
            context_name: Bytes::new(),
            pdu,
        };

        let message = V3Message {
            header: HeaderData::usm(msg_id, DEFAULT_MSG_MAX_SIZE, MsgFlags::default()),
            security_params: UsmSecurityParams {
                engine_id: self.engine.engine_id().clone(),
                engine_boots: self.engine.boots(),
                engine_time: self.engine.engine_time(),
                user_name: user_name.clone(),
                auth_params: Bytes::new(),
                priv_params: Bytes::new(),
            },
            scoped_pdu: ScopedPduData::Plaintext(scoped),
        };

        Inbound::Report(message.encode().bytes)
    }

    fn unauthenticated_message(&self, msg_id: i32, scoped: ScopedPdu) -> Vec<u8> {
        let message = V3Message {
            header: HeaderData::usm(msg_id, DEFAULT_MSG_MAX_SIZE, MsgFlags::default()),
            security_params: UsmSecurityParams {
                engine_id: self.engine.engine_id().clone(),
                engine_boots: self.engine.boots(),
                engine_time: self.engine.engine_time(),
                user_name: Bytes::new(),
                auth_params: Bytes::new(),
                priv_params: Bytes::new(),
            },
            scoped_pdu: ScopedPduData::Plaintext(scoped),
        };
        message.encode().bytes
    }
}
