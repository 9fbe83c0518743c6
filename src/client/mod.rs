//! SNMP client: the request/response engine over a [`Transport`].
//!
//! One client talks to one peer. Request ids and v3 msgIDs are drawn from a
//! single atomic counter; responses are matched by request-id (v1/v2c) or
//! msgID (v3), and anything else that arrives while a request is pending -
//! duplicates, stale retransmissions, garbage - is discarded without ending
//! the wait. Timeouts retry on datagram transports; a cancellation token
//! aborts a pending wait without affecting other requests.

mod walk;

pub use walk::{BulkWalk, Walk};

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::error::{
    AuthErrorKind, CryptoErrorKind, DecodeErrorKind, EncodeErrorKind, Error, Result,
};
use crate::message::{CommunityMessage, ScopedPdu, ScopedPduData, V3Message};
use crate::oid::Oid;
use crate::pdu::{Pdu, TrapV1Pdu};
use crate::transport::Transport;
use crate::v3::auth::verify_message;
use crate::v3::{
    LocalizedUser, RemoteEngine, SaltCounter, SealContext, SecurityLevel, V3User,
    build_discovery_request, decrypt_scoped_pdu, is_decryption_error_report,
    is_not_in_time_window_report, is_unknown_engine_id_report, is_unknown_user_name_report,
    is_unsupported_sec_level_report, is_wrong_digest_report, parse_discovery_response,
    seal_message,
};
use crate::varbind::{VarBind, notification_varbinds};
use crate::version::Version;

/// SNMPv3 credentials for a client.
pub struct V3Security {
    /// User and passwords; keys are localized after engine discovery.
    pub user: V3User,
    /// Context name for scoped PDUs (usually empty).
    pub context_name: Bytes,
}

impl V3Security {
    /// Credentials with an empty context name.
    pub fn new(user: V3User) -> Self {
        Self {
            user,
            context_name: Bytes::new(),
        }
    }
}

/// Client configuration.
pub struct ClientConfig {
    /// Protocol version for requests.
    pub version: Version,
    /// Community string (v1/v2c).
    pub community: Bytes,
    /// Per-attempt response timeout.
    pub timeout: Duration,
    /// Retransmissions after the first attempt (datagram transports only).
    pub retries: u32,
    /// v3 credentials; required when `version` is V3.
    pub v3_security: Option<V3Security>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: Version::V2c,
            community: Bytes::from_static(b"public"),
            timeout: Duration::from_secs(5),
            retries: 3,
            v3_security: None,
        }
    }
}

/// Discovered remote engine plus the user keys localized to it.
struct V3Session {
    engine: Option<RemoteEngine>,
    user: Option<LocalizedUser>,
}

/// SNMP client over any [`Transport`].
pub struct Client<T: Transport> {
    transport: T,
    config: Arc<ClientConfig>,
    next_id: Arc<AtomicI32>,
    cancel: CancellationToken,
    v3: Arc<Mutex<V3Session>>,
    salts: Arc<OnceLock<SaltCounter>>,
}

impl<T: Transport> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            config: self.config.clone(),
            next_id: self.next_id.clone(),
            cancel: self.cancel.clone(),
            v3: self.v3.clone(),
            salts: self.salts.clone(),
        }
    }
}

/// What a v3 exchange produced once the envelope was verified.
enum V3Outcome {
    /// The peer's response PDU.
    Response(Pdu),
    /// notInTimeWindow report carrying the authoritative clock.
    NotInTimeWindow { boots: i32, time: i32 },
    /// A terminal error (other reports, verification failures).
    Fatal(Box<Error>),
}

impl<T: Transport> Client<T> {
    /// Create a client over an established transport.
    pub fn new(transport: T, config: ClientConfig) -> Self {
        // Randomize the initial request id so a quick restart does not
        // collide with responses addressed to the previous incarnation.
        let initial_id = {
            use std::time::{SystemTime, UNIX_EPOCH};
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as i32)
                .unwrap_or(1)
                .wrapping_abs()
                .max(1)
        };

        Self {
            transport,
            config: Arc::new(config),
            next_id: Arc::new(AtomicI32::new(initial_id)),
            cancel: CancellationToken::new(),
            v3: Arc::new(Mutex::new(V3Session {
                engine: None,
                user: None,
            })),
            salts: Arc::new(OnceLock::new()),
        }
    }

    /// Token that cancels pending waits on this client (and its clones).
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn alloc_id(&self) -> i32 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn next_salt(&self) -> Result<[u8; 8]> {
        let counter = match self.salts.get() {
            Some(counter) => counter,
            None => {
                let _ = self.salts.set(SaltCounter::new()?);
                self.salts.get().expect("salt counter initialized above")
            }
        };
        Ok(counter.next_salt())
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// GET a single OID.
    pub async fn get(&self, oid: &Oid) -> Result<VarBind> {
        let mut varbinds = self.get_many(std::slice::from_ref(oid)).await?;
        single(&mut varbinds)
    }

    /// GET several OIDs in one request.
    pub async fn get_many(&self, oids: &[Oid]) -> Result<Vec<VarBind>> {
        self.request(|id| Ok(Pdu::get_request(id, oids))).await
    }

    /// GETNEXT: the lexicographically next varbind after `oid`.
    pub async fn get_next(&self, oid: &Oid) -> Result<VarBind> {
        let mut varbinds = self
            .request(|id| Ok(Pdu::get_next_request(id, std::slice::from_ref(oid))))
            .await?;
        single(&mut varbinds)
    }

    /// GETBULK (v2c/v3).
    pub async fn get_bulk(
        &self,
        oids: &[Oid],
        non_repeaters: i32,
        max_repetitions: i32,
    ) -> Result<Vec<VarBind>> {
        self.request(|id| Pdu::get_bulk_request(id, non_repeaters, max_repetitions, oids))
            .await
    }

    /// SET one or more varbinds.
    pub async fn set(&self, varbinds: Vec<VarBind>) -> Result<Vec<VarBind>> {
        self.request(move |id| Ok(Pdu::set_request(id, varbinds)))
            .await
    }

    /// Send an acknowledged notification (INFORM).
    pub async fn inform(
        &self,
        sys_uptime: u32,
        trap_oid: Oid,
        user_varbinds: Vec<VarBind>,
    ) -> Result<Vec<VarBind>> {
        let varbinds = notification_varbinds(sys_uptime, trap_oid, user_varbinds);
        self.request(move |id| Ok(Pdu::inform_request(id, varbinds)))
            .await
    }

    /// Fire-and-forget v2 trap. Always sent with the community envelope.
    pub async fn send_trap(
        &self,
        sys_uptime: u32,
        trap_oid: Oid,
        user_varbinds: Vec<VarBind>,
    ) -> Result<()> {
        let varbinds = notification_varbinds(sys_uptime, trap_oid, user_varbinds);
        let pdu = Pdu::trap_v2(self.alloc_id(), varbinds);
        let message = CommunityMessage::new(Version::V2c, self.config.community.clone(), pdu);
        self.transport.send(&message.encode()).await
    }

    /// Fire-and-forget v1 trap: a full SNMPv1 message around the trap PDU.
    pub async fn send_trap_v1(&self, trap: TrapV1Pdu) -> Result<()> {
        let message = CommunityMessage::new(
            Version::V1,
            self.config.community.clone(),
            Pdu::TrapV1(trap),
        );
        self.transport.send(&message.encode()).await
    }

    /// Walk a subtree with GETNEXT.
    pub fn walk(&self, oid: Oid) -> Walk<T> {
        Walk::new(self.clone(), oid)
    }

    /// Walk a subtree with GETBULK.
    pub fn bulk_walk(&self, oid: Oid, max_repetitions: i32) -> BulkWalk<T> {
        BulkWalk::new(self.clone(), oid, max_repetitions)
    }

    // ========================================================================
    // Request engine
    // ========================================================================

    async fn request(&self, build: impl FnOnce(i32) -> Result<Pdu>) -> Result<Vec<VarBind>> {
        let request_id = self.alloc_id();
        let pdu = build(request_id)?;

        let response = match self.config.version {
            Version::V1 | Version::V2c => self.community_request(request_id, pdu).await?,
            Version::V3 => self.v3_request(pdu).await?,
        };

        self.check_response(request_id, response)
    }

    async fn community_request(&self, request_id: i32, pdu: Pdu) -> Result<Pdu> {
        let expected_version = self.config.version;
        let message = CommunityMessage::new(expected_version, self.config.community.clone(), pdu);
        let bytes = message.encode();

        self.exchange(request_id, &bytes, |data| {
            let decoded = match CommunityMessage::decode(data) {
                Ok(decoded) => decoded,
                Err(e) => {
                    tracing::debug!(error = %e, "discarding unparseable datagram");
                    return None;
                }
            };
            if decoded.version != expected_version {
                tracing::debug!(
                    snmp.version = %decoded.version,
                    "discarding response with mismatched version"
                );
                return None;
            }
            match &decoded.pdu {
                Pdu::Response(fields) if fields.request_id == request_id => Some(decoded.pdu),
                Pdu::Response(fields) => {
                    tracing::debug!(
                        snmp.request_id = fields.request_id,
                        "discarding response for another request"
                    );
                    None
                }
                _ => None,
            }
        })
        .await
    }

    async fn v3_request(&self, pdu: Pdu) -> Result<Pdu> {
        let security = self
            .config
            .v3_security
            .as_ref()
            .ok_or_else(|| Error::encode(EncodeErrorKind::NoSecurityConfig))?;

        self.ensure_discovered(security).await?;

        let mut resynced = false;
        loop {
            let (engine, user) = {
                let session = self.v3.lock().unwrap();
                match (&session.engine, &session.user) {
                    (Some(engine), Some(user)) => (engine.clone(), user.clone()),
                    _ => return Err(Error::encode(EncodeErrorKind::EngineNotDiscovered)),
                }
            };

            let msg_id = self.alloc_id();
            let level = user.level;
            let salt = if level.has_privacy() {
                Some(self.next_salt()?)
            } else {
                None
            };
            let scoped = ScopedPdu {
                context_engine_id: engine.engine_id.clone(),
                context_name: security.context_name.clone(),
                pdu: pdu.clone(),
            };
            let bytes = seal_message(
                SealContext {
                    msg_id,
                    reportable: true,
                    level,
                    engine_id: engine.engine_id.clone(),
                    engine_boots: engine.boots,
                    engine_time: engine.estimated_time(),
                    user: &user,
                    salt,
                },
                scoped,
            )?;

            let outcome = self
                .exchange(msg_id, &bytes, |data| self.match_v3(msg_id, &user, data))
                .await?;

            match outcome {
                V3Outcome::Response(pdu) => return Ok(pdu),
                V3Outcome::NotInTimeWindow { boots, time } if !resynced => {
                    tracing::debug!(
                        snmp.boots = boots,
                        snmp.time = time,
                        "peer clock moved, re-synchronizing and retrying once"
                    );
                    let mut session = self.v3.lock().unwrap();
                    if let Some(engine) = session.engine.as_mut() {
                        engine.resync(boots, time);
                    }
                    resynced = true;
                }
                V3Outcome::NotInTimeWindow { .. } => {
                    return Err(Error::NotInTimeWindow {
                        target: Some(self.transport.peer_addr()),
                    });
                }
                V3Outcome::Fatal(error) => return Err(*error),
            }
        }
    }

    /// Discover the remote engine and localize the user's keys to it.
    async fn ensure_discovered(&self, security: &V3Security) -> Result<()> {
        if self.v3.lock().unwrap().engine.is_some() {
            return Ok(());
        }

        let msg_id = self.alloc_id();
        let request_id = self.alloc_id();
        let probe = build_discovery_request(msg_id, request_id);

        tracing::debug!(
            snmp.target = %self.transport.peer_addr(),
            snmp.msg_id = msg_id,
            "discovering remote engine"
        );

        let decoded = self
            .exchange(msg_id, &probe, |data| {
                let decoded = V3Message::decode(data).ok()?;
                (decoded.message.header.msg_id == msg_id).then_some(decoded)
            })
            .await?;

        let remote = parse_discovery_response(&decoded).map_err(|_| Error::UnknownEngineId {
            target: Some(self.transport.peer_addr()),
        })?;
        let localized = security.user.localize(&remote.engine_id)?;

        tracing::debug!(
            snmp.engine_boots = remote.boots,
            snmp.level = %localized.level,
            "engine discovered, keys localized"
        );

        let mut session = self.v3.lock().unwrap();
        session.engine = Some(remote);
        session.user = Some(localized);
        Ok(())
    }

    /// Verify, decrypt, and classify one inbound v3 datagram.
    ///
    /// Returns `None` for datagrams that should be discarded while the wait
    /// continues (garbage, other msgIDs, downgraded responses).
    fn match_v3(&self, msg_id: i32, user: &LocalizedUser, data: Bytes) -> Option<V3Outcome> {
        let target = Some(self.transport.peer_addr());

        let decoded = match V3Message::decode(data) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::debug!(error = %e, "discarding unparseable v3 datagram");
                return None;
            }
        };
        if decoded.message.header.msg_id != msg_id {
            tracing::debug!(
                snmp.msg_id = decoded.message.header.msg_id,
                "discarding v3 message for another exchange"
            );
            return None;
        }

        let flags = decoded.message.header.flags;
        let params = &decoded.message.security_params;

        if flags.auth {
            let Some((_, key)) = &user.auth else {
                return Some(V3Outcome::Fatal(Box::new(Error::auth(
                    target,
                    AuthErrorKind::NoAuthKey,
                ))));
            };
            let Some(offset) = decoded.auth_params_offset else {
                return Some(V3Outcome::Fatal(Box::new(Error::auth(
                    target,
                    AuthErrorKind::AuthParamsNotLocated,
                ))));
            };
            if verify_message(key, &decoded.raw, offset).is_err() {
                return Some(V3Outcome::Fatal(Box::new(Error::auth(
                    target,
                    AuthErrorKind::HmacMismatch,
                ))));
            }
        }

        let scoped = match &decoded.message.scoped_pdu {
            ScopedPduData::Plaintext(scoped) => scoped.clone(),
            ScopedPduData::Encrypted(ciphertext) => {
                let Some((_, key)) = &user.privacy else {
                    return Some(V3Outcome::Fatal(Box::new(Error::decrypt(
                        target,
                        CryptoErrorKind::NoPrivKey,
                    ))));
                };
                let plaintext = match decrypt_scoped_pdu(
                    key,
                    params.engine_boots,
                    params.engine_time,
                    &params.priv_params,
                    ciphertext,
                ) {
                    Ok(plaintext) => plaintext,
                    Err(e) => return Some(V3Outcome::Fatal(Box::new(e))),
                };
                match ScopedPdu::from_bytes(Bytes::from(plaintext)) {
                    Ok(scoped) => scoped,
                    Err(e) => return Some(V3Outcome::Fatal(Box::new(e))),
                }
            }
        };

        let pdu = scoped.pdu;

        // Reports may arrive unauthenticated; classify them first.
        if is_not_in_time_window_report(&pdu) {
            return Some(V3Outcome::NotInTimeWindow {
                boots: params.engine_boots,
                time: params.engine_time,
            });
        }
        if is_unknown_engine_id_report(&pdu) {
            return Some(V3Outcome::Fatal(Box::new(Error::UnknownEngineId { target })));
        }
        if is_unknown_user_name_report(&pdu) {
            return Some(V3Outcome::Fatal(Box::new(Error::UnknownUserName { target })));
        }
        if is_unsupported_sec_level_report(&pdu) {
            return Some(V3Outcome::Fatal(Box::new(Error::UnsupportedSecurityLevel {
                target,
            })));
        }
        if is_wrong_digest_report(&pdu) {
            return Some(V3Outcome::Fatal(Box::new(Error::auth(
                target,
                AuthErrorKind::HmacMismatch,
            ))));
        }
        if is_decryption_error_report(&pdu) {
            return Some(V3Outcome::Fatal(Box::new(Error::decrypt(
                target,
                CryptoErrorKind::CipherError,
            ))));
        }

        // A data response below our security level is a downgrade; discard it.
        let response_level = match (flags.auth, flags.privacy) {
            (false, _) => SecurityLevel::NoAuthNoPriv,
            (true, false) => SecurityLevel::AuthNoPriv,
            (true, true) => SecurityLevel::AuthPriv,
        };
        if response_level < user.level {
            tracing::warn!(
                snmp.level = %response_level,
                snmp.expected = %user.level,
                "discarding response below requested security level"
            );
            return None;
        }

        Some(V3Outcome::Response(pdu))
    }

    /// Send `bytes` and wait for a datagram the matcher accepts, honoring
    /// timeout, retries, duplicates, and cancellation.
    async fn exchange<R>(
        &self,
        request_id: i32,
        bytes: &[u8],
        mut matcher: impl FnMut(Bytes) -> Option<R>,
    ) -> Result<R> {
        let attempts = if self.transport.is_stream() {
            1
        } else {
            self.config.retries + 1
        };

        for attempt in 0..attempts {
            if attempt > 0 {
                tracing::debug!(
                    snmp.request_id = request_id,
                    snmp.attempt = attempt,
                    "retransmitting request"
                );
            }
            self.transport.send(bytes).await?;

            let deadline = Instant::now() + self.config.timeout;
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }

                let received = tokio::select! {
                    _ = self.cancel.cancelled() => {
                        return Err(Error::Cancelled {
                            target: Some(self.transport.peer_addr()),
                        });
                    }
                    result = self.transport.recv(request_id, remaining) => result,
                };

                let data = match received {
                    Ok((data, _source)) => data,
                    Err(Error::Timeout { .. }) => break,
                    Err(e) => return Err(e),
                };

                if let Some(matched) = matcher(data) {
                    return Ok(matched);
                }
                // Duplicate or mismatch: keep waiting out the deadline.
            }
        }

        Err(Error::Timeout {
            target: Some(self.transport.peer_addr()),
            elapsed: self.config.timeout,
            request_id,
            retries: attempts.saturating_sub(1),
        })
    }

    /// Validate a Response PDU and surface agent-reported errors.
    fn check_response(&self, request_id: i32, pdu: Pdu) -> Result<Vec<VarBind>> {
        match pdu {
            Pdu::Response(fields) => {
                if fields.request_id != request_id {
                    return Err(Error::RequestIdMismatch {
                        expected: request_id,
                        actual: fields.request_id,
                    });
                }
                if fields.error_status != 0 {
                    let index = fields.error_index.max(0) as u32;
                    let oid = (index > 0)
                        .then(|| fields.varbinds.get(index as usize - 1).map(|vb| vb.oid.clone()))
                        .flatten();
                    return Err(Error::Snmp {
                        target: Some(self.transport.peer_addr()),
                        status: fields.status(),
                        index,
                        oid,
                    });
                }
                Ok(fields.varbinds)
            }
            other => Err(Error::decode(
                0,
                DecodeErrorKind::UnknownPduType(other.tag()),
            )),
        }
    }
}

fn single(varbinds: &mut Vec<VarBind>) -> Result<VarBind> {
    if varbinds.is_empty() {
        return Err(Error::decode(0, DecodeErrorKind::EmptyResponse));
    }
    Ok(varbinds.swap_remove(0))
}
