//! SNMPv3 engine identity, timeliness, and discovery.
//!
//! An authoritative engine has a stable engine ID, a boot counter that
//! increments once per process lifecycle, and an engine time measured in
//! seconds since boot. Peers accept authenticated traffic only inside a
//! +/-150 second window against the authoritative clock (RFC 3414
//! Section 2.2.3).

use std::time::Instant;

use bytes::Bytes;

use crate::error::{CryptoErrorKind, DecodeErrorKind, Error, Result};
use crate::message::{
    DecodedV3Message, HeaderData, MsgFlags, ScopedPdu, ScopedPduData, V3Message,
};
use crate::oid::Oid;
use crate::pdu::Pdu;
use crate::v3::usm::UsmSecurityParams;

/// Allowed drift against the authoritative engine time, in seconds.
pub const TIME_WINDOW: i32 = 150;

/// Largest representable engine time (RFC 3414: wraps by rebooting).
pub const MAX_ENGINE_TIME: i32 = i32::MAX;

/// Default msgMaxSize advertised in outgoing v3 messages: the largest
/// payload a single UDP/IPv4 datagram can carry.
pub const DEFAULT_MSG_MAX_SIZE: i32 = 65507;

/// Engine ID length bounds (RFC 3411).
pub const ENGINE_ID_MIN_LEN: usize = 5;
pub const ENGINE_ID_MAX_LEN: usize = 32;

/// Enterprise number used in generated engine IDs: the IANA arc reserved
/// for documentation and examples.
const ENTERPRISE_NUMBER: u32 = 32473;

/// RFC 3411 engine ID format octet: administratively assigned octets.
const FORMAT_OCTETS: u8 = 0x05;

/// Authoritative engine state.
///
/// Constructed once per process; the boot counter comes from persisted
/// state (or 1 on first ever start) and never changes while running.
#[derive(Debug)]
pub struct EngineState {
    engine_id: Bytes,
    boots: i32,
    time_base: Instant,
}

impl EngineState {
    /// Create an engine with a freshly generated 13-byte engine ID.
    ///
    /// Layout: 4-byte enterprise number with the vendor bit (bit 7 of the
    /// first byte) set, one format octet, then 8 random octets.
    pub fn new(boots: i32) -> Result<Self> {
        let mut id = Vec::with_capacity(13);
        let enterprise = ENTERPRISE_NUMBER.to_be_bytes();
        id.push(enterprise[0] | 0x80);
        id.extend_from_slice(&enterprise[1..]);
        id.push(FORMAT_OCTETS);

        let mut tail = [0u8; 8];
        getrandom::fill(&mut tail).map_err(|_| Error::crypto(CryptoErrorKind::SaltGeneration))?;
        id.extend_from_slice(&tail);

        Self::with_engine_id(Bytes::from(id), boots)
    }

    /// Create an engine with a persisted engine ID.
    pub fn with_engine_id(engine_id: Bytes, boots: i32) -> Result<Self> {
        if !(ENGINE_ID_MIN_LEN..=ENGINE_ID_MAX_LEN).contains(&engine_id.len()) {
            return Err(Error::decode(
                0,
                DecodeErrorKind::InvalidEngineIdLength {
                    length: engine_id.len(),
                },
            ));
        }
        tracing::debug!(
            snmp.engine_id = %crate::util::HexBytes(&engine_id),
            snmp.boots = boots,
            "engine state initialized"
        );
        Ok(Self {
            engine_id,
            boots,
            time_base: Instant::now(),
        })
    }

    /// The engine identifier.
    pub fn engine_id(&self) -> &Bytes {
        &self.engine_id
    }

    /// The boot counter.
    pub fn boots(&self) -> i32 {
        self.boots
    }

    /// Seconds since this engine booted.
    pub fn engine_time(&self) -> i32 {
        let secs = self.time_base.elapsed().as_secs();
        i32::try_from(secs).unwrap_or(MAX_ENGINE_TIME)
    }

    /// Timeliness check: boots must match exactly and the peer's clock must
    /// be within the +/-150 s window.
    pub fn is_time_valid(&self, peer_boots: i32, peer_time: i32) -> bool {
        // Widen before subtracting: a hostile peer_time near i32::MIN must
        // not overflow the difference.
        let drift = (peer_time as i64 - self.engine_time() as i64).abs();
        peer_boots == self.boots && drift <= TIME_WINDOW as i64
    }
}

/// A remote authoritative engine, as learned through discovery.
#[derive(Debug, Clone)]
pub struct RemoteEngine {
    /// The remote engine identifier.
    pub engine_id: Bytes,
    /// The remote boot counter.
    pub boots: i32,
    time: i32,
    learned_at: Instant,
}

impl RemoteEngine {
    /// Record a discovered engine.
    pub fn new(engine_id: Bytes, boots: i32, time: i32) -> Self {
        Self {
            engine_id,
            boots,
            time,
            learned_at: Instant::now(),
        }
    }

    /// Estimate the remote engine time by advancing the snapshot with the
    /// local monotonic clock.
    pub fn estimated_time(&self) -> i32 {
        let elapsed = i32::try_from(self.learned_at.elapsed().as_secs()).unwrap_or(MAX_ENGINE_TIME);
        self.time.saturating_add(elapsed)
    }

    /// Re-synchronize after a notInTimeWindow report.
    pub fn resync(&mut self, boots: i32, time: i32) {
        tracing::debug!(
            snmp.boots = boots,
            snmp.time = time,
            "re-synchronizing engine clock"
        );
        self.boots = boots;
        self.time = time;
        self.learned_at = Instant::now();
    }
}

// ============================================================================
// usmStats report OIDs (RFC 3414 Section 5)
// ============================================================================

/// usmStatsUnsupportedSecLevels.0
pub fn usm_stats_unsupported_sec_levels() -> Oid {
    crate::oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 1, 0)
}

/// usmStatsNotInTimeWindows.0
pub fn usm_stats_not_in_time_windows() -> Oid {
    crate::oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 2, 0)
}

/// usmStatsUnknownUserNames.0
pub fn usm_stats_unknown_user_names() -> Oid {
    crate::oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 3, 0)
}

/// usmStatsUnknownEngineIDs.0
pub fn usm_stats_unknown_engine_ids() -> Oid {
    crate::oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 4, 0)
}

/// usmStatsWrongDigests.0
pub fn usm_stats_wrong_digests() -> Oid {
    crate::oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 5, 0)
}

/// usmStatsDecryptionErrors.0
pub fn usm_stats_decryption_errors() -> Oid {
    crate::oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 6, 0)
}

fn report_matches(pdu: &Pdu, oid: &Oid) -> bool {
    matches!(pdu, Pdu::Report(fields) if fields.varbinds.first().is_some_and(|vb| vb.oid == *oid))
}

/// Check for a usmStatsUnknownEngineIDs report.
pub fn is_unknown_engine_id_report(pdu: &Pdu) -> bool {
    report_matches(pdu, &usm_stats_unknown_engine_ids())
}

/// Check for a usmStatsNotInTimeWindows report.
pub fn is_not_in_time_window_report(pdu: &Pdu) -> bool {
    report_matches(pdu, &usm_stats_not_in_time_windows())
}

/// Check for a usmStatsUnknownUserNames report.
pub fn is_unknown_user_name_report(pdu: &Pdu) -> bool {
    report_matches(pdu, &usm_stats_unknown_user_names())
}

/// Check for a usmStatsUnsupportedSecLevels report.
pub fn is_unsupported_sec_level_report(pdu: &Pdu) -> bool {
    report_matches(pdu, &usm_stats_unsupported_sec_levels())
}

/// Check for a usmStatsWrongDigests report.
pub fn is_wrong_digest_report(pdu: &Pdu) -> bool {
    report_matches(pdu, &usm_stats_wrong_digests())
}

/// Check for a usmStatsDecryptionErrors report.
pub fn is_decryption_error_report(pdu: &Pdu) -> bool {
    report_matches(pdu, &usm_stats_decryption_errors())
}

// ============================================================================
// Discovery
// ============================================================================

/// Build a discovery probe: empty engine ID, empty user name, noAuthNoPriv,
/// reportable, carrying an empty GET request.
pub fn build_discovery_request(msg_id: i32, request_id: i32) -> Vec<u8> {
    let message = V3Message {
        header: HeaderData::usm(msg_id, DEFAULT_MSG_MAX_SIZE, MsgFlags::discovery()),
        security_params: UsmSecurityParams::discovery(),
        scoped_pdu: ScopedPduData::Plaintext(ScopedPdu::new(
            Bytes::new(),
            Pdu::get_request(request_id, &[]),
        )),
    };
    message.encode().bytes
}

/// Extract the authoritative engine parameters from a discovery response.
///
/// The authoritative side answers a discovery probe with a Report whose USM
/// parameters carry its engine ID, boots, and time.
pub fn parse_discovery_response(decoded: &DecodedV3Message) -> Result<RemoteEngine> {
    let params = &decoded.message.security_params;
    if params.engine_id.is_empty() {
        return Err(Error::UnknownEngineId { target: None });
    }
    if !(ENGINE_ID_MIN_LEN..=ENGINE_ID_MAX_LEN).contains(&params.engine_id.len()) {
        return Err(Error::decode(
            0,
            DecodeErrorKind::InvalidEngineIdLength {
                length: params.engine_id.len(),
            },
        ));
    }

    Ok(RemoteEngine::new(
        params.engine_id.clone(),
        params.engine_boots,
        params.engine_time,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use crate::varbind::VarBind;

    #[test]
    fn test_generated_engine_id_layout() {
        let engine = EngineState::new(1).unwrap();
        let id = engine.engine_id();
        assert_eq!(id.len(), 13);
        // Vendor bit set on the first octet
        assert_eq!(id[0] & 0x80, 0x80);
        // Enterprise 32473 under the vendor bit
        let enterprise =
            u32::from_be_bytes([id[0] & 0x7F, id[1], id[2], id[3]]);
        assert_eq!(enterprise, 32473);
        assert_eq!(id[4], 0x05);
    }

    #[test]
    fn test_generated_engine_ids_differ() {
        let a = EngineState::new(1).unwrap();
        let b = EngineState::new(1).unwrap();
        assert_ne!(a.engine_id(), b.engine_id());
    }

    #[test]
    fn test_engine_id_length_bounds() {
        assert!(EngineState::with_engine_id(Bytes::from_static(&[1, 2, 3, 4]), 1).is_err());
        assert!(EngineState::with_engine_id(Bytes::from_static(&[1, 2, 3, 4, 5]), 1).is_ok());
        assert!(EngineState::with_engine_id(Bytes::from(vec![0u8; 33]), 1).is_err());
        assert!(EngineState::with_engine_id(Bytes::from(vec![0u8; 32]), 1).is_ok());
    }

    #[test]
    fn test_time_window() {
        let engine = EngineState::new(4).unwrap();
        let now = engine.engine_time();

        assert!(engine.is_time_valid(4, now));
        assert!(engine.is_time_valid(4, now + TIME_WINDOW));
        assert!(engine.is_time_valid(4, now - TIME_WINDOW));
        assert!(!engine.is_time_valid(4, now + TIME_WINDOW + 1));
        assert!(!engine.is_time_valid(4, now - TIME_WINDOW - 1));
        assert!(!engine.is_time_valid(3, now));
        assert!(!engine.is_time_valid(5, now));
    }

    #[test]
    fn test_engine_time_starts_near_zero() {
        let engine = EngineState::new(1).unwrap();
        assert!(engine.engine_time() <= 1);
    }

    #[test]
    fn test_remote_engine_resync() {
        let mut remote = RemoteEngine::new(Bytes::from_static(b"engine-id-123"), 1, 100);
        assert!(remote.estimated_time() >= 100);
        remote.resync(2, 5000);
        assert_eq!(remote.boots, 2);
        assert!(remote.estimated_time() >= 5000);
    }

    #[test]
    fn test_report_classifiers() {
        let report = Pdu::report(
            1,
            vec![VarBind::new(usm_stats_unknown_user_names(), Value::Counter32(1))],
        );
        assert!(is_unknown_user_name_report(&report));
        assert!(!is_unknown_engine_id_report(&report));
        assert!(!is_not_in_time_window_report(&report));

        let get = Pdu::get_request(1, &[]);
        assert!(!is_unknown_user_name_report(&get));

        let empty_report = Pdu::report(1, vec![]);
        assert!(!is_wrong_digest_report(&empty_report));
    }

    #[test]
    fn test_discovery_request_shape() {
        let bytes = build_discovery_request(77, 42);
        let decoded = V3Message::decode(Bytes::from(bytes)).unwrap();

        assert_eq!(decoded.message.header.msg_id, 77);
        assert!(decoded.message.header.flags.reportable);
        assert!(!decoded.message.header.flags.auth);
        assert!(!decoded.message.header.flags.privacy);
        assert!(decoded.message.security_params.engine_id.is_empty());
        assert!(decoded.message.security_params.user_name.is_empty());

        let scoped = decoded.message.scoped_pdu.plaintext().unwrap();
        assert!(scoped.context_engine_id.is_empty());
        assert!(matches!(&scoped.pdu, Pdu::GetRequest(f) if f.request_id == 42));
    }

    #[test]
    fn test_parse_discovery_response() {
        let engine = EngineState::new(9).unwrap();
        let message = V3Message {
            header: HeaderData::usm(1, DEFAULT_MSG_MAX_SIZE, MsgFlags::default()),
            security_params: UsmSecurityParams {
                engine_id: engine.engine_id().clone(),
                engine_boots: 9,
                engine_time: 17,
                user_name: Bytes::new(),
                auth_params: Bytes::new(),
                priv_params: Bytes::new(),
            },
            scoped_pdu: ScopedPduData::Plaintext(ScopedPdu::new(
                engine.engine_id().clone(),
                Pdu::report(
                    42,
                    vec![VarBind::new(usm_stats_unknown_engine_ids(), Value::Counter32(1))],
                ),
            )),
        };
        let decoded = V3Message::decode(Bytes::from(message.encode().bytes)).unwrap();

        let remote = parse_discovery_response(&decoded).unwrap();
        assert_eq!(&remote.engine_id, engine.engine_id());
        assert_eq!(remote.boots, 9);
        assert!(remote.estimated_time() >= 17);
    }

    #[test]
    fn test_parse_discovery_response_requires_engine_id() {
        let message = V3Message {
            header: HeaderData::usm(1, DEFAULT_MSG_MAX_SIZE, MsgFlags::default()),
            security_params: UsmSecurityParams::discovery(),
            scoped_pdu: ScopedPduData::Plaintext(ScopedPdu::new(
                Bytes::new(),
                Pdu::report(1, vec![]),
            )),
        };
        let decoded = V3Message::decode(Bytes::from(message.encode().bytes)).unwrap();
        assert!(matches!(
            parse_discovery_response(&decoded).unwrap_err(),
            Error::UnknownEngineId { .. }
        ));
    }
}
