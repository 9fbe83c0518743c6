//! Simulated loopback agents for integration tests.
//!
//! Each agent binds a UDP socket on localhost and answers GET/GETNEXT/
//! GETBULK/SET from a sorted OID map. The v3 agent routes every datagram
//! through a real [`UsmProcessor`], so discovery, reports, authentication,
//! and privacy are exercised end to end.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::ops::Bound;
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::UdpSocket;

use rsnmp::error::ErrorStatus;
use rsnmp::message::CommunityMessage;
use rsnmp::pdu::Pdu;
use rsnmp::v3::{
    AuthProtocol, EngineState, Inbound, PrivProtocol, UserDb, UsmProcessor, V3User,
};
use rsnmp::{Oid, Value, VarBind, oid};

use super::fixtures::{AUTH_PASSWORD, PRIV_PASSWORD, users};

/// Sorted OID-to-value store.
pub type MibMap = BTreeMap<Oid, Value>;

/// A small system/interfaces MIB slice.
pub fn default_mib() -> MibMap {
    let mut map = MibMap::new();
    map.insert(
        oid!(1, 3, 6, 1, 2, 1, 1, 1, 0),
        Value::OctetString(Bytes::from_static(b"Simulated router")),
    );
    map.insert(
        oid!(1, 3, 6, 1, 2, 1, 1, 2, 0),
        Value::ObjectIdentifier(oid!(1, 3, 6, 1, 4, 1, 32473, 1)),
    );
    map.insert(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), Value::TimeTicks(123_456));
    map.insert(
        oid!(1, 3, 6, 1, 2, 1, 1, 5, 0),
        Value::OctetString(Bytes::from_static(b"sim-agent")),
    );
    map.insert(oid!(1, 3, 6, 1, 2, 1, 2, 1, 0), Value::Integer(2));
    map
}

/// The smallest MIB that exercises walk termination: one scalar in the
/// system subtree, one in the next subtree over.
pub fn walk_boundary_mib() -> MibMap {
    let mut map = MibMap::new();
    map.insert(
        oid!(1, 3, 6, 1, 2, 1, 1, 1, 0),
        Value::OctetString(Bytes::from_static(b"only system scalar")),
    );
    map.insert(oid!(1, 3, 6, 1, 2, 1, 2, 1, 0), Value::Integer(2));
    map
}

fn next_entry(values: &MibMap, after: &Oid) -> Option<(Oid, Value)> {
    values
        .range::<Oid, _>((Bound::Excluded(after.clone()), Bound::Unbounded))
        .next()
        .map(|(oid, value)| (oid.clone(), value.clone()))
}

/// Answer a request PDU from the value map, mirroring agent semantics.
pub fn answer(values: &MibMap, pdu: &Pdu) -> Option<Pdu> {
    let request_id = pdu.request_id()?;

    let varbinds = match pdu {
        Pdu::GetRequest(fields) => fields
            .varbinds
            .iter()
            .map(|vb| {
                let value = values.get(&vb.oid).cloned().unwrap_or(Value::NoSuchObject);
                VarBind::new(vb.oid.clone(), value)
            })
            .collect(),
        Pdu::GetNextRequest(fields) => fields
            .varbinds
            .iter()
            .map(|vb| match next_entry(values, &vb.oid) {
                Some((oid, value)) => VarBind::new(oid, value),
                None => VarBind::new(vb.oid.clone(), Value::EndOfMibView),
            })
            .collect(),
        Pdu::GetBulkRequest(fields) => {
            let mut out = Vec::new();
            for vb in &fields.varbinds {
                let mut cursor = vb.oid.clone();
                for _ in 0..fields.max_repetitions.max(1) {
                    match next_entry(values, &cursor) {
                        Some((oid, value)) => {
                            cursor = oid.clone();
                            out.push(VarBind::new(oid, value));
                        }
                        None => {
                            out.push(VarBind::new(cursor.clone(), Value::EndOfMibView));
                            break;
                        }
                    }
                }
            }
            out
        }
        Pdu::SetRequest(fields) | Pdu::InformRequest(fields) => fields.varbinds.clone(),
        _ => return None,
    };

    Some(Pdu::response(request_id, ErrorStatus::NoError, 0, varbinds))
}

/// Spawn a v2c agent on localhost; returns its address.
pub async fn spawn_v2c_agent(values: MibMap) -> SocketAddr {
    super::init_tracing();
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = vec![0u8; 65535];
        loop {
            let Ok((len, from)) = socket.recv_from(&mut buf).await else {
                break;
            };
            let frame = Bytes::copy_from_slice(&buf[..len]);
            let Ok(request) = CommunityMessage::decode(frame) else {
                continue;
            };
            let Some(response_pdu) = answer(&values, &request.pdu) else {
                continue;
            };
            let response =
                CommunityMessage::new(request.version, request.community, response_pdu);
            let _ = socket.send_to(&response.encode(), from).await;
        }
    });

    addr
}

/// Build the standard user set for the simulated v3 agent.
pub fn standard_users(engine_id: Bytes) -> Arc<UserDb> {
    let db = Arc::new(UserDb::new(engine_id));
    db.add_user(V3User::no_auth(users::NOAUTH_USER)).unwrap();
    db.add_user(V3User::with_auth(
        users::AUTHSHA1_USER,
        AuthProtocol::Sha1,
        AUTH_PASSWORD,
    ))
    .unwrap();
    db.add_user(V3User::with_auth_priv(
        users::PRIVAES128_USER,
        AuthProtocol::Sha256,
        AUTH_PASSWORD,
        PrivProtocol::Aes128,
        PRIV_PASSWORD,
    ))
    .unwrap();
    db.add_user(V3User::with_auth_priv(
        users::PRIVDES_USER,
        AuthProtocol::Sha1,
        AUTH_PASSWORD,
        PrivProtocol::Des,
        PRIV_PASSWORD,
    ))
    .unwrap();
    db
}

/// Spawn a v3 agent on localhost; returns its address and engine ID.
pub async fn spawn_v3_agent(values: MibMap, boots: i32) -> (SocketAddr, Bytes) {
    super::init_tracing();
    let engine = Arc::new(EngineState::new(boots).unwrap());
    let engine_id = engine.engine_id().clone();
    let users = standard_users(engine_id.clone());
    let processor = UsmProcessor::new(engine, users).unwrap();

    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = vec![0u8; 65535];
        loop {
            let Ok((len, from)) = socket.recv_from(&mut buf).await else {
                break;
            };
            let frame = Bytes::copy_from_slice(&buf[..len]);

            match processor.process_incoming(frame) {
                Inbound::Report(bytes) => {
                    let _ = socket.send_to(&bytes, from).await;
                }
                Inbound::Request { scoped, reply } => {
                    let Some(response_pdu) = answer(&values, &scoped.pdu) else {
                        continue;
                    };
                    let Ok(bytes) = processor.seal_response(&reply, response_pdu) else {
                        continue;
                    };
                    let _ = socket.send_to(&bytes, from).await;
                }
                Inbound::Drop => {}
            }
        }
    });

    (addr, engine_id)
}
