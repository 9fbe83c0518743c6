//! End-to-end v2c exchanges against a simulated UDP agent.

mod common;

use std::time::Duration;

use bytes::Bytes;
use rsnmp::transport::UdpTransport;
use rsnmp::{Client, ClientConfig, Error, ErrorStatus, Value, VarBind, Version, oid};

use common::*;

async fn connect_v2c(addr: std::net::SocketAddr) -> Client<UdpTransport> {
    let transport = UdpTransport::connect(addr).await.unwrap();
    let config = ClientConfig {
        version: Version::V2c,
        community: Bytes::from_static(COMMUNITY_RO),
        timeout: Duration::from_secs(2),
        retries: 1,
        v3_security: None,
    };
    Client::new(transport, config)
}

#[tokio::test]
async fn get_single_scalar() {
    let addr = spawn_v2c_agent(default_mib()).await;
    let client = connect_v2c(addr).await;

    let vb = client.get(&sys_descr()).await.unwrap();
    assert_eq!(vb.oid, sys_descr());
    assert_eq!(
        vb.value,
        Value::OctetString(Bytes::from_static(b"Simulated router"))
    );
}

#[tokio::test]
async fn get_many_scalars() {
    let addr = spawn_v2c_agent(default_mib()).await;
    let client = connect_v2c(addr).await;

    let varbinds = client
        .get_many(&[sys_descr(), sys_uptime(), sys_name()])
        .await
        .unwrap();
    assert_eq!(varbinds.len(), 3);
    assert_eq!(varbinds[1].value, Value::TimeTicks(123_456));
    assert_eq!(
        varbinds[2].value,
        Value::OctetString(Bytes::from_static(b"sim-agent"))
    );
}

#[tokio::test]
async fn get_missing_yields_exception_value() {
    let addr = spawn_v2c_agent(default_mib()).await;
    let client = connect_v2c(addr).await;

    let vb = client.get(&oid!(1, 3, 6, 1, 99, 99, 0)).await.unwrap();
    assert_eq!(vb.value, Value::NoSuchObject);
}

#[tokio::test]
async fn get_next_advances() {
    let addr = spawn_v2c_agent(default_mib()).await;
    let client = connect_v2c(addr).await;

    let vb = client.get_next(&system_subtree()).await.unwrap();
    assert_eq!(vb.oid, sys_descr());

    let vb = client.get_next(&sys_name()).await.unwrap();
    assert_eq!(vb.oid, if_number());
}

#[tokio::test]
async fn get_bulk_batches() {
    let addr = spawn_v2c_agent(default_mib()).await;
    let client = connect_v2c(addr).await;

    let varbinds = client.get_bulk(&[system_subtree()], 0, 3).await.unwrap();
    assert_eq!(varbinds.len(), 3);
    assert_eq!(varbinds[0].oid, sys_descr());
    assert_eq!(varbinds[1].oid, sys_object_id());
    assert_eq!(varbinds[2].oid, sys_uptime());
}

#[tokio::test]
async fn set_echoes_varbinds() {
    let addr = spawn_v2c_agent(default_mib()).await;
    let client = connect_v2c(addr).await;

    let varbinds = client
        .set(vec![VarBind::new(
            sys_name(),
            Value::OctetString(Bytes::from_static(b"renamed")),
        )])
        .await
        .unwrap();
    assert_eq!(
        varbinds[0].value,
        Value::OctetString(Bytes::from_static(b"renamed"))
    );
}

#[tokio::test]
async fn inform_carries_notification_convention() {
    let addr = spawn_v2c_agent(default_mib()).await;
    let client = connect_v2c(addr).await;

    let varbinds = client
        .inform(
            777,
            oid!(1, 3, 6, 1, 6, 3, 1, 1, 5, 4),
            vec![VarBind::new(sys_name(), Value::OctetString(Bytes::from_static(b"x")))],
        )
        .await
        .unwrap();

    // The agent echoed the varbinds: sysUpTime, snmpTrapOID, then ours
    assert_eq!(varbinds.len(), 3);
    assert_eq!(varbinds[0].oid, sys_uptime());
    assert_eq!(varbinds[0].value, Value::TimeTicks(777));
    assert_eq!(
        varbinds[1].value,
        Value::ObjectIdentifier(oid!(1, 3, 6, 1, 6, 3, 1, 1, 5, 4))
    );
}

#[tokio::test]
async fn unreachable_agent_times_out() {
    // Bind a socket that never answers
    let silent = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let transport = UdpTransport::connect(silent.local_addr().unwrap())
        .await
        .unwrap();
    let config = ClientConfig {
        timeout: Duration::from_millis(30),
        retries: 2,
        ..Default::default()
    };
    let client = Client::new(transport, config);

    let err = client.get(&sys_descr()).await.unwrap_err();
    assert!(matches!(err, Error::Timeout { retries: 2, .. }));
}

#[tokio::test]
async fn error_status_maps_to_snmp_error() {
    // An agent that always reports noSuchName at index 1
    let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        use rsnmp::message::CommunityMessage;
        use rsnmp::pdu::Pdu;
        let mut buf = vec![0u8; 65535];
        loop {
            let Ok((len, from)) = socket.recv_from(&mut buf).await else {
                break;
            };
            let Ok(request) = CommunityMessage::decode(Bytes::copy_from_slice(&buf[..len]))
            else {
                continue;
            };
            let Some(id) = request.pdu.request_id() else {
                continue;
            };
            let response = CommunityMessage::new(
                request.version,
                request.community,
                Pdu::response(id, ErrorStatus::NoSuchName, 1, request.pdu.varbinds().to_vec()),
            );
            let _ = socket.send_to(&response.encode(), from).await;
        }
    });

    let client = connect_v2c(addr).await;
    let err = client.get(&sys_descr()).await.unwrap_err();
    match err {
        Error::Snmp { status, index, oid, .. } => {
            assert_eq!(status, ErrorStatus::NoSuchName);
            assert_eq!(index, 1);
            assert_eq!(oid, Some(sys_descr()));
        }
        other => panic!("unexpected error: {other}"),
    }
}
