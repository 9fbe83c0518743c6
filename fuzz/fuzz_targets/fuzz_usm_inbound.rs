#![no_main]

//! Drives arbitrary datagrams through the full agent-side USM pipeline:
//! envelope parse, engine-id/timeliness/user checks, HMAC verification,
//! decryption, and report generation. The pipeline must never panic, and
//! every Report it decides to answer with must itself be well-formed.

use std::sync::{Arc, LazyLock};

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

use rsnmp::message::V3Message;
use rsnmp::v3::{
    AuthProtocol, EngineState, Inbound, PrivProtocol, UserDb, UsmProcessor, V3User,
};

static PROCESSOR: LazyLock<UsmProcessor> = LazyLock::new(|| {
    let engine_id = Bytes::from_static(&[0x80, 0x00, 0x7E, 0xD9, 0x05, 1, 2, 3, 4, 5, 6, 7, 8]);
    let engine = Arc::new(EngineState::with_engine_id(engine_id.clone(), 1).unwrap());
    let users = Arc::new(UserDb::new(engine_id));
    users.add_user(V3User::no_auth("fuzz-open")).unwrap();
    users
        .add_user(V3User::with_auth(
            "fuzz-auth",
            AuthProtocol::Sha1,
            "fuzz-auth-pass",
        ))
        .unwrap();
    users
        .add_user(V3User::with_auth_priv(
            "fuzz-priv",
            AuthProtocol::Sha256,
            "fuzz-auth-pass",
            PrivProtocol::Aes128,
            "fuzz-priv-pass",
        ))
        .unwrap();
    UsmProcessor::new(engine, users).unwrap()
});

fuzz_target!(|data: &[u8]| {
    let frame = Bytes::copy_from_slice(data);

    match PROCESSOR.process_incoming(frame) {
        Inbound::Report(bytes) => {
            V3Message::decode(Bytes::from(bytes)).expect("emitted report must parse");
        }
        Inbound::Request { scoped, reply } => {
            // Anything that cleared the pipeline must be sealable back.
            let _ = PROCESSOR.seal_response(&reply, scoped.pdu);
        }
        Inbound::Drop => {}
    }
});
