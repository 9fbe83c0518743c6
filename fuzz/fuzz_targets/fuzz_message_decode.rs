#![no_main]

//! Message-layer fuzzing: the version-dispatching decoder must agree with
//! the direct v1/v2c and v3 decoders, never panic, and everything it
//! accepts must survive a re-encode/re-decode cycle structurally intact.

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

use rsnmp::message::{CommunityMessage, Message, V3Message};

fuzz_target!(|data: &[u8]| {
    let bytes = Bytes::copy_from_slice(data);

    match Message::decode(bytes.clone()) {
        Ok(Message::Community(msg)) => {
            let again = CommunityMessage::decode(msg.encode()).expect("re-decode community");
            assert_eq!(again, msg);
        }
        Ok(Message::V3(decoded)) => {
            let reencoded = decoded.message.encode();
            let again =
                V3Message::decode(Bytes::from(reencoded.bytes)).expect("re-decode v3");
            assert_eq!(again.message, decoded.message);
        }
        Err(_) => {
            // Rejected by dispatch; the direct decoders must not panic either.
            let _ = CommunityMessage::decode(bytes.clone());
            let _ = V3Message::decode(bytes);
        }
    }
});
