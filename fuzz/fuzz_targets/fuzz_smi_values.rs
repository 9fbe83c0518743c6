#![no_main]

//! SMI-layer fuzzing: OID content octets the decoder accepts must be
//! canonical (re-encoding reproduces the input byte for byte, and the
//! dotted form re-parses), and any accepted value must be a fixed point
//! of decode-then-encode.

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

use rsnmp::ber::Decoder;
use rsnmp::oid::Oid;
use rsnmp::value::{decode_value, encode_value};
use rsnmp::varbind::VarBind;

fuzz_target!(|data: &[u8]| {
    if let Ok(oid) = Oid::from_ber(data) {
        assert_eq!(&oid.to_ber_smallvec()[..], data, "OID encoding not canonical");
        let text = oid.to_string();
        assert_eq!(Oid::parse(&text).expect("display output re-parses"), oid);
    }

    let bytes = Bytes::copy_from_slice(data);
    if let Ok(value) = decode_value(bytes.clone()) {
        let canonical = encode_value(&value);
        assert_eq!(
            decode_value(canonical).expect("canonical form re-decodes"),
            value
        );
    }

    let mut decoder = Decoder::new(bytes);
    let _ = VarBind::decode(&mut decoder);
});
