//! Known-answer tests for the BER codec and message encodings.
//!
//! The byte strings here are fixed on the wire format; a failing test
//! means an interoperability break, not a style regression.

mod common;

use bytes::Bytes;
use common::{hex, unhex};
use snmpkit::ber::{Decoder, EncodeBuf, pop_tlv};
use snmpkit::message::CommunityMessage;
use snmpkit::pdu::Pdu;
use snmpkit::value::Value;
use snmpkit::{Oid, oid};

#[test]
fn oid_encoding_known_answer() {
    // 1.3.6.1.2.1.1.2.0 as a full TLV
    let mut buf = EncodeBuf::new();
    buf.push_oid(&oid!(1, 3, 6, 1, 2, 1, 1, 2, 0));
    assert_eq!(hex(&buf.finish()), "06082b06010201010200");
}

#[test]
fn integer_encoding_known_answers() {
    for (value, expected) in [
        (300i64, "020201 2c"),
        (-1, "0201ff"),
        (0, "020100"),
        (127, "02017f"),
        (128, "02020080"),
        (-128, "020180"),
    ] {
        let mut buf = EncodeBuf::new();
        buf.push_integer(value);
        assert_eq!(buf.finish().as_ref(), unhex(expected), "integer {value}");
    }
}

#[test]
fn v2c_get_message_known_answer() {
    // GET of 1.3.6.1.2.1.1.1.0, community "public", request_id 1
    let pdu = Pdu::get_request(1, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]);
    let msg = CommunityMessage::v2c(b"public".as_slice(), pdu);

    let expected = unhex(
        "30 26
         02 01 01
         04 06 70 75 62 6c 69 63
         a0 19
         02 01 01
         02 01 00
         02 01 00
         30 0e
         30 0c
         06 08 2b 06 01 02 01 01 01 00
         05 00",
    );
    assert_eq!(msg.encode().as_ref(), expected);
}

#[test]
fn counter32_overflow_stores_remainder() {
    // a five-byte body encoding 2^32 + 40 decodes to 40
    let data = Bytes::from(unhex("41 05 01 00 00 00 28"));
    let mut decoder = Decoder::new(data);
    assert_eq!(Value::decode(&mut decoder).unwrap(), Value::Counter32(40));
}

#[test]
fn canonical_bytes_reencode_identically() {
    // encode(decode(b)) == b for canonical inputs
    for encoded in [
        "020101",                     // INTEGER 1
        "0203010203",                 // INTEGER 66051
        "0500",                       // NULL
        "040568656c6c6f",             // OCTET STRING "hello"
        "06082b06010201010200",       // OID 1.3.6.1.2.1.1.2.0
        "410105",                     // Counter32 5
        "430300aabb",                 // TimeTicks
        "460200ff",                   // Counter64 255 (sign-bit pad byte)
        "40047f000001",               // IpAddress 127.0.0.1
        "8000",                       // noSuchObject
        "8200",                       // endOfMibView
        "30060201010201ff",           // SEQUENCE { 1, -1 }
        "0101ff",                     // BOOLEAN true
    ] {
        let bytes = Bytes::from(unhex(encoded));
        let mut decoder = Decoder::new(bytes.clone());
        let value = Value::decode(&mut decoder).unwrap();
        assert_eq!(
            hex(&value.to_bytes()),
            hex(&bytes),
            "re-encode mismatch for {encoded}"
        );
    }
}

#[test]
fn pop_tlv_walks_a_buffer() {
    let data = Bytes::from(unhex("020101 0500 040161"));
    let (first, rest) = pop_tlv(data).unwrap();
    assert_eq!(first, Value::Integer(1));

    let (second, rest) = pop_tlv(rest).unwrap();
    assert_eq!(second, Value::Null);

    let (third, rest) = pop_tlv(rest).unwrap();
    assert_eq!(third.as_str(), Some("a"));
    assert!(rest.is_empty());
}

#[test]
fn long_form_length_roundtrip() {
    // a 200-byte OCTET STRING forces the 0x81 long form
    let payload = vec![0x55u8; 200];
    let mut buf = EncodeBuf::new();
    buf.push_octet_string(&payload);
    let encoded = buf.finish();

    assert_eq!(encoded[0], 0x04);
    assert_eq!(encoded[1], 0x81);
    assert_eq!(encoded[2], 200);

    let mut decoder = Decoder::new(encoded);
    let value = Value::decode(&mut decoder).unwrap();
    assert_eq!(value.as_bytes().unwrap(), payload.as_slice());
}

#[test]
fn truncated_messages_fail_cleanly() {
    let full = CommunityMessage::v2c(
        b"public".as_slice(),
        Pdu::get_request(9, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]),
    )
    .encode();

    // every strict prefix must decode to an error, never panic
    for cut in 1..full.len() {
        let truncated = full.slice(..cut);
        assert!(
            CommunityMessage::decode(truncated).is_err(),
            "prefix of {cut} bytes decoded successfully"
        );
    }
}

#[test]
fn oid_text_forms() {
    let relative = Oid::parse("1.3.6.1.2.1.1.2.0").unwrap();
    let absolute = Oid::parse(".1.3.6.1.2.1.1.2.0").unwrap();
    assert_eq!(relative, absolute);
    assert_eq!(absolute.to_string(), "1.3.6.1.2.1.1.2.0");
}
