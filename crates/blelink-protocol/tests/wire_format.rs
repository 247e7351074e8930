//! Decoding lines the way a helper actually emits them.
//!
//! These lines follow the helper's transcript format: a response type in
//! `rsp`, domain tags that the protocol layer passes through untouched.

use blelink_protocol::{Command, ProtocolError, Record, RecordKind, Value};

#[test]
fn test_status_connected_line() {
    let rec = Record::decode(
        "rsp=$stat state=$conn dst=$C4:BE:84:70:69:09 mtu=h17 sec=$low\n",
    )
    .unwrap();

    assert_eq!(rec.kind(), RecordKind::Response);
    assert_eq!(rec.response_type(), Some("stat"));
    assert_eq!(rec.str("state"), Some("conn"));
    assert_eq!(rec.str("dst"), Some("C4:BE:84:70:69:09"));
    assert_eq!(rec.int("mtu"), Some(23));
    assert_eq!(rec.str("sec"), Some("low"));
}

#[test]
fn test_service_discovery_line_keeps_parallel_sequences() {
    let rec = Record::decode(
        "rsp=$find hstart=h1 hstart=h8 hend=h7 hend=hFFFF uuid='1800 uuid='1801",
    )
    .unwrap();

    let starts: Vec<u64> = rec
        .get("hstart")
        .unwrap()
        .iter()
        .flatten()
        .filter_map(Value::as_int)
        .collect();
    let ends: Vec<u64> = rec
        .get("hend")
        .unwrap()
        .iter()
        .flatten()
        .filter_map(Value::as_int)
        .collect();

    assert_eq!(starts, vec![1, 8]);
    assert_eq!(ends, vec![7, 0xffff]);
    assert_eq!(rec.get("uuid").unwrap().len(), 2);
}

#[test]
fn test_read_response_with_bytes() {
    let rec = Record::decode("rsp=$rd d=b4869").unwrap();
    assert_eq!(rec.bytes("d"), Some(&b"Hi"[..]));
}

#[test]
fn test_error_response_is_still_a_response() {
    let rec = Record::decode("rsp=$err code=$badstate").unwrap();
    assert_eq!(rec.response_type(), Some("err"));
}

#[test]
fn test_tags_without_rsp_are_malformed_for_dispatch() {
    let rec = Record::decode("state=$conn").unwrap();
    assert_eq!(rec.kind(), RecordKind::Malformed);
}

#[test]
fn test_unknown_prefix_anywhere_fails_the_whole_line() {
    let result = Record::decode("rsp=$stat mtu=h17 sec=xhigh");
    assert!(matches!(result, Err(ProtocolError::UnknownPrefix { .. })));
}

#[test]
fn test_command_and_response_agree_on_hex_case() {
    // Commands use bare uppercase hex; responses accept any case.
    let cmd = Command::new("rd").hex(0xab).encode().unwrap();
    assert_eq!(cmd, "rd AB\n");
    let rec = Record::decode("rsp=$rd hnd=hab").unwrap();
    assert_eq!(rec.int("hnd"), Some(0xab));
}
