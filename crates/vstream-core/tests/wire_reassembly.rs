//! Wire-format laws: serialize → reassemble is the identity on
//! (kind, pts, payload).

use bytes::Bytes;
use vstream_core::reassembly::ReassemblyTable;
use vstream_core::{wire, MediaKind, MAX_FRAGMENT_PAYLOAD};

fn round_trip(kind: MediaKind, pts: i64, payload: Vec<u8>) {
    let datagrams = wire::serialize(kind, pts, &payload);
    let expected_fragments = payload.len().div_ceil(MAX_FRAGMENT_PAYLOAD).max(1);
    assert_eq!(datagrams.len(), expected_fragments);

    let mut table = ReassemblyTable::new(kind);
    let mut completed = None;
    // Deliver fragments newest-first; order must not matter.
    for index in (0..datagrams.len()).rev() {
        let (header, fragment) = wire::parse(datagrams[index].clone()).unwrap();
        assert_eq!(header.kind, kind);
        assert_eq!(header.pts, pts);
        if let Some(packet) = table.push(header, fragment).unwrap() {
            assert!(completed.is_none(), "exactly one completion");
            completed = Some(packet);
        }
    }

    let packet = completed.expect("frame completed");
    assert_eq!(packet.kind, kind);
    assert_eq!(packet.ts, pts);
    assert_eq!(packet.payload, Bytes::from(payload));
}

#[test]
fn test_round_trip_small_payloads() {
    round_trip(MediaKind::Video, 0, vec![]);
    round_trip(MediaKind::Audio, -1, vec![42]);
    round_trip(MediaKind::Video, 1234, (0..255u8).collect());
}

#[test]
fn test_round_trip_at_fragment_boundaries() {
    for len in [
        MAX_FRAGMENT_PAYLOAD - 1,
        MAX_FRAGMENT_PAYLOAD,
        MAX_FRAGMENT_PAYLOAD + 1,
        3 * MAX_FRAGMENT_PAYLOAD,
        3 * MAX_FRAGMENT_PAYLOAD + 7,
    ] {
        let payload: Vec<u8> = (0..len).map(|i| (i * 31) as u8).collect();
        round_trip(MediaKind::Video, i64::MAX, payload);
    }
}

#[test]
fn test_round_trip_large_payload() {
    // A couple of MiB, thousands of fragments.
    let payload: Vec<u8> = (0..2 * 1024 * 1024usize).map(|i| (i ^ (i >> 8)) as u8).collect();
    round_trip(MediaKind::Video, 86_400_000, payload);
}

#[test]
fn test_scrambled_delivery_of_three_fragments() {
    // The E4 shape: 3500 bytes at pts 1234 in three datagrams.
    let payload: Vec<u8> = (0..3500u32).map(|i| i as u8).collect();
    let datagrams = wire::serialize(MediaKind::Video, 1234, &payload);
    assert_eq!(datagrams.len(), 3);

    let mut table = ReassemblyTable::new(MediaKind::Video);
    let mut result = None;
    for index in [1usize, 2, 0] {
        let (header, fragment) = wire::parse(datagrams[index].clone()).unwrap();
        if let Some(packet) = table.push(header, fragment).unwrap() {
            result = Some(packet);
        }
    }
    let packet = result.unwrap();
    assert_eq!(packet.ts, 1234);
    assert_eq!(&packet.payload[..], &payload[..]);
}
