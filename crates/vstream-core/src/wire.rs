//! Media datagram wire format.
//!
//! Every media datagram starts with a fixed 13-byte header, big-endian for
//! multi-byte fields, followed by the fragment payload:
//!
//! ```text
//! offset size field
//! 0      1    kind (0=Video, 1=Audio)
//! 1      8    pts_ms (signed)
//! 9      2    fragment_count (>= 1)
//! 11     2    fragment_index (0..count)
//! 13     *    fragment payload
//! ```
//!
//! Frames larger than [`MAX_FRAGMENT_PAYLOAD`] are split into several
//! datagrams that share `pts` and `fragment_count` and differ only in
//! `fragment_index` and payload slice.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CoreError, Result};
use crate::packet::MediaKind;

/// Size of the fixed datagram header in bytes.
pub const HEADER_SIZE: usize = 13;

/// Maximum fragment payload carried by one datagram. Leaves headroom under
/// the QUIC datagram MTU.
pub const MAX_FRAGMENT_PAYLOAD: usize = 1200;

/// Parsed media datagram header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatagramHeader {
    pub kind: MediaKind,
    pub pts: i64,
    pub fragment_count: u16,
    pub fragment_index: u16,
}

impl DatagramHeader {
    /// Serialize the header into `buf`.
    pub fn write(&self, buf: &mut BytesMut) {
        buf.put_u8(self.kind.as_u8());
        buf.put_i64(self.pts);
        buf.put_u16(self.fragment_count);
        buf.put_u16(self.fragment_index);
    }

    /// Parse a header from the front of `buf`, advancing it past the header.
    pub fn parse(buf: &mut impl Buf) -> Result<Self> {
        if buf.remaining() < HEADER_SIZE {
            return Err(CoreError::malformed(format!(
                "datagram of {} bytes is shorter than the {} byte header",
                buf.remaining(),
                HEADER_SIZE
            )));
        }

        let kind = buf.get_u8();
        let kind = MediaKind::from_u8(kind)
            .ok_or_else(|| CoreError::malformed(format!("unknown media kind {}", kind)))?;
        let pts = buf.get_i64();
        let fragment_count = buf.get_u16();
        let fragment_index = buf.get_u16();

        if fragment_count == 0 {
            return Err(CoreError::malformed("fragment count of zero"));
        }
        if fragment_index >= fragment_count {
            return Err(CoreError::malformed(format!(
                "fragment index {} outside count {}",
                fragment_index, fragment_count
            )));
        }

        Ok(Self {
            kind,
            pts,
            fragment_count,
            fragment_index,
        })
    }
}

/// Split one encoded frame into ready-to-send datagrams.
///
/// Payloads up to [`MAX_FRAGMENT_PAYLOAD`] produce a single datagram with
/// `count=1, index=0`; larger payloads are split into `ceil(len / max)`
/// fragments sharing `pts` and `count`.
pub fn serialize(kind: MediaKind, pts: i64, payload: &[u8]) -> Vec<Bytes> {
    let fragment_count = payload.len().div_ceil(MAX_FRAGMENT_PAYLOAD).max(1) as u16;

    let mut datagrams = Vec::with_capacity(fragment_count as usize);
    for index in 0..fragment_count {
        let offset = index as usize * MAX_FRAGMENT_PAYLOAD;
        let end = (offset + MAX_FRAGMENT_PAYLOAD).min(payload.len());
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + (end - offset));
        DatagramHeader {
            kind,
            pts,
            fragment_count,
            fragment_index: index,
        }
        .write(&mut buf);
        buf.put_slice(&payload[offset..end]);
        datagrams.push(buf.freeze());
    }
    datagrams
}

/// Parse a received datagram into its header and fragment payload.
pub fn parse(datagram: Bytes) -> Result<(DatagramHeader, Bytes)> {
    let mut buf = datagram;
    let header = DatagramHeader::parse(&mut buf)?;
    Ok((header, buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_fragment_layout() {
        let datagrams = serialize(MediaKind::Video, 1234, b"abc");
        assert_eq!(datagrams.len(), 1);
        let wire = &datagrams[0];
        assert_eq!(wire.len(), HEADER_SIZE + 3);
        assert_eq!(wire[0], 0);
        assert_eq!(&wire[1..9], &1234i64.to_be_bytes());
        assert_eq!(&wire[9..11], &1u16.to_be_bytes());
        assert_eq!(&wire[11..13], &0u16.to_be_bytes());
        assert_eq!(&wire[13..], b"abc");
    }

    #[test]
    fn test_fragmentation_boundaries() {
        let payload = vec![7u8; MAX_FRAGMENT_PAYLOAD * 2 + 1];
        let datagrams = serialize(MediaKind::Video, 99, &payload);
        assert_eq!(datagrams.len(), 3);
        for (i, dgram) in datagrams.iter().enumerate() {
            let (header, fragment) = parse(dgram.clone()).unwrap();
            assert_eq!(header.pts, 99);
            assert_eq!(header.fragment_count, 3);
            assert_eq!(header.fragment_index, i as u16);
            if i < 2 {
                assert_eq!(fragment.len(), MAX_FRAGMENT_PAYLOAD);
            } else {
                assert_eq!(fragment.len(), 1);
            }
        }
    }

    #[test]
    fn test_empty_payload_still_sends_one_datagram() {
        let datagrams = serialize(MediaKind::Audio, 0, b"");
        assert_eq!(datagrams.len(), 1);
        let (header, fragment) = parse(datagrams[0].clone()).unwrap();
        assert_eq!(header.fragment_count, 1);
        assert!(fragment.is_empty());
    }

    #[test]
    fn test_short_datagram_rejected() {
        for len in 0..HEADER_SIZE {
            let result = parse(Bytes::from(vec![0u8; len]));
            assert!(matches!(result, Err(CoreError::Malformed { .. })), "len {}", len);
        }
    }

    #[test]
    fn test_header_plus_k_decodes_k_payload_bytes() {
        for k in [0usize, 1, 17, 1200] {
            let mut wire = BytesMut::new();
            DatagramHeader {
                kind: MediaKind::Audio,
                pts: -5,
                fragment_count: 1,
                fragment_index: 0,
            }
            .write(&mut wire);
            wire.put_slice(&vec![0xAB; k]);
            let (header, fragment) = parse(wire.freeze()).unwrap();
            assert_eq!(header.kind, MediaKind::Audio);
            assert_eq!(header.pts, -5);
            assert_eq!(fragment.len(), k);
        }
    }

    #[test]
    fn test_bad_kind_and_bad_counts_rejected() {
        let mut wire = BytesMut::new();
        wire.put_u8(9);
        wire.put_i64(0);
        wire.put_u16(1);
        wire.put_u16(0);
        assert!(parse(wire.freeze()).is_err());

        let mut wire = BytesMut::new();
        wire.put_u8(0);
        wire.put_i64(0);
        wire.put_u16(0);
        wire.put_u16(0);
        assert!(parse(wire.freeze()).is_err());

        let mut wire = BytesMut::new();
        wire.put_u8(0);
        wire.put_i64(0);
        wire.put_u16(2);
        wire.put_u16(2);
        assert!(parse(wire.freeze()).is_err());
    }
}
