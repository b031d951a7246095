//! Fragment reassembly keyed by presentation timestamp.
//!
//! Datagrams carrying fragments of the same frame share a `pts`. The table
//! collects fragments per pts, emits a [`MediaPacket`] once every fragment
//! has arrived, and reaps entries that stay incomplete past the TTL so a
//! lost fragment cannot leak its siblings.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::error::{CoreError, Result};
use crate::packet::{MediaKind, MediaPacket};
use crate::wire::DatagramHeader;

/// Max age of an incomplete frame before it is reaped.
pub const REASSEMBLY_TTL: Duration = Duration::from_millis(500);

struct FragmentedFrame {
    count: u16,
    first_seen: Instant,
    fragments: HashMap<u16, Bytes>,
}

/// Per-kind fragment collector.
///
/// One table exists per media kind; the table owns the monotonic `seq`
/// counter for the packets it emits, so sequence numbers reflect completion
/// order within the stream.
pub struct ReassemblyTable {
    kind: MediaKind,
    pending: HashMap<i64, FragmentedFrame>,
    next_seq: u32,
    reaped_frames: u64,
}

impl ReassemblyTable {
    pub fn new(kind: MediaKind) -> Self {
        Self {
            kind,
            pending: HashMap::new(),
            next_seq: 0,
            reaped_frames: 0,
        }
    }

    /// Accept one fragment. Returns a complete packet when this fragment
    /// finishes its frame.
    pub fn push(&mut self, header: DatagramHeader, fragment: Bytes) -> Result<Option<MediaPacket>> {
        self.push_at(header, fragment, Instant::now())
    }

    pub(crate) fn push_at(
        &mut self,
        header: DatagramHeader,
        fragment: Bytes,
        now: Instant,
    ) -> Result<Option<MediaPacket>> {
        let entry = self
            .pending
            .entry(header.pts)
            .or_insert_with(|| FragmentedFrame {
                count: header.fragment_count,
                first_seen: now,
                fragments: HashMap::new(),
            });

        if entry.count != header.fragment_count {
            return Err(CoreError::FragmentMismatch {
                pts: header.pts,
                details: format!(
                    "fragment claims count {} but frame was created with {}",
                    header.fragment_count, entry.count
                ),
            });
        }

        // Duplicate fragments are ignored, first arrival wins.
        entry
            .fragments
            .entry(header.fragment_index)
            .or_insert(fragment);

        if entry.fragments.len() < entry.count as usize {
            return Ok(None);
        }

        let entry = self.pending.remove(&header.pts).expect("entry exists");
        let total: usize = entry.fragments.values().map(|f| f.len()).sum();
        let mut payload = BytesMut::with_capacity(total);
        for index in 0..entry.count {
            payload.extend_from_slice(&entry.fragments[&index]);
        }

        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);

        Ok(Some(MediaPacket {
            seq,
            ts: header.pts,
            kind: self.kind,
            payload: payload.freeze(),
        }))
    }

    /// Evict frames older than [`REASSEMBLY_TTL`]. Returns how many were
    /// dropped.
    pub fn reap(&mut self) -> usize {
        self.reap_at(Instant::now())
    }

    pub(crate) fn reap_at(&mut self, now: Instant) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|_, frame| now.duration_since(frame.first_seen) <= REASSEMBLY_TTL);
        let dropped = before - self.pending.len();
        if dropped > 0 {
            self.reaped_frames += dropped as u64;
            trace!(kind = ?self.kind, dropped, "reaped incomplete frames");
        }
        dropped
    }

    /// Drop all pending fragments, e.g. on seek. The seq counter keeps
    /// running so downstream ordering stays intact.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Frames currently waiting for fragments.
    pub fn pending_frames(&self) -> usize {
        self.pending.len()
    }

    /// Total frames dropped by the reaper since creation.
    pub fn reaped_frames(&self) -> u64 {
        self.reaped_frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire;

    fn header(pts: i64, count: u16, index: u16) -> DatagramHeader {
        DatagramHeader {
            kind: MediaKind::Video,
            pts,
            fragment_count: count,
            fragment_index: index,
        }
    }

    #[test]
    fn test_single_fragment_completes_immediately() {
        let mut table = ReassemblyTable::new(MediaKind::Video);
        let packet = table
            .push(header(10, 1, 0), Bytes::from_static(b"frame"))
            .unwrap()
            .expect("complete");
        assert_eq!(packet.seq, 0);
        assert_eq!(packet.ts, 10);
        assert_eq!(&packet.payload[..], b"frame");
    }

    #[test]
    fn test_out_of_order_fragments_reconstruct_payload() {
        let payload: Vec<u8> = (0..3500u32).map(|i| i as u8).collect();
        let datagrams = wire::serialize(MediaKind::Video, 1234, &payload);
        assert_eq!(datagrams.len(), 3);

        let mut table = ReassemblyTable::new(MediaKind::Video);
        // Deliver in the order 2, 0, 1.
        for i in [2usize, 0, 1] {
            let (h, frag) = wire::parse(datagrams[i].clone()).unwrap();
            let result = table.push(h, frag).unwrap();
            if i == 1 {
                let packet = result.expect("last fragment completes the frame");
                assert_eq!(packet.ts, 1234);
                assert_eq!(&packet.payload[..], &payload[..]);
            } else {
                assert!(result.is_none());
            }
        }
        assert_eq!(table.pending_frames(), 0);
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let mut table = ReassemblyTable::new(MediaKind::Video);
        table.push(header(5, 3, 0), Bytes::new()).unwrap();
        let err = table.push(header(5, 4, 1), Bytes::new()).unwrap_err();
        assert!(matches!(err, CoreError::FragmentMismatch { pts: 5, .. }));
    }

    #[test]
    fn test_seq_is_monotonic_per_completion() {
        let mut table = ReassemblyTable::new(MediaKind::Audio);
        // Second frame completes before the first.
        assert!(table.push(header(1, 2, 0), Bytes::new()).unwrap().is_none());
        let p2 = table.push(header(2, 1, 0), Bytes::new()).unwrap().unwrap();
        let p1 = table.push(header(1, 2, 1), Bytes::new()).unwrap().unwrap();
        assert_eq!(p2.seq, 0);
        assert_eq!(p1.seq, 1);
    }

    #[test]
    fn test_ttl_reaps_stale_fragment() {
        let now = Instant::now();
        let mut table = ReassemblyTable::new(MediaKind::Video);
        table
            .push_at(header(7, 3, 0), Bytes::from_static(b"x"), now)
            .unwrap();
        assert_eq!(table.pending_frames(), 1);

        // Not yet expired at exactly the TTL boundary.
        assert_eq!(table.reap_at(now + REASSEMBLY_TTL), 0);
        assert_eq!(table.pending_frames(), 1);

        assert_eq!(table.reap_at(now + REASSEMBLY_TTL + Duration::from_millis(100)), 1);
        assert_eq!(table.pending_frames(), 0);
        assert_eq!(table.reaped_frames(), 1);
    }

    #[test]
    fn test_clear_drops_pending() {
        let mut table = ReassemblyTable::new(MediaKind::Video);
        table.push(header(1, 2, 0), Bytes::new()).unwrap();
        table.clear();
        assert_eq!(table.pending_frames(), 0);
    }
}
