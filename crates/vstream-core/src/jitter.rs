//! Jitter buffer for reordering received media packets.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Mutex;

use crate::packet::MediaPacket;

/// Default maximum packets held before pushes are dropped.
pub const DEFAULT_MAX_SIZE: usize = 300;

/// Bounded min-heap of [`MediaPacket`]s ordered by sequence number.
///
/// `pop` delivers packets strictly in order. When the packet at the head of
/// the heap is ahead of the expected sequence, the expected sequence is
/// advanced by one and `None` is returned: the caller observes exactly one
/// missing slot per lost packet and can compensate (silence for audio),
/// so a loss never blocks the stream.
pub struct JitterBuffer {
    inner: Mutex<Inner>,
}

struct Inner {
    heap: BinaryHeap<Reverse<MediaPacket>>,
    expected_seq: Option<u32>,
    max_size: usize,
}

impl JitterBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_SIZE)
    }

    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                expected_seq: None,
                max_size,
            }),
        }
    }

    /// Clear all packets and forget the expected sequence.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.heap.clear();
        inner.expected_seq = None;
    }

    /// Insert a packet. Stale packets (behind the expected sequence) and
    /// packets that would overflow the buffer are dropped.
    pub fn push(&self, packet: MediaPacket) {
        let mut inner = self.inner.lock().unwrap();
        let expected = *inner.expected_seq.get_or_insert(packet.seq);
        if packet.seq >= expected && inner.heap.len() < inner.max_size {
            inner.heap.push(Reverse(packet));
        }
    }

    /// Take the next in-order packet.
    ///
    /// Returns `None` when the buffer is empty, or when the expected packet
    /// is missing from the head of the heap; in the latter case the
    /// expected sequence is advanced so the stream keeps moving.
    pub fn pop(&self) -> Option<MediaPacket> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            let expected = inner.expected_seq?;
            let head_seq = inner.heap.peek()?.0.seq;

            if head_seq == expected {
                let packet = inner.heap.pop().unwrap().0;
                inner.expected_seq = Some(expected.wrapping_add(1));
                return Some(packet);
            }
            if head_seq < expected {
                // Stale duplicate, discard and look again.
                inner.heap.pop();
                continue;
            }
            // head_seq > expected: the expected packet is lost. Skip its
            // slot and report the gap to the caller.
            inner.expected_seq = Some(expected.wrapping_add(1));
            return None;
        }
    }

    /// Packets currently buffered.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for JitterBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::MediaKind;
    use bytes::Bytes;

    fn packet(seq: u32) -> MediaPacket {
        MediaPacket {
            seq,
            ts: seq as i64 * 33,
            kind: MediaKind::Video,
            payload: Bytes::new(),
        }
    }

    #[test]
    fn test_in_order_delivery_from_shuffled_pushes() {
        let buffer = JitterBuffer::new();
        // The first push pins expected_seq, so the lowest seq leads.
        for seq in [100u32, 104, 102, 101, 103] {
            buffer.push(packet(seq));
        }
        for expected in 100..105 {
            assert_eq!(buffer.pop().map(|p| p.seq), Some(expected));
        }
        assert!(buffer.pop().is_none());
    }

    #[test]
    fn test_gap_yields_none_then_resumes() {
        let buffer = JitterBuffer::new();
        for seq in [200u32, 201, 203] {
            buffer.push(packet(seq));
        }
        assert_eq!(buffer.pop().map(|p| p.seq), Some(200));
        assert_eq!(buffer.pop().map(|p| p.seq), Some(201));
        assert!(buffer.pop().is_none());
        assert_eq!(buffer.pop().map(|p| p.seq), Some(203));
    }

    #[test]
    fn test_stale_packets_dropped_on_push() {
        let buffer = JitterBuffer::new();
        buffer.push(packet(50));
        assert_eq!(buffer.pop().map(|p| p.seq), Some(50));
        buffer.push(packet(49));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_capacity_limits_pushes() {
        let buffer = JitterBuffer::with_capacity(2);
        buffer.push(packet(0));
        buffer.push(packet(1));
        buffer.push(packet(2));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_duplicate_of_played_packet_discarded_in_pop() {
        let buffer = JitterBuffer::new();
        buffer.push(packet(10));
        buffer.push(packet(11));
        assert_eq!(buffer.pop().map(|p| p.seq), Some(10));
        // A duplicate of 10 sneaks in while 11 is still queued; it must be
        // skipped, not delivered.
        {
            let mut inner = buffer.inner.lock().unwrap();
            inner.heap.push(Reverse(packet(10)));
        }
        assert_eq!(buffer.pop().map(|p| p.seq), Some(11));
    }
}
