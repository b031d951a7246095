//! Reassembled media packets.

use std::cmp::Ordering;

use bytes::Bytes;

/// Kind of media carried by a packet or datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    /// Wire value of the kind byte.
    pub fn as_u8(self) -> u8 {
        match self {
            MediaKind::Video => 0,
            MediaKind::Audio => 1,
        }
    }

    /// Parse the wire kind byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(MediaKind::Video),
            1 => Some(MediaKind::Audio),
            _ => None,
        }
    }
}

/// A complete media unit after reassembly.
///
/// `seq` is assigned by the receiver, monotonic per stream kind. `payload`
/// is a whole encoded video frame or one PCM16 audio chunk. Ordering is by
/// `seq` ascending so packets sort into delivery order.
#[derive(Debug, Clone)]
pub struct MediaPacket {
    pub seq: u32,
    pub ts: i64,
    pub kind: MediaKind,
    pub payload: Bytes,
}

impl PartialEq for MediaPacket {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for MediaPacket {}

impl PartialOrd for MediaPacket {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MediaPacket {
    fn cmp(&self, other: &Self) -> Ordering {
        self.seq.cmp(&other.seq)
    }
}
