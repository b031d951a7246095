//! Media collaborator seams.
//!
//! Demuxing, decoding, camera capture and video encoding are external
//! collaborators (FFmpeg, OpenCV and friends); this module defines the
//! traits the pipeline drives them through, plus the synthetic
//! implementations used by the demo profile and the tests.

pub mod synthetic;

use bytes::Bytes;

use vstream_core::VideoFrame;

use crate::error::Result;

/// Static properties of an opened source.
#[derive(Debug, Clone, Copy)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// `None` for live sources (camera).
    pub duration_ms: Option<i64>,
}

/// One mono PCM16 chunk.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub pts_ms: i64,
    pub samples: Vec<i16>,
}

/// What a source yields next, in presentation order per stream.
#[derive(Debug)]
pub enum SourceEvent {
    Video(VideoFrame),
    Audio(AudioChunk),
    End,
}

/// A demuxed+decoded media source (file) or a capture device (camera).
pub trait FrameSource: Send {
    fn info(&self) -> SourceInfo;

    fn is_live(&self) -> bool {
        self.info().duration_ms.is_none()
    }

    /// Produce the next event. Sources deliver video in decode order; the
    /// pipeline's reorder buffer restores presentation order.
    fn next(&mut self) -> Result<SourceEvent>;

    /// Jump to the nearest keyframe at or before `target_ms`, returning
    /// its pts. Live sources refuse.
    fn seek(&mut self, target_ms: i64) -> Result<i64>;
}

/// An encoded video frame ready for fragmentation.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub pts_ms: i64,
    pub data: Bytes,
}

/// A configured video encoder instance.
pub trait VideoEncoder: Send {
    /// Encode one frame; may buffer and return zero or more packets.
    fn encode(&mut self, frame: &VideoFrame) -> Result<Vec<EncodedFrame>>;

    /// Drain buffered packets.
    fn flush(&mut self) -> Result<Vec<EncodedFrame>>;

    /// Adjust the target bitrate without reinitialization.
    fn set_bitrate(&mut self, bitrate_bps: i64);
}

/// Creates encoder instances; recreated by the pipeline whenever the ABR
/// target height or fps changes.
pub trait EncoderFactory: Send + Sync {
    fn create(
        &self,
        width: u32,
        height: u32,
        fps: u32,
        bitrate_bps: i64,
    ) -> Result<Box<dyn VideoEncoder>>;
}

/// Opens concrete sources for the catalog. This is the FFmpeg/OpenCV seam:
/// a production build plugs demuxer-backed implementations in here.
pub trait SourceFactory: Send + Sync {
    fn open_file(&self, path: &std::path::Path) -> Result<Box<dyn FrameSource>>;
    fn open_camera(&self) -> Result<Box<dyn FrameSource>>;
}
