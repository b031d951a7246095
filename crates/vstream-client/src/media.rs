//! Playback collaborator seams.
//!
//! Video decoding, frame interpolation, audio output and display are
//! external collaborators. The implementations here close the loop for the
//! demo profile: the raw-codec decoder matches the server's synthetic
//! encoder, the linear interpolator blends YUV planes, and the null sinks
//! count what they consume.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

use vstream_core::frame::{self, VideoFrame};

use crate::error::{ClientError, Result};

/// Turns encoded video payloads back into pictures. Stateful codecs may
/// buffer and return several frames at once.
pub trait FrameDecoder: Send {
    fn decode(&mut self, payload: Bytes, pts_ms: i64) -> Result<Vec<VideoFrame>>;
}

/// Decoder for the raw demo codec.
pub struct RawFrameDecoder;

impl FrameDecoder for RawFrameDecoder {
    fn decode(&mut self, payload: Bytes, pts_ms: i64) -> Result<Vec<VideoFrame>> {
        let frame = frame::raw::unpack(payload, pts_ms)
            .map_err(|e| ClientError::decode(e.to_string()))?;
        Ok(vec![frame])
    }
}

/// Pure frame interpolation: inputs untouched, output pts between them.
pub trait FrameInterpolator: Send + Sync {
    fn interpolate(&self, prev: &VideoFrame, next: &VideoFrame, factor: f64)
        -> Result<VideoFrame>;
}

/// Per-pixel linear blend of two frames.
pub struct LinearInterpolator;

impl FrameInterpolator for LinearInterpolator {
    fn interpolate(
        &self,
        prev: &VideoFrame,
        next: &VideoFrame,
        factor: f64,
    ) -> Result<VideoFrame> {
        if prev.width != next.width || prev.height != next.height {
            return Err(ClientError::decode(format!(
                "cannot interpolate {}x{} with {}x{}",
                prev.width, prev.height, next.width, next.height
            )));
        }
        if !(0.0..=1.0).contains(&factor) {
            return Err(ClientError::decode(format!("factor {factor} outside [0, 1]")));
        }
        let lerp_plane = |a: &[u8], b: &[u8]| -> Vec<u8> {
            a.iter()
                .zip(b)
                .map(|(&p, &n)| (p as f64 + factor * (n as f64 - p as f64)).round() as u8)
                .collect()
        };
        Ok(VideoFrame {
            pts_ms: prev.pts_ms + ((next.pts_ms - prev.pts_ms) as f64 * factor).round() as i64,
            width: prev.width,
            height: prev.height,
            y: lerp_plane(&prev.y, &next.y),
            u: lerp_plane(&prev.u, &next.u),
            v: lerp_plane(&prev.v, &next.v),
        })
    }
}

/// Consumes rendered frames (a texture upload in a real player).
pub trait DisplaySink: Send + Sync {
    fn present(&self, frame: VideoFrame) -> Result<()>;
}

/// Consumes PCM chunks (a PortAudio stream in a real player). Writes are
/// expected to return promptly; the audio task paces itself off the
/// master clock.
pub trait AudioSink: Send + Sync {
    fn write(&self, samples: &[i16]) -> Result<()>;
}

/// Display sink that only counts frames.
#[derive(Default)]
pub struct NullDisplay {
    frames: AtomicU64,
    last_pts_ms: std::sync::atomic::AtomicI64,
}

impl NullDisplay {
    pub fn frames_presented(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// pts of the most recently presented frame, -1 before the first.
    pub fn last_pts_ms(&self) -> i64 {
        if self.frames_presented() == 0 {
            -1
        } else {
            self.last_pts_ms.load(Ordering::Relaxed)
        }
    }
}

impl DisplaySink for NullDisplay {
    fn present(&self, frame: VideoFrame) -> Result<()> {
        self.last_pts_ms.store(frame.pts_ms, Ordering::Relaxed);
        self.frames.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Audio sink that only counts samples.
#[derive(Default)]
pub struct NullAudioSink {
    samples: AtomicU64,
}

impl NullAudioSink {
    pub fn samples_written(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }
}

impl AudioSink for NullAudioSink {
    fn write(&self, samples: &[i16]) -> Result<()> {
        self.samples.fetch_add(samples.len() as u64, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_decoder_matches_raw_codec() {
        let frame = VideoFrame::black(32, 16, 9).unwrap();
        let payload = frame::raw::pack(&frame).unwrap();
        let mut decoder = RawFrameDecoder;
        let decoded = decoder.decode(payload, 9).unwrap();
        assert_eq!(decoded, vec![frame]);
    }

    #[test]
    fn test_raw_decoder_rejects_garbage() {
        let mut decoder = RawFrameDecoder;
        assert!(decoder.decode(Bytes::from_static(b"xx"), 0).is_err());
    }

    #[test]
    fn test_linear_interpolation_midpoint() {
        let mut prev = VideoFrame::black(16, 16, 100).unwrap();
        let mut next = VideoFrame::black(16, 16, 200).unwrap();
        prev.y.fill(100);
        next.y.fill(200);

        let mid = LinearInterpolator.interpolate(&prev, &next, 0.5).unwrap();
        assert_eq!(mid.pts_ms, 150);
        assert!(mid.y.iter().all(|&p| p == 150));
        // Inputs untouched.
        assert!(prev.y.iter().all(|&p| p == 100));
        assert!(next.y.iter().all(|&p| p == 200));
    }

    #[test]
    fn test_interpolation_rejects_mismatched_frames() {
        let a = VideoFrame::black(16, 16, 0).unwrap();
        let b = VideoFrame::black(32, 32, 40).unwrap();
        assert!(LinearInterpolator.interpolate(&a, &b, 0.5).is_err());
        let c = VideoFrame::black(16, 16, 40).unwrap();
        assert!(LinearInterpolator.interpolate(&a, &c, 1.5).is_err());
    }
}
