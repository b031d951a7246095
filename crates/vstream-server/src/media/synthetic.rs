//! Synthetic media implementations for the demo profile and tests.
//!
//! The source renders a moving gradient with a sine tone; the encoder
//! wraps frames in the raw codec from `vstream_core::frame::raw`. Both
//! stand in for the FFmpeg-backed collaborators behind the same traits.

use std::f64::consts::TAU;
use std::path::Path;

use vstream_core::frame::{self, VideoFrame};
use vstream_core::{AUDIO_CHUNK_SAMPLES, AUDIO_RATE};

use super::{
    AudioChunk, EncodedFrame, EncoderFactory, FrameSource, SourceEvent, SourceFactory, SourceInfo,
    VideoEncoder,
};
use crate::error::{Result, ServerError};

/// Test-pattern source: gradient video at a fixed cadence plus a 440 Hz
/// tone, both on one media timeline starting at zero.
pub struct SyntheticSource {
    info: SourceInfo,
    video_index: i64,
    audio_index: i64,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, fps: u32, duration_ms: Option<i64>) -> Self {
        Self {
            info: SourceInfo {
                width,
                height,
                fps,
                duration_ms,
            },
            video_index: 0,
            audio_index: 0,
        }
    }

    fn video_pts(&self, index: i64) -> i64 {
        index * 1000 / self.info.fps as i64
    }

    fn audio_pts(&self, index: i64) -> i64 {
        index * AUDIO_CHUNK_SAMPLES as i64 * 1000 / AUDIO_RATE as i64
    }

    fn render_frame(&self, pts_ms: i64) -> VideoFrame {
        let mut frame = VideoFrame::black(self.info.width, self.info.height, pts_ms)
            .expect("synthetic dimensions are even");
        let w = self.info.width as usize;
        let shift = (pts_ms / 10) as usize;
        for row in 0..self.info.height as usize {
            for col in 0..w {
                frame.y[row * w + col] = ((row + col + shift) & 0xFF) as u8;
            }
        }
        let phase = ((pts_ms / 40) & 0xFF) as u8;
        frame.u.fill(phase);
        frame.v.fill(255 - phase);
        frame
    }

    fn render_audio(&self, pts_ms: i64, start_sample: i64) -> AudioChunk {
        let samples = (0..AUDIO_CHUNK_SAMPLES)
            .map(|i| {
                let t = (start_sample + i as i64) as f64 / AUDIO_RATE as f64;
                ((t * 440.0 * TAU).sin() * 8000.0) as i16
            })
            .collect();
        AudioChunk { pts_ms, samples }
    }
}

impl FrameSource for SyntheticSource {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn next(&mut self) -> Result<SourceEvent> {
        let video_pts = self.video_pts(self.video_index);
        let audio_pts = self.audio_pts(self.audio_index);

        if let Some(duration) = self.info.duration_ms {
            if video_pts.min(audio_pts) >= duration {
                return Ok(SourceEvent::End);
            }
        }

        // Interleave by pts so the pipeline sees one merged timeline.
        if audio_pts <= video_pts {
            let start_sample = self.audio_index * AUDIO_CHUNK_SAMPLES as i64;
            self.audio_index += 1;
            Ok(SourceEvent::Audio(self.render_audio(audio_pts, start_sample)))
        } else {
            self.video_index += 1;
            Ok(SourceEvent::Video(self.render_frame(video_pts)))
        }
    }

    fn seek(&mut self, target_ms: i64) -> Result<i64> {
        if self.is_live() {
            return Err(ServerError::unsupported("seek unsupported for live source"));
        }
        let target_ms = target_ms.max(0);
        // Every synthetic frame decodes independently, so the "keyframe"
        // at or before the target is just the previous frame boundary.
        self.video_index = target_ms * self.info.fps as i64 / 1000;
        let actual = self.video_pts(self.video_index);
        self.audio_index = actual * AUDIO_RATE as i64 / (AUDIO_CHUNK_SAMPLES as i64 * 1000);
        Ok(actual)
    }
}

/// Encoder that packs frames with the raw codec. Bitrate only affects the
/// reported configuration; the payload is lossless.
pub struct SyntheticEncoder {
    width: u32,
    height: u32,
    bitrate_bps: i64,
}

impl VideoEncoder for SyntheticEncoder {
    fn encode(&mut self, frame: &VideoFrame) -> Result<Vec<EncodedFrame>> {
        if frame.width != self.width || frame.height != self.height {
            return Err(ServerError::codec(format!(
                "encoder configured for {}x{}, got {}x{}",
                self.width, self.height, frame.width, frame.height
            )));
        }
        let data = frame::raw::pack(frame)?;
        Ok(vec![EncodedFrame {
            pts_ms: frame.pts_ms,
            data,
        }])
    }

    fn flush(&mut self) -> Result<Vec<EncodedFrame>> {
        Ok(Vec::new())
    }

    fn set_bitrate(&mut self, bitrate_bps: i64) {
        self.bitrate_bps = bitrate_bps;
    }
}

/// Factory for [`SyntheticEncoder`]s.
pub struct SyntheticEncoderFactory;

impl EncoderFactory for SyntheticEncoderFactory {
    fn create(
        &self,
        width: u32,
        height: u32,
        _fps: u32,
        bitrate_bps: i64,
    ) -> Result<Box<dyn VideoEncoder>> {
        if width == 0 || height == 0 {
            return Err(ServerError::codec("zero encoder dimensions"));
        }
        Ok(Box::new(SyntheticEncoder {
            width,
            height,
            bitrate_bps,
        }))
    }
}

/// Demo source factory: files become a 640x360 test clip, the camera a
/// live 640x480 feed.
pub struct SyntheticSourceFactory {
    /// Duration reported for "file" sources.
    pub file_duration_ms: i64,
}

impl Default for SyntheticSourceFactory {
    fn default() -> Self {
        Self {
            file_duration_ms: 30_000,
        }
    }
}

impl SourceFactory for SyntheticSourceFactory {
    fn open_file(&self, _path: &Path) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(SyntheticSource::new(
            640,
            360,
            30,
            Some(self.file_duration_ms),
        )))
    }

    fn open_camera(&self) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(SyntheticSource::new(640, 480, 30, None)))
    }
}
