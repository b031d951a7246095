//! The transcode-and-send pipeline.
//!
//! One task per active stream pulls events from the source, restores
//! presentation order through a small reorder buffer, paces each event to
//! its pts on the wall clock, runs video through the ABR-driven encoder
//! lifecycle, fragments the result and hands datagrams to the sink.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, warn};

use vstream_core::abr::AbrController;
use vstream_core::frame::{scale_bilinear, VideoFrame};
use vstream_core::{pcm, wire, MediaKind, Pacer};

use crate::error::Result;
use crate::media::{AudioChunk, EncodedFrame, EncoderFactory, FrameSource, SourceEvent, VideoEncoder};

/// Depth of the presentation-order reorder buffer, sized for B-frame
/// distances seen in practice.
const REORDER_DEPTH: usize = 60;

/// Poll interval while paused or waiting for commands.
const PAUSE_POLL: Duration = Duration::from_millis(10);

/// Bitrate changes below this fraction are absorbed without touching the
/// encoder.
const BITRATE_DEADBAND: f64 = 0.05;

/// Where finished datagrams go. Implemented by the QUIC connection and by
/// test collectors.
pub trait MediaSink: Send + Sync {
    fn send_datagram(&self, data: Bytes) -> Result<()>;
}

impl MediaSink for vstream_transport::server::ConnectionSender {
    fn send_datagram(&self, data: Bytes) -> Result<()> {
        Ok(vstream_transport::server::ConnectionSender::send_datagram(self, data)?)
    }
}

/// Shared flags the manager flips and the pipeline polls.
pub struct StreamControl {
    running: AtomicBool,
    paused: AtomicBool,
    /// Pending seek target in ms, -1 when none.
    seek_to_ms: AtomicI64,
}

impl StreamControl {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            paused: AtomicBool::new(false),
            seek_to_ms: AtomicI64::new(-1),
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn request_seek(&self, target_ms: i64) {
        self.seek_to_ms.store(target_ms.max(0), Ordering::SeqCst);
    }

    fn take_seek(&self) -> Option<i64> {
        let target = self.seek_to_ms.swap(-1, Ordering::SeqCst);
        (target >= 0).then_some(target)
    }
}

impl Default for StreamControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Sorts decode-order frames back into presentation order.
struct ReorderBuffer {
    frames: BTreeMap<i64, VideoFrame>,
}

impl ReorderBuffer {
    fn new() -> Self {
        Self {
            frames: BTreeMap::new(),
        }
    }

    fn insert(&mut self, frame: VideoFrame) {
        self.frames.insert(frame.pts_ms, frame);
    }

    fn head_pts(&self) -> Option<i64> {
        self.frames.keys().next().copied()
    }

    fn pop_head(&mut self) -> Option<VideoFrame> {
        self.frames.pop_first().map(|(_, f)| f)
    }

    fn len(&self) -> usize {
        self.frames.len()
    }

    fn clear(&mut self) {
        self.frames.clear();
    }
}

/// Owns the encoder instance and applies the ABR decision: recreate on a
/// height or fps change, adjust in place for bitrate moves beyond the
/// deadband.
struct EncoderLifecycle {
    factory: Arc<dyn EncoderFactory>,
    abr: Arc<AbrController>,
    encoder: Option<Box<dyn VideoEncoder>>,
    width: u32,
    height: u32,
    fps: u32,
    bitrate_bps: i64,
}

impl EncoderLifecycle {
    fn new(factory: Arc<dyn EncoderFactory>, abr: Arc<AbrController>) -> Self {
        Self {
            factory,
            abr,
            encoder: None,
            width: 0,
            height: 0,
            fps: 0,
            bitrate_bps: 0,
        }
    }

    fn encode(&mut self, frame: &VideoFrame) -> Result<Vec<EncodedFrame>> {
        let decision = self.abr.decision();

        if self.encoder.is_none()
            || decision.target_height != self.height
            || decision.target_fps != self.fps
        {
            // Keep the source aspect ratio; encoders want even widths.
            let scale = decision.target_height as f64 / frame.height as f64;
            let width = (((frame.width as f64 * scale) as u32) / 2) * 2;
            let width = width.max(2);
            info!(
                width,
                height = decision.target_height,
                fps = decision.target_fps,
                kbps = decision.bitrate_bps / 1024,
                "initializing encoder"
            );
            self.encoder = Some(self.factory.create(
                width,
                decision.target_height,
                decision.target_fps,
                decision.bitrate_bps,
            )?);
            self.width = width;
            self.height = decision.target_height;
            self.fps = decision.target_fps;
            self.bitrate_bps = decision.bitrate_bps;
        } else if (decision.bitrate_bps - self.bitrate_bps).unsigned_abs()
            > (self.bitrate_bps as f64 * BITRATE_DEADBAND) as u64
        {
            debug!(kbps = decision.bitrate_bps / 1024, "adjusting encoder bitrate");
            self.encoder
                .as_mut()
                .expect("encoder exists")
                .set_bitrate(decision.bitrate_bps);
            self.bitrate_bps = decision.bitrate_bps;
        }

        let encoder = self.encoder.as_mut().expect("encoder exists");
        if frame.width != self.width || frame.height != self.height {
            let scaled = scale_bilinear(frame, self.width, self.height)?;
            encoder.encode(&scaled)
        } else {
            encoder.encode(frame)
        }
    }

    fn flush(&mut self) -> Result<Vec<EncodedFrame>> {
        match self.encoder.as_mut() {
            Some(encoder) => encoder.flush(),
            None => Ok(Vec::new()),
        }
    }

    /// Throw away both the instance and any buffered packets, e.g. on
    /// seek.
    fn reset(&mut self) {
        self.encoder = None;
    }
}

/// Drive one source until it ends or the control flags stop it.
pub async fn run(
    mut source: Box<dyn FrameSource>,
    factory: Arc<dyn EncoderFactory>,
    abr: Arc<AbrController>,
    sink: Arc<dyn MediaSink>,
    control: Arc<StreamControl>,
) {
    if let Err(e) = run_inner(source.as_mut(), factory, abr, sink, &control).await {
        warn!(error = %e, "pipeline stopped on error");
    }
    control.stop();
    info!("pipeline finished");
}

async fn run_inner(
    source: &mut dyn FrameSource,
    factory: Arc<dyn EncoderFactory>,
    abr: Arc<AbrController>,
    sink: Arc<dyn MediaSink>,
    control: &StreamControl,
) -> Result<()> {
    let mut pacer = Pacer::new();
    let mut reorder = ReorderBuffer::new();
    let mut audio_queue: VecDeque<AudioChunk> = VecDeque::new();
    let mut encoders = EncoderLifecycle::new(factory, abr);
    // Live capture needs no presentation reordering; files keep a window
    // for B-frames.
    let reorder_depth = if source.is_live() { 0 } else { REORDER_DEPTH };
    let mut ended = false;
    // After a seek, audio is discarded until the first video frame
    // re-anchors the schedule.
    let mut resync = false;

    while control.is_running() {
        if let Some(target_ms) = control.take_seek() {
            match source.seek(target_ms) {
                Ok(actual) => {
                    debug!(target_ms, actual, "seeking stream");
                    reorder.clear();
                    audio_queue.clear();
                    encoders.reset();
                    pacer.reanchor();
                    ended = false;
                    resync = true;
                }
                Err(e) => warn!(target_ms, error = %e, "seek failed"),
            }
        }

        if control.is_paused() {
            pacer.pause();
            tokio::time::sleep(PAUSE_POLL).await;
            continue;
        }
        if pacer.is_paused() {
            pacer.resume();
        }

        // Fill the presentation window eagerly; the source runs far ahead
        // of the wall clock, pacing happens on the way out.
        while !ended && reorder.len() <= reorder_depth {
            match source.next()? {
                SourceEvent::Video(frame) => {
                    if resync {
                        // The first video frame after the flush is the
                        // new sync anchor.
                        pacer.anchor_at(frame.pts_ms);
                        resync = false;
                    }
                    reorder.insert(frame);
                }
                SourceEvent::Audio(chunk) => {
                    if !resync {
                        audio_queue.push_back(chunk);
                    }
                }
                SourceEvent::End => ended = true,
            }
        }

        // Emit whichever stream is due first.
        let video_pts = reorder.head_pts();
        let audio_pts = audio_queue.front().map(|c| c.pts_ms);
        match (video_pts, audio_pts) {
            (Some(v), a) if a.map_or(true, |a| v <= a) => {
                let frame = reorder.pop_head().expect("head exists");
                send_video(&mut pacer, &mut encoders, sink.as_ref(), frame, control).await?;
            }
            (_, Some(_)) => {
                let chunk = audio_queue.pop_front().expect("front exists");
                tokio::time::sleep(pacer.delay_for(chunk.pts_ms)).await;
                let payload = pcm::pack(&chunk.samples);
                send_fragments(sink.as_ref(), MediaKind::Audio, chunk.pts_ms, &payload);
            }
            (None, None) => {
                if ended {
                    for packet in encoders.flush()? {
                        send_fragments(sink.as_ref(), MediaKind::Video, packet.pts_ms, &packet.data);
                    }
                    debug!("source drained");
                    break;
                }
            }
            (Some(_), None) => unreachable!("covered by first arm's guard"),
        }
    }
    Ok(())
}

async fn send_video(
    pacer: &mut Pacer,
    encoders: &mut EncoderLifecycle,
    sink: &dyn MediaSink,
    frame: VideoFrame,
    control: &StreamControl,
) -> Result<()> {
    tokio::time::sleep(pacer.delay_for(frame.pts_ms)).await;
    if !control.is_running() {
        return Ok(());
    }
    for packet in encoders.encode(&frame)? {
        send_fragments(sink, MediaKind::Video, packet.pts_ms, &packet.data);
    }
    Ok(())
}

fn send_fragments(sink: &dyn MediaSink, kind: MediaKind, pts: i64, payload: &[u8]) {
    for datagram in wire::serialize(kind, pts, payload) {
        if let Err(e) = sink.send_datagram(datagram) {
            // Datagrams are best effort; a full send window is not fatal.
            debug!(error = %e, "datagram dropped");
        }
    }
}
