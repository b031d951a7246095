//! The play session.
//!
//! Owns every per-session object (clock, buffers, reassembly, statistics)
//! and the tasks that drive playback. Created per connection, reset when a
//! new play starts, destroyed on disconnect.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use vstream_core::reassembly::ReassemblyTable;
use vstream_core::{
    wire, ArrivalHistory, FrameBuffer, JitterBuffer, MasterClock, MediaKind, NetworkMonitor,
};

use crate::audio::{AudioTask, Volume};
use crate::media::{AudioSink, DisplaySink, FrameDecoder, FrameInterpolator};
use crate::render::RenderTask;

/// Bound on waiting for each task at shutdown.
const STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// Reassembly reaper period.
const REAPER_PERIOD: Duration = Duration::from_millis(200);

/// Cross-task session flags.
pub struct SessionFlags {
    running: AtomicBool,
}

impl SessionFlags {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for SessionFlags {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters the stats task reads. Each is independently shared with the
/// task that bumps it.
#[derive(Default)]
pub struct SessionCounters {
    pub decoded_frames: Arc<AtomicU64>,
    pub rendered_frames: Arc<AtomicU64>,
    pub malformed_datagrams: Arc<AtomicU64>,
    pub late_audio_drops: Arc<AtomicU64>,
}

pub struct PlaySession {
    pub clock: Arc<MasterClock>,
    pub monitor: Arc<NetworkMonitor>,
    pub history: Arc<ArrivalHistory>,
    pub video_buffer: Arc<JitterBuffer>,
    pub audio_buffer: Arc<JitterBuffer>,
    pub frames: Arc<FrameBuffer>,
    pub volume: Arc<Volume>,
    pub counters: Arc<SessionCounters>,
    flags: Arc<SessionFlags>,
    video_reassembly: Arc<Mutex<ReassemblyTable>>,
    audio_reassembly: Arc<Mutex<ReassemblyTable>>,
    tasks: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
}

impl PlaySession {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(MasterClock::new()),
            monitor: Arc::new(NetworkMonitor::new()),
            history: Arc::new(ArrivalHistory::new()),
            video_buffer: Arc::new(JitterBuffer::new()),
            audio_buffer: Arc::new(JitterBuffer::new()),
            frames: Arc::new(FrameBuffer::new()),
            volume: Arc::new(Volume::new(1.0)),
            counters: Arc::new(SessionCounters::default()),
            flags: Arc::new(SessionFlags::new()),
            video_reassembly: Arc::new(Mutex::new(ReassemblyTable::new(MediaKind::Video))),
            audio_reassembly: Arc::new(Mutex::new(ReassemblyTable::new(MediaKind::Audio))),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the playback tasks with the given collaborators.
    pub fn spawn_tasks(
        &self,
        decoder: Box<dyn FrameDecoder>,
        audio_sink: Arc<dyn AudioSink>,
        display: Arc<dyn DisplaySink>,
        interpolator: Arc<dyn FrameInterpolator>,
    ) {
        let mut tasks = self.tasks.lock().unwrap();

        let decode = DecodeTask {
            buffer: Arc::clone(&self.video_buffer),
            frames: Arc::clone(&self.frames),
            decoder,
            flags: Arc::clone(&self.flags),
            decoded_frames: Arc::clone(&self.counters.decoded_frames),
        };
        tasks.push(("decode", tokio::spawn(decode.run())));

        let audio = AudioTask {
            buffer: Arc::clone(&self.audio_buffer),
            clock: Arc::clone(&self.clock),
            sink: audio_sink,
            volume: Arc::clone(&self.volume),
            flags: Arc::clone(&self.flags),
            late_drops: Arc::clone(&self.counters.late_audio_drops),
        };
        tasks.push(("audio", tokio::spawn(audio.run())));

        let render = RenderTask {
            frames: Arc::clone(&self.frames),
            clock: Arc::clone(&self.clock),
            display,
            interpolator,
            flags: Arc::clone(&self.flags),
            rendered_frames: Arc::clone(&self.counters.rendered_frames),
        };
        tasks.push(("render", tokio::spawn(render.run())));
    }

    /// Start the periodic reassembly reaper. Separate from `spawn_tasks`
    /// so receive-only tests can run it alone.
    pub fn spawn_reaper(&self) {
        let flags = Arc::clone(&self.flags);
        let video = Arc::clone(&self.video_reassembly);
        let audio = Arc::clone(&self.audio_reassembly);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(REAPER_PERIOD);
            while flags.is_running() {
                ticker.tick().await;
                video.lock().unwrap().reap();
                audio.lock().unwrap().reap();
            }
        });
        self.tasks.lock().unwrap().push(("reaper", handle));
    }

    /// Feed one received datagram through parse → reassembly → buffers.
    pub fn handle_datagram(&self, datagram: Bytes) {
        let (header, fragment) = match wire::parse(datagram) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.counters
                    .malformed_datagrams
                    .fetch_add(1, Ordering::Relaxed);
                trace!(error = %e, "malformed datagram dropped");
                return;
            }
        };

        let table = match header.kind {
            MediaKind::Video => &self.video_reassembly,
            MediaKind::Audio => &self.audio_reassembly,
        };
        let completed = match table.lock().unwrap().push(header, fragment) {
            Ok(completed) => completed,
            Err(e) => {
                self.counters
                    .malformed_datagrams
                    .fetch_add(1, Ordering::Relaxed);
                trace!(error = %e, "fragment rejected");
                return;
            }
        };

        match header.kind {
            MediaKind::Video => {
                // Delivery statistics follow the video stream.
                self.history.record(header.pts);
                if let Some(packet) = completed {
                    self.monitor.record(packet.seq as u16, packet.payload.len());
                    self.video_buffer.push(packet);
                }
            }
            MediaKind::Audio => {
                if let Some(packet) = completed {
                    self.audio_buffer.push(packet);
                }
            }
        }
    }

    /// Reset all playback state for a fresh play or after a seek.
    pub fn reset(&self) {
        self.clock.reset();
        self.monitor.reset();
        self.history.clear();
        self.video_buffer.reset();
        self.audio_buffer.reset();
        self.frames.reset();
        self.video_reassembly.lock().unwrap().clear();
        self.audio_reassembly.lock().unwrap().clear();
        debug!("session reset");
    }

    pub fn pause(&self) {
        self.clock.pause();
    }

    pub fn resume(&self) {
        self.clock.resume();
    }

    /// Stop all tasks, waiting up to one second for each.
    pub async fn stop(&self) {
        self.flags.stop();
        let tasks: Vec<_> = std::mem::take(&mut *self.tasks.lock().unwrap());
        for (name, handle) in tasks {
            if tokio::time::timeout(STOP_TIMEOUT, handle).await.is_err() {
                warn!(task = name, "did not stop in time, detaching");
            }
        }
        debug!("session stopped");
    }

    pub fn is_running(&self) -> bool {
        self.flags.is_running()
    }
}

impl Default for PlaySession {
    fn default() -> Self {
        Self::new()
    }
}

/// Decoder task: video jitter buffer → frame buffer.
struct DecodeTask {
    buffer: Arc<JitterBuffer>,
    frames: Arc<FrameBuffer>,
    decoder: Box<dyn FrameDecoder>,
    flags: Arc<SessionFlags>,
    decoded_frames: Arc<AtomicU64>,
}

impl DecodeTask {
    async fn run(mut self) {
        debug!("decode task started");
        while self.flags.is_running() {
            match self.buffer.pop() {
                Some(packet) => {
                    match self.decoder.decode(packet.payload, packet.ts) {
                        Ok(decoded) => {
                            for frame in decoded {
                                self.frames.push(frame);
                                self.decoded_frames.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                        Err(e) => {
                            // A refused packet is discarded; the stream
                            // continues on the next one.
                            debug!(pts = packet.ts, error = %e, "decode failed");
                        }
                    }
                }
                None => tokio::time::sleep(Duration::from_millis(1)).await,
            }
        }
        debug!("decode task finished");
    }
}
