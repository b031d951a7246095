//! Session-level playback tests: datagrams in, presented frames out.

use std::sync::Arc;
use std::time::Duration;

use vstream_client::media::{LinearInterpolator, NullAudioSink, NullDisplay, RawFrameDecoder};
use vstream_client::PlaySession;
use vstream_core::frame::{raw, VideoFrame};
use vstream_core::{pcm, wire, MediaKind};

fn session_with_sinks() -> (Arc<PlaySession>, Arc<NullDisplay>, Arc<NullAudioSink>) {
    let session = Arc::new(PlaySession::new());
    let display = Arc::new(NullDisplay::default());
    let audio = Arc::new(NullAudioSink::default());
    let audio_sink: Arc<dyn vstream_client::media::AudioSink> = Arc::clone(&audio) as Arc<dyn vstream_client::media::AudioSink>;
    let display_sink: Arc<dyn vstream_client::media::DisplaySink> = Arc::clone(&display) as Arc<dyn vstream_client::media::DisplaySink>;
    session.spawn_tasks(
        Box::new(RawFrameDecoder),
        audio_sink,
        display_sink,
        Arc::new(LinearInterpolator),
    );
    session.spawn_reaper();
    (session, display, audio)
}

fn audio_datagrams(pts: i64) -> Vec<bytes::Bytes> {
    let payload = pcm::pack(&vec![0i16; 256]);
    wire::serialize(MediaKind::Audio, pts, &payload)
}

fn video_datagrams(pts: i64) -> Vec<bytes::Bytes> {
    let frame = VideoFrame::black(64, 64, pts).unwrap();
    let payload = raw::pack(&frame).unwrap();
    wire::serialize(MediaKind::Video, pts, &payload)
}

async fn settle() {
    // Let the decode/audio/render tasks make a few passes.
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_fragmented_frame_reaches_display() {
    let (session, display, _audio) = session_with_sinks();

    // Audio first so the master clock starts at pts 0.
    for datagram in audio_datagrams(0) {
        session.handle_datagram(datagram);
    }

    // A multi-fragment video frame delivered out of order.
    let mut fragments = video_datagrams(0);
    assert!(fragments.len() > 1, "raw 64x64 frame must fragment");
    fragments.rotate_left(1);
    fragments.reverse();
    for datagram in fragments {
        session.handle_datagram(datagram);
    }

    settle().await;

    assert!(session.clock.is_started(), "audio started the clock");
    assert!(
        session.counters.decoded_frames.load(std::sync::atomic::Ordering::Relaxed) >= 1,
        "frame decoded"
    );
    assert!(display.frames_presented() >= 1, "frame presented");
    assert_eq!(display.last_pts_ms(), 0);

    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_pause_freezes_rendering_and_resume_continues() {
    let (session, display, _audio) = session_with_sinks();

    for datagram in audio_datagrams(0) {
        session.handle_datagram(datagram);
    }
    for datagram in video_datagrams(0) {
        session.handle_datagram(datagram);
    }
    settle().await;
    let pre_pause_pts = display.last_pts_ms();
    assert!(pre_pause_pts >= 0);

    session.pause();
    let frozen = session.clock.now_ms();
    settle().await;
    assert_eq!(session.clock.now_ms(), frozen, "clock frozen while paused");
    let presented_at_pause = display.frames_presented();
    settle().await;
    assert_eq!(
        display.frames_presented(),
        presented_at_pause,
        "renderer idle while paused"
    );

    session.resume();
    // A frame at the resumed clock position renders next.
    let now = session.clock.now_ms();
    for datagram in video_datagrams(now) {
        session.handle_datagram(datagram);
    }
    settle().await;
    assert!(display.frames_presented() > presented_at_pause, "rendering resumed");
    assert!(display.last_pts_ms() >= pre_pause_pts);

    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_silence_substitution_after_clock_start()
{
    let (session, _display, audio) = session_with_sinks();

    for datagram in audio_datagrams(0) {
        session.handle_datagram(datagram);
    }
    settle().await;

    let after_first = audio.samples_written();
    assert!(after_first >= 256, "first chunk played");

    // No more packets arrive; the task substitutes silence.
    settle().await;
    assert!(audio.samples_written() > after_first, "silence keeps flowing");

    session.stop().await;
}

#[tokio::test]
async fn test_malformed_datagrams_are_counted_not_fatal() {
    let session = PlaySession::new();
    session.handle_datagram(bytes::Bytes::from_static(b"tiny"));
    session.handle_datagram(bytes::Bytes::from_static(&[9u8; 13]));
    assert_eq!(
        session
            .counters
            .malformed_datagrams
            .load(std::sync::atomic::Ordering::Relaxed),
        2
    );
}

#[tokio::test(start_paused = true)]
async fn test_reset_clears_playback_state() {
    let (session, _display, _audio) = session_with_sinks();
    for datagram in audio_datagrams(0) {
        session.handle_datagram(datagram);
    }
    settle().await;
    assert!(session.clock.is_started());

    session.reset();
    assert!(!session.clock.is_started());
    assert_eq!(session.frames.len(), 0);

    session.stop().await;
}
