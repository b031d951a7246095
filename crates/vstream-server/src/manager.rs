//! Per-connection stream management.
//!
//! One manager per client connection owns at most one active stream. A new
//! `play` stops the previous pipeline first; disconnects stop it for good.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use vstream_core::abr::AbrController;
use vstream_core::trend::NetworkTrend;

use crate::catalog::SourceCatalog;
use crate::error::{Result, ServerError};
use crate::media::EncoderFactory;
use crate::pipeline::{self, MediaSink, StreamControl};

/// Bound on waiting for a pipeline task to wind down.
const STOP_TIMEOUT: Duration = Duration::from_secs(1);

struct ActiveStream {
    control: Arc<StreamControl>,
    handle: JoinHandle<()>,
    abr: Arc<AbrController>,
    live: bool,
}

pub struct StreamManager {
    catalog: Arc<SourceCatalog>,
    encoder_factory: Arc<dyn EncoderFactory>,
    active: Mutex<Option<ActiveStream>>,
}

impl StreamManager {
    pub fn new(catalog: Arc<SourceCatalog>, encoder_factory: Arc<dyn EncoderFactory>) -> Self {
        Self {
            catalog,
            encoder_factory,
            active: Mutex::new(None),
        }
    }

    /// Start streaming `source_name` into `sink`, stopping any previous
    /// stream. Returns the play duration in seconds, 0 for live.
    pub async fn start(&self, source_name: &str, sink: Arc<dyn MediaSink>) -> Result<f64> {
        self.stop().await;

        let source = self.catalog.open(source_name)?;
        let info = source.info();
        let duration_sec = info.duration_ms.map_or(0.0, |ms| ms as f64 / 1000.0);
        let live = source.is_live();

        let abr = Arc::new(AbrController::new(info.width, info.height));
        let control = Arc::new(StreamControl::new());
        let handle = tokio::spawn(pipeline::run(
            source,
            Arc::clone(&self.encoder_factory),
            Arc::clone(&abr),
            sink,
            Arc::clone(&control),
        ));

        info!(source = source_name, duration_sec, live, "stream started");
        *self.active.lock().await = Some(ActiveStream {
            control,
            handle,
            abr,
            live,
        });
        Ok(duration_sec)
    }

    /// Signal the pipeline to stop and wait for it, bounded.
    pub async fn stop(&self) {
        let Some(stream) = self.active.lock().await.take() else {
            return;
        };
        stream.control.stop();
        if tokio::time::timeout(STOP_TIMEOUT, stream.handle).await.is_err() {
            warn!("pipeline did not stop in time, detaching");
        }
        info!("stream stopped");
    }

    /// Request a seek. Live streams refuse.
    pub async fn seek(&self, time_sec: f64) -> Result<()> {
        let guard = self.active.lock().await;
        let Some(stream) = guard.as_ref() else {
            return Err(ServerError::unsupported("no active stream"));
        };
        if stream.live {
            return Err(ServerError::unsupported("seek unsupported for live source"));
        }
        stream.control.request_seek((time_sec * 1000.0) as i64);
        Ok(())
    }

    pub async fn pause(&self) {
        if let Some(stream) = self.active.lock().await.as_ref() {
            stream.control.set_paused(true);
        }
    }

    pub async fn resume(&self) {
        if let Some(stream) = self.active.lock().await.as_ref() {
            stream.control.set_paused(false);
        }
    }

    /// Route client trend feedback into the active stream's ABR.
    pub async fn feedback(&self, trend: NetworkTrend) {
        if let Some(stream) = self.active.lock().await.as_ref() {
            stream.abr.feedback(trend);
        }
    }

    pub fn catalog(&self) -> &SourceCatalog {
        &self.catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::synthetic::{SyntheticEncoderFactory, SyntheticSourceFactory};
    use bytes::Bytes;
    use std::sync::Mutex as StdMutex;

    struct NullSink {
        count: StdMutex<usize>,
    }

    impl MediaSink for NullSink {
        fn send_datagram(&self, _data: Bytes) -> Result<()> {
            *self.count.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn manager_with_clip(dir: &std::path::Path) -> StreamManager {
        std::fs::write(dir.join("clip.mp4"), b"x").unwrap();
        StreamManager::new(
            Arc::new(SourceCatalog::new(
                dir,
                Arc::new(SyntheticSourceFactory::default()),
            )),
            Arc::new(SyntheticEncoderFactory),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_reports_duration_and_streams() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_clip(dir.path());
        let sink = Arc::new(NullSink {
            count: StdMutex::new(0),
        });

        let duration = manager.start("clip.mp4", sink.clone()).await.unwrap();
        assert!((duration - 30.0).abs() < 1e-9);

        tokio::time::sleep(Duration::from_millis(300)).await;
        manager.stop().await;
        assert!(*sink.count.lock().unwrap() > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_camera_is_live_and_refuses_seek() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_clip(dir.path());
        let sink = Arc::new(NullSink {
            count: StdMutex::new(0),
        });

        let duration = manager.start("camera", sink).await.unwrap();
        assert_eq!(duration, 0.0);
        assert!(matches!(
            manager.seek(5.0).await,
            Err(ServerError::Unsupported { .. })
        ));
        manager.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_play_replaces_previous_stream() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_clip(dir.path());
        let sink = Arc::new(NullSink {
            count: StdMutex::new(0),
        });

        manager.start("clip.mp4", sink.clone()).await.unwrap();
        manager.start("camera", sink).await.unwrap();
        // Exactly one active stream remains.
        assert!(manager.active.lock().await.is_some());
        manager.stop().await;
        assert!(manager.active.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_source_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_clip(dir.path());
        let sink = Arc::new(NullSink {
            count: StdMutex::new(0),
        });
        assert!(matches!(
            manager.start("missing.mp4", sink).await,
            Err(ServerError::UnknownSource { .. })
        ));
    }
}
