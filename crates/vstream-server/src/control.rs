//! Control command dispatch.

use std::sync::Arc;

use tracing::{debug, warn};

use vstream_control::{ClientCommand, ServerMessage, Trend};
use vstream_core::trend::NetworkTrend;

use crate::manager::StreamManager;
use crate::pipeline::MediaSink;

fn to_core_trend(trend: Trend) -> NetworkTrend {
    match trend {
        Trend::Increase => NetworkTrend::Increase,
        Trend::Decrease => NetworkTrend::Decrease,
        Trend::Hold => NetworkTrend::Hold,
    }
}

/// Handle one client command; the returned message, if any, goes back on
/// the control stream.
pub async fn dispatch(
    manager: &StreamManager,
    sink: &Arc<dyn MediaSink>,
    command: ClientCommand,
) -> Option<ServerMessage> {
    debug!(?command, "control command");
    match command {
        ClientCommand::GetList => Some(ServerMessage::SourceList(manager.catalog().list())),
        ClientCommand::Play { source } => {
            if source.is_empty() {
                return Some(ServerMessage::error("source is empty"));
            }
            match manager.start(&source, Arc::clone(sink)).await {
                Ok(duration) => Some(ServerMessage::play_info(duration)),
                Err(e) => {
                    warn!(source = %source, error = %e, "play failed");
                    Some(ServerMessage::error(e.to_string()))
                }
            }
        }
        ClientCommand::Seek { time } => {
            if time < 0.0 {
                return Some(ServerMessage::error("seek time must be non-negative"));
            }
            match manager.seek(time).await {
                Ok(()) => None,
                Err(e) => Some(ServerMessage::error(e.to_string())),
            }
        }
        ClientCommand::Pause => {
            manager.pause().await;
            None
        }
        ClientCommand::Resume => {
            manager.resume().await;
            None
        }
        ClientCommand::Heartbeat { trend, client_ts } => {
            manager.feedback(to_core_trend(trend)).await;
            Some(ServerMessage::heartbeat_reply(client_ts))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SourceCatalog;
    use crate::error::Result;
    use crate::media::synthetic::{SyntheticEncoderFactory, SyntheticSourceFactory};
    use bytes::Bytes;

    struct NullSink;

    impl MediaSink for NullSink {
        fn send_datagram(&self, _data: Bytes) -> Result<()> {
            Ok(())
        }
    }

    fn setup(dir: &std::path::Path) -> (StreamManager, Arc<dyn MediaSink>) {
        std::fs::write(dir.join("clip.mp4"), b"x").unwrap();
        let manager = StreamManager::new(
            Arc::new(SourceCatalog::new(
                dir,
                Arc::new(SyntheticSourceFactory::default()),
            )),
            Arc::new(SyntheticEncoderFactory),
        );
        (manager, Arc::new(NullSink))
    }

    #[tokio::test]
    async fn test_get_list_returns_sources_plus_camera() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, sink) = setup(dir.path());
        let reply = dispatch(&manager, &sink, ClientCommand::GetList).await;
        assert_eq!(
            reply,
            Some(ServerMessage::SourceList(vec![
                "clip.mp4".into(),
                "camera".into()
            ]))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_replies_with_play_info() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, sink) = setup(dir.path());
        let reply = dispatch(
            &manager,
            &sink,
            ClientCommand::Play {
                source: "clip.mp4".into(),
            },
        )
        .await;
        assert_eq!(reply, Some(ServerMessage::play_info(30.0)));
        manager.stop().await;
    }

    #[tokio::test]
    async fn test_play_empty_source_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, sink) = setup(dir.path());
        let reply = dispatch(&manager, &sink, ClientCommand::Play { source: "".into() }).await;
        assert!(matches!(reply, Some(ServerMessage::Error { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_on_live_stream_is_an_explicit_error() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, sink) = setup(dir.path());
        dispatch(
            &manager,
            &sink,
            ClientCommand::Play {
                source: "camera".into(),
            },
        )
        .await;
        let reply = dispatch(&manager, &sink, ClientCommand::Seek { time: 5.0 }).await;
        assert!(matches!(reply, Some(ServerMessage::Error { .. })));
        manager.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_on_file_has_no_reply() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, sink) = setup(dir.path());
        dispatch(
            &manager,
            &sink,
            ClientCommand::Play {
                source: "clip.mp4".into(),
            },
        )
        .await;
        let reply = dispatch(&manager, &sink, ClientCommand::Seek { time: 5.0 }).await;
        assert_eq!(reply, None);
        manager.stop().await;
    }

    #[tokio::test]
    async fn test_heartbeat_echoes_client_ts() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, sink) = setup(dir.path());
        let reply = dispatch(
            &manager,
            &sink,
            ClientCommand::Heartbeat {
                trend: Trend::Hold,
                client_ts: 123456,
            },
        )
        .await;
        assert_eq!(reply, Some(ServerMessage::heartbeat_reply(123456)));
    }
}
