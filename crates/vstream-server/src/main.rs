//! vstream server binary.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use vstream_control::{ClientCommand, MessageReader, ServerMessage};
use vstream_server::catalog::SourceCatalog;
use vstream_server::control;
use vstream_server::manager::StreamManager;
use vstream_server::media::synthetic::{SyntheticEncoderFactory, SyntheticSourceFactory};
use vstream_server::pipeline::MediaSink;
use vstream_server::ServerConfig;
use vstream_transport::{cert, ConnectionEvent, ServerTransport, TransportSettings};

#[derive(Parser, Debug)]
#[command(name = "vstream-server", about = "Adaptive A/V streaming server over QUIC")]
struct Args {
    /// Path to the server configuration file.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Directory holding playable video files.
    #[arg(long, default_value = "videos")]
    videos: PathBuf,

    /// Directory holding the TLS identity.
    #[arg(long, default_value = "certs")]
    certs: PathBuf,

    /// Generate a fresh identity, print its fingerprint and exit.
    #[arg(long)]
    gen_cert: bool,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    if args.gen_cert {
        return match cert::generate_identity(&args.certs) {
            Ok(fingerprint) => {
                println!("{fingerprint}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "identity generation failed");
                ExitCode::from(2)
            }
        };
    }

    let config = match ServerConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration rejected");
            return ExitCode::from(1);
        }
    };

    let identity = match cert::load_identity(&args.certs, &config.certificate_fingerprint) {
        Ok(identity) => identity,
        Err(e) => {
            error!(error = %e, "certificate rejected (run with --gen-cert to create one)");
            return ExitCode::from(1);
        }
    };

    let settings = TransportSettings {
        pacing_enabled: config.pacing_enabled,
    };
    let transport = match ServerTransport::bind(identity, config.server_port, settings) {
        Ok(transport) => transport,
        Err(e) => {
            error!(error = %e, "endpoint bind failed");
            return ExitCode::from(2);
        }
    };
    info!(port = config.server_port, "server listening");

    let catalog = Arc::new(SourceCatalog::new(
        args.videos,
        Arc::new(SyntheticSourceFactory::default()),
    ));

    loop {
        tokio::select! {
            accepted = transport.accept() => {
                match accepted {
                    Some(Ok(connection)) => {
                        let catalog = Arc::clone(&catalog);
                        tokio::spawn(serve_connection(connection, catalog));
                    }
                    Some(Err(e)) => warn!(error = %e, "handshake failed"),
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                transport.close();
                break;
            }
        }
    }
    ExitCode::SUCCESS
}

async fn serve_connection(
    mut connection: vstream_transport::TransportConnection,
    catalog: Arc<SourceCatalog>,
) {
    let remote = connection.remote_address();
    info!(%remote, "client connected");

    let manager = StreamManager::new(catalog, Arc::new(SyntheticEncoderFactory));
    let sink: Arc<dyn MediaSink> = Arc::new(connection.sender());
    let sender = connection.sender();
    let mut reader = MessageReader::<ClientCommand>::new();

    while let Some(event) = connection.recv_event().await {
        match event {
            ConnectionEvent::Control(bytes) => {
                for result in reader.push(&bytes) {
                    let reply = match result {
                        Ok(command) => control::dispatch(&manager, &sink, command).await,
                        Err(e) => {
                            // A command the reader could not decode still
                            // gets an answer; the stream keeps going.
                            warn!(%remote, error = %e, "bad control message");
                            Some(ServerMessage::error(e.to_string()))
                        }
                    };
                    let Some(reply) = reply else { continue };
                    match serde_json::to_vec(&reply) {
                        Ok(wire) => {
                            if let Err(e) = sender.send_control(&wire).await {
                                warn!(%remote, error = %e, "control send failed");
                            }
                        }
                        Err(e) => warn!(error = %e, "reply serialization failed"),
                    }
                }
            }
            // Clients do not send media datagrams.
            ConnectionEvent::Datagram(_) => {}
            ConnectionEvent::Closed { reason } => {
                info!(%remote, reason = %reason, "client disconnected");
                break;
            }
        }
    }
    manager.stop().await;
}
