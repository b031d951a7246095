//! vstream client binary.
//!
//! Connects to the server, lists its sources, plays one and logs playback
//! statistics until interrupted. Display and audio output are null sinks
//! in this profile.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use vstream_client::media::{LinearInterpolator, NullAudioSink, NullDisplay, RawFrameDecoder};
use vstream_client::stats::{self, LatencyCell};
use vstream_client::{ClientConfig, PlaySession};
use vstream_control::{
    epoch_ms, one_way_latency_ms, messages::ServerEvent, ClientCommand, MessageReader,
    ServerMessage, Trend,
};
use vstream_core::NetworkTrend;
use vstream_transport::{ClientTransport, ConnectionEvent, TransportSettings};

/// Deadline for control-plane requests (connect, command round trips).
const CONTROL_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "vstream-client", about = "Adaptive A/V streaming client over QUIC")]
struct Args {
    /// Path to the client configuration file.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Source to play; defaults to the first file the server lists.
    #[arg(long)]
    play: Option<String>,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

fn to_wire_trend(trend: NetworkTrend) -> Trend {
    match trend {
        NetworkTrend::Increase => Trend::Increase,
        NetworkTrend::Decrease => Trend::Decrease,
        NetworkTrend::Hold => Trend::Hold,
    }
}

enum UserCommand {
    Seek(f64),
    Pause,
    Resume,
    Volume(f64),
    Quit,
}

fn parse_user_command(line: &str) -> Option<UserCommand> {
    let mut parts = line.split_whitespace();
    match parts.next()? {
        "seek" => parts.next()?.parse().ok().map(UserCommand::Seek),
        "pause" => Some(UserCommand::Pause),
        "resume" => Some(UserCommand::Resume),
        "volume" => parts.next()?.parse().ok().map(UserCommand::Volume),
        "quit" | "q" => Some(UserCommand::Quit),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    let config = match ClientConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration rejected");
            return ExitCode::from(1);
        }
    };

    let transport = match ClientTransport::new(TransportSettings::default()) {
        Ok(transport) => transport,
        Err(e) => {
            error!(error = %e, "endpoint setup failed");
            return ExitCode::from(2);
        }
    };

    info!(host = %config.server_host, port = config.server_port, "connecting");
    let connect = tokio::time::timeout(
        CONTROL_TIMEOUT,
        transport.connect(&config.server_host, config.server_port),
    );
    let mut connection = match connect.await {
        Ok(Ok(connection)) => connection,
        Ok(Err(e)) => {
            error!(error = %e, "connection failed");
            return ExitCode::from(2);
        }
        Err(_) => {
            error!(timeout_sec = CONTROL_TIMEOUT.as_secs(), "connection timed out");
            return ExitCode::from(2);
        }
    };
    info!("connected");

    let session = Arc::new(PlaySession::new());
    session.spawn_tasks(
        Box::new(RawFrameDecoder),
        Arc::new(NullAudioSink::default()),
        Arc::new(NullDisplay::default()),
        Arc::new(LinearInterpolator),
    );
    session.spawn_reaper();

    let latency = Arc::new(LatencyCell::default());
    tokio::spawn(stats::run(Arc::clone(&session), Arc::clone(&latency)));

    // Heartbeats carry the delay-gradient trend once a second.
    let sender = connection.sender();
    let heartbeat_session = Arc::clone(&session);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        while heartbeat_session.is_running() {
            ticker.tick().await;
            let heartbeat = ClientCommand::Heartbeat {
                trend: to_wire_trend(heartbeat_session.history.trend()),
                client_ts: epoch_ms(),
            };
            let Ok(wire) = serde_json::to_vec(&heartbeat) else {
                continue;
            };
            if sender.send_control(&wire).await.is_err() {
                break;
            }
        }
    });

    let sender = connection.sender();
    let send_command = |command: ClientCommand| {
        let sender = sender.clone();
        async move {
            let wire = serde_json::to_vec(&command).expect("commands serialize");
            sender.send_control(&wire).await
        }
    };

    if let Err(e) = send_command(ClientCommand::GetList).await {
        error!(error = %e, "control stream failed");
        return ExitCode::from(2);
    }

    let mut reader = MessageReader::<ServerMessage>::new();
    let mut play_requested = false;
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    info!("commands: seek <sec> | pause | resume | volume <gain> | quit");
    let exit = 'main: loop {
        tokio::select! {
            line = stdin.next_line() => {
                let Ok(Some(line)) = line else { continue };
                match parse_user_command(&line) {
                    Some(UserCommand::Seek(time)) => {
                        // Local state restarts from the post-seek stream.
                        session.reset();
                        if let Err(e) = send_command(ClientCommand::Seek { time }).await {
                            warn!(error = %e, "seek request failed");
                        }
                    }
                    Some(UserCommand::Pause) => {
                        session.pause();
                        if let Err(e) = send_command(ClientCommand::Pause).await {
                            warn!(error = %e, "pause request failed");
                        }
                    }
                    Some(UserCommand::Resume) => {
                        session.resume();
                        if let Err(e) = send_command(ClientCommand::Resume).await {
                            warn!(error = %e, "resume request failed");
                        }
                    }
                    Some(UserCommand::Volume(gain)) => session.volume.set(gain),
                    Some(UserCommand::Quit) => break 'main ExitCode::SUCCESS,
                    None => warn!(line = %line, "unrecognized command"),
                }
            }
            event = connection.recv_event() => {
                match event {
                    Some(ConnectionEvent::Datagram(datagram)) => {
                        session.handle_datagram(datagram);
                    }
                    Some(ConnectionEvent::Control(bytes)) => {
                        for result in reader.push(&bytes) {
                            let message = match result {
                                Ok(message) => message,
                                Err(e) => {
                                    warn!(error = %e, "bad control message skipped");
                                    continue;
                                }
                            };
                            match message {
                                ServerMessage::SourceList(sources) => {
                                    info!(?sources, "server sources");
                                    if play_requested {
                                        continue;
                                    }
                                    let choice = args
                                        .play
                                        .clone()
                                        .or_else(|| sources.iter().find(|s| *s != "camera").cloned());
                                    match choice {
                                        Some(source) => {
                                            info!(source = %source, "requesting playback");
                                            play_requested = true;
                                            if let Err(e) = send_command(ClientCommand::Play {
                                                source,
                                            })
                                            .await
                                            {
                                                error!(error = %e, "play request failed");
                                                break 'main ExitCode::from(2);
                                            }
                                        }
                                        None => {
                                            info!("server has no file sources");
                                        }
                                    }
                                }
                                ServerMessage::Event(ServerEvent::PlayInfo { duration }) => {
                                    info!(duration_sec = duration, "playback starting");
                                    session.reset();
                                }
                                ServerMessage::Event(ServerEvent::HeartbeatReply { client_ts }) => {
                                    latency.set(one_way_latency_ms(epoch_ms(), client_ts));
                                }
                                ServerMessage::Error { error } => {
                                    warn!(error = %error, "server rejected command");
                                }
                            }
                        }
                    }
                    Some(ConnectionEvent::Closed { reason }) => {
                        info!(reason = %reason, "connection closed");
                        break 'main ExitCode::SUCCESS;
                    }
                    None => break 'main ExitCode::SUCCESS,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break 'main ExitCode::SUCCESS;
            }
        }
    };

    session.stop().await;
    connection.close("bye");
    transport.close();
    exit
}
