//! Loopback integration test: two real endpoints on 127.0.0.1 exchanging
//! control bytes and media datagrams.

use bytes::Bytes;
use vstream_transport::{
    cert, ClientTransport, ConnectionEvent, ServerTransport, TransportSettings,
};

#[tokio::test]
async fn test_control_and_datagram_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let fingerprint = cert::generate_identity(dir.path()).unwrap();
    let identity = cert::load_identity(dir.path(), &fingerprint).unwrap();

    let server = ServerTransport::bind(identity, 0, TransportSettings::default()).unwrap();
    let port = server.local_addr().unwrap().port();

    let client = ClientTransport::new(TransportSettings::default()).unwrap();
    let (server_conn, client_conn) = tokio::join!(
        async { server.accept().await.unwrap().unwrap() },
        async {
            let conn = client.connect("127.0.0.1", port).await.unwrap();
            // The control stream only becomes visible to the server once
            // bytes flow on it.
            conn.send_control(br#"{"command":"get_list"}"#).await.unwrap();
            conn
        }
    );
    let mut server_conn = server_conn;
    let mut client_conn = client_conn;

    // Server sees the client's first control message.
    let mut control = Vec::new();
    while control.len() < 22 {
        match server_conn.recv_event().await.unwrap() {
            ConnectionEvent::Control(bytes) => control.extend_from_slice(&bytes),
            ConnectionEvent::Datagram(_) => {}
            ConnectionEvent::Closed { reason } => panic!("closed early: {reason}"),
        }
    }
    assert_eq!(&control[..], br#"{"command":"get_list"}"#);

    // Control reply flows back.
    server_conn.send_control(br#"["clip.mp4","camera"]"#).await.unwrap();

    // Media datagram reaches the client.
    server_conn
        .send_datagram(Bytes::from_static(b"\x00datagram"))
        .unwrap();

    let mut got_reply = false;
    let mut got_datagram = false;
    while !(got_reply && got_datagram) {
        match client_conn.recv_event().await.unwrap() {
            ConnectionEvent::Control(bytes) => {
                assert_eq!(&bytes[..], br#"["clip.mp4","camera"]"#);
                got_reply = true;
            }
            ConnectionEvent::Datagram(bytes) => {
                assert_eq!(&bytes[..], b"\x00datagram");
                got_datagram = true;
            }
            ConnectionEvent::Closed { reason } => panic!("closed early: {reason}"),
        }
    }

    client_conn.close("done");
    server.close();
}

#[tokio::test]
async fn test_connect_refused_without_listener() {
    let client = ClientTransport::new(TransportSettings::default()).unwrap();
    // Nothing listens here; the handshake must fail, not hang forever.
    let result = tokio::time::timeout(
        std::time::Duration::from_secs(15),
        client.connect("127.0.0.1", 1),
    )
    .await;
    match result {
        Ok(Err(_)) => {}
        Ok(Ok(_)) => panic!("connected to nothing"),
        Err(_) => panic!("connect did not resolve"),
    }
}
