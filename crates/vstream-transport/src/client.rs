//! Client endpoint.
//!
//! Lab/demo profile: server certificate validation is disabled, matching
//! the fingerprint-pinned self-signed identity on the server side.

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use quinn::Endpoint;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::server::TransportConnection;
use crate::settings::TransportSettings;
use crate::ALPN;

/// Outbound QUIC endpoint for the streaming client.
pub struct ClientTransport {
    endpoint: Endpoint,
}

impl ClientTransport {
    pub fn new(settings: TransportSettings) -> Result<Self> {
        let mut crypto = rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert::new()))
            .with_no_client_auth();
        crypto.alpn_protocols = vec![ALPN.to_vec()];

        let crypto = quinn::crypto::rustls::QuicClientConfig::try_from(crypto)
            .map_err(|e| TransportError::setup(format!("crypto config: {e}")))?;
        let mut config = quinn::ClientConfig::new(Arc::new(crypto));
        config.transport_config(Arc::new(settings.build()?));

        let mut endpoint = Endpoint::client(SocketAddr::from(([0, 0, 0, 0], 0)))?;
        endpoint.set_default_client_config(config);
        Ok(Self { endpoint })
    }

    /// Connect and open the control stream.
    pub async fn connect(&self, host: &str, port: u16) -> Result<TransportConnection> {
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|e| TransportError::connect(format!("resolve {host}: {e}")))?
            .next()
            .ok_or_else(|| TransportError::connect(format!("no address for {host}")))?;

        // SNI is fixed; the server certificate is self-signed for
        // localhost and not validated anyway.
        let connection = self
            .endpoint
            .connect(addr, "localhost")
            .map_err(|e| TransportError::connect(e.to_string()))?
            .await
            .map_err(|e| TransportError::connect(e.to_string()))?;
        debug!(remote = %connection.remote_address(), "connected");

        let (send, recv) = connection
            .open_bi()
            .await
            .map_err(|e| TransportError::connect(format!("control stream: {e}")))?;
        Ok(TransportConnection::start(connection, send, recv))
    }

    pub fn close(&self) {
        self.endpoint.close(0u32.into(), b"client shutdown");
    }
}

/// Certificate verifier that accepts any server certificate while still
/// checking the TLS signatures themselves.
#[derive(Debug)]
struct AcceptAnyServerCert(Arc<CryptoProvider>);

impl AcceptAnyServerCert {
    fn new() -> Self {
        Self(Arc::new(rustls::crypto::ring::default_provider()))
    }
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
