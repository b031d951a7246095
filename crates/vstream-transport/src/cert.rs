//! Server TLS identity pinned by SHA-1 fingerprint.
//!
//! The server configuration names its certificate by a 40-hex-char SHA-1
//! fingerprint. The identity lives on disk as a DER pair
//! (`server.der` / `server.key.der`); loading verifies that the
//! certificate's fingerprint matches the configured one and fails startup
//! otherwise.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use sha1::{Digest, Sha1};
use tracing::info;

use crate::error::{Result, TransportError};

const CERT_FILE: &str = "server.der";
const KEY_FILE: &str = "server.key.der";

/// A loaded certificate + private key pair.
#[derive(Debug)]
pub struct ServerIdentity {
    pub cert: CertificateDer<'static>,
    pub key: PrivateKeyDer<'static>,
    pub fingerprint: String,
}

/// Lower-case hex SHA-1 of a DER certificate.
pub fn sha1_fingerprint(cert_der: &[u8]) -> String {
    let digest = Sha1::digest(cert_der);
    let mut out = String::with_capacity(40);
    for byte in digest {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

/// Generate a self-signed identity for `localhost` and write it under
/// `dir`. Returns its fingerprint for pasting into the configuration.
pub fn generate_identity(dir: &Path) -> Result<String> {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .map_err(|e| TransportError::certificate(format!("generation failed: {e}")))?;
    let cert_der = certified.cert.der().to_vec();
    let key_der = certified.key_pair.serialize_der();

    fs::create_dir_all(dir)?;
    fs::write(dir.join(CERT_FILE), &cert_der)?;
    fs::write(dir.join(KEY_FILE), &key_der)?;

    let fingerprint = sha1_fingerprint(&cert_der);
    info!(%fingerprint, dir = %dir.display(), "generated server identity");
    Ok(fingerprint)
}

/// Load the identity from `dir` and verify it against the configured
/// fingerprint.
pub fn load_identity(dir: &Path, expected_fingerprint: &str) -> Result<ServerIdentity> {
    let cert_path = dir.join(CERT_FILE);
    let key_path = dir.join(KEY_FILE);
    let cert_der = fs::read(&cert_path).map_err(|e| {
        TransportError::certificate(format!("cannot read {}: {e}", cert_path.display()))
    })?;
    let key_der = fs::read(&key_path).map_err(|e| {
        TransportError::certificate(format!("cannot read {}: {e}", key_path.display()))
    })?;

    let fingerprint = sha1_fingerprint(&cert_der);
    if !fingerprint.eq_ignore_ascii_case(expected_fingerprint) {
        return Err(TransportError::certificate(format!(
            "fingerprint mismatch: certificate is {}, configuration expects {}",
            fingerprint, expected_fingerprint
        )));
    }

    Ok(ServerIdentity {
        cert: CertificateDer::from(cert_der),
        key: PrivateKeyDer::from(PrivatePkcs8KeyDer::from(key_der)),
        fingerprint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let fingerprint = generate_identity(dir.path()).unwrap();
        assert_eq!(fingerprint.len(), 40);
        assert!(fingerprint.chars().all(|c| c.is_ascii_hexdigit()));

        let identity = load_identity(dir.path(), &fingerprint).unwrap();
        assert_eq!(identity.fingerprint, fingerprint);

        // Case-insensitive match.
        load_identity(dir.path(), &fingerprint.to_uppercase()).unwrap();
    }

    #[test]
    fn test_fingerprint_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        generate_identity(dir.path()).unwrap();
        let err = load_identity(dir.path(), &"0".repeat(40)).unwrap_err();
        assert!(matches!(err, TransportError::Certificate { .. }));
    }

    #[test]
    fn test_missing_files_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_identity(dir.path(), &"0".repeat(40)).is_err());
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        assert_eq!(sha1_fingerprint(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }
}
