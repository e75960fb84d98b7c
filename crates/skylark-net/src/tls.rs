//! rustls settings for `https://` and `wss://` endpoints.
//!
//! ```ignore
//! use skylark_net::tls::{Certificate, TlsConfig, TlsVersion};
//!
//! let tls = TlsConfig::new()
//!     .add_root_certificate(Certificate::from_pem_file("ca.crt")?)
//!     .min_version(TlsVersion::Tls1_3);
//! let config = ClientConfig::new().tls_config(tls);
//! ```
//!
//! The ring crypto provider becomes the process default the first time a
//! session is configured. A provider the application installed earlier wins.

use std::io::{BufReader, Cursor};
use std::path::Path;
use std::sync::{Arc, Once};

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, WebPkiSupportedAlgorithms};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use skylark_core::logging::targets;

use crate::error::{NetworkError, Result};

static CRYPTO_PROVIDER_INIT: Once = Once::new();

/// Install the ring crypto provider as the process default, once.
pub(crate) fn ensure_crypto_provider() {
    CRYPTO_PROVIDER_INIT.call_once(|| {
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            tracing::debug!(target: targets::TLS, "crypto provider already installed, keeping it");
        }
    });
}

/// Lowest protocol version a session may negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsVersion {
    /// Negotiate TLS 1.2 or 1.3.
    #[default]
    Tls1_2,
    /// Refuse anything older than TLS 1.3.
    Tls1_3,
}

impl TlsVersion {
    pub(crate) fn to_rustls_versions(self) -> Vec<&'static rustls::SupportedProtocolVersion> {
        match self {
            TlsVersion::Tls1_2 => vec![&rustls::version::TLS12, &rustls::version::TLS13],
            TlsVersion::Tls1_3 => vec![&rustls::version::TLS13],
        }
    }
}

/// One or more trust anchors read from PEM.
#[derive(Clone)]
pub struct Certificate {
    chain: Vec<CertificateDer<'static>>,
}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate")
            .field("len", &self.chain.len())
            .finish()
    }
}

impl Certificate {
    /// Parse every `CERTIFICATE` block in `pem`; at least one is required.
    pub fn from_pem(pem: impl AsRef<[u8]>) -> Result<Self> {
        let mut reader = BufReader::new(Cursor::new(pem.as_ref()));
        let chain = rustls_pemfile::certs(&mut reader)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| NetworkError::Tls(format!("bad PEM block: {e}")))?;
        if chain.is_empty() {
            return Err(NetworkError::Tls("PEM input holds no certificate".into()));
        }
        Ok(Self { chain })
    }

    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let pem = std::fs::read(path)
            .map_err(|e| NetworkError::Tls(format!("{}: {e}", path.display())))?;
        Self::from_pem(pem)
    }
}

/// Trust and protocol settings for `https://` and `wss://` sessions.
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    /// Extra trust anchors, checked alongside the bundled roots.
    pub root_certificates: Vec<Certificate>,
    /// Skip the bundled webpki roots.
    pub use_only_custom_roots: bool,
    pub min_version: TlsVersion,
    /// Skip server certificate verification entirely. Test setups only.
    pub danger_accept_invalid_certs: bool,
}

impl TlsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_root_certificate(mut self, cert: Certificate) -> Self {
        self.root_certificates.push(cert);
        self
    }

    pub fn use_only_custom_roots(mut self) -> Self {
        self.use_only_custom_roots = true;
        self
    }

    pub fn min_version(mut self, version: TlsVersion) -> Self {
        self.min_version = version;
        self
    }

    /// Turn off server certificate checks.
    ///
    /// Anyone on the path can then impersonate the server; use it only
    /// against local test servers with self-signed certificates.
    pub fn danger_accept_invalid_certs(mut self) -> Self {
        self.danger_accept_invalid_certs = true;
        self
    }

    /// The rustls client settings a transport hands to each new session.
    pub fn build_rustls_config(&self) -> Result<Arc<ClientConfig>> {
        ensure_crypto_provider();
        let versions = self.min_version.to_rustls_versions();
        let builder = ClientConfig::builder_with_protocol_versions(&versions);

        let config = if self.danger_accept_invalid_certs {
            tracing::warn!(target: targets::TLS, "certificate verification is disabled");
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert::new()))
                .with_no_client_auth()
        } else {
            builder
                .with_root_certificates(self.trust_anchors()?)
                .with_no_client_auth()
        };
        Ok(Arc::new(config))
    }

    fn trust_anchors(&self) -> Result<RootCertStore> {
        let mut store = RootCertStore::empty();
        if !self.use_only_custom_roots {
            store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        }

        let custom = self.root_certificates.iter().flat_map(|c| c.chain.iter());
        for der in custom {
            store
                .add(der.clone())
                .map_err(|e| NetworkError::Tls(format!("unusable trust anchor: {e}")))?;
        }

        if store.is_empty() {
            return Err(NetworkError::Tls(
                "custom roots only, but none were added".into(),
            ));
        }
        tracing::debug!(target: targets::TLS, anchors = store.len(), "trust store ready");
        Ok(store)
    }
}

/// SNI and verification name for `host`; bracketed IPv6 literals are unwrapped.
pub(crate) fn server_name(host: &str) -> Result<ServerName<'static>> {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    ServerName::try_from(host.to_string())
        .map_err(|e| NetworkError::Tls(format!("{host:?} is not a valid server name: {e}")))
}

/// Verifier behind `danger_accept_invalid_certs`: any chain passes, but
/// handshake signatures are still checked with the ring algorithms.
#[derive(Debug)]
struct AcceptAnyServerCert {
    algorithms: WebPkiSupportedAlgorithms,
}

impl AcceptAnyServerCert {
    fn new() -> Self {
        Self {
            algorithms: rustls::crypto::ring::default_provider().signature_verification_algorithms,
        }
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
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tls_version_default() {
        assert_eq!(TlsVersion::default(), TlsVersion::Tls1_2);
    }

    #[test]
    fn test_certificate_from_pem_keeps_every_block() {
        let pem = "-----BEGIN CERTIFICATE-----\nMAMCAQA=\n-----END CERTIFICATE-----\n\
                   -----BEGIN CERTIFICATE-----\nMAA=\n-----END CERTIFICATE-----\n";
        let cert = Certificate::from_pem(pem).unwrap();
        assert_eq!(cert.chain.len(), 2);
        assert_eq!(cert.chain[1].as_ref(), &[0x30, 0x00]);
    }

    #[test]
    fn test_accept_any_verifier_advertises_schemes() {
        assert!(!AcceptAnyServerCert::new().supported_verify_schemes().is_empty());
    }

    #[test]
    fn test_certificate_from_pem_without_certs_fails() {
        let result = Certificate::from_pem("not a certificate");
        assert!(matches!(result, Err(NetworkError::Tls(_))));
    }

    #[test]
    fn test_build_rustls_config_with_bundled_roots() {
        let config = TlsConfig::new();
        assert!(config.build_rustls_config().is_ok());
    }

    #[test]
    fn test_build_rustls_config_only_custom_roots_without_certs_fails() {
        let config = TlsConfig::new().use_only_custom_roots();
        assert!(config.build_rustls_config().is_err());
    }

    #[test]
    fn test_build_dangerous_rustls_config() {
        let config = TlsConfig::new().danger_accept_invalid_certs();
        assert!(config.build_rustls_config().is_ok());
    }

    #[test]
    fn test_crypto_provider_init_is_idempotent() {
        ensure_crypto_provider();
        ensure_crypto_provider();
        assert!(rustls::crypto::CryptoProvider::get_default().is_some());
    }

    #[test]
    fn test_server_name() {
        assert!(server_name("example.com").is_ok());
        assert!(server_name("127.0.0.1").is_ok());
        assert!(server_name("[::1]").is_ok());
    }

    #[test]
    fn test_tls_version_to_rustls_versions() {
        assert_eq!(TlsVersion::Tls1_2.to_rustls_versions().len(), 2);
        assert_eq!(TlsVersion::Tls1_3.to_rustls_versions().len(), 1);
    }
}
