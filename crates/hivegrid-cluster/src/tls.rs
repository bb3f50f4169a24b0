//! TLS client configuration for cluster endpoints.
//!
//! Cluster nodes commonly serve self-signed certificates. With
//! `trust_cluster_certs` on, the certificate chain and host name are not
//! checked at all, which leaves the connection open to interception. The
//! handshake signatures are still verified. With it off, certificates must
//! chain to the Mozilla root store.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, Error, RootCertStore, SignatureScheme};
use tracing::warn;

/// Build the client config for a cluster endpoint.
pub fn client_config(trust_cluster_certs: bool) -> Result<Arc<ClientConfig>, Error> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?;

    let config = if trust_cluster_certs {
        warn!("TLS certificate verification disabled for cluster endpoint");
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(TrustClusterCerts { provider }))
            .with_no_client_auth()
    } else {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        builder.with_root_certificates(roots).with_no_client_auth()
    };

    Ok(Arc::new(config))
}

/// Accepts any server certificate.
#[derive(Debug)]
struct TrustClusterCerts {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for TrustClusterCerts {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_trusting_config() {
        let config = client_config(true).unwrap();
        assert!(config.alpn_protocols.is_empty());
    }

    #[test]
    fn builds_verifying_config() {
        assert!(client_config(false).is_ok());
    }
}
