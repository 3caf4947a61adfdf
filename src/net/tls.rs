//! TLS configuration and certificate loading.
//!
//! Loads the server identity (certificate chain + private key) and the CA
//! trust root from PEM files, then builds a [`SecurityContext`] whose
//! acceptor requires every client to present a certificate that chains to
//! that root.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::sign::CertifiedKey;
use rustls::{RootCertStore, ServerConfig};
use thiserror::Error;
use tokio_rustls::TlsAcceptor;

use crate::config::TlsConfig;

/// Errors raised while preparing the security context. All are fatal at startup.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to load identity from {} and {}: {reason}", .cert.display(), .key.display())]
    IdentityLoadFailed {
        cert: PathBuf,
        key: PathBuf,
        reason: String,
    },

    #[error("failed to load trust root from {}: {reason}", .path.display())]
    TrustRootLoadFailed { path: PathBuf, reason: String },

    #[error("failed to build TLS context: {0}")]
    ContextBuildFailed(String),
}

/// Server certificate chain and its matching private key.
#[derive(Debug)]
pub struct Identity {
    cert_chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl Identity {
    pub fn cert_chain(&self) -> &[CertificateDer<'static>] {
        &self.cert_chain
    }
}

/// CA certificates that client certificates are verified against.
#[derive(Debug, Clone)]
pub struct TrustRoot {
    store: RootCertStore,
}

impl TrustRoot {
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Load the server certificate chain and private key, checking they belong together.
pub fn load_identity(cert_path: &Path, key_path: &Path) -> Result<Identity, TlsError> {
    let fail = |reason: String| TlsError::IdentityLoadFailed {
        cert: cert_path.to_path_buf(),
        key: key_path.to_path_buf(),
        reason,
    };

    let cert_chain = read_certs(cert_path).map_err(fail)?;
    if cert_chain.is_empty() {
        return Err(fail("no certificates found in certificate file".to_string()));
    }

    let key = read_private_key(key_path).map_err(fail)?;
    check_key_pair(&crypto_provider(), &cert_chain, &key).map_err(fail)?;

    tracing::debug!(
        cert = %cert_path.display(),
        chain_len = cert_chain.len(),
        "Server identity loaded"
    );
    Ok(Identity { cert_chain, key })
}

/// Load the CA certificates used to verify client certificates.
pub fn load_trust_root(ca_path: &Path) -> Result<TrustRoot, TlsError> {
    let fail = |reason: String| TlsError::TrustRootLoadFailed {
        path: ca_path.to_path_buf(),
        reason,
    };

    let certs = read_certs(ca_path).map_err(fail)?;
    if certs.is_empty() {
        return Err(fail("no certificates found".to_string()));
    }

    let mut store = RootCertStore::empty();
    let (added, ignored) = store.add_parsable_certificates(certs);
    if added == 0 {
        return Err(fail(format!("none of the {ignored} certificates could be parsed")));
    }
    if ignored > 0 {
        tracing::warn!(path = %ca_path.display(), ignored, "Skipped unparsable CA certificates");
    }

    Ok(TrustRoot { store })
}

fn read_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, String> {
    let file = File::open(path).map_err(|e| format!("cannot open {}: {e}", path.display()))?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("malformed PEM in {}: {e}", path.display()))
}

fn read_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, String> {
    let file = File::open(path).map_err(|e| format!("cannot open {}: {e}", path.display()))?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| format!("malformed PEM in {}: {e}", path.display()))?
        .ok_or_else(|| format!("no private key found in {}", path.display()))
}

fn check_key_pair(
    provider: &CryptoProvider,
    cert_chain: &[CertificateDer<'static>],
    key: &PrivateKeyDer<'static>,
) -> Result<(), String> {
    let signing_key = provider
        .key_provider
        .load_private_key(key.clone_key())
        .map_err(|e| format!("unsupported private key: {e}"))?;

    // A provider that cannot derive the public key gives `Unknown`; rustls
    // itself accepts that case, so do we.
    match CertifiedKey::new(cert_chain.to_vec(), signing_key).keys_match() {
        Ok(()) | Err(rustls::Error::InconsistentKeys(rustls::InconsistentKeys::Unknown)) => Ok(()),
        Err(e) => Err(format!("certificate does not match private key: {e}")),
    }
}

/// Immutable TLS state shared by every connection.
///
/// Cloning is cheap; the rustls configuration sits behind an `Arc`.
#[derive(Clone)]
pub struct SecurityContext {
    acceptor: TlsAcceptor,
}

impl SecurityContext {
    /// Build the server context. Client certificates are mandatory.
    pub fn new(identity: Identity, trust_root: TrustRoot) -> Result<Self, TlsError> {
        let provider = crypto_provider();

        let verifier =
            WebPkiClientVerifier::builder_with_provider(Arc::new(trust_root.store), provider.clone())
                .build()
                .map_err(|e| TlsError::ContextBuildFailed(e.to_string()))?;

        let config = ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| TlsError::ContextBuildFailed(e.to_string()))?
            .with_client_cert_verifier(verifier)
            .with_single_cert(identity.cert_chain, identity.key)
            .map_err(|e| TlsError::ContextBuildFailed(e.to_string()))?;

        Ok(Self {
            acceptor: TlsAcceptor::from(Arc::new(config)),
        })
    }

    /// Load all credential files named by the configuration.
    pub fn from_config(config: &TlsConfig) -> Result<Self, TlsError> {
        tracing::info!(
            cert = %config.cert_path.display(),
            key = %config.key_path.display(),
            ca = %config.ca_path.display(),
            "TLS is enabled. Loading identity and trust root."
        );
        let identity = load_identity(&config.cert_path, &config.key_path)?;
        let trust_root = load_trust_root(&config.ca_path)?;
        Self::new(identity, trust_root)
    }

    pub(crate) fn acceptor(&self) -> &TlsAcceptor {
        &self.acceptor
    }
}

impl std::fmt::Debug for SecurityContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityContext")
            .field("client_auth", &"required")
            .finish()
    }
}
