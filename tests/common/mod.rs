//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair, KeyUsagePurpose,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName};
use rustls::{ClientConfig, RootCertStore};
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;

use tinyserver::config::ServerConfig;
use tinyserver::net::{ConnectionTracker, ListenerError, Scheduler, SecurityContext};
use tinyserver::{Server, Shutdown};

/// A certificate and its key, in both PEM (for files) and DER (for rustls).
pub struct Issued {
    pub cert: Certificate,
    pub key: KeyPair,
}

impl Issued {
    pub fn cert_der(&self) -> CertificateDer<'static> {
        self.cert.der().clone()
    }

    pub fn key_der(&self) -> PrivateKeyDer<'static> {
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.key.serialize_der()))
    }
}

/// A throwaway CA with a server and a client certificate, written to a temp dir.
pub struct TestPki {
    pub dir: TempDir,
    pub ca: Issued,
    pub server: Issued,
    pub client: Issued,
    pub ca_path: PathBuf,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl TestPki {
    pub fn generate() -> Self {
        let ca_key = KeyPair::generate().unwrap();
        let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        ca_params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        ca_params
            .distinguished_name
            .push(DnType::CommonName, "tinyserver test CA");
        let ca_cert = ca_params.self_signed(&ca_key).unwrap();

        let server = issue(&ca_cert, &ca_key, "localhost", ExtendedKeyUsagePurpose::ServerAuth);
        let client = issue(&ca_cert, &ca_key, "client", ExtendedKeyUsagePurpose::ClientAuth);

        let dir = tempfile::tempdir().unwrap();
        let ca_path = dir.path().join("ca.crt");
        let cert_path = dir.path().join("server.crt");
        let key_path = dir.path().join("server.key");
        std::fs::write(&ca_path, ca_cert.pem()).unwrap();
        std::fs::write(&cert_path, server.cert.pem()).unwrap();
        std::fs::write(&key_path, server.key.serialize_pem()).unwrap();

        Self {
            dir,
            ca: Issued {
                cert: ca_cert,
                key: ca_key,
            },
            server,
            client,
            ca_path,
            cert_path,
            key_path,
        }
    }

    /// Point a config's TLS section at these files and enable TLS.
    pub fn apply(&self, config: &mut ServerConfig) {
        config.tls.enabled = true;
        config.tls.cert_path = self.cert_path.clone();
        config.tls.key_path = self.key_path.clone();
        config.tls.ca_path = self.ca_path.clone();
    }

    fn roots(&self) -> RootCertStore {
        let mut roots = RootCertStore::empty();
        roots.add(self.ca.cert_der()).unwrap();
        roots
    }

    /// Client that trusts the test CA and presents the client certificate.
    pub fn client_with_cert(&self) -> TlsConnector {
        let config = client_builder()
            .with_root_certificates(self.roots())
            .with_client_auth_cert(vec![self.client.cert_der()], self.client.key_der())
            .unwrap();
        TlsConnector::from(Arc::new(config))
    }

    /// Client that trusts the test CA but presents no certificate.
    pub fn client_without_cert(&self) -> TlsConnector {
        let config = client_builder()
            .with_root_certificates(self.roots())
            .with_no_client_auth();
        TlsConnector::from(Arc::new(config))
    }
}

fn issue(ca: &Certificate, ca_key: &KeyPair, name: &str, usage: ExtendedKeyUsagePurpose) -> Issued {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(vec![name.to_string()]).unwrap();
    params.distinguished_name.push(DnType::CommonName, name);
    params.extended_key_usages = vec![usage];
    let cert = params.signed_by(&key, ca, ca_key).unwrap();
    Issued { cert, key }
}

fn client_builder() -> rustls::ConfigBuilder<ClientConfig, rustls::WantsVerifier> {
    ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
}

/// Config bound to an ephemeral loopback port, plain text.
pub fn plain_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.host = "127.0.0.1".to_string();
    config.listener.port = 0;
    config.tls.enabled = false;
    config
}

/// A server running on a background task.
pub struct TestServer {
    pub addr: SocketAddr,
    pub tracker: ConnectionTracker,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), ListenerError>>,
}

impl TestServer {
    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
    }

    /// Poll the tracker until `accepted` connections have all been torn down.
    pub async fn wait_closed(&self, accepted: u64) {
        for _ in 0..500 {
            let snapshot = self.tracker.snapshot();
            if snapshot.accepted >= accepted && snapshot.closed == snapshot.accepted {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("connections still open: {:?}", self.tracker.snapshot());
    }
}

/// Start a server on the configured address using the same startup path as the binary.
pub async fn spawn_server(config: ServerConfig) -> TestServer {
    let (server, listener) = tinyserver::lifecycle::startup::prepare(&config)
        .await
        .unwrap();
    spawn(server, listener)
}

/// Start a server with an explicit security context and scheduling policy,
/// bypassing the config-driven choice of both.
pub async fn spawn_with(
    config: ServerConfig,
    security: Option<SecurityContext>,
    scheduler: Box<dyn Scheduler>,
) -> TestServer {
    let listener = tinyserver::net::Listener::bind(&config.listener).await.unwrap();
    spawn(Server::new(&config, security).with_scheduler(scheduler), listener)
}

fn spawn(server: Server, listener: tinyserver::net::Listener) -> TestServer {
    let addr = listener.local_addr().unwrap();
    let tracker = server.tracker().clone();
    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    let handle = tokio::spawn(server.run(listener, receiver));
    TestServer {
        addr,
        tracker,
        shutdown,
        handle,
    }
}

/// Send `request` and collect everything the server writes until it closes.
/// Read errors (reset, TLS alert) end collection without failing.
pub async fn exchange<S>(mut stream: S, request: &[u8]) -> Vec<u8>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let _ = stream.write_all(request).await;
    let _ = stream.flush().await;
    read_until_closed(&mut stream).await
}

pub async fn read_until_closed<S>(stream: &mut S) -> Vec<u8>
where
    S: AsyncRead + Unpin,
{
    let mut received = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match tokio::time::timeout(Duration::from_secs(10), stream.read(&mut chunk)).await {
            Ok(Ok(0)) | Ok(Err(_)) => break,
            Ok(Ok(n)) => received.extend_from_slice(&chunk[..n]),
            Err(_) => panic!("server neither answered nor closed"),
        }
    }
    received
}

/// Plain-text request/response round trip.
pub async fn plain_request(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    let stream = TcpStream::connect(addr).await.unwrap();
    exchange(stream, request).await
}

/// TLS request/response round trip with the given client.
pub async fn tls_request(addr: SocketAddr, connector: &TlsConnector, request: &[u8]) -> Vec<u8> {
    let stream = TcpStream::connect(addr).await.unwrap();
    let name = ServerName::try_from("localhost").unwrap();
    let tls = connector.connect(name, stream).await.unwrap();
    exchange(tls, request).await
}

/// Split a response into its header block and body.
pub fn split_response(wire: &[u8]) -> (String, Vec<u8>) {
    let pos = wire
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .unwrap_or_else(|| panic!("no header terminator in {:?}", String::from_utf8_lossy(wire)));
    (
        String::from_utf8(wire[..pos].to_vec()).unwrap(),
        wire[pos + 4..].to_vec(),
    )
}

/// Value of the Content-Length header.
pub fn content_length(head: &str) -> usize {
    head.lines()
        .find_map(|line| line.strip_prefix("Content-Length: "))
        .expect("Content-Length header")
        .trim()
        .parse()
        .unwrap()
}
