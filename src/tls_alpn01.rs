//! `tls-alpn-01`: present a self-signed validation certificate during the TLS handshake.
//!
//! The listener only completes handshakes for server names that currently have a published
//! challenge, using the validation certificate published for that name. Handshakes that
//! negotiate `acme-tls/1` are closed as soon as they complete, as [RFC 8737] expects. Any other
//! completed connection gets a 404 from a trillium handler.
//!
//! [RFC 8737]: https://tools.ietf.org/html/rfc8737

use std::io;
use std::sync::Arc;

use futures_lite::AsyncWriteExt;
use rcgen::{CertificateParams, CustomExtension, KeyPair};
use rustls_acme::futures_rustls::rustls::crypto::CryptoProvider;
use rustls_acme::futures_rustls::rustls::pki_types::PrivatePkcs8KeyDer;
use rustls_acme::futures_rustls::rustls::server::{ClientHello, ResolvesServerCert};
use rustls_acme::futures_rustls::rustls::sign::CertifiedKey;
use rustls_acme::futures_rustls::rustls::ServerConfig;
use rustls_acme::futures_rustls::LazyConfigAcceptor;
use sha2::{Digest, Sha256};
use trillium::log::{debug, info, warn};
use trillium_server_common::async_trait;
use trillium_smol::Stopper;

use crate::http01::not_found;
use crate::responder::bind_tcp;
use crate::{
    Challenge, ChallengeStore, ChallengeTransport, ChallengeType, Error, Responder, Result,
    TlsAlpnConfig,
};

#[cfg(not(any(feature = "aws-lc-rs", feature = "ring")))]
compile_error!("either the `aws-lc-rs` or the `ring` feature must be enabled");

#[cfg(feature = "aws-lc-rs")]
use rustls_acme::futures_rustls::rustls::crypto::aws_lc_rs::default_provider;
#[cfg(all(feature = "ring", not(feature = "aws-lc-rs")))]
use rustls_acme::futures_rustls::rustls::crypto::ring::default_provider;

/// ALPN protocol identifier of `tls-alpn-01` handshakes.
pub const ACME_TLS_ALPN_PROTOCOL: &[u8] = b"acme-tls/1";

/// The `tls-alpn-01` challenge: a validation certificate keyed by the domain it validates.
#[derive(Debug, Clone, Copy)]
pub struct TlsAlpn01;

impl Challenge for TlsAlpn01 {
    type Value = Arc<CertifiedKey>;

    const TYPE: ChallengeType = ChallengeType::TlsAlpn01;

    fn record_key(domain: &str, _token: &str) -> String {
        domain.to_ascii_lowercase()
    }

    fn record_value(domain: &str, key_authorization: &str) -> Result<Arc<CertifiedKey>> {
        validation_certificate(domain, key_authorization).map(Arc::new)
    }
}

/// Build the self-signed certificate that answers a `tls-alpn-01` challenge for `domain`: its
/// only SAN is `domain`, and its critical `acmeIdentifier` extension holds the SHA-256 digest
/// of the key authorization.
pub fn validation_certificate(domain: &str, key_authorization: &str) -> Result<CertifiedKey> {
    let digest = Sha256::digest(key_authorization.as_bytes());

    let key_pair = KeyPair::generate()?;
    let mut params = CertificateParams::new(vec![domain.to_string()])?;
    params
        .custom_extensions
        .push(CustomExtension::new_acme_identifier(&digest));
    let certificate = params.self_signed(&key_pair)?;

    let key = crypto_provider()
        .key_provider
        .load_private_key(PrivatePkcs8KeyDer::from(key_pair.serialize_der()).into())?;
    Ok(CertifiedKey::new(vec![certificate.der().clone()], key))
}

fn crypto_provider() -> Arc<CryptoProvider> {
    CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(default_provider()))
}

/// Hands out the validation certificate published for the requested server name, and nothing
/// otherwise.
#[derive(Debug)]
struct PublishedCertificates(ChallengeStore<Arc<CertifiedKey>>);

impl ResolvesServerCert for PublishedCertificates {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        self.0.get(&client_hello.server_name()?.to_ascii_lowercase())
    }
}

fn server_config(
    store: &ChallengeStore<Arc<CertifiedKey>>,
    alpn_protocols: Vec<Vec<u8>>,
) -> Result<Arc<ServerConfig>> {
    let mut config = ServerConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_cert_resolver(Arc::new(PublishedCertificates(store.clone())));
    config.alpn_protocols = alpn_protocols;
    Ok(Arc::new(config))
}

/// An acceptor that only completes handshakes for server names with a published challenge.
///
/// After answering an `acme-tls/1` handshake, this acceptor returns a [`ChallengeTransport`]
/// representing a closed connection.
#[derive(Clone, Debug)]
pub struct Acceptor {
    store: ChallengeStore<Arc<CertifiedKey>>,
    challenge_server_config: Arc<ServerConfig>,
    default_server_config: Arc<ServerConfig>,
}

impl Acceptor {
    /// Create an acceptor presenting the certificates published in `store`.
    pub fn new(store: ChallengeStore<Arc<CertifiedKey>>) -> Result<Self> {
        Ok(Self {
            challenge_server_config: server_config(
                &store,
                vec![ACME_TLS_ALPN_PROTOCOL.to_vec()],
            )?,
            default_server_config: server_config(&store, Vec::new())?,
            store,
        })
    }
}

#[async_trait]
impl<Input> trillium_server_common::Acceptor<Input> for Acceptor
where
    Input: trillium_server_common::Transport,
{
    type Output = ChallengeTransport<Input>;
    type Error = io::Error;

    async fn accept(&self, input: Input) -> std::result::Result<Self::Output, Self::Error> {
        let start_handshake = LazyConfigAcceptor::new(Default::default(), input).await?;
        let (server_name, is_challenge) = {
            let client_hello = start_handshake.client_hello();
            (
                client_hello
                    .server_name()
                    .map(str::to_ascii_lowercase)
                    .unwrap_or_default(),
                rustls_acme::is_tls_alpn_challenge(&client_hello),
            )
        };

        if self.store.get(&server_name).is_none() {
            warn!("rejecting TLS handshake for {server_name:?}: no published challenge");
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                Error::UnknownDomain(server_name),
            ));
        }

        if is_challenge {
            let mut tls = start_handshake
                .into_stream(self.challenge_server_config.clone())
                .await?;
            tls.close().await?;
            debug!("answered tls-alpn-01 handshake for {server_name}");
            Ok(ChallengeTransport::answered())
        } else {
            let tls = start_handshake
                .into_stream(self.default_server_config.clone())
                .await?;
            Ok(ChallengeTransport::tls(tls))
        }
    }
}

/// Start a `tls-alpn-01` responder listening on `config.listen`.
pub fn start(config: &TlsAlpnConfig) -> Result<Responder<TlsAlpn01>> {
    let listener = bind_tcp(config.listen)?;
    let local_addr = listener.local_addr()?;
    let store = ChallengeStore::new();
    let acceptor = Acceptor::new(store.clone())?;
    let stopper = Stopper::new();

    trillium_smol::config()
        .with_prebound_server(smol::net::TcpListener::try_from(listener)?)
        .with_nodelay()
        .with_acceptor(acceptor)
        .with_stopper(stopper.clone())
        .spawn(not_found);

    info!("tls-alpn-01 responder listening on {local_addr}");
    Ok(Responder::new(store, local_addr, stopper))
}
