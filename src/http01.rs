//! `http-01`: serve key authorizations at `/.well-known/acme-challenge/<token>`.

use trillium::log::{info, warn};
use trillium::{async_trait, Conn, Handler, KnownHeaderName, Status};
use trillium_smol::Stopper;

use crate::responder::bind_tcp;
use crate::{Challenge, ChallengeStore, ChallengeType, HttpConfig, Responder, Result};

/// Path prefix of every `http-01` challenge resource.
pub const CHALLENGE_PATH_PREFIX: &str = "/.well-known/acme-challenge/";

/// The path the ACME server requests for `token`.
pub fn challenge_path(token: &str) -> String {
    format!("{CHALLENGE_PATH_PREFIX}{token}")
}

/// The `http-01` challenge: the key authorization itself, keyed by its request path.
#[derive(Debug, Clone, Copy)]
pub struct Http01;

impl Challenge for Http01 {
    type Value = String;

    const TYPE: ChallengeType = ChallengeType::Http01;

    fn record_key(_domain: &str, token: &str) -> String {
        challenge_path(token)
    }

    fn record_value(_domain: &str, key_authorization: &str) -> Result<String> {
        Ok(key_authorization.to_string())
    }
}

/// A trillium handler answering `http-01` requests from a [`ChallengeStore`].
///
/// Published paths get `200 text/plain` with the key authorization, everything else is a 404.
#[derive(Clone, Debug)]
pub struct ChallengeHandler {
    store: ChallengeStore<String>,
}

impl ChallengeHandler {
    /// Create a handler answering from `store`.
    pub fn new(store: ChallengeStore<String>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Handler for ChallengeHandler {
    async fn run(&self, conn: Conn) -> Conn {
        match self.store.get(conn.path()) {
            Some(key_authorization) => drain_request_body(conn)
                .await
                .with_response_header(KnownHeaderName::ContentType, "text/plain")
                .ok(key_authorization),
            None => not_found(conn).await,
        }
    }
}

/// Start an `http-01` responder listening on `config.listen`.
pub fn start(config: &HttpConfig) -> Result<Responder<Http01>> {
    let listener = bind_tcp(config.listen)?;
    let local_addr = listener.local_addr()?;
    let store = ChallengeStore::new();
    let stopper = Stopper::new();

    trillium_smol::config()
        .with_prebound_server(smol::net::TcpListener::try_from(listener)?)
        .with_nodelay()
        .with_stopper(stopper.clone())
        .spawn(ChallengeHandler::new(store.clone()));

    info!("http-01 responder listening on {local_addr}");
    Ok(Responder::new(store, local_addr, stopper))
}

// Request bodies are read to the end so the connection can be reused or closed cleanly.
async fn drain_request_body(mut conn: Conn) -> Conn {
    if let Err(e) = conn.request_body().await.read_bytes().await {
        warn!("discarding request body: {e}");
    }
    conn
}

pub(crate) async fn not_found(conn: Conn) -> Conn {
    drain_request_body(conn)
        .await
        .with_status(Status::NotFound)
        .with_body("Not Found")
        .halt()
}
