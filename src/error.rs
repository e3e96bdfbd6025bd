use std::io;
use std::net::SocketAddr;

use rustls_acme::futures_rustls::rustls;
use thiserror::Error;

/// Errors produced while starting a challenge responder, answering a challenge, or managing
/// private keys.
#[derive(Error, Debug)]
pub enum Error {
    /// The listener could not acquire its address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address the listener tried to bind.
        addr: SocketAddr,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// A key kind name or a decoded key does not match any supported algorithm and size.
    #[error("unsupported key kind: {0}")]
    UnsupportedKeyKind(String),

    /// A key file could not be read or written, or a socket operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A key file is not a well-formed PEM private key.
    #[error("failed to decode private key: {0}")]
    Decode(String),

    /// A key could not be encoded.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A query or handshake named a domain with no published challenge.
    #[error("unknown domain: {0:?}")]
    UnknownDomain(String),

    /// The validation certificate could not be generated.
    #[error("certificate generation failed: {0}")]
    Certificate(#[from] rcgen::Error),

    /// The TLS stack rejected a configuration or key.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// A configured DNS name is not valid.
    #[error("invalid DNS name {name:?}: {reason}")]
    InvalidName {
        /// The offending name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The configured challenge type is not one of `tls-alpn-01`, `http-01` or `dns-01`.
    #[error("unsupported challenge type: {0:?}")]
    UnsupportedChallenge(String),
}

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
