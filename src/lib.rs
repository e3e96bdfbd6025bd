//! trillium-acme-challenges answers ACME domain-validation challenges with its own listeners,
//! built on [Trillium](https://trillium.rs): `http-01` over HTTP, `tls-alpn-01` during a TLS
//! handshake, and `dns-01` as an authoritative nameserver for the challenge zone.
//!
//! Pick one challenge type, [`start`] its responder, and hand the returned [`Provider`] to your
//! ACME client. The client calls [`Provider::present`] before asking the ACME server to validate
//! a domain, and [`Provider::clean_up`] afterwards:
//!
//! ```rust,no_run
//! use trillium_acme_challenges::{ChallengeConfig, HttpConfig};
//!
//! # fn main() -> trillium_acme_challenges::Result<()> {
//! let provider = trillium_acme_challenges::start(&ChallengeConfig::Http01(HttpConfig::default()))?;
//!
//! provider.present("domain.example", "token", "token.thumbprint")?;
//! // GET http://domain.example/.well-known/acme-challenge/token now answers
//! // "token.thumbprint", until:
//! provider.clean_up("domain.example", "token", "token.thumbprint")?;
//! # Ok(())
//! # }
//! ```
//!
//! Each responder binds its listener synchronously, so an unavailable address fails [`start`]
//! with [`Error::Bind`] instead of surfacing later. Listeners run on the smol executor until the
//! responder is dropped. Challenge material is only held in memory.
//!
//! The [`keys`] module loads, generates and saves the certificate and account private keys that
//! go along with an ACME order.

#![forbid(unsafe_code)]
#![deny(
    clippy::dbg_macro,
    missing_copy_implementations,
    rustdoc::missing_crate_level_docs,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    unused_qualifications
)]

mod config;
pub mod dns01;
mod error;
pub mod http01;
pub mod keys;
mod responder;
mod store;
pub mod tls_alpn01;
mod transport;

pub use config::{
    AccountKeyConfig, ChallengeConfig, ChallengeType, DnsConfig, HttpConfig, KeyConfig,
    TlsAlpnConfig,
};
pub use error::{Error, Result};
pub use keys::{KeyKind, KeyMaterial, PrivateKey};
pub use responder::{Challenge, Provider, Responder};
pub use rustls_acme;
pub use store::ChallengeStore;
pub use transport::ChallengeTransport;

/// Start the responder selected by `config`.
pub fn start(config: &ChallengeConfig) -> Result<Box<dyn Provider>> {
    Ok(match config {
        ChallengeConfig::Http01(config) => Box::new(http01::start(config)?),
        ChallengeConfig::TlsAlpn01(config) => Box::new(tls_alpn01::start(config)?),
        ChallengeConfig::Dns01(config) => Box::new(dns01::start(config)?),
    })
}
