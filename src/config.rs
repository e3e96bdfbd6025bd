use std::fmt::{self, Display};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use crate::{Error, KeyKind};

/// The three ACME challenge types a responder can answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChallengeType {
    /// `http-01`, answered over plain HTTP on port 80
    Http01,
    /// `tls-alpn-01`, answered during a TLS handshake on port 443
    TlsAlpn01,
    /// `dns-01`, answered by an authoritative DNS server for the delegated challenge zone
    Dns01,
}

impl ChallengeType {
    /// The identifier ACME uses for this challenge type.
    pub fn as_str(self) -> &'static str {
        match self {
            ChallengeType::Http01 => "http-01",
            ChallengeType::TlsAlpn01 => "tls-alpn-01",
            ChallengeType::Dns01 => "dns-01",
        }
    }
}

impl Display for ChallengeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An empty string selects `tls-alpn-01`.
impl FromStr for ChallengeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "tls-alpn-01" => Ok(ChallengeType::TlsAlpn01),
            "http-01" => Ok(ChallengeType::Http01),
            "dns-01" => Ok(ChallengeType::Dns01),
            other => Err(Error::UnsupportedChallenge(other.to_string())),
        }
    }
}

/// Settings for the `http-01` responder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpConfig {
    /// Address of the HTTP listener.
    pub listen: SocketAddr,
}

impl HttpConfig {
    /// Set the listen address.
    pub fn with_listen(mut self, listen: SocketAddr) -> Self {
        self.listen = listen;
        self
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: (Ipv4Addr::UNSPECIFIED, 80).into(),
        }
    }
}

/// Settings for the `tls-alpn-01` responder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlsAlpnConfig {
    /// Address of the TLS listener.
    pub listen: SocketAddr,
}

impl TlsAlpnConfig {
    /// Set the listen address.
    pub fn with_listen(mut self, listen: SocketAddr) -> Self {
        self.listen = listen;
        self
    }
}

impl Default for TlsAlpnConfig {
    fn default() -> Self {
        Self {
            listen: (Ipv4Addr::UNSPECIFIED, 443).into(),
        }
    }
}

/// Settings for the `dns-01` responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsConfig {
    /// Address of the UDP listener.
    pub listen: SocketAddr,

    /// Name of the authoritative nameserver for the challenge zone, reported in SOA and NS
    /// answers. A trailing dot is optional.
    pub nameserver: String,
}

impl DnsConfig {
    /// Create a configuration for the given nameserver, listening on port 53.
    pub fn new(nameserver: impl Into<String>) -> Self {
        Self {
            listen: (Ipv4Addr::UNSPECIFIED, 53).into(),
            nameserver: nameserver.into(),
        }
    }

    /// Set the listen address.
    pub fn with_listen(mut self, listen: SocketAddr) -> Self {
        self.listen = listen;
        self
    }
}

/// Selects exactly one challenge responder and its settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeConfig {
    /// Answer `http-01` challenges.
    Http01(HttpConfig),
    /// Answer `tls-alpn-01` challenges.
    TlsAlpn01(TlsAlpnConfig),
    /// Answer `dns-01` challenges.
    Dns01(DnsConfig),
}

impl ChallengeConfig {
    /// Build the configuration for `challenge_type` with default listen addresses.
    ///
    /// `nameserver` is only consulted for `dns-01`, where it is required.
    pub fn for_type(
        challenge_type: ChallengeType,
        nameserver: Option<&str>,
    ) -> crate::Result<Self> {
        Ok(match challenge_type {
            ChallengeType::Http01 => ChallengeConfig::Http01(HttpConfig::default()),
            ChallengeType::TlsAlpn01 => ChallengeConfig::TlsAlpn01(TlsAlpnConfig::default()),
            ChallengeType::Dns01 => {
                let nameserver = nameserver.ok_or_else(|| Error::InvalidName {
                    name: String::new(),
                    reason: "dns-01 requires a nameserver".to_string(),
                })?;
                ChallengeConfig::Dns01(DnsConfig::new(nameserver))
            }
        })
    }

    /// The challenge type this configuration answers.
    pub fn challenge_type(&self) -> ChallengeType {
        match self {
            ChallengeConfig::Http01(_) => ChallengeType::Http01,
            ChallengeConfig::TlsAlpn01(_) => ChallengeType::TlsAlpn01,
            ChallengeConfig::Dns01(_) => ChallengeType::Dns01,
        }
    }
}

/// Location and kind of the certificate private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyConfig {
    /// PEM file holding the key. Loaded if present, written if a key has to be generated.
    pub path: PathBuf,

    /// Kind to generate when no usable key exists at `path`, one of `rsa2048`, `rsa4096`,
    /// `rsa8192`, `ec256` or `ec384`. Never consulted for a key that loads.
    pub kind: String,
}

impl KeyConfig {
    /// Create a configuration for the key at `path`, generating `rsa2048` if needed.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: KeyKind::Rsa2048.to_string(),
        }
    }

    /// Set the kind of key to generate.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }
}

/// Location of the ACME account key. Without a path, a fresh key is generated for each run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountKeyConfig {
    /// PEM file holding the account key.
    pub path: Option<PathBuf>,
}

impl AccountKeyConfig {
    /// Set the key file.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}
