use std::fmt::{self, Debug};
use std::net::{SocketAddr, TcpListener};
use std::time::Duration;

use trillium::log::debug;
use trillium_smol::Stopper;

use crate::{ChallengeStore, ChallengeType, Error, Result};

/// The capability an ACME client drives to solve challenges.
///
/// The client calls [`present`](Provider::present) before asking the ACME server to validate a
/// domain and [`clean_up`](Provider::clean_up) once validation has finished. Both are called
/// outside of any network handler and take effect for every query that arrives after they return.
pub trait Provider: Send + Sync {
    /// Publish the challenge response for `domain`.
    fn present(&self, domain: &str, token: &str, key_authorization: &str) -> Result<()>;

    /// Withdraw the challenge response published by [`present`](Provider::present).
    fn clean_up(&self, domain: &str, token: &str, key_authorization: &str) -> Result<()>;

    /// How long the client should wait between validating consecutive domains, if it should
    /// validate them one at a time.
    fn sequential(&self) -> Option<Duration> {
        None
    }

    /// The challenge type this provider answers.
    fn challenge_type(&self) -> ChallengeType;

    /// The address the listener is bound to.
    fn local_addr(&self) -> SocketAddr;
}

/// How one challenge type turns a `(domain, token, key authorization)` triple into published
/// material.
pub trait Challenge: Copy + Debug + Send + Sync + 'static {
    /// What the listener serves for a published challenge.
    type Value: Clone + Debug + Send + Sync + 'static;

    /// The challenge type.
    const TYPE: ChallengeType;

    /// Delay advertised through [`Provider::sequential`].
    const SEQUENTIAL: Option<Duration> = None;

    /// The key the listener looks the published value up under.
    fn record_key(domain: &str, token: &str) -> String;

    /// The value published for a key authorization.
    fn record_value(domain: &str, key_authorization: &str) -> Result<Self::Value>;
}

/// A running challenge listener together with the store it answers from.
///
/// The listener keeps running until the responder is dropped.
pub struct Responder<C: Challenge> {
    store: ChallengeStore<C::Value>,
    local_addr: SocketAddr,
    stopper: Stopper,
}

impl<C: Challenge> Responder<C> {
    pub(crate) fn new(
        store: ChallengeStore<C::Value>,
        local_addr: SocketAddr,
        stopper: Stopper,
    ) -> Self {
        Self {
            store,
            local_addr,
            stopper,
        }
    }

    /// The challenge material currently published by this responder.
    pub fn store(&self) -> &ChallengeStore<C::Value> {
        &self.store
    }
}

impl<C: Challenge> Provider for Responder<C> {
    fn present(&self, domain: &str, token: &str, key_authorization: &str) -> Result<()> {
        let key = C::record_key(domain, token);
        let value = C::record_value(domain, key_authorization)?;
        debug!("{}: presenting {key} for {domain}", C::TYPE);
        self.store.put(key, value);
        Ok(())
    }

    fn clean_up(&self, domain: &str, token: &str, _key_authorization: &str) -> Result<()> {
        let key = C::record_key(domain, token);
        if self.store.delete(&key).is_some() {
            debug!("{}: cleaned up {key} for {domain}", C::TYPE);
        }
        Ok(())
    }

    fn sequential(&self) -> Option<Duration> {
        C::SEQUENTIAL
    }

    fn challenge_type(&self) -> ChallengeType {
        C::TYPE
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl<C: Challenge> Debug for Responder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("challenge", &C::TYPE)
            .field("local_addr", &self.local_addr)
            .field("published", &self.store.len())
            .finish()
    }
}

impl<C: Challenge> Drop for Responder<C> {
    fn drop(&mut self) {
        self.stopper.stop();
    }
}

pub(crate) fn bind_tcp(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr).map_err(|source| Error::Bind { addr, source })
}
