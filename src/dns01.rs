//! `dns-01`: an authoritative nameserver for the delegated `_acme-challenge` names.
//!
//! `TXT` questions for a published name are answered with its validation value, with a TTL of
//! one second. Every other question, including `TXT` for a name with nothing published, gets an
//! authoritative `NOERROR` answer: never `NXDOMAIN`, so that a resolver asking before
//! [`Provider::present`](crate::Provider::present) has propagated retries instead of caching
//! the name as nonexistent. `SOA` and `NS` questions are answered with the configured
//! nameserver so the challenge zone can be delegated here.

use std::net::{SocketAddr, UdpSocket as StdUdpSocket};
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hickory_proto::op::{Message, MessageType, Query, ResponseCode};
use hickory_proto::rr::rdata::{NS, SOA, TXT};
use hickory_proto::rr::{Name, RData, Record, RecordType};
use sha2::{Digest, Sha256};
use smol::net::UdpSocket;
use smol::Timer;
use trillium::log::{debug, error, info, warn};
use trillium_smol::Stopper;

use crate::{Challenge, ChallengeStore, ChallengeType, DnsConfig, Error, Responder, Result};

/// TTL of every record served.
pub const RECORD_TTL: u32 = 1;

const SOA_SERIAL: u32 = 100;
const SOA_REFRESH: i32 = 30;
const SOA_RETRY: i32 = 30;
const SOA_EXPIRE: i32 = 3600;
const SOA_MINIMUM: u32 = 1;

// Enough for any query carrying EDNS options.
const MAX_PACKET_SIZE: usize = 4096;

const RECEIVE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// The TXT record that answers a `dns-01` challenge: its lowercase fully-qualified name
/// (`_acme-challenge.<domain>.`) and its value, the unpadded base64url SHA-256 digest of the key
/// authorization.
pub fn txt_record(domain: &str, key_authorization: &str) -> (String, String) {
    (
        txt_record_name(domain),
        URL_SAFE_NO_PAD.encode(Sha256::digest(key_authorization.as_bytes())),
    )
}

fn txt_record_name(domain: &str) -> String {
    let domain = domain.trim_end_matches('.');
    let domain = domain.strip_prefix("*.").unwrap_or(domain);
    format!("_acme-challenge.{}.", domain.to_ascii_lowercase())
}

/// The `dns-01` challenge: a TXT value keyed by its record name.
#[derive(Debug, Clone, Copy)]
pub struct Dns01;

impl Challenge for Dns01 {
    type Value = String;

    const TYPE: ChallengeType = ChallengeType::Dns01;

    // Authoritative answers for the challenge zone may take a while to agree across resolvers,
    // so domains are validated one at a time.
    const SEQUENTIAL: Option<Duration> = Some(Duration::from_secs(5));

    fn record_key(domain: &str, _token: &str) -> String {
        txt_record_name(domain)
    }

    fn record_value(domain: &str, key_authorization: &str) -> Result<String> {
        Ok(txt_record(domain, key_authorization).1)
    }
}

/// Builds responses to DNS queries from a [`ChallengeStore`] of published TXT values.
#[derive(Clone, Debug)]
pub struct DnsHandler {
    store: ChallengeStore<String>,
    nameserver: Name,
    mailbox: Name,
}

impl DnsHandler {
    /// Create a handler answering from `store` and naming `nameserver` as the zone's primary
    /// nameserver. The SOA mailbox is `admin.<nameserver>`.
    pub fn new(store: ChallengeStore<String>, nameserver: &str) -> Result<Self> {
        let nameserver = nameserver.trim_end_matches('.');
        if nameserver.is_empty() {
            return Err(Error::InvalidName {
                name: nameserver.to_string(),
                reason: "empty nameserver".to_string(),
            });
        }
        Ok(Self {
            store,
            nameserver: canonical_name(nameserver)?,
            mailbox: canonical_name(&format!("admin.{nameserver}"))?,
        })
    }

    /// Answer `request`. Only its first question is considered.
    pub fn answer(&self, request: &Message) -> Message {
        let mut response = Message::new();
        response
            .set_id(request.id())
            .set_message_type(MessageType::Response)
            .set_op_code(request.op_code())
            .set_recursion_desired(request.recursion_desired())
            .set_authoritative(true);

        let Some(query) = request.queries().first() else {
            response.set_response_code(ResponseCode::FormErr);
            return response;
        };

        response
            .set_response_code(ResponseCode::NoError)
            .add_query(query.clone());
        if let Some(rdata) = self.rdata(query) {
            let mut record = Record::from_rdata(query.name().clone(), RECORD_TTL, rdata);
            record.set_dns_class(query.query_class());
            response.add_answer(record);
        }
        response
    }

    fn rdata(&self, query: &Query) -> Option<RData> {
        match query.query_type() {
            RecordType::TXT => {
                let value = self.store.get(&query.name().to_lowercase().to_string())?;
                Some(RData::TXT(TXT::new(vec![value])))
            }
            RecordType::SOA => Some(RData::SOA(SOA::new(
                self.nameserver.clone(),
                self.mailbox.clone(),
                SOA_SERIAL,
                SOA_REFRESH,
                SOA_RETRY,
                SOA_EXPIRE,
                SOA_MINIMUM,
            ))),
            RecordType::NS => Some(RData::NS(NS(self.nameserver.clone()))),
            _ => None,
        }
    }

    /// Decode `packet`, answer it, and encode the response. Undecodable packets and anything
    /// that is not a query get no response.
    pub fn respond(&self, packet: &[u8], peer: SocketAddr) -> Option<Vec<u8>> {
        let request = match Message::from_vec(packet) {
            Ok(request) => request,
            Err(e) => {
                warn!("dropping malformed DNS query from {peer}: {e}");
                return None;
            }
        };

        if request.message_type() != MessageType::Query {
            debug!("ignoring DNS response from {peer}");
            return None;
        }

        match self.answer(&request).to_vec() {
            Ok(response) => Some(response),
            Err(e) => {
                warn!("failed to encode DNS response for {peer}: {e}");
                None
            }
        }
    }

    async fn reply(&self, socket: &UdpSocket, packet: &[u8], peer: SocketAddr) {
        let Some(response) = self.respond(packet, peer) else {
            return;
        };
        if let Err(e) = socket.send_to(&response, peer).await {
            warn!("failed to send DNS response to {peer}: {e}");
        }
    }
}

fn canonical_name(name: &str) -> Result<Name> {
    Name::from_ascii(format!("{}.", name.trim_end_matches('.')))
        .map(|name| name.to_lowercase())
        .map_err(|e| Error::InvalidName {
            name: name.to_string(),
            reason: e.to_string(),
        })
}

async fn serve(socket: UdpSocket, handler: DnsHandler, stopper: Stopper) {
    let mut buf = vec![0; MAX_PACKET_SIZE];
    while let Some(received) = stopper.stop_future(socket.recv_from(&mut buf)).await {
        match received {
            Ok((len, peer)) => {
                let packet = buf[..len].to_vec();
                let socket = socket.clone();
                let handler = handler.clone();
                trillium_smol::spawn(async move {
                    handler.reply(&socket, &packet, peer).await;
                });
            }
            Err(e) => {
                error!("DNS receive failed: {e}");
                if !back_off(&stopper).await {
                    break;
                }
            }
        }
    }
}

// Returns false if the responder was stopped while waiting.
async fn back_off(stopper: &Stopper) -> bool {
    stopper
        .stop_future(Timer::after(RECEIVE_RETRY_DELAY))
        .await
        .is_some()
}

/// Start a `dns-01` responder listening for UDP queries on `config.listen`.
pub fn start(config: &DnsConfig) -> Result<Responder<Dns01>> {
    let store = ChallengeStore::new();
    let handler = DnsHandler::new(store.clone(), &config.nameserver)?;

    let socket = StdUdpSocket::bind(config.listen).map_err(|source| Error::Bind {
        addr: config.listen,
        source,
    })?;
    let local_addr = socket.local_addr()?;
    let socket = UdpSocket::try_from(socket)?;
    let stopper = Stopper::new();

    trillium_smol::spawn(serve(socket, handler, stopper.clone()));

    info!("dns-01 responder listening on {local_addr}");
    Ok(Responder::new(store, local_addr, stopper))
}
