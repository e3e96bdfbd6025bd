use std::net::UdpSocket;
use std::time::Duration;

use anyhow::{bail, Context};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{Name, RData, RecordType};
use sha2::{Digest, Sha256};
use trillium_acme_challenges::dns01::{self, Dns01};
use trillium_acme_challenges::{DnsConfig, Error, Provider, Responder};

fn start() -> anyhow::Result<Responder<Dns01>> {
    Ok(dns01::start(
        &DnsConfig::new("ns.example.org").with_listen(([127, 0, 0, 1], 0).into()),
    )?)
}

fn ask(
    responder: &Responder<Dns01>,
    name: &str,
    record_type: RecordType,
) -> anyhow::Result<Message> {
    let mut request = Message::new();
    request
        .set_id(0x5eed)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true)
        .add_query(Query::query(Name::from_ascii(name)?, record_type));

    let socket = UdpSocket::bind("127.0.0.1:0")?;
    socket.set_read_timeout(Some(Duration::from_secs(5)))?;
    socket.send_to(&request.to_vec()?, responder.local_addr())?;

    let mut buf = [0; 4096];
    let (len, _) = socket.recv_from(&mut buf).context("waiting for DNS response")?;
    let response = Message::from_vec(&buf[..len])?;
    if response.id() != request.id() {
        bail!("response id {} does not match query", response.id());
    }
    Ok(response)
}

fn txt_values(response: &Message) -> Vec<Vec<u8>> {
    response
        .answers()
        .iter()
        .filter_map(|record| match record.data() {
            Some(RData::TXT(txt)) => Some(txt.txt_data().concat()),
            _ => None,
        })
        .collect()
}

#[test]
fn txt_answer_follows_present_and_clean_up() -> anyhow::Result<()> {
    let responder = start()?;
    let expected = URL_SAFE_NO_PAD.encode(Sha256::digest(b"auth1"));

    responder.present("Example.org", "tok1", "auth1")?;
    for name in [
        "_acme-challenge.example.org.",
        "_ACME-CHALLENGE.EXAMPLE.ORG.",
        "_Acme-Challenge.Example.Org.",
    ] {
        let response = ask(&responder, name, RecordType::TXT)?;
        assert_eq!(response.response_code(), ResponseCode::NoError);
        assert!(response.authoritative());
        assert_eq!(txt_values(&response), vec![expected.clone().into_bytes()]);
        assert_eq!(response.answers()[0].ttl(), 1);
    }

    responder.clean_up("Example.org", "tok1", "auth1")?;
    let response = ask(&responder, "_acme-challenge.example.org.", RecordType::TXT)?;
    assert_eq!(response.response_code(), ResponseCode::NoError);
    assert!(response.authoritative());
    assert!(response.answers().is_empty());

    Ok(())
}

#[test]
fn soa_and_ns_name_the_configured_nameserver() -> anyhow::Result<()> {
    let responder = start()?;

    let response = ask(&responder, "example.org.", RecordType::SOA)?;
    match response.answers().first().and_then(|record| record.data()) {
        Some(RData::SOA(soa)) => {
            assert_eq!(soa.mname().to_string(), "ns.example.org.");
            assert_eq!(soa.rname().to_string(), "admin.ns.example.org.");
        }
        other => bail!("unexpected SOA answer {other:?}"),
    }

    let response = ask(&responder, "example.org.", RecordType::NS)?;
    match response.answers().first().and_then(|record| record.data()) {
        Some(RData::NS(ns)) => assert_eq!(ns.0.to_string(), "ns.example.org."),
        other => bail!("unexpected NS answer {other:?}"),
    }

    Ok(())
}

#[test]
fn unsupported_types_get_empty_authoritative_answers() -> anyhow::Result<()> {
    let responder = start()?;
    responder.present("example.org", "tok1", "auth1")?;

    let response = ask(&responder, "_acme-challenge.example.org.", RecordType::A)?;
    assert_eq!(response.response_code(), ResponseCode::NoError);
    assert!(response.authoritative());
    assert!(response.answers().is_empty());

    Ok(())
}

#[test]
fn garbage_does_not_stop_the_listener() -> anyhow::Result<()> {
    let responder = start()?;
    let socket = UdpSocket::bind("127.0.0.1:0")?;
    socket.send_to(b"\x01\x02not dns", responder.local_addr())?;

    let response = ask(&responder, "example.org.", RecordType::NS)?;
    assert_eq!(response.answers().len(), 1);
    Ok(())
}

#[test]
fn responses_are_not_answered() -> anyhow::Result<()> {
    let responder = start()?;
    let mut packet = Message::new();
    packet
        .set_id(0xbeef)
        .set_message_type(MessageType::Response)
        .set_op_code(OpCode::Query)
        .add_query(Query::query(Name::from_ascii("example.org.")?, RecordType::NS));

    let socket = UdpSocket::bind("127.0.0.1:0")?;
    socket.set_read_timeout(Some(Duration::from_millis(500)))?;
    socket.send_to(&packet.to_vec()?, responder.local_addr())?;
    let mut buf = [0; 4096];
    assert!(socket.recv_from(&mut buf).is_err());

    let response = ask(&responder, "example.org.", RecordType::NS)?;
    assert_eq!(response.answers().len(), 1);
    Ok(())
}

#[test]
fn dns_validation_is_sequential() -> anyhow::Result<()> {
    let responder = start()?;
    assert_eq!(responder.sequential(), Some(Duration::from_secs(5)));
    Ok(())
}

#[test]
fn occupied_address_is_a_bind_error() -> anyhow::Result<()> {
    let occupied = UdpSocket::bind("127.0.0.1:0")?;
    let result =
        dns01::start(&DnsConfig::new("ns.example.org").with_listen(occupied.local_addr()?));
    assert!(matches!(result, Err(Error::Bind { .. })));
    Ok(())
}
