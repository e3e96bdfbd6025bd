use std::future::IntoFuture;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{Name, RData, RecordType};
use trillium::Status;
use trillium_acme_challenges::dns01::txt_record;
use trillium_acme_challenges::{
    start, ChallengeConfig, ChallengeType, DnsConfig, HttpConfig, Provider, TlsAlpnConfig,
};

fn loopback() -> SocketAddr {
    ([127, 0, 0, 1], 0).into()
}

#[test]
fn http01_through_the_selected_provider() -> anyhow::Result<()> {
    let provider = start(&ChallengeConfig::Http01(
        HttpConfig::default().with_listen(loopback()),
    ))?;
    assert_eq!(provider.challenge_type(), ChallengeType::Http01);
    assert_eq!(provider.sequential(), None);

    provider.present("example.org", "tok1", "auth1")?;
    let url = format!(
        "http://{}/.well-known/acme-challenge/tok1",
        provider.local_addr()
    );
    let client = trillium_client::client(trillium_smol::ClientConfig::new());
    let (status, body) = smol::block_on(async {
        let mut conn = client.get(url.as_str()).into_future().await?;
        let body = conn.response_body().read_string().await?;
        anyhow::Ok((conn.status(), body))
    })?;
    assert_eq!(status, Some(Status::Ok));
    assert_eq!(body, "auth1");

    provider.clean_up("example.org", "tok1", "auth1")?;
    Ok(())
}

#[test]
fn tls_alpn01_through_the_selected_provider() -> anyhow::Result<()> {
    let provider = start(&ChallengeConfig::TlsAlpn01(
        TlsAlpnConfig::default().with_listen(loopback()),
    ))?;
    assert_eq!(provider.challenge_type(), ChallengeType::TlsAlpn01);
    assert_eq!(provider.sequential(), None);

    provider.present("example.org", "tok1", "auth1")?;
    provider.clean_up("example.org", "tok1", "auth1")?;
    Ok(())
}

#[test]
fn dns01_through_the_selected_provider() -> anyhow::Result<()> {
    let provider = start(&ChallengeConfig::Dns01(
        DnsConfig::new("ns.example.org").with_listen(loopback()),
    ))?;
    assert_eq!(provider.challenge_type(), ChallengeType::Dns01);
    assert_eq!(provider.sequential(), Some(Duration::from_secs(5)));

    provider.present("example.org", "tok1", "auth1")?;
    let (name, value) = txt_record("example.org", "auth1");

    let mut request = Message::new();
    request
        .set_id(7)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .add_query(Query::query(Name::from_ascii(&name)?, RecordType::TXT));
    let socket = UdpSocket::bind("127.0.0.1:0")?;
    socket.set_read_timeout(Some(Duration::from_secs(5)))?;
    socket.send_to(&request.to_vec()?, provider.local_addr())?;
    let mut buf = [0; 4096];
    let (len, _) = socket.recv_from(&mut buf)?;
    let response = Message::from_vec(&buf[..len])?;

    let answers: Vec<Vec<u8>> = response
        .answers()
        .iter()
        .filter_map(|record| match record.data() {
            Some(RData::TXT(txt)) => Some(txt.txt_data().concat()),
            _ => None,
        })
        .collect();
    assert_eq!(answers, vec![value.into_bytes()]);

    provider.clean_up("example.org", "tok1", "auth1")?;
    Ok(())
}

#[test]
fn selection_follows_the_configured_type() -> anyhow::Result<()> {
    for (name, expected) in [
        ("http-01", ChallengeType::Http01),
        ("tls-alpn-01", ChallengeType::TlsAlpn01),
        ("", ChallengeType::TlsAlpn01),
        ("dns-01", ChallengeType::Dns01),
    ] {
        let config = ChallengeConfig::for_type(name.parse()?, Some("ns.example.org"))?;
        assert_eq!(config.challenge_type(), expected);
    }
    Ok(())
}
