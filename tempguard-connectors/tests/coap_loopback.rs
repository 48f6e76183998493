//! End-to-end: CoAP readings over UDP in, CoAP reports over UDP out

use std::time::Duration;

use coap_lite::{CoapOption, ContentFormat, MessageClass, MessageType, Packet, RequestType};
use tokio::net::UdpSocket;

use tempguard_connectors::{CoapCodec, UdpTransport};
use tempguard_core::{Pipeline, PipelineConfig, SenderConfig};

fn reading(message_id: u16, value: i32) -> Vec<u8> {
    let mut packet = Packet::new();
    packet.header.set_type(MessageType::NonConfirmable);
    packet.header.code = MessageClass::Request(RequestType::Post);
    packet.header.message_id = message_id;
    packet.add_option(CoapOption::UriPath, b"temp".to_vec());
    packet.payload = value.to_string().into_bytes();
    packet.to_bytes().unwrap()
}

#[tokio::test]
async fn test_reports_reach_udp_collector() {
    let collector = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let sensor = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let inbound = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let outbound = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let node_addr = inbound.local_addr().unwrap();

    let config = PipelineConfig {
        sender: SenderConfig {
            collector: collector.local_addr().unwrap(),
            first_message_id: 100,
            ..SenderConfig::default()
        },
        ..PipelineConfig::default()
    };
    let handle = Pipeline::new(config, inbound, outbound, CoapCodec::new())
        .unwrap()
        .spawn();

    for (mid, value) in [(1, 65), (2, 68), (3, 58), (4, 75)] {
        sensor.send_to(&reading(mid, value), node_addr).await.unwrap();
    }
    // Not CoAP at all
    sensor.send_to(b"\x01", node_addr).await.unwrap();

    let mut buf = [0u8; 1024];
    let mut reports = Vec::new();
    for _ in 0..2 {
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), collector.recv_from(&mut buf))
            .await
            .expect("report within deadline")
            .unwrap();
        reports.push(Packet::from_bytes(&buf[..len]).unwrap());
    }

    let stats = handle.stats();
    handle.shutdown().await.unwrap();

    let first = &reports[0];
    assert_eq!(first.header.get_type(), MessageType::Confirmable);
    assert_eq!(first.header.code, MessageClass::Request(RequestType::Post));
    assert_eq!(first.header.message_id, 100);
    assert_eq!(first.get_content_format(), Some(ContentFormat::ApplicationJSON));
    assert_eq!(
        std::str::from_utf8(&first.payload).unwrap(),
        r#"{"id":"123","type":"warning","temp":"58","temp_min":"58","temp_max":"68","temp_avg":"63"}"#
    );

    let second = &reports[1];
    assert_eq!(second.header.message_id, 101);
    assert_eq!(
        std::str::from_utf8(&second.payload).unwrap(),
        r#"{"id":"123","type":"warning","temp":"75","temp_min":"58","temp_max":"75","temp_avg":"66"}"#
    );

    let snap = stats.snapshot();
    assert_eq!(snap.anomalies, 2);
    assert_eq!(snap.reports_sent, 2);
}
