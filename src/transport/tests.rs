use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::broker::{Broker, HttpDeliverer, IngressRecord};
use crate::client::Client;
use crate::config::Settings;
use crate::transport::message::{RejectReason, ServerMessage};
use crate::transport::websocket::{handle_payload, serve};
use crate::utils::error::BrokerError;

fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.broker.key_range = 100;
    settings.broker.partitions = 1;
    settings.broker.delivery_timeout_ms = 2000;
    settings.retry.base_delay_ms = 10;
    settings
}

async fn start_server(broker: &Broker) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, broker.router()));
    format!("ws://{addr}")
}

#[test]
fn test_server_message_wire_format() {
    let ack = ServerMessage::Enqueued { id: 4, partition: 2 };
    let json = serde_json::to_value(&ack).unwrap();
    assert_eq!(json["status"], "enqueued");
    assert_eq!(json["id"], 4);
    assert_eq!(json["partition"], 2);

    let rejected = ServerMessage::from(BrokerError::UnroutableTopic {
        topic: "orders".to_string(),
        hash: 999,
    });
    let json = serde_json::to_value(&rejected).unwrap();
    assert_eq!(json["status"], "rejected");
    assert_eq!(json["reason"], "unroutable");
}

#[tokio::test]
async fn test_handle_payload_rejects_garbage() {
    let broker = Broker::start(&test_settings(), HttpDeliverer::new()).unwrap();
    let router = broker.router();

    let reply = handle_payload(&router, b"not json").await;
    assert!(matches!(
        reply,
        ServerMessage::Rejected {
            reason: RejectReason::Malformed,
            ..
        }
    ));

    let reply = handle_payload(&router, br#"{"action":"Create"}"#).await;
    assert!(matches!(
        reply,
        ServerMessage::Rejected {
            reason: RejectReason::Malformed,
            ..
        }
    ));

    broker.shutdown().await;
}

#[tokio::test]
async fn test_handle_payload_enqueues_record() {
    let broker = Broker::start(&test_settings(), HttpDeliverer::new()).unwrap();
    let router = broker.router();

    let reply = handle_payload(&router, br#"{"action":"Create","topic":"orders"}"#).await;
    assert!(matches!(reply, ServerMessage::Enqueued { partition: 0, .. }));

    broker.shutdown().await;
}

#[tokio::test]
async fn test_websocket_acks_each_frame() {
    let broker = Broker::start(&test_settings(), HttpDeliverer::new()).unwrap();
    let url = start_server(&broker).await;

    let mut client = Client::connect(&url).await.expect("client connect");
    let first = client
        .send(&IngressRecord::new("Create", "orders", "", ""))
        .await
        .unwrap();
    let second = client
        .send(&IngressRecord::new("Create", "orders", "", ""))
        .await
        .unwrap();
    match (first, second) {
        (ServerMessage::Enqueued { id: a, .. }, ServerMessage::Enqueued { id: b, .. }) => {
            assert!(b > a)
        }
        other => panic!("expected two enqueued acks, got {other:?}"),
    }

    let reply = client.send_raw("{{{").await.unwrap();
    assert!(matches!(
        reply,
        ServerMessage::Rejected {
            reason: RejectReason::Malformed,
            ..
        }
    ));

    client.close().await.unwrap();
    broker.shutdown().await;
}

#[tokio::test]
async fn test_publish_over_websocket_reaches_http_subscriber() {
    // subscriber endpoint: accepts one POST and hands back its body
    let subscriber = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let subscriber_url = format!("http://{}/inbox", subscriber.local_addr().unwrap());
    let received = tokio::spawn(async move {
        let (mut socket, _) = subscriber.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request);
            if text.contains("\r\n\r\n") && text.trim_end().ends_with('}') {
                break;
            }
        }
        socket
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
            .await
            .unwrap();
        String::from_utf8_lossy(&request).to_string()
    });

    let broker = Broker::start(&test_settings(), HttpDeliverer::new()).unwrap();
    let url = start_server(&broker).await;
    let mut client = Client::connect(&url).await.expect("client connect");

    for record in [
        IngressRecord::new("Create", "TestQueueName", "", ""),
        IngressRecord::new("Sub", "TestQueueName", &subscriber_url, ""),
        IngressRecord::new("Pub", "TestQueueName", "tester", "Test1"),
    ] {
        let reply = client.send(&record).await.unwrap();
        assert!(matches!(reply, ServerMessage::Enqueued { .. }));
    }

    let request = tokio::time::timeout(Duration::from_secs(5), received)
        .await
        .expect("subscriber should have received a message")
        .unwrap();
    let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
    let delivered: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(delivered["topic"], "TestQueueName");
    assert_eq!(delivered["body"], "Test1");
    assert_eq!(delivered["sender"], "tester");

    client.close().await.unwrap();
    broker.shutdown().await;
}
