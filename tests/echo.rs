//! End-to-end echo scenarios over a loopback TCP connection: plain text,
//! binary, and subprotocol negotiation.

use futures::StreamExt;
use socket_flow::config::{ClientConfig, ServerConfig};
use socket_flow::event::ConnectionEvent;
use socket_flow::handshake::{accept_async_with_config, connect_async_with_config};
use socket_flow::message::Message;
use socket_flow::stream::SocketFlowStream;
use tokio::net::TcpListener;

async fn bind_loopback() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, format!("ws://{addr}"))
}

#[tokio::test]
async fn echoes_text_message() {
    let (listener, url) = bind_loopback().await;

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut server = accept_async_with_config(SocketFlowStream::Plain(tcp), &ServerConfig::default())
            .await
            .unwrap();
        while let Some(event) = server.next().await {
            if let ConnectionEvent::TextMessageReceived(text) = event {
                server.send_text(text).await.unwrap();
            }
        }
    });

    let mut client = connect_async_with_config(&url, ClientConfig::default())
        .await
        .unwrap();
    client.send_text("Hello world!").await.unwrap();

    loop {
        match client.next().await.unwrap() {
            ConnectionEvent::TextMessageReceived(text) => {
                assert_eq!(text, "Hello world!");
                break;
            }
            ConnectionEvent::Connected => continue,
            other => panic!("unexpected event: {other:?}"),
        }
    }
}

#[tokio::test]
async fn echoes_binary_message() {
    let (listener, url) = bind_loopback().await;

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut server = accept_async_with_config(SocketFlowStream::Plain(tcp), &ServerConfig::default())
            .await
            .unwrap();
        while let Some(event) = server.next().await {
            if let ConnectionEvent::BinaryMessageReceived(data) = event {
                server.send_binary(data).await.unwrap();
            }
        }
    });

    let mut client = connect_async_with_config(&url, ClientConfig::default())
        .await
        .unwrap();
    let payload = vec![0x00, 0x01, 0x02, 0xFF];
    client.send_binary(payload.clone()).await.unwrap();

    loop {
        match client.next().await.unwrap() {
            ConnectionEvent::BinaryMessageReceived(data) => {
                assert_eq!(data, payload);
                break;
            }
            ConnectionEvent::Connected => continue,
            other => panic!("unexpected event: {other:?}"),
        }
    }
}

#[tokio::test]
async fn negotiates_preferred_subprotocol() {
    let (listener, url) = bind_loopback().await;

    let mut server_config = ServerConfig::default();
    server_config.supported_subprotocols = vec!["chat".to_string(), "superchat".to_string()];

    let server_task = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut server = accept_async_with_config(SocketFlowStream::Plain(tcp), &server_config)
            .await
            .unwrap();
        let negotiated = server.subprotocol().map(str::to_string);
        // Keep the connection alive until the client disconnects, otherwise
        // the client's handshake read would see an abrupt EOF.
        server.close(socket_flow::close::CloseCode::Normal, "bye")
            .await
            .unwrap();
        while server.next().await.is_some() {}
        negotiated
    });

    let client_config = ClientConfig {
        subprotocols: vec!["superchat".to_string(), "chat".to_string()],
        ..Default::default()
    };
    let client = connect_async_with_config(&url, client_config).await.unwrap();
    assert_eq!(client.subprotocol(), Some("superchat"));

    let server_negotiated = server_task.await.unwrap();
    assert_eq!(server_negotiated.as_deref(), Some("superchat"));
}

#[allow(unused)]
fn unused_message_variant_reference(_m: Message) {}
