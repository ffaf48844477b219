//! The pending-connection queue is bounded: once `max_pending_connections`
//! handshakes are queued and unclaimed, further accepted sockets are
//! dropped and reported as a server-level error instead of growing the
//! queue without bound.

use socket_flow::close::CloseCode;
use socket_flow::config::ServerConfig;
use socket_flow::event::ServerEvent;
use socket_flow::handshake::connect_async;
use socket_flow::server::Server;

#[tokio::test]
async fn excess_connections_beyond_capacity_are_rejected() {
    let config = ServerConfig {
        max_pending_connections: 2,
        ..Default::default()
    };
    let mut server = Server::listen("127.0.0.1", 0, config).await.unwrap();
    let url = format!("ws://{}", server.local_addr());

    let _first = connect_async(&url).await.unwrap();
    let _second = connect_async(&url).await.unwrap();

    // The third socket is accepted at capacity: the server drops it before
    // any handshake bytes are written, so the client's own upgrade attempt
    // never completes and must observe an error rather than a connection.
    assert!(connect_async(&url).await.is_err());

    let mut new_connections = 0;
    let mut saw_server_error = false;
    for _ in 0..3 {
        match server.next_event().await.unwrap() {
            ServerEvent::NewConnection => new_connections += 1,
            ServerEvent::ServerError(Some(CloseCode::AbnormalDisconnection)) => {
                saw_server_error = true
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    assert_eq!(new_connections, 2);
    assert!(saw_server_error);
    assert!(server.next_pending_connection().await.is_some());
    assert!(server.next_pending_connection().await.is_some());
    assert!(server.next_pending_connection().await.is_none());
}

#[tokio::test]
async fn close_emits_closed_after_listener_stops_accepting() {
    let mut server = Server::listen("127.0.0.1", 0, ServerConfig::default())
        .await
        .unwrap();
    let url = format!("ws://{}", server.local_addr());

    assert!(server.is_listening());
    server.close().await;

    match server.next_event().await.unwrap() {
        ServerEvent::Closed => {}
        other => panic!("unexpected event: {other:?}"),
    }

    assert!(!server.is_listening());
    assert!(connect_async(&url).await.is_err());
}
