//! Integration tests for the WebSocket transport: a real listener on an
//! OS-assigned port and a `tokio-tungstenite` client.

#[cfg(feature = "websocket")]
mod websocket {
    use futures_util::{SinkExt, StreamExt};
    use realmkeep_transport::{Connection, Transport, WebSocketTransport};
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn connect_client(addr: std::net::SocketAddr) -> ClientWs {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        ws
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("bound address");

        let server = tokio::spawn(async move { transport.accept().await.expect("should accept") });
        let mut client = connect_client(addr).await;
        let conn = server.await.expect("accept task");

        assert!(conn.id().into_inner() > 0);
        assert!(conn.peer_addr().ip().is_loopback());

        conn.send(b"from server").await.expect("send");
        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"from server");

        client
            .send(Message::Binary(b"from client".to_vec().into()))
            .await
            .unwrap();
        let frame = conn.recv().await.expect("recv").expect("frame");
        assert_eq!(frame, b"from client");

        conn.close().await.expect("close");
    }

    #[tokio::test]
    async fn test_websocket_send_while_reader_waits() {
        // The reader half is parked in recv(); the writer half must not
        // be blocked behind it.
        let mut transport = WebSocketTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = transport.local_addr().unwrap();

        let server = tokio::spawn(async move { transport.accept().await.unwrap() });
        let mut client = connect_client(addr).await;
        let conn = std::sync::Arc::new(server.await.unwrap());

        let reader = {
            let conn = std::sync::Arc::clone(&conn);
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::task::yield_now().await;

        tokio::time::timeout(std::time::Duration::from_secs(2), conn.send(b"ping"))
            .await
            .expect("send must not wait for the reader")
            .expect("send");
        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"ping");

        client.send(Message::Close(None)).await.unwrap();
        let result = reader.await.unwrap().expect("recv should not error");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = transport.local_addr().unwrap();

        let server = tokio::spawn(async move { transport.accept().await.unwrap() });
        let mut client = connect_client(addr).await;
        let conn = server.await.unwrap();

        client.send(Message::Close(None)).await.unwrap();

        let result = conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "clean close yields None");
    }
}
