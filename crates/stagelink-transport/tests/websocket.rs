//! Integration tests for the WebSocket connection.
//!
//! These tests spin up a real tokio-tungstenite listener playing the role
//! of the backoffice and verify that frames actually flow over the
//! network correctly in both directions, and that closes are reported as
//! `Ok(None)` rather than errors.

#[cfg(feature = "websocket")]
mod websocket {
    use stagelink_transport::{Connection, WebSocketConnection};

    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;

    type ServerWs =
        tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

    /// Helper: binds a listener on an OS-assigned port and returns the
    /// address plus a task that resolves to the accepted server-side
    /// WebSocket stream.
    async fn spawn_server() -> (String, tokio::task::JoinHandle<ServerWs>)
    {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = listener.local_addr().expect("should have addr");

        let handle = tokio::spawn(async move {
            let (stream, _) =
                listener.accept().await.expect("should accept");
            tokio_tungstenite::accept_async(stream)
                .await
                .expect("should upgrade")
        });

        (format!("ws://{addr}"), handle)
    }

    #[tokio::test]
    async fn test_connect_and_send_receive() {
        let (url, server) = spawn_server().await;

        let conn = WebSocketConnection::connect(&url)
            .await
            .expect("should connect");
        let mut server_ws = server.await.expect("task should complete");

        // Each dial gets a fresh, non-zero connection id.
        assert!(conn.id().into_inner() > 0);

        // --- Client sends, server receives ---
        conn.send(b"hello from installation")
            .await
            .expect("send should succeed");

        let msg = server_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"hello from installation");

        // --- Server sends, client receives ---
        server_ws
            .send(Message::Binary(b"hello from backoffice".to_vec().into()))
            .await
            .unwrap();

        let received = conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, b"hello from backoffice");

        // --- Clean close ---
        conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_recv_accepts_text_frames() {
        // The backoffice may emit text frames; they arrive as their
        // UTF-8 bytes.
        let (url, server) = spawn_server().await;

        let conn = WebSocketConnection::connect(&url)
            .await
            .expect("should connect");
        let mut server_ws = server.await.unwrap();

        server_ws
            .send(Message::Text("{\"event\":\"command\"}".into()))
            .await
            .unwrap();

        let received = conn.recv().await.unwrap().unwrap();
        assert_eq!(received, b"{\"event\":\"command\"}");
    }

    #[tokio::test]
    async fn test_recv_returns_none_on_server_close() {
        let (url, server) = spawn_server().await;

        let conn = WebSocketConnection::connect(&url)
            .await
            .expect("should connect");
        let mut server_ws = server.await.unwrap();

        // Backoffice closes the connection.
        server_ws.send(Message::Close(None)).await.unwrap();

        // Client should see None (clean close), not an error.
        let result = conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on server close");
    }

    #[tokio::test]
    async fn test_connect_unreachable_returns_error() {
        // Nothing is listening here; the dial must fail, not hang.
        let result =
            WebSocketConnection::connect("ws://127.0.0.1:1").await;
        assert!(result.is_err(), "dial to dead port should fail");
    }

    #[tokio::test]
    async fn test_connection_ids_are_unique_per_dial() {
        let (url_a, server_a) = spawn_server().await;
        let (url_b, server_b) = spawn_server().await;

        let a = WebSocketConnection::connect(&url_a).await.unwrap();
        let b = WebSocketConnection::connect(&url_b).await.unwrap();
        let _ = server_a.await.unwrap();
        let _ = server_b.await.unwrap();

        assert_ne!(a.id(), b.id(), "each dial gets its own id");
    }
}
