use embercast::delivery::http::HttpBackend;
use embercast::delivery::{DeliveryBackend, DeliveryError, NotificationPayload};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn payload() -> NotificationPayload {
    NotificationPayload {
        email: "builds@example.com".to_owned(),
        password: "s3cret".to_owned(),
        domain: "example".to_owned(),
        room_name: "Build Status".to_owned(),
        message: "BUILD FAILURE \nfoo #12".to_owned(),
    }
}

/// Serve one canned HTTP response on a local port and return the root URL.
async fn serve_once(response: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind local listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn malformed_room_index_is_a_bad_response_not_a_payload_error() {
    let root = serve_once(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: application/json\r\n\
         Content-Length: 9\r\n\
         Connection: close\r\n\
         \r\n\
         not-json!",
    )
    .await;

    let backend = HttpBackend::with_service_root(root);
    let error = backend
        .deliver(&payload())
        .await
        .expect_err("unparseable room listing must fail");

    assert!(matches!(error, DeliveryError::BadResponse(_)));
    let message = error.to_string();
    assert!(message.starts_with("malformed chat service response"));
    assert!(!message.contains("payload serialization"));
}

#[tokio::test]
async fn rejected_credentials_surface_the_service_status() {
    let root = serve_once(
        "HTTP/1.1 401 Unauthorized\r\n\
         Content-Length: 6\r\n\
         Connection: close\r\n\
         \r\n\
         denied",
    )
    .await;

    let backend = HttpBackend::with_service_root(root);
    let error = backend
        .deliver(&payload())
        .await
        .expect_err("rejected credentials must fail");

    assert!(matches!(
        error,
        DeliveryError::HttpStatus { status: 401, .. }
    ));
}
