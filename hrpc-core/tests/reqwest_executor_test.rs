use hrpc_core::{
    HrpcClient, ResponseEntity,
    client::ErrorCategory,
    config::ClientConfig,
    declaration::{Endpoint, InterfaceDeclaration, MethodDeclaration, MethodId, ParameterDeclaration},
    http_types::StatusCode,
};
use serde_json::{Value, json};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    sync::oneshot,
};

// Serves a single HTTP/1.1 exchange and hands the raw request text back to the test.
async fn serve_once(status_line: &'static str, body: &'static str) -> (u16, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;

        let response = format!(
            "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();

        let _ = tx.send(request);
    });

    (port, rx)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        let read = socket.read(&mut chunk).await.unwrap();
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);

        let text = String::from_utf8_lossy(&buffer).to_string();
        if let Some(end) = text.find("\r\n\r\n") {
            let content_length = text[..end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .map(|(_, value)| value.trim().parse::<usize>().unwrap())
                .unwrap_or(0);

            if buffer.len() >= end + 4 + content_length {
                break;
            }
        }
    }

    String::from_utf8(buffer).unwrap()
}

fn client(port: u16) -> HrpcClient {
    let host = format!("127.0.0.1:{port}");

    HrpcClient::builder(ClientConfig::default())
        .interface(
            InterfaceDeclaration::new("EchoClient")
                .method(
                    MethodDeclaration::post("echo", Endpoint::fixed("http", &host, "/echo/{id}"))
                        .parameter(ParameterDeclaration::path("id", None))
                        .parameter(ParameterDeclaration::header("trace", Some("x-trace")))
                        .parameter(ParameterDeclaration::body("payload"))
                        .returns("ResponseEntity<Value>"),
                )
                .method(
                    MethodDeclaration::get("status", Endpoint::fixed("http", &host, "/status"))
                        .returns("Value"),
                ),
        )
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_reqwest_executor_round_trip() {
    let (port, request) = serve_once("201 Created", r#"{"accepted":true}"#).await;

    let entity: ResponseEntity<Value> = client(port)
        .invoke_as(
            &MethodId::new("EchoClient", "echo"),
            &[json!(7), json!("abc"), json!({ "message": "hello" })],
        )
        .await
        .unwrap();

    assert_eq!(entity.status, StatusCode::CREATED);
    assert_eq!(entity.body, json!({ "accepted": true }));

    let request = request.await.unwrap();
    let lowercase = request.to_ascii_lowercase();

    assert!(request.starts_with("POST /echo/7 HTTP/1.1\r\n"));
    assert!(lowercase.contains("x-trace: abc\r\n"));
    assert!(lowercase.contains("content-type: application/json\r\n"));
    assert!(request.ends_with(r#"{"message":"hello"}"#));
}

#[tokio::test]
async fn test_reqwest_executor_reports_remote_status() {
    let (port, _request) = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#).await;

    let error = client(port)
        .invoke(&MethodId::new("EchoClient", "status"), &[])
        .await
        .unwrap_err();

    assert_eq!(error.category(), ErrorCategory::Remote);
    assert!(error.is_retryable());
}

#[tokio::test]
async fn test_reqwest_executor_reports_connection_failures() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let error = client(port)
        .invoke(&MethodId::new("EchoClient", "status"), &[])
        .await
        .unwrap_err();

    assert_eq!(error.category(), ErrorCategory::Remote);
    assert_eq!(
        error.url,
        Some(format!("http://127.0.0.1:{port}/status"))
    );
}
