use sports_lake::source::{RecordSource, SportsDataClient, API_KEY_HEADER};
use sports_lake::LakeError;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve exactly one HTTP response, capturing the raw request text.
async fn serve_once(status_line: &'static str, body: &'static str) -> (String, Arc<Mutex<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let captured = Arc::new(Mutex::new(String::new()));
    let captured_clone = captured.clone();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 8192];
        let mut request = Vec::new();
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            if request.windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }
        *captured_clone.lock().unwrap() = String::from_utf8_lossy(&request).to_string();

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
    });

    (format!("http://{}/v3/nba/scores/json/Players", addr), captured)
}

#[tokio::test]
async fn test_fetch_sends_api_key_header_and_parses_array() {
    let body = r#"[
        {"PlayerID": 1, "FirstName": "Nikola", "LastName": "Jokic", "Team": "DEN", "Position": "C", "Points": 26},
        {"PlayerID": 2, "FirstName": "Jamal", "LastName": "Murray", "Team": "DEN", "Position": "PG", "Points": 21}
    ]"#;
    let (endpoint, captured) = serve_once("200 OK", body).await;

    let client = SportsDataClient::new(endpoint, "secret-key").unwrap();
    let records = client.fetch().await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].last_name(), Some("Jokic"));
    assert_eq!(records[1].points(), Some(21));

    let request = captured.lock().unwrap().to_ascii_lowercase();
    assert!(request.starts_with("get /v3/nba/scores/json/players"));
    assert!(request.contains(&format!("{}: secret-key", API_KEY_HEADER.to_ascii_lowercase())));
}

#[tokio::test]
async fn test_non_success_status_is_fetch_error() {
    let (endpoint, _) = serve_once("401 Unauthorized", r#"{"message":"Access denied"}"#).await;

    let client = SportsDataClient::new(endpoint, "bad-key").unwrap();
    let err = client.fetch().await.unwrap_err();

    match err {
        LakeError::Fetch { status, message } => {
            assert_eq!(status, Some(401));
            assert!(message.contains("Access denied"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_transport_failure_is_fetch_error() {
    // Bind then drop to get a port with nothing listening
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = SportsDataClient::new(format!("http://{}/players", addr), "key").unwrap();
    let err = client.fetch().await.unwrap_err();
    assert!(matches!(err, LakeError::Fetch { status: None, .. }));
}

#[tokio::test]
async fn test_empty_array_yields_no_records() {
    let (endpoint, _) = serve_once("200 OK", "[]").await;
    let client = SportsDataClient::new(endpoint, "key").unwrap();
    assert!(client.fetch().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_undecodable_body_is_fetch_error_without_status() {
    let (endpoint, _) = serve_once("200 OK", r#"{"not":"arr"}"#).await;
    let client = SportsDataClient::new(endpoint, "key").unwrap();

    match client.fetch().await.unwrap_err() {
        LakeError::Fetch { status, message } => {
            assert_eq!(status, None);
            assert!(message.contains("decode"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}
