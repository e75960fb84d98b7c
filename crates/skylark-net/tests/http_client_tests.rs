//! Integration tests for the HTTP client over real localhost sockets.

mod common;

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread::JoinHandle;

use skylark_net::http::{HttpClient, HttpRequest, fetch};
use skylark_net::{ClientConfig, NetworkError};

/// Serve one connection: answer each request with the next canned response.
///
/// Returns the listening URL and a handle yielding the raw requests.
fn serve(responses: Vec<Vec<u8>>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());

    let handle = std::thread::spawn(move || {
        let (mut socket, _) = listener.accept().unwrap();
        let mut requests = Vec::new();
        let mut pending = Vec::new();

        for response in responses {
            let request = read_request(&mut socket, &mut pending);
            requests.push(request);
            socket.write_all(&response).unwrap();
        }
        requests
    });

    (url, handle)
}

/// Read one request (head plus `Content-Length` body) off the socket.
fn read_request(socket: &mut impl Read, pending: &mut Vec<u8>) -> String {
    let mut buf = [0u8; 1024];
    loop {
        if let Some(pos) = pending.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&pending[..pos + 4]).into_owned();
            let body_len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length: "))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            let total = pos + 4 + body_len;
            if pending.len() >= total {
                let request = String::from_utf8_lossy(&pending[..total]).into_owned();
                pending.drain(..total);
                return request;
            }
        }
        let n = socket.read(&mut buf).unwrap();
        assert!(n > 0, "client closed before sending a full request");
        pending.extend_from_slice(&buf[..n]);
    }
}

fn response(head: &str, body: &[u8]) -> Vec<u8> {
    let mut raw = head.as_bytes().to_vec();
    raw.extend_from_slice(body);
    raw
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

#[test]
fn test_get_with_content_length() {
    common::init_tracing();
    let (url, server) = serve(vec![response(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\n",
        b"hello",
    )]);

    let client = HttpClient::connect(&url, ClientConfig::default()).unwrap();
    let response = client.request(HttpRequest::get("/greeting")).unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.status_message(), "OK");
    assert_eq!(response.header("content-type"), Some("text/plain"));
    assert_eq!(response.text(), "hello");

    let requests = server.join().unwrap();
    assert!(requests[0].starts_with("GET /greeting HTTP/1.1\r\n"));
    assert!(requests[0].contains("accept-encoding: gzip, deflate, br\r\n"));
    assert!(requests[0].contains(&format!("host: {}\r\n", url.trim_start_matches("http://"))));
}

#[test]
fn test_keep_alive_reuses_connection() {
    let (url, server) = serve(vec![
        response("HTTP/1.1 201 Created\r\nContent-Length: 2\r\n\r\n", b"{}"),
        response("HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\n\r\n", b"not found"),
    ]);

    let client = HttpClient::connect(&url, ClientConfig::default()).unwrap();

    let created = client
        .request(HttpRequest::post("/items").json(&serde_json::json!({"name": "widget"})))
        .unwrap();
    assert_eq!(created.status(), 201);
    assert!(created.is_success());

    let missing = client.request(HttpRequest::get("/items/9")).unwrap();
    assert!(missing.is_client_error());
    assert_eq!(
        missing.error_for_status().unwrap_err(),
        NetworkError::HttpStatus { status: 404 }
    );

    let requests = server.join().unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].contains("content-type: application/json\r\n"));
    assert!(requests[0].ends_with(r#"{"name":"widget"}"#));
}

#[test]
fn test_chunked_gzip_response() {
    let body = "line of text\n".repeat(200);
    let compressed = gzip(body.as_bytes());

    let mut chunked = Vec::new();
    for piece in compressed.chunks(100) {
        chunked.extend_from_slice(format!("{:x}\r\n", piece.len()).as_bytes());
        chunked.extend_from_slice(piece);
        chunked.extend_from_slice(b"\r\n");
    }
    chunked.extend_from_slice(b"0\r\n\r\n");

    let (url, server) = serve(vec![response(
        "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nContent-Encoding: gzip\r\n\r\n",
        &chunked,
    )]);

    let client =
        HttpClient::connect(&url, ClientConfig::default().read_chunk_size(64)).unwrap();
    let response = client.request(HttpRequest::get("/log")).unwrap();
    assert_eq!(response.text(), body);
    server.join().unwrap();
}

#[test]
fn test_brotli_response() {
    let body = br#"{"items":[1,2,3],"next":null}"#;
    let mut compressed = Vec::new();
    {
        let mut writer = brotli::CompressorWriter::new(&mut compressed, 4096, 9, 22);
        writer.write_all(body).unwrap();
    }

    let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Encoding: br\r\nContent-Length: {}\r\n\r\n",
        compressed.len()
    );
    let (url, server) = serve(vec![response(&head, &compressed)]);

    #[derive(serde::Deserialize)]
    struct Page {
        items: Vec<u32>,
        next: Option<String>,
    }

    let client = HttpClient::connect(&url, ClientConfig::default()).unwrap();
    let page: Page = client.request(HttpRequest::get("/page")).unwrap().json().unwrap();
    assert_eq!(page.items, vec![1, 2, 3]);
    assert!(page.next.is_none());
    server.join().unwrap();
}

#[test]
fn test_unsupported_encoding_is_an_error() {
    let (url, server) = serve(vec![response(
        "HTTP/1.1 200 OK\r\nContent-Encoding: compress\r\nContent-Length: 3\r\n\r\n",
        b"xyz",
    )]);

    let client = HttpClient::connect(&url, ClientConfig::default()).unwrap();
    assert_eq!(
        client.request(HttpRequest::get("/")).unwrap_err(),
        NetworkError::UnsupportedEncoding("compress".to_string())
    );
    server.join().unwrap();
}

#[test]
fn test_fetch_uses_url_path() {
    let (url, server) = serve(vec![response(
        "HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\n",
        b"done",
    )]);

    let response = fetch(&format!("{url}/status?verbose=1"), HttpRequest::get("")).unwrap();
    assert_eq!(response.text(), "done");

    let requests = server.join().unwrap();
    assert!(requests[0].starts_with("GET /status?verbose=1 HTTP/1.1\r\n"));
    assert!(requests[0].contains("connection: close\r\n"));
}

#[test]
fn test_connect_refused() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let result = HttpClient::connect(&format!("http://127.0.0.1:{port}"), ClientConfig::default());
    assert!(matches!(result, Err(NetworkError::Connect(_))));
}

#[test]
fn test_unsupported_scheme() {
    let result = HttpClient::connect("ftp://example.com/file", ClientConfig::default());
    assert!(matches!(result, Err(NetworkError::InvalidUrl(_))));
}
