//! Client side of the opening handshake (RFC 6455 section 4.1).

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rand::RngCore;
use sha1::{Digest, Sha1};

use crate::error::{NetworkError, Result};
use crate::http::{HeaderMap, HttpRequest, HttpResponse};

/// Appended to the client key before hashing into `Sec-WebSocket-Accept`.
pub const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The only protocol version this client speaks.
pub const WEBSOCKET_VERSION: &str = "13";

/// Draw a fresh 16-byte handshake nonce from the OS.
pub fn generate_key() -> [u8; 16] {
    let mut key = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut key);
    key
}

/// The `Sec-WebSocket-Key` header value for a nonce.
pub fn encode_key(key: &[u8; 16]) -> String {
    BASE64.encode(key)
}

/// Base64(SHA-1(key + GUID)), the value the server must echo back.
pub fn compute_accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Build the upgrade request for `path`.
///
/// `extra` headers are sent too, but never replace the upgrade headers.
pub(crate) fn upgrade_request(path: &str, client_key: &str, extra: &HeaderMap) -> HttpRequest {
    let mut request = HttpRequest::get(path);
    request.headers.extend(extra.iter());
    request.headers.add("Upgrade", "websocket");
    request.headers.add("Connection", "Upgrade");
    request.headers.add("Sec-WebSocket-Key", client_key);
    request.headers.add("Sec-WebSocket-Version", WEBSOCKET_VERSION);
    request
}

/// Check the server's answer to the upgrade request.
pub(crate) fn validate_response(response: &HttpResponse, client_key: &str) -> Result<()> {
    if response.status() != 101 {
        return Err(NetworkError::HandshakeRejected {
            status: response.status(),
        });
    }

    let expected = compute_accept_key(client_key);
    let actual = response.header("sec-websocket-accept");
    if actual != Some(expected.as_str()) {
        return Err(NetworkError::HandshakeAcceptMismatch {
            expected,
            actual: actual.map(str::to_string),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";

    #[test]
    fn test_rfc_sample_accept_key() {
        assert_eq!(compute_accept_key(SAMPLE_KEY), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn test_encode_key() {
        // RFC 6455 section 1.3 sample nonce.
        assert_eq!(encode_key(b"the sample nonce"), SAMPLE_KEY);
        assert_eq!(encode_key(&generate_key()).len(), 24);
        assert_ne!(generate_key(), generate_key());
    }

    #[test]
    fn test_upgrade_request_headers() {
        let mut extra = HeaderMap::new();
        extra.add("Origin", "https://example.com");
        extra.add("Connection", "keep-alive");

        let request = upgrade_request("/chat?room=1", SAMPLE_KEY, &extra);
        assert_eq!(request.path, "/chat?room=1");
        assert_eq!(request.headers.get("upgrade"), Some("websocket"));
        assert_eq!(request.headers.get("connection"), Some("Upgrade"));
        assert_eq!(request.headers.get("sec-websocket-key"), Some(SAMPLE_KEY));
        assert_eq!(request.headers.get("sec-websocket-version"), Some("13"));
        assert_eq!(request.headers.get("origin"), Some("https://example.com"));
    }

    fn response(raw: &str) -> HttpResponse {
        HttpResponse::parse(raw.as_bytes()).unwrap()
    }

    #[test]
    fn test_validate_accepts_matching_key() {
        let ok = response(
            "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nSec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\r\n",
        );
        assert!(validate_response(&ok, SAMPLE_KEY).is_ok());
    }

    #[test]
    fn test_validate_rejects_other_status() {
        let forbidden = response("HTTP/1.1 403 Forbidden\r\n\r\n");
        assert_eq!(
            validate_response(&forbidden, SAMPLE_KEY),
            Err(NetworkError::HandshakeRejected { status: 403 })
        );
    }

    #[test]
    fn test_validate_is_case_sensitive_and_requires_header() {
        let wrong_case = response(
            "HTTP/1.1 101 Switching Protocols\r\nSec-WebSocket-Accept: S3PPLMBITXAQ9KYGZZHZRBK+XOO=\r\n\r\n",
        );
        assert!(matches!(
            validate_response(&wrong_case, SAMPLE_KEY),
            Err(NetworkError::HandshakeAcceptMismatch { actual: Some(_), .. })
        ));

        let missing = response("HTTP/1.1 101 Switching Protocols\r\n\r\n");
        assert_eq!(
            validate_response(&missing, SAMPLE_KEY),
            Err(NetworkError::HandshakeAcceptMismatch {
                expected: "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=".to_string(),
                actual: None,
            })
        );
    }
}
