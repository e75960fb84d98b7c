//! HTTP response types and parsing.

use std::io::Read;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use super::headers::HeaderMap;
use crate::error::{NetworkError, Result};

/// Buffer size handed to the streaming Brotli decoder.
const BROTLI_BUFFER_SIZE: usize = 4096;

/// A complete HTTP response with a fully decoded body.
///
/// Responses are immutable once parsed.
#[derive(Clone, PartialEq, Eq)]
pub struct HttpResponse {
    status: u16,
    status_message: String,
    headers: HeaderMap,
    body: Bytes,
}

impl HttpResponse {
    /// Parse a raw HTTP/1.1 response.
    ///
    /// The body is de-chunked when `Transfer-Encoding: chunked` is present
    /// and then decompressed according to `Content-Encoding`.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let header_end = find(raw, b"\r\n\r\n").ok_or_else(|| {
            NetworkError::MalformedResponse("no CRLF CRLF header terminator found".to_string())
        })?;

        // Non-UTF-8 header bytes (obs-text) become U+FFFD.
        let decoded_head = String::from_utf8_lossy(&raw[..header_end]);
        let head: &str = &decoded_head;
        let mut body = raw[header_end + 4..].to_vec();

        let (status_line, header_block) = head.split_once("\r\n").unwrap_or((head, ""));
        let (status, status_message) = parse_status_line(status_line)?;
        let headers = HeaderMap::parse(header_block)?;

        if !body.is_empty() {
            if is_chunked(&headers) {
                body = decode_chunked(&body);
            }

            if let Some(encoding) = headers.get("content-encoding") {
                let encoding = encoding.trim();
                if !encoding.is_empty() {
                    body = decompress(encoding, &body)?;
                }
            }
        }

        Ok(Self {
            status,
            status_message,
            headers,
            body: Bytes::from(body),
        })
    }

    /// Get the HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Get the reason phrase from the status line.
    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    /// Check if the response indicates success (2xx status).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if the response is a client error (4xx status).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Check if the response is a server error (5xx status).
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// Get the response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a specific header value.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers.get(name)
    }

    /// Get the decoded body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Get the body as text, replacing invalid UTF-8 sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Return the response if the status code indicates success, or an error otherwise.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(NetworkError::HttpStatus {
                status: self.status,
            })
        }
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("status_message", &self.status_message)
            .field("headers", &self.headers.len())
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// Split `<version> SP <code> SP <message>` into code and message.
fn parse_status_line(line: &str) -> Result<(u16, String)> {
    let malformed = || NetworkError::MalformedStatusLine(format!("{line:?}"));

    let (_version, rest) = line.split_once(' ').ok_or_else(malformed)?;
    let (code, message) = rest.split_once(' ').ok_or_else(malformed)?;
    let status = code.parse::<u16>().map_err(|_| malformed())?;

    Ok((status, message.to_string()))
}

/// Whether the final transfer coding is `chunked`.
pub(crate) fn is_chunked(headers: &HeaderMap) -> bool {
    headers
        .get("transfer-encoding")
        .and_then(|te| te.rsplit(',').next())
        .is_some_and(|last| last.trim().eq_ignore_ascii_case("chunked"))
}

/// Reassemble a chunked body.
///
/// Decoding is lenient: a malformed size line or a truncated chunk ends
/// decoding and whatever was assembled so far is returned. Chunk extensions
/// and trailer headers are ignored.
pub fn decode_chunked(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut pos = 0;

    while pos < data.len() {
        let Some(line_len) = find(&data[pos..], b"\r\n") else {
            break;
        };
        let Some(size) = parse_chunk_size(&data[pos..pos + line_len]) else {
            break;
        };
        if size == 0 {
            break;
        }

        pos += line_len + 2;
        let Some(end) = pos.checked_add(size).filter(|&end| end <= data.len()) else {
            break;
        };
        out.extend_from_slice(&data[pos..end]);
        pos = end;

        if data[pos..].starts_with(b"\r\n") {
            pos += 2;
        }
    }

    out
}

/// Parse the hex size at the start of a chunk-size line.
fn parse_chunk_size(line: &[u8]) -> Option<usize> {
    let line = std::str::from_utf8(line).ok()?.trim_start();
    let digits = line
        .find(|c: char| !c.is_ascii_hexdigit())
        .map_or(line, |end| &line[..end]);
    if digits.is_empty() {
        return None;
    }
    usize::from_str_radix(digits, 16).ok()
}

/// Decode a body according to its `Content-Encoding`.
pub fn decompress(encoding: &str, data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 3);

    match encoding.to_ascii_lowercase().as_str() {
        "gzip" | "x-gzip" => {
            flate2::read::GzDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| NetworkError::Decompression(format!("gzip: {e}")))?;
        }
        "deflate" => {
            // RFC 9110 deflate is zlib-wrapped, but raw streams are common.
            if flate2::read::ZlibDecoder::new(data)
                .read_to_end(&mut out)
                .is_err()
            {
                out.clear();
                flate2::read::DeflateDecoder::new(data)
                    .read_to_end(&mut out)
                    .map_err(|e| NetworkError::Decompression(format!("deflate: {e}")))?;
            }
        }
        "br" => {
            brotli::Decompressor::new(data, BROTLI_BUFFER_SIZE)
                .read_to_end(&mut out)
                .map_err(|e| NetworkError::Decompression(format!("br: {e}")))?;
        }
        "identity" => out.extend_from_slice(data),
        other => return Err(NetworkError::UnsupportedEncoding(other.to_string())),
    }

    Ok(out)
}

/// Position of the first occurrence of `needle` in `haystack`.
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
