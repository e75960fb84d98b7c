//! HTTP client implementation.

use std::sync::Arc;

use parking_lot::Mutex;
use skylark_core::logging::{span_names, targets};

use super::reader::StreamReader;
use super::request::HttpRequest;
use super::response::HttpResponse;
use crate::config::ClientConfig;
use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::transport::{TcpTransport, Transport};

/// A persistent HTTP/1.1 connection to one endpoint.
///
/// Requests are sent one at a time; each call to [`request`](Self::request)
/// writes the request and blocks until the whole response has been read.
/// The connection is kept alive between requests.
pub struct HttpClient {
    endpoint: Endpoint,
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    reader: Mutex<StreamReader>,
}

impl HttpClient {
    /// Connect to the host named by `url`.
    ///
    /// `https://` and `wss://` URLs get a TLS session.
    pub fn connect(url: &str, config: ClientConfig) -> Result<Self> {
        let endpoint = Endpoint::parse(url)?;
        let transport = TcpTransport::connect(&endpoint, &config)?;
        Ok(Self::with_transport(endpoint, Arc::new(transport), config))
    }

    /// Use an already connected transport.
    pub fn with_transport(
        endpoint: Endpoint,
        transport: Arc<dyn Transport>,
        config: ClientConfig,
    ) -> Self {
        let reader = StreamReader::with_chunk_size(transport.clone(), config.read_chunk_size);
        Self {
            endpoint,
            config,
            transport,
            reader: Mutex::new(reader),
        }
    }

    /// The endpoint this client is connected to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The connection options.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send a request and read the complete response.
    ///
    /// `Host`, `User-Agent`, `Accept`, `Accept-Encoding`, `Connection` and
    /// (for a non-empty body) `Content-Length` are filled in unless the
    /// request already sets them.
    pub fn request(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        let span = tracing::debug_span!(
            target: targets::HTTP,
            span_names::HTTP_REQUEST,
            method = %request.method,
            path = %request.path,
        );
        let _enter = span.enter();

        self.apply_default_headers(&mut request);

        let mut reader = self.reader.lock();
        self.transport.write_all(&request.to_bytes())?;
        let raw = reader.read_response()?;
        let response = HttpResponse::parse(&raw)?;

        tracing::debug!(
            target: targets::HTTP,
            status = response.status(),
            body_len = response.body().len(),
            "response received"
        );
        Ok(response)
    }

    /// Send a request whose response is only a head, leaving anything that
    /// follows it buffered.
    ///
    /// Used for the WebSocket upgrade, where the server may start sending
    /// frames right behind the `101` response.
    pub(crate) fn request_head(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        self.apply_default_headers(&mut request);

        let mut reader = self.reader.lock();
        self.transport.write_all(&request.to_bytes())?;
        let raw = reader.read_head()?;
        HttpResponse::parse(&raw)
    }

    /// Split the client into its transport and reader.
    ///
    /// Bytes the reader has buffered past the last response are kept.
    pub fn into_parts(self) -> (Arc<dyn Transport>, StreamReader) {
        (self.transport, self.reader.into_inner())
    }

    fn apply_default_headers(&self, request: &mut HttpRequest) {
        let headers = &mut request.headers;
        headers.add_if_absent("Host", self.endpoint.host_header());
        headers.add_if_absent("User-Agent", self.config.user_agent.as_str());
        headers.add_if_absent("Accept", "*/*");
        headers.add_if_absent("Accept-Encoding", "gzip, deflate, br");
        headers.add_if_absent("Connection", "keep-alive");
        if !request.body.is_empty() {
            headers.add_if_absent("Content-Length", request.body.len().to_string());
        }
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/// Connect to `url`, send one request and return the response.
///
/// When `request.path` is empty the path and query of `url` are used.
pub fn fetch(url: &str, mut request: HttpRequest) -> Result<HttpResponse> {
    let client = HttpClient::connect(url, ClientConfig::default())?;
    if request.path.is_empty() {
        request.path = client.endpoint().path().to_string();
    }
    request.headers.add_if_absent("Connection", "close");
    client.request(request)
}
