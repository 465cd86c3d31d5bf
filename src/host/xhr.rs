// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! XMLHttpRequest-style primitive backed by reqwest
//!
//! `send()` spawns the transfer on the current tokio runtime; lifecycle and
//! progress listeners are dispatched from that task in the usual order.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use reqwest::{Client, Method};
use tokio::sync::Notify;
use url::Url;

use super::{
    HttpRequest, ProgressEvent, ProgressListener, ProgressTarget, ReadyState, ReadyStateListener,
    RequestBody, RequestId, RequestSnapshot, ResponsePayload, ResponseType,
};
use crate::error::{Error, Result};

/// Default user agent string
pub const DEFAULT_USER_AGENT: &str = concat!("xhrtap/", env!("CARGO_PKG_VERSION"));

/// Upper bound on the body buffer reserved from a server-declared Content-Length
const MAX_BODY_PREALLOC: u64 = 64 * 1024;

/// Client configuration for the reqwest host
#[derive(Debug, Clone)]
pub struct XhrConfig {
    /// User agent string
    pub user_agent: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Maximum redirects to follow
    pub max_redirects: usize,
    /// Proxy URL
    pub proxy: Option<String>,
}

impl Default for XhrConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            max_redirects: 10,
            proxy: None,
        }
    }
}

impl XhrConfig {
    /// Create a new config
    pub fn new() -> Self {
        Self::default()
    }

    /// Set user agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set redirect limit
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    /// Set proxy
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }
}

/// Factory for reqwest-backed request objects sharing one connection pool
#[derive(Clone)]
pub struct XhrClient {
    client: Client,
    config: XhrConfig,
}

impl XhrClient {
    /// Create a client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(XhrConfig::default())
    }

    /// Create a client with custom configuration
    pub fn with_config(config: XhrConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(Policy::limited(config.max_redirects));

        if let Some(ref proxy_url) = config.proxy {
            builder = builder.proxy(
                reqwest::Proxy::all(proxy_url)
                    .map_err(|e| Error::Config(format!("Invalid proxy URL: {}", e)))?,
            );
        }

        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    /// Create a new, unsent request object
    pub fn request(&self) -> XmlHttpRequest {
        XmlHttpRequest {
            id: RequestId::next(),
            client: self.client.clone(),
            shared: Arc::new(Shared::default()),
        }
    }

    /// Get client configuration
    pub fn config(&self) -> &XhrConfig {
        &self.config
    }
}

#[derive(Default)]
struct XhrState {
    ready_state: ReadyState,
    sent: bool,
    /// Bumped by every open; a transfer from an older generation stops dispatching
    generation: u64,
    method: Option<Method>,
    url: Option<Url>,
    headers: HeaderMap,
    status: u16,
    raw_headers: String,
    response_type: ResponseType,
    response: Option<ResponsePayload>,
    has_error: bool,
    error_payload: Option<String>,
    ready_state_listeners: Vec<ReadyStateListener>,
    download_listeners: Vec<ProgressListener>,
    upload_listeners: Vec<ProgressListener>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<XhrState>,
    done: Notify,
}

/// Request object driven by reqwest
#[derive(Clone)]
pub struct XmlHttpRequest {
    id: RequestId,
    client: Client,
    shared: Arc<Shared>,
}

impl XmlHttpRequest {
    /// Set how the response payload is exposed. Takes effect at done.
    pub fn set_response_type(&self, response_type: ResponseType) {
        self.shared.state.lock().response_type = response_type;
    }

    /// Current ready state
    pub fn ready_state(&self) -> ReadyState {
        self.shared.state.lock().ready_state
    }

    /// Current HTTP status
    pub fn status(&self) -> u16 {
        self.shared.state.lock().status
    }

    /// Wait until the request reaches `Done` and return its final state
    pub async fn wait_done(&self) -> RequestSnapshot {
        loop {
            let notified = self.shared.done.notified();
            {
                let state = self.shared.state.lock();
                if state.ready_state == ReadyState::Done {
                    return snapshot_of(self.id, &state);
                }
            }
            notified.await;
        }
    }
}

impl HttpRequest for XmlHttpRequest {
    fn id(&self) -> RequestId {
        self.id
    }

    fn open(&self, method: &str, url: &str) -> Result<()> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| Error::InvalidMethod(method.to_string()))?;
        let url = Url::parse(url)?;

        let generation = {
            let mut state = self.shared.state.lock();
            state.generation += 1;
            state.sent = false;
            state.method = Some(method);
            state.url = Some(url);
            state.headers.clear();
            state.status = 0;
            state.raw_headers.clear();
            state.response = None;
            state.has_error = false;
            state.error_payload = None;
            state.generation
        };

        transition(self.id, &self.shared, generation, ReadyState::Opened);
        Ok(())
    }

    fn set_request_header(&self, header: &str, value: &str) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.ready_state != ReadyState::Opened || state.sent {
            return Err(Error::invalid_state("set request header", state.ready_state));
        }

        let name = HeaderName::from_bytes(header.as_bytes())
            .map_err(|e| Error::invalid_header(header, e))?;
        let value = HeaderValue::from_str(value).map_err(|e| Error::invalid_header(header, e))?;

        state.headers.append(name, value);
        Ok(())
    }

    fn send(&self, body: Option<RequestBody>) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?;

        let (builder, generation) = {
            let mut state = self.shared.state.lock();
            if state.ready_state != ReadyState::Opened || state.sent {
                return Err(Error::invalid_state("send", state.ready_state));
            }
            let (Some(method), Some(url)) = (state.method.clone(), state.url.clone()) else {
                return Err(Error::invalid_state("send", state.ready_state));
            };
            state.sent = true;

            let mut builder = self
                .client
                .request(method, url)
                .headers(state.headers.clone());
            if let Some(ref body) = body {
                builder = builder.body(body.to_bytes());
            }
            (builder, state.generation)
        };

        let upload_len = body.as_ref().map(|b| b.len() as u64).unwrap_or(0);
        let id = self.id;
        let shared = self.shared.clone();

        tracing::debug!(request = %id, "Dispatching request");
        runtime.spawn(drive(id, shared, builder, upload_len, generation));
        Ok(())
    }

    fn add_ready_state_listener(&self, listener: ReadyStateListener) {
        self.shared.state.lock().ready_state_listeners.push(listener);
    }

    fn add_progress_listener(&self, target: ProgressTarget, listener: ProgressListener) {
        let mut state = self.shared.state.lock();
        match target {
            ProgressTarget::Download => state.download_listeners.push(listener),
            ProgressTarget::Upload => state.upload_listeners.push(listener),
        }
    }

    fn snapshot(&self) -> RequestSnapshot {
        let state = self.shared.state.lock();
        snapshot_of(self.id, &state)
    }
}

/// Run one transfer to completion, dispatching events as it goes
async fn drive(
    id: RequestId,
    shared: Arc<Shared>,
    builder: reqwest::RequestBuilder,
    upload_len: u64,
    generation: u64,
) {
    if upload_len > 0 {
        progress(&shared, generation, ProgressTarget::Upload, ProgressEvent::computable(upload_len, upload_len));
    }

    let response = match builder.send().await {
        Ok(response) => response,
        Err(e) => {
            fail(id, &shared, generation, e.to_string());
            return;
        }
    };

    let total = response.content_length();
    {
        let mut state = shared.state.lock();
        if state.generation != generation {
            return;
        }
        state.status = response.status().as_u16();
        state.raw_headers = format_raw_headers(response.headers());
    }
    transition(id, &shared, generation, ReadyState::HeadersReceived);

    let mut body = Vec::with_capacity(body_prealloc(total));
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) => {
                if body.is_empty() {
                    transition(id, &shared, generation, ReadyState::Loading);
                }
                body.extend_from_slice(&chunk);
                let loaded = body.len() as u64;
                let event = match total {
                    Some(total) => ProgressEvent::computable(loaded, total),
                    None => ProgressEvent::indeterminate(loaded),
                };
                progress(&shared, generation, ProgressTarget::Download, event);
            }
            Err(e) => {
                fail(id, &shared, generation, e.to_string());
                return;
            }
        }
    }

    {
        let mut state = shared.state.lock();
        if state.generation != generation {
            return;
        }
        state.response = Some(if state.response_type.is_binary() {
            ResponsePayload::Binary(body.into())
        } else {
            ResponsePayload::Text(String::from_utf8_lossy(&body).into_owned())
        });
    }
    transition(id, &shared, generation, ReadyState::Done);
}

fn fail(id: RequestId, shared: &Shared, generation: u64, message: String) {
    tracing::debug!(request = %id, error = %message, "Request failed");
    {
        let mut state = shared.state.lock();
        if state.generation != generation {
            return;
        }
        state.status = 0;
        state.has_error = true;
        state.error_payload = Some(message);
        state.response = None;
    }
    transition(id, shared, generation, ReadyState::Done);
}

fn transition(id: RequestId, shared: &Shared, generation: u64, ready_state: ReadyState) {
    let (listeners, snapshot) = {
        let mut state = shared.state.lock();
        if state.generation != generation {
            return;
        }
        state.ready_state = ready_state;
        (state.ready_state_listeners.clone(), snapshot_of(id, &state))
    };

    for listener in listeners {
        listener(&snapshot);
    }

    if ready_state == ReadyState::Done {
        shared.done.notify_waiters();
    }
}

fn progress(shared: &Shared, generation: u64, target: ProgressTarget, event: ProgressEvent) {
    let listeners = {
        let state = shared.state.lock();
        if state.generation != generation {
            return;
        }
        match target {
            ProgressTarget::Download => state.download_listeners.clone(),
            ProgressTarget::Upload => state.upload_listeners.clone(),
        }
    };

    for listener in listeners {
        listener(&event);
    }
}

fn snapshot_of(id: RequestId, state: &XhrState) -> RequestSnapshot {
    RequestSnapshot {
        id: Some(id),
        ready_state: state.ready_state,
        status: state.status,
        raw_headers: state.raw_headers.clone(),
        response_type: state.response_type,
        response: state.response.clone(),
        has_error: state.has_error,
        error_payload: state.error_payload.clone(),
    }
}

/// Bytes to reserve for a body; the declared length is untrusted
fn body_prealloc(content_length: Option<u64>) -> usize {
    content_length.map_or(0, |len| len.min(MAX_BODY_PREALLOC) as usize)
}

/// Render a header map as a CRLF-separated `name: value` block
fn format_raw_headers(headers: &HeaderMap) -> String {
    headers
        .iter()
        .map(|(name, value)| format!("{}: {}", name, String::from_utf8_lossy(value.as_bytes())))
        .collect::<Vec<_>>()
        .join("\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_client_creation() {
        let client = XhrClient::new().unwrap();
        assert_eq!(client.config().user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_open_rejects_bad_input() {
        let request = XhrClient::new().unwrap().request();
        assert!(matches!(request.open("GET", "not a url"), Err(Error::Url(_))));
        assert!(matches!(
            request.open("GE T", "https://example.com"),
            Err(Error::InvalidMethod(_))
        ));
        assert_eq!(request.ready_state(), ReadyState::Unsent);
    }

    #[test]
    fn test_send_outside_runtime() {
        let request = XhrClient::new().unwrap().request();
        request.open("GET", "https://example.com").unwrap();
        assert!(matches!(request.send(None), Err(Error::NoRuntime)));
    }

    #[test]
    fn test_header_after_open_only() {
        let request = XhrClient::new().unwrap().request();
        assert!(request.set_request_header("X-Test", "1").is_err());

        request.open("GET", "https://example.com").unwrap();
        request.set_request_header("X-Test", "1").unwrap();
        assert!(matches!(
            request.set_request_header("bad header", "1"),
            Err(Error::InvalidHeader { .. })
        ));
    }

    #[tokio::test]
    async fn test_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submit"))
            .and(header("x-token", "abc"))
            .and(body_string("name=kalle"))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("x-served-by", "mock")
                    .set_body_string("created"),
            )
            .mount(&server)
            .await;

        let request = XhrClient::new().unwrap().request();
        let states = Arc::new(Mutex::new(Vec::new()));
        let states_clone = states.clone();
        request.add_ready_state_listener(Arc::new(move |snapshot| {
            states_clone.lock().push(snapshot.ready_state);
        }));

        let uploads = Arc::new(Mutex::new(Vec::new()));
        let uploads_clone = uploads.clone();
        request.add_progress_listener(
            ProgressTarget::Upload,
            Arc::new(move |event| uploads_clone.lock().push(*event)),
        );

        request
            .open("POST", &format!("{}/submit", server.uri()))
            .unwrap();
        request.set_request_header("X-Token", "abc").unwrap();
        request.send(Some("name=kalle".into())).unwrap();

        let snapshot = request.wait_done().await;
        assert_eq!(snapshot.status, 201);
        assert!(!snapshot.has_error);
        assert_eq!(snapshot.response_header("X-Served-By").as_deref(), Some("mock"));
        assert_eq!(snapshot.response, Some(ResponsePayload::Text("created".into())));

        let states = states.lock().clone();
        assert_eq!(states.first(), Some(&ReadyState::Opened));
        assert!(states.contains(&ReadyState::HeadersReceived));
        assert_eq!(states.last(), Some(&ReadyState::Done));
        assert_eq!(*uploads.lock(), vec![ProgressEvent::computable(10, 10)]);
    }

    #[tokio::test]
    async fn test_blob_response_is_binary() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blob"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let request = XhrClient::new().unwrap().request();
        request.set_response_type(ResponseType::Blob);
        request.open("GET", &format!("{}/blob", server.uri())).unwrap();
        request.send(None).unwrap();

        let snapshot = request.wait_done().await;
        assert_eq!(
            snapshot.response,
            Some(ResponsePayload::Binary(bytes::Bytes::from_static(&[1, 2, 3])))
        );
    }

    #[tokio::test]
    async fn test_transport_error_reaches_done() {
        let request = XhrClient::new().unwrap().request();
        request.open("GET", "http://127.0.0.1:1/").unwrap();
        request.send(None).unwrap();

        let snapshot = request.wait_done().await;
        assert!(snapshot.has_error);
        assert_eq!(snapshot.status, 0);
        assert!(snapshot.error_payload.is_some());
    }

    #[tokio::test]
    async fn test_intercepted_round_trip() {
        use crate::network::NetworkInterceptor;

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/7"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"{"id":7}"#, "application/json; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let interceptor = NetworkInterceptor::new();
        let records = Arc::new(Mutex::new(Vec::new()));
        let records_clone = records.clone();
        interceptor.set_completion_callback(move |record| {
            records_clone.lock().push(record.clone());
            Ok(())
        });
        let progress = Arc::new(Mutex::new(Vec::new()));
        let progress_clone = progress.clone();
        interceptor.set_progress_callback(move |loaded, remaining| {
            progress_clone.lock().push((loaded, remaining));
            Ok(())
        });
        interceptor.enable().unwrap();

        let request = interceptor.wrap(XhrClient::new().unwrap().request());
        request.inner().set_response_type(ResponseType::Text);
        let url = format!("{}/users/7", server.uri());
        request.open("GET", &url).unwrap();
        request.set_request_header("Accept", "application/json").unwrap();
        request.send(None).unwrap();
        request.inner().wait_done().await;

        let records = records.lock();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.url, url);
        assert_eq!(record.response_code, Some(200));
        assert_eq!(record.content_type, "application/json");
        assert!(record.response_header("content-type").unwrap().starts_with(' '));
        assert_eq!(record.response_body, r#"{"id":7}"#);
        assert_eq!(record.request_header("Accept"), Some("application/json"));
        assert_eq!(progress.lock().last(), Some(&(8, 0)));
    }

    #[test]
    fn test_body_prealloc_is_capped() {
        assert_eq!(body_prealloc(None), 0);
        assert_eq!(body_prealloc(Some(512)), 512);
        assert_eq!(body_prealloc(Some(u64::MAX)), MAX_BODY_PREALLOC as usize);
    }

    #[tokio::test]
    async fn test_oversized_content_length_does_not_abort() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100000000000000\r\n\r\nabc")
                .await;
            let _ = socket.shutdown().await;
        });

        let request = XhrClient::new().unwrap().request();
        request.open("GET", &format!("http://{}/", addr)).unwrap();
        request.send(None).unwrap();

        let snapshot = request.wait_done().await;
        assert_eq!(snapshot.ready_state, ReadyState::Done);
        // The body ends far short of the declared length
        assert!(snapshot.has_error);
    }

    #[test]
    fn test_format_raw_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("text/plain"));
        headers.append("x-foo", HeaderValue::from_static("bar"));

        let raw = format_raw_headers(&headers);
        assert!(raw.contains("content-type: text/plain"));
        assert!(raw.contains("\r\nx-foo: bar") || raw.starts_with("x-foo: bar"));
    }
}
