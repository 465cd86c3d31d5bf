// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Network interceptor for observing a request primitive
//!
//! A `NetworkInterceptor` is an explicit context: its own enabled flag,
//! callbacks, record store and clock. Requests are observed by wrapping
//! them with [`NetworkInterceptor::wrap`]; the wrapper records each
//! lifecycle phase and forwards every call unchanged.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use super::clock::{Clock, SystemClock};
use super::config::{truncate_body, InterceptorConfig};
use super::headers::{parse_raw_headers, strip_content_type};
use super::proxy::InterceptedRequest;
use super::record::NetworkRecord;
use super::store::{RecordMode, RecordStore};
use crate::error::{CallbackFailure, CallbackKind, Error, Result};
use crate::host::{
    HttpRequest, ProgressEvent, ProgressListener, ReadyState, ReadyStateListener, RequestBody,
    RequestId, RequestSnapshot, ResponseType,
};

/// Progress callback: (bytes transferred, bytes remaining)
pub type ProgressCallback = Arc<dyn Fn(u64, u64) -> anyhow::Result<()> + Send + Sync>;

/// Completion callback, invoked once per completed request
pub type CompletionCallback = Arc<dyn Fn(&NetworkRecord) -> anyhow::Result<()> + Send + Sync>;

/// Interceptor for a request primitive
#[derive(Clone)]
pub struct NetworkInterceptor {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    config: InterceptorConfig,
    clock: Arc<dyn Clock>,
    enabled: AtomicBool,
    on_progress: RwLock<Option<ProgressCallback>>,
    on_complete: RwLock<Option<CompletionCallback>>,
    store: RecordStore,
    errors_tx: mpsc::UnboundedSender<CallbackFailure>,
    errors_rx: Mutex<Option<mpsc::UnboundedReceiver<CallbackFailure>>>,
}

impl Default for NetworkInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkInterceptor {
    /// Create a disabled interceptor with default configuration
    pub fn new() -> Self {
        Self::with_config(InterceptorConfig::default())
    }

    /// Create a disabled interceptor
    pub fn with_config(config: InterceptorConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a disabled interceptor timed by `clock`
    pub fn with_clock(config: InterceptorConfig, clock: Arc<dyn Clock>) -> Self {
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                store: RecordStore::new(config.mode),
                config,
                clock,
                enabled: AtomicBool::new(false),
                on_progress: RwLock::new(None),
                on_complete: RwLock::new(None),
                errors_tx,
                errors_rx: Mutex::new(Some(errors_rx)),
            }),
        }
    }

    /// Register the progress callback, replacing any previous one
    pub fn set_progress_callback<F>(&self, callback: F)
    where
        F: Fn(u64, u64) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        *self.inner.on_progress.write() = Some(Arc::new(callback));
    }

    /// Register the completion callback, replacing any previous one
    pub fn set_completion_callback<F>(&self, callback: F)
    where
        F: Fn(&NetworkRecord) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        *self.inner.on_complete.write() = Some(Arc::new(callback));
    }

    /// Start observing wrapped requests
    pub fn enable(&self) -> Result<()> {
        self.inner
            .enabled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| Error::AlreadyEnabled)?;

        tracing::info!(mode = ?self.inner.config.mode, "Network interception enabled");
        Ok(())
    }

    /// Stop observing. Wrapped requests become plain pass-throughs, both
    /// callbacks are dropped and tracked records are discarded. Listeners
    /// already attached to in-flight requests stay attached but do nothing.
    pub fn disable(&self) {
        let was_enabled = self.inner.enabled.swap(false, Ordering::SeqCst);
        *self.inner.on_progress.write() = None;
        *self.inner.on_complete.write() = None;
        self.inner.store.clear();

        if was_enabled {
            tracing::info!("Network interception disabled");
        }
    }

    /// Whether interception is active
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Wrap a request primitive
    pub fn wrap<R: HttpRequest>(&self, request: R) -> InterceptedRequest<R> {
        InterceptedRequest::new(request, self.clone())
    }

    /// Record keying in use
    pub fn mode(&self) -> RecordMode {
        self.inner.store.mode()
    }

    /// The single current record (single-flight mode only)
    pub fn current_record(&self) -> Option<NetworkRecord> {
        match self.inner.store.mode() {
            RecordMode::SingleFlight => self.inner.store.current(),
            RecordMode::PerRequest => None,
        }
    }

    /// Record currently tracked for a request
    pub fn record_for(&self, id: RequestId) -> Option<NetworkRecord> {
        self.inner.store.get(id)
    }

    /// Number of requests with a live record
    pub fn tracked_count(&self) -> usize {
        self.inner.store.len()
    }

    /// Receiver for callback failures. Available once.
    pub fn take_error_receiver(&self) -> Option<mpsc::UnboundedReceiver<CallbackFailure>> {
        self.inner.errors_rx.lock().take()
    }

    /// Start a fresh record. Returns its generation.
    pub(crate) fn record_open(&self, id: RequestId, method: &str, url: &str) -> u64 {
        tracing::debug!(request = %id, method, url, "Request opened");
        self.inner.store.begin(id, NetworkRecord::new(method, url))
    }

    /// Forget the record of an open the primitive rejected
    pub(crate) fn discard(&self, id: RequestId, generation: u64) {
        if self.inner.store.discard(id, generation) {
            tracing::debug!(request = %id, "Open rejected, record dropped");
        }
    }

    /// Forget the record of an open that will never be sent
    pub(crate) fn discard_unsent(&self, id: RequestId, generation: u64) {
        if self.inner.store.discard_unsent(id, generation) {
            tracing::debug!(request = %id, "Request abandoned before send");
        }
    }

    pub(crate) fn record_header(&self, id: RequestId, header: &str, value: &str) {
        self.inner.store.update(id, None, |tracked| {
            tracked
                .record
                .request_headers
                .get_or_insert_with(Default::default)
                .insert(header.to_string(), value.to_string());
        });
    }

    /// Store the payload. Returns the generation of the record it landed in,
    /// or `None` if the request was never opened under interception.
    pub(crate) fn record_body(&self, id: RequestId, body: Option<&RequestBody>) -> Option<u64> {
        self.inner.store.update(id, None, |tracked| {
            tracked.record.request_body = body.cloned().unwrap_or_default();
            tracked.generation
        })
    }

    pub(crate) fn stamp_sent(&self, id: RequestId) {
        let now = self.inner.clock.now_ms();
        self.inner.store.stamp_sent(id, now);
        tracing::debug!(request = %id, "Request sent");
    }

    /// Listener driving the record of one send. Once the primitive lets go
    /// of it, a record that never reached done is evicted.
    pub(crate) fn ready_state_listener(&self, id: RequestId, generation: u64) -> ReadyStateListener {
        let eviction = Eviction {
            inner: Arc::downgrade(&self.inner),
            id,
            generation,
        };
        Arc::new(move |snapshot: &RequestSnapshot| {
            if let Some(inner) = eviction.upgrade() {
                inner.on_ready_state(eviction.id, eviction.generation, snapshot);
            }
        })
    }

    pub(crate) fn progress_listener(&self, id: RequestId) -> ProgressListener {
        let inner = Arc::downgrade(&self.inner);
        Arc::new(move |event: &ProgressEvent| {
            if let Some(inner) = Weak::upgrade(&inner) {
                inner.on_progress(id, event);
            }
        })
    }
}

/// Owned by a ready-state listener; removes the record it was driving when dropped
struct Eviction {
    inner: Weak<Inner>,
    id: RequestId,
    generation: u64,
}

impl Eviction {
    fn upgrade(&self) -> Option<Arc<Inner>> {
        self.inner.upgrade()
    }
}

impl Drop for Eviction {
    fn drop(&mut self) {
        if let Some(inner) = self.upgrade() {
            if inner.store.discard(self.id, self.generation) {
                tracing::debug!(request = %self.id, "Request dropped before done, record evicted");
            }
        }
    }
}

impl Inner {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Per-request records only accept events from the open they belong to
    fn generation_filter(&self, generation: u64) -> Option<u64> {
        match self.store.mode() {
            RecordMode::PerRequest => Some(generation),
            RecordMode::SingleFlight => None,
        }
    }

    fn on_ready_state(&self, id: RequestId, generation: u64, snapshot: &RequestSnapshot) {
        if !self.is_enabled() {
            return;
        }

        match snapshot.ready_state {
            ReadyState::HeadersReceived => self.on_headers_received(id, generation, snapshot),
            ReadyState::Done => self.on_done(id, generation, snapshot),
            _ => {}
        }
    }

    fn on_headers_received(&self, id: RequestId, generation: u64, snapshot: &RequestSnapshot) {
        let content_type = snapshot
            .response_header("Content-Type")
            .map(|value| strip_content_type(&value).to_string());
        let raw = snapshot.all_response_headers();
        let headers = (!raw.is_empty()).then(|| parse_raw_headers(raw));

        self.store
            .update(id, self.generation_filter(generation), |tracked| {
                if let Some(content_type) = content_type {
                    tracked.record.content_type = content_type;
                }
                if let Some(headers) = headers {
                    tracked.record.response_headers = Some(headers);
                }
            });
    }

    fn on_done(&self, id: RequestId, generation: u64, snapshot: &RequestSnapshot) {
        let now = self.clock.now_ms();
        let response_body = self.captured_body(snapshot);

        let finalize = |tracked: &mut super::store::Tracked| {
            let elapsed = tracked.sent_at.map(|sent| now - sent).unwrap_or(0);
            tracked.record.duration = elapsed.max(0) as u64;
            tracked.record.response_code = Some(snapshot.status);

            if let Some(body) = response_body {
                tracked.record.response_body = body;
            }
            if snapshot.has_error {
                tracked.record.request_body = snapshot
                    .error_payload
                    .clone()
                    .map(RequestBody::Text)
                    .unwrap_or_default();
            }
        };

        let Some(record) = self.store.complete(id, generation, finalize) else {
            return;
        };

        tracing::debug!(
            request = %id,
            method = %record.method,
            url = %record.url,
            status = snapshot.status,
            duration_ms = record.duration,
            error = snapshot.has_error,
            "Request completed"
        );

        let callback = self.on_complete.read().clone();
        if let Some(callback) = callback {
            self.invoke(CallbackKind::Completion, id, || callback(&record));
        }
    }

    /// Response text to store, if this response type is captured at all
    fn captured_body(&self, snapshot: &RequestSnapshot) -> Option<String> {
        if !self.config.capture_response_bodies {
            return None;
        }
        let payload = snapshot.response.as_ref().filter(|p| !p.is_empty())?;

        let mut body = match snapshot.response_type {
            ResponseType::Blob | ResponseType::Text => payload.to_text(),
            ResponseType::Default if self.config.capture_default_response_type => payload.to_text(),
            ResponseType::Default | ResponseType::ArrayBuffer | ResponseType::Json => return None,
        };
        if let Some(max) = self.config.max_body_size {
            truncate_body(&mut body, max);
        }
        Some(body)
    }

    fn on_progress(&self, id: RequestId, event: &ProgressEvent) {
        if !self.is_enabled() || !event.length_computable {
            return;
        }

        let callback = self.on_progress.read().clone();
        if let Some(callback) = callback {
            let (loaded, remaining) = (event.loaded, event.remaining());
            self.invoke(CallbackKind::Progress, id, || callback(loaded, remaining));
        }
    }

    /// Run a consumer callback, containing errors and panics
    fn invoke(&self, kind: CallbackKind, id: RequestId, f: impl FnOnce() -> anyhow::Result<()>) {
        let (message, panicked) = match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(())) => return,
            Ok(Err(e)) => (format!("{:#}", e), false),
            Err(payload) => (panic_message(payload.as_ref()), true),
        };

        tracing::warn!(request = %id, callback = %kind, panicked, error = %message, "Callback failed");
        let _ = self.errors_tx.send(CallbackFailure {
            kind,
            request: Some(id),
            message,
            panicked,
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
