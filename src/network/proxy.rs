// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Intercepting wrapper around a request primitive

use std::sync::atomic::{AtomicU64, Ordering};

use super::interceptor::NetworkInterceptor;
use super::record::NetworkRecord;
use crate::error::Result;
use crate::host::{
    HttpRequest, ProgressListener, ProgressTarget, ReadyStateListener, RequestBody, RequestId,
    RequestSnapshot,
};

/// A request primitive observed by a [`NetworkInterceptor`]
///
/// Implements the same contract as the primitive it wraps. While the
/// interceptor is enabled each entry point records into the request's
/// record before forwarding; while disabled every call goes straight
/// through. Errors from the wrapped primitive are returned unchanged.
///
/// Dropping the wrapper before `send` discards the record of its last open.
/// A sent request stays tracked until the primitive reaches done or drops
/// its listeners.
pub struct InterceptedRequest<R> {
    inner: R,
    tracking: Tracking,
}

/// The wrapper's hold on its latest record
struct Tracking {
    interceptor: NetworkInterceptor,
    id: RequestId,
    /// Generation of the last recorded open, 0 if none
    opened: AtomicU64,
}

impl Drop for Tracking {
    fn drop(&mut self) {
        let generation = *self.opened.get_mut();
        if generation != 0 {
            self.interceptor.discard_unsent(self.id, generation);
        }
    }
}

impl<R: HttpRequest> InterceptedRequest<R> {
    /// Wrap `inner`
    pub fn new(inner: R, interceptor: NetworkInterceptor) -> Self {
        let id = inner.id();
        Self {
            inner,
            tracking: Tracking {
                interceptor,
                id,
                opened: AtomicU64::new(0),
            },
        }
    }

    /// The wrapped primitive
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Unwrap, keeping any listeners already attached
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// The interceptor observing this request
    pub fn interceptor(&self) -> &NetworkInterceptor {
        &self.tracking.interceptor
    }

    /// Record currently tracked for this request
    pub fn record(&self) -> Option<NetworkRecord> {
        self.interceptor().record_for(self.inner.id())
    }
}

impl<R: HttpRequest> HttpRequest for InterceptedRequest<R> {
    fn id(&self) -> RequestId {
        self.inner.id()
    }

    fn open(&self, method: &str, url: &str) -> Result<()> {
        let interceptor = self.interceptor();
        if !interceptor.is_enabled() {
            return self.inner.open(method, url);
        }

        let id = self.inner.id();
        let generation = interceptor.record_open(id, method, url);
        self.tracking.opened.store(generation, Ordering::Release);
        self.inner.open(method, url).map_err(|e| {
            interceptor.discard(id, generation);
            e
        })
    }

    fn set_request_header(&self, header: &str, value: &str) -> Result<()> {
        let interceptor = self.interceptor();
        if interceptor.is_enabled() {
            interceptor.record_header(self.inner.id(), header, value);
        }
        self.inner.set_request_header(header, value)
    }

    fn send(&self, body: Option<RequestBody>) -> Result<()> {
        let interceptor = self.interceptor();
        if interceptor.is_enabled() {
            let id = self.inner.id();
            if let Some(generation) = interceptor.record_body(id, body.as_ref()) {
                self.inner
                    .add_ready_state_listener(interceptor.ready_state_listener(id, generation));

                let progress = interceptor.progress_listener(id);
                self.inner
                    .add_progress_listener(ProgressTarget::Download, progress.clone());
                self.inner
                    .add_progress_listener(ProgressTarget::Upload, progress);

                interceptor.stamp_sent(id);
            }
        }
        self.inner.send(body)
    }

    fn add_ready_state_listener(&self, listener: ReadyStateListener) {
        self.inner.add_ready_state_listener(listener)
    }

    fn add_progress_listener(&self, target: ProgressTarget, listener: ProgressListener) {
        self.inner.add_progress_listener(target, listener)
    }

    fn snapshot(&self) -> RequestSnapshot {
        self.inner.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::host::{ForwardedCall, ScriptedRequest};

    #[test]
    fn test_calls_forwarded_unchanged() {
        let interceptor = NetworkInterceptor::new();
        interceptor.enable().unwrap();
        let host = ScriptedRequest::new();
        let request = interceptor.wrap(host.clone());

        request.open("PATCH", "/relative?q=1").unwrap();
        request.set_request_header("x-a", "1").unwrap();
        request.send(Some(vec![1u8, 2].into())).unwrap();

        assert_eq!(
            host.calls(),
            vec![
                ForwardedCall::Open {
                    method: "PATCH".into(),
                    url: "/relative?q=1".into()
                },
                ForwardedCall::SetRequestHeader {
                    header: "x-a".into(),
                    value: "1".into()
                },
                ForwardedCall::Send {
                    body: Some(RequestBody::from(vec![1u8, 2]))
                },
            ]
        );
        assert_eq!(request.id(), host.id());
    }

    #[test]
    fn test_inner_errors_propagate_after_recording() {
        let interceptor = NetworkInterceptor::new();
        interceptor.enable().unwrap();
        let host = ScriptedRequest::new();
        let request = interceptor.wrap(host.clone());

        request.open("GET", "https://example.com").unwrap();
        request.send(None).unwrap();

        let err = request.set_request_header("X-Late", "1").unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
        let record = request.record().unwrap();
        assert_eq!(record.request_header("X-Late"), Some("1"));
    }

    #[test]
    fn test_send_without_open_is_not_tracked() {
        let interceptor = NetworkInterceptor::new();
        let host = ScriptedRequest::new();
        host.open("GET", "https://example.com").unwrap();

        interceptor.enable().unwrap();
        let request = interceptor.wrap(host.clone());
        request.send(None).unwrap();

        assert_eq!(host.ready_state_listener_count(), 0);
        assert!(request.record().is_none());
    }

    #[test]
    fn test_rejected_open_leaves_no_record() {
        let interceptor = NetworkInterceptor::new();
        interceptor.enable().unwrap();
        let request = interceptor.wrap(crate::host::XhrClient::new().unwrap().request());

        for _ in 0..3 {
            assert!(request.open("GET", "not a url").is_err());
        }
        assert_eq!(interceptor.tracked_count(), 0);
        assert!(request.record().is_none());
    }

    #[test]
    fn test_rejected_reopen_keeps_nothing_stale() {
        let interceptor = NetworkInterceptor::new();
        interceptor.enable().unwrap();
        let request = interceptor.wrap(crate::host::XhrClient::new().unwrap().request());

        request.open("GET", "https://example.com/ok").unwrap();
        assert_eq!(interceptor.tracked_count(), 1);
        assert!(request.open("NOT A METHOD", "https://example.com").is_err());
        assert_eq!(interceptor.tracked_count(), 0);
    }

    #[test]
    fn test_dropped_before_send_releases_record() {
        let interceptor = NetworkInterceptor::new();
        interceptor.enable().unwrap();
        let host = ScriptedRequest::new();

        let request = interceptor.wrap(host.clone());
        request.open("GET", "https://example.com").unwrap();
        request.set_request_header("X-A", "1").unwrap();
        assert_eq!(interceptor.tracked_count(), 1);

        drop(request);
        assert_eq!(interceptor.tracked_count(), 0);
        assert!(interceptor.record_for(host.id()).is_none());
    }

    #[test]
    fn test_abandoned_in_flight_request_releases_record() {
        let interceptor = NetworkInterceptor::new();
        interceptor.enable().unwrap();
        let host = ScriptedRequest::new();

        let request = interceptor.wrap(host.clone());
        request.open("GET", "https://example.com").unwrap();
        request.send(None).unwrap();
        host.receive_headers(200, "X-A: 1");

        drop(request);
        assert_eq!(interceptor.tracked_count(), 1);
        drop(host);
        assert_eq!(interceptor.tracked_count(), 0);
    }

    #[test]
    fn test_sent_request_outlives_wrapper() {
        let interceptor = NetworkInterceptor::new();
        let done = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = done.clone();
        interceptor.set_completion_callback(move |record| {
            sink.lock().push(record.url.clone());
            Ok(())
        });
        interceptor.enable().unwrap();
        let host = ScriptedRequest::new();

        let request = interceptor.wrap(host.clone());
        request.open("GET", "https://example.com/kept").unwrap();
        request.send(None).unwrap();
        drop(request);

        host.complete(None);
        assert_eq!(*done.lock(), vec!["https://example.com/kept".to_string()]);
        assert_eq!(interceptor.tracked_count(), 0);
    }

    #[test]
    fn test_into_inner() {
        let interceptor = NetworkInterceptor::new();
        let host = ScriptedRequest::new();
        let id = host.id();
        let request = interceptor.wrap(host);
        assert!(!request.interceptor().is_enabled());
        assert_eq!(request.into_inner().id(), id);
    }
}
