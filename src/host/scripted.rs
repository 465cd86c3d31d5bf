// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Scripted request primitive
//!
//! Behaves like a request object whose network side is driven by hand:
//! the caller decides when headers arrive, how progress advances and how
//! the transfer ends. Every entry-point call is logged so pass-through can
//! be asserted.

use std::sync::Arc;

use parking_lot::Mutex;

use super::{
    HttpRequest, ProgressEvent, ProgressListener, ProgressTarget, ReadyState, ReadyStateListener,
    RequestBody, RequestId, RequestSnapshot, ResponsePayload, ResponseType,
};
use crate::error::{Error, Result};

/// An entry-point call that reached the primitive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardedCall {
    Open { method: String, url: String },
    SetRequestHeader { header: String, value: String },
    Send { body: Option<RequestBody> },
}

#[derive(Default)]
struct ScriptedState {
    ready_state: ReadyState,
    sent: bool,
    status: u16,
    raw_headers: String,
    response_type: ResponseType,
    response: Option<ResponsePayload>,
    has_error: bool,
    error_payload: Option<String>,
    calls: Vec<ForwardedCall>,
    ready_state_listeners: Vec<ReadyStateListener>,
    download_listeners: Vec<ProgressListener>,
    upload_listeners: Vec<ProgressListener>,
}

/// Request primitive with manually fired events
#[derive(Clone)]
pub struct ScriptedRequest {
    id: RequestId,
    state: Arc<Mutex<ScriptedState>>,
}

impl Default for ScriptedRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedRequest {
    /// Create a new unsent request
    pub fn new() -> Self {
        Self {
            id: RequestId::next(),
            state: Arc::new(Mutex::new(ScriptedState::default())),
        }
    }

    /// Set how the response payload is exposed
    pub fn set_response_type(&self, response_type: ResponseType) {
        self.state.lock().response_type = response_type;
    }

    /// Calls forwarded to this primitive so far
    pub fn calls(&self) -> Vec<ForwardedCall> {
        self.state.lock().calls.clone()
    }

    /// Current ready state
    pub fn ready_state(&self) -> ReadyState {
        self.state.lock().ready_state
    }

    /// Number of ready-state listeners attached
    pub fn ready_state_listener_count(&self) -> usize {
        self.state.lock().ready_state_listeners.len()
    }

    /// Number of progress listeners attached to `target`
    pub fn progress_listener_count(&self, target: ProgressTarget) -> usize {
        let state = self.state.lock();
        match target {
            ProgressTarget::Download => state.download_listeners.len(),
            ProgressTarget::Upload => state.upload_listeners.len(),
        }
    }

    /// Headers arrive from the server
    pub fn receive_headers(&self, status: u16, raw_headers: &str) {
        {
            let mut state = self.state.lock();
            state.status = status;
            state.raw_headers = raw_headers.to_string();
        }
        self.transition(ReadyState::HeadersReceived);
    }

    /// Fire a progress event on `target`
    pub fn progress(&self, target: ProgressTarget, event: ProgressEvent) {
        let listeners = {
            let state = self.state.lock();
            match target {
                ProgressTarget::Download => state.download_listeners.clone(),
                ProgressTarget::Upload => state.upload_listeners.clone(),
            }
        };

        for listener in listeners {
            listener(&event);
        }
    }

    /// The transfer finishes successfully
    pub fn complete(&self, response: Option<ResponsePayload>) {
        self.state.lock().response = response;
        self.transition(ReadyState::Loading);
        self.transition(ReadyState::Done);
    }

    /// The transfer fails with a transport error
    pub fn fail(&self, error_payload: impl Into<String>) {
        {
            let mut state = self.state.lock();
            state.status = 0;
            state.has_error = true;
            state.error_payload = Some(error_payload.into());
            state.response = None;
        }
        self.transition(ReadyState::Done);
    }

    fn transition(&self, ready_state: ReadyState) {
        let (listeners, snapshot) = {
            let mut state = self.state.lock();
            state.ready_state = ready_state;
            (state.ready_state_listeners.clone(), self.snapshot_locked(&state))
        };

        for listener in listeners {
            listener(&snapshot);
        }
    }

    fn snapshot_locked(&self, state: &ScriptedState) -> RequestSnapshot {
        RequestSnapshot {
            id: Some(self.id),
            ready_state: state.ready_state,
            status: state.status,
            raw_headers: state.raw_headers.clone(),
            response_type: state.response_type,
            response: state.response.clone(),
            has_error: state.has_error,
            error_payload: state.error_payload.clone(),
        }
    }
}

impl HttpRequest for ScriptedRequest {
    fn id(&self) -> RequestId {
        self.id
    }

    fn open(&self, method: &str, url: &str) -> Result<()> {
        {
            let mut state = self.state.lock();
            state.calls.push(ForwardedCall::Open {
                method: method.to_string(),
                url: url.to_string(),
            });
            state.sent = false;
            state.status = 0;
            state.raw_headers.clear();
            state.response = None;
            state.has_error = false;
            state.error_payload = None;
        }
        self.transition(ReadyState::Opened);
        Ok(())
    }

    fn set_request_header(&self, header: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(ForwardedCall::SetRequestHeader {
            header: header.to_string(),
            value: value.to_string(),
        });

        if state.ready_state != ReadyState::Opened || state.sent {
            return Err(Error::invalid_state("set request header", state.ready_state));
        }
        Ok(())
    }

    fn send(&self, body: Option<RequestBody>) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(ForwardedCall::Send { body });

        if state.ready_state != ReadyState::Opened || state.sent {
            return Err(Error::invalid_state("send", state.ready_state));
        }
        state.sent = true;
        Ok(())
    }

    fn add_ready_state_listener(&self, listener: ReadyStateListener) {
        self.state.lock().ready_state_listeners.push(listener);
    }

    fn add_progress_listener(&self, target: ProgressTarget, listener: ProgressListener) {
        let mut state = self.state.lock();
        match target {
            ProgressTarget::Download => state.download_listeners.push(listener),
            ProgressTarget::Upload => state.upload_listeners.push(listener),
        }
    }

    fn snapshot(&self) -> RequestSnapshot {
        let state = self.state.lock();
        self.snapshot_locked(&state)
    }
}
