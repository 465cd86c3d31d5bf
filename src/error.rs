// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Error types for xhrtap
//!
//! Interception itself never turns a transport failure into an `Error`:
//! those end up inside the captured record. The variants here cover misuse
//! of the interceptor, misuse of a host request primitive, and failures of
//! the reqwest-backed host.

use std::fmt;

use thiserror::Error;

use crate::host::{ReadyState, RequestId};

/// Result type alias for xhrtap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for xhrtap
#[derive(Error, Debug)]
pub enum Error {
    /// `enable()` called on an interceptor that is already enabled
    #[error("Interception is already enabled")]
    AlreadyEnabled,

    /// Host primitive used out of order (e.g. send before open)
    #[error("Cannot {operation} while request is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: ReadyState,
    },

    /// Header name or value rejected by the host
    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    /// HTTP method rejected by the host
    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// HTTP client failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// `send()` on the reqwest host outside a tokio runtime
    #[error("No tokio runtime available to drive the request")]
    NoRuntime,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Consumer callback failed
    #[error("{0}")]
    Callback(CallbackFailure),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Which consumer callback failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackKind {
    /// Progress callback
    Progress,
    /// Completion callback
    Completion,
}

impl fmt::Display for CallbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackKind::Progress => write!(f, "progress"),
            CallbackKind::Completion => write!(f, "completion"),
        }
    }
}

/// A consumer callback that returned an error or panicked
#[derive(Debug, Clone)]
pub struct CallbackFailure {
    pub kind: CallbackKind,
    /// Request being observed when the callback failed
    pub request: Option<RequestId>,
    pub message: String,
    /// Whether the callback panicked rather than returning `Err`
    pub panicked: bool,
}

impl fmt::Display for CallbackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let how = if self.panicked { "panicked" } else { "failed" };
        match self.request {
            Some(id) => write!(f, "{} callback {} for request {}: {}", self.kind, how, id, self.message),
            None => write!(f, "{} callback {}: {}", self.kind, how, self.message),
        }
    }
}

impl Error {
    /// Create an invalid state error
    pub fn invalid_state(operation: &'static str, state: ReadyState) -> Self {
        Error::InvalidState { operation, state }
    }

    /// Create an invalid header error
    pub fn invalid_header(name: impl Into<String>, reason: impl fmt::Display) -> Self {
        Error::InvalidHeader {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    /// Check if this is a caller precondition violation
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Error::AlreadyEnabled
                | Error::InvalidState { .. }
                | Error::InvalidHeader { .. }
                | Error::InvalidMethod(_)
                | Error::Url(_)
                | Error::NoRuntime
        )
    }

    /// Check if this came from the transport layer
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Http(_))
    }
}

impl From<CallbackFailure> for Error {
    fn from(failure: CallbackFailure) -> Self {
        Error::Callback(failure)
    }
}
