// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! # xhrtap - Request Primitive Interceptor
//!
//! Observes traffic made through an XMLHttpRequest-shaped request primitive
//! without changing what the primitive does. Every open, header set and send
//! is recorded and forwarded unchanged; progress and completion are reported
//! to consumer callbacks so an inspector can show requests as they happen.
//!
//! ## Features
//!
//! - Decorator, not monkey-patching: `InterceptedRequest` implements the same
//!   `HttpRequest` contract as the primitive it wraps
//! - Per-request records by default, single-flight mode on request
//! - Consumer callbacks cannot break the request: errors and panics are
//!   contained and reported on an error channel
//! - reqwest-backed host primitive for real traffic, scripted primitive for
//!   deterministic tests
//!
//! ## Example
//!
//! ```rust,no_run
//! use xhrtap::{HttpRequest, NetworkInterceptor, XhrClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let interceptor = NetworkInterceptor::new();
//!     interceptor.set_completion_callback(|record| {
//!         println!("{} {} -> {:?} in {}ms", record.method, record.url, record.response_code, record.duration);
//!         Ok(())
//!     });
//!     interceptor.enable()?;
//!
//!     let client = XhrClient::new()?;
//!     let request = interceptor.wrap(client.request());
//!     request.open("GET", "https://example.com")?;
//!     request.send(None)?;
//!     request.inner().wait_done().await;
//!
//!     interceptor.disable();
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod host;
pub mod network;

// Re-exports for convenience

// Errors
pub use error::{CallbackFailure, CallbackKind, Error, Result};

// Host primitives
pub use host::{
    HttpRequest, ProgressEvent, ProgressListener, ProgressTarget, ReadyState, ReadyStateListener,
    RequestBody, RequestId, RequestSnapshot, ResponsePayload, ResponseType,
};
pub use host::{ForwardedCall, ScriptedRequest};
pub use host::{XhrClient, XhrConfig, XmlHttpRequest};

// Network
pub use network::{InterceptedRequest, InterceptorConfig, NetworkInterceptor, NetworkRecord, RecordMode};
pub use network::{Clock, ManualClock, SystemClock};
pub use network::{CompletionCallback, ProgressCallback};

/// xhrtap version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
