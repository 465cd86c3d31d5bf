// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Host request primitive
//!
//! The contract of a callback-driven, XMLHttpRequest-shaped request object:
//! three lifecycle entry points (open, set-header, send), listener
//! registration for ready-state changes and transfer progress, and a
//! read-only view of the object's current state.
//!
//! Two hosts ship with the crate: [`XmlHttpRequest`] drives real traffic
//! through reqwest, [`ScriptedRequest`] fires every event by hand.

mod scripted;
mod xhr;

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Result;

pub use scripted::{ForwardedCall, ScriptedRequest};
pub use xhr::{XhrClient, XhrConfig, XmlHttpRequest};

/// Ready-state change listener
pub type ReadyStateListener = Arc<dyn Fn(&RequestSnapshot) + Send + Sync>;

/// Progress event listener
pub type ProgressListener = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Request lifecycle primitive
///
/// Implementations dispatch listeners themselves; the order of events for one
/// request is always open, header sets, send, progress, headers received, done.
pub trait HttpRequest: Send + Sync {
    /// Identity of this request object
    fn id(&self) -> RequestId;

    /// Initialize the request
    fn open(&self, method: &str, url: &str) -> Result<()>;

    /// Set a request header. Only valid between open and send.
    fn set_request_header(&self, header: &str, value: &str) -> Result<()>;

    /// Start the transfer
    fn send(&self, body: Option<RequestBody>) -> Result<()>;

    /// Listen for ready-state transitions
    fn add_ready_state_listener(&self, listener: ReadyStateListener);

    /// Listen for progress on the download side or the upload sub-object
    fn add_progress_listener(&self, target: ProgressTarget, listener: ProgressListener);

    /// Current observable state
    fn snapshot(&self) -> RequestSnapshot;
}

impl<T: HttpRequest + ?Sized> HttpRequest for Arc<T> {
    fn id(&self) -> RequestId {
        (**self).id()
    }

    fn open(&self, method: &str, url: &str) -> Result<()> {
        (**self).open(method, url)
    }

    fn set_request_header(&self, header: &str, value: &str) -> Result<()> {
        (**self).set_request_header(header, value)
    }

    fn send(&self, body: Option<RequestBody>) -> Result<()> {
        (**self).send(body)
    }

    fn add_ready_state_listener(&self, listener: ReadyStateListener) {
        (**self).add_ready_state_listener(listener)
    }

    fn add_progress_listener(&self, target: ProgressTarget, listener: ProgressListener) {
        (**self).add_progress_listener(target, listener)
    }

    fn snapshot(&self) -> RequestSnapshot {
        (**self).snapshot()
    }
}

/// Process-unique identity of a request object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(u64);

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

impl RequestId {
    /// Allocate a fresh identity
    pub fn next() -> Self {
        RequestId(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap a raw identity
    pub fn from_raw(raw: u64) -> Self {
        RequestId(raw)
    }

    /// Raw identity value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req_{}", self.0)
    }
}

/// Ready state of a request object
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum ReadyState {
    #[default]
    Unsent,
    Opened,
    HeadersReceived,
    Loading,
    Done,
}

/// Which object a progress listener is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgressTarget {
    /// The request object itself (response download)
    Download,
    /// The upload sub-object (request body upload)
    Upload,
}

/// Transfer progress notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressEvent {
    /// Whether `total` is known
    pub length_computable: bool,
    /// Bytes transferred so far
    pub loaded: u64,
    /// Total bytes expected (meaningless unless `length_computable`)
    pub total: u64,
}

impl ProgressEvent {
    /// Progress with a known total
    pub fn computable(loaded: u64, total: u64) -> Self {
        Self {
            length_computable: true,
            loaded,
            total,
        }
    }

    /// Progress with an unknown total
    pub fn indeterminate(loaded: u64) -> Self {
        Self {
            length_computable: false,
            loaded,
            total: 0,
        }
    }

    /// Bytes still to transfer
    pub fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.loaded)
    }
}

/// How the host exposes the response payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// `""`, text in practice
    #[default]
    #[serde(rename = "")]
    Default,
    Text,
    Blob,
    ArrayBuffer,
    Json,
}

impl ResponseType {
    /// Host-level name
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Default => "",
            ResponseType::Text => "text",
            ResponseType::Blob => "blob",
            ResponseType::ArrayBuffer => "arraybuffer",
            ResponseType::Json => "json",
        }
    }

    /// Whether the host hands back bytes for this type
    pub fn is_binary(&self) -> bool {
        matches!(self, ResponseType::Blob | ResponseType::ArrayBuffer)
    }
}

impl FromStr for ResponseType {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" => Ok(ResponseType::Default),
            "text" => Ok(ResponseType::Text),
            "blob" => Ok(ResponseType::Blob),
            "arraybuffer" => Ok(ResponseType::ArrayBuffer),
            "json" => Ok(ResponseType::Json),
            other => Err(crate::error::Error::Config(format!(
                "Unknown response type: {}",
                other
            ))),
        }
    }
}

/// Request payload passed to `send`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestBody {
    /// No payload; serialized as the `""` sentinel
    #[default]
    Empty,
    Text(String),
    Binary(Bytes),
}

impl RequestBody {
    /// Whether there is no payload at all
    pub fn is_empty(&self) -> bool {
        match self {
            RequestBody::Empty => true,
            RequestBody::Text(text) => text.is_empty(),
            RequestBody::Binary(bytes) => bytes.is_empty(),
        }
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        match self {
            RequestBody::Empty => 0,
            RequestBody::Text(text) => text.len(),
            RequestBody::Binary(bytes) => bytes.len(),
        }
    }

    /// Payload as bytes for the wire
    pub fn to_bytes(&self) -> Bytes {
        match self {
            RequestBody::Empty => Bytes::new(),
            RequestBody::Text(text) => Bytes::copy_from_slice(text.as_bytes()),
            RequestBody::Binary(bytes) => bytes.clone(),
        }
    }

    /// Text view, if this is a text payload
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RequestBody::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::Text(text)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        RequestBody::Text(text.to_string())
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        RequestBody::Binary(bytes)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        RequestBody::Binary(Bytes::from(bytes))
    }
}

impl Serialize for RequestBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            RequestBody::Empty => serializer.serialize_str(""),
            RequestBody::Text(text) => serializer.serialize_str(text),
            RequestBody::Binary(bytes) => serializer
                .serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes)),
        }
    }
}

impl<'de> Deserialize<'de> for RequestBody {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        if text.is_empty() {
            Ok(RequestBody::Empty)
        } else {
            Ok(RequestBody::Text(text))
        }
    }
}

/// Response payload as the host exposes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePayload {
    Text(String),
    Binary(Bytes),
}

impl ResponsePayload {
    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        match self {
            ResponsePayload::Text(text) => text.is_empty(),
            ResponsePayload::Binary(bytes) => bytes.is_empty(),
        }
    }

    /// Decode to text. Invalid UTF-8 is replaced, never rejected.
    pub fn to_text(&self) -> String {
        match self {
            ResponsePayload::Text(text) => text.clone(),
            ResponsePayload::Binary(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

/// Read-only view of a request object, handed to ready-state listeners
#[derive(Debug, Clone, Default)]
pub struct RequestSnapshot {
    pub id: Option<RequestId>,
    pub ready_state: ReadyState,
    /// HTTP status, 0 until headers arrive or on transport error
    pub status: u16,
    /// Raw header block, `name: value` lines joined by CRLF
    pub raw_headers: String,
    pub response_type: ResponseType,
    pub response: Option<ResponsePayload>,
    /// Transport error flag
    pub has_error: bool,
    /// Error content recorded by the host when `has_error` is set
    pub error_payload: Option<String>,
}

impl RequestSnapshot {
    /// Header value by case-insensitive name; repeated headers joined by ", "
    pub fn response_header(&self, name: &str) -> Option<String> {
        let values: Vec<&str> = self
            .raw_headers
            .split("\r\n")
            .filter_map(|line| line.split_once(':'))
            .filter(|(key, _)| key.trim().eq_ignore_ascii_case(name))
            .map(|(_, value)| value.trim())
            .collect();

        if values.is_empty() {
            None
        } else {
            Some(values.join(", "))
        }
    }

    /// The raw header block
    pub fn all_response_headers(&self) -> &str {
        &self.raw_headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique() {
        let a = RequestId::next();
        let b = RequestId::next();
        assert_ne!(a, b);
        assert_eq!(RequestId::from_raw(3).to_string(), "req_3");
    }

    #[test]
    fn test_progress_remaining_saturates() {
        assert_eq!(ProgressEvent::computable(40, 100).remaining(), 60);
        assert_eq!(ProgressEvent::computable(120, 100).remaining(), 0);
        assert!(!ProgressEvent::indeterminate(5).length_computable);
    }

    #[test]
    fn test_response_type_names() {
        assert_eq!("blob".parse::<ResponseType>().unwrap(), ResponseType::Blob);
        assert_eq!("".parse::<ResponseType>().unwrap(), ResponseType::Default);
        assert!("document".parse::<ResponseType>().is_err());
        assert_eq!(ResponseType::ArrayBuffer.as_str(), "arraybuffer");
    }

    #[test]
    fn test_response_type_serde_matches_names() {
        assert_eq!(serde_json::to_string(&ResponseType::Default).unwrap(), r#""""#);
        assert_eq!(serde_json::to_string(&ResponseType::ArrayBuffer).unwrap(), r#""arraybuffer""#);
        assert_eq!(
            serde_json::from_str::<ResponseType>(r#""""#).unwrap(),
            ResponseType::Default
        );
        assert!(serde_json::from_str::<ResponseType>(r#""default""#).is_err());
    }

    #[test]
    fn test_request_body_serialization() {
        assert_eq!(serde_json::to_string(&RequestBody::Empty).unwrap(), "\"\"");
        assert_eq!(
            serde_json::to_string(&RequestBody::from("a=1")).unwrap(),
            "\"a=1\""
        );
        assert_eq!(
            serde_json::to_string(&RequestBody::from(vec![0u8, 255])).unwrap(),
            "\"AP8=\""
        );

        let parsed: RequestBody = serde_json::from_str("\"\"").unwrap();
        assert_eq!(parsed, RequestBody::Empty);
    }

    #[test]
    fn test_snapshot_header_lookup() {
        let snapshot = RequestSnapshot {
            raw_headers: "Content-Type: text/plain\r\nSet-Cookie: a=1\r\nset-cookie: b=2".into(),
            ..Default::default()
        };

        assert_eq!(
            snapshot.response_header("content-type").as_deref(),
            Some("text/plain")
        );
        assert_eq!(
            snapshot.response_header("Set-Cookie").as_deref(),
            Some("a=1, b=2")
        );
        assert_eq!(snapshot.response_header("x-missing"), None);
    }

    #[test]
    fn test_blob_payload_decodes_lossy() {
        let payload = ResponsePayload::Binary(Bytes::from_static(b"ok\xff"));
        assert_eq!(payload.to_text(), "ok\u{fffd}");
    }
}
