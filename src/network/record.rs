// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Captured request record
//!
//! `NetworkRecord` is what the completion callback receives. Its JSON form
//! keeps the shape inspectors already parse: camelCase keys, `""` in place
//! of header maps and bodies that were never set, and no `responseCode`
//! key until the request is done.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::host::RequestBody;

/// Request/response metadata for one request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRecord {
    /// Raw URL argument of open
    pub url: String,
    /// Raw method argument of open
    pub method: String,
    /// Headers set by the caller; `None` until the first header is set
    #[serde(with = "sentinel_map", default)]
    pub request_headers: Option<HashMap<String, String>>,
    /// Payload passed to send, or the transport error payload on failure
    #[serde(default)]
    pub request_body: RequestBody,
    /// Parsed response headers; `None` until headers are received
    #[serde(with = "sentinel_map", default)]
    pub response_headers: Option<HashMap<String, String>>,
    /// MIME type without parameters
    #[serde(default)]
    pub content_type: String,
    /// HTTP status, set at completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_code: Option<u16>,
    /// Text or blob response decoded as text
    #[serde(default)]
    pub response_body: String,
    /// Milliseconds between send and done
    #[serde(default)]
    pub duration: u64,
}

impl NetworkRecord {
    /// Fresh record for a newly opened request
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            ..Default::default()
        }
    }

    /// Whether the request has reached completion
    pub fn is_complete(&self) -> bool {
        self.response_code.is_some()
    }

    /// Check if response was successful
    pub fn is_success(&self) -> bool {
        self.response_code
            .map(|code| (200..300).contains(&code))
            .unwrap_or(false)
    }

    /// Check if response is JSON
    pub fn is_json(&self) -> bool {
        self.content_type == "application/json" || self.content_type.ends_with("+json")
    }

    /// Request header by case-insensitive name
    pub fn request_header(&self, name: &str) -> Option<&str> {
        lookup(self.request_headers.as_ref(), name)
    }

    /// Response header by case-insensitive name. The value is returned as
    /// stored, including its leading space.
    pub fn response_header(&self, name: &str) -> Option<&str> {
        lookup(self.response_headers.as_ref(), name)
    }

    /// Get response body if JSON
    pub fn json_body<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_str(&self.response_body).ok()
    }

    /// Export as JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn lookup<'a>(headers: Option<&'a HashMap<String, String>>, name: &str) -> Option<&'a str> {
    headers?
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Header maps that serialize as `""` while unset
mod sentinel_map {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Map(HashMap<String, String>),
        Sentinel(String),
    }

    pub fn serialize<S: Serializer>(
        value: &Option<HashMap<String, String>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(map) => map.serialize(serializer),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<HashMap<String, String>>, D::Error> {
        match Wire::deserialize(deserializer)? {
            Wire::Map(map) => Ok(Some(map)),
            Wire::Sentinel(_) => Ok(None),
        }
    }
}
