// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Interceptor configuration

use super::store::RecordMode;

/// Interceptor configuration
#[derive(Debug, Clone)]
pub struct InterceptorConfig {
    /// Record keying
    pub mode: RecordMode,
    /// Capture response bodies into the record
    pub capture_response_bodies: bool,
    /// Also capture bodies of requests left at the default (`""`) response
    /// type. Off by default: only `text` and `blob` are captured.
    pub capture_default_response_type: bool,
    /// Truncate captured response bodies to this many bytes
    pub max_body_size: Option<usize>,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            mode: RecordMode::PerRequest,
            capture_response_bodies: true,
            capture_default_response_type: false,
            max_body_size: None,
        }
    }
}

impl InterceptorConfig {
    /// Create a new config
    pub fn new() -> Self {
        Self::default()
    }

    /// Set record keying
    pub fn mode(mut self, mode: RecordMode) -> Self {
        self.mode = mode;
        self
    }

    /// Keep a single current record, replaced by every open
    pub fn single_flight() -> Self {
        Self {
            mode: RecordMode::SingleFlight,
            ..Default::default()
        }
    }

    /// Set body capture settings
    pub fn capture_response_bodies(mut self, capture: bool) -> Self {
        self.capture_response_bodies = capture;
        self
    }

    /// Capture bodies of default (`""`) response type requests as text
    pub fn capture_default_response_type(mut self, capture: bool) -> Self {
        self.capture_default_response_type = capture;
        self
    }

    /// Limit captured response body size
    pub fn max_body_size(mut self, max: usize) -> Self {
        self.max_body_size = Some(max);
        self
    }
}

/// Cut `body` to at most `max` bytes without splitting a character
pub(crate) fn truncate_body(body: &mut String, max: usize) {
    if body.len() <= max {
        return;
    }
    let mut cut = max;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    body.truncate(cut);
}
