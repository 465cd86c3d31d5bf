// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Response header extraction

use std::collections::HashMap;

/// MIME type portion of a Content-Type value (everything before the first `;`)
pub fn strip_content_type(value: &str) -> &str {
    value.split(';').next().unwrap_or(value)
}

/// Parse a raw CRLF-separated header block into a name -> value map.
///
/// Each line is split on its first colon. The value keeps whatever follows
/// the colon verbatim, leading space included. Empty lines and lines
/// without a colon are skipped; a repeated name keeps the last value.
pub fn parse_raw_headers(raw: &str) -> HashMap<String, String> {
    raw.split("\r\n")
        .filter(|line| !line.is_empty())
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_parameters_stripped() {
        assert_eq!(
            strip_content_type("application/json; charset=utf-8"),
            "application/json"
        );
        assert_eq!(strip_content_type("text/html"), "text/html");
        assert_eq!(strip_content_type(""), "");
    }

    #[test]
    fn test_values_keep_leading_space() {
        let headers = parse_raw_headers("Content-Type: text/plain\r\nX-Foo: bar");

        assert_eq!(headers.len(), 2);
        assert_eq!(headers["Content-Type"], " text/plain");
        assert_eq!(headers["X-Foo"], " bar");
    }

    #[test]
    fn test_split_on_first_colon_only() {
        let headers = parse_raw_headers("Date: Mon, 01 Jan 2024 10:00:00 GMT\r\n");

        assert_eq!(headers.len(), 1);
        assert_eq!(headers["Date"], " Mon, 01 Jan 2024 10:00:00 GMT");
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let headers = parse_raw_headers("HTTP/1.1 200 OK\r\n\r\nX-A:1\r\nX-A:2");

        assert_eq!(headers.len(), 1);
        assert_eq!(headers["X-A"], "2");
    }
}
