// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Network interception and monitoring
//!
//! Wraps a request primitive, records every lifecycle phase into a
//! [`NetworkRecord`] and reports progress and completion to the consumer.

mod clock;
mod config;
mod headers;
mod interceptor;
mod proxy;
mod record;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::InterceptorConfig;
pub use headers::{parse_raw_headers, strip_content_type};
pub use interceptor::{CompletionCallback, NetworkInterceptor, ProgressCallback};
pub use proxy::InterceptedRequest;
pub use record::NetworkRecord;
pub use store::RecordMode;
