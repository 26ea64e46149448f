// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Trace carrier codec.
//!
//! Serializes exactly one [`SpanContext`] into a header map and back. The
//! wire format is the Jaeger client convention, a single header
//!
//! ```text
//! uber-trace-id: {trace-id}:{span-id}:{parent-id}:{flags}
//! ```
//!
//! with all fields in lowercase hex and `0` standing for "no parent". Both
//! tiers of the service run as separate processes and must agree on this
//! encoding byte for byte.

use std::collections::HashMap;

use hyper::header::{HeaderMap, HeaderName, HeaderValue};

use crate::context::SpanContext;

pub const UBER_TRACE_ID: &str = "uber-trace-id";

/// A header-style map a trace context can be written into and read from.
/// Keys are looked up by their canonical lowercase name. Writing must not
/// touch unrelated entries.
pub trait Carrier {
    fn set(&mut self, key: &'static str, value: String);
    fn get(&self, key: &str) -> Option<&str>;
}

impl Carrier for HeaderMap {
    fn set(&mut self, key: &'static str, value: String) {
        // All codec values are ASCII hex and colons, always a valid header.
        if let Ok(value) = HeaderValue::from_str(&value) {
            self.insert(HeaderName::from_static(key), value);
        }
    }

    fn get(&self, key: &str) -> Option<&str> {
        HeaderMap::get(self, key).and_then(|v| v.to_str().ok())
    }
}

impl Carrier for HashMap<String, String> {
    fn set(&mut self, key: &'static str, value: String) {
        self.insert(key.to_string(), value);
    }

    fn get(&self, key: &str) -> Option<&str> {
        HashMap::get(self, key).map(String::as_str)
    }
}

/// Writes `ctx` into the carrier under [`UBER_TRACE_ID`].
pub fn inject(ctx: &SpanContext, carrier: &mut impl Carrier) {
    let value = format!(
        "{:016x}:{:016x}:{:016x}:{:x}",
        ctx.trace_id,
        ctx.span_id,
        ctx.parent_id.unwrap_or(0),
        ctx.flags,
    );
    carrier.set(UBER_TRACE_ID, value);
}

/// Reads a context back out of the carrier. `None` means no valid context is
/// present, which is the normal case for first-hop requests, not an error.
pub fn extract(carrier: &impl Carrier) -> Option<SpanContext> {
    let value = carrier.get(UBER_TRACE_ID)?;
    let mut parts = value.split(':');
    let trace_id = u64::from_str_radix(parts.next()?, 16).ok()?;
    let span_id = u64::from_str_radix(parts.next()?, 16).ok()?;
    let parent_id = u64::from_str_radix(parts.next()?, 16).ok()?;
    let flags = u8::from_str_radix(parts.next()?, 16).ok()?;
    if parts.next().is_some() || trace_id == 0 || span_id == 0 {
        return None;
    }
    Some(SpanContext {
        trace_id,
        span_id,
        parent_id: (parent_id != 0).then_some(parent_id),
        flags,
    })
}
