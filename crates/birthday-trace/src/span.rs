// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Spans: named, time-bounded units of work.
//!
//! A span is owned by the operation that created it and is mutated only by
//! that owner. Finishing hands the span to the reporter exactly once:
//! explicitly via [`Span::finish`], or through `Drop` when the owning future
//! is torn down early (client disconnect), so cancelled requests do not leak
//! spans.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::mpsc;

use crate::context::SpanContext;
use crate::tags;

/// Channel end that finished spans are handed to. The reporter owns the
/// receiving side; tests can stand in a plain channel to capture spans.
pub type SpanSender = mpsc::UnboundedSender<FinishedSpan>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TagValue {
    String(String),
    Bool(bool),
    Int(i64),
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        TagValue::String(value.to_string())
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        TagValue::String(value)
    }
}

impl From<bool> for TagValue {
    fn from(value: bool) -> Self {
        TagValue::Bool(value)
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        TagValue::Int(value)
    }
}

impl From<u16> for TagValue {
    fn from(value: u16) -> Self {
        TagValue::Int(i64::from(value))
    }
}

/// One structured log entry on a span.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub timestamp_us: u64,
    pub fields: Vec<(String, String)>,
}

/// How a span relates to its parent context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefType {
    ChildOf,
    FollowsFrom,
}

/// The immutable record the reporter receives once a span finishes.
#[derive(Debug, Clone, Serialize)]
pub struct FinishedSpan {
    #[serde(flatten)]
    pub context: SpanContext,
    pub operation: String,
    pub ref_type: Option<RefType>,
    pub start_us: u64,
    pub duration_us: u64,
    pub tags: HashMap<String, TagValue>,
    pub logs: Vec<LogRecord>,
    pub error: bool,
}

#[derive(Debug)]
struct SpanState {
    context: SpanContext,
    operation: String,
    ref_type: Option<RefType>,
    start: SystemTime,
    tags: HashMap<String, TagValue>,
    logs: Vec<LogRecord>,
    error: bool,
}

/// A live span. Dropping it reports it; [`Span::finish`] does so explicitly.
#[derive(Debug)]
pub struct Span {
    state: Option<SpanState>,
    sender: SpanSender,
}

impl Span {
    pub(crate) fn new(
        context: SpanContext,
        operation: String,
        ref_type: Option<RefType>,
        tags: HashMap<String, TagValue>,
        sender: SpanSender,
    ) -> Self {
        Span {
            state: Some(SpanState {
                context,
                operation,
                ref_type,
                start: SystemTime::now(),
                tags,
                logs: Vec::new(),
                error: false,
            }),
            sender,
        }
    }

    pub fn context(&self) -> &SpanContext {
        // state is vacated only on finish or drop, after which no borrow of
        // self can exist
        &self.state.as_ref().expect("span already reported").context
    }

    pub fn operation(&self) -> &str {
        &self.state.as_ref().expect("span already reported").operation
    }

    /// Sets a tag. Setting the `error` tag to `true` also raises the span's
    /// error flag.
    pub fn set_tag(&mut self, key: &str, value: impl Into<TagValue>) {
        if let Some(state) = self.state.as_mut() {
            let value = value.into();
            if key == tags::ERROR && value == TagValue::Bool(true) {
                state.error = true;
            }
            state.tags.insert(key.to_string(), value);
        }
    }

    /// Appends a timestamped structured log entry.
    pub fn log(&mut self, fields: &[(&str, &str)]) {
        if let Some(state) = self.state.as_mut() {
            state.logs.push(LogRecord {
                timestamp_us: epoch_micros(SystemTime::now()),
                fields: fields
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            });
        }
    }

    /// Records the end time and hands the span to the reporter.
    pub fn finish(mut self) {
        self.report();
    }

    fn report(&mut self) {
        if let Some(state) = self.state.take() {
            let end = SystemTime::now();
            let duration_us = end
                .duration_since(state.start)
                .map(|d| d.as_micros() as u64)
                .unwrap_or(0);
            let finished = FinishedSpan {
                context: state.context,
                operation: state.operation,
                ref_type: state.ref_type,
                start_us: epoch_micros(state.start),
                duration_us,
                tags: state.tags,
                logs: state.logs,
                error: state.error,
            };
            // The receiver is only gone during process shutdown.
            let _ = self.sender.send(finished);
        }
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        self.report();
    }
}

fn epoch_micros(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::Tracer;

    #[tokio::test]
    async fn test_finish_reports_exactly_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let tracer = Tracer::new(tx);
        let mut span = tracer.span("work").start();
        span.set_tag("answer", 42i64);
        span.log(&[("event", "step"), ("value", "one")]);
        span.finish();

        let finished = rx.recv().await.unwrap();
        assert_eq!(finished.operation, "work");
        assert_eq!(finished.tags["answer"], TagValue::Int(42));
        assert_eq!(finished.logs.len(), 1);
        assert_eq!(
            finished.logs[0].fields,
            vec![
                ("event".to_string(), "step".to_string()),
                ("value".to_string(), "one".to_string())
            ]
        );
        assert!(!finished.error);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_drop_reports_unfinished_span() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let tracer = Tracer::new(tx);
        {
            let _span = tracer.span("abandoned").start();
            // dropped without an explicit finish, e.g. a cancelled request
        }
        let finished = rx.recv().await.unwrap();
        assert_eq!(finished.operation, "abandoned");
    }

    #[tokio::test]
    async fn test_error_tag_raises_error_flag() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let tracer = Tracer::new(tx);
        let mut span = tracer.span("failing").start();
        span.set_tag(tags::ERROR, true);
        span.finish();

        let finished = rx.recv().await.unwrap();
        assert!(finished.error);
        assert_eq!(finished.tags[tags::ERROR], TagValue::Bool(true));
    }

    #[tokio::test]
    async fn test_tag_values_serialize_untagged() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let tracer = Tracer::new(tx);
        let mut span = tracer.span("typed").start();
        span.set_tag("s", "text");
        span.set_tag("b", false);
        span.set_tag("i", 7i64);
        span.finish();

        let json = serde_json::to_value(rx.recv().await.unwrap()).unwrap();
        assert_eq!(json["tags"]["s"], "text");
        assert_eq!(json["tags"]["b"], false);
        assert_eq!(json["tags"]["i"], 7);
    }
}
