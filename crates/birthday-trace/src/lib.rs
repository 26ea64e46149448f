// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

pub mod carrier;
pub mod context;
pub mod middleware;
pub mod reporter;
pub mod span;
pub mod tags;
pub mod tracer;

pub use carrier::{extract, inject, Carrier, UBER_TRACE_ID};
pub use context::SpanContext;
pub use reporter::{init, Reporter, ReporterConfig, TraceError};
pub use span::{FinishedSpan, LogRecord, RefType, Span, SpanSender, TagValue};
pub use tracer::{SpanBuilder, Tracer};
