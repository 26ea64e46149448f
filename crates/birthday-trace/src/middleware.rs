// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP tracing middleware.
//!
//! Turns every inbound request into a correctly-parented server span and
//! hands the active context to the wrapped handler as an explicit argument.
//! The span context travels by parameter, never by mutating the request's
//! header map.

use std::future::Future;

use hyper::Request;

use crate::carrier;
use crate::context::SpanContext;
use crate::tags;
use crate::tracer::Tracer;

/// Wraps `handler` in a server span named `"{component}-{path}"`.
///
/// When the inbound headers carry a valid trace context the span is an
/// RPC-server child of it; otherwise it starts a new trace. The handler
/// receives the server span's context to parent its own spans on, and the
/// server span finishes once the handler returns, on success and failure
/// alike.
pub async fn with_server_span<B, H, Fut, R>(
    tracer: &Tracer,
    component: &str,
    req: Request<B>,
    handler: H,
) -> R
where
    H: FnOnce(Request<B>, SpanContext) -> Fut,
    Fut: Future<Output = R>,
{
    let wire_ctx = carrier::extract(req.headers());
    let operation = format!("{component}-{}", req.uri().path());

    let mut builder = tracer.span(&operation);
    if let Some(ref parent) = wire_ctx {
        builder = builder
            .child_of(parent)
            .tag(tags::SPAN_KIND, tags::SPAN_KIND_SERVER);
    }
    let mut span = builder.start();
    span.set_tag(tags::HTTP_METHOD, req.method().as_str());

    let ctx = span.context().clone();
    let result = handler(req, ctx).await;
    span.finish();
    result
}
