// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Frontend proxy relay.
//!
//! Buffers the inbound body, forwards the request to the back tier with the
//! server span's context injected into the outbound headers, and relays the
//! backend's status and body back unchanged. After relaying it also starts a
//! child span and a follows-from span with short pauses, demonstrating both
//! parenting relations.

use std::sync::Arc;
use std::time::{Duration, Instant};

use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::{header, http, Method, Request, Response, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::debug;

use birthday_trace::{SpanContext, Tracer};

use crate::http_utils::{empty_response, log_and_create_error_response, HttpResponse};
use crate::metrics::record_request;

pub struct RelayState {
    pub tracer: Tracer,
    pub client: reqwest::Client,
    /// base url of the back tier, e.g. `http://127.0.0.1:9090`
    pub backend_url: String,
    pub metrics: Option<PrometheusHandle>,
}

/// Routes one frontend request. `server_ctx` is the middleware's server span.
pub async fn endpoint_handler<B>(
    state: Arc<RelayState>,
    req: Request<B>,
    server_ctx: SpanContext,
) -> http::Result<HttpResponse>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let relayable = matches!(method, Method::PUT | Method::GET)
        && path
            .strip_prefix("/hello/")
            .is_some_and(|user| !user.is_empty() && !user.contains('/'));

    let (endpoint, response) = match (&method, path.as_str(), relayable) {
        (&Method::GET, "/metrics", _) => ("/metrics", render_metrics(&state)),
        (_, _, true) => ("/hello/{user}", relay(&state, req, &server_ctx).await),
        _ => ("unmatched", empty_response(StatusCode::NOT_FOUND)),
    };

    if let Ok(ref resp) = response {
        record_request(method.as_str(), endpoint, resp.status().as_u16(), start);
    }
    response
}

fn render_metrics(state: &RelayState) -> http::Result<HttpResponse> {
    match state.metrics {
        Some(ref handle) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
            .body(Full::from(handle.render())),
        None => empty_response(StatusCode::NOT_FOUND),
    }
}

async fn relay<B>(
    state: &RelayState,
    req: Request<B>,
    server_ctx: &SpanContext,
) -> http::Result<HttpResponse>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let (parts, body) = req.into_parts();
    let body_bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return log_and_create_error_response(
                &format!("could not read request body: {e}"),
                StatusCode::BAD_REQUEST,
            );
        }
    };

    let mut headers = parts.headers;
    // the relay client computes these for the outbound request
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
    state.tracer.inject(server_ctx, &mut headers);

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let target_url = format!(
        "{}{}",
        state.backend_url.trim_end_matches('/'),
        path_and_query
    );
    debug!(target = %target_url, "relaying request to backend");

    let response = match state
        .client
        .request(parts.method, target_url.as_str())
        .headers(headers)
        .body(body_bytes)
        .send()
        .await
    {
        Ok(backend_response) => {
            let status = backend_response.status();
            match backend_response.bytes().await {
                Ok(body) => Response::builder().status(status).body(Full::new(body)),
                Err(e) => log_and_create_error_response(
                    &format!("could not read backend response: {e}"),
                    StatusCode::BAD_GATEWAY,
                ),
            }
        }
        Err(e) => log_and_create_error_response(
            &format!("could not reach backend: {e}"),
            StatusCode::BAD_GATEWAY,
        ),
    };

    demonstrate_span_relations(&state.tracer, server_ctx).await;
    response
}

/// Starts a child span of the server span, then a follows-from span of that
/// child, each spanning a short pause. Pure demonstration of the two
/// parenting relations; the relayed response is not affected.
async fn demonstrate_span_relations(tracer: &Tracer, parent: &SpanContext) {
    let child = tracer.span("frontend-childof").child_of(parent).start();
    tokio::time::sleep(Duration::from_millis(1)).await;
    let child_ctx = child.context().clone();
    child.finish();

    let follower = tracer
        .span("frontend-followsfrom")
        .follows_from(&child_ctx)
        .start();
    tokio::time::sleep(Duration::from_millis(2)).await;
    follower.finish();
}
