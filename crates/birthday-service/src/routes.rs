// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Backend endpoints.
//!
//! Dispatch is a plain `(method, path)` match; every business handler starts
//! its own operation span parented on the server span the middleware passed
//! in, tags method/status/error, and lets scoped release report the span on
//! every exit path.

use std::sync::Arc;
use std::time::Instant;

use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::{header, http, Method, Request, Response, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;

use birthday_store::{Repository, StoreError};
use birthday_trace::{tags, Span, SpanContext, Tracer};

use crate::birthday;
use crate::http_utils::{
    empty_response, log_and_create_error_response, log_and_create_message_response,
    verify_request_content_length, HttpResponse,
};
use crate::metrics::record_request;

pub struct AppState {
    pub tracer: Tracer,
    pub repository: Arc<dyn Repository>,
    pub metrics: Option<PrometheusHandle>,
    pub max_request_content_length: usize,
}

/// Incoming upsert request for a date of birth.
#[derive(Debug, Default, Deserialize)]
pub struct BirthdayRequest {
    #[serde(rename = "dateOfBirth", default)]
    pub date_of_birth: String,
}

/// Routes one backend request. `server_ctx` is the middleware's server span.
pub async fn endpoint_handler<B>(
    state: Arc<AppState>,
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
    let user = path_user(&path).map(str::to_string);

    let (endpoint, response) = match (&method, path.as_str(), user) {
        (&Method::GET, "/healthz", _) => ("/healthz", healthz(&state).await),
        (&Method::GET, "/readiness", _) => ("/readiness", readiness(&state).await),
        (&Method::GET, "/metrics", _) => ("/metrics", render_metrics(&state)),
        (&Method::PUT, _, Some(user)) => (
            "/hello/{user}",
            upsert_date_of_birth(&state, Some(&server_ctx), &user, req).await,
        ),
        (&Method::GET, _, Some(user)) => (
            "/hello/{user}",
            get_birth_date(&state, Some(&server_ctx), &user).await,
        ),
        _ => ("unmatched", empty_response(StatusCode::NOT_FOUND)),
    };

    if let Ok(ref resp) = response {
        record_request(method.as_str(), endpoint, resp.status().as_u16(), start);
    }
    response
}

/// `/hello/{user}` with exactly one non-empty path segment for the user.
fn path_user(path: &str) -> Option<&str> {
    path.strip_prefix("/hello/")
        .filter(|user| !user.is_empty() && !user.contains('/'))
}

async fn healthz(state: &AppState) -> http::Result<HttpResponse> {
    if state.repository.is_ok().await.is_err() {
        return empty_response(StatusCode::SERVICE_UNAVAILABLE);
    }
    empty_response(StatusCode::OK)
}

async fn readiness(state: &AppState) -> http::Result<HttpResponse> {
    if state.repository.is_ready().await.is_err() {
        return empty_response(StatusCode::SERVICE_UNAVAILABLE);
    }
    empty_response(StatusCode::OK)
}

fn render_metrics(state: &AppState) -> http::Result<HttpResponse> {
    match state.metrics {
        Some(ref handle) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
            .body(Full::from(handle.render())),
        None => empty_response(StatusCode::NOT_FOUND),
    }
}

async fn upsert_date_of_birth<B>(
    state: &AppState,
    parent: Option<&SpanContext>,
    user: &str,
    req: Request<B>,
) -> http::Result<HttpResponse>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let mut span = operation_span(&state.tracer, "upsert-birthday", parent);
    span.set_tag(tags::HTTP_METHOD, "PUT");

    let (parts, body) = req.into_parts();
    if let Some(response) = verify_request_content_length(
        &parts.headers,
        state.max_request_content_length,
        "Error processing birthday update",
    ) {
        if let Ok(ref resp) = response {
            span.set_tag(tags::ERROR, true);
            span.set_tag(tags::HTTP_STATUS_CODE, resp.status().as_u16());
        }
        return response;
    }

    let body_bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return bad_request(&mut span, &format!("could not read request body: {e}"));
        }
    };

    let request: BirthdayRequest = match serde_json::from_slice(&body_bytes) {
        Ok(request) => request,
        Err(e) => {
            return bad_request(&mut span, &format!("could not parse json body: {e}"));
        }
    };

    if !birthday::is_valid_date_format(&request.date_of_birth) {
        return bad_request(
            &mut span,
            &format!(
                "{} date format is invalid, date must be in yyyy-mm-dd format",
                request.date_of_birth
            ),
        );
    }

    if let Err(e) = state
        .repository
        .upsert(Some(span.context()), user, &request.date_of_birth)
        .await
    {
        span.set_tag(tags::ERROR, true);
        span.set_tag(tags::HTTP_STATUS_CODE, StatusCode::INTERNAL_SERVER_ERROR.as_u16());
        span.log(&[
            ("event", "error"),
            ("message", "could not upsert user date of birth"),
        ]);
        return log_and_create_error_response(
            &format!("could not upsert user date of birth: {e}"),
            StatusCode::INTERNAL_SERVER_ERROR,
        );
    }

    span.log(&[("event", "upsert-birthday"), ("value", user)]);
    empty_response(StatusCode::NO_CONTENT)
}

async fn get_birth_date(
    state: &AppState,
    parent: Option<&SpanContext>,
    user: &str,
) -> http::Result<HttpResponse> {
    let mut span = operation_span(&state.tracer, "check-birthday", parent);
    span.set_tag(tags::HTTP_METHOD, "GET");
    span.log(&[("event", "check-birthday"), ("value", user)]);

    let date_of_birth = match state.repository.get(Some(span.context()), user).await {
        Ok(value) => value,
        Err(StoreError::NotFound) => {
            span.set_tag(tags::HTTP_STATUS_CODE, StatusCode::NOT_FOUND.as_u16());
            return empty_response(StatusCode::NOT_FOUND);
        }
        Err(e) => {
            span.set_tag(tags::ERROR, true);
            span.set_tag(tags::HTTP_STATUS_CODE, StatusCode::INTERNAL_SERVER_ERROR.as_u16());
            return log_and_create_error_response(
                &format!("could not get user date of birth: {e}"),
                StatusCode::INTERNAL_SERVER_ERROR,
            );
        }
    };

    let today = chrono::Local::now().date_naive();
    let message = match birthday::birthday_message(user, &date_of_birth, today) {
        Ok(message) => message,
        Err(e) => {
            span.set_tag(tags::ERROR, true);
            span.set_tag(tags::HTTP_STATUS_CODE, StatusCode::INTERNAL_SERVER_ERROR.as_u16());
            return log_and_create_error_response(
                &format!("{e:#}"),
                StatusCode::INTERNAL_SERVER_ERROR,
            );
        }
    };

    span.set_tag(tags::HTTP_STATUS_CODE, StatusCode::OK.as_u16());
    log_and_create_message_response(&message, StatusCode::OK)
}

fn operation_span(tracer: &Tracer, operation: &str, parent: Option<&SpanContext>) -> Span {
    let mut builder = tracer.span(operation);
    if let Some(parent) = parent {
        builder = builder.child_of(parent);
    }
    builder.start()
}

fn bad_request(span: &mut Span, message: &str) -> http::Result<HttpResponse> {
    span.set_tag(tags::ERROR, true);
    span.set_tag(tags::HTTP_STATUS_CODE, StatusCode::BAD_REQUEST.as_u16());
    span.log(&[("event", "error"), ("message", message)]);
    log_and_create_error_response(message, StatusCode::BAD_REQUEST)
}

#[cfg(test)]
mod tests {
    use super::*;
    use birthday_store::{FailingStore, MemoryStore, TracedStore};
    use birthday_trace::{FinishedSpan, TagValue};
    use bytes::Bytes;
    use tokio::sync::mpsc;

    fn app_state<S: birthday_store::KvStore + 'static>(
        store: S,
    ) -> (Arc<AppState>, mpsc::UnboundedReceiver<FinishedSpan>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let tracer = Tracer::new(tx);
        let repository: Arc<dyn Repository> =
            Arc::new(TracedStore::new(tracer.clone(), store));
        (
            Arc::new(AppState {
                tracer,
                repository,
                metrics: None,
                max_request_content_length: 1024 * 1024,
            }),
            rx,
        )
    }

    fn server_ctx() -> SpanContext {
        SpanContext {
            trace_id: 0x100,
            span_id: 0x200,
            parent_id: None,
            flags: 1,
        }
    }

    fn request(method: Method, path: &str, body: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(format!("http://localhost:9090{path}"))
            .header(header::CONTENT_LENGTH, body.len())
            .body(Full::from(body.to_string()))
            .unwrap()
    }

    async fn body_string(response: HttpResponse) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<FinishedSpan>) -> Vec<FinishedSpan> {
        let mut spans = Vec::new();
        while let Ok(span) = rx.try_recv() {
            spans.push(span);
        }
        spans
    }

    #[tokio::test]
    async fn test_upsert_stores_the_date_and_returns_no_content() {
        let (state, mut rx) = app_state(MemoryStore::new());
        let req = request(Method::PUT, "/hello/alice", r#"{"dateOfBirth":"2001-05-02"}"#);
        let response = endpoint_handler(Arc::clone(&state), req, server_ctx())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            state.repository.get(None, "alice").await.unwrap(),
            "2001-05-02"
        );

        let spans = drain(&mut rx);
        let op_span = spans
            .iter()
            .find(|s| s.operation == "upsert-birthday")
            .unwrap();
        assert_eq!(op_span.context.parent_id, Some(server_ctx().span_id));
        assert_eq!(op_span.context.trace_id, server_ctx().trace_id);
        assert!(!op_span.error);
        let store_span = spans.iter().find(|s| s.operation == "redis-upsert").unwrap();
        assert_eq!(store_span.context.parent_id, Some(op_span.context.span_id));
    }

    #[tokio::test]
    async fn test_upsert_with_invalid_json_is_bad_request() {
        let (state, mut rx) = app_state(MemoryStore::new());
        let req = request(Method::PUT, "/hello/alice", "{not json");
        let response = endpoint_handler(state, req, server_ctx()).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.contains("error"));

        let spans = drain(&mut rx);
        let op_span = spans
            .iter()
            .find(|s| s.operation == "upsert-birthday")
            .unwrap();
        assert!(op_span.error);
        assert_eq!(
            op_span.tags[tags::HTTP_STATUS_CODE],
            TagValue::Int(i64::from(StatusCode::BAD_REQUEST.as_u16()))
        );
    }

    #[tokio::test]
    async fn test_upsert_with_unpadded_date_is_bad_request() {
        let (state, _rx) = app_state(MemoryStore::new());
        let req = request(Method::PUT, "/hello/alice", r#"{"dateOfBirth":"2001-5-02"}"#);
        let response = endpoint_handler(state, req, server_ctx()).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response)
            .await
            .contains("date format is invalid"));
    }

    #[tokio::test]
    async fn test_upsert_with_missing_date_field_is_bad_request() {
        let (state, _rx) = app_state(MemoryStore::new());
        let req = request(Method::PUT, "/hello/alice", "{}");
        let response = endpoint_handler(state, req, server_ctx()).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upsert_store_failure_is_internal_error() {
        let (state, mut rx) = app_state(FailingStore);
        let req = request(Method::PUT, "/hello/alice", r#"{"dateOfBirth":"2001-05-02"}"#);
        let response = endpoint_handler(state, req, server_ctx()).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_string(response).await.contains("could not upsert"));

        let spans = drain(&mut rx);
        assert!(spans.iter().any(|s| s.operation == "redis-upsert" && s.error));
        assert!(spans
            .iter()
            .any(|s| s.operation == "upsert-birthday" && s.error));
    }

    #[tokio::test]
    async fn test_get_known_user_greets_them() {
        let (state, mut rx) = app_state(MemoryStore::new());
        let today = chrono::Local::now().date_naive();
        state
            .repository
            .upsert(None, "alice", &today.format("%Y-%m-%d").to_string())
            .await
            .unwrap();

        let req = request(Method::GET, "/hello/alice", "");
        let response = endpoint_handler(Arc::clone(&state), req, server_ctx())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_string(response).await,
            "{\"message\":\"Hello, alice! Happy birthday\"}"
        );

        let spans = drain(&mut rx);
        let op_span = spans
            .iter()
            .find(|s| s.operation == "check-birthday")
            .unwrap();
        assert_eq!(
            op_span.tags[tags::HTTP_STATUS_CODE],
            TagValue::Int(i64::from(StatusCode::OK.as_u16()))
        );
        assert!(spans.iter().any(|s| s.operation == "redis-get"));
    }

    #[tokio::test]
    async fn test_get_unknown_user_is_not_found() {
        let (state, mut rx) = app_state(MemoryStore::new());
        let req = request(Method::GET, "/hello/nobody", "");
        let response = endpoint_handler(state, req, server_ctx()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let spans = drain(&mut rx);
        let op_span = spans
            .iter()
            .find(|s| s.operation == "check-birthday")
            .unwrap();
        assert_eq!(
            op_span.tags[tags::HTTP_STATUS_CODE],
            TagValue::Int(i64::from(StatusCode::NOT_FOUND.as_u16()))
        );
    }

    #[tokio::test]
    async fn test_health_endpoints_reflect_the_store() {
        let (state, _rx) = app_state(MemoryStore::new());
        let response = endpoint_handler(state, request(Method::GET, "/healthz", ""), server_ctx())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let (state, _rx) = app_state(FailingStore);
        for path in ["/healthz", "/readiness"] {
            let response =
                endpoint_handler(Arc::clone(&state), request(Method::GET, path, ""), server_ctx())
                    .await
                    .unwrap();
            assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        }
    }

    #[tokio::test]
    async fn test_unmatched_routes_are_not_found() {
        let (state, _rx) = app_state(MemoryStore::new());
        for (method, path) in [
            (Method::GET, "/hello/"),
            (Method::GET, "/hello/a/b"),
            (Method::POST, "/hello/alice"),
            (Method::GET, "/nope"),
        ] {
            let response =
                endpoint_handler(Arc::clone(&state), request(method, path, ""), server_ctx())
                    .await
                    .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
        }
    }

    #[tokio::test]
    async fn test_metrics_endpoint_without_recorder_is_not_found() {
        let (state, _rx) = app_state(MemoryStore::new());
        let response = endpoint_handler(state, request(Method::GET, "/metrics", ""), server_ctx())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_every_handler_span_is_reported_exactly_once() {
        // one operation span + one store span for traced paths, none leaked
        let (state, mut rx) = app_state(MemoryStore::new());

        let put = request(Method::PUT, "/hello/alice", r#"{"dateOfBirth":"2001-05-02"}"#);
        endpoint_handler(Arc::clone(&state), put, server_ctx())
            .await
            .unwrap();
        assert_eq!(drain(&mut rx).len(), 2);

        let bad = request(Method::PUT, "/hello/alice", "{not json");
        endpoint_handler(Arc::clone(&state), bad, server_ctx())
            .await
            .unwrap();
        // early-return path: the operation span alone, still reported
        assert_eq!(drain(&mut rx).len(), 1);
    }
}
