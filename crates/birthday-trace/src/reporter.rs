// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Process-wide span sink.
//!
//! Finished spans arrive over an unbounded channel, get logged locally, and
//! are batched to the remote collector on a flush interval. The reporter is
//! constructed once at process start and torn down once at shutdown via its
//! cancellation token (drain, final flush, exit). Transport construction
//! failures at init are fatal by design: the service does not run untraced.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::span::FinishedSpan;
use crate::tracer::Tracer;

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("invalid trace collector url {url:?}: {reason}")]
    InvalidCollectorUrl { url: String, reason: String },
    #[error("could not build collector transport: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct ReporterConfig {
    pub collector_url: String,
    /// how often to flush buffered spans, in seconds
    pub flush_interval_secs: u64,
    /// timeout for each collector request, in seconds
    pub request_timeout_secs: u64,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        ReporterConfig {
            collector_url: "http://127.0.0.1:14268/api/traces".to_string(),
            flush_interval_secs: 3,
            request_timeout_secs: 10,
        }
    }
}

/// Builds the tracer/reporter pair for one process. The caller spawns
/// [`Reporter::run`] and keeps the [`Tracer`] to hand to components.
pub fn init(service: &str, config: ReporterConfig) -> Result<(Tracer, Reporter), TraceError> {
    let collector_url = reqwest::Url::parse(&config.collector_url).map_err(|e| {
        TraceError::InvalidCollectorUrl {
            url: config.collector_url.clone(),
            reason: e.to_string(),
        }
    })?;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()?;

    let (tx, rx) = mpsc::unbounded_channel();
    let reporter = Reporter {
        service: service.to_string(),
        rx,
        client,
        collector_url,
        flush_interval: Duration::from_secs(config.flush_interval_secs),
        queue: Vec::new(),
        shutdown: CancellationToken::new(),
    };
    Ok((Tracer::new(tx), reporter))
}

#[derive(Serialize)]
struct SpanBatch<'a> {
    service: &'a str,
    spans: &'a [FinishedSpan],
}

pub struct Reporter {
    service: String,
    rx: mpsc::UnboundedReceiver<FinishedSpan>,
    client: reqwest::Client,
    collector_url: reqwest::Url,
    flush_interval: Duration,
    queue: Vec<FinishedSpan>,
    shutdown: CancellationToken,
}

impl Reporter {
    /// Token that triggers the flush-and-close sequence when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Receives finished spans until shutdown, flushing on the interval.
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.flush_interval);
        interval.tick().await; // discard first tick, which is instantaneous

        loop {
            tokio::select! {
                received = self.rx.recv() => match received {
                    Some(span) => self.observe(span),
                    None => {
                        // every tracer clone is gone; nothing more can arrive
                        self.flush().await;
                        break;
                    }
                },
                _ = interval.tick() => self.flush().await,
                _ = self.shutdown.cancelled() => {
                    while let Ok(span) = self.rx.try_recv() {
                        self.observe(span);
                    }
                    self.flush().await;
                    break;
                }
            }
        }
        debug!("span reporter stopped");
    }

    fn observe(&mut self, span: FinishedSpan) {
        let trace_id = format!("{:016x}", span.context.trace_id);
        let span_id = format!("{:016x}", span.context.span_id);
        debug!(
            operation = %span.operation,
            trace_id = %trace_id,
            span_id = %span_id,
            duration_us = span.duration_us,
            error = span.error,
            "span finished"
        );
        self.queue.push(span);
    }

    /// Sends everything buffered to the collector. Failed batches are logged
    /// and dropped; the reporter performs no retries.
    async fn flush(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        let spans = std::mem::take(&mut self.queue);
        debug!("Flushing {} spans", spans.len());

        let batch = SpanBatch {
            service: &self.service,
            spans: &spans,
        };
        match self
            .client
            .post(self.collector_url.clone())
            .json(&batch)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                debug!("Successfully flushed spans");
            }
            Ok(response) => {
                error!(
                    "Collector rejected span batch with status {}",
                    response.status()
                );
            }
            Err(e) => {
                error!("Error sending span batch: {e}");
            }
        }
    }
}
