// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, sync::Arc, time::Duration};

use hyper::service::service_fn;
use tokio::net::TcpListener;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use birthday_service::config::Config;
use birthday_service::http_utils::build_client;
use birthday_service::metrics::init_metrics;
use birthday_service::relay::{self, RelayState};
use birthday_service::server::{serve_tcp, shutdown_signal};
use birthday_trace::middleware;

#[tokio::main]
pub async fn main() {
    init_logging();
    debug!("Starting birthday frontend");

    let config = match Config::new() {
        Ok(c) => c,
        Err(e) => {
            error!("Error creating config on frontend startup: {e}");
            return;
        }
    };

    let (tracer, reporter) =
        match birthday_trace::init("birthday-frontend", config.reporter.clone()) {
            Ok(pair) => pair,
            Err(e) => {
                error!("Error initializing span reporter, frontend will not start: {e}");
                return;
            }
        };
    let shutdown_token = reporter.shutdown_token();
    let reporter_handle = tokio::spawn(reporter.run());
    debug!("Span reporter started");

    let metrics = match init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            error!("Failed to install metrics recorder: {e}");
            None
        }
    };

    let client = match build_client(Duration::from_secs(config.request_timeout_secs)) {
        Ok(client) => client,
        Err(e) => {
            error!("Error building relay client, frontend will not start: {e}");
            return;
        }
    };

    let state = Arc::new(RelayState {
        tracer: tracer.clone(),
        client,
        backend_url: config.backend_url.clone(),
        metrics,
    });

    let listener = match TcpListener::bind(&config.frontend_address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(
                "Could not bind frontend address {}: {e}",
                config.frontend_address
            );
            return;
        }
    };
    info!(
        address = %config.frontend_address,
        backend = %config.backend_url,
        "frontend HTTP server started"
    );

    let service = service_fn(move |req| {
        let state = Arc::clone(&state);
        let tracer = tracer.clone();
        async move {
            middleware::with_server_span(&tracer, "frontend", req, |req, ctx| {
                relay::endpoint_handler(state, req, ctx)
            })
            .await
        }
    });

    tokio::select! {
        result = serve_tcp(
            listener,
            service,
            Duration::from_secs(config.request_timeout_secs),
        ) => {
            if let Err(e) = result {
                error!("Frontend server error: {e}");
            }
        }
        _ = shutdown_signal() => {}
    }

    shutdown_token.cancel();
    if let Err(e) = reporter_handle.await {
        error!("Span reporter task failed: {e}");
    }
    info!("Shutdown complete");
}

fn init_logging() {
    let log_level = env::var("LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,{log_level}");

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");
}
