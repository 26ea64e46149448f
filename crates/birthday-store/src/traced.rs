// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Store client wrapper.
//!
//! Wraps any [`KvStore`] with client-kind spans parented on the caller's
//! context. The wrapper only annotates: errors are tagged and logged on the
//! span, then returned to the caller unchanged. Each operation's span is
//! reported on every branch.

use async_trait::async_trait;

use birthday_trace::{tags, Span, SpanContext, Tracer};

use crate::repository::{KvStore, Repository, StoreError};

pub struct TracedStore<S> {
    tracer: Tracer,
    store: S,
}

impl<S: KvStore> TracedStore<S> {
    pub fn new(tracer: Tracer, store: S) -> Self {
        TracedStore { tracer, store }
    }

    fn client_span(&self, operation: &str, parent: Option<&SpanContext>) -> Span {
        let mut builder = self.tracer.span(operation);
        if let Some(parent) = parent {
            builder = builder.child_of(parent);
        }
        builder.tag(tags::SPAN_KIND, tags::SPAN_KIND_CLIENT).start()
    }
}

fn annotate_failure(span: &mut Span, event: &str, message: &str) {
    span.set_tag(tags::ERROR, true);
    span.log(&[
        ("event", event),
        ("level", "error"),
        ("message", message),
    ]);
}

#[async_trait]
impl<S: KvStore> Repository for TracedStore<S> {
    async fn is_ok(&self) -> Result<(), StoreError> {
        self.store.ping().await
    }

    async fn is_ready(&self) -> Result<(), StoreError> {
        self.store.ping().await
    }

    async fn upsert(
        &self,
        parent: Option<&SpanContext>,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        let mut span = self.client_span("redis-upsert", parent);
        match self.store.set(key, value).await {
            Ok(()) => {
                span.finish();
                Ok(())
            }
            Err(e) => {
                annotate_failure(&mut span, "upsert", &format!("upsert key at redis: {e}"));
                span.finish();
                Err(e)
            }
        }
    }

    async fn get(&self, parent: Option<&SpanContext>, key: &str) -> Result<String, StoreError> {
        let mut span = self.client_span("redis-get", parent);
        match self.store.get(key).await {
            Ok(value) => {
                span.finish();
                Ok(value)
            }
            Err(e) => {
                annotate_failure(&mut span, "get", &format!("get key from redis: {e}"));
                span.finish();
                Err(e)
            }
        }
    }
}
