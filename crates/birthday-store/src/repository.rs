// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Store capability interfaces.
//!
//! [`KvStore`] is the raw key-value backend (real Redis or an in-memory
//! fake). [`Repository`] is what the request handlers consume; its methods
//! take the caller's span context explicitly so store operations can be
//! parented into the request trace. [`crate::TracedStore`] connects the two.

use async_trait::async_trait;

use birthday_trace::SpanContext;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The key is absent. Mapped to 404 by callers, never a server fault.
    #[error("key not found")]
    NotFound,
    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store replied with an error: {0}")]
    Server(String),
    #[error("unexpected store reply: {0}")]
    Protocol(String),
    #[error("store operation timed out")]
    Timeout,
}

/// Raw key-value backend operations, untraced.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn get(&self, key: &str) -> Result<String, StoreError>;
}

/// The store interface the business handlers use.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Liveness probe against the backing store.
    async fn is_ok(&self) -> Result<(), StoreError>;
    /// Readiness probe against the backing store.
    async fn is_ready(&self) -> Result<(), StoreError>;
    async fn upsert(
        &self,
        parent: Option<&SpanContext>,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError>;
    async fn get(&self, parent: Option<&SpanContext>, key: &str) -> Result<String, StoreError>;
}
