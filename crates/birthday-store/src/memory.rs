// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Fake store backends for tests and local development.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::repository::{KvStore, StoreError};

/// In-memory key-value store.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

#[async_trait::async_trait]
impl KvStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<String, StoreError> {
        self.entries
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

/// Store that fails every operation, for exercising error paths.
pub struct FailingStore;

#[async_trait::async_trait]
impl KvStore for FailingStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Server("simulated store failure".to_string()))
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Server("simulated store failure".to_string()))
    }

    async fn get(&self, _key: &str) -> Result<String, StoreError> {
        Err(StoreError::Server("simulated store failure".to_string()))
    }
}
