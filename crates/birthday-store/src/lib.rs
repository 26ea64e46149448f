// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

pub mod memory;
pub mod redis;
pub mod repository;
pub mod traced;

pub use memory::{FailingStore, MemoryStore};
pub use redis::{RedisConfig, RedisStore};
pub use repository::{KvStore, Repository, StoreError};
pub use traced::TracedStore;
