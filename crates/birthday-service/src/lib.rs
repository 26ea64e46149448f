// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

pub mod birthday;
pub mod config;
pub mod http_utils;
pub mod metrics;
pub mod relay;
pub mod routes;
pub mod server;
