// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Well-known tag keys and values.

pub const ERROR: &str = "error";
pub const HTTP_METHOD: &str = "http.method";
pub const HTTP_STATUS_CODE: &str = "http.status_code";
pub const SPAN_KIND: &str = "span.kind";
pub const SPAN_KIND_CLIENT: &str = "client";
pub const SPAN_KIND_SERVER: &str = "server";
