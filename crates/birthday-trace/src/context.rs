// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use rand::Rng;
use serde::Serialize;

/// Spans created as roots are always sampled (constant sampler).
pub const FLAG_SAMPLED: u8 = 0x01;

/// The identifiers linking a span to its trace and parent. Immutable once
/// captured into a carrier; business code only passes it through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpanContext {
    #[serde(serialize_with = "hex_id::serialize")]
    pub trace_id: u64,
    #[serde(serialize_with = "hex_id::serialize")]
    pub span_id: u64,
    #[serde(serialize_with = "hex_id::serialize_opt")]
    pub parent_id: Option<u64>,
    pub flags: u8,
}

impl SpanContext {
    /// Creates a context for a new trace root. Ids are non-zero.
    pub fn new_root(rng: &mut impl Rng) -> Self {
        SpanContext {
            trace_id: non_zero_id(rng),
            span_id: non_zero_id(rng),
            parent_id: None,
            flags: FLAG_SAMPLED,
        }
    }

    /// Derives the context of a span parented on `self`: same trace, a new
    /// span id, this context's span id as the parent. Flags are inherited.
    pub fn child(&self, rng: &mut impl Rng) -> Self {
        SpanContext {
            trace_id: self.trace_id,
            span_id: non_zero_id(rng),
            parent_id: Some(self.span_id),
            flags: self.flags,
        }
    }

    pub fn is_sampled(&self) -> bool {
        self.flags & FLAG_SAMPLED != 0
    }
}

fn non_zero_id(rng: &mut impl Rng) -> u64 {
    loop {
        let id = rng.gen::<u64>();
        if id != 0 {
            return id;
        }
    }
}

/// Span ids are exported as fixed-width lowercase hex, the same encoding the
/// carrier uses on the wire.
pub(crate) mod hex_id {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(id: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{id:016x}"))
    }

    pub fn serialize_opt<S: Serializer>(
        id: &Option<u64>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match id {
            Some(id) => serialize(id, serializer),
            None => serializer.serialize_none(),
        }
    }
}
