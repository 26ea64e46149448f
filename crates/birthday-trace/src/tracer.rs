// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The tracer capability.
//!
//! Every component that starts spans takes a [`Tracer`] explicitly (cheap to
//! clone); there is no process-global tracer to fetch from.

use std::collections::HashMap;

use crate::carrier::{self, Carrier};
use crate::context::SpanContext;
use crate::span::{RefType, Span, SpanSender, TagValue};

#[derive(Debug, Clone)]
pub struct Tracer {
    sender: SpanSender,
}

impl Tracer {
    pub fn new(sender: SpanSender) -> Self {
        Tracer { sender }
    }

    /// Starts building a span for the named operation. With no parent
    /// relation the span becomes a new trace root.
    pub fn span(&self, operation: &str) -> SpanBuilder<'_> {
        SpanBuilder {
            tracer: self,
            operation: operation.to_string(),
            reference: None,
            tags: HashMap::new(),
        }
    }

    pub fn inject(&self, ctx: &SpanContext, into: &mut impl Carrier) {
        carrier::inject(ctx, into);
    }

    pub fn extract(&self, from: &impl Carrier) -> Option<SpanContext> {
        carrier::extract(from)
    }
}

/// Options accumulated before a span starts: at most one parent relation,
/// plus initial tags.
pub struct SpanBuilder<'a> {
    tracer: &'a Tracer,
    operation: String,
    reference: Option<(RefType, SpanContext)>,
    tags: HashMap<String, TagValue>,
}

impl SpanBuilder<'_> {
    /// Parents the span as strictly nested work within `parent`.
    pub fn child_of(mut self, parent: &SpanContext) -> Self {
        self.reference = Some((RefType::ChildOf, parent.clone()));
        self
    }

    /// Parents the span as causally after, but not nested within, `parent`.
    pub fn follows_from(mut self, parent: &SpanContext) -> Self {
        self.reference = Some((RefType::FollowsFrom, parent.clone()));
        self
    }

    pub fn tag(mut self, key: &str, value: impl Into<TagValue>) -> Self {
        self.tags.insert(key.to_string(), value.into());
        self
    }

    pub fn start(self) -> Span {
        let mut rng = rand::thread_rng();
        let (context, ref_type) = match self.reference {
            Some((ref_type, parent)) => (parent.child(&mut rng), Some(ref_type)),
            None => (SpanContext::new_root(&mut rng), None),
        };
        Span::new(
            context,
            self.operation,
            ref_type,
            self.tags,
            self.tracer.sender.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn tracer() -> (Tracer, mpsc::UnboundedReceiver<crate::span::FinishedSpan>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Tracer::new(tx), rx)
    }

    #[tokio::test]
    async fn test_root_span_has_no_reference() {
        let (tracer, mut rx) = tracer();
        tracer.span("root").start().finish();
        let finished = rx.recv().await.unwrap();
        assert_eq!(finished.ref_type, None);
        assert_eq!(finished.context.parent_id, None);
    }

    #[tokio::test]
    async fn test_child_of_links_to_parent() {
        let (tracer, mut rx) = tracer();
        let parent = tracer.span("parent").start();
        let parent_ctx = parent.context().clone();
        tracer.span("child").child_of(&parent_ctx).start().finish();

        let finished = rx.recv().await.unwrap();
        assert_eq!(finished.ref_type, Some(RefType::ChildOf));
        assert_eq!(finished.context.trace_id, parent_ctx.trace_id);
        assert_eq!(finished.context.parent_id, Some(parent_ctx.span_id));
    }

    #[tokio::test]
    async fn test_follows_from_links_to_predecessor() {
        let (tracer, mut rx) = tracer();
        let first = tracer.span("first").start();
        let first_ctx = first.context().clone();
        first.finish();
        tracer
            .span("second")
            .follows_from(&first_ctx)
            .start()
            .finish();

        let _first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(second.ref_type, Some(RefType::FollowsFrom));
        assert_eq!(second.context.trace_id, first_ctx.trace_id);
        assert_eq!(second.context.parent_id, Some(first_ctx.span_id));
    }

    #[tokio::test]
    async fn test_builder_tags_are_kept() {
        let (tracer, mut rx) = tracer();
        tracer
            .span("tagged")
            .tag("span.kind", "server")
            .start()
            .finish();
        let finished = rx.recv().await.unwrap();
        assert_eq!(finished.tags["span.kind"], TagValue::String("server".into()));
    }

    #[tokio::test]
    async fn test_every_start_is_paired_with_one_report() {
        // Spans must be reported exactly once on every exit path, including
        // early returns. Count reports against starts.
        let (tracer, mut rx) = tracer();

        fn fallible(tracer: &Tracer, fail: bool) -> Result<(), &'static str> {
            let mut span = tracer.span("op").start();
            if fail {
                span.set_tag(crate::tags::ERROR, true);
                return Err("boom"); // span dropped -> reported
            }
            span.finish();
            Ok(())
        }

        assert!(fallible(&tracer, false).is_ok());
        assert!(fallible(&tracer, true).is_err());

        let mut reported = 0;
        while rx.try_recv().is_ok() {
            reported += 1;
        }
        assert_eq!(reported, 2);
    }
}
