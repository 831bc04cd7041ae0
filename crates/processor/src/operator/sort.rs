//! Buffer-everything sort
//!
//! The whole stream is held in memory until upstream completes, so this is
//! only suitable for bounded input such as a single device export.

use super::{link, Emitter, EventStream, Observer};
use crate::error::{ProcessorError, Result};
use futures::stream::Stream;
use std::cmp::Ordering;
use tracing::debug;

/// Collect the stream, sort it with `compare`, then re-emit it
///
/// The sort is stable. If upstream fails before completing, the error is
/// forwarded and nothing is emitted.
pub fn sort<T, S, F>(upstream: S, compare: F) -> EventStream<T>
where
    T: Send + 'static,
    S: Stream<Item = Result<T>> + Send + 'static,
    F: FnMut(&T, &T) -> Ordering + Send + 'static,
{
    link(upstream, move |out| SortBuffer {
        items: Vec::new(),
        compare,
        out,
    })
}

struct SortBuffer<T, F> {
    items: Vec<T>,
    compare: F,
    out: Emitter<T>,
}

impl<T, F> Observer<T> for SortBuffer<T, F>
where
    T: Send,
    F: FnMut(&T, &T) -> Ordering + Send,
{
    fn on_next(&mut self, item: T) {
        self.items.push(item);
    }

    fn on_error(&mut self, error: ProcessorError) {
        debug!(buffered = self.items.len(), "discarding sort buffer after upstream error");
        self.items.clear();
        self.out.error(error);
    }

    fn on_completed(&mut self) {
        let mut items = std::mem::take(&mut self.items);
        let compare = &mut self.compare;
        items.sort_by(|a, b| compare(a, b));
        debug!(count = items.len(), "emitting sorted stream");
        for item in items {
            self.out.next(item);
        }
        self.out.complete();
    }
}
