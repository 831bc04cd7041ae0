//! Observer inversion for building custom operators
//!
//! [`link`] hands the caller an output sink ([`Emitter`]) and subscribes the
//! [`Observer`] it returns to the upstream stream. The observer is driven from
//! inside `poll_next`, so operators built this way never spawn work and never
//! block: each upstream delivery runs the observer synchronously and anything
//! it emits is buffered until the consumer polls it out.

use super::EventStream;
use crate::error::{ProcessorError, Result};
use futures::stream::{Stream, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::trace;

/// Receives the three channels of an upstream stream
pub trait Observer<T>: Send {
    /// Called for every upstream value
    fn on_next(&mut self, item: T);

    /// Called once if upstream fails; nothing follows
    fn on_error(&mut self, error: ProcessorError);

    /// Called once when upstream completes
    fn on_completed(&mut self);
}

/// Output sink handed to a linked observer
///
/// Once [`Emitter::error`] or [`Emitter::complete`] has been called the sink
/// is closed, further values are ignored and the upstream subscription is
/// dropped on the next poll.
pub struct Emitter<U> {
    shared: Arc<Mutex<EmitterState<U>>>,
}

struct EmitterState<U> {
    queue: VecDeque<Result<U>>,
    closed: bool,
}

impl<U> Clone for Emitter<U> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<U> Emitter<U> {
    fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(EmitterState {
                queue: VecDeque::new(),
                closed: false,
            })),
        }
    }

    /// Emit a value
    pub fn next(&self, item: U) {
        let mut state = self.shared.lock();
        if !state.closed {
            state.queue.push_back(Ok(item));
        }
    }

    /// Emit a terminal error
    pub fn error(&self, error: ProcessorError) {
        let mut state = self.shared.lock();
        if !state.closed {
            state.queue.push_back(Err(error));
            state.closed = true;
        }
    }

    /// Signal completion
    pub fn complete(&self) {
        self.shared.lock().closed = true;
    }

    /// Whether error or completion has been signalled
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    fn pop(&self) -> Option<Result<U>> {
        self.shared.lock().queue.pop_front()
    }
}

/// Build a new stream from an observer subscribed on `upstream`
///
/// `make` receives the output sink and returns the observer. Dropping the
/// returned stream drops the upstream subscription.
pub fn link<T, U, S, O, F>(upstream: S, make: F) -> EventStream<U>
where
    T: Send + 'static,
    U: Send + 'static,
    S: Stream<Item = Result<T>> + Send + 'static,
    O: Observer<T> + 'static,
    F: FnOnce(Emitter<U>) -> O,
{
    let emitter = Emitter::new();
    let observer = make(emitter.clone());
    LinkStream {
        upstream: Some(upstream.boxed()),
        observer: Box::new(observer),
        emitter,
    }
    .boxed()
}

struct LinkStream<T, U> {
    upstream: Option<EventStream<T>>,
    observer: Box<dyn Observer<T>>,
    emitter: Emitter<U>,
}

impl<T, U> Stream for LinkStream<T, U> {
    type Item = Result<U>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(item) = this.emitter.pop() {
                return Poll::Ready(Some(item));
            }
            if this.emitter.is_closed() {
                if this.upstream.take().is_some() {
                    trace!("observer closed early, dropping upstream");
                }
                return Poll::Ready(None);
            }
            let Some(upstream) = this.upstream.as_mut() else {
                return Poll::Ready(None);
            };
            match upstream.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(item))) => this.observer.on_next(item),
                Poll::Ready(Some(Err(error))) => {
                    this.upstream = None;
                    this.observer.on_error(error);
                }
                Poll::Ready(None) => {
                    this.upstream = None;
                    this.observer.on_completed();
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{executor::block_on, stream};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Emits running totals and stops after the total passes a limit
    struct RunningTotal {
        total: i64,
        limit: i64,
        out: Emitter<i64>,
    }

    impl Observer<i64> for RunningTotal {
        fn on_next(&mut self, item: i64) {
            self.total += item;
            self.out.next(self.total);
            if self.total > self.limit {
                self.out.complete();
            }
        }

        fn on_error(&mut self, error: ProcessorError) {
            self.out.error(error);
        }

        fn on_completed(&mut self) {
            self.out.complete();
        }
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_link_runs_stateful_observer() {
        let items: Vec<Result<i64>> = vec![Ok(1), Ok(2), Ok(3)];
        let input = stream::iter(items);
        let out: Vec<i64> = block_on(
            link(input, |out| RunningTotal { total: 0, limit: 100, out })
                .map(|r| r.unwrap())
                .collect(),
        );
        assert_eq!(out, vec![1, 3, 6]);
    }

    #[test]
    fn test_early_completion_drops_upstream() {
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(dropped.clone());
        let input = stream::iter(1i64..).map(move |n| -> Result<i64> {
            let _keep_alive = &flag;
            Ok(n)
        });

        let out: Vec<i64> = block_on(
            link(input, |out| RunningTotal { total: 0, limit: 5, out })
                .map(|r| r.unwrap())
                .collect(),
        );
        assert_eq!(out, vec![1, 3, 6]);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_dropping_result_drops_upstream() {
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(dropped.clone());
        let input = stream::pending::<Result<i64>>().map(move |r: Result<i64>| {
            let _keep_alive = &flag;
            r
        });

        let linked = link(input, |out| RunningTotal { total: 0, limit: 5, out });
        assert!(!dropped.load(Ordering::SeqCst));
        drop(linked);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_error_is_terminal() {
        let items: Vec<Result<i64>> = vec![
            Ok(1),
            Err(ProcessorError::configuration("bad input")),
            Ok(2),
        ];
        let input = stream::iter(items);
        let out: Vec<Result<i64>> =
            block_on(link(input, |out| RunningTotal { total: 0, limit: 100, out }).collect());
        assert_eq!(out.len(), 2);
        assert_eq!(*out[0].as_ref().unwrap(), 1);
        assert!(out[1].is_err());
    }
}
