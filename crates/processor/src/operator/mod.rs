//! Push-based stream operators
//!
//! Every operator takes a stream of `Result<T>` and returns an [`EventStream`].
//! The reactive value/error/completion contract maps onto the stream as:
//! - next value: `Some(Ok(value))`
//! - error: `Some(Err(error))`, after which the stream yields `None`
//! - completion: `None`
//!
//! Streams are cold and cancellation is by drop: dropping a result stream
//! drops every upstream stream, flow and writer task it owns.
//!
//! Operators are available as free functions and as methods through
//! [`OperatorExt`]:
//!
//! ```rust
//! use futures::{stream, StreamExt};
//! use processor::operator::OperatorExt;
//! use processor::ProcessorResult;
//!
//! # futures::executor::block_on(async {
//! let chunks: Vec<ProcessorResult<String>> = vec![Ok("a\nb".to_string()), Ok("c\n".to_string())];
//! let chunks = stream::iter(chunks);
//! let lines: Vec<ProcessorResult<String>> = chunks.readline().collect().await;
//! assert_eq!(lines.len(), 2);
//! # });
//! ```

pub mod link;
pub mod pass_through;
pub mod readline;
pub mod sort;
pub mod split_merge;

pub use link::{link, Emitter, Observer};
pub use pass_through::pass_through;
pub use readline::{readline, readline_with, TrailingFragment};
pub use sort::sort;
pub use split_merge::{split_merge, Flow, Handlers};

use crate::error::Result;
use bytes::Bytes;
use futures::stream::{BoxStream, Stream};
use std::cmp::Ordering;
use std::fmt::Debug;
use std::hash::Hash;
use tokio::io::{AsyncRead, AsyncWrite};

/// Boxed stream of fallible items, the common currency of every operator
pub type EventStream<T> = BoxStream<'static, Result<T>>;

/// Map every element, dropping those for which `f` returns `None`
///
/// Order is preserved; errors and completion pass through unchanged.
pub fn keep<T, U, S, F>(upstream: S, f: F) -> EventStream<U>
where
    T: Send + 'static,
    U: Send + 'static,
    S: Stream<Item = Result<T>> + Send + 'static,
    F: FnMut(T) -> Option<U> + Send + 'static,
{
    link(upstream, move |out| Keep { f, out })
}

struct Keep<F, U> {
    f: F,
    out: Emitter<U>,
}

impl<T, U, F> Observer<T> for Keep<F, U>
where
    U: Send,
    F: FnMut(T) -> Option<U> + Send,
{
    fn on_next(&mut self, item: T) {
        if let Some(mapped) = (self.f)(item) {
            self.out.next(mapped);
        }
    }

    fn on_error(&mut self, error: crate::error::ProcessorError) {
        self.out.error(error);
    }

    fn on_completed(&mut self) {
        self.out.complete();
    }
}

/// Method-style access to the operator library
pub trait OperatorExt<T>: Stream<Item = Result<T>> + Send + Sized + 'static
where
    T: Send + 'static,
{
    /// See [`keep`]
    fn keep<U, F>(self, f: F) -> EventStream<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> Option<U> + Send + 'static,
    {
        keep(self, f)
    }

    /// See [`link()`]
    fn link<U, O, F>(self, make: F) -> EventStream<U>
    where
        U: Send + 'static,
        O: Observer<T> + 'static,
        F: FnOnce(Emitter<U>) -> O,
    {
        link(self, make)
    }

    /// See [`readline()`]
    fn readline(self) -> EventStream<String>
    where
        T: AsRef<[u8]>,
    {
        readline(self)
    }

    /// See [`sort()`]
    fn sort<F>(self, compare: F) -> EventStream<T>
    where
        F: FnMut(&T, &T) -> Ordering + Send + 'static,
    {
        sort(self, compare)
    }

    /// See [`pass_through()`]
    fn pass_through<C>(self, channel: C) -> EventStream<Bytes>
    where
        T: AsRef<[u8]>,
        C: AsyncRead + AsyncWrite + Send + 'static,
    {
        pass_through(self, channel)
    }

    /// See [`split_merge()`]
    fn split_merge<K, U, Sel>(self, selector: Sel, handlers: Handlers<K, T, U>) -> EventStream<U>
    where
        K: Eq + Hash + Clone + Debug + Send + 'static,
        U: Send + 'static,
        Sel: FnMut(&T) -> Result<K> + Send + 'static,
    {
        split_merge(self, selector, handlers)
    }
}

impl<T, S> OperatorExt<T> for S
where
    T: Send + 'static,
    S: Stream<Item = Result<T>> + Send + Sized + 'static,
{
}
