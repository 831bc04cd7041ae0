//! Dynamic keyed routing with completion fan-in
//!
//! [`split_merge`] partitions a stream into keyed sub-streams ([`Flow`]s),
//! hands each flow to a handler exactly when its key is first seen, and merges
//! every handler's output back into one stream.
//!
//! Completion semantics:
//! - upstream completion closes every open flow, and the merged output
//!   completes only once every handler output has completed
//! - an error from upstream, from the selector or from any handler output
//!   terminates the merged output immediately, without draining other flows
//! - within one key, output order is the order the handler produces; across
//!   keys, items interleave as handler outputs become ready

use super::EventStream;
use crate::error::{ProcessorError, Result};
use futures::stream::{self, BoxStream, SelectAll, Stream, StreamExt};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Handler invoked with the key and its flow
pub type KeyedHandler<K, T, U> = Box<dyn FnMut(&K, Flow<T>) -> EventStream<U> + Send>;

/// Handler registered for one key in a routing table
pub type FlowHandler<T, U> = Box<dyn FnMut(Flow<T>) -> EventStream<U> + Send>;

type Router<K, T, U> = Box<dyn FnMut(&K, Flow<T>) -> Result<EventStream<U>> + Send>;

/// Per-key handlers for [`split_merge`]
pub enum Handlers<K, T, U> {
    /// One function serving every key
    ByKeyFunction(KeyedHandler<K, T, U>),
    /// A fixed table of keys; any other key is a configuration error
    ByKeyTable(HashMap<K, FlowHandler<T, U>>),
}

impl<K, T, U> Handlers<K, T, U>
where
    K: Eq + Hash + Debug + Send + 'static,
    T: Send + 'static,
    U: Send + 'static,
{
    /// Serve every key with `handler`
    pub fn by_key<F>(handler: F) -> Self
    where
        F: FnMut(&K, Flow<T>) -> EventStream<U> + Send + 'static,
    {
        Handlers::ByKeyFunction(Box::new(handler))
    }

    /// Start an empty routing table
    pub fn table() -> Self {
        Handlers::ByKeyTable(HashMap::new())
    }

    /// Register a handler for `key`, turning these handlers into a table
    ///
    /// A function-style handler is discarded.
    pub fn route<F>(self, key: K, handler: F) -> Self
    where
        F: FnMut(Flow<T>) -> EventStream<U> + Send + 'static,
    {
        let mut table = match self {
            Handlers::ByKeyTable(table) => table,
            Handlers::ByKeyFunction(_) => HashMap::new(),
        };
        table.insert(key, Box::new(handler));
        Handlers::ByKeyTable(table)
    }

    fn into_router(self) -> Router<K, T, U> {
        match self {
            Handlers::ByKeyFunction(mut handler) => {
                let router: Router<K, T, U> =
                    Box::new(move |key: &K, flow: Flow<T>| Ok(handler(key, flow)));
                router
            }
            Handlers::ByKeyTable(mut table) => {
                let router: Router<K, T, U> =
                    Box::new(move |key: &K, flow: Flow<T>| match table.get_mut(key) {
                        Some(handler) => Ok(handler(flow)),
                        None => Err(ProcessorError::UnknownPartition {
                            key: format!("{key:?}"),
                        }),
                    });
                router
            }
        }
    }
}

/// The keyed sub-stream handed to a handler
///
/// A flow completes when the routed upstream completes. It never errors: an
/// upstream error terminates the merged output directly.
pub struct Flow<T> {
    receiver: mpsc::UnboundedReceiver<T>,
}

impl<T> Stream for Flow<T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx).map(|item| item.map(Ok))
    }
}

/// Output of one handler, tagged so the router sees per-key completion
enum FlowOutput<K, U> {
    Item(Result<U>),
    Done(K),
}

/// Route each element to a per-key flow and merge the handlers' outputs
///
/// `selector` computes the key of every element; a selector error is handled
/// exactly like an upstream error. The handler for a key runs when its first
/// element arrives, and again only if a later element arrives after that
/// key's output has already completed.
///
/// A handler may finish its output without draining its flow. Elements
/// routed to that key until the completion is observed are discarded.
pub fn split_merge<T, U, K, S, Sel>(
    upstream: S,
    selector: Sel,
    handlers: Handlers<K, T, U>,
) -> EventStream<U>
where
    T: Send + 'static,
    U: Send + 'static,
    K: Eq + Hash + Clone + Debug + Send + 'static,
    S: Stream<Item = Result<T>> + Send + 'static,
    Sel: FnMut(&T) -> Result<K> + Send + 'static,
{
    SplitMerge {
        upstream: Some(upstream.boxed()),
        selector: Box::new(selector),
        router: handlers.into_router(),
        flows: HashMap::new(),
        outputs: SelectAll::new(),
        terminated: false,
    }
    .boxed()
}

struct SplitMerge<K, T, U> {
    /// `None` once upstream has completed
    upstream: Option<EventStream<T>>,
    selector: Box<dyn FnMut(&T) -> Result<K> + Send>,
    router: Router<K, T, U>,
    /// Open flows; the sender is dropped once upstream completes
    flows: HashMap<K, Option<mpsc::UnboundedSender<T>>>,
    outputs: SelectAll<BoxStream<'static, FlowOutput<K, U>>>,
    terminated: bool,
}

impl<K, T, U> SplitMerge<K, T, U>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
    T: Send + 'static,
    U: Send + 'static,
{
    fn open_flow(&mut self, key: &K) -> Result<()> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let output = (self.router)(key, Flow { receiver })?;

        let done_key = key.clone();
        let tagged = output
            .map(FlowOutput::Item)
            .chain(stream::once(async move { FlowOutput::Done(done_key) }))
            .boxed();
        self.outputs.push(tagged);
        self.flows.insert(key.clone(), Some(sender));
        debug!(key = ?key, open_flows = self.flows.len(), "opened flow");
        Ok(())
    }

    fn route(&mut self, item: T) -> Result<()> {
        let key = (self.selector)(&item)?;
        if !self.flows.contains_key(&key) {
            self.open_flow(&key)?;
        }
        if let Some(Some(sender)) = self.flows.get(&key) {
            if sender.send(item).is_err() {
                debug!(key = ?key, "handler output finished before its flow, element discarded");
            }
        }
        Ok(())
    }

    fn close_flows(&mut self) {
        for sender in self.flows.values_mut() {
            sender.take();
        }
    }

    fn terminate(&mut self) {
        self.terminated = true;
        self.upstream = None;
        self.flows.clear();
        self.outputs = SelectAll::new();
    }

    fn fail(&mut self, error: ProcessorError) -> Poll<Option<Result<U>>> {
        warn!(error = %error, open_flows = self.flows.len(), "split-merge terminated by error");
        self.terminate();
        Poll::Ready(Some(Err(error)))
    }

    fn complete(&mut self) -> Poll<Option<Result<U>>> {
        debug!("split-merge completed");
        self.terminate();
        Poll::Ready(None)
    }
}

// No field is structurally pinned.
impl<K, T, U> Unpin for SplitMerge<K, T, U> {}

impl<K, T, U> Stream for SplitMerge<K, T, U>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
    T: Send + 'static,
    U: Send + 'static,
{
    type Item = Result<U>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.terminated {
            return Poll::Ready(None);
        }

        loop {
            // Drain handler outputs first so completions are seen promptly.
            match this.outputs.poll_next_unpin(cx) {
                Poll::Ready(Some(FlowOutput::Item(Ok(item)))) => return Poll::Ready(Some(Ok(item))),
                Poll::Ready(Some(FlowOutput::Item(Err(error)))) => return this.fail(error),
                Poll::Ready(Some(FlowOutput::Done(key))) => {
                    this.flows.remove(&key);
                    debug!(key = ?key, open_flows = this.flows.len(), "flow output completed");
                    if this.flows.is_empty() && this.upstream.is_none() {
                        return this.complete();
                    }
                    continue;
                }
                Poll::Ready(None) | Poll::Pending => {}
            }

            let Some(upstream) = this.upstream.as_mut() else {
                // Waiting on the remaining handler outputs.
                return Poll::Pending;
            };

            match upstream.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(item))) => {
                    if let Err(error) = this.route(item) {
                        return this.fail(error);
                    }
                }
                Poll::Ready(Some(Err(error))) => return this.fail(error),
                Poll::Ready(None) => {
                    this.upstream = None;
                    if this.flows.is_empty() {
                        return this.complete();
                    }
                    debug!(open_flows = this.flows.len(), "upstream completed, closing flows");
                    this.close_flows();
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
