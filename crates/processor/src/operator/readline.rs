//! Line framing over byte chunks

use super::{link, Emitter, EventStream, Observer};
use crate::error::{ProcessorError, Result};
use futures::stream::Stream;
use tracing::trace;

/// What to do with the bytes left after the last line feed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrailingFragment {
    /// Emit the remainder only if it is not empty
    #[default]
    NonEmpty,
    /// Always emit the remainder, even an empty string
    Always,
}

/// Frame a stream of byte chunks into lines
///
/// Each emitted line keeps its trailing `\n`. On completion the unterminated
/// remainder, if any, is emitted as the final element. An upstream error
/// discards the pending buffer.
pub fn readline<B, S>(upstream: S) -> EventStream<String>
where
    B: AsRef<[u8]> + Send + 'static,
    S: Stream<Item = Result<B>> + Send + 'static,
{
    readline_with(upstream, TrailingFragment::default())
}

/// [`readline`] with an explicit trailing-fragment policy
pub fn readline_with<B, S>(upstream: S, trailing: TrailingFragment) -> EventStream<String>
where
    B: AsRef<[u8]> + Send + 'static,
    S: Stream<Item = Result<B>> + Send + 'static,
{
    link(upstream, move |out| LineFramer {
        buffer: Vec::new(),
        trailing,
        out,
    })
}

struct LineFramer {
    buffer: Vec<u8>,
    trailing: TrailingFragment,
    out: Emitter<String>,
}

impl LineFramer {
    fn emit(&mut self, line: Vec<u8>) -> bool {
        match String::from_utf8(line) {
            Ok(line) => {
                self.out.next(line);
                true
            }
            Err(e) => {
                self.buffer.clear();
                self.out.error(e.into());
                false
            }
        }
    }
}

impl<B: AsRef<[u8]>> Observer<B> for LineFramer {
    fn on_next(&mut self, chunk: B) {
        // Only the newly appended bytes can hold a line feed.
        let mut search_from = self.buffer.len();
        self.buffer.extend_from_slice(chunk.as_ref());

        let mut consumed = 0;
        let mut lines = 0usize;
        while let Some(offset) = self.buffer[search_from..].iter().position(|b| *b == b'\n') {
            let end = search_from + offset + 1;
            let line = self.buffer[consumed..end].to_vec();
            consumed = end;
            search_from = end;
            lines += 1;
            if !self.emit(line) {
                return;
            }
        }
        self.buffer.drain(..consumed);
        trace!(lines, pending = self.buffer.len(), "framed chunk");
    }

    fn on_error(&mut self, error: ProcessorError) {
        self.buffer.clear();
        self.out.error(error);
    }

    fn on_completed(&mut self) {
        let rest = std::mem::take(&mut self.buffer);
        if (!rest.is_empty() || self.trailing == TrailingFragment::Always) && !self.emit(rest) {
            return;
        }
        self.out.complete();
    }
}
