//! Deterministic, content-derived event identifiers
//!
//! Each event type has a recipe: the ordered list of fields whose values
//! identify a record of that type. The values are concatenated, hashed with
//! SHA-1 and encoded as lowercase base32hex, so the same record decoded twice
//! always gets the same id and a downstream store can deduplicate on it.

pub mod id;
pub mod recipe;

pub use id::EventId;
pub use recipe::{Recipe, RecipeTable};

use crate::error::{ProcessorError, Result};
use crate::operator::{link, Emitter, EventStream, Observer};
use futures::stream::Stream;
use ingest_types::Event;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace};

/// Assigns ids to events from a shared [`RecipeTable`]
#[derive(Debug, Clone)]
pub struct Idifier {
    recipes: Arc<RecipeTable>,
}

impl Default for Idifier {
    fn default() -> Self {
        Self::new(Arc::new(RecipeTable::standard()))
    }
}

impl Idifier {
    pub fn new(recipes: Arc<RecipeTable>) -> Self {
        Self { recipes }
    }

    pub fn recipes(&self) -> &RecipeTable {
        &self.recipes
    }

    /// Compute the id the event would be assigned, without touching it
    ///
    /// Fails with [`ProcessorError::UnknownEventType`] when no recipe exists
    /// for the event's type and [`ProcessorError::MissingField`] when a recipe
    /// field is absent or null.
    pub fn compute_id(&self, event: &Event) -> Result<EventId> {
        let event_type = event.event_type().unwrap_or("<missing>");
        let recipe = self
            .recipes
            .get(event_type)
            .ok_or_else(|| ProcessorError::UnknownEventType {
                event_type: event_type.to_string(),
                ts: event.ts_display(),
            })?;

        let mut parts = Vec::with_capacity(recipe.fields().len());
        for field in recipe.fields() {
            let value = event.get(field).ok_or_else(|| ProcessorError::MissingField {
                event_type: event_type.to_string(),
                field: field.clone(),
                ts: event.ts_display(),
            })?;
            parts.push(value_text(value));
        }
        Ok(EventId::from_parts(parts))
    }

    /// Assign an id unless the event already has one
    pub fn idify(&self, mut event: Event) -> Result<Event> {
        self.idify_in_place(&mut event)?;
        Ok(event)
    }

    pub fn idify_in_place(&self, event: &mut Event) -> Result<()> {
        if event.id().is_some() {
            return Ok(());
        }
        let id = self.compute_id(event)?;
        trace!(id = %id, event_type = ?event.event_type(), "assigned event id");
        event.set_id(id.into_string());
        Ok(())
    }
}

/// Strings verbatim, everything else as compact JSON text
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Idify every event of a stream, terminating on the first failure
pub fn idify_stream<S>(upstream: S, idifier: Arc<Idifier>) -> EventStream<Event>
where
    S: Stream<Item = Result<Event>> + Send + 'static,
{
    link(upstream, move |out| IdifyStage {
        idifier,
        assigned: 0,
        out,
    })
}

struct IdifyStage {
    idifier: Arc<Idifier>,
    assigned: u64,
    out: Emitter<Event>,
}

impl Observer<Event> for IdifyStage {
    fn on_next(&mut self, event: Event) {
        match self.idifier.idify(event) {
            Ok(event) => {
                self.assigned += 1;
                self.out.next(event);
            }
            Err(error) => {
                debug!(error = %error, after = self.assigned, "idify failed");
                self.out.error(error);
            }
        }
    }

    fn on_error(&mut self, error: ProcessorError) {
        self.out.error(error);
    }

    fn on_completed(&mut self) {
        debug!(count = self.assigned, "idify stage completed");
        self.out.complete();
    }
}
