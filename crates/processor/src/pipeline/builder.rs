//! Pipeline builder for fluent API configuration

use crate::config::ProcessorConfig;
use crate::error::{ProcessorError, Result};
use crate::idify::{idify_stream, Idifier, RecipeTable};
use crate::join::join_temp_basals;
use crate::operator::{
    keep, link, readline, sort, split_merge, Emitter, EventStream, Flow, Handlers, Observer,
};
use crate::pipeline::order::compare_by_time;
use crate::pipeline::partition::{PartitionKey, PartitionStrategy};
use crate::pipeline::stats::{PipelineStats, SharedStats};
use futures::stream::{Stream, StreamExt};
use ingest_types::Event;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builder for constructing ingest pipelines
///
/// # Example
///
/// ```rust
/// use processor::pipeline::{PartitionStrategy, PipelineBuilder};
///
/// # fn example() -> processor::ProcessorResult<()> {
/// let pipeline = PipelineBuilder::new()
///     .with_name("carelink")
///     .with_partition_strategy(PartitionStrategy::Device)
///     .with_sort_by_time(true)
///     .build()?;
/// assert_eq!(pipeline.name(), "carelink");
/// # Ok(())
/// # }
/// ```
pub struct PipelineBuilder {
    config: ProcessorConfig,
    idifier: Option<Idifier>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    /// Create a new pipeline builder with default configuration
    pub fn new() -> Self {
        Self {
            config: ProcessorConfig::default(),
            idifier: None,
        }
    }

    /// Set the pipeline name
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.name = name.into();
        self
    }

    /// Replace the whole configuration
    pub fn with_config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_partition_strategy(mut self, strategy: PartitionStrategy) -> Self {
        self.config.partition = strategy;
        self
    }

    /// Enable or disable the total sort by `ts`
    pub fn with_sort_by_time(mut self, enabled: bool) -> Self {
        self.config.sort_by_time = enabled;
        self
    }

    /// Enable or disable temp-basal joining
    pub fn with_temp_basal_join(mut self, enabled: bool) -> Self {
        self.config.join_temp_basals = enabled;
        self
    }

    /// Use a prebuilt idifier instead of one built from the configured recipes
    pub fn with_idifier(mut self, idifier: Idifier) -> Self {
        self.idifier = Some(idifier);
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Result<Pipeline> {
        self.config.validate()?;

        let idifier = match self.idifier {
            Some(idifier) => idifier,
            None => {
                let recipes = RecipeTable::standard().with_extra(&self.config.idify.recipes)?;
                Idifier::new(Arc::new(recipes))
            }
        };

        Ok(Pipeline {
            config: Arc::new(self.config),
            idifier: Arc::new(idifier),
            stats: PipelineStats::shared(),
        })
    }
}

/// A configured ingest pipeline
///
/// A pipeline can be run any number of times; statistics accumulate across
/// runs.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Arc<ProcessorConfig>,
    idifier: Arc<Idifier>,
    stats: SharedStats,
}

impl Pipeline {
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn idifier(&self) -> &Idifier {
        &self.idifier
    }

    /// Snapshot of the counters so far
    pub fn stats(&self) -> PipelineStats {
        self.stats.read().clone()
    }

    /// Turn decoded events into finalized events
    ///
    /// Events are partitioned, temp basals are joined per partition, the
    /// merged stream is optionally sorted by `ts`, and every event gets an id.
    pub fn run<S>(&self, input: S) -> EventStream<Event>
    where
        S: Stream<Item = Result<Event>> + Send + 'static,
    {
        info!(
            pipeline = %self.config.name,
            partition = ?self.config.partition,
            join_temp_basals = self.config.join_temp_basals,
            sort_by_time = self.config.sort_by_time,
            "starting pipeline run"
        );

        let stats = Arc::clone(&self.stats);
        let counted = keep(input, move |event: Event| {
            stats.write().inc_events_in();
            Some(event)
        });

        let strategy = self.config.partition;
        let join = self.config.join_temp_basals;
        let idifier = Arc::clone(&self.idifier);
        let stats = Arc::clone(&self.stats);
        let handlers = Handlers::by_key(move |key: &PartitionKey, flow: Flow<Event>| {
            stats.write().inc_partitions_opened();
            debug!(partition = %key, "opened partition");
            if join {
                join_temp_basals(flow, Arc::clone(&idifier), Some(Arc::clone(&stats)))
            } else {
                flow.boxed()
            }
        });
        let merged = split_merge(
            counted,
            move |event: &Event| Ok(PartitionKey::for_event(event, strategy)),
            handlers,
        );

        let ordered = if self.config.sort_by_time {
            sort(merged, compare_by_time)
        } else {
            merged
        };

        let stats = Arc::clone(&self.stats);
        let name = self.config.name.clone();
        link(idify_stream(ordered, Arc::clone(&self.idifier)), move |out| RunSummary {
            name,
            stats,
            out,
        })
    }

    /// Decode newline-delimited JSON objects and run them through the pipeline
    ///
    /// Blank lines are skipped. A line that is not a JSON object terminates
    /// the stream with [`ProcessorError::Serialization`].
    pub fn run_json_lines<B, S>(&self, chunks: S) -> EventStream<Event>
    where
        B: AsRef<[u8]> + Send + 'static,
        S: Stream<Item = Result<B>> + Send + 'static,
    {
        let lines = keep(readline(chunks), |line: String| {
            let trimmed = line.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        });
        let events = link(lines, |out| JsonLineDecoder { line_no: 0, out });
        self.run(events)
    }
}

/// Counts finalized events and reports the run when it completes
struct RunSummary {
    name: String,
    stats: SharedStats,
    out: Emitter<Event>,
}

impl Observer<Event> for RunSummary {
    fn on_next(&mut self, event: Event) {
        self.stats.write().inc_events_out();
        self.out.next(event);
    }

    fn on_error(&mut self, error: ProcessorError) {
        warn!(pipeline = %self.name, error = %error, "pipeline run failed");
        self.out.error(error);
    }

    fn on_completed(&mut self) {
        let stats = self.stats.read().clone();
        info!(
            pipeline = %self.name,
            events_in = stats.events_in,
            events_out = stats.events_out,
            events_absorbed = stats.events_absorbed(),
            temp_stops_synthesized = stats.temp_stops_synthesized,
            "pipeline run completed"
        );
        self.out.complete();
    }
}

struct JsonLineDecoder {
    line_no: u64,
    out: Emitter<Event>,
}

impl Observer<String> for JsonLineDecoder {
    fn on_next(&mut self, line: String) {
        self.line_no += 1;
        match Event::from_json_str(&line) {
            Ok(event) => self.out.next(event),
            Err(e) => {
                debug!(record = self.line_no, error = %e, "undecodable line");
                self.out.error(ProcessorError::Serialization(format!(
                    "record {}: {e}",
                    self.line_no
                )));
            }
        }
    }

    fn on_error(&mut self, error: ProcessorError) {
        self.out.error(error);
    }

    fn on_completed(&mut self) {
        self.out.complete();
    }
}
