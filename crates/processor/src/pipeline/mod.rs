//! Ingest pipeline composition
//!
//! A pipeline glues the operator library and the generic stages together:
//! - partition decoded events with `split_merge`
//! - run a temp-basal joiner per partition
//! - optionally sort the merged stream by timestamp
//! - assign every event its id
//!
//! # Example
//!
//! ```rust
//! use futures::{executor::block_on, stream, StreamExt};
//! use ingest_types::{fields, Event};
//! use processor::pipeline::PipelineBuilder;
//! use processor::ProcessorResult;
//!
//! # fn example() -> ProcessorResult<()> {
//! let pipeline = PipelineBuilder::new().with_name("meter-upload").build()?;
//!
//! let decoded: Vec<ProcessorResult<Event>> = vec![
//!     Ok(Event::new("smbg").with(fields::DEVICE_ID, "meter-1").with(fields::TS, 1_000)),
//! ];
//! let events: Vec<ProcessorResult<Event>> =
//!     block_on(pipeline.run(stream::iter(decoded)).collect());
//! assert!(events[0].as_ref().unwrap().id().is_some());
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod builder;
pub mod order;
pub mod partition;
pub mod stats;

pub use builder::{Pipeline, PipelineBuilder};
pub use order::compare_by_time;
pub use partition::{PartitionKey, PartitionStrategy};
pub use stats::{PipelineStats, SharedStats};
