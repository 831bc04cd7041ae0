//! Core types for the device data ingest pipeline
//!
//! This crate provides the generic event record that vendor decoders emit
//! and the processor consumes.

pub mod events;

pub use events::{fields, Event, BASAL, DELIVERY_TEMP, DELIVERY_TEMP_STOP};
