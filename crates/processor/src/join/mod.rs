//! Stateful per-partition joins

pub mod temp_basal;

pub use temp_basal::{join_temp_basals, JoinState, TempBasalJoiner};
