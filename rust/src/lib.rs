//! Allocation and scheduling of task graphs on heterogeneous processing elements.
//!
//! A task graph (DAG with data volumes on its edges) is mapped onto instances of
//! PE types linked by communication channels. The crate provides:
//! - a greedy allocation engine with pluggable [`Strategy`] selection and
//!   adaptive scoring weights;
//! - a schedule optimizer that lowers cost under a time ceiling;
//! - a priority ordering mode for graphs with unpredictable tasks.
//!
//! [`run`] is the single entry point; [`parse_graph`] reads the textual format.

pub mod channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod logging;
pub mod models;
pub mod parser;
pub mod registry;
pub mod standardize;
pub mod strategy;
pub mod tuner;
pub mod unpredicted;

#[cfg(feature = "python")]
mod python;

pub use config::{AllocatorConfig, ConfigError, Mode};
pub use engine::{
    run, AbortReason, AllocationEngine, OptimizationOutcome, PlanState, ScheduleOptimizer,
};
pub use error::{AllocationError, EngineError};
pub use graph::{GraphError, TaskGraph};
pub use models::{
    ChannelId, ChannelSpec, GraphInput, PeCategory, PeType, PeTypeId, PriorityReport, RunReport,
    ScheduleReport, ScheduledTask, TaskId,
};
pub use parser::{parse_graph, ParseError};
pub use registry::{InstanceId, ResourceRegistry};
pub use standardize::NumericError;
pub use strategy::Strategy;
pub use tuner::Weights;
pub use unpredicted::prioritize;
