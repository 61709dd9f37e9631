//! Allocation failures and the crate-wide error type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::graph::GraphError;
use crate::models::{PeTypeId, TaskId};
use crate::parser::ParseError;
use crate::standardize::NumericError;

/// Fatal allocation failures. None of them is retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AllocationError {
    #[error("No channel connects PE type {parent_type:?} with PE type {child_type}")]
    NoChannelAvailable {
        /// `None` for a root instance looking for its first channel.
        parent_type: Option<PeTypeId>,
        child_type: PeTypeId,
    },
    #[error("Task T{task} cannot be placed: parent T{parent} has no resource allocated")]
    ParentUnresolved { task: TaskId, parent: TaskId },
    #[error("Task T{task} is unpredictable but the catalog has no universal PE type")]
    NoEligibleType { task: TaskId },
}

/// Any error that stops a run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error(transparent)]
    Numeric(#[from] NumericError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
