//! Core data types for the allocator: input catalogs and produced schedules.

use crate::engine::OptimizationOutcome;
use crate::graph::GraphError;
use crate::registry::InstanceId;
use crate::tuner::Weights;

/// Task index (row/column of the adjacency relation).
pub type TaskId = usize;
/// Index into the PE type catalog.
pub type PeTypeId = usize;
/// Index into the channel catalog.
pub type ChannelId = usize;

/// Category flag of a PE type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PeCategory {
    /// General purpose ("HC"), the only category unpredictable tasks may use.
    Universal,
    /// Specialized ("PP").
    Specialized,
}

impl PeCategory {
    /// Decode the catalog flag: 0 = universal, anything else = specialized.
    pub fn from_flag(flag: f64) -> Self {
        if flag == 0.0 {
            PeCategory::Universal
        } else {
            PeCategory::Specialized
        }
    }

    /// Prefix used in instance labels.
    pub fn label_prefix(&self) -> &'static str {
        match self {
            PeCategory::Universal => "HC",
            PeCategory::Specialized => "PP",
        }
    }
}

/// Entry of the PE type catalog.
#[derive(Clone, Debug, PartialEq)]
pub struct PeType {
    /// Unit cost/power figure, paid once per created instance.
    pub unit_cost: f64,
    /// Reserved column of the catalog row, carried through untouched.
    pub reserved: f64,
    pub category: PeCategory,
}

impl PeType {
    pub fn new(unit_cost: f64, category: PeCategory) -> Self {
        Self {
            unit_cost,
            reserved: 0.0,
            category,
        }
    }

    /// Build from a catalog row `(unit_cost, reserved, category_flag)`.
    pub fn from_row(row: &[f64]) -> Result<Self, GraphError> {
        match row {
            [unit_cost, reserved, flag] => Ok(Self {
                unit_cost: *unit_cost,
                reserved: *reserved,
                category: PeCategory::from_flag(*flag),
            }),
            _ => Err(GraphError::ShapeMismatch {
                matrix: "pe_types",
                expected: "3 columns".to_string(),
                found: format!("{} columns", row.len()),
            }),
        }
    }
}

/// Entry of the channel catalog.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelSpec {
    pub cost: f64,
    pub bandwidth: f64,
    /// `connections[pe_type]` is true when the channel can be wired to that type.
    pub connections: Vec<bool>,
}

impl ChannelSpec {
    pub fn new(cost: f64, bandwidth: f64, connections: Vec<bool>) -> Self {
        Self {
            cost,
            bandwidth,
            connections,
        }
    }

    /// Build from a catalog row `(cost, bandwidth, c_0, ..., c_{n_pe-1})`.
    pub fn from_row(row: &[f64], pe_count: usize) -> Result<Self, GraphError> {
        if row.len() != 2 + pe_count {
            return Err(GraphError::ShapeMismatch {
                matrix: "channels",
                expected: format!("{} columns", 2 + pe_count),
                found: format!("{} columns", row.len()),
            });
        }
        Ok(Self {
            cost: row[0],
            bandwidth: row[1],
            connections: row[2..].iter().map(|&c| c != 0.0).collect(),
        })
    }

    /// Whether the channel can be wired to the given PE type.
    #[inline]
    pub fn connects(&self, pe_type: PeTypeId) -> bool {
        self.connections.get(pe_type).copied().unwrap_or(false)
    }
}

/// Everything the engine consumes, as produced by a parser or a binding layer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphInput {
    /// `adjacency[parent][child]`; must describe a DAG.
    pub adjacency: Vec<Vec<bool>>,
    /// Data volume per edge, aligned with `adjacency`.
    pub volumes: Vec<Vec<f64>>,
    pub pe_types: Vec<PeType>,
    /// Execution time per task per PE type.
    pub times: Vec<Vec<f64>>,
    /// Monetary cost per task per PE type.
    pub costs: Vec<Vec<f64>>,
    pub channels: Vec<ChannelSpec>,
    /// Optional per-task "unpredictable" mask.
    pub unpredictable: Option<Vec<bool>>,
}

/// A task placed on a PE instance.
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduledTask {
    pub task_id: TaskId,
    pub instance: InstanceId,
    pub instance_label: String,
    pub pe_type: PeTypeId,
    pub start_time: f64,
    pub end_time: f64,
    /// Predecessor that determined the start time.
    pub best_parent: Option<TaskId>,
    /// Channel carrying the best parent's data (None on a shared instance or for roots).
    pub channel: Option<ChannelId>,
}

/// Result of the plain and ceiling-constrained modes.
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduleReport {
    /// One entry per task, ordered by task id.
    pub scheduled_tasks: Vec<ScheduledTask>,
    pub overall_time: f64,
    pub overall_cost: f64,
    /// Channels attached to at least one instance that hosts a task.
    pub channels_used: Vec<ChannelId>,
    /// Weight vector after the last allocation.
    pub weights: Weights,
    /// Present in ceiling-constrained optimization mode.
    pub optimization: Option<OptimizationOutcome>,
    /// `None` when no time ceiling was given.
    pub time_ceiling_met: Option<bool>,
    /// `None` when no cost ceiling was given.
    pub cost_ceiling_met: Option<bool>,
}

impl ScheduleReport {
    pub fn task(&self, task_id: TaskId) -> Option<&ScheduledTask> {
        self.scheduled_tasks.iter().find(|t| t.task_id == task_id)
    }
}

/// Result of the unpredicted-task mode: a priority order, not a timed schedule.
#[derive(Clone, Debug, PartialEq)]
pub struct PriorityReport {
    /// Chosen PE type per task.
    pub assignments: Vec<PeTypeId>,
    /// Critical-path length per task.
    pub critical_path_lengths: Vec<f64>,
    /// Tasks in emission order (highest critical-path length first).
    pub order: Vec<TaskId>,
}

/// Output of [`crate::run`].
#[derive(Clone, Debug, PartialEq)]
pub enum RunReport {
    Schedule(ScheduleReport),
    Priority(PriorityReport),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_flag() {
        assert_eq!(PeCategory::from_flag(0.0), PeCategory::Universal);
        assert_eq!(PeCategory::from_flag(1.0), PeCategory::Specialized);
        assert_eq!(PeCategory::Universal.label_prefix(), "HC");
        assert_eq!(PeCategory::Specialized.label_prefix(), "PP");
    }

    #[test]
    fn test_pe_type_from_row() {
        let pe = PeType::from_row(&[120.0, 0.0, 1.0]).unwrap();
        assert_eq!(pe.unit_cost, 120.0);
        assert_eq!(pe.category, PeCategory::Specialized);

        let err = PeType::from_row(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, GraphError::ShapeMismatch { matrix: "pe_types", .. }));
    }

    #[test]
    fn test_channel_from_row() {
        let channel = ChannelSpec::from_row(&[5.0, 2.0, 1.0, 0.0, 1.0], 3).unwrap();
        assert_eq!(channel.cost, 5.0);
        assert_eq!(channel.bandwidth, 2.0);
        assert!(channel.connects(0));
        assert!(!channel.connects(1));
        assert!(channel.connects(2));
        assert!(!channel.connects(7));

        assert!(ChannelSpec::from_row(&[5.0, 2.0, 1.0], 3).is_err());
    }
}
