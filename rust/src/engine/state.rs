//! Mutable plan state shared by the allocation engine and the optimizer.

use rustc_hash::FxHashSet;

use crate::error::AllocationError;
use crate::graph::TaskGraph;
use crate::models::{ChannelId, PeTypeId, ScheduleReport, ScheduledTask, TaskId};
use crate::registry::{InstanceId, ResourceRegistry};
use crate::tuner::Weights;

/// Placement of one task. `instance == None` means unallocated.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaskState {
    pub instance: Option<InstanceId>,
    pub start_time: f64,
    pub end_time: f64,
    pub best_parent: Option<TaskId>,
    /// Channel carrying the best parent's data.
    pub channel: Option<ChannelId>,
    /// Set once the optimizer has considered the task.
    pub reallocated: bool,
}

/// Per-task placements, the instance registry and the order tasks were placed in.
///
/// Cloned wholesale before every optimizer step so a rejected step can be undone.
#[derive(Clone, Debug)]
pub struct PlanState {
    pub tasks: Vec<TaskState>,
    pub registry: ResourceRegistry,
    /// Parents always precede their children.
    pub placement_order: Vec<TaskId>,
}

impl PlanState {
    pub fn new(graph: &TaskGraph) -> Self {
        Self {
            tasks: vec![TaskState::default(); graph.task_count()],
            registry: ResourceRegistry::new(graph.channel_count()),
            placement_order: Vec::with_capacity(graph.task_count()),
        }
    }

    /// Snapshot taken before a tentative change.
    pub fn clone_for_rollback(&self) -> Self {
        self.clone()
    }

    #[inline]
    pub fn is_allocated(&self, task: TaskId) -> bool {
        self.tasks[task].instance.is_some()
    }

    pub fn allocated_count(&self) -> usize {
        self.placement_order.len()
    }

    /// PE type of the instance hosting `task`.
    pub fn pe_type_of(&self, task: TaskId) -> Option<PeTypeId> {
        self.tasks[task]
            .instance
            .map(|id| self.registry.instance(id).pe_type)
    }

    /// Predecessor with the earliest end time; the lowest id wins ties.
    pub fn best_parent(
        &self,
        graph: &TaskGraph,
        task: TaskId,
    ) -> Result<Option<TaskId>, AllocationError> {
        let mut best: Option<TaskId> = None;
        for &parent in graph.parents(task) {
            if !self.is_allocated(parent) {
                return Err(AllocationError::ParentUnresolved { task, parent });
            }
            let end = self.tasks[parent].end_time;
            if best.map_or(true, |b| end < self.tasks[b].end_time) {
                best = Some(parent);
            }
        }
        Ok(best)
    }

    /// Latest end time over placed tasks.
    pub fn overall_time(&self) -> f64 {
        self.placement_order
            .iter()
            .map(|&t| self.tasks[t].end_time)
            .fold(0.0, f64::max)
    }

    /// Instances hosting at least one placed task.
    fn live_instances(&self) -> FxHashSet<InstanceId> {
        self.tasks.iter().filter_map(|t| t.instance).collect()
    }

    /// Distinct channels attached to live instances, ascending.
    pub fn channels_used(&self) -> Vec<ChannelId> {
        let live = self.live_instances();
        (0..self.registry.channel_count())
            .filter(|&c| {
                self.registry
                    .channel_members(c)
                    .iter()
                    .any(|id| live.contains(id))
            })
            .collect()
    }

    /// Unit cost of live instances, plus per-task costs, plus each used channel once.
    pub fn overall_cost(&self, graph: &TaskGraph) -> f64 {
        let instances: f64 = self
            .live_instances()
            .iter()
            .map(|&id| graph.pe_type(self.registry.instance(id).pe_type).unit_cost)
            .sum();
        let tasks: f64 = self
            .placement_order
            .iter()
            .filter_map(|&t| self.pe_type_of(t).map(|pe| graph.cost(t, pe)))
            .sum();
        let channels: f64 = self
            .channels_used()
            .iter()
            .map(|&c| graph.channel(c).cost)
            .sum();
        instances + tasks + channels
    }

    /// Schedule of the placed tasks, ordered by task id.
    pub fn to_report(&self, graph: &TaskGraph, weights: Weights) -> ScheduleReport {
        let scheduled_tasks = self
            .tasks
            .iter()
            .enumerate()
            .filter_map(|(task_id, state)| {
                let instance = self.registry.instance(state.instance?);
                Some(ScheduledTask {
                    task_id,
                    instance: instance.id,
                    instance_label: instance.label.clone(),
                    pe_type: instance.pe_type,
                    start_time: state.start_time,
                    end_time: state.end_time,
                    best_parent: state.best_parent,
                    channel: state.channel,
                })
            })
            .collect();

        ScheduleReport {
            scheduled_tasks,
            overall_time: self.overall_time(),
            overall_cost: self.overall_cost(graph),
            channels_used: self.channels_used(),
            weights,
            optimization: None,
            time_ceiling_met: None,
            cost_ceiling_met: None,
        }
    }
}
