//! Ceiling-constrained schedule optimizer.
//!
//! Starting from a complete plan, tasks off the critical path are moved to the
//! slowest PE type that is no more expensive and still connectable, trading slack
//! for cost. Each move is committed on a snapshot basis. A move that does not
//! lower the total cost is dropped; if it breaks the time ceiling or channel
//! connectivity the plan is restored and optimization stops.

use crate::channel;
use crate::error::AllocationError;
use crate::graph::TaskGraph;
use crate::models::{PeTypeId, TaskId};
use crate::{log_changes, log_checks, log_debug};

use super::state::PlanState;

/// Why an optimization step was rolled back.
#[derive(Clone, Debug, PartialEq)]
pub enum AbortReason {
    /// The step pushed the overall time above the ceiling.
    TimeCeiling { attempted_time: f64 },
    /// Channels could not be relinked after the move.
    Connectivity(AllocationError),
}

/// Result of [`ScheduleOptimizer::optimize`]. The plan left in the optimizer is
/// always the last one that met the ceiling.
#[derive(Clone, Debug, PartialEq)]
pub enum OptimizationOutcome {
    /// Every task was considered; `reallocated` lists tasks that changed type.
    Completed { reallocated: Vec<TaskId> },
    /// Critical and fastest path coincide.
    NoOp,
    /// Stopped at `task`; earlier moves in `reallocated` are kept.
    Aborted {
        task: TaskId,
        reason: AbortReason,
        reallocated: Vec<TaskId>,
    },
    /// The initial plan already exceeds the ceiling, nothing was attempted.
    CeilingUnreachable { overall_time: f64 },
}

/// A path from a path-ending task back to a root along best-parent links.
#[derive(Clone, Debug, PartialEq)]
struct BestParentPath {
    /// Ending task first, root last.
    tasks: Vec<TaskId>,
    end_time: f64,
}

impl BestParentPath {
    fn ending_task(&self) -> TaskId {
        self.tasks[0]
    }
}

pub struct ScheduleOptimizer<'g> {
    graph: &'g TaskGraph,
    state: PlanState,
    time_ceiling: f64,
    verbosity: u8,
}

impl<'g> ScheduleOptimizer<'g> {
    pub fn new(graph: &'g TaskGraph, state: PlanState, time_ceiling: f64, verbosity: u8) -> Self {
        Self {
            graph,
            state,
            time_ceiling,
            verbosity,
        }
    }

    pub fn state(&self) -> &PlanState {
        &self.state
    }

    pub fn into_state(self) -> PlanState {
        self.state
    }

    /// Run one optimization sweep over the plan.
    pub fn optimize(&mut self) -> OptimizationOutcome {
        let initial_time = self.state.overall_time();
        if initial_time > self.time_ceiling {
            log_changes!(
                self.verbosity,
                "Initial plan takes {:.3}, above the ceiling {:.3}; not optimizing",
                initial_time,
                self.time_ceiling
            );
            return OptimizationOutcome::CeilingUnreachable {
                overall_time: initial_time,
            };
        }

        let paths = self.best_parent_paths();
        let (Some(critical), Some(fastest)) = (
            Self::pick_path(&paths, |a, b| a > b),
            Self::pick_path(&paths, |a, b| a < b),
        ) else {
            return OptimizationOutcome::NoOp;
        };
        if critical.ending_task() == fastest.ending_task() {
            log_changes!(self.verbosity, "Critical and fastest path coincide; nothing to do");
            return OptimizationOutcome::NoOp;
        }
        log_changes!(
            self.verbosity,
            "Critical path ends at T{} ({:.3}), fastest at T{} ({:.3})",
            critical.ending_task(),
            critical.end_time,
            fastest.ending_task(),
            fastest.end_time
        );

        let mut reallocated = Vec::new();

        // Fastest-path tasks off the critical path, root first
        let first_pass: Vec<TaskId> = fastest
            .tasks
            .iter()
            .rev()
            .copied()
            .filter(|t| !critical.tasks.contains(t))
            .collect();
        for task in first_pass {
            if let Err(outcome) = self.step(task, &mut reallocated) {
                return outcome;
            }
        }

        // Everything else, latest-ending first under the current timings
        while let Some(task) = self.latest_pending() {
            if let Err(outcome) = self.step(task, &mut reallocated) {
                return outcome;
            }
        }

        log_changes!(
            self.verbosity,
            "Optimization finished: {} task(s) moved, time={:.3}, cost={:.3}",
            reallocated.len(),
            self.state.overall_time(),
            self.state.overall_cost(self.graph)
        );
        OptimizationOutcome::Completed { reallocated }
    }

    /// Consider one task. A move that does not lower the overall cost is undone
    /// silently; one that breaks the ceiling or connectivity is undone and the
    /// abort outcome is returned.
    fn step(
        &mut self,
        task: TaskId,
        reallocated: &mut Vec<TaskId>,
    ) -> Result<(), OptimizationOutcome> {
        if self.state.tasks[task].reallocated {
            return Ok(());
        }
        self.state.tasks[task].reallocated = true;

        let Some(new_type) = self.reallocation_target(task) else {
            return Ok(());
        };

        let snapshot = self.state.clone_for_rollback();
        let reason = match self.move_task(task, new_type) {
            Err(err) => Some(AbortReason::Connectivity(err)),
            Ok(()) => {
                let attempted_time = self.state.overall_time();
                (attempted_time > self.time_ceiling)
                    .then_some(AbortReason::TimeCeiling { attempted_time })
            }
        };

        if reason.is_none() {
            let (before, after) = (
                snapshot.overall_cost(self.graph),
                self.state.overall_cost(self.graph),
            );
            if after >= before {
                log_checks!(
                    self.verbosity,
                    "  T{}: PE type {} would cost {:.3} (was {:.3}); not moved",
                    task,
                    new_type,
                    after,
                    before
                );
                self.state = snapshot;
                return Ok(());
            }
        }

        match reason {
            None => {
                log_changes!(
                    self.verbosity,
                    "Moved T{} to PE type {}: time={:.3}, cost={:.3}",
                    task,
                    new_type,
                    self.state.overall_time(),
                    self.state.overall_cost(self.graph)
                );
                reallocated.push(task);
                Ok(())
            }
            Some(reason) => {
                log_changes!(
                    self.verbosity,
                    "Moving T{} to PE type {} rejected ({:?}); keeping previous plan",
                    task,
                    new_type,
                    reason
                );
                self.state = snapshot;
                Err(OptimizationOutcome::Aborted {
                    task,
                    reason,
                    reallocated: std::mem::take(reallocated),
                })
            }
        }
    }

    /// Unconsidered task with the latest end time, lowest id on ties.
    fn latest_pending(&self) -> Option<TaskId> {
        let tasks = &self.state.tasks;
        let mut best: Option<TaskId> = None;
        for &task in &self.state.placement_order {
            if tasks[task].reallocated {
                continue;
            }
            let later = match best {
                None => true,
                Some(b) => {
                    let (e_t, e_b) = (tasks[task].end_time, tasks[b].end_time);
                    e_t > e_b || (e_t == e_b && task < b)
                }
            };
            if later {
                best = Some(task);
            }
        }
        best
    }

    /// Path with the extreme end time according to `better` (first wins ties).
    fn pick_path<F>(paths: &[BestParentPath], better: F) -> Option<&BestParentPath>
    where
        F: Fn(f64, f64) -> bool,
    {
        let mut best: Option<&BestParentPath> = None;
        for path in paths {
            if best.map_or(true, |b| better(path.end_time, b.end_time)) {
                best = Some(path);
            }
        }
        best
    }

    /// One path per task that is nobody's best parent, in ascending id order.
    fn best_parent_paths(&self) -> Vec<BestParentPath> {
        let tasks = &self.state.tasks;
        let mut is_best_parent = vec![false; tasks.len()];
        for state in tasks {
            if let Some(parent) = state.best_parent {
                is_best_parent[parent] = true;
            }
        }

        (0..tasks.len())
            .filter(|&t| self.state.is_allocated(t) && !is_best_parent[t])
            .map(|end| {
                let mut path = vec![end];
                let mut current = end;
                while let Some(parent) = tasks[current].best_parent {
                    path.push(parent);
                    current = parent;
                }
                BestParentPath {
                    tasks: path,
                    end_time: tasks[end].end_time,
                }
            })
            .collect()
    }

    /// Tasks whose best parent is `task`.
    fn dependents(&self, task: TaskId) -> Vec<TaskId> {
        self.graph
            .children(task)
            .iter()
            .copied()
            .filter(|&c| self.state.tasks[c].best_parent == Some(task))
            .collect()
    }

    /// Slowest PE type that is not more expensive than the current one and stays
    /// connectable to the best parent and the dependents. `None` keeps the task.
    fn reallocation_target(&self, task: TaskId) -> Option<PeTypeId> {
        let graph = self.graph;
        let current = self.state.pe_type_of(task)?;
        let price = |p: PeTypeId| graph.cost(task, p) + graph.pe_type(p).unit_cost;
        let current_price = price(current);

        let parent_type = self.state.tasks[task]
            .best_parent
            .and_then(|p| self.state.pe_type_of(p));
        let dependent_types: Vec<PeTypeId> = self
            .dependents(task)
            .into_iter()
            .filter_map(|d| self.state.pe_type_of(d))
            .collect();

        let mut best: Option<PeTypeId> = None;
        for candidate in 0..graph.pe_count() {
            if price(candidate) > current_price {
                continue;
            }
            let parent_ok =
                parent_type.map_or(true, |p| channel::connectable(graph, p, candidate));
            let dependents_ok = dependent_types
                .iter()
                .all(|&d| channel::connectable(graph, candidate, d));
            if !(parent_ok && dependents_ok) {
                log_checks!(
                    self.verbosity,
                    "  T{}: PE type {} not connectable",
                    task,
                    candidate
                );
                continue;
            }
            let better = match best {
                None => true,
                Some(b) => {
                    let (t_c, t_b) = (graph.time(task, candidate), graph.time(task, b));
                    t_c > t_b || (t_c == t_b && price(candidate) < price(b))
                }
            };
            if better {
                best = Some(candidate);
            }
        }

        log_checks!(
            self.verbosity,
            "  T{}: current PE type {}, target {:?}",
            task,
            current,
            best
        );
        best.filter(|&b| b != current)
    }

    /// Put `task` on a new instance of `pe_type`, relink it and retime the plan.
    fn move_task(&mut self, task: TaskId, pe_type: PeTypeId) -> Result<(), AllocationError> {
        let graph = self.graph;
        let category = graph.pe_type(pe_type).category;
        let instance = self.state.registry.create_instance(pe_type, category);
        self.state.tasks[task].instance = Some(instance);

        match self.state.tasks[task].best_parent {
            Some(parent) => {
                let parent_instance = self.state.tasks[parent]
                    .instance
                    .ok_or(AllocationError::ParentUnresolved { task, parent })?;
                channel::connect(graph, &mut self.state.registry, Some(parent_instance), instance)?;
            }
            None if !graph.children(task).is_empty() => {
                channel::connect(graph, &mut self.state.registry, None, instance)?;
            }
            None => {}
        }

        for dependent in self.dependents(task) {
            let Some(dependent_instance) = self.state.tasks[dependent].instance else {
                continue;
            };
            if dependent_instance != instance {
                channel::connect(
                    graph,
                    &mut self.state.registry,
                    Some(instance),
                    dependent_instance,
                )?;
            }
        }

        self.recompute_timings()
    }

    /// Replay the placement order, recomputing best parents, channels and intervals.
    ///
    /// Leaves an unchanged plan exactly as it was.
    pub fn recompute_timings(&mut self) -> Result<(), AllocationError> {
        let graph = self.graph;
        self.state.registry.reset_timelines();

        for index in 0..self.state.placement_order.len() {
            let task = self.state.placement_order[index];
            let Some(instance) = self.state.tasks[task].instance else {
                continue;
            };
            let best_parent = self.state.best_parent(graph, task)?;

            let (ready_time, channel) = match best_parent {
                Some(parent) => {
                    let parent_state = &self.state.tasks[parent];
                    let ready = parent_state.end_time;
                    let parent_instance = parent_state
                        .instance
                        .ok_or(AllocationError::ParentUnresolved { task, parent })?;
                    if parent_instance == instance {
                        (ready, None)
                    } else {
                        let previous = self.state.tasks[task].channel;
                        let channel = match channel::shared_channel(
                            graph,
                            &self.state.registry,
                            parent_instance,
                            instance,
                            previous,
                        ) {
                            Some(c) => c,
                            None => channel::connect(
                                graph,
                                &mut self.state.registry,
                                Some(parent_instance),
                                instance,
                            )?,
                        };
                        (ready, Some(channel))
                    }
                }
                None => (0.0, None),
            };

            let transfer = match (best_parent, channel) {
                (Some(parent), Some(c)) => graph.volume(parent, task) / graph.channel(c).bandwidth,
                _ => 0.0,
            };
            let record = self.state.registry.instance(instance);
            let start_time = (ready_time + transfer).max(record.last_end);
            let end_time = start_time + graph.time(task, record.pe_type);
            self.state.registry.record_task(instance, start_time, end_time);

            let state = &mut self.state.tasks[task];
            state.start_time = start_time;
            state.end_time = end_time;
            state.best_parent = best_parent;
            state.channel = channel;
            log_debug!(
                self.verbosity,
                "  T{} retimed to [{:.3}, {:.3}]",
                task,
                start_time,
                end_time
            );
        }
        Ok(())
    }
}
