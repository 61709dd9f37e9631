//! Allocation engine: places every task on a PE instance in dependency order.

use crate::channel;
use crate::config::AllocatorConfig;
use crate::error::{AllocationError, EngineError};
use crate::graph::{GraphError, TaskGraph};
use crate::models::{ScheduleReport, TaskId};
use crate::standardize::StandardizedScores;
use crate::strategy::{self, Placement, SelectionContext, Strategy};
use crate::tuner::{CoefficientTuner, Weights};
use crate::{log_changes, log_checks, log_debug};

use super::state::{PlanState, TaskState};

/// Greedy list allocator over a validated [`TaskGraph`].
pub struct AllocationEngine<'g> {
    graph: &'g TaskGraph,
    strategy: Strategy,
    scores: Option<StandardizedScores>,
    tuner: CoefficientTuner,
    state: PlanState,
    verbosity: u8,
}

impl<'g> AllocationEngine<'g> {
    /// Create an engine with an empty plan.
    ///
    /// Standardized catalogs are only computed for [`Strategy::StandardizedScore`],
    /// which fails on single-cell catalogs.
    pub fn new(graph: &'g TaskGraph, config: &AllocatorConfig) -> Result<Self, EngineError> {
        let scores = match config.strategy {
            Strategy::StandardizedScore => Some(StandardizedScores::from_graph(graph)?),
            _ => None,
        };
        Ok(Self {
            graph,
            strategy: config.strategy,
            scores,
            tuner: CoefficientTuner::new(
                graph.task_count(),
                config.time_ceiling,
                config.cost_ceiling,
            ),
            state: PlanState::new(graph),
            verbosity: config.verbosity,
        })
    }

    pub fn graph(&self) -> &'g TaskGraph {
        self.graph
    }

    pub fn weights(&self) -> Weights {
        self.tuner.weights()
    }

    pub fn state(&self) -> &PlanState {
        &self.state
    }

    pub fn into_state(self) -> PlanState {
        self.state
    }

    /// Allocate `task`, placing its unallocated ancestors first.
    ///
    /// Does nothing if the task is already allocated.
    pub fn allocate(&mut self, task: TaskId) -> Result<(), AllocationError> {
        if self.state.is_allocated(task) {
            return Ok(());
        }
        let order = self
            .graph
            .dependency_order([task])
            .map_err(|err| match err {
                GraphError::Cycle(parent) => AllocationError::ParentUnresolved { task, parent },
                _ => AllocationError::ParentUnresolved { task, parent: task },
            })?;
        for pending in order {
            if !self.state.is_allocated(pending) {
                self.place(pending)?;
            }
        }
        Ok(())
    }

    /// Allocate every task in the graph's dependency order.
    pub fn allocate_all(&mut self) -> Result<(), AllocationError> {
        let graph = self.graph;
        for &task in graph.allocation_order() {
            self.allocate(task)?;
        }
        log_changes!(
            self.verbosity,
            "Allocated {} tasks on {} instances: time={:.3}, cost={:.3}",
            self.state.allocated_count(),
            self.state.registry.len(),
            self.state.overall_time(),
            self.state.overall_cost(graph)
        );
        Ok(())
    }

    /// Place a single task whose parents are all allocated.
    fn place(&mut self, task: TaskId) -> Result<(), AllocationError> {
        let graph = self.graph;
        let best_parent = self.state.best_parent(graph, task)?;
        let (ready_time, parent_instance) = match best_parent {
            Some(parent) => {
                let parent_state = &self.state.tasks[parent];
                let instance = parent_state
                    .instance
                    .ok_or(AllocationError::ParentUnresolved { task, parent })?;
                (parent_state.end_time, Some(instance))
            }
            None => (0.0, None),
        };

        let placement = strategy::select(
            self.strategy,
            &SelectionContext {
                graph,
                registry: &self.state.registry,
                scores: self.scores.as_ref(),
                weights: self.tuner.weights(),
                task,
                parent_instance,
                ready_time,
            },
        );
        log_checks!(
            self.verbosity,
            "  T{}: {} chose {:?} (best parent {:?}, ready at {:.3})",
            task,
            self.strategy,
            placement,
            best_parent,
            ready_time
        );

        let (instance, fresh) = match placement {
            Placement::Instance(id) => (id, false),
            Placement::Type(pe_type) => {
                match self
                    .state
                    .registry
                    .reusable_instance(pe_type, ready_time, parent_instance)
                {
                    Some(id) => {
                        log_checks!(
                            self.verbosity,
                            "  T{}: reusing {}",
                            task,
                            self.state.registry.instance(id).label
                        );
                        (id, false)
                    }
                    None => {
                        let category = graph.pe_type(pe_type).category;
                        (self.state.registry.create_instance(pe_type, category), true)
                    }
                }
            }
        };

        let channel = match parent_instance {
            Some(parent) if parent != instance => Some(channel::connect(
                graph,
                &mut self.state.registry,
                Some(parent),
                instance,
            )?),
            Some(_) => None,
            None => {
                if fresh && !graph.children(task).is_empty() {
                    let root_channel =
                        channel::connect(graph, &mut self.state.registry, None, instance)?;
                    log_debug!(
                        self.verbosity,
                        "  T{}: root instance attached to CHAN{}",
                        task,
                        root_channel
                    );
                }
                None
            }
        };

        let transfer = match (best_parent, channel) {
            (Some(parent), Some(c)) => graph.volume(parent, task) / graph.channel(c).bandwidth,
            _ => 0.0,
        };
        let record = self.state.registry.instance(instance);
        let pe_type = record.pe_type;
        let start_time = (ready_time + transfer).max(record.last_end);
        let end_time = start_time + graph.time(task, pe_type);

        self.state.registry.record_task(instance, start_time, end_time);
        self.state.tasks[task] = TaskState {
            instance: Some(instance),
            start_time,
            end_time,
            best_parent,
            channel,
            reallocated: false,
        };
        self.state.placement_order.push(task);

        log_changes!(
            self.verbosity,
            "Placed T{} on {} [{:.3}, {:.3}]",
            task,
            self.state.registry.instance(instance).label,
            start_time,
            end_time
        );

        let weights = self.tuner.update(
            self.state.allocated_count(),
            self.state.overall_cost(graph),
            self.state.overall_time(),
        );
        log_debug!(
            self.verbosity,
            "  weights: power={:.4}, cost={:.4}, time={:.4}",
            weights.power,
            weights.cost,
            weights.time
        );
        Ok(())
    }

    /// Schedule report of the current plan.
    pub fn report(&self) -> ScheduleReport {
        self.state.to_report(self.graph, self.tuner.weights())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::make_input;
    use crate::models::{ChannelSpec, GraphInput, PeCategory};

    const EPS: f64 = 1e-9;

    fn min_time() -> AllocatorConfig {
        AllocatorConfig {
            strategy: Strategy::MinTime,
            ..AllocatorConfig::default()
        }
    }

    fn run_plain(input: &GraphInput, config: &AllocatorConfig) -> ScheduleReport {
        let graph = TaskGraph::new(input).unwrap();
        let mut engine = AllocationEngine::new(&graph, config).unwrap();
        engine.allocate_all().unwrap();
        engine.report()
    }

    /// Two tasks 0 -> 1 with volume 10; task 0 only fast on type 0, task 1 only on type 1.
    fn scenario_a() -> GraphInput {
        let mut input = make_input(
            2,
            &[(0, 1, 10.0)],
            &[(1.0, PeCategory::Universal), (1.0, PeCategory::Specialized)],
            vec![vec![3.0, 50.0], vec![50.0, 4.0]],
            vec![vec![1.0, 1.0], vec![1.0, 1.0]],
        );
        input.channels = vec![ChannelSpec::new(1.0, 2.0, vec![true, true])];
        input
    }

    #[test]
    fn test_scenario_linear_transfer() {
        let report = run_plain(&scenario_a(), &min_time());
        let t0 = report.task(0).unwrap();
        let t1 = report.task(1).unwrap();
        assert_eq!((t0.start_time, t0.end_time), (0.0, 3.0));
        assert_eq!((t1.start_time, t1.end_time), (8.0, 12.0));
        assert_eq!(t1.best_parent, Some(0));
        assert_eq!(t1.channel, Some(0));
        assert_eq!(report.overall_time, 12.0);
        assert_eq!(report.channels_used, vec![0]);
    }

    /// Three independent tasks, each fastest on its own type.
    fn scenario_b() -> GraphInput {
        make_input(
            3,
            &[],
            &[
                (1.0, PeCategory::Universal),
                (1.0, PeCategory::Specialized),
                (1.0, PeCategory::Specialized),
            ],
            vec![
                vec![2.0, 9.0, 9.0],
                vec![9.0, 5.0, 9.0],
                vec![9.0, 9.0, 3.0],
            ],
            vec![vec![1.0; 3]; 3],
        )
    }

    #[test]
    fn test_scenario_independent_tasks() {
        let report = run_plain(&scenario_b(), &min_time());
        assert_eq!(report.overall_time, 5.0);
        for task in &report.scheduled_tasks {
            assert_eq!(task.start_time, 0.0);
            assert_eq!(task.pe_type, task.task_id);
        }
        // roots without children never attach a channel
        assert!(report.channels_used.is_empty());
    }

    #[test]
    fn test_instance_strategies_never_queue_independent_tasks() {
        for strategy in [
            Strategy::LeastUsed,
            Strategy::LeastActiveTime,
            Strategy::LongestIdle,
        ] {
            let config = AllocatorConfig {
                strategy,
                ..AllocatorConfig::default()
            };
            let report = run_plain(&scenario_b(), &config);
            assert_eq!(report.overall_time, 5.0, "{}", strategy);
            let mut labels: Vec<&str> = report
                .scheduled_tasks
                .iter()
                .map(|t| t.instance_label.as_str())
                .collect();
            labels.sort_unstable();
            labels.dedup();
            assert_eq!(labels.len(), 3, "{}", strategy);
            for task in &report.scheduled_tasks {
                assert_eq!(task.start_time, 0.0);
            }
        }
    }

    #[test]
    fn test_scenario_diamond_uses_earliest_parent() {
        // A=0, B=1, C=2, D=3; B is quick on type 1, C slow everywhere
        let input = make_input(
            4,
            &[(0, 1, 2.0), (0, 2, 2.0), (1, 3, 4.0), (2, 3, 4.0)],
            &[(1.0, PeCategory::Universal), (1.0, PeCategory::Specialized)],
            vec![
                vec![1.0, 5.0],
                vec![5.0, 2.0],
                vec![6.0, 7.0],
                vec![1.0, 5.0],
            ],
            vec![vec![1.0, 1.0]; 4],
        );
        let report = run_plain(&input, &min_time());
        let b = report.task(1).unwrap();
        let c = report.task(2).unwrap();
        let d = report.task(3).unwrap();
        assert!(b.end_time < c.end_time);
        assert_eq!(d.best_parent, Some(1));
        // D runs on type 0 while B ran on type 1: transfer of 4 over bandwidth 1
        assert!((d.start_time - (b.end_time + 4.0)).abs() < EPS);
    }

    #[test]
    fn test_precedence_and_transfer_hold() {
        let input = make_input(
            5,
            &[
                (0, 1, 3.0),
                (0, 2, 1.0),
                (1, 3, 2.0),
                (2, 3, 5.0),
                (3, 4, 1.0),
            ],
            &[
                (3.0, PeCategory::Universal),
                (2.0, PeCategory::Specialized),
                (4.0, PeCategory::Specialized),
            ],
            vec![
                vec![2.0, 3.0, 1.0],
                vec![4.0, 1.0, 2.0],
                vec![1.0, 2.0, 5.0],
                vec![3.0, 3.0, 1.0],
                vec![2.0, 1.0, 4.0],
            ],
            vec![
                vec![5.0, 2.0, 1.0],
                vec![1.0, 3.0, 2.0],
                vec![2.0, 2.0, 2.0],
                vec![4.0, 1.0, 3.0],
                vec![1.0, 5.0, 2.0],
            ],
        );
        let graph = TaskGraph::new(&input).unwrap();
        for strategy in Strategy::ALL {
            let config = AllocatorConfig {
                strategy,
                time_ceiling: Some(20.0),
                cost_ceiling: Some(60.0),
                ..AllocatorConfig::default()
            };
            let mut engine = AllocationEngine::new(&graph, &config).unwrap();
            engine.allocate_all().unwrap();
            let report = engine.report();
            assert_eq!(report.scheduled_tasks.len(), 5);

            for task in &report.scheduled_tasks {
                let Some(parent) = task.best_parent else {
                    continue;
                };
                let parent_task = report.task(parent).unwrap();
                assert!(task.start_time >= parent_task.end_time - EPS);
                if parent_task.instance != task.instance {
                    let bandwidth = graph.channel(task.channel.unwrap()).bandwidth;
                    let transfer = graph.volume(parent, task.task_id) / bandwidth;
                    assert!(task.start_time >= parent_task.end_time + transfer - EPS);
                }
            }

            let max_end = report
                .scheduled_tasks
                .iter()
                .map(|t| t.end_time)
                .fold(0.0, f64::max);
            assert_eq!(report.overall_time, max_end);
            assert!((report.weights.sum() - 1.0).abs() < EPS);
            assert!(report.weights.as_array().iter().all(|&w| w >= 0.0));
        }
    }

    #[test]
    fn test_overall_cost_formula() {
        let report = run_plain(&scenario_a(), &min_time());
        // two instances (1 + 1), task costs (1 + 1), one channel (1)
        assert!((report.overall_cost - 5.0).abs() < EPS);
    }

    #[test]
    fn test_allocate_is_idempotent() {
        let input = scenario_a();
        let graph = TaskGraph::new(&input).unwrap();
        let mut engine = AllocationEngine::new(&graph, &min_time()).unwrap();
        engine.allocate(1).unwrap();
        // the parent was placed first
        assert_eq!(engine.state().placement_order, vec![0, 1]);

        let before = engine.report();
        engine.allocate(1).unwrap();
        engine.allocate(0).unwrap();
        assert_eq!(engine.report(), before);
        assert_eq!(engine.state().registry.len(), 2);
    }

    #[test]
    fn test_reuses_parent_instance() {
        let input = make_input(
            3,
            &[(0, 1, 5.0), (1, 2, 5.0)],
            &[(1.0, PeCategory::Universal), (1.0, PeCategory::Specialized)],
            vec![vec![1.0, 9.0]; 3],
            vec![vec![1.0, 1.0]; 3],
        );
        let report = run_plain(&input, &min_time());
        let labels: Vec<&str> = report
            .scheduled_tasks
            .iter()
            .map(|t| t.instance_label.as_str())
            .collect();
        assert_eq!(labels, vec!["HC0", "HC0", "HC0"]);
        // no transfer on a shared instance
        assert_eq!(report.task(2).unwrap().start_time, 2.0);
        assert_eq!(report.task(2).unwrap().channel, None);
    }

    #[test]
    fn test_no_channel_available() {
        let mut input = scenario_a();
        input.channels = vec![ChannelSpec::new(1.0, 2.0, vec![true, false])];
        let graph = TaskGraph::new(&input).unwrap();
        let mut engine = AllocationEngine::new(&graph, &min_time()).unwrap();
        assert_eq!(
            engine.allocate_all(),
            Err(AllocationError::NoChannelAvailable {
                parent_type: Some(0),
                child_type: 1
            })
        );
    }

    #[test]
    fn test_standardized_score_needs_two_types() {
        let input = make_input(
            2,
            &[],
            &[(1.0, PeCategory::Universal)],
            vec![vec![1.0]; 2],
            vec![vec![1.0]; 2],
        );
        let graph = TaskGraph::new(&input).unwrap();
        assert!(matches!(
            AllocationEngine::new(&graph, &AllocatorConfig::default()),
            Err(EngineError::Numeric(_))
        ));
        assert!(AllocationEngine::new(&graph, &min_time()).is_ok());
    }
}
