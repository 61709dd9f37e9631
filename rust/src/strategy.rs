//! PE selection strategies.
//!
//! Each [`Strategy`] maps to one selection function through [`STRATEGY_TABLE`].
//! Type strategies return a PE type and let the engine decide between reuse and a
//! new instance; instance strategies pick an already created instance directly.

use std::fmt;
use std::str::FromStr;

use crate::config::ConfigError;
use crate::graph::TaskGraph;
use crate::models::{PeTypeId, TaskId};
use crate::registry::{InstanceId, PeInstance, ResourceRegistry};
use crate::standardize::StandardizedScores;
use crate::tuner::Weights;

/// Named heuristic for choosing where a task runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Type with the smallest execution time for the task.
    MinTime,
    /// Type with the smallest per-task cost.
    MinCost,
    /// Existing instance that has run the fewest tasks.
    LeastUsed,
    /// Existing instance with the least accumulated busy time.
    LeastActiveTime,
    /// Existing instance that became free the earliest.
    LongestIdle,
    /// Instance hosting the best parent.
    LastChoiceOfParent,
    /// Type minimizing `x·power + y·cost + z·time` over standardized catalogs.
    StandardizedScore,
    /// Type minimizing `time × cost`.
    TimeCostProduct,
}

/// Outcome of a selection function.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// Run on an instance of this type (reused or new).
    Type(PeTypeId),
    /// Run on this existing instance.
    Instance(InstanceId),
}

/// Read-only view handed to a selection function.
pub struct SelectionContext<'a> {
    pub graph: &'a TaskGraph,
    pub registry: &'a ResourceRegistry,
    /// Present when the strategy is [`Strategy::StandardizedScore`].
    pub scores: Option<&'a StandardizedScores>,
    pub weights: Weights,
    pub task: TaskId,
    /// Instance of the best parent, `None` for roots.
    pub parent_instance: Option<InstanceId>,
    /// Earliest time the task can start, before any transfer.
    pub ready_time: f64,
}

type Selector = fn(&SelectionContext<'_>) -> Placement;

/// Strategy, textual name and selection function, ordered by discriminant.
const STRATEGY_TABLE: [(Strategy, &str, Selector); 8] = [
    (Strategy::MinTime, "min_time", select_min_time),
    (Strategy::MinCost, "min_cost", select_min_cost),
    (Strategy::LeastUsed, "least_used", select_least_used),
    (Strategy::LeastActiveTime, "least_active_time", select_least_active_time),
    (Strategy::LongestIdle, "longest_idle", select_longest_idle),
    (Strategy::LastChoiceOfParent, "last_choice_of_parent", select_last_choice_of_parent),
    (Strategy::StandardizedScore, "standardized_score", select_standardized_score),
    (Strategy::TimeCostProduct, "time_cost_product", select_time_cost_product),
];

impl Strategy {
    pub const ALL: [Strategy; 8] = [
        Strategy::MinTime,
        Strategy::MinCost,
        Strategy::LeastUsed,
        Strategy::LeastActiveTime,
        Strategy::LongestIdle,
        Strategy::LastChoiceOfParent,
        Strategy::StandardizedScore,
        Strategy::TimeCostProduct,
    ];

    pub fn name(&self) -> &'static str {
        STRATEGY_TABLE[*self as usize].1
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        STRATEGY_TABLE
            .iter()
            .find(|(_, name, _)| *name == key)
            .map(|(strategy, _, _)| *strategy)
            .ok_or_else(|| ConfigError::UnknownStrategy(s.to_string()))
    }
}

/// Run the selection function of `strategy`.
pub fn select(strategy: Strategy, ctx: &SelectionContext<'_>) -> Placement {
    (STRATEGY_TABLE[strategy as usize].2)(ctx)
}

/// Type minimizing `key` (strict comparison, so the lowest id wins ties).
fn argmin_type<F>(graph: &TaskGraph, key: F) -> PeTypeId
where
    F: Fn(PeTypeId) -> f64,
{
    let mut best = 0;
    let mut best_value = key(0);
    for pe_type in 1..graph.pe_count() {
        let value = key(pe_type);
        if value < best_value {
            best = pe_type;
            best_value = value;
        }
    }
    best
}

/// Whether `instance` is idle by the time the task is ready.
fn is_free(ctx: &SelectionContext<'_>, instance: &PeInstance) -> bool {
    instance.last_end <= ctx.ready_time
}

/// Free instance minimizing `key`, or the min-time type when none is free.
fn argmin_instance<F>(ctx: &SelectionContext<'_>, key: F) -> Placement
where
    F: Fn(&PeInstance) -> f64,
{
    let mut best: Option<(InstanceId, f64)> = None;
    for instance in ctx.registry.instances().iter().filter(|i| is_free(ctx, i)) {
        let value = key(instance);
        if best.map_or(true, |(_, best_value)| value < best_value) {
            best = Some((instance.id, value));
        }
    }
    match best {
        Some((id, _)) => Placement::Instance(id),
        None => select_min_time(ctx),
    }
}

fn select_min_time(ctx: &SelectionContext<'_>) -> Placement {
    Placement::Type(argmin_type(ctx.graph, |p| ctx.graph.time(ctx.task, p)))
}

fn select_min_cost(ctx: &SelectionContext<'_>) -> Placement {
    Placement::Type(argmin_type(ctx.graph, |p| ctx.graph.cost(ctx.task, p)))
}

fn select_time_cost_product(ctx: &SelectionContext<'_>) -> Placement {
    Placement::Type(argmin_type(ctx.graph, |p| {
        ctx.graph.time(ctx.task, p) * ctx.graph.cost(ctx.task, p)
    }))
}

fn select_standardized_score(ctx: &SelectionContext<'_>) -> Placement {
    match ctx.scores {
        Some(scores) => Placement::Type(argmin_type(ctx.graph, |p| {
            scores.score(ctx.task, p, &ctx.weights)
        })),
        None => select_min_time(ctx),
    }
}

fn select_least_used(ctx: &SelectionContext<'_>) -> Placement {
    argmin_instance(ctx, |i| i.jobs as f64)
}

fn select_least_active_time(ctx: &SelectionContext<'_>) -> Placement {
    argmin_instance(ctx, |i| i.total_active_time)
}

fn select_longest_idle(ctx: &SelectionContext<'_>) -> Placement {
    argmin_instance(ctx, |i| i.last_end)
}

fn select_last_choice_of_parent(ctx: &SelectionContext<'_>) -> Placement {
    match ctx.parent_instance {
        Some(parent) if is_free(ctx, ctx.registry.instance(parent)) => {
            Placement::Instance(parent)
        }
        _ => select_min_time(ctx),
    }
}
