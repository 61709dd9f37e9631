//! Allocation engine, schedule optimizer and the mode dispatcher.
//!
//! [`run`] validates the configuration, builds the [`TaskGraph`] and then:
//! - plain mode: allocates every task once;
//! - optimize mode: allocates, then runs the [`ScheduleOptimizer`] under the time ceiling;
//! - unpredicted mode: produces a priority order instead of a timed schedule.

mod core;
mod optimizer;
mod state;

pub use self::core::AllocationEngine;
pub use optimizer::{AbortReason, OptimizationOutcome, ScheduleOptimizer};
pub use state::{PlanState, TaskState};

use crate::config::{AllocatorConfig, ConfigError, Mode};
use crate::error::EngineError;
use crate::graph::TaskGraph;
use crate::log_changes;
use crate::models::{GraphInput, RunReport, ScheduleReport};
use crate::unpredicted::prioritize;

/// Run the configured mode over a graph description.
///
/// Fatal problems are returned as errors; a plan that misses a ceiling is still a
/// successful run, flagged through `time_ceiling_met` / `cost_ceiling_met`.
pub fn run(input: &GraphInput, config: &AllocatorConfig) -> Result<RunReport, EngineError> {
    config.validate()?;
    let graph = TaskGraph::new(input)?;
    log_changes!(
        config.verbosity,
        "Running {} mode ({} strategy) on {} tasks, {} PE types, {} channels",
        config.mode,
        config.strategy,
        graph.task_count(),
        graph.pe_count(),
        graph.channel_count()
    );

    match config.mode {
        Mode::Plain => {
            let mut engine = AllocationEngine::new(&graph, config)?;
            engine.allocate_all()?;
            Ok(RunReport::Schedule(with_ceilings(engine.report(), config)))
        }
        Mode::Optimize => {
            let time_ceiling = config
                .time_ceiling
                .ok_or(ConfigError::MissingTimeCeiling(config.mode))?;
            let mut engine = AllocationEngine::new(&graph, config)?;
            engine.allocate_all()?;
            let weights = engine.weights();

            let mut optimizer =
                ScheduleOptimizer::new(&graph, engine.into_state(), time_ceiling, config.verbosity);
            let outcome = optimizer.optimize();
            let mut report = optimizer.state().to_report(&graph, weights);
            report.optimization = Some(outcome);
            Ok(RunReport::Schedule(with_ceilings(report, config)))
        }
        Mode::Unpredicted => Ok(RunReport::Priority(prioritize(&graph, config.verbosity)?)),
    }
}

fn with_ceilings(mut report: ScheduleReport, config: &AllocatorConfig) -> ScheduleReport {
    report.time_ceiling_met = config.time_ceiling.map(|c| report.overall_time <= c);
    report.cost_ceiling_met = config.cost_ceiling.map(|c| report.overall_cost <= c);
    report
}
