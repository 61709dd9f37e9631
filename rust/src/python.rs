//! Python bindings (feature `python`).

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::config::{AllocatorConfig, Mode};
use crate::engine::{run, AbortReason, OptimizationOutcome};
use crate::error::EngineError;
use crate::models::{PriorityReport, RunReport, ScheduleReport, ScheduledTask};
use crate::parser::parse_graph;

fn value_error(err: EngineError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

/// A task placed on a PE instance.
#[pyclass(name = "ScheduledTask")]
#[derive(Clone, Debug)]
pub struct PyScheduledTask {
    #[pyo3(get)]
    pub task_id: usize,
    #[pyo3(get)]
    pub instance: String,
    #[pyo3(get)]
    pub pe_type: usize,
    #[pyo3(get)]
    pub start_time: f64,
    #[pyo3(get)]
    pub end_time: f64,
    #[pyo3(get)]
    pub channel: Option<usize>,
}

impl From<&ScheduledTask> for PyScheduledTask {
    fn from(task: &ScheduledTask) -> Self {
        Self {
            task_id: task.task_id,
            instance: task.instance_label.clone(),
            pe_type: task.pe_type,
            start_time: task.start_time,
            end_time: task.end_time,
            channel: task.channel,
        }
    }
}

#[pymethods]
impl PyScheduledTask {
    fn __repr__(&self) -> String {
        format!(
            "ScheduledTask(T{} on {}, {}-{})",
            self.task_id, self.instance, self.start_time, self.end_time
        )
    }
}

/// Timed schedule with totals and, in optimize mode, the optimizer status.
#[pyclass(name = "ScheduleReport")]
#[derive(Clone, Debug)]
pub struct PyScheduleReport {
    #[pyo3(get)]
    pub scheduled_tasks: Vec<PyScheduledTask>,
    #[pyo3(get)]
    pub overall_time: f64,
    #[pyo3(get)]
    pub overall_cost: f64,
    #[pyo3(get)]
    pub channels_used: Vec<usize>,
    /// "completed", "noop", "aborted", "aborted_connectivity" or "ceiling_unreachable".
    #[pyo3(get)]
    pub optimization: Option<String>,
    /// Task at which optimization stopped.
    #[pyo3(get)]
    pub aborted_at: Option<usize>,
    #[pyo3(get)]
    pub time_ceiling_met: Option<bool>,
    #[pyo3(get)]
    pub cost_ceiling_met: Option<bool>,
}

impl From<ScheduleReport> for PyScheduleReport {
    fn from(report: ScheduleReport) -> Self {
        let (optimization, aborted_at) = match &report.optimization {
            None => (None, None),
            Some(OptimizationOutcome::Completed { .. }) => (Some("completed"), None),
            Some(OptimizationOutcome::NoOp) => (Some("noop"), None),
            Some(OptimizationOutcome::Aborted { task, reason, .. }) => {
                let status = match reason {
                    AbortReason::TimeCeiling { .. } => "aborted",
                    AbortReason::Connectivity(_) => "aborted_connectivity",
                };
                (Some(status), Some(*task))
            }
            Some(OptimizationOutcome::CeilingUnreachable { .. }) => {
                (Some("ceiling_unreachable"), None)
            }
        };
        Self {
            scheduled_tasks: report.scheduled_tasks.iter().map(Into::into).collect(),
            overall_time: report.overall_time,
            overall_cost: report.overall_cost,
            channels_used: report.channels_used,
            optimization: optimization.map(str::to_string),
            aborted_at,
            time_ceiling_met: report.time_ceiling_met,
            cost_ceiling_met: report.cost_ceiling_met,
        }
    }
}

/// Priority order produced for graphs with unpredictable tasks.
#[pyclass(name = "PriorityReport")]
#[derive(Clone, Debug)]
pub struct PyPriorityReport {
    #[pyo3(get)]
    pub assignments: Vec<usize>,
    #[pyo3(get)]
    pub critical_path_lengths: Vec<f64>,
    #[pyo3(get)]
    pub order: Vec<usize>,
}

impl From<PriorityReport> for PyPriorityReport {
    fn from(report: PriorityReport) -> Self {
        Self {
            assignments: report.assignments,
            critical_path_lengths: report.critical_path_lengths,
            order: report.order,
        }
    }
}

/// Allocate (and optionally optimize) the graph described by `graph_text`.
///
/// # Raises
/// * ValueError on malformed input, unknown strategy or an infeasible topology
#[pyfunction]
#[pyo3(signature = (graph_text, optimize=false, strategy=None, time_ceiling=None, cost_ceiling=None, verbosity=0))]
fn schedule(
    graph_text: &str,
    optimize: bool,
    strategy: Option<&str>,
    time_ceiling: Option<f64>,
    cost_ceiling: Option<f64>,
    verbosity: u8,
) -> PyResult<PyScheduleReport> {
    let mode = if optimize { Mode::Optimize } else { Mode::Plain };
    let config = AllocatorConfig::from_names(
        Some(mode.name()),
        strategy,
        time_ceiling,
        cost_ceiling,
        verbosity,
    )
    .map_err(|e| value_error(e.into()))?;
    let input = parse_graph(graph_text).map_err(|e| value_error(e.into()))?;

    match run(&input, &config).map_err(value_error)? {
        RunReport::Schedule(report) => Ok(report.into()),
        RunReport::Priority(_) => Err(PyValueError::new_err("expected a timed schedule")),
    }
}

/// Priority order of the graph described by `graph_text`.
#[pyfunction]
#[pyo3(signature = (graph_text, verbosity=0))]
fn prioritize(graph_text: &str, verbosity: u8) -> PyResult<PyPriorityReport> {
    let config = AllocatorConfig {
        mode: Mode::Unpredicted,
        verbosity,
        ..AllocatorConfig::default()
    };
    let input = parse_graph(graph_text).map_err(|e| value_error(e.into()))?;

    match run(&input, &config).map_err(value_error)? {
        RunReport::Priority(report) => Ok(report.into()),
        RunReport::Schedule(_) => Err(PyValueError::new_err("expected a priority order")),
    }
}

/// The pe_alloc Python module.
#[pymodule]
fn pe_alloc(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyScheduledTask>()?;
    m.add_class::<PyScheduleReport>()?;
    m.add_class::<PyPriorityReport>()?;

    m.add_function(wrap_pyfunction!(schedule, m)?)?;
    m.add_function(wrap_pyfunction!(prioritize, m)?)?;

    Ok(())
}
