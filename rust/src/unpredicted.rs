//! Priority ordering for graphs with unpredictable tasks.
//!
//! No channels or instances are involved: every task gets the PE type with the
//! smallest `time × cost` (universal types only for unpredictable tasks), and tasks
//! are emitted by decreasing critical-path length.

use crate::error::AllocationError;
use crate::graph::TaskGraph;
use crate::models::{PeCategory, PeTypeId, PriorityReport, TaskId};
use crate::{log_changes, log_debug};

/// Working record of one task while ordering.
#[derive(Clone, Debug)]
struct PriorityEntry {
    pe_type: PeTypeId,
    critical_path: f64,
    scheduled: bool,
}

/// PE type minimizing `time × cost` for `task`; lowest id on ties.
fn cheapest_fast_type(graph: &TaskGraph, task: TaskId) -> Result<PeTypeId, AllocationError> {
    let restricted = graph.is_unpredictable(task);
    let mut best: Option<(PeTypeId, f64)> = None;
    for pe_type in 0..graph.pe_count() {
        if restricted && graph.pe_type(pe_type).category != PeCategory::Universal {
            continue;
        }
        let product = graph.time(task, pe_type) * graph.cost(task, pe_type);
        if best.map_or(true, |(_, b)| product < b) {
            best = Some((pe_type, product));
        }
    }
    best.map(|(pe_type, _)| pe_type)
        .ok_or(AllocationError::NoEligibleType { task })
}

/// Assign PE types and order tasks by critical-path length.
pub fn prioritize(graph: &TaskGraph, verbosity: u8) -> Result<PriorityReport, AllocationError> {
    let n = graph.task_count();
    let mut entries = Vec::with_capacity(n);
    for task in 0..n {
        entries.push(PriorityEntry {
            pe_type: cheapest_fast_type(graph, task)?,
            critical_path: 0.0,
            scheduled: false,
        });
    }

    // Children before parents
    for &task in graph.allocation_order().iter().rev() {
        let children = graph.children(task);
        if children.is_empty() {
            continue;
        }
        let longest = children
            .iter()
            .map(|&c| entries[c].critical_path)
            .fold(0.0, f64::max);
        entries[task].critical_path = longest + graph.time(task, entries[task].pe_type);
        log_debug!(
            verbosity,
            "  T{}: critical path {:.3}",
            task,
            entries[task].critical_path
        );
    }

    let mut order = Vec::with_capacity(n);
    while order.len() < n {
        let mut next: Option<TaskId> = None;
        for (task, entry) in entries.iter().enumerate() {
            if entry.scheduled {
                continue;
            }
            if next.map_or(true, |b| entry.critical_path > entries[b].critical_path) {
                next = Some(task);
            }
        }
        let Some(task) = next else {
            break;
        };
        entries[task].scheduled = true;
        order.push(task);
    }

    log_changes!(verbosity, "Priority order: {:?}", order);
    Ok(PriorityReport {
        assignments: entries.iter().map(|e| e.pe_type).collect(),
        critical_path_lengths: entries.iter().map(|e| e.critical_path).collect(),
        order,
    })
}
