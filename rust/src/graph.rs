//! Immutable, validated view of the task graph and the PE/channel catalogs.

use thiserror::Error;

use crate::models::{ChannelId, ChannelSpec, GraphInput, PeType, PeTypeId, TaskId};

/// Errors raised while validating the graph description.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Shape mismatch in {matrix}: expected {expected}, found {found}")]
    ShapeMismatch {
        matrix: &'static str,
        expected: String,
        found: String,
    },
    #[error("Cycle detected in task graph through task T{0}")]
    Cycle(TaskId),
    #[error("Channel CHAN{channel} has non-positive bandwidth {bandwidth}")]
    NonPositiveBandwidth { channel: ChannelId, bandwidth: f64 },
    #[error("Task graph has no tasks")]
    EmptyGraph,
    #[error("PE type catalog is empty")]
    EmptyCatalog,
}

fn check_rows<T>(
    matrix: &'static str,
    rows: &[Vec<T>],
    expected_rows: usize,
    expected_cols: usize,
) -> Result<(), GraphError> {
    if rows.len() != expected_rows {
        return Err(GraphError::ShapeMismatch {
            matrix,
            expected: format!("{} rows", expected_rows),
            found: format!("{} rows", rows.len()),
        });
    }
    for (i, row) in rows.iter().enumerate() {
        if row.len() != expected_cols {
            return Err(GraphError::ShapeMismatch {
                matrix,
                expected: format!("{} columns", expected_cols),
                found: format!("{} columns in row {}", row.len(), i),
            });
        }
    }
    Ok(())
}

/// Task graph with precomputed parent/child lists and a dependency order.
///
/// Built once from a [`GraphInput`]; read-only for the engine's lifetime.
#[derive(Clone, Debug)]
pub struct TaskGraph {
    volumes: Vec<Vec<f64>>,
    pe_types: Vec<PeType>,
    times: Vec<Vec<f64>>,
    costs: Vec<Vec<f64>>,
    channels: Vec<ChannelSpec>,
    unpredictable: Vec<bool>,
    /// Direct predecessors per task, ascending ids.
    parents: Vec<Vec<TaskId>>,
    /// Direct successors per task, ascending ids.
    children: Vec<Vec<TaskId>>,
    /// Parents-before-children order over all tasks.
    allocation_order: Vec<TaskId>,
}

impl TaskGraph {
    /// Validate the input against task/PE counts and build the graph.
    pub fn new(input: &GraphInput) -> Result<Self, GraphError> {
        let n = input.adjacency.len();
        let m = input.pe_types.len();
        if n == 0 {
            return Err(GraphError::EmptyGraph);
        }
        if m == 0 {
            return Err(GraphError::EmptyCatalog);
        }

        check_rows("adjacency", &input.adjacency, n, n)?;
        check_rows("volumes", &input.volumes, n, n)?;
        check_rows("times", &input.times, n, m)?;
        check_rows("costs", &input.costs, n, m)?;

        for (id, channel) in input.channels.iter().enumerate() {
            if channel.connections.len() != m {
                return Err(GraphError::ShapeMismatch {
                    matrix: "channels",
                    expected: format!("{} connection flags", m),
                    found: format!("{} in CHAN{}", channel.connections.len(), id),
                });
            }
            // Negated comparison also rejects NaN
            if !(channel.bandwidth > 0.0) {
                return Err(GraphError::NonPositiveBandwidth {
                    channel: id,
                    bandwidth: channel.bandwidth,
                });
            }
        }

        let unpredictable = match &input.unpredictable {
            Some(mask) if mask.len() != n => {
                return Err(GraphError::ShapeMismatch {
                    matrix: "unpredictable",
                    expected: format!("{} entries", n),
                    found: format!("{} entries", mask.len()),
                })
            }
            Some(mask) => mask.clone(),
            None => vec![false; n],
        };

        let mut parents: Vec<Vec<TaskId>> = vec![Vec::new(); n];
        let mut children: Vec<Vec<TaskId>> = vec![Vec::new(); n];
        for (parent, row) in input.adjacency.iter().enumerate() {
            for (child, &edge) in row.iter().enumerate() {
                if edge {
                    parents[child].push(parent);
                    children[parent].push(child);
                }
            }
        }

        let mut graph = Self {
            volumes: input.volumes.clone(),
            pe_types: input.pe_types.clone(),
            times: input.times.clone(),
            costs: input.costs.clone(),
            channels: input.channels.clone(),
            unpredictable,
            parents,
            children,
            allocation_order: Vec::new(),
        };
        graph.allocation_order = graph.dependency_order(0..n)?;
        Ok(graph)
    }

    /// Order in which tasks must be placed so every parent precedes its children.
    ///
    /// Starting tasks are visited in the given order; before a task is emitted all of
    /// its not-yet-emitted parents are emitted first, in ascending id order. This is the
    /// order a recursive "allocate parents on demand" walk would produce, evaluated
    /// with an explicit stack.
    pub fn dependency_order<I>(&self, starts: I) -> Result<Vec<TaskId>, GraphError>
    where
        I: IntoIterator<Item = TaskId>,
    {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Open,
            Done,
        }

        let n = self.task_count();
        let mut marks = vec![Mark::New; n];
        let mut order = Vec::with_capacity(n);

        for start in starts {
            if start >= n || marks[start] != Mark::New {
                continue;
            }
            marks[start] = Mark::Open;
            // (task, index of the next parent to visit)
            let mut stack: Vec<(TaskId, usize)> = vec![(start, 0)];

            while let Some(frame) = stack.last_mut() {
                let (task, next) = *frame;
                match self.parents[task].get(next) {
                    Some(&parent) => {
                        frame.1 += 1;
                        match marks[parent] {
                            Mark::New => {
                                marks[parent] = Mark::Open;
                                stack.push((parent, 0));
                            }
                            Mark::Open => return Err(GraphError::Cycle(parent)),
                            Mark::Done => {}
                        }
                    }
                    None => {
                        marks[task] = Mark::Done;
                        order.push(task);
                        stack.pop();
                    }
                }
            }
        }

        Ok(order)
    }

    pub fn task_count(&self) -> usize {
        self.parents.len()
    }

    pub fn pe_count(&self) -> usize {
        self.pe_types.len()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn parents(&self, task: TaskId) -> &[TaskId] {
        &self.parents[task]
    }

    #[inline]
    pub fn children(&self, task: TaskId) -> &[TaskId] {
        &self.children[task]
    }

    /// Data volume sent from `parent` to `child`.
    #[inline]
    pub fn volume(&self, parent: TaskId, child: TaskId) -> f64 {
        self.volumes[parent][child]
    }

    #[inline]
    pub fn time(&self, task: TaskId, pe_type: PeTypeId) -> f64 {
        self.times[task][pe_type]
    }

    #[inline]
    pub fn cost(&self, task: TaskId, pe_type: PeTypeId) -> f64 {
        self.costs[task][pe_type]
    }

    #[inline]
    pub fn pe_type(&self, pe_type: PeTypeId) -> &PeType {
        &self.pe_types[pe_type]
    }

    pub fn pe_types(&self) -> &[PeType] {
        &self.pe_types
    }

    #[inline]
    pub fn channel(&self, channel: ChannelId) -> &ChannelSpec {
        &self.channels[channel]
    }

    pub fn channels(&self) -> &[ChannelSpec] {
        &self.channels
    }

    pub fn times(&self) -> &[Vec<f64>] {
        &self.times
    }

    pub fn costs(&self) -> &[Vec<f64>] {
        &self.costs
    }

    pub fn is_unpredictable(&self, task: TaskId) -> bool {
        self.unpredictable[task]
    }

    pub fn allocation_order(&self) -> &[TaskId] {
        &self.allocation_order
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::PeCategory;

    /// Graph input with `n` tasks, the given edges `(parent, child, volume)`,
    /// per-type `(unit_cost, category)` and a single channel wired to every type.
    pub(crate) fn make_input(
        n: usize,
        edges: &[(TaskId, TaskId, f64)],
        pe_types: &[(f64, PeCategory)],
        times: Vec<Vec<f64>>,
        costs: Vec<Vec<f64>>,
    ) -> GraphInput {
        let mut adjacency = vec![vec![false; n]; n];
        let mut volumes = vec![vec![0.0; n]; n];
        for &(p, c, v) in edges {
            adjacency[p][c] = true;
            volumes[p][c] = v;
        }
        GraphInput {
            adjacency,
            volumes,
            pe_types: pe_types
                .iter()
                .map(|&(unit_cost, category)| PeType::new(unit_cost, category))
                .collect(),
            times,
            costs,
            channels: vec![ChannelSpec::new(1.0, 1.0, vec![true; pe_types.len()])],
            unpredictable: None,
        }
    }

    fn two_types() -> Vec<(f64, PeCategory)> {
        vec![(1.0, PeCategory::Universal), (2.0, PeCategory::Specialized)]
    }

    #[test]
    fn test_parents_and_children() {
        let input = make_input(
            4,
            &[(0, 1, 1.0), (0, 2, 1.0), (1, 3, 1.0), (2, 3, 1.0)],
            &two_types(),
            vec![vec![1.0, 2.0]; 4],
            vec![vec![1.0, 2.0]; 4],
        );
        let graph = TaskGraph::new(&input).unwrap();
        assert_eq!(graph.parents(3), &[1, 2]);
        assert_eq!(graph.children(0), &[1, 2]);
        assert!(graph.parents(0).is_empty());
        assert_eq!(graph.allocation_order(), &[0, 1, 2, 3]);
    }

    #[test]
    fn test_dependency_order_visits_parents_first() {
        // 0 depends on 2, 2 depends on 1
        let input = make_input(
            3,
            &[(2, 0, 1.0), (1, 2, 1.0)],
            &two_types(),
            vec![vec![1.0, 2.0]; 3],
            vec![vec![1.0, 2.0]; 3],
        );
        let graph = TaskGraph::new(&input).unwrap();
        assert_eq!(graph.allocation_order(), &[1, 2, 0]);
        assert_eq!(graph.dependency_order([2]).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_cycle_detected() {
        let input = make_input(
            3,
            &[(0, 1, 1.0), (1, 2, 1.0), (2, 0, 1.0)],
            &two_types(),
            vec![vec![1.0, 2.0]; 3],
            vec![vec![1.0, 2.0]; 3],
        );
        assert!(matches!(
            TaskGraph::new(&input),
            Err(GraphError::Cycle(_))
        ));
    }

    #[test]
    fn test_self_loop_is_cycle() {
        let input = make_input(
            2,
            &[(1, 1, 1.0)],
            &two_types(),
            vec![vec![1.0, 2.0]; 2],
            vec![vec![1.0, 2.0]; 2],
        );
        assert_eq!(TaskGraph::new(&input).unwrap_err(), GraphError::Cycle(1));
    }

    #[test]
    fn test_shape_mismatch_times() {
        let input = make_input(
            2,
            &[],
            &two_types(),
            vec![vec![1.0, 2.0], vec![1.0]],
            vec![vec![1.0, 2.0]; 2],
        );
        assert!(matches!(
            TaskGraph::new(&input),
            Err(GraphError::ShapeMismatch { matrix: "times", .. })
        ));
    }

    #[test]
    fn test_shape_mismatch_unpredictable_mask() {
        let mut input = make_input(
            2,
            &[],
            &two_types(),
            vec![vec![1.0, 2.0]; 2],
            vec![vec![1.0, 2.0]; 2],
        );
        input.unpredictable = Some(vec![true]);
        assert!(matches!(
            TaskGraph::new(&input),
            Err(GraphError::ShapeMismatch {
                matrix: "unpredictable",
                ..
            })
        ));
    }

    #[test]
    fn test_zero_bandwidth_rejected() {
        let mut input = make_input(
            2,
            &[],
            &two_types(),
            vec![vec![1.0, 2.0]; 2],
            vec![vec![1.0, 2.0]; 2],
        );
        input.channels[0].bandwidth = 0.0;
        assert_eq!(
            TaskGraph::new(&input).unwrap_err(),
            GraphError::NonPositiveBandwidth {
                channel: 0,
                bandwidth: 0.0
            }
        );
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(
            TaskGraph::new(&GraphInput::default()).unwrap_err(),
            GraphError::EmptyGraph
        );
        let input = make_input(1, &[], &[], vec![vec![]], vec![vec![]]);
        assert_eq!(TaskGraph::new(&input).unwrap_err(), GraphError::EmptyCatalog);
    }
}
