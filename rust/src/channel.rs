//! Communication channel selection under physical-connectivity constraints.
//!
//! Selection is split from mutation: [`choose_channel`] only reads the registry,
//! [`connect`] applies the choice by attaching the channel to both instances.
//! Equal-cost candidates resolve to the lowest channel id.

use crate::error::AllocationError;
use crate::graph::TaskGraph;
use crate::models::{ChannelId, PeTypeId};
use crate::registry::{InstanceId, ResourceRegistry};

/// Cheapest channel among `candidates` (lowest id on ties).
fn cheapest<I>(graph: &TaskGraph, candidates: I) -> Option<ChannelId>
where
    I: IntoIterator<Item = ChannelId>,
{
    let mut best: Option<(ChannelId, f64)> = None;
    for channel in candidates {
        let cost = graph.channel(channel).cost;
        let better = match best {
            None => true,
            Some((best_id, best_cost)) => {
                cost < best_cost || (cost == best_cost && channel < best_id)
            }
        };
        if better {
            best = Some((channel, cost));
        }
    }
    best.map(|(channel, _)| channel)
}

/// Whether any catalog channel can be wired to both PE types.
pub fn connectable(graph: &TaskGraph, a: PeTypeId, b: PeTypeId) -> bool {
    graph.channels().iter().any(|c| c.connects(a) && c.connects(b))
}

/// Pick the channel linking `parent` (if any) with `child` without mutating anything.
///
/// * Root (`parent == None`): cheapest channel wired to the child's type.
/// * Otherwise: cheapest channel already attached to the parent that also reaches
///   the child's type; failing that, the cheapest catalog channel reaching both types.
pub fn choose_channel(
    graph: &TaskGraph,
    registry: &ResourceRegistry,
    parent: Option<InstanceId>,
    child: InstanceId,
) -> Result<ChannelId, AllocationError> {
    let child_type = registry.instance(child).pe_type;

    let Some(parent) = parent else {
        return cheapest(
            graph,
            (0..graph.channel_count()).filter(|&c| graph.channel(c).connects(child_type)),
        )
        .ok_or(AllocationError::NoChannelAvailable {
            parent_type: None,
            child_type,
        });
    };

    let parent_instance = registry.instance(parent);
    let parent_type = parent_instance.pe_type;

    let already_attached = cheapest(
        graph,
        parent_instance
            .channels
            .iter()
            .copied()
            .filter(|&c| graph.channel(c).connects(child_type)),
    );
    if let Some(channel) = already_attached {
        return Ok(channel);
    }

    cheapest(
        graph,
        (0..graph.channel_count()).filter(|&c| {
            let spec = graph.channel(c);
            spec.connects(parent_type) && spec.connects(child_type)
        }),
    )
    .ok_or(AllocationError::NoChannelAvailable {
        parent_type: Some(parent_type),
        child_type,
    })
}

/// Choose a channel and attach it to both instances.
pub fn connect(
    graph: &TaskGraph,
    registry: &mut ResourceRegistry,
    parent: Option<InstanceId>,
    child: InstanceId,
) -> Result<ChannelId, AllocationError> {
    let channel = choose_channel(graph, registry, parent, child)?;
    if let Some(parent) = parent {
        registry.attach(channel, parent);
    }
    registry.attach(channel, child);
    Ok(channel)
}

/// Channel carrying data between two instances that are already wired together.
///
/// `previous` is kept while both instances are still attached to it; otherwise the
/// cheapest shared channel is used.
pub fn shared_channel(
    graph: &TaskGraph,
    registry: &ResourceRegistry,
    a: InstanceId,
    b: InstanceId,
    previous: Option<ChannelId>,
) -> Option<ChannelId> {
    if let Some(channel) = previous {
        if registry.instance(a).is_attached(channel) && registry.instance(b).is_attached(channel) {
            return Some(channel);
        }
    }
    cheapest(graph, registry.shared_channels(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::make_input;
    use crate::models::{ChannelSpec, PeCategory};

    /// Three PE types; channel costs/wiring chosen per test.
    fn graph_with_channels(channels: Vec<ChannelSpec>) -> TaskGraph {
        let mut input = make_input(
            1,
            &[],
            &[
                (1.0, PeCategory::Universal),
                (1.0, PeCategory::Specialized),
                (1.0, PeCategory::Specialized),
            ],
            vec![vec![1.0, 1.0, 1.0]],
            vec![vec![1.0, 1.0, 1.0]],
        );
        input.channels = channels;
        TaskGraph::new(&input).unwrap()
    }

    fn standard_channels() -> Vec<ChannelSpec> {
        vec![
            ChannelSpec::new(10.0, 1.0, vec![true, true, true]),
            ChannelSpec::new(3.0, 1.0, vec![true, false, true]),
            ChannelSpec::new(5.0, 1.0, vec![true, true, false]),
            ChannelSpec::new(3.0, 1.0, vec![false, true, true]),
        ]
    }

    #[test]
    fn test_root_picks_cheapest_connected() {
        let graph = graph_with_channels(standard_channels());
        let mut registry = ResourceRegistry::new(graph.channel_count());
        let hc = registry.create_instance(0, PeCategory::Universal);
        let pp = registry.create_instance(1, PeCategory::Specialized);

        assert_eq!(choose_channel(&graph, &registry, None, hc), Ok(1));
        // CHAN3 (cost 3) is the cheapest reaching type 1
        assert_eq!(choose_channel(&graph, &registry, None, pp), Ok(3));
    }

    #[test]
    fn test_prefers_channel_already_on_parent() {
        let graph = graph_with_channels(standard_channels());
        let mut registry = ResourceRegistry::new(graph.channel_count());
        let parent = registry.create_instance(0, PeCategory::Universal);
        let child = registry.create_instance(1, PeCategory::Specialized);
        registry.attach(0, parent);

        // CHAN2 would be cheaper, but CHAN0 is already on the parent and reaches type 1
        assert_eq!(connect(&graph, &mut registry, Some(parent), child), Ok(0));
        assert!(registry.instance(child).is_attached(0));
        assert!(registry.channel_members(0).contains(&child));
    }

    #[test]
    fn test_falls_back_to_cheapest_common_channel() {
        let graph = graph_with_channels(standard_channels());
        let mut registry = ResourceRegistry::new(graph.channel_count());
        let parent = registry.create_instance(0, PeCategory::Universal);
        let child = registry.create_instance(1, PeCategory::Specialized);
        // CHAN1 is on the parent but cannot reach type 1
        registry.attach(1, parent);

        assert_eq!(connect(&graph, &mut registry, Some(parent), child), Ok(2));
        assert!(registry.instance(parent).is_attached(2));
        assert!(registry.instance(child).is_attached(2));
    }

    #[test]
    fn test_tie_breaks_to_lowest_id() {
        let graph = graph_with_channels(vec![
            ChannelSpec::new(2.0, 1.0, vec![true, true, true]),
            ChannelSpec::new(2.0, 4.0, vec![true, true, true]),
        ]);
        let mut registry = ResourceRegistry::new(graph.channel_count());
        let a = registry.create_instance(0, PeCategory::Universal);
        let b = registry.create_instance(2, PeCategory::Specialized);
        assert_eq!(choose_channel(&graph, &registry, Some(a), b), Ok(0));
    }

    #[test]
    fn test_no_channel_available() {
        let graph = graph_with_channels(vec![ChannelSpec::new(1.0, 1.0, vec![true, false, false])]);
        let mut registry = ResourceRegistry::new(graph.channel_count());
        let a = registry.create_instance(0, PeCategory::Universal);
        let b = registry.create_instance(2, PeCategory::Specialized);

        assert_eq!(
            connect(&graph, &mut registry, Some(a), b),
            Err(AllocationError::NoChannelAvailable {
                parent_type: Some(0),
                child_type: 2
            })
        );
        assert_eq!(
            choose_channel(&graph, &registry, None, b),
            Err(AllocationError::NoChannelAvailable {
                parent_type: None,
                child_type: 2
            })
        );
        // nothing was attached by the failed attempt
        assert!(registry.instance(a).channels.is_empty());
        assert!(!connectable(&graph, 0, 2));
        assert!(connectable(&graph, 0, 0));
    }

    #[test]
    fn test_shared_channel_keeps_previous() {
        let graph = graph_with_channels(standard_channels());
        let mut registry = ResourceRegistry::new(graph.channel_count());
        let a = registry.create_instance(0, PeCategory::Universal);
        let b = registry.create_instance(2, PeCategory::Specialized);
        registry.attach(0, a);
        registry.attach(0, b);
        registry.attach(1, a);
        registry.attach(1, b);

        assert_eq!(shared_channel(&graph, &registry, a, b, Some(0)), Some(0));
        assert_eq!(shared_channel(&graph, &registry, a, b, None), Some(1));
        assert_eq!(shared_channel(&graph, &registry, a, b, Some(3)), Some(1));
    }
}
