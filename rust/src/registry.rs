//! Arena of PE instances and channel attachments.
//!
//! Instances are created lazily while tasks are placed and addressed by stable
//! [`InstanceId`] handles. Nothing is ever removed: an instance that loses all of
//! its tasks during reallocation simply stops contributing to the plan's cost.

use rustc_hash::FxHashSet;

use crate::models::{ChannelId, PeCategory, PeTypeId};

/// Stable handle of a PE instance in a [`ResourceRegistry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u32);

impl InstanceId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A concrete copy of a PE type.
#[derive(Clone, Debug)]
pub struct PeInstance {
    pub id: InstanceId,
    /// Category prefix plus per-category ordinal, e.g. "HC0" or "PP3".
    pub label: String,
    pub pe_type: PeTypeId,
    /// Channels this instance is wired to.
    pub channels: FxHashSet<ChannelId>,
    pub last_start: f64,
    /// End of the last task placed here; never decreases within a pass.
    pub last_end: f64,
    pub total_active_time: f64,
    pub jobs: u32,
}

impl PeInstance {
    #[inline]
    pub fn is_attached(&self, channel: ChannelId) -> bool {
        self.channels.contains(&channel)
    }
}

/// Owned registry of instances and of the instances attached to each channel.
#[derive(Clone, Debug)]
pub struct ResourceRegistry {
    instances: Vec<PeInstance>,
    /// channel id -> attached instances
    channel_members: Vec<FxHashSet<InstanceId>>,
    universal_count: u32,
    specialized_count: u32,
}

impl ResourceRegistry {
    pub fn new(channel_count: usize) -> Self {
        Self {
            instances: Vec::new(),
            channel_members: vec![FxHashSet::default(); channel_count],
            universal_count: 0,
            specialized_count: 0,
        }
    }

    /// Create a fresh, idle instance of a PE type.
    pub fn create_instance(&mut self, pe_type: PeTypeId, category: PeCategory) -> InstanceId {
        let ordinal = match category {
            PeCategory::Universal => &mut self.universal_count,
            PeCategory::Specialized => &mut self.specialized_count,
        };
        let label = format!("{}{}", category.label_prefix(), *ordinal);
        *ordinal += 1;

        let id = InstanceId(self.instances.len() as u32);
        self.instances.push(PeInstance {
            id,
            label,
            pe_type,
            channels: FxHashSet::default(),
            last_start: 0.0,
            last_end: 0.0,
            total_active_time: 0.0,
            jobs: 0,
        });
        id
    }

    #[inline]
    pub fn instance(&self, id: InstanceId) -> &PeInstance {
        &self.instances[id.index()]
    }

    pub fn instances(&self) -> &[PeInstance] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn channel_count(&self) -> usize {
        self.channel_members.len()
    }

    /// Instances currently attached to a channel.
    pub fn channel_members(&self, channel: ChannelId) -> &FxHashSet<InstanceId> {
        &self.channel_members[channel]
    }

    /// Wire an instance to a channel. Returns false if it was already attached.
    pub fn attach(&mut self, channel: ChannelId, instance: InstanceId) -> bool {
        let added = self.instances[instance.index()].channels.insert(channel);
        self.channel_members[channel].insert(instance);
        added
    }

    /// Record a task interval on an instance.
    pub fn record_task(&mut self, id: InstanceId, start: f64, end: f64) {
        let instance = &mut self.instances[id.index()];
        instance.last_start = start;
        instance.last_end = instance.last_end.max(end);
        instance.total_active_time += end - start;
        instance.jobs += 1;
    }

    /// Clear all timelines so a plan can be replayed from scratch.
    ///
    /// Channel attachments are kept.
    pub fn reset_timelines(&mut self) {
        for instance in &mut self.instances {
            instance.last_start = 0.0;
            instance.last_end = 0.0;
            instance.total_active_time = 0.0;
            instance.jobs = 0;
        }
    }

    /// Find an instance of `pe_type` that is free by `ready_time`.
    ///
    /// `preferred` is returned when it qualifies; otherwise the lowest id wins.
    pub fn reusable_instance(
        &self,
        pe_type: PeTypeId,
        ready_time: f64,
        preferred: Option<InstanceId>,
    ) -> Option<InstanceId> {
        let fits = |instance: &PeInstance| {
            instance.pe_type == pe_type && instance.last_end <= ready_time
        };
        if let Some(id) = preferred {
            if fits(self.instance(id)) {
                return Some(id);
            }
        }
        self.instances.iter().find(|i| fits(i)).map(|i| i.id)
    }

    /// Channels the two instances are both attached to.
    pub fn shared_channels(&self, a: InstanceId, b: InstanceId) -> Vec<ChannelId> {
        let other = &self.instance(b).channels;
        let mut shared: Vec<ChannelId> = self
            .instance(a)
            .channels
            .iter()
            .filter(|c| other.contains(c))
            .copied()
            .collect();
        shared.sort_unstable();
        shared
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_use_per_category_ordinals() {
        let mut registry = ResourceRegistry::new(1);
        let a = registry.create_instance(0, PeCategory::Universal);
        let b = registry.create_instance(1, PeCategory::Specialized);
        let c = registry.create_instance(2, PeCategory::Specialized);
        let d = registry.create_instance(0, PeCategory::Universal);

        assert_eq!(registry.instance(a).label, "HC0");
        assert_eq!(registry.instance(b).label, "PP0");
        assert_eq!(registry.instance(c).label, "PP1");
        assert_eq!(registry.instance(d).label, "HC1");
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_attach_is_idempotent() {
        let mut registry = ResourceRegistry::new(2);
        let a = registry.create_instance(0, PeCategory::Universal);
        assert!(registry.attach(1, a));
        assert!(!registry.attach(1, a));
        assert!(registry.instance(a).is_attached(1));
        assert_eq!(registry.channel_members(1).len(), 1);
        assert!(registry.channel_members(0).is_empty());
    }

    #[test]
    fn test_record_task_keeps_last_end_monotonic() {
        let mut registry = ResourceRegistry::new(0);
        let a = registry.create_instance(0, PeCategory::Universal);
        registry.record_task(a, 0.0, 5.0);
        registry.record_task(a, 5.0, 7.5);
        let instance = registry.instance(a);
        assert_eq!(instance.last_start, 5.0);
        assert_eq!(instance.last_end, 7.5);
        assert_eq!(instance.total_active_time, 7.5);
        assert_eq!(instance.jobs, 2);

        registry.reset_timelines();
        assert_eq!(registry.instance(a).last_end, 0.0);
        assert_eq!(registry.instance(a).jobs, 0);
    }

    #[test]
    fn test_reusable_instance() {
        let mut registry = ResourceRegistry::new(0);
        let a = registry.create_instance(0, PeCategory::Universal);
        let b = registry.create_instance(0, PeCategory::Universal);
        let c = registry.create_instance(1, PeCategory::Specialized);
        registry.record_task(a, 0.0, 4.0);
        registry.record_task(b, 0.0, 2.0);
        registry.record_task(c, 0.0, 1.0);

        assert_eq!(registry.reusable_instance(0, 1.0, None), None);
        assert_eq!(registry.reusable_instance(0, 3.0, None), Some(b));
        assert_eq!(registry.reusable_instance(0, 5.0, None), Some(a));
        assert_eq!(registry.reusable_instance(0, 5.0, Some(b)), Some(b));
        // preferred instance of another type is ignored
        assert_eq!(registry.reusable_instance(0, 5.0, Some(c)), Some(a));
    }

    #[test]
    fn test_shared_channels_sorted() {
        let mut registry = ResourceRegistry::new(3);
        let a = registry.create_instance(0, PeCategory::Universal);
        let b = registry.create_instance(1, PeCategory::Specialized);
        registry.attach(2, a);
        registry.attach(0, a);
        registry.attach(2, b);
        registry.attach(0, b);
        registry.attach(1, b);
        assert_eq!(registry.shared_channels(a, b), vec![0, 2]);
    }
}
