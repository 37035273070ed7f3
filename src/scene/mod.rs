//! Live, anchored instances of prefabs.

mod transform;

use slab::Slab;

use crate::record::{PrefabRef, RecordHandle};
use crate::service::AnchorHandle;

pub use self::transform::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId {
    index: usize,
}

impl InstanceId {
    fn new(index: usize) -> Self {
        Self { index }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub anchor: AnchorHandle,
    pub prefab: PrefabRef,
    /// Ledger record backing this instance; `None` while the anchor is
    /// still waiting for the service to confirm it.
    pub record: Option<RecordHandle>,
    pub transform: Transform,
}

impl Instance {
    pub fn new(anchor: AnchorHandle, prefab: PrefabRef, transform: Transform) -> Self {
        Self {
            anchor,
            prefab,
            record: None,
            transform,
        }
    }

    pub fn with_record(mut self, record: RecordHandle) -> Self {
        self.record = Some(record);
        self
    }

    pub fn is_confirmed(&self) -> bool {
        self.record.is_some()
    }
}

#[derive(Default)]
pub struct Scene {
    instances: Slab<Instance>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            instances: Slab::new(),
        }
    }

    pub fn spawn(&mut self, instance: Instance) -> InstanceId {
        InstanceId::new(self.instances.insert(instance))
    }

    pub fn despawn(&mut self, id: InstanceId) -> Option<Instance> {
        self.instances.try_remove(id.index)
    }

    /// Removes every instance, returning them for teardown.
    pub fn despawn_all(&mut self) -> Vec<Instance> {
        self.instances.drain().collect()
    }

    pub fn instance(&self, id: InstanceId) -> Option<&Instance> {
        self.instances.get(id.index)
    }

    pub fn instance_mut(&mut self, id: InstanceId) -> Option<&mut Instance> {
        self.instances.get_mut(id.index)
    }

    pub fn find_by_record(&self, record: RecordHandle) -> Option<InstanceId> {
        self.instances
            .iter()
            .find(|(_, instance)| instance.record == Some(record))
            .map(|(index, _)| InstanceId::new(index))
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn instances(&self) -> impl Iterator<Item = (InstanceId, &Instance)> {
        self.instances
            .iter()
            .map(|(index, instance)| (InstanceId::new(index), instance))
    }

    pub fn instances_mut(&mut self) -> impl Iterator<Item = (InstanceId, &mut Instance)> {
        self.instances
            .iter_mut()
            .map(|(index, instance)| (InstanceId::new(index), instance))
    }
}
