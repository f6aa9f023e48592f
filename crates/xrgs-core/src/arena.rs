use xrgs_protocol::handle::{ResourceHandle, ResourceType};

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot map keyed by generation-checked handles.
///
/// Removing a value bumps the slot's generation, so every handle issued for
/// the old occupant stops resolving even after the slot is reused. Handles
/// carrying a different resource type than the arena's never resolve either.
pub struct Arena<T> {
    resource_type: ResourceType,
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Arena<T> {
    pub fn new(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Store a value and return a fresh handle for it.
    pub fn insert(&mut self, value: T) -> ResourceHandle {
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize].value = Some(value);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    value: Some(value),
                });
                (self.slots.len() - 1) as u32
            }
        };
        self.len += 1;
        ResourceHandle {
            index,
            generation: self.slots[index as usize].generation,
            resource_type: self.resource_type,
        }
    }

    fn slot(&self, handle: ResourceHandle) -> Option<&Slot<T>> {
        if handle.resource_type != self.resource_type {
            return None;
        }
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
    }

    pub fn get(&self, handle: ResourceHandle) -> Option<&T> {
        self.slot(handle).and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, handle: ResourceHandle) -> Option<&mut T> {
        if handle.resource_type != self.resource_type {
            return None;
        }
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    pub fn contains(&self, handle: ResourceHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Take the value out and retire the handle.
    pub fn remove(&mut self, handle: ResourceHandle) -> Option<T> {
        if !self.contains(handle) {
            return None;
        }
        let slot = &mut self.slots[handle.index as usize];
        let value = slot.value.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        value
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Live handles in slot order.
    pub fn handles(&self) -> Vec<ResourceHandle> {
        self.iter().map(|(handle, _)| handle).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceHandle, &T)> + '_ {
        let resource_type = self.resource_type;
        self.slots.iter().enumerate().filter_map(move |(index, slot)| {
            slot.value.as_ref().map(|value| {
                (
                    ResourceHandle {
                        index: index as u32,
                        generation: slot.generation,
                        resource_type,
                    },
                    value,
                )
            })
        })
    }
}
