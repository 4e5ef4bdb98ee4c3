// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The process-wide table mapping handle ids to realized resource objects.
//!
//! Handle creation is split in two phases. [`HandleTable::reserve`] hands out an
//! id immediately and can run on any thread; [`HandleTable::construct`] later
//! stores the realized object, normally on the render thread. Objects are shared
//! as `Arc`s so a lookup never holds the table lock while the object is used.

use crate::driver::api::{Handle, HandleId, HandleKind, ResourceKind};
use crate::driver::error::contract_violation;
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Object = Arc<dyn Any + Send + Sync>;

enum Slot {
    /// Id handed out, object not realized yet.
    Reserved(ResourceKind),
    /// Realized object.
    Live(ResourceKind, Object),
}

impl Slot {
    fn kind(&self) -> ResourceKind {
        match self {
            Slot::Reserved(kind) | Slot::Live(kind, _) => *kind,
        }
    }
}

struct Slots {
    entries: HashMap<HandleId, Slot>,
    next_id: HandleId,
}

/// Mutex-guarded arena of resource slots keyed by handle id.
///
/// Ids start at 1, grow monotonically and are never reused. The mutex is held for
/// map bookkeeping only.
pub struct HandleTable {
    slots: Mutex<Slots>,
}

impl HandleTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Slots {
                entries: HashMap::new(),
                next_id: 1,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        // Contract violations panic with the lock held; the map is still consistent.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserves a fresh id for a resource of category `K`.
    pub fn reserve<K: HandleKind>(&self) -> Handle<K> {
        let mut slots = self.lock();
        let id = slots.next_id;
        slots.next_id = match id.checked_add(1) {
            Some(next) => next,
            None => contract_violation("handle ids exhausted"),
        };
        slots.entries.insert(id, Slot::Reserved(K::KIND));
        Handle::from_raw(id)
    }

    /// Stores the realized object behind a reserved handle and returns it.
    ///
    /// Panics if the handle was never reserved or has already been constructed.
    pub fn construct<K: HandleKind, T: Any + Send + Sync>(
        &self,
        handle: Handle<K>,
        object: T,
    ) -> Arc<T> {
        let object = Arc::new(object);
        let mut slots = self.lock();
        match slots.entries.get_mut(&handle.id()) {
            Some(slot) => {
                if let Slot::Live(..) = slot {
                    contract_violation(format_args!("{handle:?} constructed twice"));
                }
                let reserved = slot.kind();
                if reserved != K::KIND {
                    contract_violation(format_args!("{handle:?} was reserved as a {reserved:?}"));
                }
                *slot = Slot::Live(K::KIND, object.clone());
            }
            None => contract_violation(format_args!("construct on unknown {handle:?}")),
        }
        object
    }

    /// Looks up the object behind `handle`. The null handle yields `None`.
    ///
    /// Panics on a destroyed or never-reserved id, on a handle whose object is not
    /// realized yet, and when `T` is not the stored type.
    pub fn lookup<K: HandleKind, T: Any + Send + Sync>(&self, handle: Handle<K>) -> Option<Arc<T>> {
        if handle.is_null() {
            return None;
        }
        let object = {
            let slots = self.lock();
            match slots.entries.get(&handle.id()) {
                Some(Slot::Live(_, object)) => object.clone(),
                Some(Slot::Reserved(_)) => {
                    contract_violation(format_args!("{handle:?} used before it was realized"))
                }
                None => contract_violation(format_args!("{handle:?} is not a live handle")),
            }
        };
        match object.downcast::<T>() {
            Ok(object) => Some(object),
            Err(_) => contract_violation(format_args!(
                "{handle:?} does not hold a {}",
                type_name::<T>()
            )),
        }
    }

    /// Looks up the object behind `handle` without enforcing the handle contract.
    ///
    /// Returns `None` for the null handle, an unknown id, an object that is not
    /// realized yet, or one of another type.
    pub fn try_lookup<K: HandleKind, T: Any + Send + Sync>(&self, handle: Handle<K>) -> Option<Arc<T>> {
        if handle.is_null() {
            return None;
        }
        let object = match self.lock().entries.get(&handle.id()) {
            Some(Slot::Live(_, object)) => object.clone(),
            _ => return None,
        };
        object.downcast::<T>().ok()
    }

    /// Erases the slot behind `handle` and hands the object back for deferred
    /// teardown. Returns `None` for the null handle and for a handle that was
    /// reserved but never realized.
    pub fn destruct<K: HandleKind, T: Any + Send + Sync>(&self, handle: Handle<K>) -> Option<Arc<T>> {
        if handle.is_null() {
            return None;
        }
        let slot = self.lock().entries.remove(&handle.id());
        match slot {
            Some(Slot::Live(_, object)) => match object.downcast::<T>() {
                Ok(object) => Some(object),
                Err(_) => contract_violation(format_args!(
                    "{handle:?} does not hold a {}",
                    type_name::<T>()
                )),
            },
            Some(Slot::Reserved(_)) => None,
            None => contract_violation(format_args!("{handle:?} destroyed twice or never created")),
        }
    }

    /// Returns `true` if `handle` refers to a reserved or realized slot.
    pub fn contains<K: HandleKind>(&self, handle: Handle<K>) -> bool {
        self.lock().entries.contains_key(&handle.id())
    }

    /// Number of occupied slots, reserved or realized.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns `true` when no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Occupied slot count per category, for leak reports.
    pub fn census(&self) -> HashMap<ResourceKind, usize> {
        let slots = self.lock();
        let mut census = HashMap::new();
        for slot in slots.entries.values() {
            *census.entry(slot.kind()).or_insert(0) += 1;
        }
        census
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HandleTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.lock();
        f.debug_struct("HandleTable")
            .field("occupied", &slots.entries.len())
            .field("next_id", &slots.next_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::api::{HwProgram, HwTexture, TextureHandle};
    use std::collections::HashSet;
    use std::thread;

    struct FakeTexture {
        width: u32,
    }

    #[test]
    fn test_reserve_hands_out_unique_ids_across_threads() {
        let table = Arc::new(HandleTable::new());
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let table = table.clone();
                thread::spawn(move || {
                    (0..250)
                        .map(|_| table.reserve::<HwTexture>().id())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids = HashSet::new();
        for worker in workers {
            for id in worker.join().unwrap() {
                assert_ne!(id, 0);
                assert!(ids.insert(id), "id {id} handed out twice");
            }
        }
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_ids_are_never_recycled() {
        let table = HandleTable::new();
        let first: TextureHandle = table.reserve();
        table.construct(first, FakeTexture { width: 4 });
        table.destruct::<_, FakeTexture>(first);

        let second: TextureHandle = table.reserve();
        assert!(second.id() > first.id());
    }

    #[test]
    fn test_construct_lookup_destruct_balance() {
        let table = HandleTable::new();
        let handles: Vec<TextureHandle> = (0..8).map(|_| table.reserve()).collect();
        for (i, handle) in handles.iter().enumerate() {
            table.construct(*handle, FakeTexture { width: i as u32 });
        }
        assert_eq!(table.len(), 8);

        let third = table.lookup::<_, FakeTexture>(handles[3]).unwrap();
        assert_eq!(third.width, 3);

        for handle in &handles {
            assert!(table.destruct::<_, FakeTexture>(*handle).is_some());
        }
        assert!(table.is_empty());
    }

    #[test]
    fn test_null_handle_means_nothing() {
        let table = HandleTable::new();
        assert!(table
            .lookup::<_, FakeTexture>(TextureHandle::NULL)
            .is_none());
        assert!(table
            .destruct::<_, FakeTexture>(TextureHandle::NULL)
            .is_none());
    }

    #[test]
    fn test_census_counts_per_kind() {
        let table = HandleTable::new();
        table.reserve::<HwTexture>();
        table.reserve::<HwTexture>();
        table.reserve::<HwProgram>();
        let census = table.census();
        assert_eq!(census[&ResourceKind::Texture], 2);
        assert_eq!(census[&ResourceKind::Program], 1);
    }

    #[test]
    #[should_panic(expected = "used before it was realized")]
    fn test_lookup_before_construct_is_fatal() {
        let table = HandleTable::new();
        let handle: TextureHandle = table.reserve();
        table.lookup::<_, FakeTexture>(handle);
    }

    #[test]
    fn test_try_lookup_tolerates_unrealized_handles() {
        let table = HandleTable::new();
        let handle: TextureHandle = table.reserve();
        assert!(table.try_lookup::<_, FakeTexture>(handle).is_none());
        assert!(table.contains(handle));

        table.construct(handle, FakeTexture { width: 7 });
        assert_eq!(table.try_lookup::<_, FakeTexture>(handle).unwrap().width, 7);
        assert!(table.try_lookup::<_, u32>(handle).is_none());
        assert!(table
            .try_lookup::<_, FakeTexture>(TextureHandle::from_raw(99))
            .is_none());
    }

    #[test]
    #[should_panic(expected = "reserved as a Program")]
    fn test_construct_with_another_kind_is_fatal() {
        let table = HandleTable::new();
        let program = table.reserve::<HwProgram>();
        let forged = TextureHandle::from_raw(program.id());
        table.construct(forged, FakeTexture { width: 1 });
    }

    #[test]
    #[should_panic(expected = "destroyed twice")]
    fn test_double_destroy_is_fatal() {
        let table = HandleTable::new();
        let handle: TextureHandle = table.reserve();
        table.construct(handle, FakeTexture { width: 1 });
        table.destruct::<_, FakeTexture>(handle);
        table.destruct::<_, FakeTexture>(handle);
    }

    #[test]
    #[should_panic(expected = "construct on unknown")]
    fn test_construct_unknown_is_fatal() {
        let table = HandleTable::new();
        table.construct(TextureHandle::from_raw(42), FakeTexture { width: 1 });
    }
}
