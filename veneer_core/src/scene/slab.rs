// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Generational slot storage for scene-owned resources.

use alloc::vec::Vec;

/// A generational handle type stored in a [`Slab`].
pub(crate) trait SlabKey: Copy + core::fmt::Debug {
    /// Short name used in stale-handle panics.
    const KIND: &'static str;
    fn from_parts(idx: u32, generation: u32) -> Self;
    fn parts(self) -> (u32, u32);
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Values addressed by generational keys, with slot reuse.
#[derive(Debug)]
pub(crate) struct Slab<K, T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    live: usize,
    _key: core::marker::PhantomData<K>,
}

impl<K: SlabKey, T> Slab<K, T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            live: 0,
            _key: core::marker::PhantomData,
        }
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "a scene never holds 2^32 resources"
    )]
    pub(crate) fn insert(&mut self, value: T) -> K {
        self.live += 1;
        if let Some(idx) = self.free_list.pop() {
            let slot = &mut self.slots[idx as usize];
            slot.value = Some(value);
            return K::from_parts(idx, slot.generation);
        }
        let idx = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        K::from_parts(idx, 0)
    }

    /// Removes and returns the value, or `None` if `key` is stale.
    pub(crate) fn remove(&mut self, key: K) -> Option<T> {
        let (idx, generation) = key.parts();
        let slot = self.slots.get_mut(idx as usize)?;
        if slot.generation != generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation += 1;
        self.free_list.push(idx);
        self.live -= 1;
        Some(value)
    }

    pub(crate) fn contains(&self, key: K) -> bool {
        self.try_get(key).is_some()
    }

    pub(crate) fn try_get(&self, key: K) -> Option<&T> {
        let (idx, generation) = key.parts();
        self.slots
            .get(idx as usize)
            .filter(|s| s.generation == generation)
            .and_then(|s| s.value.as_ref())
    }

    /// # Panics
    ///
    /// Panics if the key is stale.
    pub(crate) fn get(&self, key: K) -> &T {
        match self.try_get(key) {
            Some(v) => v,
            None => panic!("stale {}: {key:?}", K::KIND),
        }
    }

    /// # Panics
    ///
    /// Panics if the key is stale.
    pub(crate) fn get_mut(&mut self, key: K) -> &mut T {
        let (idx, generation) = key.parts();
        match self
            .slots
            .get_mut(idx as usize)
            .filter(|s| s.generation == generation)
            .and_then(|s| s.value.as_mut())
        {
            Some(v) => v,
            None => panic!("stale {}: {key:?}", K::KIND),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (K, &T)> {
        self.slots.iter().enumerate().filter_map(|(idx, s)| {
            let idx = u32::try_from(idx).ok()?;
            s.value
                .as_ref()
                .map(|v| (K::from_parts(idx, s.generation), v))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::GeometryId;

    #[test]
    fn removed_slot_is_reused_with_new_generation() {
        let mut slab: Slab<GeometryId, &str> = Slab::new();
        let a = slab.insert("a");
        assert_eq!(slab.remove(a), Some("a"));
        let b = slab.insert("b");
        assert_eq!(a.index(), b.index(), "slot should be recycled");
        assert_ne!(a.generation(), b.generation());
        assert!(!slab.contains(a), "old key must be stale");
        assert_eq!(*slab.get(b), "b");
        assert_eq!(slab.len(), 1);
    }

    #[test]
    fn double_remove_is_none() {
        let mut slab: Slab<GeometryId, u8> = Slab::new();
        let k = slab.insert(1);
        assert_eq!(slab.remove(k), Some(1));
        assert_eq!(slab.remove(k), None);
        assert_eq!(slab.len(), 0);
    }

    #[test]
    #[should_panic(expected = "stale GeometryId")]
    fn stale_get_panics() {
        let mut slab: Slab<GeometryId, u8> = Slab::new();
        let k = slab.insert(1);
        slab.remove(k);
        let _ = slab.get(k);
    }
}
