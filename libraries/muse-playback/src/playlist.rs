//! Playlist store
//!
//! Muse records live in a slot arena so the controller can refer to them by
//! generational key. A removed muse's key never resolves again, which turns
//! late resource signals and abandoned loads into no-ops.

use crate::error::{PlaybackError, Result};
use crate::resource::PlayableResource;
use crate::types::{Muse, MuseMeta, MuseState};
use slotmap::{new_key_type, SlotMap};
use std::collections::HashMap;
use std::time::Duration;

new_key_type! {
    /// Stable handle to a muse record
    pub struct MuseKey;
}

/// One playlist entry together with its resource
pub(crate) struct MuseSlot {
    pub(crate) id: String,
    pub(crate) src: String,
    pub(crate) meta: MuseMeta,
    pub(crate) state: MuseState,
    /// Position to restore when the muse is (re)loaded or reselected
    pub(crate) remembered: Duration,
    pub(crate) resource: Box<dyn PlayableResource>,
}

impl MuseSlot {
    pub(crate) fn new(
        id: String,
        src: String,
        meta: MuseMeta,
        resource: Box<dyn PlayableResource>,
    ) -> Self {
        Self {
            id,
            src,
            meta,
            state: MuseState::Unloaded,
            remembered: Duration::ZERO,
            resource,
        }
    }

    pub(crate) fn snapshot(&self) -> Muse {
        Muse {
            id: self.id.clone(),
            src: self.src.clone(),
            meta: self.meta.clone(),
            state: self.state,
        }
    }
}

/// Ordered collection of muses with unique ids
pub(crate) struct Playlist {
    slots: SlotMap<MuseKey, MuseSlot>,
    order: Vec<MuseKey>,
    ids: HashMap<String, MuseKey>,
}

impl Playlist {
    pub(crate) fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
            order: Vec::new(),
            ids: HashMap::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Append a muse built by `make`, which receives the muse's key
    ///
    /// Rejects the insert (and never calls `make`) if `id` is taken.
    pub(crate) fn insert_with<F>(&mut self, id: &str, make: F) -> Result<MuseKey>
    where
        F: FnOnce(MuseKey) -> MuseSlot,
    {
        if self.ids.contains_key(id) {
            return Err(PlaybackError::DuplicateId(id.to_string()));
        }

        let key = self.slots.insert_with_key(make);
        self.order.push(key);
        self.ids.insert(id.to_string(), key);
        Ok(key)
    }

    /// Remove a muse, returning its record
    pub(crate) fn remove(&mut self, key: MuseKey) -> Option<MuseSlot> {
        let slot = self.slots.remove(key)?;
        self.order.retain(|k| *k != key);
        self.ids.remove(&slot.id);
        Some(slot)
    }

    /// Remove every muse, returning the records in playlist order
    pub(crate) fn clear(&mut self) -> Vec<MuseSlot> {
        let removed = self
            .order
            .drain(..)
            .filter_map(|key| self.slots.remove(key))
            .collect();
        self.ids.clear();
        removed
    }

    pub(crate) fn key_of(&self, id: &str) -> Option<MuseKey> {
        self.ids.get(id).copied()
    }

    pub(crate) fn key_at(&self, index: usize) -> Option<MuseKey> {
        self.order.get(index).copied()
    }

    pub(crate) fn index_of(&self, key: MuseKey) -> Option<usize> {
        self.order.iter().position(|k| *k == key)
    }

    pub(crate) fn contains(&self, key: MuseKey) -> bool {
        self.slots.contains_key(key)
    }

    pub(crate) fn get(&self, key: MuseKey) -> Option<&MuseSlot> {
        self.slots.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: MuseKey) -> Option<&mut MuseSlot> {
        self.slots.get_mut(key)
    }

    /// Muses in playlist order
    pub(crate) fn iter(&self) -> impl Iterator<Item = &MuseSlot> {
        self.order.iter().filter_map(|key| self.slots.get(*key))
    }
}
