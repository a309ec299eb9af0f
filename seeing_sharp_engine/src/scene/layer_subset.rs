/// Render pass subscriptions of one (layer, view) pair.
///
/// Subscriptions are grouped per render pass. Each group is a slot array
/// backed by a `SlotAllocator`: unsubscribing frees the slot index in O(1)
/// and the next subscribe reuses it, so the array never grows while it has
/// holes. Handles carry the slot generation; a handle whose slot has been
/// freed (and possibly reused) no longer matches and is ignored.
///
/// Unsubscribing clears the slot payload right away. Traversal only ever sees
/// occupied slots, in slot index order.

use crate::error::Result;
use crate::{engine_bail, engine_trace};
use crate::render::{RenderPassInfo, DEFAULT_RENDER_PASSES};
use crate::utils::{SlotAllocator, SlotId};
use super::layer::LayerKey;
use super::object::ObjectKey;
use super::view::ViewKey;

const SOURCE: &str = "seeing_sharp::LayerSubset";

/// Identifies a subset: one layer seen through one view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubsetKey {
    pub layer: LayerKey,
    pub view: ViewKey,
}

/// Returned by `subscribe_to_pass`; needed to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    subset: SubsetKey,
    pass_id: usize,
    slot: SlotId,
}

impl SubscriptionHandle {
    pub fn subset(&self) -> SubsetKey {
        self.subset
    }

    pub fn pass_id(&self) -> usize {
        self.pass_id
    }

    pub fn subscription_index(&self) -> usize {
        self.slot.index as usize
    }
}

/// One object registered for drawing in one pass
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPassSubscription {
    pub subscription_index: usize,
    pub subset: SubsetKey,
    pub pass: RenderPassInfo,
    /// Looked up in the scene arena at draw time
    pub object: ObjectKey,
    pub is_subscribed: bool,
}

struct PassGroup {
    pass: RenderPassInfo,
    slots: Vec<Option<RenderPassSubscription>>,
    allocator: SlotAllocator,
}

impl PassGroup {
    fn new(pass: RenderPassInfo) -> Self {
        Self { pass, slots: Vec::new(), allocator: SlotAllocator::new() }
    }
}

pub struct ViewRelatedSceneLayerSubset {
    key: SubsetKey,
    /// Indexed by `RenderPassInfo::id`
    groups: Vec<PassGroup>,
}

impl ViewRelatedSceneLayerSubset {
    pub fn new(key: SubsetKey) -> Self {
        Self {
            key,
            groups: DEFAULT_RENDER_PASSES.iter().map(|pass| PassGroup::new(*pass)).collect(),
        }
    }

    pub fn key(&self) -> SubsetKey {
        self.key
    }

    /// Register `object` for drawing in `pass`.
    ///
    /// Reuses a freed slot of that pass if there is one.
    pub fn subscribe_to_pass(&mut self, pass: &RenderPassInfo, object: ObjectKey) -> Result<SubscriptionHandle> {
        let subset = self.key;
        let group = match self.groups.get_mut(pass.id) {
            Some(group) if group.pass == *pass => group,
            _ => engine_bail!(SOURCE, InvalidSubscriptionState,
                "Render pass {} (id {}) is not known to this layer subset", pass, pass.id),
        };

        let slot = group.allocator.alloc();
        let index = slot.index as usize;
        let subscription = RenderPassSubscription {
            subscription_index: index,
            subset,
            pass: *pass,
            object,
            is_subscribed: true,
        };
        if index == group.slots.len() {
            group.slots.push(Some(subscription));
        } else {
            group.slots[index] = Some(subscription);
        }

        engine_trace!(SOURCE, "Subscribed {:?} to {} at index {}", object, pass, index);
        Ok(SubscriptionHandle { subset, pass_id: pass.id, slot })
    }

    /// Remove a subscription.
    ///
    /// Stale handles (already unsubscribed, slot reused, other subset) are
    /// ignored and yield `false`.
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        if handle.subset != self.key {
            return false;
        }
        let group = match self.groups.get_mut(handle.pass_id) {
            Some(group) => group,
            None => return false,
        };
        if !group.allocator.free(handle.slot) {
            return false;
        }
        if let Some(slot) = group.slots.get_mut(handle.slot.index as usize) {
            *slot = None;
        }
        engine_trace!(SOURCE, "Unsubscribed index {} from {}", handle.slot.index, group.pass);
        true
    }

    /// Like `unsubscribe`, but a stale handle is an error
    pub fn try_unsubscribe(&mut self, handle: SubscriptionHandle) -> Result<()> {
        if !self.unsubscribe(handle) {
            engine_bail!(SOURCE, InvalidSubscriptionState,
                "Subscription {} of pass id {} is no longer valid", handle.slot.index, handle.pass_id);
        }
        Ok(())
    }

    pub fn is_subscribed(&self, handle: SubscriptionHandle) -> bool {
        handle.subset == self.key
            && self.groups
                .get(handle.pass_id)
                .is_some_and(|group| group.allocator.is_live(handle.slot))
    }

    pub fn subscription(&self, handle: SubscriptionHandle) -> Option<&RenderPassSubscription> {
        if !self.is_subscribed(handle) {
            return None;
        }
        self.groups[handle.pass_id].slots.get(handle.slot.index as usize)?.as_ref()
    }

    /// Active subscriptions over all passes
    pub fn subscription_count(&self) -> usize {
        self.groups.iter().map(|group| group.allocator.len() as usize).sum()
    }

    pub fn pass_subscription_count(&self, pass_id: usize) -> usize {
        self.groups.get(pass_id).map_or(0, |group| group.allocator.len() as usize)
    }

    /// Length of the slot array of a pass (occupied slots plus holes)
    pub fn pass_slot_capacity(&self, pass_id: usize) -> usize {
        self.groups.get(pass_id).map_or(0, |group| group.slots.len())
    }

    /// Subscriptions of one pass in slot index order.
    ///
    /// Freed slots are reused, so this is not insertion order: a subscriber
    /// that takes over a hole is drawn before older subscribers at higher indices.
    pub fn pass_subscriptions(&self, pass_id: usize) -> impl Iterator<Item = &RenderPassSubscription> + '_ {
        self.groups
            .get(pass_id)
            .into_iter()
            .flat_map(|group| group.slots.iter().flatten())
    }

    /// Passes in traversal order
    pub fn passes(&self) -> Vec<RenderPassInfo> {
        let mut passes: Vec<RenderPassInfo> = self.groups.iter().map(|group| group.pass).collect();
        passes.sort_by_key(|pass| pass.order);
        passes
    }

    /// Every subscription: passes in order, then index order
    pub fn subscriptions(&self) -> Vec<&RenderPassSubscription> {
        self.passes()
            .iter()
            .flat_map(|pass| self.pass_subscriptions(pass.id))
            .collect()
    }

    pub fn clear(&mut self) {
        for group in &mut self.groups {
            group.allocator.clear();
            for slot in &mut group.slots {
                *slot = None;
            }
        }
    }
}

#[cfg(test)]
#[path = "layer_subset_tests.rs"]
mod tests;
