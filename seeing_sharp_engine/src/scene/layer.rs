/// Scene layers.
///
/// A layer groups objects that share clear behavior and an optional
/// postprocess effect. Layers render in ascending `order_id`; layers with the
/// same order render in creation order.

use bitflags::bitflags;
use slotmap::new_key_type;

use crate::resource::ResourceKey;
use super::object::ObjectKey;

new_key_type! {
    /// Stable key for a scene layer
    pub struct LayerKey;
}

bitflags! {
    /// Per-layer render flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LayerFlags: u32 {
        /// Clear the depth buffer before the layer renders
        const CLEAR_DEPTH = 1 << 0;
    }
}

#[derive(Debug, Clone)]
pub struct SceneLayer {
    name: String,
    order_id: i32,
    creation_index: u64,
    flags: LayerFlags,
    postprocess_effect: Option<ResourceKey>,
    /// Insertion order; the sequential update phase walks this
    objects: Vec<ObjectKey>,
}

impl SceneLayer {
    pub(crate) fn new(name: String, order_id: i32, creation_index: u64) -> Self {
        Self {
            name,
            order_id,
            creation_index,
            flags: LayerFlags::empty(),
            postprocess_effect: None,
            objects: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn order_id(&self) -> i32 {
        self.order_id
    }

    pub fn flags(&self) -> LayerFlags {
        self.flags
    }

    pub fn postprocess_effect(&self) -> Option<&ResourceKey> {
        self.postprocess_effect.as_ref()
    }

    pub fn objects(&self) -> &[ObjectKey] {
        &self.objects
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Sort key for traversal
    pub(crate) fn render_order(&self) -> (i32, u64) {
        (self.order_id, self.creation_index)
    }

    pub(crate) fn set_order_id(&mut self, order_id: i32) {
        self.order_id = order_id;
    }

    pub(crate) fn set_flags(&mut self, flags: LayerFlags) {
        self.flags = flags;
    }

    pub(crate) fn set_postprocess_effect(&mut self, effect: Option<ResourceKey>) {
        self.postprocess_effect = effect;
    }

    pub(crate) fn push_object(&mut self, key: ObjectKey) {
        self.objects.push(key);
    }

    pub(crate) fn remove_object(&mut self, key: ObjectKey) -> bool {
        let before = self.objects.len();
        self.objects.retain(|&k| k != key);
        self.objects.len() != before
    }
}
