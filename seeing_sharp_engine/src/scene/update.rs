/// Per-frame update data handed to objects and behaviors.
///
/// `UpdateContext` is what an object sees in the parallel phase: the frame
/// data, its own key and the manipulation queue. `OverallUpdateContext` is
/// the sequential phase view, which adds read access to every other object.

use std::sync::Arc;
use std::time::Duration;
use slotmap::SlotMap;

use crate::input::InputFrame;
use super::manipulation::SceneManipulationQueue;
use super::object::{ObjectKey, ObjectSlot, ObjectState};

/// Frame timing and input, shared read-only by every update call
#[derive(Debug, Clone, Default)]
pub struct UpdateState {
    elapsed: Duration,
    total_time: Duration,
    frame_index: u64,
    input_frames: Arc<Vec<InputFrame>>,
}

impl UpdateState {
    pub fn new(elapsed: Duration, total_time: Duration, frame_index: u64) -> Self {
        Self { elapsed, total_time, frame_index, input_frames: Arc::default() }
    }

    /// Single step, as the first frame of a run
    pub fn from_elapsed(elapsed: Duration) -> Self {
        Self::new(elapsed, elapsed, 0)
    }

    pub fn with_input_frames(mut self, frames: Vec<InputFrame>) -> Self {
        self.input_frames = Arc::new(frames);
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }

    pub fn total_time(&self) -> Duration {
        self.total_time
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn input_frames(&self) -> &[InputFrame] {
        &self.input_frames
    }
}

// ===== PARALLEL PHASE =====

pub struct UpdateContext<'a> {
    update_state: &'a UpdateState,
    object: ObjectKey,
    manipulation: &'a SceneManipulationQueue,
}

impl<'a> UpdateContext<'a> {
    pub(crate) fn new(update_state: &'a UpdateState, object: ObjectKey, manipulation: &'a SceneManipulationQueue) -> Self {
        Self { update_state, object, manipulation }
    }

    pub fn update_state(&self) -> &'a UpdateState {
        self.update_state
    }

    pub fn elapsed(&self) -> Duration {
        self.update_state.elapsed
    }

    /// Key of the object being updated
    pub fn object_key(&self) -> ObjectKey {
        self.object
    }

    /// Structural changes requested here are applied at the next frame barrier
    pub fn manipulation_queue(&self) -> &'a SceneManipulationQueue {
        self.manipulation
    }
}

// ===== SEQUENTIAL PHASE =====

pub struct OverallUpdateContext<'a> {
    update_state: &'a UpdateState,
    object: ObjectKey,
    objects: &'a SlotMap<ObjectKey, ObjectSlot>,
    manipulation: &'a SceneManipulationQueue,
}

impl<'a> OverallUpdateContext<'a> {
    pub(crate) fn new(
        update_state: &'a UpdateState,
        object: ObjectKey,
        objects: &'a SlotMap<ObjectKey, ObjectSlot>,
        manipulation: &'a SceneManipulationQueue,
    ) -> Self {
        Self { update_state, object, objects, manipulation }
    }

    pub fn update_state(&self) -> &'a UpdateState {
        self.update_state
    }

    pub fn elapsed(&self) -> Duration {
        self.update_state.elapsed
    }

    pub fn object_key(&self) -> ObjectKey {
        self.object
    }

    pub fn manipulation_queue(&self) -> &'a SceneManipulationQueue {
        self.manipulation
    }

    /// State of another object; `None` for unknown keys and for the object
    /// being updated (its state is the `&mut` argument)
    pub fn object_state(&self, key: ObjectKey) -> Option<&'a ObjectState> {
        if key == self.object {
            return None;
        }
        self.objects.get(key).map(|slot| &slot.state)
    }

    pub fn find_object(&self, name: &str) -> Option<(ObjectKey, &'a ObjectState)> {
        self.other_objects().find(|(_, state)| state.name == name)
    }

    /// Every object except the one being updated
    pub fn other_objects(&self) -> impl Iterator<Item = (ObjectKey, &'a ObjectState)> + '_ {
        let current = self.object;
        self.objects
            .iter()
            .filter(move |(key, _)| *key != current)
            .map(|(key, slot)| (key, &slot.state))
    }
}

// ===== STATISTICS =====

/// Outcome of one `Scene::update`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateStatistics {
    /// Objects whose parallel update completed
    pub updated_objects: usize,
    /// Objects whose update returned an error (either phase)
    pub failed_objects: usize,
    /// Objects whose update panicked (either phase)
    pub panicked_objects: usize,
    /// Sequential `update_overall` calls made
    pub overall_updates: usize,
}

impl UpdateStatistics {
    pub fn has_failures(&self) -> bool {
        self.failed_objects > 0 || self.panicked_objects > 0
    }
}
