/// Behaviors attached to scene objects.
///
/// A behavior is owned by its host's arena slot. It never holds a reference
/// to the host; the scene tells it which key it is attached to through
/// `on_host_object_changed` and hands it the host state on every update.

use std::sync::atomic::{AtomicU64, Ordering};
use glam::{Quat, Vec3};

use crate::error::Result;
use crate::engine_bail;
use super::object::{ObjectKey, ObjectState};
use super::update::{OverallUpdateContext, UpdateContext};

const SOURCE: &str = "seeing_sharp::Behavior";

static NEXT_BEHAVIOR_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one attached behavior (for `detach_behavior`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BehaviorId(u64);

impl BehaviorId {
    pub(crate) fn next() -> Self {
        BehaviorId(NEXT_BEHAVIOR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

pub trait SceneObjectBehavior: Send {
    fn behavior_name(&self) -> &str;

    /// Called with `(None, Some(host))` on attach and `(Some(host), None)` on
    /// detach or when the host is removed
    fn on_host_object_changed(&mut self, _old_host: Option<ObjectKey>, _new_host: Option<ObjectKey>) {}

    /// Parallel update phase, before the host's animations
    fn update(&mut self, _host: &mut ObjectState, _ctx: &UpdateContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Sequential update phase
    fn update_overall(&mut self, _host: &mut ObjectState, _ctx: &OverallUpdateContext<'_>) -> Result<()> {
        Ok(())
    }
}

// ===== ROTATION =====

/// Spins the host around a fixed axis
pub struct RotationBehavior {
    axis: Vec3,
    radians_per_second: f32,
    host: Option<ObjectKey>,
}

impl RotationBehavior {
    pub fn new(axis: Vec3, radians_per_second: f32) -> Result<Self> {
        if !axis.is_finite() || axis.length_squared() < f32::EPSILON {
            engine_bail!(SOURCE, AnimationConfiguration, "Rotation axis must be a finite non-zero vector, got {}", axis);
        }
        if !radians_per_second.is_finite() {
            engine_bail!(SOURCE, AnimationConfiguration, "Rotation speed must be finite, got {}", radians_per_second);
        }
        Ok(Self { axis: axis.normalize(), radians_per_second, host: None })
    }

    pub fn host(&self) -> Option<ObjectKey> {
        self.host
    }
}

impl SceneObjectBehavior for RotationBehavior {
    fn behavior_name(&self) -> &str {
        "Rotation"
    }

    fn on_host_object_changed(&mut self, _old_host: Option<ObjectKey>, new_host: Option<ObjectKey>) {
        self.host = new_host;
    }

    fn update(&mut self, host: &mut ObjectState, ctx: &UpdateContext<'_>) -> Result<()> {
        let angle = self.radians_per_second * ctx.elapsed().as_secs_f32();
        host.rotation = (Quat::from_axis_angle(self.axis, angle) * host.rotation).normalize();
        Ok(())
    }
}

// ===== FOLLOW OBJECT =====

/// Keeps the host at a fixed offset from another object.
///
/// Runs in the sequential phase so the target's position is final for the
/// frame (unless the target itself follows something later in the order).
pub struct FollowObjectBehavior {
    target: ObjectKey,
    offset: Vec3,
    host: Option<ObjectKey>,
}

impl FollowObjectBehavior {
    pub fn new(target: ObjectKey, offset: Vec3) -> Self {
        Self { target, offset, host: None }
    }

    pub fn target(&self) -> ObjectKey {
        self.target
    }

    pub fn host(&self) -> Option<ObjectKey> {
        self.host
    }
}

impl SceneObjectBehavior for FollowObjectBehavior {
    fn behavior_name(&self) -> &str {
        "FollowObject"
    }

    fn on_host_object_changed(&mut self, _old_host: Option<ObjectKey>, new_host: Option<ObjectKey>) {
        self.host = new_host;
    }

    fn update_overall(&mut self, host: &mut ObjectState, ctx: &OverallUpdateContext<'_>) -> Result<()> {
        // Target removed: stay where we are
        if let Some(target) = ctx.object_state(self.target) {
            host.position = target.position + self.offset;
        }
        Ok(())
    }
}
