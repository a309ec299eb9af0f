/// Concrete animations.
///
/// Transform animations act on any `Animatable3D` target. Constructors
/// validate their parameters and fail with `AnimationConfiguration`.

use std::time::Duration;
use glam::{Quat, Vec3};

use crate::error::Result;
use crate::engine_bail;
use super::animation::{Animation, AnimationBase, AnimationState};

const SOURCE: &str = "seeing_sharp::Animation";

/// Properties the transform animations drive
pub trait Animatable3D {
    fn position(&self) -> Vec3;
    fn set_position(&mut self, position: Vec3);
    fn rotation(&self) -> Quat;
    fn set_rotation(&mut self, rotation: Quat);
    fn scale(&self) -> Vec3;
    fn set_scale(&mut self, scale: Vec3);
    fn opacity(&self) -> f32;
    fn set_opacity(&mut self, opacity: f32);
}

fn check_finite(what: &str, value: Vec3) -> Result<()> {
    if !value.is_finite() {
        engine_bail!(SOURCE, AnimationConfiguration, "{} must be finite, got {}", what, value);
    }
    Ok(())
}

// ===== SCALE TO =====

/// Linear scale change towards a target over a fixed time
pub struct ScaleToAnimation {
    base: AnimationBase,
    target_scale: Vec3,
    start_scale: Vec3,
    /// target - start while running, zero once finished
    delta: Vec3,
}

impl ScaleToAnimation {
    pub fn new(target_scale: Vec3, duration: Duration) -> Result<Self> {
        check_finite("Target scale", target_scale)?;
        if target_scale.min_element() < 0.0 {
            engine_bail!(SOURCE, AnimationConfiguration, "Target scale must not be negative, got {}", target_scale);
        }
        Ok(Self {
            base: AnimationBase::fixed_time(duration),
            target_scale,
            start_scale: Vec3::ONE,
            delta: Vec3::ZERO,
        })
    }

    pub fn delta(&self) -> Vec3 {
        self.delta
    }
}

impl<T: Animatable3D> Animation<T> for ScaleToAnimation {
    fn base(&self) -> &AnimationBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AnimationBase {
        &mut self.base
    }

    fn on_start_animation(&mut self, target: &mut T) -> Result<()> {
        self.start_scale = target.scale();
        self.delta = self.target_scale - self.start_scale;
        Ok(())
    }

    fn on_current_time_updated(&mut self, target: &mut T, _state: &AnimationState) -> Result<()> {
        target.set_scale(self.start_scale + self.delta * self.base.progress());
        Ok(())
    }

    fn on_fixed_time_animation_finished(&mut self, target: &mut T) {
        target.set_scale(self.target_scale);
        self.delta = Vec3::ZERO;
    }
}

// ===== MOVE TO =====

/// Linear move towards a target position over a fixed time
pub struct MoveToAnimation {
    base: AnimationBase,
    target_position: Vec3,
    start_position: Vec3,
    delta: Vec3,
}

impl MoveToAnimation {
    pub fn new(target_position: Vec3, duration: Duration) -> Result<Self> {
        check_finite("Target position", target_position)?;
        Ok(Self {
            base: AnimationBase::fixed_time(duration),
            target_position,
            start_position: Vec3::ZERO,
            delta: Vec3::ZERO,
        })
    }

    pub fn delta(&self) -> Vec3 {
        self.delta
    }
}

impl<T: Animatable3D> Animation<T> for MoveToAnimation {
    fn base(&self) -> &AnimationBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AnimationBase {
        &mut self.base
    }

    fn on_start_animation(&mut self, target: &mut T) -> Result<()> {
        self.start_position = target.position();
        self.delta = self.target_position - self.start_position;
        Ok(())
    }

    fn on_current_time_updated(&mut self, target: &mut T, _state: &AnimationState) -> Result<()> {
        target.set_position(self.start_position + self.delta * self.base.progress());
        Ok(())
    }

    fn on_fixed_time_animation_finished(&mut self, target: &mut T) {
        target.set_position(self.target_position);
        self.delta = Vec3::ZERO;
    }
}

// ===== MOVE BY =====

/// Move by an offset at constant speed (units per second).
///
/// Event-driven: the next event is the moment the offset is covered.
pub struct MoveByAnimation {
    base: AnimationBase,
    offset: Vec3,
    speed: f32,
    start_position: Vec3,
    traveled: f32,
}

impl MoveByAnimation {
    pub fn new(offset: Vec3, speed: f32) -> Result<Self> {
        check_finite("Offset", offset)?;
        if !speed.is_finite() || speed <= 0.0 {
            engine_bail!(SOURCE, AnimationConfiguration, "Speed must be positive and finite, got {}", speed);
        }
        if Duration::try_from_secs_f32(offset.length() / speed).is_err() {
            engine_bail!(SOURCE, AnimationConfiguration,
                "Travel time of offset {} at speed {} is out of range", offset, speed);
        }
        Ok(Self {
            base: AnimationBase::event_driven(),
            offset,
            speed,
            start_position: Vec3::ZERO,
            traveled: 0.0,
        })
    }

    fn distance(&self) -> f32 {
        self.offset.length()
    }
}

impl<T: Animatable3D> Animation<T> for MoveByAnimation {
    fn base(&self) -> &AnimationBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AnimationBase {
        &mut self.base
    }

    fn on_start_animation(&mut self, target: &mut T) -> Result<()> {
        self.start_position = target.position();
        self.traveled = 0.0;
        Ok(())
    }

    fn on_current_time_updated(&mut self, target: &mut T, _state: &AnimationState) -> Result<()> {
        let distance = self.distance();
        self.traveled = (self.base.current_time().as_secs_f32() * self.speed).min(distance);

        if self.traveled >= distance {
            target.set_position(self.start_position + self.offset);
            self.base.notify_animation_finished();
        } else {
            let direction = self.offset / distance;
            target.set_position(self.start_position + direction * self.traveled);
        }
        Ok(())
    }

    fn time_till_next_event(&self) -> Option<Duration> {
        let remaining = (self.distance() - self.traveled).max(0.0);
        Duration::try_from_secs_f32(remaining / self.speed).ok()
    }
}

// ===== ROTATE TO =====

/// Spherical interpolation towards a target orientation
pub struct RotateToAnimation {
    base: AnimationBase,
    target_rotation: Quat,
    start_rotation: Quat,
}

impl RotateToAnimation {
    pub fn new(target_rotation: Quat, duration: Duration) -> Result<Self> {
        if !target_rotation.is_finite() || target_rotation.length_squared() == 0.0 {
            engine_bail!(SOURCE, AnimationConfiguration, "Target rotation must be a finite, non-zero quaternion");
        }
        Ok(Self {
            base: AnimationBase::fixed_time(duration),
            target_rotation: target_rotation.normalize(),
            start_rotation: Quat::IDENTITY,
        })
    }
}

impl<T: Animatable3D> Animation<T> for RotateToAnimation {
    fn base(&self) -> &AnimationBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AnimationBase {
        &mut self.base
    }

    fn on_start_animation(&mut self, target: &mut T) -> Result<()> {
        self.start_rotation = target.rotation();
        Ok(())
    }

    fn on_current_time_updated(&mut self, target: &mut T, _state: &AnimationState) -> Result<()> {
        target.set_rotation(self.start_rotation.slerp(self.target_rotation, self.base.progress()));
        Ok(())
    }

    fn on_fixed_time_animation_finished(&mut self, target: &mut T) {
        target.set_rotation(self.target_rotation);
    }
}

// ===== CHANGE OPACITY =====

pub struct ChangeOpacityAnimation {
    base: AnimationBase,
    target_opacity: f32,
    start_opacity: f32,
}

impl ChangeOpacityAnimation {
    pub fn new(target_opacity: f32, duration: Duration) -> Result<Self> {
        if !(0.0..=1.0).contains(&target_opacity) {
            engine_bail!(SOURCE, AnimationConfiguration, "Opacity must be within [0, 1], got {}", target_opacity);
        }
        Ok(Self {
            base: AnimationBase::fixed_time(duration),
            target_opacity,
            start_opacity: 1.0,
        })
    }
}

impl<T: Animatable3D> Animation<T> for ChangeOpacityAnimation {
    fn base(&self) -> &AnimationBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AnimationBase {
        &mut self.base
    }

    fn on_start_animation(&mut self, target: &mut T) -> Result<()> {
        self.start_opacity = target.opacity();
        Ok(())
    }

    fn on_current_time_updated(&mut self, target: &mut T, _state: &AnimationState) -> Result<()> {
        let t = self.base.progress();
        target.set_opacity(self.start_opacity + (self.target_opacity - self.start_opacity) * t);
        Ok(())
    }

    fn on_fixed_time_animation_finished(&mut self, target: &mut T) {
        target.set_opacity(self.target_opacity);
    }
}

// ===== WAIT TIME PASSED =====

/// Blocks the sequence for a fixed time
pub struct WaitTimePassedAnimation {
    base: AnimationBase,
}

impl WaitTimePassedAnimation {
    pub fn new(duration: Duration) -> Self {
        Self { base: AnimationBase::fixed_time(duration).blocking() }
    }
}

impl<T> Animation<T> for WaitTimePassedAnimation {
    fn base(&self) -> &AnimationBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AnimationBase {
        &mut self.base
    }

    fn on_current_time_updated(&mut self, _target: &mut T, _state: &AnimationState) -> Result<()> {
        Ok(())
    }
}

// ===== WAIT FINISHED =====

/// Zero-duration barrier: finishes once nothing ahead of it is running
pub struct WaitFinishedAnimation {
    base: AnimationBase,
}

impl WaitFinishedAnimation {
    pub fn new() -> Self {
        Self { base: AnimationBase::event_driven().blocking() }
    }
}

impl Default for WaitFinishedAnimation {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Animation<T> for WaitFinishedAnimation {
    fn base(&self) -> &AnimationBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AnimationBase {
        &mut self.base
    }

    fn on_current_time_updated(&mut self, _target: &mut T, state: &AnimationState) -> Result<()> {
        if state.running_animations_index == 0 {
            self.base.notify_animation_finished();
        }
        Ok(())
    }

    fn time_till_next_event(&self) -> Option<Duration> {
        None
    }
}

// ===== CALL ACTION =====

/// Runs a closure on the target once, then finishes
pub struct CallActionAnimation<T> {
    base: AnimationBase,
    action: Option<Box<dyn FnOnce(&mut T) + Send>>,
}

impl<T> CallActionAnimation<T> {
    pub fn new(action: impl FnOnce(&mut T) + Send + 'static) -> Self {
        Self {
            base: AnimationBase::fixed_time(Duration::ZERO),
            action: Some(Box::new(action)),
        }
    }
}

impl<T> Animation<T> for CallActionAnimation<T> {
    fn base(&self) -> &AnimationBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AnimationBase {
        &mut self.base
    }

    fn on_current_time_updated(&mut self, target: &mut T, _state: &AnimationState) -> Result<()> {
        if let Some(action) = self.action.take() {
            action(target);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "animations_tests.rs"]
mod tests;
