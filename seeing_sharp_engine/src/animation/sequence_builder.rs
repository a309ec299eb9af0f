/// Fluent construction of animation sequences.
///
/// ```no_run
/// use std::time::Duration;
/// use seeing_sharp_engine::glam::Vec3;
/// use seeing_sharp_engine::seeing_sharp::animation::{AnimationHandler, AnimationSequenceBuilder};
/// use seeing_sharp_engine::seeing_sharp::scene::ObjectState;
///
/// let mut handler = AnimationHandler::<ObjectState>::new();
/// AnimationSequenceBuilder::new()
///     .scale_to(Vec3::splat(2.0), Duration::from_millis(500))
///     .wait_finished()
///     .move_by(Vec3::X * 3.0, 1.5)
///     .apply(&mut handler)?;
/// # Ok::<(), seeing_sharp_engine::seeing_sharp::Error>(())
/// ```
///
/// Parameter errors are collected while building; the first one is returned
/// by `build`/`apply` and nothing is queued in that case.

use std::time::Duration;
use glam::{Quat, Vec3};

use crate::error::{Error, Result};
use super::animation::Animation;
use super::animations::{
    Animatable3D, CallActionAnimation, ChangeOpacityAnimation, MoveByAnimation, MoveToAnimation,
    RotateToAnimation, ScaleToAnimation, WaitFinishedAnimation, WaitTimePassedAnimation,
};
use super::handler::AnimationHandler;

pub struct AnimationSequenceBuilder<T> {
    animations: Vec<Box<dyn Animation<T>>>,
    error: Option<Error>,
}

impl<T: 'static> Default for AnimationSequenceBuilder<T> {
    fn default() -> Self {
        Self { animations: Vec::new(), error: None }
    }
}

impl<T: 'static> AnimationSequenceBuilder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append any animation
    pub fn add(mut self, animation: impl Animation<T> + 'static) -> Self {
        self.animations.push(Box::new(animation));
        self
    }

    /// Append the result of a fallible constructor, keeping the first error
    fn add_checked<A: Animation<T> + 'static>(mut self, animation: Result<A>) -> Self {
        match animation {
            Ok(animation) => self.animations.push(Box::new(animation)),
            Err(err) => {
                if self.error.is_none() {
                    self.error = Some(err);
                }
            }
        }
        self
    }

    /// Block the sequence for `duration`
    pub fn wait(self, duration: Duration) -> Self {
        self.add(WaitTimePassedAnimation::new(duration))
    }

    /// Block until everything queued before has finished
    pub fn wait_finished(self) -> Self {
        self.add(WaitFinishedAnimation::new())
    }

    pub fn call_action(self, action: impl FnOnce(&mut T) + Send + 'static) -> Self {
        self.add(CallActionAnimation::new(action))
    }

    pub fn len(&self) -> usize {
        self.animations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }

    pub fn build(self) -> Result<Vec<Box<dyn Animation<T>>>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.animations),
        }
    }

    /// Queue the sequence behind the handler's current animations
    pub fn apply(self, handler: &mut AnimationHandler<T>) -> Result<()> {
        handler.begin_animation(self.build()?);
        Ok(())
    }

    /// Replace the handler's current animations with the sequence
    pub fn apply_and_cancel_previous(self, handler: &mut AnimationHandler<T>) -> Result<()> {
        let animations = self.build()?;
        handler.cancel_animations();
        handler.begin_animation(animations);
        Ok(())
    }
}

impl<T: Animatable3D + 'static> AnimationSequenceBuilder<T> {
    pub fn scale_to(self, scale: Vec3, duration: Duration) -> Self {
        self.add_checked(ScaleToAnimation::new(scale, duration))
    }

    pub fn move_to(self, position: Vec3, duration: Duration) -> Self {
        self.add_checked(MoveToAnimation::new(position, duration))
    }

    /// Move by `offset` at `speed` units per second
    pub fn move_by(self, offset: Vec3, speed: f32) -> Self {
        self.add_checked(MoveByAnimation::new(offset, speed))
    }

    pub fn rotate_to(self, rotation: Quat, duration: Duration) -> Self {
        self.add_checked(RotateToAnimation::new(rotation, duration))
    }

    pub fn change_opacity(self, opacity: f32, duration: Duration) -> Self {
        self.add_checked(ChangeOpacityAnimation::new(opacity, duration))
    }
}

#[cfg(test)]
#[path = "sequence_builder_tests.rs"]
mod tests;
