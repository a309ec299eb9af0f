//! Animation sequencing
//!
//! Queued animations per target with blocking barriers, fixed-time and
//! event-driven timing, and a fluent sequence builder.

mod animation;
mod animations;
mod handler;
mod sequence_builder;

pub use animation::{
    advance_animation, Animation, AnimationBase, AnimationLifecycle, AnimationState, AnimationTiming,
};
pub use animations::{
    Animatable3D, CallActionAnimation, ChangeOpacityAnimation, MoveByAnimation, MoveToAnimation,
    RotateToAnimation, ScaleToAnimation, WaitFinishedAnimation, WaitTimePassedAnimation,
};
pub use handler::AnimationHandler;
pub use sequence_builder::AnimationSequenceBuilder;
