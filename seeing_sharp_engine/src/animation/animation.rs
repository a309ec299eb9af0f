/// Animation core: timing model, lifecycle and the single driver step.
///
/// Lifecycle: NotStarted -> `on_start_animation` -> Running ->
/// `on_current_time_updated`* -> finished -> Finished.
///
/// FixedTime animations finish when their current time reaches the duration
/// (`on_fixed_time_animation_finished` runs once). EventDriven animations
/// finish themselves through `AnimationBase::notify_animation_finished`.

use std::time::Duration;

use crate::error::Result;

/// How an animation advances in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationTiming {
    FixedTime { duration: Duration },
    EventDriven,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationLifecycle {
    NotStarted,
    Running,
    Finished,
}

/// Per-animation view of one handler update pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationState {
    /// Unfinished animations queued ahead of the current one
    pub running_animations_index: usize,
    /// Time step of this update
    pub elapsed: Duration,
}

// ===== ANIMATION BASE =====

/// Timing and lifecycle shared by every animation
#[derive(Debug, Clone)]
pub struct AnimationBase {
    timing: AnimationTiming,
    current_time: Duration,
    lifecycle: AnimationLifecycle,
    blocking: bool,
}

impl AnimationBase {
    pub fn new(timing: AnimationTiming, blocking: bool) -> Self {
        Self {
            timing,
            current_time: Duration::ZERO,
            lifecycle: AnimationLifecycle::NotStarted,
            blocking,
        }
    }

    pub fn fixed_time(duration: Duration) -> Self {
        Self::new(AnimationTiming::FixedTime { duration }, false)
    }

    pub fn event_driven() -> Self {
        Self::new(AnimationTiming::EventDriven, false)
    }

    pub fn blocking(mut self) -> Self {
        self.blocking = true;
        self
    }

    pub fn timing(&self) -> AnimationTiming {
        self.timing
    }

    pub fn current_time(&self) -> Duration {
        self.current_time
    }

    pub fn lifecycle(&self) -> AnimationLifecycle {
        self.lifecycle
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    pub fn is_finished(&self) -> bool {
        self.lifecycle == AnimationLifecycle::Finished
    }

    /// Fixed-time progress in [0, 1]; event-driven animations report 0 until
    /// finished and 1 afterwards.
    pub fn progress(&self) -> f32 {
        match self.timing {
            AnimationTiming::FixedTime { duration } => {
                if duration.is_zero() {
                    return if self.lifecycle == AnimationLifecycle::NotStarted { 0.0 } else { 1.0 };
                }
                (self.current_time.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 1.0) as f32
            }
            AnimationTiming::EventDriven => if self.is_finished() { 1.0 } else { 0.0 },
        }
    }

    /// Time left until a fixed-time animation ends
    pub fn remaining_time(&self) -> Option<Duration> {
        match self.timing {
            AnimationTiming::FixedTime { duration } => Some(duration.saturating_sub(self.current_time)),
            AnimationTiming::EventDriven => None,
        }
    }

    /// Mark the animation finished. Returns true only the first time.
    pub fn notify_animation_finished(&mut self) -> bool {
        if self.lifecycle == AnimationLifecycle::Finished {
            return false;
        }
        self.lifecycle = AnimationLifecycle::Finished;
        true
    }
}

// ===== ANIMATION TRAIT =====

/// One step of an animation sequence acting on a `T`
pub trait Animation<T>: Send {
    fn base(&self) -> &AnimationBase;

    fn base_mut(&mut self) -> &mut AnimationBase;

    /// Runs once, right before the first time update
    fn on_start_animation(&mut self, _target: &mut T) -> Result<()> {
        Ok(())
    }

    /// Runs on every update while running
    fn on_current_time_updated(&mut self, target: &mut T, state: &AnimationState) -> Result<()>;

    /// Runs once when a fixed-time animation reaches its duration
    fn on_fixed_time_animation_finished(&mut self, _target: &mut T) {}

    /// Time until this animation's next event. `None` when the animation has
    /// no event of its own (it waits for something else).
    fn time_till_next_event(&self) -> Option<Duration> {
        self.base().remaining_time()
    }

    fn is_finished(&self) -> bool {
        self.base().is_finished()
    }

    fn is_blocking(&self) -> bool {
        self.base().is_blocking()
    }
}

/// Advance one animation by `state.elapsed`
pub fn advance_animation<T>(
    animation: &mut dyn Animation<T>,
    target: &mut T,
    state: &AnimationState,
) -> Result<()> {
    if animation.is_finished() {
        return Ok(());
    }

    if animation.base().lifecycle() == AnimationLifecycle::NotStarted {
        animation.base_mut().lifecycle = AnimationLifecycle::Running;
        animation.on_start_animation(target)?;
    }

    match animation.base().timing() {
        AnimationTiming::FixedTime { duration } => {
            let base = animation.base_mut();
            base.current_time = (base.current_time + state.elapsed).min(duration);
            let reached_end = base.current_time >= duration;

            animation.on_current_time_updated(target, state)?;
            if reached_end && animation.base_mut().notify_animation_finished() {
                animation.on_fixed_time_animation_finished(target);
            }
        }
        AnimationTiming::EventDriven => {
            let base = animation.base_mut();
            base.current_time += state.elapsed;
            animation.on_current_time_updated(target, state)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "animation_tests.rs"]
mod tests;
