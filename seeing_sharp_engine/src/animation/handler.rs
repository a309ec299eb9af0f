/// AnimationHandler - drives the animation queue of one target.
///
/// Update walk (front to back):
/// - every animation gets an `AnimationState` whose `running_animations_index`
///   counts the unfinished animations ahead of it
/// - an unfinished blocking animation ends the walk, so nothing behind it
///   receives time updates
/// - finished animations are removed after the walk

use std::time::Duration;

use crate::error::Result;
use crate::engine_warn;
use super::animation::{advance_animation, Animation, AnimationState};

const SOURCE: &str = "seeing_sharp::AnimationHandler";

/// Animations queued on a target of type `T`
pub struct AnimationHandler<T> {
    queue: Vec<Box<dyn Animation<T>>>,
}

impl<T> Default for AnimationHandler<T> {
    fn default() -> Self {
        Self { queue: Vec::new() }
    }
}

impl<T> AnimationHandler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append animations to the end of the queue
    pub fn begin_animation(&mut self, animations: impl IntoIterator<Item = Box<dyn Animation<T>>>) {
        self.queue.extend(animations);
    }

    pub fn push(&mut self, animation: Box<dyn Animation<T>>) {
        self.queue.push(animation);
    }

    pub fn count_running(&self) -> usize {
        self.queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Finish every queued animation without running its remaining updates
    pub fn cancel_animations(&mut self) {
        for animation in &mut self.queue {
            animation.base_mut().notify_animation_finished();
        }
        self.queue.clear();
    }

    /// Advance the queue by `elapsed`.
    ///
    /// # Errors
    ///
    /// The first animation callback error. The failing animation is dropped
    /// from the queue; the others keep their state.
    pub fn update(&mut self, target: &mut T, elapsed: Duration) -> Result<()> {
        let mut running_ahead = 0;
        let mut failure = None;

        for (index, animation) in self.queue.iter_mut().enumerate() {
            let state = AnimationState { running_animations_index: running_ahead, elapsed };
            if let Err(err) = advance_animation(animation.as_mut(), target, &state) {
                engine_warn!(SOURCE, "Animation {} failed and was removed: {}", index, err);
                animation.base_mut().notify_animation_finished();
                failure = Some(err);
                break;
            }

            if !animation.is_finished() {
                running_ahead += 1;
                if animation.is_blocking() {
                    break;
                }
            }
        }

        self.queue.retain(|animation| !animation.is_finished());
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Time until the next event among the animations a walk would reach.
    ///
    /// `None` when nothing in reach has an event of its own.
    pub fn time_till_next_event(&self) -> Option<Duration> {
        let mut next: Option<Duration> = None;
        for animation in &self.queue {
            if let Some(time) = animation.time_till_next_event() {
                next = Some(next.map_or(time, |n| n.min(time)));
            }
            if animation.is_blocking() {
                break;
            }
        }
        next
    }

    /// Advance by up to `max_time`, stepping event by event.
    ///
    /// Returns the time actually advanced.
    pub fn update_event_driven(&mut self, target: &mut T, max_time: Duration) -> Result<Duration> {
        let mut advanced = Duration::ZERO;

        while !self.queue.is_empty() {
            let remaining = max_time.saturating_sub(advanced);
            let step = match self.time_till_next_event() {
                Some(next) => next.min(remaining),
                None => remaining,
            };

            let queued_before = self.queue.len();
            self.update(target, step)?;
            advanced += step;

            // Zero-length steps must make progress, otherwise stop here
            if step.is_zero() && self.queue.len() == queued_before {
                break;
            }
            if advanced >= max_time && !step.is_zero() {
                break;
            }
        }
        Ok(advanced)
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
