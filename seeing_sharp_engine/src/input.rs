//! Input frames
//!
//! Input devices are polled outside the engine. Whatever they report is
//! packed into `InputFrame`s, collected once per frame by the main loop through
//! an `InputHandler` and shared read-only with every object update.

use std::time::Duration;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use glam::Vec2;

use crate::error::Result;
use crate::engine_err;

const SOURCE: &str = "seeing_sharp::Input";

/// Platform-independent key code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCode(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    KeyDown(KeyCode),
    KeyUp(KeyCode),
    MouseMove { position: Vec2 },
    MouseButtonDown(MouseButton),
    MouseButtonUp(MouseButton),
    MouseWheel { delta: f32 },
}

/// Everything one input source reported since the previous poll
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputFrame {
    /// Time since the handler started
    pub timestamp: Duration,
    pub events: Vec<InputEvent>,
}

impl InputFrame {
    pub fn new(timestamp: Duration) -> Self {
        Self { timestamp, events: Vec::new() }
    }

    pub fn with_event(mut self, event: InputEvent) -> Self {
        self.events.push(event);
        self
    }

    pub fn push(&mut self, event: InputEvent) {
        self.events.push(event);
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.events.contains(&InputEvent::KeyDown(key))
    }

    pub fn is_key_released(&self, key: KeyCode) -> bool {
        self.events.contains(&InputEvent::KeyUp(key))
    }

    /// Last mouse position reported in this frame
    pub fn mouse_position(&self) -> Option<Vec2> {
        self.events.iter().rev().find_map(|event| match event {
            InputEvent::MouseMove { position } => Some(*position),
            _ => None,
        })
    }

    /// Sum of all wheel deltas in this frame
    pub fn wheel_delta(&self) -> f32 {
        self.events
            .iter()
            .map(|event| match event {
                InputEvent::MouseWheel { delta } => *delta,
                _ => 0.0,
            })
            .sum()
    }
}

/// Source of input frames, polled once per frame on the main loop thread
pub trait InputHandler: Send {
    /// Frames gathered since the previous call
    fn poll(&mut self) -> Vec<InputFrame>;
}

// ===== QUEUED INPUT =====

/// Sending half of a `QueuedInputHandler`; can live on any thread
#[derive(Clone)]
pub struct InputSender {
    sender: Sender<InputFrame>,
}

impl InputSender {
    pub fn send(&self, frame: InputFrame) -> Result<()> {
        self.sender.send(frame).map_err(|_| {
            engine_err!(SOURCE, BackendError, "Input handler was dropped, frame discarded")
        })
    }
}

/// Input handler fed through a channel (window event loops, tests, replays)
pub struct QueuedInputHandler {
    receiver: Receiver<InputFrame>,
}

impl QueuedInputHandler {
    pub fn new() -> (Self, InputSender) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (Self { receiver }, InputSender { sender })
    }
}

impl InputHandler for QueuedInputHandler {
    fn poll(&mut self) -> Vec<InputFrame> {
        let mut frames = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(frame) => frames.push(frame),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        frames
    }
}

#[cfg(test)]
#[path = "input_tests.rs"]
mod tests;
