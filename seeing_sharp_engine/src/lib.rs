/*!
# SeeingSharp Engine

Core of the SeeingSharp 3D engine: scene graph, device resources, render pass
subscriptions, the two-phase update and the animation system.

The core never talks to a GPU API directly. Everything device-bound goes
through the `GraphicsDevice` trait; a recording `MockGraphicsDevice` ships
with the crate for headless use and tests.

## Architecture

- **Engine**: global configuration, device registry and logger
- **ResourceDictionary**: per-device resource cache with a load/unload lifecycle
- **Scene**: objects, layers, views and per-view pass subscriptions
- **SceneManipulator**: the only way to change scene structure, applied at the frame barrier
- **AnimationHandler**: queued, blocking and event-driven animation sequences
- **MainLoop / RenderLoop**: frame sequencing, rendering and device-loss recovery
*/

// Internal modules
mod error;
mod engine;
mod config;
mod main_loop;
pub mod log;
pub mod graphics_device;
pub mod utils;
pub mod resource;
pub mod camera;
pub mod render;
pub mod scene;
pub mod animation;
pub mod input;

// Main seeing_sharp namespace module
pub mod seeing_sharp {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine singleton and configuration
    pub use crate::engine::Engine;
    pub use crate::config::EngineConfig;

    // Main loop
    pub use crate::main_loop::{FrameStatistics, MainLoop, MainLoopHandle};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{format_entry, DefaultLogger, LogEntry, LogSeverity, Logger, MemoryLogger};
        // Note: engine_* macros are NOT re-exported here - they are internal only
    }

    // Graphics device contract and the recording mock
    pub mod graphics_device {
        pub use crate::graphics_device::*;
    }

    // Resource sub-module
    pub mod resource {
        pub use crate::resource::*;
    }

    // Camera sub-module
    pub mod camera {
        pub use crate::camera::*;
    }

    // Render sub-module: passes, render states, postprocessing, render loops
    pub mod render {
        pub use crate::render::*;
    }

    // Scene sub-module
    pub mod scene {
        pub use crate::scene::*;
    }

    // Animation sub-module
    pub mod animation {
        pub use crate::animation::*;
    }

    // Input sub-module
    pub mod input {
        pub use crate::input::*;
    }
}

// Re-export math library at crate root
pub use glam;
