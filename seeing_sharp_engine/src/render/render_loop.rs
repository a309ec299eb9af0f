/// Render loop of one view.
///
/// Each frame the main loop asks every render loop to prepare its view
/// (lazy loading, pass subscriptions) and draw it. A loop can be paused
/// without deregistering its view; paused loops keep their subscriptions.

use std::sync::Arc;

use crate::error::Result;
use crate::engine_trace;
use crate::graphics_device::{DeviceIndex, GraphicsDevice};
use crate::scene::{PrepareStatistics, RenderStatistics, Scene, ViewKey};

const SOURCE: &str = "seeing_sharp::RenderLoop";

pub struct RenderLoop {
    view: ViewKey,
    name: String,
    device: Arc<dyn GraphicsDevice>,
    enabled: bool,
    frames_rendered: u64,
    last_prepare: PrepareStatistics,
    last_render: RenderStatistics,
}

impl RenderLoop {
    pub fn new(view: ViewKey, name: impl Into<String>, device: Arc<dyn GraphicsDevice>) -> Self {
        Self {
            view,
            name: name.into(),
            device,
            enabled: true,
            frames_rendered: 0,
            last_prepare: PrepareStatistics::default(),
            last_render: RenderStatistics::default(),
        }
    }

    pub fn view(&self) -> ViewKey {
        self.view
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn device_index(&self) -> DeviceIndex {
        self.device.device_index()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Frames drawn successfully since creation
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn last_prepare_statistics(&self) -> PrepareStatistics {
        self.last_prepare
    }

    pub fn last_render_statistics(&self) -> RenderStatistics {
        self.last_render
    }

    /// Prepare and draw the view. Returns `None` while paused.
    ///
    /// # Errors
    ///
    /// Whatever `Scene::prepare_view` or `Scene::render_view` reports; device
    /// loss surfaces as `DeviceLost` and is handled by the main loop.
    pub fn render(&mut self, scene: &mut Scene) -> Result<Option<RenderStatistics>> {
        if !self.enabled {
            return Ok(None);
        }

        self.last_prepare = scene.prepare_view(self.view)?;
        self.last_render = scene.render_view(self.view)?;
        self.frames_rendered += 1;

        engine_trace!(SOURCE, "View '{}' frame {}: {} draw calls",
            self.name, self.frames_rendered, self.last_render.draw_calls);
        Ok(Some(self.last_render))
    }
}

#[cfg(test)]
#[path = "render_loop_tests.rs"]
mod tests;
