/// Per-view render state handed to render delegates and postprocess effects.
///
/// Lives for the duration of one view render. Holds the device, the device's
/// resource dictionary and the view camera; counts submitted draw calls.

use glam::Mat4;

use crate::camera::Camera;
use crate::error::Result;
use crate::graphics_device::{DrawCommand, GraphicsDevice};
use crate::resource::ResourceDictionary;

pub struct RenderState<'a> {
    device: &'a dyn GraphicsDevice,
    resources: &'a ResourceDictionary,
    camera: &'a Camera,
    view_name: &'a str,
    view_projection: Mat4,
    draw_calls: u32,
}

impl<'a> RenderState<'a> {
    pub fn new(
        device: &'a dyn GraphicsDevice,
        resources: &'a ResourceDictionary,
        camera: &'a Camera,
        view_name: &'a str,
    ) -> Self {
        Self {
            device,
            resources,
            camera,
            view_name,
            view_projection: camera.view_projection_matrix(),
            draw_calls: 0,
        }
    }

    pub fn device(&self) -> &'a dyn GraphicsDevice {
        self.device
    }

    pub fn resources(&self) -> &'a ResourceDictionary {
        self.resources
    }

    pub fn camera(&self) -> &'a Camera {
        self.camera
    }

    pub fn view_name(&self) -> &'a str {
        self.view_name
    }

    pub fn view_projection(&self) -> Mat4 {
        self.view_projection
    }

    /// Submit one command to the device
    pub fn submit(&mut self, command: DrawCommand) -> Result<()> {
        if command.drawn_object().is_some() {
            self.draw_calls += 1;
        }
        self.device.submit(command)
    }

    pub fn draw_call_count(&self) -> u32 {
        self.draw_calls
    }
}
