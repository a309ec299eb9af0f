/// Draw commands submitted to a GraphicsDevice.
///
/// Commands are plain data. The wire format towards the GPU is the backend's
/// business; the engine only guarantees their ordering.

use glam::{Mat4, Vec4};
use super::graphics_device::NativeHandle;

/// One unit of work for the device
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Start rendering one view
    BeginView { view: String },

    /// Start rendering one layer of the current view
    BeginLayer { layer: String },

    /// Clear the depth buffer before the layer is drawn
    ClearDepth,

    /// Start a render pass
    BeginPass { pass: &'static str },

    /// Draw indexed geometry
    DrawGeometry {
        object: String,
        geometry: NativeHandle,
        material: Option<NativeHandle>,
        world: Mat4,
        opacity: f32,
    },

    /// Draw a line list
    DrawLines {
        object: String,
        vertex_buffer: NativeHandle,
        vertex_count: u32,
        world: Mat4,
    },

    /// Draw a 2D rectangle on top of the 3D content
    Draw2D {
        object: String,
        rect: Vec4,
        color: Vec4,
        texture: Option<NativeHandle>,
    },

    /// Postprocess effect stage starts (before the layer is drawn again)
    BeginPostprocess { effect: String, pass_id: u32 },

    /// Postprocess effect stage ends (after the layer was drawn)
    EndPostprocess { effect: String, pass_id: u32 },

    /// End of the current render pass
    EndPass { pass: &'static str },

    /// End of the current layer
    EndLayer,

    /// Present the finished view
    Present { view: String },
}

impl DrawCommand {
    /// Name of the object drawn by this command, if it is a draw call
    pub fn drawn_object(&self) -> Option<&str> {
        match self {
            DrawCommand::DrawGeometry { object, .. }
            | DrawCommand::DrawLines { object, .. }
            | DrawCommand::Draw2D { object, .. } => Some(object.as_str()),
            _ => None,
        }
    }
}
