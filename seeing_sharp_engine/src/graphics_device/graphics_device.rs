/// GraphicsDevice trait - the engine's view of one rendering device
///
/// The engine never talks to a native API directly. It asks the device for
/// opaque native handles, uploads buffer contents and submits draw commands.
/// Backends (Direct3D, Vulkan, ...) implement this trait outside the core.

use crate::error::{Error, Result};
use super::draw_command::DrawCommand;

/// Index of a device inside the engine (resource dictionaries are keyed by it)
pub type DeviceIndex = usize;

/// Kind of native object behind a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeResourceKind {
    Texture,
    VertexBuffer,
    IndexBuffer,
    ConstantBuffer,
    Shader,
    RenderTarget,
}

/// Description of a native object to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeResourceDesc {
    /// What to create
    pub kind: NativeResourceKind,
    /// Debug label (shows up in native debuggers and in the mock device)
    pub label: String,
    /// Size in bytes (buffers), or width * height * 4 (textures)
    pub size_bytes: u64,
}

impl NativeResourceDesc {
    pub fn new(kind: NativeResourceKind, label: impl Into<String>, size_bytes: u64) -> Self {
        Self { kind, label: label.into(), size_bytes }
    }
}

/// Opaque reference to a native object owned by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHandle {
    pub id: u64,
    pub kind: NativeResourceKind,
}

/// Rendering device contract
///
/// Sequencing rules the engine follows:
/// - resources are loaded (handles created) before anything referencing them is drawn
/// - draw commands are submitted between `BeginPass` / `EndPass`
/// - handles are released only from the manipulation phase or on device loss
pub trait GraphicsDevice: Send + Sync {
    /// Engine-wide index of this device
    fn device_index(&self) -> DeviceIndex;

    /// Human readable name (adapter description)
    fn name(&self) -> &str;

    /// Device was removed or reset; every handle is invalid
    fn is_lost(&self) -> bool;

    /// Device was disposed; nothing can be created anymore
    fn is_disposed(&self) -> bool;

    /// Create a native object
    fn create_handle(&self, desc: &NativeResourceDesc) -> Result<NativeHandle>;

    /// Release a native object. Unknown handles are ignored.
    fn release_handle(&self, handle: NativeHandle);

    /// Upload bytes into a buffer handle
    fn update_buffer(&self, handle: NativeHandle, data: &[u8]) -> Result<()>;

    /// Submit one draw command
    fn submit(&self, command: DrawCommand) -> Result<()>;
}

/// Check that `device` can accept work.
///
/// Disposed devices yield `DeviceUnavailable`, lost devices `DeviceLost`.
pub fn ensure_device_available(device: &dyn GraphicsDevice) -> Result<()> {
    if device.is_disposed() {
        return Err(Error::DeviceUnavailable(format!(
            "Device {} ('{}') has been disposed", device.device_index(), device.name()
        )));
    }
    if device.is_lost() {
        return Err(Error::DeviceLost(format!(
            "Device {} ('{}') was lost", device.device_index(), device.name()
        )));
    }
    Ok(())
}
