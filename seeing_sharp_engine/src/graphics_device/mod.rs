/// Graphics device module - the device contract consumed by the engine core

pub mod graphics_device;
pub mod draw_command;
pub mod mock_graphics_device;

pub use graphics_device::*;
pub use draw_command::*;
pub use mock_graphics_device::MockGraphicsDevice;
