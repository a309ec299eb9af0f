/// Compiled shader resource.
///
/// Bytecode is produced offline; the engine only hands it to the device.

use crate::error::Result;
use crate::engine_bail;
use crate::graphics_device::{GraphicsDevice, NativeHandle, NativeResourceDesc, NativeResourceKind};
use super::resource::{HandleSlot, Resource};
use super::resource_dictionary::ResourceDictionary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Pixel,
}

pub struct ShaderResource {
    label: String,
    stage: ShaderStage,
    bytecode: Vec<u8>,
    handle: HandleSlot,
}

impl ShaderResource {
    pub fn new(label: impl Into<String>, stage: ShaderStage, bytecode: Vec<u8>) -> Self {
        Self { label: label.into(), stage, bytecode, handle: HandleSlot::new() }
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn handle(&self) -> Option<NativeHandle> {
        self.handle.get()
    }
}

impl Resource for ShaderResource {
    fn load_resource(&self, device: &dyn GraphicsDevice, _resources: &ResourceDictionary) -> Result<()> {
        if self.bytecode.is_empty() {
            engine_bail!("seeing_sharp::ShaderResource", InvalidResource,
                "Shader '{}' has no bytecode", self.label);
        }
        let desc = NativeResourceDesc::new(NativeResourceKind::Shader, self.label.clone(), self.bytecode.len() as u64);
        self.handle.create(device, &desc)?;
        Ok(())
    }

    fn unload_resource(&self, device: &dyn GraphicsDevice) {
        self.handle.release(device);
    }

    fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }

    fn resource_type_name(&self) -> &'static str {
        "Shader"
    }
}

#[cfg(test)]
#[path = "shader_tests.rs"]
mod tests;
