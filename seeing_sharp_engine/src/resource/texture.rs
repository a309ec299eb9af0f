/// Texture resource.
///
/// A 2D texture (sampled) or an offscreen render target (used by postprocess
/// effects). One native handle; loaded when that handle exists.

use crate::error::Result;
use crate::engine_bail;
use crate::graphics_device::{GraphicsDevice, NativeHandle, NativeResourceDesc, NativeResourceKind};
use super::resource::{HandleSlot, Resource};
use super::resource_dictionary::ResourceDictionary;

/// How the texture is used on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureUsage {
    Sampled,
    RenderTarget,
}

/// Texture creation descriptor
#[derive(Debug, Clone)]
pub struct TextureDesc {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub usage: TextureUsage,
}

pub struct TextureResource {
    desc: TextureDesc,
    handle: HandleSlot,
}

impl TextureResource {
    pub fn new(desc: TextureDesc) -> Self {
        Self { desc, handle: HandleSlot::new() }
    }

    /// Sampled RGBA texture
    pub fn sampled(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self::new(TextureDesc { label: label.into(), width, height, usage: TextureUsage::Sampled })
    }

    /// Offscreen color target
    pub fn render_target(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self::new(TextureDesc { label: label.into(), width, height, usage: TextureUsage::RenderTarget })
    }

    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    pub fn width(&self) -> u32 {
        self.desc.width
    }

    pub fn height(&self) -> u32 {
        self.desc.height
    }

    /// Native handle, `None` while unloaded
    pub fn handle(&self) -> Option<NativeHandle> {
        self.handle.get()
    }

    fn native_desc(&self) -> NativeResourceDesc {
        let kind = match self.desc.usage {
            TextureUsage::Sampled => NativeResourceKind::Texture,
            TextureUsage::RenderTarget => NativeResourceKind::RenderTarget,
        };
        // RGBA8
        let size = self.desc.width as u64 * self.desc.height as u64 * 4;
        NativeResourceDesc::new(kind, self.desc.label.clone(), size)
    }
}

impl Resource for TextureResource {
    fn load_resource(&self, device: &dyn GraphicsDevice, _resources: &ResourceDictionary) -> Result<()> {
        if self.desc.width == 0 || self.desc.height == 0 {
            engine_bail!("seeing_sharp::TextureResource", InvalidResource,
                "Texture '{}' has an empty size ({}x{})",
                self.desc.label, self.desc.width, self.desc.height);
        }
        self.handle.create(device, &self.native_desc())?;
        Ok(())
    }

    fn unload_resource(&self, device: &dyn GraphicsDevice) {
        self.handle.release(device);
    }

    fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }

    fn resource_type_name(&self) -> &'static str {
        "Texture"
    }
}

#[cfg(test)]
#[path = "texture_tests.rs"]
mod tests;
