/// Material resource.
///
/// A material references its shaders and an optional texture by key. Those
/// dependencies are resolved through the owning dictionary while the material
/// itself loads, so loading a material loads everything it draws with.
/// Its own device state is one constant buffer holding `MaterialConstants`.

use std::sync::{Arc, RwLock};
use bytemuck::{Pod, Zeroable};
use glam::Vec4;

use crate::error::{Error, Result};
use crate::engine_err;
use crate::graphics_device::{GraphicsDevice, NativeHandle, NativeResourceDesc, NativeResourceKind};
use super::resource::{HandleSlot, Resource};
use super::resource_dictionary::ResourceDictionary;
use super::resource_key::ResourceKey;
use super::shader::ShaderResource;
use super::texture::TextureResource;

const SOURCE: &str = "seeing_sharp::MaterialResource";

// ===== DESCRIPTOR =====

/// Material creation descriptor
#[derive(Debug, Clone)]
pub struct MaterialDesc {
    pub label: String,
    pub vertex_shader: ResourceKey,
    pub pixel_shader: ResourceKey,
    pub texture: Option<ResourceKey>,
    pub diffuse_color: Vec4,
}

/// Per-material constants uploaded to the device
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialConstants {
    pub diffuse_color: [f32; 4],
    /// 1.0 when a texture is bound
    pub use_texture: f32,
    pub _padding: [f32; 3],
}

/// Dependencies resolved during the last successful load
struct ResolvedMaterial {
    vertex_shader: Arc<ShaderResource>,
    pixel_shader: Arc<ShaderResource>,
    texture: Option<Arc<TextureResource>>,
}

// ===== MATERIAL =====

pub struct MaterialResource {
    desc: MaterialDesc,
    resolved: RwLock<Option<ResolvedMaterial>>,
    constants: HandleSlot,
}

impl MaterialResource {
    pub fn new(desc: MaterialDesc) -> Self {
        Self { desc, resolved: RwLock::new(None), constants: HandleSlot::new() }
    }

    pub fn desc(&self) -> &MaterialDesc {
        &self.desc
    }

    pub fn constants(&self) -> MaterialConstants {
        MaterialConstants {
            diffuse_color: self.desc.diffuse_color.to_array(),
            use_texture: if self.desc.texture.is_some() { 1.0 } else { 0.0 },
            _padding: [0.0; 3],
        }
    }

    pub fn constant_buffer(&self) -> Option<NativeHandle> {
        self.constants.get()
    }

    /// Texture handle, if a texture is bound and loaded
    pub fn texture_handle(&self) -> Option<NativeHandle> {
        let resolved = self.resolved.read().ok()?;
        resolved.as_ref()?.texture.as_ref()?.handle()
    }

    /// Shader handles (vertex, pixel) while loaded
    pub fn shader_handles(&self) -> Option<(NativeHandle, NativeHandle)> {
        let resolved = self.resolved.read().ok()?;
        let resolved = resolved.as_ref()?;
        Some((resolved.vertex_shader.handle()?, resolved.pixel_shader.handle()?))
    }

    /// Look up a registered dependency and make sure it is loaded
    fn resolve<T: Resource>(&self, resources: &ResourceDictionary, key: &ResourceKey) -> Result<Arc<T>> {
        let dependency = resources.get_resource::<T>(key).ok_or_else(|| engine_err!(SOURCE, ResourceUnavailable,
            "Material '{}' depends on missing resource {}", self.desc.label, key))?;
        resources.ensure_loaded(key)?;
        Ok(dependency)
    }
}

impl Resource for MaterialResource {
    fn load_resource(&self, device: &dyn GraphicsDevice, resources: &ResourceDictionary) -> Result<()> {
        let vertex_shader = self.resolve::<ShaderResource>(resources, &self.desc.vertex_shader)?;
        let pixel_shader = self.resolve::<ShaderResource>(resources, &self.desc.pixel_shader)?;
        let texture = match &self.desc.texture {
            Some(key) => Some(self.resolve::<TextureResource>(resources, key)?),
            None => None,
        };

        let constants = self.constants();
        let bytes = bytemuck::bytes_of(&constants);
        let desc = NativeResourceDesc::new(
            NativeResourceKind::ConstantBuffer,
            format!("{}.constants", self.desc.label),
            bytes.len() as u64,
        );
        let handle = self.constants.create(device, &desc)?;
        device.update_buffer(handle, bytes)?;

        let mut resolved = self.resolved.write()
            .map_err(|_| Error::BackendError(format!("Material '{}' lock poisoned", self.desc.label)))?;
        *resolved = Some(ResolvedMaterial { vertex_shader, pixel_shader, texture });
        Ok(())
    }

    fn unload_resource(&self, device: &dyn GraphicsDevice) {
        self.constants.release(device);
        if let Ok(mut resolved) = self.resolved.write() {
            *resolved = None;
        }
    }

    fn is_loaded(&self) -> bool {
        let resolved = self.resolved.read().map(|r| r.is_some()).unwrap_or(false);
        resolved && self.constants.is_some()
    }

    fn resource_type_name(&self) -> &'static str {
        "Material"
    }
}

#[cfg(test)]
#[path = "material_tests.rs"]
mod tests;
