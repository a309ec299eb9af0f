/// Built-in scene object kinds.
///
/// - `MeshObject`: geometry + optional material, plain or transparent pass
/// - `LineListObject`: line segments in a private vertex buffer, line pass
/// - `Overlay2DObject`: screen-space rectangle, 2D overlay pass

use glam::{Vec3, Vec4};

use crate::error::Result;
use crate::engine_err;
use crate::graphics_device::DrawCommand;
use crate::render::{RenderPassInfo, RenderState, PASS_2D_OVERLAY, PASS_LINE_RENDER, PASS_PLAIN_RENDER, PASS_TRANSPARENT_RENDER};
use crate::resource::{
    BufferResource, GeometryResource, MaterialResource, ResourceDictionary, ResourceKey, TextureResource, Vertex,
};
use super::object::{ObjectState, SceneObject};

const SOURCE: &str = "seeing_sharp::SceneObject";

// ===== MESH =====

/// Indexed geometry drawn with an optional material.
///
/// Objects with opacity below 1 move to the transparent pass.
pub struct MeshObject {
    geometry: ResourceKey,
    material: Option<ResourceKey>,
    /// Model-space bounding radius
    radius: f32,
}

impl MeshObject {
    pub fn new(geometry: impl Into<ResourceKey>) -> Self {
        Self { geometry: geometry.into(), material: None, radius: 0.87 }
    }

    pub fn with_material(mut self, material: impl Into<ResourceKey>) -> Self {
        self.material = Some(material.into());
        self
    }

    pub fn with_bounding_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    pub fn geometry(&self) -> &ResourceKey {
        &self.geometry
    }

    pub fn material(&self) -> Option<&ResourceKey> {
        self.material.as_ref()
    }
}

impl SceneObject for MeshObject {
    fn type_name(&self) -> &'static str {
        "Mesh"
    }

    fn load_resources(&self, resources: &ResourceDictionary) -> Result<()> {
        resources.ensure_loaded(&self.geometry)?;
        if let Some(material) = &self.material {
            resources.ensure_loaded(material)?;
        }
        Ok(())
    }

    fn is_loaded(&self, resources: &ResourceDictionary) -> bool {
        resources.is_resource_loaded(&self.geometry)
            && self.material.as_ref().map_or(true, |material| resources.is_resource_loaded(material))
    }

    fn render_passes(&self, state: &ObjectState) -> Vec<RenderPassInfo> {
        if state.is_transparent() {
            vec![PASS_TRANSPARENT_RENDER]
        } else {
            vec![PASS_PLAIN_RENDER]
        }
    }

    fn render(&self, state: &ObjectState, _pass: &RenderPassInfo, render_state: &mut RenderState<'_>) -> Result<()> {
        let resources = render_state.resources();
        let geometry = resources.get_resource::<GeometryResource>(&self.geometry)
            .and_then(|geometry| geometry.vertex_buffer())
            .ok_or_else(|| engine_err!(SOURCE, ResourceUnavailable,
                "Geometry {} of '{}' is not loaded", self.geometry, state.name))?;
        let material = match &self.material {
            Some(key) => Some(
                resources.get_resource::<MaterialResource>(key)
                    .and_then(|material| material.constant_buffer())
                    .ok_or_else(|| engine_err!(SOURCE, ResourceUnavailable,
                        "Material {} of '{}' is not loaded", key, state.name))?,
            ),
            None => None,
        };

        render_state.submit(DrawCommand::DrawGeometry {
            object: state.name.clone(),
            geometry,
            material,
            world: state.world_matrix(),
            opacity: state.opacity,
        })
    }

    fn bounding_radius(&self, state: &ObjectState) -> Option<f32> {
        Some(self.radius * state.scale.abs().max_element())
    }
}

// ===== LINE LIST =====

/// Line segments (pairs of points) with one color.
///
/// The vertex buffer is private to the object: it is created under a
/// generated key on first load and removed with the object.
pub struct LineListObject {
    lines: Vec<(Vec3, Vec3)>,
    color: Vec4,
    buffer_key: ResourceKey,
}

impl LineListObject {
    pub fn new(lines: Vec<(Vec3, Vec3)>, color: Vec4) -> Self {
        Self { lines, color, buffer_key: ResourceDictionary::next_generic_resource_key() }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn buffer_key(&self) -> &ResourceKey {
        &self.buffer_key
    }

    fn vertices(&self) -> Vec<Vertex> {
        let color = self.color.to_array();
        self.lines
            .iter()
            .flat_map(|&(start, end)| [Vertex::new(start).with_color(color), Vertex::new(end).with_color(color)])
            .collect()
    }
}

impl SceneObject for LineListObject {
    fn type_name(&self) -> &'static str {
        "LineList"
    }

    fn load_resources(&self, resources: &ResourceDictionary) -> Result<()> {
        resources.get_resource_and_ensure_loaded(&self.buffer_key, || {
            Ok(BufferResource::vertices("LineList.vertices", &self.vertices()))
        })?;
        Ok(())
    }

    fn unload_resources(&self, resources: &ResourceDictionary) -> Result<()> {
        resources.remove_resource(&self.buffer_key)?;
        Ok(())
    }

    fn is_loaded(&self, resources: &ResourceDictionary) -> bool {
        resources.is_resource_loaded(&self.buffer_key)
    }

    fn render_passes(&self, _state: &ObjectState) -> Vec<RenderPassInfo> {
        if self.lines.is_empty() {
            Vec::new()
        } else {
            vec![PASS_LINE_RENDER]
        }
    }

    fn render(&self, state: &ObjectState, _pass: &RenderPassInfo, render_state: &mut RenderState<'_>) -> Result<()> {
        let buffer = render_state.resources().get_resource::<BufferResource>(&self.buffer_key)
            .ok_or_else(|| engine_err!(SOURCE, ResourceUnavailable,
                "Line buffer of '{}' is not registered", state.name))?;
        let vertex_buffer = buffer.handle()
            .ok_or_else(|| engine_err!(SOURCE, ResourceUnavailable,
                "Line buffer of '{}' is not loaded", state.name))?;

        render_state.submit(DrawCommand::DrawLines {
            object: state.name.clone(),
            vertex_buffer,
            vertex_count: buffer.element_count(),
            world: state.world_matrix(),
        })
    }

    fn bounding_radius(&self, state: &ObjectState) -> Option<f32> {
        let radius = self.lines
            .iter()
            .flat_map(|&(start, end)| [start.length(), end.length()])
            .fold(0.0_f32, f32::max);
        Some(radius * state.scale.abs().max_element())
    }
}

// ===== 2D OVERLAY =====

/// Screen-space rectangle drawn after the 3D passes of its layer.
///
/// `rect` is (x, y, width, height) in pixels. Opacity multiplies the color
/// alpha. Overlays are never culled.
pub struct Overlay2DObject {
    rect: Vec4,
    color: Vec4,
    texture: Option<ResourceKey>,
}

impl Overlay2DObject {
    pub fn new(rect: Vec4, color: Vec4) -> Self {
        Self { rect, color, texture: None }
    }

    pub fn with_texture(mut self, texture: impl Into<ResourceKey>) -> Self {
        self.texture = Some(texture.into());
        self
    }

    pub fn rect(&self) -> Vec4 {
        self.rect
    }
}

impl SceneObject for Overlay2DObject {
    fn type_name(&self) -> &'static str {
        "Overlay2D"
    }

    fn load_resources(&self, resources: &ResourceDictionary) -> Result<()> {
        match &self.texture {
            Some(texture) => resources.ensure_loaded(texture),
            None => Ok(()),
        }
    }

    fn is_loaded(&self, resources: &ResourceDictionary) -> bool {
        self.texture.as_ref().map_or(true, |texture| resources.is_resource_loaded(texture))
    }

    fn render_passes(&self, _state: &ObjectState) -> Vec<RenderPassInfo> {
        vec![PASS_2D_OVERLAY]
    }

    fn is_cullable(&self) -> bool {
        false
    }

    fn render(&self, state: &ObjectState, _pass: &RenderPassInfo, render_state: &mut RenderState<'_>) -> Result<()> {
        let texture = match &self.texture {
            Some(key) => Some(
                render_state.resources().get_resource::<TextureResource>(key)
                    .and_then(|texture| texture.handle())
                    .ok_or_else(|| engine_err!(SOURCE, ResourceUnavailable,
                        "Texture {} of '{}' is not loaded", key, state.name))?,
            ),
            None => None,
        };

        let mut color = self.color;
        color.w *= state.opacity;
        render_state.submit(DrawCommand::Draw2D {
            object: state.name.clone(),
            rect: self.rect,
            color,
            texture,
        })
    }
}

#[cfg(test)]
#[path = "objects_tests.rs"]
mod tests;
