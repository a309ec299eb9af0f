/// Geometry resource: an indexed triangle list.
///
/// Owns one vertex buffer and one index buffer on the device. The geometry
/// counts as loaded only when both exist; a failure creating the second one
/// releases the first (the dictionary unloads on load errors).

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::error::Result;
use crate::engine_bail;
use crate::graphics_device::{GraphicsDevice, NativeHandle, NativeResourceDesc, NativeResourceKind};
use super::resource::{HandleSlot, Resource};
use super::resource_dictionary::ResourceDictionary;

const SOURCE: &str = "seeing_sharp::GeometryResource";

// ===== VERTEX =====

/// Standard vertex layout (position, normal, texcoord, color)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coord: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex {
    pub fn new(position: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: [0.0, 1.0, 0.0],
            tex_coord: [0.0, 0.0],
            color: [1.0, 1.0, 1.0, 1.0],
        }
    }

    pub fn with_normal(mut self, normal: Vec3) -> Self {
        self.normal = normal.to_array();
        self
    }

    pub fn with_tex_coord(mut self, u: f32, v: f32) -> Self {
        self.tex_coord = [u, v];
        self
    }

    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        self.color = color;
        self
    }
}

// ===== GEOMETRY =====

pub struct GeometryResource {
    label: String,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    vertex_buffer: HandleSlot,
    index_buffer: HandleSlot,
}

impl GeometryResource {
    /// Create a geometry from vertices and a triangle list.
    ///
    /// # Errors
    ///
    /// `InvalidResource` if there are no vertices, the index count is not a
    /// multiple of 3, or an index points past the vertex array.
    pub fn new(label: impl Into<String>, vertices: Vec<Vertex>, indices: Vec<u32>) -> Result<Self> {
        let label = label.into();

        if vertices.is_empty() {
            engine_bail!(SOURCE, InvalidResource, "Geometry '{}' has no vertices", label);
        }
        if indices.len() % 3 != 0 {
            engine_bail!(SOURCE, InvalidResource,
                "Geometry '{}' index count {} is not a multiple of 3", label, indices.len());
        }
        if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            engine_bail!(SOURCE, InvalidResource,
                "Geometry '{}' index {} out of range ({} vertices)", label, bad, vertices.len());
        }

        Ok(Self {
            label,
            vertices,
            indices,
            vertex_buffer: HandleSlot::new(),
            index_buffer: HandleSlot::new(),
        })
    }

    /// Axis-aligned unit cube centered at the origin
    pub fn cube(label: impl Into<String>) -> Result<Self> {
        let faces: [(Vec3, Vec3, Vec3); 6] = [
            (Vec3::X, Vec3::Y, Vec3::Z),
            (Vec3::NEG_X, Vec3::Y, Vec3::NEG_Z),
            (Vec3::Y, Vec3::Z, Vec3::X),
            (Vec3::NEG_Y, Vec3::Z, Vec3::NEG_X),
            (Vec3::Z, Vec3::Y, Vec3::NEG_X),
            (Vec3::NEG_Z, Vec3::Y, Vec3::X),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, up, right) in faces {
            let base = vertices.len() as u32;
            let center = normal * 0.5;
            let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
            for (u, v) in corners {
                let position = center + right * (0.5 * u) + up * (0.5 * v);
                vertices.push(Vertex::new(position)
                    .with_normal(normal)
                    .with_tex_coord((u + 1.0) * 0.5, (1.0 - v) * 0.5));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self::new(label, vertices, indices)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Axis-aligned bounds (min, max) in model space
    pub fn bounding_box(&self) -> (Vec3, Vec3) {
        self.vertices.iter().fold(
            (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
            |(min, max), v| {
                let p = Vec3::from_array(v.position);
                (min.min(p), max.max(p))
            },
        )
    }

    pub fn vertex_buffer(&self) -> Option<NativeHandle> {
        self.vertex_buffer.get()
    }

    pub fn index_buffer(&self) -> Option<NativeHandle> {
        self.index_buffer.get()
    }
}

impl Resource for GeometryResource {
    fn load_resource(&self, device: &dyn GraphicsDevice, _resources: &ResourceDictionary) -> Result<()> {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&self.vertices);
        let vertex_desc = NativeResourceDesc::new(
            NativeResourceKind::VertexBuffer,
            format!("{}.vertices", self.label),
            vertex_bytes.len() as u64,
        );
        let vertex_buffer = self.vertex_buffer.create(device, &vertex_desc)?;
        device.update_buffer(vertex_buffer, vertex_bytes)?;

        let index_bytes: &[u8] = bytemuck::cast_slice(&self.indices);
        let index_desc = NativeResourceDesc::new(
            NativeResourceKind::IndexBuffer,
            format!("{}.indices", self.label),
            index_bytes.len() as u64,
        );
        let index_buffer = self.index_buffer.create(device, &index_desc)?;
        if !index_bytes.is_empty() {
            device.update_buffer(index_buffer, index_bytes)?;
        }
        Ok(())
    }

    fn unload_resource(&self, device: &dyn GraphicsDevice) {
        self.index_buffer.release(device);
        self.vertex_buffer.release(device);
    }

    fn is_loaded(&self) -> bool {
        self.vertex_buffer.is_some() && self.index_buffer.is_some()
    }

    fn resource_type_name(&self) -> &'static str {
        "Geometry"
    }
}

#[cfg(test)]
#[path = "geometry_tests.rs"]
mod tests;
