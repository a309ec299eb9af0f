/// Device buffer resource (vertex, index or constant data).
///
/// The CPU copy of the contents is kept so the buffer can be recreated after
/// an unload (device loss). Constant buffers take typed updates through
/// `bytemuck`; the new bytes are uploaded right away when the buffer is loaded
/// and on the next load otherwise.

use std::sync::RwLock;
use bytemuck::Pod;

use crate::error::Result;
use crate::{engine_bail, engine_err};
use crate::graphics_device::{GraphicsDevice, NativeHandle, NativeResourceDesc, NativeResourceKind};
use super::resource::{HandleSlot, Resource};
use super::resource_dictionary::ResourceDictionary;

const SOURCE: &str = "seeing_sharp::BufferResource";

// ===== BUFFER KIND =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Vertex,
    Index,
    Constant,
}

impl BufferKind {
    fn native_kind(self) -> NativeResourceKind {
        match self {
            BufferKind::Vertex => NativeResourceKind::VertexBuffer,
            BufferKind::Index => NativeResourceKind::IndexBuffer,
            BufferKind::Constant => NativeResourceKind::ConstantBuffer,
        }
    }
}

// ===== BUFFER RESOURCE =====

pub struct BufferResource {
    kind: BufferKind,
    label: String,
    /// Element stride in bytes (0 for constant buffers)
    stride: u32,
    contents: RwLock<Vec<u8>>,
    handle: HandleSlot,
}

impl BufferResource {
    /// Vertex buffer from a slice of plain-old-data vertices
    pub fn vertices<V: Pod>(label: impl Into<String>, vertices: &[V]) -> Self {
        Self::with_contents(
            BufferKind::Vertex,
            label.into(),
            std::mem::size_of::<V>() as u32,
            bytemuck::cast_slice(vertices).to_vec(),
        )
    }

    /// 32-bit index buffer
    pub fn indices(label: impl Into<String>, indices: &[u32]) -> Self {
        Self::with_contents(BufferKind::Index, label.into(), 4, bytemuck::cast_slice(indices).to_vec())
    }

    /// Constant buffer initialized with `value`
    pub fn constants<T: Pod>(label: impl Into<String>, value: &T) -> Self {
        Self::with_contents(BufferKind::Constant, label.into(), 0, bytemuck::bytes_of(value).to_vec())
    }

    fn with_contents(kind: BufferKind, label: String, stride: u32, contents: Vec<u8>) -> Self {
        Self {
            kind,
            label,
            stride,
            contents: RwLock::new(contents),
            handle: HandleSlot::new(),
        }
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn size_bytes(&self) -> usize {
        self.contents.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Number of elements (vertices or indices); 1 for constant buffers
    pub fn element_count(&self) -> u32 {
        if self.stride == 0 {
            return 1;
        }
        (self.size_bytes() / self.stride as usize) as u32
    }

    pub fn handle(&self) -> Option<NativeHandle> {
        self.handle.get()
    }

    /// Replace the contents of a constant buffer.
    ///
    /// The size must match the size the buffer was created with.
    pub fn update_constants<T: Pod>(&self, device: &dyn GraphicsDevice, value: &T) -> Result<()> {
        if self.kind != BufferKind::Constant {
            engine_bail!(SOURCE, InvalidResource,
                "Buffer '{}' is a {:?} buffer, not a constant buffer", self.label, self.kind);
        }
        let bytes = bytemuck::bytes_of(value);
        {
            let mut contents = self.contents.write()
                .map_err(|_| engine_err!(SOURCE, BackendError, "Buffer '{}' lock poisoned", self.label))?;
            if contents.len() != bytes.len() {
                engine_bail!(SOURCE, InvalidResource,
                    "Constant buffer '{}' holds {} bytes, got {}", self.label, contents.len(), bytes.len());
            }
            contents.copy_from_slice(bytes);
        }
        match self.handle.get() {
            Some(handle) => device.update_buffer(handle, bytes),
            None => Ok(()),
        }
    }
}

impl Resource for BufferResource {
    fn load_resource(&self, device: &dyn GraphicsDevice, _resources: &ResourceDictionary) -> Result<()> {
        let contents = self.contents.read()
            .map_err(|_| engine_err!(SOURCE, BackendError, "Buffer '{}' lock poisoned", self.label))?
            .clone();
        if contents.is_empty() {
            engine_bail!(SOURCE, InvalidResource, "Buffer '{}' has no contents", self.label);
        }

        let desc = NativeResourceDesc::new(self.kind.native_kind(), self.label.clone(), contents.len() as u64);
        let handle = self.handle.create(device, &desc)?;
        device.update_buffer(handle, &contents)
    }

    fn unload_resource(&self, device: &dyn GraphicsDevice) {
        self.handle.release(device);
    }

    fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }

    fn resource_type_name(&self) -> &'static str {
        "Buffer"
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
