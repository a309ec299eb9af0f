/// Resource trait - the load/unload state machine of device-bound resources.
///
/// A resource is owned by exactly one `ResourceDictionary` (one per device).
/// It is either Unloaded or Loaded; `is_loaded()` is true only when every
/// native sub-handle it needs exists. Loading a loaded resource and unloading
/// an unloaded one are no-ops.
///
/// Resources are shared as `Arc<T>`, so their device state lives behind
/// interior mutability (`HandleSlot`).

use std::any::Any;
use std::sync::RwLock;

use crate::engine_bail;
use crate::error::Result;
use crate::graphics_device::{GraphicsDevice, NativeHandle, NativeResourceDesc};
use crate::render::PostprocessEffect;
use super::resource_dictionary::ResourceDictionary;

const SOURCE: &str = "seeing_sharp::Resource";

/// Device-bound resource
pub trait Resource: Any + Send + Sync {
    /// Create all native handles on `device`.
    ///
    /// `resources` is the owning dictionary; dependencies are resolved through
    /// it (`get_resource_and_ensure_loaded`). On error the dictionary calls
    /// `unload_resource` to release whatever was created.
    fn load_resource(&self, device: &dyn GraphicsDevice, resources: &ResourceDictionary) -> Result<()>;

    /// Release all native handles
    fn unload_resource(&self, device: &dyn GraphicsDevice);

    /// Whether every native sub-handle is present. No side effects.
    fn is_loaded(&self) -> bool;

    /// Short type label for logs
    fn resource_type_name(&self) -> &'static str {
        "Resource"
    }

    /// Postprocess effects expose their render protocol through this
    fn as_postprocess_effect(&self) -> Option<&dyn PostprocessEffect> {
        None
    }
}

// ===== HANDLE SLOT =====

/// One optional native handle with interior mutability
#[derive(Debug, Default)]
pub struct HandleSlot {
    handle: RwLock<Option<NativeHandle>>,
}

impl HandleSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current handle, if loaded
    pub fn get(&self) -> Option<NativeHandle> {
        self.handle.read().ok().and_then(|h| *h)
    }

    pub fn is_some(&self) -> bool {
        self.get().is_some()
    }

    /// Create the handle unless it already exists
    pub fn create(&self, device: &dyn GraphicsDevice, desc: &NativeResourceDesc) -> Result<NativeHandle> {
        if let Some(existing) = self.get() {
            return Ok(existing);
        }
        let handle = device.create_handle(desc)?;
        match self.handle.write() {
            Ok(mut slot) => {
                *slot = Some(handle);
                Ok(handle)
            }
            Err(_) => {
                device.release_handle(handle);
                engine_bail!(SOURCE, BackendError, "Handle slot for '{}' is poisoned", desc.label)
            }
        }
    }

    /// Release the handle if present
    pub fn release(&self, device: &dyn GraphicsDevice) {
        let taken = self.handle.write().ok().and_then(|mut h| h.take());
        if let Some(handle) = taken {
            device.release_handle(handle);
        }
    }
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod tests;
