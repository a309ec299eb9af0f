/// Mock GraphicsDevice (no GPU required)
///
/// Records every submitted command and every live handle so tests and
/// headless tools can observe what the engine asked the device to do.
/// Creation failures, device loss and disposal can be triggered on demand.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use rustc_hash::FxHashSet;

use crate::error::{Error, Result};
use super::draw_command::DrawCommand;
use super::graphics_device::{
    ensure_device_available, DeviceIndex, GraphicsDevice, NativeHandle, NativeResourceDesc,
    NativeResourceKind,
};

// ============================================================================
// MockGraphicsDevice
// ============================================================================

pub struct MockGraphicsDevice {
    index: DeviceIndex,
    name: String,
    next_handle_id: AtomicU64,
    created_total: AtomicU64,
    live_handles: Mutex<FxHashSet<NativeHandle>>,
    commands: Mutex<Vec<DrawCommand>>,
    buffer_writes: Mutex<Vec<(NativeHandle, Vec<u8>)>>,
    failing_kinds: Mutex<FxHashSet<NativeResourceKind>>,
    failing_labels: Mutex<FxHashSet<String>>,
    lost: AtomicBool,
    disposed: AtomicBool,
}

impl MockGraphicsDevice {
    pub fn new(index: DeviceIndex, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            next_handle_id: AtomicU64::new(1),
            created_total: AtomicU64::new(0),
            live_handles: Mutex::new(FxHashSet::default()),
            commands: Mutex::new(Vec::new()),
            buffer_writes: Mutex::new(Vec::new()),
            failing_kinds: Mutex::new(FxHashSet::default()),
            failing_labels: Mutex::new(FxHashSet::default()),
            lost: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    // ===== FAILURE INJECTION =====

    /// Every following creation of `kind` fails with a backend error
    pub fn fail_creation_of(&self, kind: NativeResourceKind) {
        if let Ok(mut kinds) = self.failing_kinds.lock() {
            kinds.insert(kind);
        }
    }

    /// Every following creation whose label equals `label` fails
    pub fn fail_creation_labeled(&self, label: &str) {
        if let Ok(mut labels) = self.failing_labels.lock() {
            labels.insert(label.to_string());
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut kinds) = self.failing_kinds.lock() {
            kinds.clear();
        }
        if let Ok(mut labels) = self.failing_labels.lock() {
            labels.clear();
        }
    }

    /// Simulate device removal (`true`) or recovery (`false`).
    ///
    /// Losing the device invalidates every live handle.
    pub fn set_lost(&self, lost: bool) {
        self.lost.store(lost, Ordering::SeqCst);
        if lost {
            if let Ok(mut handles) = self.live_handles.lock() {
                handles.clear();
            }
        }
    }

    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }

    // ===== INSPECTION =====

    pub fn live_handle_count(&self) -> usize {
        self.live_handles.lock().map(|h| h.len()).unwrap_or(0)
    }

    pub fn is_handle_live(&self, handle: NativeHandle) -> bool {
        self.live_handles.lock().map(|h| h.contains(&handle)).unwrap_or(false)
    }

    /// Total number of handles ever created
    pub fn created_handle_count(&self) -> u64 {
        self.created_total.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<DrawCommand> {
        self.commands.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Return and forget all recorded commands
    pub fn take_commands(&self) -> Vec<DrawCommand> {
        self.commands.lock().map(|mut c| std::mem::take(&mut *c)).unwrap_or_default()
    }

    /// Names of drawn objects, in submission order
    pub fn drawn_objects(&self) -> Vec<String> {
        self.commands()
            .iter()
            .filter_map(|c| c.drawn_object().map(str::to_string))
            .collect()
    }

    pub fn buffer_writes(&self) -> Vec<(NativeHandle, Vec<u8>)> {
        self.buffer_writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    fn should_fail(&self, desc: &NativeResourceDesc) -> bool {
        let kind_fails = self.failing_kinds.lock().map(|k| k.contains(&desc.kind)).unwrap_or(false);
        let label_fails = self.failing_labels.lock().map(|l| l.contains(&desc.label)).unwrap_or(false);
        kind_fails || label_fails
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn device_index(&self) -> DeviceIndex {
        self.index
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_lost(&self) -> bool {
        self.lost.load(Ordering::SeqCst)
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn create_handle(&self, desc: &NativeResourceDesc) -> Result<NativeHandle> {
        ensure_device_available(self)?;
        if self.should_fail(desc) {
            return Err(Error::BackendError(format!(
                "Mock creation failure for {:?} '{}'", desc.kind, desc.label
            )));
        }

        let handle = NativeHandle {
            id: self.next_handle_id.fetch_add(1, Ordering::SeqCst),
            kind: desc.kind,
        };
        self.created_total.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut handles) = self.live_handles.lock() {
            handles.insert(handle);
        }
        Ok(handle)
    }

    fn release_handle(&self, handle: NativeHandle) {
        if let Ok(mut handles) = self.live_handles.lock() {
            handles.remove(&handle);
        }
    }

    fn update_buffer(&self, handle: NativeHandle, data: &[u8]) -> Result<()> {
        ensure_device_available(self)?;
        if !self.is_handle_live(handle) {
            return Err(Error::InvalidResource(format!("Handle {} is not live", handle.id)));
        }
        if let Ok(mut writes) = self.buffer_writes.lock() {
            writes.push((handle, data.to_vec()));
        }
        Ok(())
    }

    fn submit(&self, command: DrawCommand) -> Result<()> {
        ensure_device_available(self)?;
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(command);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
