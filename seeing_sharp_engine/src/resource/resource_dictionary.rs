/// ResourceDictionary - owns every resource of one graphics device.
///
/// Guarantees:
/// - at most one instance per key
/// - a factory passed to `get_resource_and_ensure_loaded` runs at most once
///   per key (first caller wins, concurrent callers wait for it)
/// - an instance is registered *before* it is loaded, so requests for the same
///   key made from inside its own `load_resource` receive that instance
/// - while a view renders (`RenderPhaseGuard`), nothing can be added, loaded,
///   unloaded or removed
///
/// Locks are never held while resource code (factories, load/unload) runs.
/// Lock order: `in_flight` before `entries`.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{Error, Result};
use crate::graphics_device::{ensure_device_available, DeviceIndex, GraphicsDevice};
use crate::{engine_bail, engine_debug, engine_err, engine_error, engine_trace, engine_warn};
use super::resource::Resource;
use super::resource_key::ResourceKey;

const SOURCE: &str = "seeing_sharp::ResourceDictionary";

struct ResourceEntry {
    resource: Arc<dyn Resource>,
    instance: Arc<dyn Any + Send + Sync>,
}

/// Keys whose factory or load is currently running, and on which thread
#[derive(Default)]
struct InFlight {
    constructing: FxHashMap<ResourceKey, ThreadId>,
    loading: FxHashMap<ResourceKey, ThreadId>,
}

#[derive(Clone, Copy)]
enum InFlightKind {
    Constructing,
    Loading,
}

pub struct ResourceDictionary {
    device: Arc<dyn GraphicsDevice>,
    entries: Mutex<FxHashMap<ResourceKey, ResourceEntry>>,
    in_flight: Mutex<InFlight>,
    in_flight_done: Condvar,
    marked_for_unloading: Mutex<FxHashSet<ResourceKey>>,
    rendering: AtomicBool,
}

impl ResourceDictionary {
    /// Create an empty dictionary bound to `device`
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Self {
        Self {
            device,
            entries: Mutex::new(FxHashMap::default()),
            in_flight: Mutex::new(InFlight::default()),
            in_flight_done: Condvar::new(),
            marked_for_unloading: Mutex::new(FxHashSet::default()),
            rendering: AtomicBool::new(false),
        }
    }

    /// Next process-unique key for instance-private resources
    pub fn next_generic_resource_key() -> ResourceKey {
        ResourceKey::next_generic()
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn device_index(&self) -> DeviceIndex {
        self.device.device_index()
    }

    // ===== LOOKUP =====

    /// Get the resource for `key`, creating it with `factory` if absent, and
    /// make sure it is loaded before returning it.
    ///
    /// # Errors
    ///
    /// - `DeviceUnavailable` / `DeviceLost` when the device cannot take work
    /// - `ResourceUnavailable` when the factory or the load fails (the resource
    ///   stays registered but Unloaded), or when the key is requested again
    ///   from inside its own factory
    /// - `InvalidResource` when `key` holds a resource of another type
    /// - `ConcurrentMutationViolation` when creation or loading is needed
    ///   while a view is rendering
    pub fn get_resource_and_ensure_loaded<T, F>(
        &self,
        key: impl Into<ResourceKey>,
        factory: F,
    ) -> Result<Arc<T>>
    where
        T: Resource,
        F: FnOnce() -> Result<T>,
    {
        let key = key.into();
        self.check_device()?;
        let me = thread::current().id();

        {
            let mut in_flight = self.lock_in_flight()?;
            loop {
                match in_flight.constructing.get(&key) {
                    Some(owner) if *owner == me => {
                        engine_bail!(SOURCE, ResourceUnavailable,
                            "Resource {} requested while its own factory is running", key);
                    }
                    Some(_) => {
                        in_flight = self.in_flight_done.wait(in_flight)
                            .map_err(|_| Self::poisoned("in-flight"))?;
                    }
                    None => break,
                }
            }

            if let Some(existing) = self.lookup_typed::<T>(&key)? {
                drop(in_flight);
                self.load_entry(&key, existing.as_ref())?;
                return Ok(existing);
            }

            self.check_not_rendering("create", &key)?;
            in_flight.constructing.insert(key.clone(), me);
        }

        let created = {
            let _guard = InFlightGuard { dictionary: self, key: &key, kind: InFlightKind::Constructing };
            factory()
        };

        let resource = match created {
            Ok(resource) => Arc::new(resource),
            Err(err) => engine_bail!(SOURCE, ResourceUnavailable,
                "Factory for resource {} failed: {}", key, err),
        };

        let registered = self.register(key.clone(), resource)?;
        self.load_entry(&key, registered.as_ref())?;
        Ok(registered)
    }

    /// Typed lookup without side effects. `None` if absent or of another type.
    pub fn get_resource<T: Resource>(&self, key: &ResourceKey) -> Option<Arc<T>> {
        let entries = self.entries.lock().ok()?;
        entries.get(key).and_then(|entry| entry.instance.clone().downcast::<T>().ok())
    }

    /// Untyped lookup
    pub fn resource(&self, key: &ResourceKey) -> Option<Arc<dyn Resource>> {
        let entries = self.entries.lock().ok()?;
        entries.get(key).map(|entry| entry.resource.clone())
    }

    pub fn contains_resource(&self, key: &ResourceKey) -> bool {
        self.entries.lock().map(|e| e.contains_key(key)).unwrap_or(false)
    }

    pub fn resource_count(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn loaded_resource_count(&self) -> usize {
        self.snapshot().iter().filter(|(_, r)| r.is_loaded()).count()
    }

    /// Whether the resource exists and is loaded. No side effects.
    pub fn is_resource_loaded(&self, key: &ResourceKey) -> bool {
        self.resource(key).map(|r| r.is_loaded()).unwrap_or(false)
    }

    pub fn resource_keys(&self) -> Vec<ResourceKey> {
        self.entries.lock().map(|e| e.keys().cloned().collect()).unwrap_or_default()
    }

    // ===== MUTATION =====

    /// Register `resource` under `key` without loading it
    ///
    /// # Errors
    ///
    /// `InvalidResource` if the key is taken, `ConcurrentMutationViolation`
    /// while rendering.
    pub fn add_resource<T: Resource>(&self, key: impl Into<ResourceKey>, resource: T) -> Result<Arc<T>> {
        let key = key.into();
        self.check_not_rendering("add", &key)?;

        let mut entries = self.lock_entries()?;
        if entries.contains_key(&key) {
            engine_bail!(SOURCE, InvalidResource, "Resource {} already exists", key);
        }
        let resource = Arc::new(resource);
        entries.insert(key.clone(), ResourceEntry {
            resource: resource.clone(),
            instance: resource.clone(),
        });
        drop(entries);

        engine_trace!(SOURCE, "Added resource {} ({})", key, resource.resource_type_name());
        Ok(resource)
    }

    /// Load an already registered resource
    pub fn ensure_loaded(&self, key: &ResourceKey) -> Result<()> {
        let resource = self.resource(key)
            .ok_or_else(|| engine_err!(SOURCE, InvalidResource, "Resource {} not found", key))?;
        self.load_entry(key, resource.as_ref())
    }

    /// Queue a resource for unloading at the next `unload_marked_resources`
    pub fn mark_for_unloading(&self, key: &ResourceKey) -> Result<()> {
        self.check_not_rendering("mark for unloading", key)?;
        if !self.contains_resource(key) {
            engine_bail!(SOURCE, InvalidResource, "Resource {} not found", key);
        }
        self.marked_for_unloading.lock()
            .map_err(|_| Self::poisoned("unload queue"))?
            .insert(key.clone());
        Ok(())
    }

    /// Unload every resource queued by `mark_for_unloading`.
    ///
    /// Returns the number of resources that were actually unloaded.
    pub fn unload_marked_resources(&self) -> Result<usize> {
        let marked: Vec<ResourceKey> = {
            let mut queue = self.marked_for_unloading.lock()
                .map_err(|_| Self::poisoned("unload queue"))?;
            queue.drain().collect()
        };

        let mut unloaded = 0;
        for key in &marked {
            if self.unload_resource(key)? {
                unloaded += 1;
            }
        }
        Ok(unloaded)
    }

    /// Release the device handles of one resource; the entry stays registered.
    ///
    /// Returns false for unknown or already unloaded resources (no-op).
    pub fn unload_resource(&self, key: &ResourceKey) -> Result<bool> {
        self.check_not_rendering("unload", key)?;
        let resource = match self.resource(key) {
            Some(resource) => resource,
            None => return Ok(false),
        };
        if !resource.is_loaded() {
            return Ok(false);
        }
        resource.unload_resource(self.device.as_ref());
        engine_trace!(SOURCE, "Unloaded resource {}", key);
        Ok(true)
    }

    /// Unload and forget a resource. Returns false if it did not exist.
    pub fn remove_resource(&self, key: &ResourceKey) -> Result<bool> {
        self.check_not_rendering("remove", key)?;
        let removed = self.lock_entries()?.remove(key);
        if let Ok(mut queue) = self.marked_for_unloading.lock() {
            queue.remove(key);
        }
        match removed {
            Some(entry) => {
                entry.resource.unload_resource(self.device.as_ref());
                engine_trace!(SOURCE, "Removed resource {}", key);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Load every registered resource that is not loaded yet.
    ///
    /// Individual failures are logged and skipped; device failures abort.
    /// Returns the number of resources that became loaded.
    pub fn load_all(&self) -> Result<usize> {
        let mut loaded = 0;
        for (key, resource) in self.snapshot() {
            if resource.is_loaded() {
                continue;
            }
            match self.load_entry(&key, resource.as_ref()) {
                Ok(()) => loaded += 1,
                Err(err @ (Error::DeviceLost(_) | Error::DeviceUnavailable(_))) => return Err(err),
                Err(err @ Error::ConcurrentMutationViolation(_)) => return Err(err),
                Err(err) => engine_warn!(SOURCE, "Skipping resource {}: {}", key, err),
            }
        }
        Ok(loaded)
    }

    /// Unload every loaded resource. Returns how many were unloaded.
    pub fn unload_all(&self) -> Result<usize> {
        if self.rendering.load(Ordering::SeqCst) {
            engine_bail!(SOURCE, ConcurrentMutationViolation,
                "Cannot unload all resources while a view is rendering");
        }
        let mut unloaded = 0;
        for (_, resource) in self.snapshot() {
            if resource.is_loaded() {
                resource.unload_resource(self.device.as_ref());
                unloaded += 1;
            }
        }
        Ok(unloaded)
    }

    /// Full unload followed by a full load (device-loss recovery)
    pub fn reload_all(&self) -> Result<usize> {
        let unloaded = self.unload_all()?;
        let loaded = self.load_all()?;
        engine_debug!(SOURCE, "Reloaded device {}: {} unloaded, {} loaded",
            self.device_index(), unloaded, loaded);
        Ok(loaded)
    }

    /// Unload and forget everything
    pub fn clear(&self) -> Result<()> {
        self.unload_all()?;
        self.lock_entries()?.clear();
        if let Ok(mut queue) = self.marked_for_unloading.lock() {
            queue.clear();
        }
        Ok(())
    }

    // ===== RENDER PHASE =====

    /// Enter the render phase; mutations fail until the guard is dropped.
    pub fn begin_render_phase(&self) -> RenderPhaseGuard<'_> {
        self.rendering.store(true, Ordering::SeqCst);
        RenderPhaseGuard { dictionary: self }
    }

    pub fn is_rendering(&self) -> bool {
        self.rendering.load(Ordering::SeqCst)
    }

    // ===== INTERNALS =====

    fn lookup_typed<T: Resource>(&self, key: &ResourceKey) -> Result<Option<Arc<T>>> {
        let entries = self.lock_entries()?;
        match entries.get(key) {
            Some(entry) => entry.instance.clone().downcast::<T>()
                .map(Some)
                .map_err(|_| engine_err!(SOURCE, InvalidResource,
                    "Resource {} is a {}, not the requested type",
                    key, entry.resource.resource_type_name())),
            None => Ok(None),
        }
    }

    /// Register an instance; if the key got taken meanwhile, the existing
    /// instance wins and is returned instead.
    fn register<T: Resource>(&self, key: ResourceKey, resource: Arc<T>) -> Result<Arc<T>> {
        let mut entries = self.lock_entries()?;
        if let Some(entry) = entries.get(&key) {
            return entry.instance.clone().downcast::<T>()
                .map_err(|_| engine_err!(SOURCE, InvalidResource,
                    "Resource {} was registered with another type", key));
        }
        entries.insert(key, ResourceEntry {
            resource: resource.clone(),
            instance: resource.clone(),
        });
        Ok(resource)
    }

    fn load_entry(&self, key: &ResourceKey, resource: &dyn Resource) -> Result<()> {
        if resource.is_loaded() {
            return Ok(());
        }
        self.check_device()?;
        self.check_not_rendering("load", key)?;

        let me = thread::current().id();
        {
            let mut in_flight = self.lock_in_flight()?;
            loop {
                match in_flight.loading.get(key) {
                    // Re-entrant request: hand out the instance under construction
                    Some(owner) if *owner == me => return Ok(()),
                    Some(_) => {
                        in_flight = self.in_flight_done.wait(in_flight)
                            .map_err(|_| Self::poisoned("in-flight"))?;
                    }
                    None => break,
                }
            }
            if resource.is_loaded() {
                return Ok(());
            }
            in_flight.loading.insert(key.clone(), me);
        }

        let result = {
            let _guard = InFlightGuard { dictionary: self, key, kind: InFlightKind::Loading };
            resource.load_resource(self.device.as_ref(), self)
        };

        match result {
            Ok(()) => {
                engine_trace!(SOURCE, "Loaded resource {} on device {}", key, self.device_index());
                Ok(())
            }
            Err(err) => {
                resource.unload_resource(self.device.as_ref());
                match err {
                    Error::DeviceLost(_) | Error::DeviceUnavailable(_) => {
                        engine_error!(SOURCE, "Device failure while loading {}: {}", key, err);
                        Err(err)
                    }
                    other => Err(engine_err!(SOURCE, ResourceUnavailable,
                        "Loading resource {} failed: {}", key, other)),
                }
            }
        }
    }

    fn snapshot(&self) -> Vec<(ResourceKey, Arc<dyn Resource>)> {
        self.entries.lock()
            .map(|e| e.iter().map(|(k, v)| (k.clone(), v.resource.clone())).collect())
            .unwrap_or_default()
    }

    fn check_device(&self) -> Result<()> {
        ensure_device_available(self.device.as_ref()).map_err(|err| {
            engine_error!(SOURCE, "{}", err);
            err
        })
    }

    fn check_not_rendering(&self, operation: &str, key: &ResourceKey) -> Result<()> {
        if self.rendering.load(Ordering::SeqCst) {
            engine_bail!(SOURCE, ConcurrentMutationViolation,
                "Cannot {} resource {} while a view is rendering", operation, key);
        }
        Ok(())
    }

    fn lock_entries(&self) -> Result<MutexGuard<'_, FxHashMap<ResourceKey, ResourceEntry>>> {
        self.entries.lock().map_err(|_| Self::poisoned("entries"))
    }

    fn lock_in_flight(&self) -> Result<MutexGuard<'_, InFlight>> {
        self.in_flight.lock().map_err(|_| Self::poisoned("in-flight"))
    }

    fn poisoned(what: &str) -> Error {
        engine_err!(SOURCE, BackendError, "ResourceDictionary {} lock poisoned", what)
    }
}

impl Drop for ResourceDictionary {
    fn drop(&mut self) {
        if let Ok(entries) = self.entries.get_mut() {
            for entry in entries.values() {
                entry.resource.unload_resource(self.device.as_ref());
            }
        }
    }
}

/// Clears an in-flight marker even if the factory or load panics
struct InFlightGuard<'a> {
    dictionary: &'a ResourceDictionary,
    key: &'a ResourceKey,
    kind: InFlightKind,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = match self.dictionary.in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match self.kind {
            InFlightKind::Constructing => in_flight.constructing.remove(self.key),
            InFlightKind::Loading => in_flight.loading.remove(self.key),
        };
        self.dictionary.in_flight_done.notify_all();
    }
}

/// Marks the owning dictionary as rendering while alive
pub struct RenderPhaseGuard<'a> {
    dictionary: &'a ResourceDictionary,
}

impl Drop for RenderPhaseGuard<'_> {
    fn drop(&mut self) {
        self.dictionary.rendering.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[path = "resource_dictionary_tests.rs"]
mod tests;
