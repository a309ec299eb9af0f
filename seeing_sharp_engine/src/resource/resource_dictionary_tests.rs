use super::*;
use std::sync::atomic::AtomicUsize;
use crate::graphics_device::{MockGraphicsDevice, NativeResourceDesc, NativeResourceKind};
use crate::resource::resource::HandleSlot;

// ============================================================================
// Test resources
// ============================================================================

struct Plain {
    label: String,
    handle: HandleSlot,
}

impl Plain {
    fn new(label: &str) -> Self {
        Self { label: label.to_string(), handle: HandleSlot::new() }
    }
}

impl Resource for Plain {
    fn load_resource(&self, device: &dyn GraphicsDevice, _resources: &ResourceDictionary) -> Result<()> {
        self.handle.create(device, &NativeResourceDesc::new(NativeResourceKind::Texture, self.label.clone(), 16))?;
        Ok(())
    }

    fn unload_resource(&self, device: &dyn GraphicsDevice) {
        self.handle.release(device);
    }

    fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }
}

/// Loads a `Plain` dependency through the dictionary, then its own handle
struct Dependent {
    dependency: ResourceKey,
    handle: HandleSlot,
}

impl Resource for Dependent {
    fn load_resource(&self, device: &dyn GraphicsDevice, resources: &ResourceDictionary) -> Result<()> {
        let label = self.dependency.to_string();
        resources.get_resource_and_ensure_loaded(&self.dependency, || Ok(Plain::new(&label)))?;
        self.handle.create(device, &NativeResourceDesc::new(NativeResourceKind::Shader, "dependent", 0))?;
        Ok(())
    }

    fn unload_resource(&self, device: &dyn GraphicsDevice) {
        self.handle.release(device);
    }

    fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }
}

/// Requests its own key while loading
struct SelfReferencing {
    key: ResourceKey,
    observed_same_instance: AtomicBool,
    handle: HandleSlot,
}

impl Resource for SelfReferencing {
    fn load_resource(&self, device: &dyn GraphicsDevice, resources: &ResourceDictionary) -> Result<()> {
        let again: Arc<SelfReferencing> = resources.get_resource_and_ensure_loaded(&self.key, || {
            Err(Error::InvalidResource("factory must not run twice".to_string()))
        })?;
        let same = std::ptr::eq(again.as_ref(), self);
        self.observed_same_instance.store(same, Ordering::SeqCst);
        self.handle.create(device, &NativeResourceDesc::new(NativeResourceKind::Texture, "self", 4))?;
        Ok(())
    }

    fn unload_resource(&self, device: &dyn GraphicsDevice) {
        self.handle.release(device);
    }

    fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }
}

fn setup() -> (Arc<MockGraphicsDevice>, ResourceDictionary) {
    let device = Arc::new(MockGraphicsDevice::new(0, "mock"));
    let dictionary = ResourceDictionary::new(device.clone());
    (device, dictionary)
}

// ============================================================================
// get_resource_and_ensure_loaded
// ============================================================================

#[test]
fn test_get_and_ensure_loaded_creates_and_loads() {
    let (device, dict) = setup();

    let texture: Arc<Plain> = dict.get_resource_and_ensure_loaded("Tex", || Ok(Plain::new("tex"))).unwrap();

    assert!(texture.is_loaded());
    assert_eq!(dict.resource_count(), 1);
    assert!(dict.is_resource_loaded(&"Tex".into()));
    assert_eq!(device.live_handle_count(), 1);
}

#[test]
fn test_same_key_returns_same_instance_and_factory_runs_once() {
    let (_device, dict) = setup();
    let calls = AtomicUsize::new(0);

    let make = || {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(Plain::new("shared"))
    };
    let a: Arc<Plain> = dict.get_resource_and_ensure_loaded("Shared", make).unwrap();
    let b: Arc<Plain> = dict.get_resource_and_ensure_loaded("Shared", || {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(Plain::new("other"))
    }).unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(dict.resource_count(), 1);
}

#[test]
fn test_concurrent_requests_run_factory_once() {
    let (_device, dict) = setup();
    let calls = AtomicUsize::new(0);

    let results: Vec<Arc<Plain>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| {
                dict.get_resource_and_ensure_loaded("Race", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    std::thread::sleep(std::time::Duration::from_millis(5));
                    Ok(Plain::new("race"))
                }).unwrap()
            }))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
    assert!(results[0].is_loaded());
}

#[test]
fn test_dependency_is_resolved_through_dictionary() {
    let (device, dict) = setup();

    let dependent: Arc<Dependent> = dict.get_resource_and_ensure_loaded("Material", || Ok(Dependent {
        dependency: "Texture".into(),
        handle: HandleSlot::new(),
    })).unwrap();

    assert!(dependent.is_loaded());
    assert!(dict.is_resource_loaded(&"Texture".into()));
    assert_eq!(dict.resource_count(), 2);
    assert_eq!(device.live_handle_count(), 2);
}

#[test]
fn test_reentrant_request_during_load_receives_same_instance() {
    let (_device, dict) = setup();
    let key = ResourceKey::from("Self");

    let resource: Arc<SelfReferencing> = dict.get_resource_and_ensure_loaded(&key, || Ok(SelfReferencing {
        key: key.clone(),
        observed_same_instance: AtomicBool::new(false),
        handle: HandleSlot::new(),
    })).unwrap();

    assert!(resource.is_loaded());
    assert!(resource.observed_same_instance.load(Ordering::SeqCst));
}

#[test]
fn test_reentrant_request_inside_factory_is_rejected() {
    let (_device, dict) = setup();

    let result: Result<Arc<Plain>> = dict.get_resource_and_ensure_loaded("Cycle", || {
        let inner: Result<Arc<Plain>> = dict.get_resource_and_ensure_loaded("Cycle", || Ok(Plain::new("inner")));
        assert!(matches!(inner, Err(Error::ResourceUnavailable(_))));
        Ok(Plain::new("outer"))
    });

    assert!(result.is_ok());
    assert_eq!(dict.resource_count(), 1);
}

#[test]
fn test_failing_factory_registers_nothing() {
    let (_device, dict) = setup();

    let result: Result<Arc<Plain>> = dict.get_resource_and_ensure_loaded("Broken", || {
        Err(Error::BackendError("file missing".to_string()))
    });

    assert!(matches!(result, Err(Error::ResourceUnavailable(_))));
    assert!(!dict.contains_resource(&"Broken".into()));
}

#[test]
fn test_failing_load_keeps_resource_unloaded() {
    let (device, dict) = setup();
    device.fail_creation_labeled("bad");

    let result: Result<Arc<Plain>> = dict.get_resource_and_ensure_loaded("Bad", || Ok(Plain::new("bad")));

    assert!(matches!(result, Err(Error::ResourceUnavailable(_))));
    assert!(dict.contains_resource(&"Bad".into()));
    assert!(!dict.is_resource_loaded(&"Bad".into()));
    assert_eq!(device.live_handle_count(), 0);

    // A later retry succeeds once the device cooperates
    device.clear_failures();
    dict.ensure_loaded(&"Bad".into()).unwrap();
    assert!(dict.is_resource_loaded(&"Bad".into()));
}

#[test]
fn test_type_mismatch_is_invalid_resource() {
    let (_device, dict) = setup();
    dict.add_resource("Key", Plain::new("plain")).unwrap();

    let result: Result<Arc<Dependent>> = dict.get_resource_and_ensure_loaded("Key", || Ok(Dependent {
        dependency: "x".into(),
        handle: HandleSlot::new(),
    }));

    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

#[test]
fn test_lost_device_fails_with_device_lost() {
    let (device, dict) = setup();
    device.set_lost(true);

    let result: Result<Arc<Plain>> = dict.get_resource_and_ensure_loaded("Tex", || Ok(Plain::new("tex")));

    assert!(matches!(result, Err(Error::DeviceLost(_))));
}

#[test]
fn test_disposed_device_fails_with_device_unavailable() {
    let (device, dict) = setup();
    device.dispose();

    let result: Result<Arc<Plain>> = dict.get_resource_and_ensure_loaded("Tex", || Ok(Plain::new("tex")));

    assert!(matches!(result, Err(Error::DeviceUnavailable(_))));
}

// ============================================================================
// Lookup and mutation
// ============================================================================

#[test]
fn test_add_resource_does_not_load() {
    let (device, dict) = setup();
    let plain = dict.add_resource("Lazy", Plain::new("lazy")).unwrap();

    assert!(!plain.is_loaded());
    assert_eq!(device.live_handle_count(), 0);
    assert!(dict.get_resource::<Plain>(&"Lazy".into()).is_some());
    assert!(dict.get_resource::<Dependent>(&"Lazy".into()).is_none());
}

#[test]
fn test_add_resource_twice_fails() {
    let (_device, dict) = setup();
    dict.add_resource("Dup", Plain::new("a")).unwrap();

    assert!(matches!(dict.add_resource("Dup", Plain::new("b")), Err(Error::InvalidResource(_))));
}

#[test]
fn test_unload_is_idempotent_and_keeps_entry() {
    let (device, dict) = setup();
    let key = ResourceKey::from("Tex");
    let _tex: Arc<Plain> = dict.get_resource_and_ensure_loaded(&key, || Ok(Plain::new("tex"))).unwrap();

    assert!(dict.unload_resource(&key).unwrap());
    assert!(!dict.unload_resource(&key).unwrap());
    assert!(dict.contains_resource(&key));
    assert_eq!(device.live_handle_count(), 0);
}

#[test]
fn test_mark_for_unloading_defers_until_flush() {
    let (_device, dict) = setup();
    let key = ResourceKey::from("Tex");
    let _tex: Arc<Plain> = dict.get_resource_and_ensure_loaded(&key, || Ok(Plain::new("tex"))).unwrap();

    dict.mark_for_unloading(&key).unwrap();
    assert!(dict.is_resource_loaded(&key));

    assert_eq!(dict.unload_marked_resources().unwrap(), 1);
    assert!(!dict.is_resource_loaded(&key));
    assert_eq!(dict.unload_marked_resources().unwrap(), 0);
}

#[test]
fn test_remove_resource_releases_handles() {
    let (device, dict) = setup();
    let key = ResourceKey::from("Tex");
    let _tex: Arc<Plain> = dict.get_resource_and_ensure_loaded(&key, || Ok(Plain::new("tex"))).unwrap();

    assert!(dict.remove_resource(&key).unwrap());
    assert!(!dict.remove_resource(&key).unwrap());
    assert_eq!(dict.resource_count(), 0);
    assert_eq!(device.live_handle_count(), 0);
}

#[test]
fn test_reload_all_after_device_recovery() {
    let (device, dict) = setup();
    let a: Arc<Plain> = dict.get_resource_and_ensure_loaded("A", || Ok(Plain::new("a"))).unwrap();
    let b: Arc<Plain> = dict.get_resource_and_ensure_loaded("B", || Ok(Plain::new("b"))).unwrap();

    device.set_lost(true);
    assert!(matches!(dict.load_all(), Ok(0)));
    assert_eq!(dict.unload_all().unwrap(), 2);
    assert!(matches!(dict.ensure_loaded(&"A".into()), Err(Error::DeviceLost(_))));

    device.set_lost(false);
    assert_eq!(dict.reload_all().unwrap(), 2);
    assert!(a.is_loaded() && b.is_loaded());
    assert_eq!(device.live_handle_count(), 2);
}

#[test]
fn test_load_all_skips_failing_resources() {
    let (device, dict) = setup();
    dict.add_resource("Good", Plain::new("good")).unwrap();
    dict.add_resource("Bad", Plain::new("bad")).unwrap();
    device.fail_creation_labeled("bad");

    assert_eq!(dict.load_all().unwrap(), 1);
    assert_eq!(dict.loaded_resource_count(), 1);
}

#[test]
fn test_generic_keys_are_unique() {
    let a = ResourceDictionary::next_generic_resource_key();
    let b = ResourceDictionary::next_generic_resource_key();
    assert_ne!(a, b);
    assert!(a.is_generated());
}

// ============================================================================
// Render phase
// ============================================================================

#[test]
fn test_mutations_rejected_while_rendering() {
    let (_device, dict) = setup();
    let key = ResourceKey::from("Tex");
    let _tex: Arc<Plain> = dict.get_resource_and_ensure_loaded(&key, || Ok(Plain::new("tex"))).unwrap();

    {
        let _guard = dict.begin_render_phase();
        assert!(dict.is_rendering());

        // Reading a loaded resource is fine
        let again: Result<Arc<Plain>> = dict.get_resource_and_ensure_loaded(&key, || Ok(Plain::new("x")));
        assert!(again.is_ok());

        assert!(matches!(dict.add_resource("New", Plain::new("new")), Err(Error::ConcurrentMutationViolation(_))));
        assert!(matches!(dict.unload_resource(&key), Err(Error::ConcurrentMutationViolation(_))));
        assert!(matches!(dict.remove_resource(&key), Err(Error::ConcurrentMutationViolation(_))));
        let created: Result<Arc<Plain>> = dict.get_resource_and_ensure_loaded("Other", || Ok(Plain::new("o")));
        assert!(matches!(created, Err(Error::ConcurrentMutationViolation(_))));
    }

    assert!(!dict.is_rendering());
    assert!(dict.add_resource("New", Plain::new("new")).is_ok());
}

#[test]
fn test_drop_releases_all_handles() {
    let device = Arc::new(MockGraphicsDevice::new(0, "mock"));
    {
        let dict = ResourceDictionary::new(device.clone());
        let _a: Arc<Plain> = dict.get_resource_and_ensure_loaded("A", || Ok(Plain::new("a"))).unwrap();
        assert_eq!(device.live_handle_count(), 1);
    }
    assert_eq!(device.live_handle_count(), 0);
}
