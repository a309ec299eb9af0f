//! Integration tests for the resource lifecycle
//!
//! These tests drive a `ResourceDictionary` on the recording mock device:
//! lazy creation, the Unloaded/Loaded state machine, dependencies, device
//! loss and the render-phase mutation guard.
//!
//! Run with: cargo test --test resource_integration_tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use seeing_sharp_engine::glam::Vec4;
use seeing_sharp_engine::seeing_sharp::{Error, Result};
use seeing_sharp_engine::seeing_sharp::graphics_device::{
    GraphicsDevice, MockGraphicsDevice, NativeResourceDesc, NativeResourceKind,
};
use seeing_sharp_engine::seeing_sharp::resource::{
    GeometryResource, HandleSlot, MaterialDesc, MaterialResource, Resource, ResourceDictionary, ResourceKey,
    ShaderResource, ShaderStage, TextureResource,
};

// ============================================================================
// TEST RESOURCE
// ============================================================================

/// Resource with one constant buffer that counts its transitions
struct CountingResource {
    label: String,
    handle: HandleSlot,
    loads: Arc<AtomicUsize>,
    unloads: Arc<AtomicUsize>,
}

impl CountingResource {
    fn new(label: &str) -> (Self, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let unloads = Arc::new(AtomicUsize::new(0));
        let resource = Self {
            label: label.to_string(),
            handle: HandleSlot::new(),
            loads: loads.clone(),
            unloads: unloads.clone(),
        };
        (resource, loads, unloads)
    }
}

impl Resource for CountingResource {
    fn load_resource(&self, device: &dyn GraphicsDevice, _resources: &ResourceDictionary) -> Result<()> {
        let desc = NativeResourceDesc::new(NativeResourceKind::ConstantBuffer, self.label.clone(), 16);
        self.handle.create(device, &desc)?;
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn unload_resource(&self, device: &dyn GraphicsDevice) {
        if self.handle.is_some() {
            self.unloads.fetch_add(1, Ordering::SeqCst);
        }
        self.handle.release(device);
    }

    fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }
}

fn dictionary() -> (Arc<ResourceDictionary>, Arc<MockGraphicsDevice>) {
    let device = Arc::new(MockGraphicsDevice::new(0, "mock"));
    (Arc::new(ResourceDictionary::new(device.clone())), device)
}

fn shader(label: &str, stage: ShaderStage) -> ShaderResource {
    ShaderResource::new(label, stage, vec![0x44, 0x58, 0x42, 0x43])
}

// ============================================================================
// LIFECYCLE TESTS
// ============================================================================

#[test]
fn test_integration_load_unload_load_cycle() {
    let (resources, device) = dictionary();
    let key = ResourceKey::from("Counting.A");
    let (resource, loads, unloads) = CountingResource::new("a");
    resources.add_resource(&key, resource).unwrap();
    assert!(!resources.is_resource_loaded(&key));

    resources.ensure_loaded(&key).unwrap();
    resources.ensure_loaded(&key).unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(device.live_handle_count(), 1);

    assert!(resources.unload_resource(&key).unwrap());
    assert!(!resources.unload_resource(&key).unwrap());
    assert_eq!(unloads.load(Ordering::SeqCst), 1);
    assert_eq!(device.live_handle_count(), 0);

    resources.ensure_loaded(&key).unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 2);
    assert!(resources.is_resource_loaded(&key));
}

#[test]
fn test_integration_concurrent_requests_share_one_instance() {
    let (resources, device) = dictionary();
    let factory_runs = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4).map(|_| {
        let resources = resources.clone();
        let factory_runs = factory_runs.clone();
        let barrier = barrier.clone();
        thread::spawn(move || {
            barrier.wait();
            resources.get_resource_and_ensure_loaded("Texture.Shared", || {
                factory_runs.fetch_add(1, Ordering::SeqCst);
                Ok(TextureResource::sampled("shared", 64, 64))
            }).unwrap()
        })
    }).collect();
    let instances: Vec<Arc<TextureResource>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(factory_runs.load(Ordering::SeqCst), 1);
    assert!(instances.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert!(instances[0].handle().is_some());
    assert_eq!(device.live_handle_count(), 1);
}

#[test]
fn test_integration_material_loads_its_dependencies() {
    let (resources, device) = dictionary();
    resources.add_resource("Shader.VS", shader("vs", ShaderStage::Vertex)).unwrap();
    resources.add_resource("Shader.PS", shader("ps", ShaderStage::Pixel)).unwrap();
    resources.add_resource("Texture.Wood", TextureResource::sampled("wood", 8, 8)).unwrap();

    let material = resources.get_resource_and_ensure_loaded("Material.Wood", || Ok(MaterialResource::new(MaterialDesc {
        label: "wood".to_string(),
        vertex_shader: ResourceKey::from("Shader.VS"),
        pixel_shader: ResourceKey::from("Shader.PS"),
        texture: Some(ResourceKey::from("Texture.Wood")),
        diffuse_color: Vec4::ONE,
    }))).unwrap();

    assert!(material.shader_handles().is_some());
    assert!(material.texture_handle().is_some());
    assert_eq!(resources.loaded_resource_count(), 4);
    // Two shaders, one texture, one constant buffer
    assert_eq!(device.live_handle_count(), 4);
}

#[test]
fn test_integration_material_with_missing_dependency_stays_unloaded() {
    let (resources, _device) = dictionary();
    resources.add_resource("Shader.VS", shader("vs", ShaderStage::Vertex)).unwrap();

    let result = resources.get_resource_and_ensure_loaded("Material.Broken", || Ok(MaterialResource::new(MaterialDesc {
        label: "broken".to_string(),
        vertex_shader: ResourceKey::from("Shader.VS"),
        pixel_shader: ResourceKey::from("Shader.Missing"),
        texture: None,
        diffuse_color: Vec4::ONE,
    })));

    assert!(matches!(result, Err(Error::ResourceUnavailable(_))));
    let key = ResourceKey::from("Material.Broken");
    assert!(resources.contains_resource(&key));
    assert!(!resources.is_resource_loaded(&key));
}

#[test]
fn test_integration_factory_requesting_itself_fails() {
    let (resources, _device) = dictionary();
    let inner = resources.clone();

    let result = resources.get_resource_and_ensure_loaded("Texture.Cycle", move || {
        inner.get_resource_and_ensure_loaded("Texture.Cycle", || Ok(TextureResource::sampled("inner", 1, 1)))?;
        Ok(TextureResource::sampled("outer", 1, 1))
    });

    assert!(matches!(result, Err(Error::ResourceUnavailable(_))));
    assert!(!resources.contains_resource(&ResourceKey::from("Texture.Cycle")));
}

#[test]
fn test_integration_wrong_type_is_rejected() {
    let (resources, _device) = dictionary();
    resources.add_resource("Geometry.Cube", GeometryResource::cube("cube").unwrap()).unwrap();

    let result = resources.get_resource_and_ensure_loaded("Geometry.Cube", || Ok(TextureResource::sampled("t", 1, 1)));

    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

// ============================================================================
// DEVICE AND RENDER PHASE TESTS
// ============================================================================

#[test]
fn test_integration_device_loss_and_reload() {
    let (resources, device) = dictionary();
    let (resource, loads, _unloads) = CountingResource::new("a");
    resources.add_resource("Counting.A", resource).unwrap();
    resources.load_all().unwrap();

    device.set_lost(true);
    let blocked = resources.get_resource_and_ensure_loaded("Texture.Late", || Ok(TextureResource::sampled("late", 4, 4)));
    assert!(matches!(blocked, Err(Error::DeviceLost(_))));
    assert_eq!(resources.unload_all().unwrap(), 1);

    device.set_lost(false);
    assert_eq!(resources.reload_all().unwrap(), 1);
    assert_eq!(loads.load(Ordering::SeqCst), 2);
    assert_eq!(device.live_handle_count(), 1);
}

#[test]
fn test_integration_mutations_blocked_while_rendering() {
    let (resources, _device) = dictionary();
    let key = ResourceKey::from("Texture.Hud");
    resources.add_resource(&key, TextureResource::sampled("hud", 4, 4)).unwrap();
    resources.ensure_loaded(&key).unwrap();

    {
        let _guard = resources.begin_render_phase();
        assert!(matches!(resources.remove_resource(&key), Err(Error::ConcurrentMutationViolation(_))));
        assert!(matches!(
            resources.add_resource("Texture.Other", TextureResource::sampled("other", 4, 4)),
            Err(Error::ConcurrentMutationViolation(_))
        ));
        // Reading a loaded resource is fine
        assert!(resources.get_resource::<TextureResource>(&key).is_some());
    }

    assert!(!resources.is_rendering());
    assert!(resources.remove_resource(&key).unwrap());
}

#[test]
fn test_integration_marked_resources_unload_in_batch() {
    let (resources, device) = dictionary();
    for name in ["a", "b", "c"] {
        let (resource, _, _) = CountingResource::new(name);
        resources.add_resource(format!("Counting.{}", name), resource).unwrap();
    }
    resources.load_all().unwrap();

    resources.mark_for_unloading(&ResourceKey::from("Counting.a")).unwrap();
    resources.mark_for_unloading(&ResourceKey::from("Counting.c")).unwrap();
    assert_eq!(device.live_handle_count(), 3);

    assert_eq!(resources.unload_marked_resources().unwrap(), 2);
    assert_eq!(resources.loaded_resource_count(), 1);
    assert_eq!(resources.unload_marked_resources().unwrap(), 0);
}
