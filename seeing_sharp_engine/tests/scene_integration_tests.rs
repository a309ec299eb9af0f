//! Integration tests for scenes
//!
//! These tests verify pass subscriptions across frames and views, shared
//! device resources, manipulations queued from other threads and animation
//! sequences driven by the scene update.
//!
//! Run with: cargo test --test scene_integration_tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use seeing_sharp_engine::glam::Vec3;
use seeing_sharp_engine::seeing_sharp::EngineConfig;
use seeing_sharp_engine::seeing_sharp::animation::AnimationSequenceBuilder;
use seeing_sharp_engine::seeing_sharp::camera::{Camera, Viewport};
use seeing_sharp_engine::seeing_sharp::graphics_device::{DrawCommand, GraphicsDevice, MockGraphicsDevice};
use seeing_sharp_engine::seeing_sharp::render::PASS_PLAIN_RENDER;
use seeing_sharp_engine::seeing_sharp::resource::GeometryResource;
use seeing_sharp_engine::seeing_sharp::scene::{
    FrustumCulling, MeshObject, ObjectKey, ObjectState, Scene, UpdateState, ViewInformation, ViewKey,
};

// ============================================================================
// HELPERS
// ============================================================================

fn make_scene() -> Scene {
    Scene::new(&EngineConfig::default().with_update_worker_threads(2)).unwrap()
}

fn frame(millis: u64) -> UpdateState {
    UpdateState::from_elapsed(Duration::from_millis(millis))
}

fn register_view(scene: &mut Scene, name: &str, device: &Arc<MockGraphicsDevice>, camera: Camera) -> ViewKey {
    let view_device: Arc<dyn GraphicsDevice> = device.clone();
    let view = ViewInformation::new(name, camera, view_device).with_culler(FrustumCulling);
    scene.manipulate(move |m| m.register_view(view)).unwrap()
}

/// Scene with the unit cube registered and one view on a fresh mock device
fn scene_with_view() -> (Scene, Arc<MockGraphicsDevice>, ViewKey) {
    let mut scene = make_scene();
    let device = Arc::new(MockGraphicsDevice::new(0, "mock"));
    let view = register_view(&mut scene, "main", &device, Camera::new(Viewport::new(800, 600)));
    scene.manipulate(|m| m.add_resource("Geometry.Cube", || GeometryResource::cube("cube"))).unwrap();
    (scene, device, view)
}

fn add_mesh(scene: &mut Scene, name: &str) -> ObjectKey {
    scene.manipulate(|m| Ok(m.add_object(MeshObject::new("Geometry.Cube"), ObjectState::new(name)))).unwrap()
}

fn set_visible(scene: &mut Scene, object: ObjectKey, visible: bool) {
    scene.manipulate(|m| {
        if let Some(state) = m.object_state_mut(object) {
            state.visible = visible;
        }
        Ok(())
    }).unwrap();
}

fn run_frame(scene: &mut Scene, views: &[ViewKey]) {
    scene.apply_pending_manipulations();
    scene.update(&frame(16));
    for view in views {
        scene.prepare_view(*view).unwrap();
        scene.render_view(*view).unwrap();
    }
}

// ============================================================================
// SUBSCRIPTION TESTS
// ============================================================================

#[test]
fn test_integration_subscription_follows_visibility() {
    let (mut scene, _device, view) = scene_with_view();
    let cube = add_mesh(&mut scene, "cube");
    let layer = scene.default_layer();

    run_frame(&mut scene, &[view]);
    let first = scene.object_subscriptions(cube)[0];
    let subset = scene.subset(layer, view).unwrap();
    let subscription = subset.subscription(first).unwrap();
    assert!(subscription.is_subscribed);
    assert_eq!(subscription.object, cube);
    assert_eq!(subscription.pass, PASS_PLAIN_RENDER);

    set_visible(&mut scene, cube, false);
    run_frame(&mut scene, &[view]);
    let subset = scene.subset(layer, view).unwrap();
    assert!(!subset.is_subscribed(first));
    assert!(subset.subscription(first).is_none());
    assert_eq!(subset.pass_subscription_count(PASS_PLAIN_RENDER.id), 0);
    assert!(scene.object_subscriptions(cube).is_empty());

    set_visible(&mut scene, cube, true);
    run_frame(&mut scene, &[view]);
    let second = scene.object_subscriptions(cube)[0];
    let subset = scene.subset(layer, view).unwrap();
    assert!(subset.is_subscribed(second));
    // A stale handle never aliases the new subscription
    assert_ne!(first, second);
    assert!(!subset.is_subscribed(first));
}

#[test]
fn test_integration_views_have_independent_subsets() {
    let (mut scene, device, front) = scene_with_view();
    let mut away = Camera::new(Viewport::new(800, 600));
    away.look_at(Vec3::new(0.0, 0.0, 10.0), Vec3::new(0.0, 0.0, 20.0));
    let back = register_view(&mut scene, "back", &device, away);
    add_mesh(&mut scene, "cube");
    let layer = scene.default_layer();

    run_frame(&mut scene, &[front, back]);

    assert_eq!(scene.subset(layer, front).unwrap().subscription_count(), 1);
    assert_eq!(scene.subset(layer, back).unwrap().subscription_count(), 0);
    assert_eq!(device.drawn_objects(), vec!["cube".to_string()]);
}

#[test]
fn test_integration_registered_resource_created_once_per_device() {
    let mut scene = make_scene();
    let device = Arc::new(MockGraphicsDevice::new(0, "mock"));
    let view = register_view(&mut scene, "main", &device, Camera::new(Viewport::new(800, 600)));
    let factory_runs = Arc::new(AtomicUsize::new(0));
    let counter = factory_runs.clone();
    scene.manipulate(move |m| m.add_resource("Geometry.Cube", move || {
        counter.fetch_add(1, Ordering::SeqCst);
        GeometryResource::cube("cube")
    })).unwrap();
    for index in 0..10 {
        add_mesh(&mut scene, &format!("cube{}", index));
    }

    run_frame(&mut scene, &[view]);
    run_frame(&mut scene, &[view]);

    assert_eq!(factory_runs.load(Ordering::SeqCst), 1);
    // One vertex and one index buffer shared by every cube
    assert_eq!(device.live_handle_count(), 2);
    assert_eq!(device.drawn_objects().len(), 20);
}

// ============================================================================
// MANIPULATION TESTS
// ============================================================================

#[test]
fn test_integration_object_added_from_worker_is_drawn_once() {
    let (mut scene, device, view) = scene_with_view();
    let queue = scene.manipulation_queue();

    let worker = thread::spawn(move || {
        queue.enqueue(|m| {
            m.add_object(MeshObject::new("Geometry.Cube"), ObjectState::new("X"));
            Ok(())
        }).wait()
    });
    while !worker.is_finished() {
        run_frame(&mut scene, &[view]);
        thread::sleep(Duration::from_millis(1));
    }
    worker.join().unwrap().unwrap();

    device.take_commands();
    run_frame(&mut scene, &[view]);

    let draws = device.commands().iter()
        .filter(|command| matches!(command, DrawCommand::DrawGeometry { object, .. } if object == "X"))
        .count();
    assert_eq!(draws, 1);
    assert_eq!(scene.object_count(), 1);
}

// ============================================================================
// ANIMATION TESTS
// ============================================================================

#[test]
fn test_integration_scale_animation_interpolates() {
    let mut scene = make_scene();
    let object = scene.manipulate(|m| {
        let object = m.add_object(
            MeshObject::new("Geometry.Cube"),
            ObjectState::new("grow").with_scale(Vec3::splat(0.5)),
        );
        m.start_animation(object, AnimationSequenceBuilder::new()
            .scale_to(Vec3::splat(1.5), Duration::from_secs(1)))?;
        Ok(object)
    }).unwrap();

    scene.update(&frame(500));
    let halfway = scene.object_state(object).unwrap().scale;
    assert!((halfway - Vec3::splat(1.0)).abs().max_element() < 1e-4);

    scene.update(&frame(500));
    let done = scene.object_state(object).unwrap().scale;
    assert!((done - Vec3::splat(1.5)).abs().max_element() < 1e-4);
    assert_eq!(scene.running_animation_count(object), 0);
}

#[test]
fn test_integration_wait_finished_blocks_successor() {
    let mut scene = make_scene();
    let object = scene.manipulate(|m| {
        let object = m.add_object(MeshObject::new("Geometry.Cube"), ObjectState::new("step"));
        m.start_animation(object, AnimationSequenceBuilder::new()
            .scale_to(Vec3::splat(2.0), Duration::from_millis(100))
            .wait_finished()
            .move_to(Vec3::new(1.0, 0.0, 0.0), Duration::from_millis(100)))?;
        Ok(object)
    }).unwrap();

    scene.update(&frame(60));
    assert_eq!(scene.object_state(object).unwrap().position, Vec3::ZERO);

    scene.update(&frame(60));
    let state = scene.object_state(object).unwrap();
    assert!((state.scale - Vec3::splat(2.0)).abs().max_element() < 1e-4);
    assert!(state.position.x > 0.0 && state.position.x < 1.0);

    scene.update(&frame(60));
    assert!((scene.object_state(object).unwrap().position.x - 1.0).abs() < 1e-4);
    assert_eq!(scene.running_animation_count(object), 0);
}
