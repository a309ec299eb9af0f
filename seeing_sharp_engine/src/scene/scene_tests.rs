use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use glam::{Vec3, Vec4};

use crate::animation::AnimationSequenceBuilder;
use crate::camera::Viewport;
use crate::graphics_device::MockGraphicsDevice;
use crate::render::{BlurEffect, RenderPassInfo, PASS_PLAIN_RENDER};
use crate::resource::GeometryResource;
use crate::scene::behavior::{FollowObjectBehavior, RotationBehavior};
use crate::scene::object::SceneObject;
use crate::scene::objects::{MeshObject, Overlay2DObject};
use crate::scene::view::FrustumCulling;

// ============================================================================
// Helpers
// ============================================================================

fn make_scene() -> Scene {
    Scene::new(&EngineConfig::default().with_update_worker_threads(2)).unwrap()
}

fn frame(millis: u64) -> UpdateState {
    UpdateState::from_elapsed(Duration::from_millis(millis))
}

/// Scene with one view on a fresh mock device and the unit cube registered
fn scene_with_view() -> (Scene, Arc<MockGraphicsDevice>, ViewKey) {
    let mut scene = make_scene();
    let device = Arc::new(MockGraphicsDevice::new(0, "mock"));
    let view_device = device.clone();
    let view = scene.manipulate(move |m| {
        m.add_resource("Geometry.Cube", || GeometryResource::cube("cube"))?;
        let camera = Camera::new(Viewport::new(800, 600));
        m.register_view(ViewInformation::new("main", camera, view_device))
    }).unwrap();
    (scene, device, view)
}

fn add_mesh(scene: &mut Scene, state: ObjectState) -> ObjectKey {
    scene.manipulate(|m| Ok(m.add_object(MeshObject::new("Geometry.Cube"), state))).unwrap()
}

fn draw_frame(scene: &mut Scene, view: ViewKey) -> RenderStatistics {
    scene.apply_pending_manipulations();
    scene.update(&frame(16));
    scene.prepare_view(view).unwrap();
    scene.render_view(view).unwrap()
}

/// Object that counts its update calls and can be told to fail
struct Probe {
    updates: Arc<AtomicUsize>,
    overall_updates: Arc<AtomicUsize>,
    mode: ProbeMode,
}

#[derive(Clone, Copy, PartialEq)]
enum ProbeMode {
    Healthy,
    Failing,
    Panicking,
}

impl Probe {
    fn new(mode: ProbeMode) -> (Self, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let updates = Arc::new(AtomicUsize::new(0));
        let overall_updates = Arc::new(AtomicUsize::new(0));
        let probe = Self { updates: updates.clone(), overall_updates: overall_updates.clone(), mode };
        (probe, updates, overall_updates)
    }
}

impl SceneObject for Probe {
    fn type_name(&self) -> &'static str {
        "Probe"
    }

    fn load_resources(&self, _resources: &ResourceDictionary) -> Result<()> {
        Ok(())
    }

    fn is_loaded(&self, _resources: &ResourceDictionary) -> bool {
        true
    }

    fn render_passes(&self, _state: &ObjectState) -> Vec<RenderPassInfo> {
        Vec::new()
    }

    fn update(&mut self, state: &mut ObjectState, _ctx: &UpdateContext<'_>) -> Result<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            ProbeMode::Healthy => {
                state.position.x += 1.0;
                Ok(())
            }
            ProbeMode::Failing => Err(Error::ObjectUpdateFailed("probe failure".to_string())),
            ProbeMode::Panicking => panic!("probe panic"),
        }
    }

    fn update_overall(&mut self, _state: &mut ObjectState, _ctx: &OverallUpdateContext<'_>) -> Result<()> {
        self.overall_updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn render(&self, _state: &ObjectState, _pass: &RenderPassInfo, _render_state: &mut RenderState<'_>) -> Result<()> {
        Ok(())
    }
}

/// Records the names it can see during the sequential phase
struct Observer {
    seen: Arc<std::sync::Mutex<Vec<String>>>,
}

impl SceneObject for Observer {
    fn type_name(&self) -> &'static str {
        "Observer"
    }

    fn load_resources(&self, _resources: &ResourceDictionary) -> Result<()> {
        Ok(())
    }

    fn is_loaded(&self, _resources: &ResourceDictionary) -> bool {
        true
    }

    fn render_passes(&self, _state: &ObjectState) -> Vec<RenderPassInfo> {
        Vec::new()
    }

    fn update_overall(&mut self, state: &mut ObjectState, ctx: &OverallUpdateContext<'_>) -> Result<()> {
        let mut seen = self.seen.lock().unwrap();
        seen.push(state.name.clone());
        seen.extend(ctx.other_objects().map(|(_, other)| other.name.clone()));
        Ok(())
    }

    fn render(&self, _state: &ObjectState, _pass: &RenderPassInfo, _render_state: &mut RenderState<'_>) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_new_scene_has_default_layer() {
    let scene = make_scene();

    assert_eq!(scene.layer_count(), 1);
    assert_eq!(scene.layer(scene.default_layer()).unwrap().name(), "Default");
    assert_eq!(scene.object_count(), 0);
    assert_eq!(scene.update_thread_count(), 2);
}

#[test]
fn test_custom_default_layer_name() {
    let scene = Scene::new(&EngineConfig::default().with_default_layer_name("World")).unwrap();
    assert_eq!(scene.layer_key("World"), Some(scene.default_layer()));
}

// ============================================================================
// Update
// ============================================================================

#[test]
fn test_update_runs_both_phases_for_every_object() {
    let mut scene = make_scene();
    let mut counters = Vec::new();
    for i in 0..8 {
        let (probe, updates, overall) = Probe::new(ProbeMode::Healthy);
        scene.manipulate(|m| Ok(m.add_object(probe, ObjectState::new(format!("probe{}", i))))).unwrap();
        counters.push((updates, overall));
    }

    let statistics = scene.update(&frame(16));

    assert_eq!(statistics.updated_objects, 8);
    assert_eq!(statistics.overall_updates, 8);
    assert!(!statistics.has_failures());
    for (updates, overall) in &counters {
        assert_eq!(updates.load(Ordering::SeqCst), 1);
        assert_eq!(overall.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn test_failing_object_does_not_stop_others() {
    let mut scene = make_scene();
    let (failing, _, _) = Probe::new(ProbeMode::Failing);
    let (healthy, _, _) = Probe::new(ProbeMode::Healthy);
    let healthy_key = scene.manipulate(|m| {
        m.add_object(failing, ObjectState::new("failing"));
        Ok(m.add_object(healthy, ObjectState::new("healthy")))
    }).unwrap();

    let statistics = scene.update(&frame(16));

    assert_eq!(statistics.failed_objects, 1);
    assert_eq!(statistics.updated_objects, 1);
    assert_eq!(scene.object_state(healthy_key).unwrap().position.x, 1.0);
}

#[test]
fn test_panicking_object_is_isolated() {
    let mut scene = make_scene();
    let (panicking, _, _) = Probe::new(ProbeMode::Panicking);
    let (healthy, updates, _) = Probe::new(ProbeMode::Healthy);
    let panicking_key = scene.manipulate(|m| {
        m.add_object(healthy, ObjectState::new("healthy"));
        Ok(m.add_object(panicking, ObjectState::new("panicking")))
    }).unwrap();

    let statistics = scene.update(&frame(16));

    assert_eq!(statistics.panicked_objects, 1);
    assert_eq!(updates.load(Ordering::SeqCst), 1);
    // The object survives and keeps updating next frame
    assert!(scene.contains_object(panicking_key));
    assert_eq!(scene.update(&frame(16)).panicked_objects, 1);
}

#[test]
fn test_overall_phase_sees_other_objects() {
    let mut scene = make_scene();
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let observer = Observer { seen: seen.clone() };
    scene.manipulate(move |m| {
        let front = m.add_layer("front")?;
        m.add_object_to_layer(front, observer, ObjectState::new("observer"))?;
        m.add_object(Overlay2DObject::new(Vec4::ONE, Vec4::ONE), ObjectState::new("hud"));
        Ok(())
    }).unwrap();

    scene.update(&frame(16));

    assert_eq!(*seen.lock().unwrap(), vec!["observer".to_string(), "hud".to_string()]);
}

#[test]
fn test_follow_behavior_uses_target_after_parallel_phase() {
    let mut scene = make_scene();
    let (mover, _, _) = Probe::new(ProbeMode::Healthy);
    let (target, follower) = scene.manipulate(|m| {
        let target = m.add_object(mover, ObjectState::new("target"));
        let follower = m.add_object(Overlay2DObject::new(Vec4::ONE, Vec4::ONE), ObjectState::new("follower"));
        m.attach_behavior(follower, FollowObjectBehavior::new(target, Vec3::new(0.0, 2.0, 0.0)))?;
        Ok((target, follower))
    }).unwrap();

    scene.update(&frame(16));

    assert_eq!(scene.object_state(target).unwrap().position, Vec3::new(1.0, 0.0, 0.0));
    assert_eq!(scene.object_state(follower).unwrap().position, Vec3::new(1.0, 2.0, 0.0));
}

#[test]
fn test_rotation_behavior_spins_host() {
    let mut scene = make_scene();
    let object = scene.manipulate(|m| {
        let object = m.add_object(Overlay2DObject::new(Vec4::ONE, Vec4::ONE), ObjectState::new("spinner"));
        m.attach_behavior(object, RotationBehavior::new(Vec3::Y, std::f32::consts::PI)?)?;
        Ok(object)
    }).unwrap();

    scene.update(&frame(500));

    let rotation = scene.object_state(object).unwrap().rotation;
    let (axis, angle) = rotation.to_axis_angle();
    assert!((angle - std::f32::consts::FRAC_PI_2).abs() < 1e-4);
    assert!((axis - Vec3::Y).length() < 1e-4);
}

#[test]
fn test_animation_advances_with_update() {
    let mut scene = make_scene();
    let object = scene.manipulate(|m| {
        let object = m.add_object(Overlay2DObject::new(Vec4::ONE, Vec4::ONE), ObjectState::new("box"));
        m.start_animation(object, AnimationSequenceBuilder::new()
            .move_to(Vec3::new(4.0, 0.0, 0.0), Duration::from_secs(1)))?;
        Ok(object)
    }).unwrap();

    scene.update(&frame(500));
    assert!((scene.object_state(object).unwrap().position.x - 2.0).abs() < 1e-4);

    scene.update(&frame(500));
    assert!((scene.object_state(object).unwrap().position.x - 4.0).abs() < 1e-4);
    assert_eq!(scene.running_animation_count(object), 0);
}

// ============================================================================
// Prepare
// ============================================================================

#[test]
fn test_prepare_loads_and_subscribes_visible_objects() {
    let (mut scene, device, view) = scene_with_view();
    let object = add_mesh(&mut scene, ObjectState::new("box"));

    let statistics = scene.prepare_view(view).unwrap();

    assert_eq!(statistics.loaded_objects, 1);
    assert_eq!(statistics.subscribed, 1);
    assert!(scene.is_object_loaded_on(object, 0));
    let subset = scene.subset(scene.default_layer(), view).unwrap();
    assert_eq!(subset.pass_subscription_count(PASS_PLAIN_RENDER.id), 1);
    assert!(device.live_handle_count() > 0);
}

#[test]
fn test_prepare_is_stable_across_frames() {
    let (mut scene, _device, view) = scene_with_view();
    add_mesh(&mut scene, ObjectState::new("box"));
    scene.prepare_view(view).unwrap();

    let statistics = scene.prepare_view(view).unwrap();

    assert_eq!(statistics, PrepareStatistics::default());
}

#[test]
fn test_hidden_objects_are_unsubscribed() {
    let (mut scene, device, view) = scene_with_view();
    let object = add_mesh(&mut scene, ObjectState::new("box"));
    scene.prepare_view(view).unwrap();

    scene.manipulate(|m| {
        if let Some(state) = m.object_state_mut(object) {
            state.visible = false;
        }
        Ok(())
    }).unwrap();
    let statistics = scene.prepare_view(view).unwrap();

    assert_eq!(statistics.unsubscribed, 1);
    assert!(scene.object_subscriptions(object).is_empty());
    scene.render_view(view).unwrap();
    assert!(device.drawn_objects().is_empty());
}

#[test]
fn test_opacity_change_moves_object_to_transparent_pass() {
    let (mut scene, device, view) = scene_with_view();
    let object = add_mesh(&mut scene, ObjectState::new("box"));
    scene.prepare_view(view).unwrap();

    scene.manipulate(|m| {
        if let Some(state) = m.object_state_mut(object) {
            state.opacity = 0.5;
        }
        Ok(())
    }).unwrap();
    let statistics = scene.prepare_view(view).unwrap();

    assert_eq!(statistics.unsubscribed, 1);
    assert_eq!(statistics.subscribed, 1);
    let handles = scene.object_subscriptions(object);
    assert_eq!(handles.len(), 1);
    assert_eq!(handles[0].pass_id(), crate::render::PASS_TRANSPARENT_RENDER.id);

    scene.render_view(view).unwrap();
    assert_eq!(device.drawn_objects(), vec!["box".to_string()]);
}

#[test]
fn test_load_failure_skips_object_for_frame() {
    let (mut scene, device, view) = scene_with_view();
    device.fail_creation_labeled("cube.vertices");
    add_mesh(&mut scene, ObjectState::new("broken"));
    scene.manipulate(|m| {
        m.add_object(Overlay2DObject::new(Vec4::ONE, Vec4::ONE), ObjectState::new("hud"));
        Ok(())
    }).unwrap();

    let statistics = scene.prepare_view(view).unwrap();
    scene.render_view(view).unwrap();

    assert_eq!(statistics.load_failures, 1);
    assert_eq!(device.drawn_objects(), vec!["hud".to_string()]);

    device.clear_failures();
    device.take_commands();
    scene.prepare_view(view).unwrap();
    scene.render_view(view).unwrap();
    assert_eq!(device.drawn_objects(), vec!["broken".to_string(), "hud".to_string()]);
}

#[test]
fn test_frustum_culling_skips_objects_behind_camera() {
    let mut scene = make_scene();
    let device = Arc::new(MockGraphicsDevice::new(0, "mock"));
    let view_device = device.clone();
    let view = scene.manipulate(move |m| {
        m.add_resource("Geometry.Cube", || GeometryResource::cube("cube"))?;
        let camera = Camera::new(Viewport::new(800, 600));
        m.register_view(ViewInformation::new("main", camera, view_device).with_culler(FrustumCulling))
    }).unwrap();
    add_mesh(&mut scene, ObjectState::new("front"));
    add_mesh(&mut scene, ObjectState::new("behind").with_position(Vec3::new(0.0, 0.0, 50.0)));

    scene.prepare_view(view).unwrap();
    scene.render_view(view).unwrap();

    assert_eq!(device.drawn_objects(), vec!["front".to_string()]);
}

#[test]
fn test_prepare_unknown_view_fails() {
    let (mut scene, _device, view) = scene_with_view();
    scene.manipulate(|m| m.deregister_view(view)).unwrap();

    assert!(matches!(scene.prepare_view(view), Err(Error::InvalidResource(_))));
    assert!(matches!(scene.render_view(view), Err(Error::InvalidResource(_))));
}

// ============================================================================
// Render
// ============================================================================

#[test]
fn test_render_emits_view_layer_and_pass_brackets() {
    let (mut scene, device, view) = scene_with_view();
    add_mesh(&mut scene, ObjectState::new("box"));

    let statistics = draw_frame(&mut scene, view);

    assert_eq!(statistics.layers, 1);
    assert_eq!(statistics.passes, 1);
    assert_eq!(statistics.draw_calls, 1);
    let commands = device.commands();
    assert_eq!(commands.first(), Some(&DrawCommand::BeginView { view: "main".to_string() }));
    assert_eq!(commands[1], DrawCommand::BeginLayer { layer: "Default".to_string() });
    assert_eq!(commands[2], DrawCommand::BeginPass { pass: "PlainRender" });
    assert!(matches!(commands[3], DrawCommand::DrawGeometry { .. }));
    assert_eq!(commands[4], DrawCommand::EndPass { pass: "PlainRender" });
    assert_eq!(commands[5], DrawCommand::EndLayer);
    assert_eq!(commands.last(), Some(&DrawCommand::Present { view: "main".to_string() }));
}

#[test]
fn test_passes_render_in_pass_order() {
    let (mut scene, device, view) = scene_with_view();
    scene.manipulate(|m| {
        m.add_object(Overlay2DObject::new(Vec4::ONE, Vec4::ONE), ObjectState::new("hud"));
        m.add_object(MeshObject::new("Geometry.Cube"), ObjectState::new("glass").with_opacity(0.5));
        m.add_object(MeshObject::new("Geometry.Cube"), ObjectState::new("box"));
        Ok(())
    }).unwrap();

    draw_frame(&mut scene, view);

    assert_eq!(device.drawn_objects(), vec!["box".to_string(), "glass".to_string(), "hud".to_string()]);
}

#[test]
fn test_transparent_pass_draws_back_to_front() {
    let (mut scene, device, view) = scene_with_view();
    // Camera sits at z = 10 looking at the origin
    add_mesh(&mut scene, ObjectState::new("near").with_opacity(0.5).with_position(Vec3::new(0.0, 0.0, 5.0)));
    add_mesh(&mut scene, ObjectState::new("far").with_opacity(0.5).with_position(Vec3::new(0.0, 0.0, -20.0)));
    add_mesh(&mut scene, ObjectState::new("middle").with_opacity(0.5));

    draw_frame(&mut scene, view);

    assert_eq!(device.drawn_objects(), vec!["far".to_string(), "middle".to_string(), "near".to_string()]);
}

#[test]
fn test_layers_render_in_order_id_order() {
    let (mut scene, device, view) = scene_with_view();
    scene.manipulate(|m| {
        let overlay = m.add_layer("overlay")?;
        let background = m.add_layer("background")?;
        m.set_layer_order_id(background, -10)?;
        m.set_layer_flags(overlay, LayerFlags::CLEAR_DEPTH)?;
        m.add_object_to_layer(overlay, MeshObject::new("Geometry.Cube"), ObjectState::new("top"))?;
        m.add_object_to_layer(background, MeshObject::new("Geometry.Cube"), ObjectState::new("sky"))?;
        m.add_object(MeshObject::new("Geometry.Cube"), ObjectState::new("world"));
        Ok(())
    }).unwrap();

    let statistics = draw_frame(&mut scene, view);

    assert_eq!(statistics.layers, 3);
    assert_eq!(device.drawn_objects(), vec!["sky".to_string(), "world".to_string(), "top".to_string()]);
    let commands = device.commands();
    let overlay_start = commands.iter()
        .position(|c| *c == DrawCommand::BeginLayer { layer: "overlay".to_string() })
        .unwrap();
    assert_eq!(commands[overlay_start + 1], DrawCommand::ClearDepth);
}

#[test]
fn test_postprocess_effect_renders_layer_per_pass() {
    let (mut scene, device, view) = scene_with_view();
    scene.manipulate(|m| {
        let blurred = m.add_layer("blurred")?;
        let effect = m.add_resource("Effect.Blur", || Ok(BlurEffect::new("blur", 3, 256, 256)))?;
        m.set_layer_postprocess_effect(blurred, Some(effect))?;
        m.add_object_to_layer(blurred, MeshObject::new("Geometry.Cube"), ObjectState::new("ghost"))?;
        Ok(())
    }).unwrap();

    let statistics = draw_frame(&mut scene, view);

    assert_eq!(statistics.postprocess_passes, 3);
    assert_eq!(device.drawn_objects(), vec!["ghost".to_string(); 3]);
    let begins: Vec<u32> = device.commands().iter()
        .filter_map(|c| match c {
            DrawCommand::BeginPostprocess { pass_id, .. } => Some(*pass_id),
            _ => None,
        })
        .collect();
    assert_eq!(begins, vec![0, 1, 2]);
}

#[test]
fn test_missing_effect_renders_layer_plainly() {
    let (mut scene, device, view) = scene_with_view();
    scene.manipulate(|m| {
        let layer = m.add_layer("fx")?;
        m.set_layer_postprocess_effect(layer, Some(ResourceKey::from("Effect.Missing")))?;
        m.add_object_to_layer(layer, MeshObject::new("Geometry.Cube"), ObjectState::new("box"))?;
        Ok(())
    }).unwrap();

    let statistics = draw_frame(&mut scene, view);

    assert_eq!(statistics.postprocess_passes, 0);
    assert_eq!(device.drawn_objects(), vec!["box".to_string()]);
}

#[test]
fn test_render_phase_blocks_dictionary_mutation() {
    let (mut scene, _device, view) = scene_with_view();
    add_mesh(&mut scene, ObjectState::new("box"));
    scene.prepare_view(view).unwrap();

    let dictionary = scene.resources(0).unwrap().clone();
    {
        let _guard = dictionary.begin_render_phase();
        let result = dictionary.remove_resource(&ResourceKey::from("Geometry.Cube"));
        assert!(matches!(result, Err(Error::ConcurrentMutationViolation(_))));
    }
    scene.render_view(view).unwrap();
    assert!(!dictionary.is_rendering());
}

#[test]
fn test_objects_added_after_barrier_draw_next_frame() {
    let (mut scene, device, view) = scene_with_view();
    let ticket = scene.manipulate_scene_async(|m| {
        m.add_object(MeshObject::new("Geometry.Cube"), ObjectState::new("late"));
        Ok(())
    });

    draw_frame(&mut scene, view);

    assert_eq!(ticket.wait(), Ok(()));
    assert_eq!(device.drawn_objects(), vec!["late".to_string()]);
}

// ============================================================================
// Device loss
// ============================================================================

#[test]
fn test_lost_device_fails_frame_and_recovers() {
    let (mut scene, device, view) = scene_with_view();
    let object = add_mesh(&mut scene, ObjectState::new("box"));
    draw_frame(&mut scene, view);

    device.set_lost(true);
    assert!(matches!(scene.prepare_view(view), Err(Error::DeviceLost(_))));
    assert!(matches!(scene.render_view(view), Err(Error::DeviceLost(_))));

    scene.unload_device_resources(0).unwrap();
    assert!(!scene.is_object_loaded_on(object, 0));
    assert_eq!(scene.resources(0).unwrap().loaded_resource_count(), 0);

    device.set_lost(false);
    device.take_commands();
    scene.reload_device_resources(0).unwrap();
    draw_frame(&mut scene, view);

    assert!(scene.is_object_loaded_on(object, 0));
    assert_eq!(device.drawn_objects(), vec!["box".to_string()]);
}

#[test]
fn test_unsubscribe_through_scene_is_lenient() {
    let (mut scene, _device, view) = scene_with_view();
    let object = add_mesh(&mut scene, ObjectState::new("box"));
    scene.prepare_view(view).unwrap();
    let handle = scene.object_subscriptions(object)[0];

    assert!(scene.unsubscribe(handle).unwrap());
    assert!(!scene.unsubscribe(handle).unwrap());
}
