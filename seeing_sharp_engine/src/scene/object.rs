/// Scene objects.
///
/// An object lives in the scene's slot arena. The slot owns the shared
/// `ObjectState` (transform, visibility, opacity), the type-specific content
/// behind `SceneObject`, attached behaviors and the object's animation queue.
/// Everything else refers to the object through its `ObjectKey`.

use glam::{Mat4, Quat, Vec3};
use rustc_hash::FxHashSet;
use slotmap::new_key_type;

use crate::animation::{Animatable3D, AnimationHandler};
use crate::error::Result;
use crate::graphics_device::DeviceIndex;
use crate::render::{RenderPassInfo, RenderState};
use crate::resource::ResourceDictionary;
use super::behavior::{BehaviorId, SceneObjectBehavior};
use super::layer::LayerKey;
use super::layer_subset::SubscriptionHandle;
use super::update::{OverallUpdateContext, UpdateContext};

new_key_type! {
    /// Stable key for a scene object.
    ///
    /// Keys remain valid even after other objects are removed.
    pub struct ObjectKey;
}

// ===== OBJECT STATE =====

/// Data shared by every kind of scene object
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectState {
    pub name: String,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub visible: bool,
    /// 1.0 is opaque; anything below renders in the transparent pass
    pub opacity: f32,
    pub(crate) layer: LayerKey,
}

impl Default for ObjectState {
    fn default() -> Self {
        Self {
            name: String::new(),
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            visible: true,
            opacity: 1.0,
            layer: LayerKey::default(),
        }
    }
}

impl ObjectState {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Layer the object belongs to
    pub fn layer(&self) -> LayerKey {
        self.layer
    }

    pub fn is_transparent(&self) -> bool {
        self.opacity < 1.0
    }

    /// Scale, then rotation, then translation
    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

impl Animatable3D for ObjectState {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    fn rotation(&self) -> Quat {
        self.rotation
    }

    fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
    }

    fn scale(&self) -> Vec3 {
        self.scale
    }

    fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
    }

    fn opacity(&self) -> f32 {
        self.opacity
    }

    fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity;
    }
}

// ===== SCENE OBJECT TRAIT =====

/// Type-specific part of a scene object (mesh, line list, 2D overlay, ...)
///
/// Resource methods receive the dictionary of one device; an object may be
/// loaded on several devices at once. `render` is only called for passes the
/// object is currently subscribed to, after `load_resources` succeeded on the
/// view's device.
pub trait SceneObject: Send {
    /// Short type label for logs
    fn type_name(&self) -> &'static str;

    /// Load (or create) every resource this object draws with
    fn load_resources(&self, resources: &ResourceDictionary) -> Result<()>;

    /// Release resources private to this object. Shared resources stay.
    fn unload_resources(&self, _resources: &ResourceDictionary) -> Result<()> {
        Ok(())
    }

    /// Whether everything `render` needs is loaded in `resources`
    fn is_loaded(&self, resources: &ResourceDictionary) -> bool;

    /// Passes this object wants to be drawn in, given its current state
    fn render_passes(&self, state: &ObjectState) -> Vec<RenderPassInfo>;

    /// Parallel update phase; only this object's own data is reachable
    fn update(&mut self, _state: &mut ObjectState, _ctx: &UpdateContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Sequential update phase with read access to every other object
    fn update_overall(&mut self, _state: &mut ObjectState, _ctx: &OverallUpdateContext<'_>) -> Result<()> {
        Ok(())
    }

    fn render(&self, state: &ObjectState, pass: &RenderPassInfo, render_state: &mut RenderState<'_>) -> Result<()>;

    /// World-space bounding sphere radius, used for view culling
    fn bounding_radius(&self, _state: &ObjectState) -> Option<f32> {
        None
    }

    /// Screen-space content returns false and bypasses view culling
    fn is_cullable(&self) -> bool {
        true
    }
}

// ===== ARENA SLOT =====

/// Update-time logic of a slot.
///
/// Kept apart from `ObjectState` so the sequential phase can take it out of
/// the arena while the other objects stay readable.
pub(crate) struct ObjectLogic {
    pub(crate) content: Box<dyn SceneObject>,
    pub(crate) behaviors: Vec<(BehaviorId, Box<dyn SceneObjectBehavior>)>,
    pub(crate) animations: AnimationHandler<ObjectState>,
}

impl ObjectLogic {
    pub(crate) fn new(content: Box<dyn SceneObject>) -> Self {
        Self {
            content,
            behaviors: Vec::new(),
            animations: AnimationHandler::new(),
        }
    }

    /// Behaviors first, then queued animations, then the content itself
    pub(crate) fn update(&mut self, state: &mut ObjectState, ctx: &UpdateContext<'_>) -> Result<()> {
        for (_, behavior) in &mut self.behaviors {
            behavior.update(state, ctx)?;
        }
        self.animations.update(state, ctx.elapsed())?;
        self.content.update(state, ctx)
    }

    pub(crate) fn update_overall(&mut self, state: &mut ObjectState, ctx: &OverallUpdateContext<'_>) -> Result<()> {
        for (_, behavior) in &mut self.behaviors {
            behavior.update_overall(state, ctx)?;
        }
        self.content.update_overall(state, ctx)
    }
}

pub(crate) struct ObjectSlot {
    pub(crate) state: ObjectState,
    /// `None` only while the sequential update phase works on this object
    pub(crate) logic: Option<ObjectLogic>,
    /// Devices the content's resources were loaded on
    pub(crate) loaded_on: FxHashSet<DeviceIndex>,
    pub(crate) subscriptions: Vec<SubscriptionHandle>,
}

impl ObjectSlot {
    pub(crate) fn new(state: ObjectState, content: Box<dyn SceneObject>) -> Self {
        Self {
            state,
            logic: Some(ObjectLogic::new(content)),
            loaded_on: FxHashSet::default(),
            subscriptions: Vec::new(),
        }
    }

    pub(crate) fn content(&self) -> Option<&dyn SceneObject> {
        self.logic.as_ref().map(|logic| logic.content.as_ref())
    }
}
