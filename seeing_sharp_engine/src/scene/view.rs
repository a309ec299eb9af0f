/// Views: one output target with its own camera and device.
///
/// Every (layer, view) pair gets its own subscription subset, so the same
/// object can be visible in one view and culled in another.

use std::sync::Arc;
use glam::Vec3;
use slotmap::new_key_type;

use crate::camera::Camera;
use crate::engine::Engine;
use crate::error::Result;
use crate::graphics_device::{DeviceIndex, GraphicsDevice};

new_key_type! {
    /// Stable key for a registered view
    pub struct ViewKey;
}

// ===== VISIBILITY CULLING =====

/// Strategy deciding whether an object is drawn in a view.
///
/// Queried while the view is prepared; culled objects are unsubscribed from
/// the view's passes until they become visible again.
pub trait VisibilityCuller: Send + Sync {
    /// `radius` is the object's world-space bounding radius, if known
    fn is_visible(&self, camera: &Camera, position: Vec3, radius: Option<f32>) -> bool;
}

/// Draws every visible object
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCulling;

impl VisibilityCuller for NoCulling {
    fn is_visible(&self, _camera: &Camera, _position: Vec3, _radius: Option<f32>) -> bool {
        true
    }
}

/// Bounding-sphere test against the camera frustum.
///
/// Objects without a bounding radius are tested as points.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrustumCulling;

impl VisibilityCuller for FrustumCulling {
    fn is_visible(&self, camera: &Camera, position: Vec3, radius: Option<f32>) -> bool {
        let frustum = camera.frustum();
        match radius {
            Some(radius) => frustum.intersects_sphere(position, radius),
            None => frustum.contains_point(position),
        }
    }
}

// ===== VIEW INFORMATION =====

pub struct ViewInformation {
    name: String,
    camera: Camera,
    device: Arc<dyn GraphicsDevice>,
    culler: Box<dyn VisibilityCuller>,
}

impl ViewInformation {
    pub fn new(name: impl Into<String>, camera: Camera, device: Arc<dyn GraphicsDevice>) -> Self {
        Self {
            name: name.into(),
            camera,
            device,
            culler: Box::new(NoCulling),
        }
    }

    /// View on a device registered with `Engine::register_device`
    ///
    /// # Errors
    ///
    /// `DeviceUnavailable` if no device uses `device_index`.
    pub fn on_registered_device(name: impl Into<String>, camera: Camera, device_index: DeviceIndex) -> Result<Self> {
        Ok(Self::new(name, camera, Engine::device(device_index)?))
    }

    pub fn with_culler(mut self, culler: impl VisibilityCuller + 'static) -> Self {
        self.culler = Box::new(culler);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn device_index(&self) -> DeviceIndex {
        self.device.device_index()
    }

    pub fn culler(&self) -> &dyn VisibilityCuller {
        self.culler.as_ref()
    }
}
