//! Camera module: view camera, viewport and frustum.

mod camera;
mod frustum;

pub use camera::{Camera, Projection, Viewport};
pub use frustum::{
    Frustum,
    PLANE_LEFT, PLANE_RIGHT, PLANE_BOTTOM, PLANE_TOP, PLANE_NEAR, PLANE_FAR,
};
