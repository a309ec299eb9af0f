//! Render module
//!
//! Pass descriptors, the per-view render state, the postprocess effect
//! protocol and the render loop that drives one view per frame.

mod postprocess;
mod render_loop;
mod render_pass;
mod render_state;

pub use postprocess::{BlurEffect, GrayscaleEffect, PostprocessEffect, MAX_POSTPROCESS_PASSES};
pub use render_loop::RenderLoop;
pub use render_pass::{
    PassSorting, RenderPassInfo, DEFAULT_RENDER_PASSES,
    PASS_2D_OVERLAY, PASS_LINE_RENDER, PASS_PLAIN_RENDER, PASS_TRANSPARENT_RENDER,
};
pub use render_state::RenderState;
