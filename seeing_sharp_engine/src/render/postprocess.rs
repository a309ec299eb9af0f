/// Postprocess effects.
///
/// A layer with an effect is rendered inside the effect's protocol:
///
/// ```text
/// pass_id = 0
/// loop {
///     effect.notify_before_render(state, pass_id)
///     <render the layer>
///     if !effect.notify_after_render(state, pass_id) { break }
///     pass_id += 1
/// }
/// ```
///
/// Effects are resources: their offscreen targets live on the device and are
/// loaded through the owning `ResourceDictionary`.

use crate::error::Result;
use crate::graphics_device::{DrawCommand, GraphicsDevice, NativeHandle, NativeResourceDesc, NativeResourceKind};
use crate::resource::{HandleSlot, Resource, ResourceDictionary};
use super::render_state::RenderState;

/// Upper bound on layer re-renders for one effect per frame
pub const MAX_POSTPROCESS_PASSES: u32 = 16;

pub trait PostprocessEffect: Send + Sync {
    fn effect_name(&self) -> &str;

    /// Prepare render pass `pass_id` (bind targets, set constants)
    fn notify_before_render(&self, state: &mut RenderState<'_>, pass_id: u32) -> Result<()>;

    /// Finish render pass `pass_id`; `true` requests another pass
    fn notify_after_render(&self, state: &mut RenderState<'_>, pass_id: u32) -> Result<bool>;
}

/// Offscreen color target shared by the effects below
struct EffectTarget {
    label: String,
    width: u32,
    height: u32,
    handle: HandleSlot,
}

impl EffectTarget {
    fn new(label: &str, width: u32, height: u32) -> Self {
        Self { label: label.to_string(), width, height, handle: HandleSlot::new() }
    }

    fn load(&self, device: &dyn GraphicsDevice) -> Result<NativeHandle> {
        let size = self.width as u64 * self.height as u64 * 4;
        let desc = NativeResourceDesc::new(NativeResourceKind::RenderTarget, self.label.clone(), size);
        self.handle.create(device, &desc)
    }
}

// ===== BLUR =====

/// Separable blur applied `passes` times (one layer render per pass)
pub struct BlurEffect {
    name: String,
    passes: u32,
    target: EffectTarget,
}

impl BlurEffect {
    pub fn new(name: impl Into<String>, passes: u32, width: u32, height: u32) -> Self {
        let name = name.into();
        let target = EffectTarget::new(&format!("{}.target", name), width, height);
        Self { name, passes: passes.clamp(1, MAX_POSTPROCESS_PASSES), target }
    }

    pub fn passes(&self) -> u32 {
        self.passes
    }
}

impl Resource for BlurEffect {
    fn load_resource(&self, device: &dyn GraphicsDevice, _resources: &ResourceDictionary) -> Result<()> {
        self.target.load(device)?;
        Ok(())
    }

    fn unload_resource(&self, device: &dyn GraphicsDevice) {
        self.target.handle.release(device);
    }

    fn is_loaded(&self) -> bool {
        self.target.handle.is_some()
    }

    fn resource_type_name(&self) -> &'static str {
        "BlurEffect"
    }

    fn as_postprocess_effect(&self) -> Option<&dyn PostprocessEffect> {
        Some(self)
    }
}

impl PostprocessEffect for BlurEffect {
    fn effect_name(&self) -> &str {
        &self.name
    }

    fn notify_before_render(&self, state: &mut RenderState<'_>, pass_id: u32) -> Result<()> {
        state.submit(DrawCommand::BeginPostprocess { effect: self.name.clone(), pass_id })
    }

    fn notify_after_render(&self, state: &mut RenderState<'_>, pass_id: u32) -> Result<bool> {
        state.submit(DrawCommand::EndPostprocess { effect: self.name.clone(), pass_id })?;
        Ok(pass_id + 1 < self.passes)
    }
}

// ===== GRAYSCALE =====

/// Single-pass desaturation
pub struct GrayscaleEffect {
    name: String,
    target: EffectTarget,
}

impl GrayscaleEffect {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        let name = name.into();
        let target = EffectTarget::new(&format!("{}.target", name), width, height);
        Self { name, target }
    }
}

impl Resource for GrayscaleEffect {
    fn load_resource(&self, device: &dyn GraphicsDevice, _resources: &ResourceDictionary) -> Result<()> {
        self.target.load(device)?;
        Ok(())
    }

    fn unload_resource(&self, device: &dyn GraphicsDevice) {
        self.target.handle.release(device);
    }

    fn is_loaded(&self) -> bool {
        self.target.handle.is_some()
    }

    fn resource_type_name(&self) -> &'static str {
        "GrayscaleEffect"
    }

    fn as_postprocess_effect(&self) -> Option<&dyn PostprocessEffect> {
        Some(self)
    }
}

impl PostprocessEffect for GrayscaleEffect {
    fn effect_name(&self) -> &str {
        &self.name
    }

    fn notify_before_render(&self, state: &mut RenderState<'_>, pass_id: u32) -> Result<()> {
        state.submit(DrawCommand::BeginPostprocess { effect: self.name.clone(), pass_id })
    }

    fn notify_after_render(&self, state: &mut RenderState<'_>, pass_id: u32) -> Result<bool> {
        state.submit(DrawCommand::EndPostprocess { effect: self.name.clone(), pass_id })?;
        Ok(false)
    }
}

#[cfg(test)]
#[path = "postprocess_tests.rs"]
mod tests;
