/// Scene: object arena, layers, views and the per-frame pipeline.
///
/// Frame sequence driven by the main loop:
///
/// 1. `apply_pending_manipulations` - the frame barrier; queued structural
///    changes run here and their tickets complete
/// 2. `update` - parallel per-object update, then sequential overall update
/// 3. `prepare_view` - lazy resource loading and pass (un)subscription
/// 4. `render_view` - traversal of the view's layer subsets
///
/// Objects live in a `SlotMap` and are referred to by `ObjectKey` everywhere
/// else (layers, subscriptions, behaviors).

use std::any::Any;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use crate::camera::Camera;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::{engine_debug, engine_err, engine_error, engine_trace, engine_warn};
use crate::graphics_device::{ensure_device_available, DeviceIndex, DrawCommand};
use crate::render::{PassSorting, PostprocessEffect, RenderState, MAX_POSTPROCESS_PASSES};
use crate::resource::{ResourceDictionary, ResourceKey};
use super::layer::{LayerFlags, LayerKey, SceneLayer};
use super::layer_subset::{RenderPassSubscription, SubscriptionHandle, SubsetKey, ViewRelatedSceneLayerSubset};
use super::manipulation::{ManipulationTicket, SceneManipulationQueue, SceneManipulator};
use super::object::{ObjectKey, ObjectSlot, ObjectState};
use super::update::{OverallUpdateContext, UpdateContext, UpdateState, UpdateStatistics};
use super::view::{ViewInformation, ViewKey};

const SOURCE: &str = "seeing_sharp::Scene";

/// Adds one registered resource to a device dictionary
pub(crate) type ResourceRegistration = dyn Fn(&ResourceKey, &ResourceDictionary) -> Result<()> + Send + Sync;

/// Outcome of one `Scene::prepare_view`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrepareStatistics {
    pub loaded_objects: usize,
    pub load_failures: usize,
    pub subscribed: usize,
    pub unsubscribed: usize,
}

/// Outcome of one `Scene::render_view`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStatistics {
    pub layers: usize,
    pub passes: usize,
    pub draw_calls: u32,
    /// Objects whose render call failed and was skipped
    pub skipped_objects: usize,
    pub postprocess_passes: u32,
}

enum UpdateFailure {
    Failed { object: String, error: Error },
    Panicked { object: String, message: String },
}

pub struct Scene {
    pub(super) objects: SlotMap<ObjectKey, ObjectSlot>,
    pub(super) layers: SlotMap<LayerKey, SceneLayer>,
    pub(super) default_layer: LayerKey,
    pub(super) next_layer_index: u64,
    pub(super) views: SlotMap<ViewKey, ViewInformation>,
    pub(super) subsets: FxHashMap<SubsetKey, ViewRelatedSceneLayerSubset>,
    /// One dictionary per device some view renders to
    pub(super) dictionaries: FxHashMap<DeviceIndex, Arc<ResourceDictionary>>,
    /// Registered resources, replayed into every new device dictionary
    pub(super) registrations: Vec<(ResourceKey, Arc<ResourceRegistration>)>,
    manipulation_queue: SceneManipulationQueue,
    thread_pool: rayon::ThreadPool,
    isolate_update_panics: bool,
}

impl Scene {
    /// Create an empty scene with its default layer and update thread pool
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.update_worker_threads.unwrap_or(0))
            .thread_name(|index| format!("seeing-sharp-update-{}", index))
            .build()
            .map_err(|err| engine_err!(SOURCE, InitializationFailed,
                "Failed to build the update thread pool: {}", err))?;

        let mut layers = SlotMap::with_key();
        let default_layer = layers.insert(SceneLayer::new(config.default_layer_name.clone(), 0, 0));

        engine_debug!(SOURCE, "Scene created ({} update threads)", thread_pool.current_num_threads());

        Ok(Self {
            objects: SlotMap::with_key(),
            layers,
            default_layer,
            next_layer_index: 1,
            views: SlotMap::with_key(),
            subsets: FxHashMap::default(),
            dictionaries: FxHashMap::default(),
            registrations: Vec::new(),
            manipulation_queue: SceneManipulationQueue::new(),
            thread_pool,
            isolate_update_panics: config.isolate_update_panics,
        })
    }

    // ===== MANIPULATION =====

    /// Queue a structural change for the next frame barrier
    pub fn manipulate_scene_async<F>(&self, action: F) -> ManipulationTicket
    where
        F: for<'s> FnOnce(&mut SceneManipulator<'s>) -> Result<()> + Send + 'static,
    {
        self.manipulation_queue.enqueue(action)
    }

    /// Queue handle that can be moved to other threads
    pub fn manipulation_queue(&self) -> SceneManipulationQueue {
        self.manipulation_queue.clone()
    }

    /// Frame barrier: run every queued manipulation, then complete their
    /// tickets. Returns how many ran.
    pub fn apply_pending_manipulations(&mut self) -> usize {
        let pending = self.manipulation_queue.take_pending();
        if pending.is_empty() {
            return 0;
        }

        let count = pending.len();
        let mut completions = Vec::with_capacity(count);
        {
            let mut manipulator = SceneManipulator::new(self);
            for manipulation in pending {
                let (completion, result) = manipulation.run(&mut manipulator);
                if let Err(err) = &result {
                    engine_warn!(SOURCE, "Scene manipulation failed: {}", err);
                }
                completions.push((completion, result));
            }
        }
        for (completion, result) in completions {
            // Dropped tickets are fine
            let _ = completion.send(result);
        }

        engine_trace!(SOURCE, "Applied {} scene manipulations", count);
        count
    }

    /// Run a manipulation right away. Holding `&mut Scene` means no update or
    /// render is in progress, so this is a barrier too. Queued manipulations
    /// run first.
    pub fn manipulate<R>(&mut self, action: impl FnOnce(&mut SceneManipulator<'_>) -> Result<R>) -> Result<R> {
        self.apply_pending_manipulations();
        let mut manipulator = SceneManipulator::new(self);
        action(&mut manipulator)
    }

    // ===== UPDATE =====

    /// Two-phase update.
    ///
    /// Phase one updates every object in parallel on the scene's thread pool;
    /// an object only reaches its own slot. Phase two calls `update_overall`
    /// sequentially in layer order, then insertion order, with read access to
    /// every other object. Errors and panics of one object are logged and
    /// counted; the others still update.
    pub fn update(&mut self, update_state: &UpdateState) -> UpdateStatistics {
        let mut statistics = UpdateStatistics::default();
        let isolate = self.isolate_update_panics;
        let queue = &self.manipulation_queue;

        let mut slots: Vec<(ObjectKey, &mut ObjectSlot)> = self.objects.iter_mut().collect();
        let object_count = slots.len();
        let failures: Vec<UpdateFailure> = self.thread_pool.install(|| {
            slots
                .par_iter_mut()
                .filter_map(|(key, slot)| update_object(*key, slot, update_state, queue, isolate))
                .collect()
        });
        statistics.updated_objects = object_count - failures.len();
        for failure in failures {
            record_failure(&mut statistics, failure);
        }

        for key in self.overall_update_order() {
            let taken = self.objects.get_mut(key).and_then(|slot| {
                let logic = slot.logic.take()?;
                Some((mem::take(&mut slot.state), logic))
            });
            let (mut state, mut logic) = match taken {
                Some(taken) => taken,
                None => continue,
            };

            let outcome = {
                let ctx = OverallUpdateContext::new(update_state, key, &self.objects, &self.manipulation_queue);
                run_isolated(isolate, || logic.update_overall(&mut state, &ctx))
            };
            statistics.overall_updates += 1;
            if let Some(failure) = failure_of(outcome, &state.name) {
                record_failure(&mut statistics, failure);
            }

            if let Some(slot) = self.objects.get_mut(key) {
                slot.state = state;
                slot.logic = Some(logic);
            }
        }

        statistics
    }

    fn overall_update_order(&self) -> Vec<ObjectKey> {
        self.layers_in_render_order()
            .into_iter()
            .filter_map(|layer| self.layers.get(layer))
            .flat_map(|layer| layer.objects().iter().copied())
            .collect()
    }

    // ===== VIEW PREPARATION =====

    /// Bring one view's subsets up to date.
    ///
    /// Flushes resources marked for unloading, loads the resources of every
    /// visible object on the view's device (a failure skips the object for
    /// this frame), subscribes visible loaded objects to the passes they ask
    /// for and unsubscribes everything else.
    pub fn prepare_view(&mut self, view_key: ViewKey) -> Result<PrepareStatistics> {
        let view = self.views.get(view_key)
            .ok_or_else(|| engine_err!(SOURCE, InvalidResource, "View {:?} is not registered", view_key))?;
        let device_index = view.device_index();
        let dictionary = self.dictionaries.get(&device_index).cloned()
            .ok_or_else(|| engine_err!(SOURCE, InvalidResource,
                "No resource dictionary for device {}", device_index))?;
        ensure_device_available(view.device().as_ref())?;
        dictionary.unload_marked_resources()?;

        let mut statistics = PrepareStatistics::default();
        for (layer_key, layer) in &self.layers {
            let subset_key = SubsetKey { layer: layer_key, view: view_key };
            let subset = self.subsets
                .entry(subset_key)
                .or_insert_with(|| ViewRelatedSceneLayerSubset::new(subset_key));

            if let Some(effect) = layer.postprocess_effect() {
                if let Err(err) = dictionary.ensure_loaded(effect) {
                    if is_fatal(&err) {
                        return Err(err);
                    }
                    engine_warn!(SOURCE, "Postprocess effect {} of layer '{}' unavailable: {}",
                        effect, layer.name(), err);
                }
            }

            for &object_key in layer.objects() {
                let slot = match self.objects.get_mut(object_key) {
                    Some(slot) => slot,
                    None => continue,
                };
                let content = match slot.logic.as_ref() {
                    Some(logic) => logic.content.as_ref(),
                    None => continue,
                };

                let mut loaded = content.is_loaded(&dictionary);
                if !loaded && slot.state.visible {
                    match content.load_resources(&dictionary) {
                        Ok(()) => {
                            loaded = true;
                            statistics.loaded_objects += 1;
                        }
                        Err(err) if is_fatal(&err) => return Err(err),
                        Err(err) => {
                            statistics.load_failures += 1;
                            engine_warn!(SOURCE, "Skipping {} '{}' in view '{}': {}",
                                content.type_name(), slot.state.name, view.name(), err);
                        }
                    }
                }

                if loaded {
                    slot.loaded_on.insert(device_index);
                }
                let visible = loaded
                    && slot.state.visible
                    && (!content.is_cullable()
                        || view.culler().is_visible(
                            view.camera(),
                            slot.state.position,
                            content.bounding_radius(&slot.state),
                        ));
                let wanted = if visible { content.render_passes(&slot.state) } else { Vec::new() };

                let mut present = Vec::new();
                slot.subscriptions.retain(|handle| {
                    if handle.subset() != subset_key {
                        return true;
                    }
                    let still_wanted = wanted.iter().any(|pass| pass.id == handle.pass_id());
                    if still_wanted && subset.is_subscribed(*handle) {
                        present.push(handle.pass_id());
                        return true;
                    }
                    if subset.unsubscribe(*handle) {
                        statistics.unsubscribed += 1;
                    }
                    false
                });
                for pass in wanted.iter().filter(|pass| !present.contains(&pass.id)) {
                    let handle = subset.subscribe_to_pass(pass, object_key)?;
                    slot.subscriptions.push(handle);
                    statistics.subscribed += 1;
                }
            }
        }

        Ok(statistics)
    }

    // ===== RENDERING =====

    /// Draw one view.
    ///
    /// Layers in order id order, passes in pass order, subscriptions in index
    /// order (back to front for depth sorted passes). The view's resource
    /// dictionary is in its render phase for the whole call: resources can be
    /// read but not added, removed or unloaded.
    pub fn render_view(&self, view_key: ViewKey) -> Result<RenderStatistics> {
        let view = self.views.get(view_key)
            .ok_or_else(|| engine_err!(SOURCE, InvalidResource, "View {:?} is not registered", view_key))?;
        let dictionary = self.dictionaries.get(&view.device_index())
            .ok_or_else(|| engine_err!(SOURCE, InvalidResource,
                "No resource dictionary for device {}", view.device_index()))?;
        ensure_device_available(view.device().as_ref())?;

        let _render_phase = dictionary.begin_render_phase();
        let mut render_state = RenderState::new(view.device().as_ref(), dictionary, view.camera(), view.name());
        let mut statistics = RenderStatistics::default();

        render_state.submit(DrawCommand::BeginView { view: view.name().to_string() })?;
        for layer_key in self.layers_in_render_order() {
            let layer = match self.layers.get(layer_key) {
                Some(layer) => layer,
                None => continue,
            };
            let subset = match self.subsets.get(&SubsetKey { layer: layer_key, view: view_key }) {
                Some(subset) => subset,
                None => continue,
            };

            render_state.submit(DrawCommand::BeginLayer { layer: layer.name().to_string() })?;
            if layer.flags().contains(LayerFlags::CLEAR_DEPTH) {
                render_state.submit(DrawCommand::ClearDepth)?;
            }

            let effect_resource = layer.postprocess_effect()
                .and_then(|key| dictionary.resource(key))
                .filter(|resource| resource.is_loaded());
            match effect_resource.as_deref().and_then(|resource| resource.as_postprocess_effect()) {
                Some(effect) => {
                    self.render_layer_with_effect(effect, subset, &mut render_state, &mut statistics)?;
                }
                None => {
                    if let Some(key) = layer.postprocess_effect() {
                        engine_warn!(SOURCE, "Postprocess effect {} of layer '{}' is not a loaded effect, rendering without it",
                            key, layer.name());
                    }
                    self.render_layer(subset, &mut render_state, &mut statistics)?;
                }
            }

            render_state.submit(DrawCommand::EndLayer)?;
            statistics.layers += 1;
        }
        render_state.submit(DrawCommand::Present { view: view.name().to_string() })?;

        statistics.draw_calls = render_state.draw_call_count();
        Ok(statistics)
    }

    fn render_layer_with_effect(
        &self,
        effect: &dyn PostprocessEffect,
        subset: &ViewRelatedSceneLayerSubset,
        render_state: &mut RenderState<'_>,
        statistics: &mut RenderStatistics,
    ) -> Result<()> {
        let mut pass_id = 0;
        loop {
            effect.notify_before_render(render_state, pass_id)?;
            self.render_layer(subset, render_state, statistics)?;
            statistics.postprocess_passes += 1;
            let again = effect.notify_after_render(render_state, pass_id)?;
            pass_id += 1;
            if !again {
                return Ok(());
            }
            if pass_id >= MAX_POSTPROCESS_PASSES {
                engine_warn!(SOURCE, "Effect '{}' still requests passes after {}, stopping",
                    effect.effect_name(), pass_id);
                return Ok(());
            }
        }
    }

    fn render_layer(
        &self,
        subset: &ViewRelatedSceneLayerSubset,
        render_state: &mut RenderState<'_>,
        statistics: &mut RenderStatistics,
    ) -> Result<()> {
        for pass in subset.passes() {
            let mut subscriptions: Vec<&RenderPassSubscription> = subset.pass_subscriptions(pass.id).collect();
            if subscriptions.is_empty() {
                continue;
            }
            if pass.sorting == PassSorting::DepthSortedBackToFront {
                self.sort_back_to_front(render_state.camera(), &mut subscriptions);
            }

            render_state.submit(DrawCommand::BeginPass { pass: pass.name })?;
            for subscription in subscriptions {
                let slot = match self.objects.get(subscription.object) {
                    Some(slot) => slot,
                    None => continue,
                };
                let content = match slot.content() {
                    Some(content) => content,
                    None => continue,
                };
                match content.render(&slot.state, &pass, render_state) {
                    Ok(()) => {}
                    Err(err) if is_fatal(&err) => return Err(err),
                    Err(err) => {
                        statistics.skipped_objects += 1;
                        engine_warn!(SOURCE, "Skipping {} '{}' in pass {}: {}",
                            content.type_name(), slot.state.name, pass, err);
                    }
                }
            }
            render_state.submit(DrawCommand::EndPass { pass: pass.name })?;
            statistics.passes += 1;
        }
        Ok(())
    }

    /// Farthest first; equal distances keep index order
    fn sort_back_to_front(&self, camera: &Camera, subscriptions: &mut Vec<&RenderPassSubscription>) {
        let mut keyed: Vec<(f32, &RenderPassSubscription)> = subscriptions
            .iter()
            .map(|subscription| {
                let distance = self.objects
                    .get(subscription.object)
                    .map_or(0.0, |slot| camera.distance_to(slot.state.position));
                (distance, *subscription)
            })
            .collect();
        keyed.sort_by(|a, b| b.0.total_cmp(&a.0));
        *subscriptions = keyed.into_iter().map(|(_, subscription)| subscription).collect();
    }

    // ===== DEVICE LOSS =====

    /// Release every resource of a lost device. Objects reload lazily once
    /// the device is back.
    pub fn unload_device_resources(&mut self, device: DeviceIndex) -> Result<usize> {
        let dictionary = match self.dictionaries.get(&device) {
            Some(dictionary) => dictionary,
            None => return Ok(0),
        };
        let unloaded = dictionary.unload_all()?;
        for slot in self.objects.values_mut() {
            slot.loaded_on.remove(&device);
        }
        engine_debug!(SOURCE, "Unloaded {} resources of device {}", unloaded, device);
        Ok(unloaded)
    }

    /// Reload every registered resource of a recovered device
    pub fn reload_device_resources(&mut self, device: DeviceIndex) -> Result<usize> {
        match self.dictionaries.get(&device) {
            Some(dictionary) => dictionary.reload_all(),
            None => Ok(0),
        }
    }

    // ===== QUERIES =====

    /// Remove a subscription through the scene.
    ///
    /// A subset that no longer exists, or a stale handle, is a no-op.
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> Result<bool> {
        match self.subsets.get_mut(&handle.subset()) {
            Some(subset) => Ok(subset.unsubscribe(handle)),
            None => Ok(false),
        }
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn contains_object(&self, key: ObjectKey) -> bool {
        self.objects.contains_key(key)
    }

    pub fn object_state(&self, key: ObjectKey) -> Option<&ObjectState> {
        self.objects.get(key).map(|slot| &slot.state)
    }

    pub fn find_object(&self, name: &str) -> Option<ObjectKey> {
        self.objects.iter().find(|(_, slot)| slot.state.name == name).map(|(key, _)| key)
    }

    pub fn object_keys(&self) -> Vec<ObjectKey> {
        self.objects.keys().collect()
    }

    /// Subscriptions an object currently holds, over all views
    pub fn object_subscriptions(&self, key: ObjectKey) -> &[SubscriptionHandle] {
        self.objects.get(key).map(|slot| slot.subscriptions.as_slice()).unwrap_or(&[])
    }

    pub fn behavior_count(&self, key: ObjectKey) -> usize {
        self.objects.get(key)
            .and_then(|slot| slot.logic.as_ref())
            .map_or(0, |logic| logic.behaviors.len())
    }

    /// Animations still queued on an object
    pub fn running_animation_count(&self, key: ObjectKey) -> usize {
        self.objects.get(key)
            .and_then(|slot| slot.logic.as_ref())
            .map_or(0, |logic| logic.animations.count_running())
    }

    /// Whether the object's resources were loaded on `device`
    pub fn is_object_loaded_on(&self, key: ObjectKey, device: DeviceIndex) -> bool {
        self.objects.get(key).is_some_and(|slot| slot.loaded_on.contains(&device))
    }

    pub fn default_layer(&self) -> LayerKey {
        self.default_layer
    }

    pub fn layer(&self, key: LayerKey) -> Option<&SceneLayer> {
        self.layers.get(key)
    }

    pub fn layer_key(&self, name: &str) -> Option<LayerKey> {
        self.layers.iter().find(|(_, layer)| layer.name() == name).map(|(key, _)| key)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Layer keys sorted by order id, then creation
    pub fn layers_in_render_order(&self) -> Vec<LayerKey> {
        let mut keys: Vec<LayerKey> = self.layers.keys().collect();
        keys.sort_by_key(|key| self.layers[*key].render_order());
        keys
    }

    pub fn view(&self, key: ViewKey) -> Option<&ViewInformation> {
        self.views.get(key)
    }

    /// Mutable view access (camera updates)
    pub fn view_mut(&mut self, key: ViewKey) -> Option<&mut ViewInformation> {
        self.views.get_mut(key)
    }

    pub fn view_keys(&self) -> Vec<ViewKey> {
        self.views.keys().collect()
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    pub fn subset(&self, layer: LayerKey, view: ViewKey) -> Option<&ViewRelatedSceneLayerSubset> {
        self.subsets.get(&SubsetKey { layer, view })
    }

    /// Resource dictionary of a device some view renders to
    pub fn resources(&self, device: DeviceIndex) -> Option<&Arc<ResourceDictionary>> {
        self.dictionaries.get(&device)
    }

    pub fn device_indices(&self) -> Vec<DeviceIndex> {
        self.dictionaries.keys().copied().collect()
    }

    pub fn is_resource_registered(&self, key: &ResourceKey) -> bool {
        self.registrations.iter().any(|(existing, _)| existing == key)
    }

    pub fn update_thread_count(&self) -> usize {
        self.thread_pool.current_num_threads()
    }
}

impl Drop for Scene {
    fn drop(&mut self) {
        for pending in self.manipulation_queue.take_pending() {
            pending.abandon();
        }
    }
}

// ===== UPDATE HELPERS =====

/// Device problems abort the frame; everything else only skips an object
fn is_fatal(err: &Error) -> bool {
    matches!(err, Error::DeviceLost(_) | Error::DeviceUnavailable(_) | Error::ConcurrentMutationViolation(_))
}

fn update_object(
    key: ObjectKey,
    slot: &mut ObjectSlot,
    update_state: &UpdateState,
    queue: &SceneManipulationQueue,
    isolate: bool,
) -> Option<UpdateFailure> {
    let ObjectSlot { state, logic, .. } = slot;
    let logic = logic.as_mut()?;
    let ctx = UpdateContext::new(update_state, key, queue);
    let outcome = run_isolated(isolate, || logic.update(state, &ctx));
    failure_of(outcome, &state.name)
}

fn run_isolated(
    isolate: bool,
    update: impl FnOnce() -> Result<()>,
) -> std::result::Result<Result<()>, Box<dyn Any + Send>> {
    if isolate {
        panic::catch_unwind(AssertUnwindSafe(update))
    } else {
        Ok(update())
    }
}

fn failure_of(
    outcome: std::result::Result<Result<()>, Box<dyn Any + Send>>,
    object: &str,
) -> Option<UpdateFailure> {
    match outcome {
        Ok(Ok(())) => None,
        Ok(Err(error)) => Some(UpdateFailure::Failed { object: object.to_string(), error }),
        Err(payload) => Some(UpdateFailure::Panicked {
            object: object.to_string(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn record_failure(statistics: &mut UpdateStatistics, failure: UpdateFailure) {
    match failure {
        UpdateFailure::Failed { object, error } => {
            statistics.failed_objects += 1;
            engine_warn!(SOURCE, "Update of object '{}' failed: {}", object, error);
        }
        UpdateFailure::Panicked { object, message } => {
            statistics.panicked_objects += 1;
            engine_error!(SOURCE, "Update of object '{}' panicked: {}", object, message);
        }
    }
}

#[cfg(test)]
#[path = "scene_tests.rs"]
mod tests;
