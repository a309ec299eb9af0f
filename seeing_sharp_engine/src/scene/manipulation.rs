/// Scene manipulation queue.
///
/// Structural changes (objects, layers, resources, views, behaviors) are not
/// applied where they are requested. They are queued as closures and run by
/// `Scene::apply_pending_manipulations`, the frame barrier between two
/// update/render cycles. Every queued closure gets a `ManipulationTicket`
/// that completes once the whole batch it was drained with has been applied.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::animation::AnimationSequenceBuilder;
use crate::error::{Error, Result};
use crate::{engine_bail, engine_debug, engine_err, engine_warn};
use crate::resource::{Resource, ResourceDictionary, ResourceKey};
use super::behavior::{BehaviorId, SceneObjectBehavior};
use super::layer::{LayerFlags, LayerKey, SceneLayer};
use super::object::{ObjectKey, ObjectSlot, ObjectState, SceneObject};
use super::scene::{ResourceRegistration, Scene};
use super::view::{ViewInformation, ViewKey};

const SOURCE: &str = "seeing_sharp::SceneManipulator";

type ManipulationFn = Box<dyn for<'s> FnOnce(&mut SceneManipulator<'s>) -> Result<()> + Send>;

pub(crate) struct PendingManipulation {
    action: ManipulationFn,
    completion: Sender<Result<()>>,
}

impl PendingManipulation {
    pub(crate) fn run(self, manipulator: &mut SceneManipulator<'_>) -> (Sender<Result<()>>, Result<()>) {
        let result = (self.action)(manipulator);
        (self.completion, result)
    }

    /// Complete without running (scene dropped)
    pub(crate) fn abandon(self) {
        let _ = self.completion.send(Err(Error::ConcurrentMutationViolation(
            "Scene was dropped before the manipulation was applied".to_string(),
        )));
    }
}

// ===== QUEUE =====

/// Cloneable handle for queueing manipulations from any thread
#[derive(Clone, Default)]
pub struct SceneManipulationQueue {
    pending: Arc<Mutex<Vec<PendingManipulation>>>,
}

impl SceneManipulationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `action` for the next frame barrier
    pub fn enqueue<F>(&self, action: F) -> ManipulationTicket
    where
        F: for<'s> FnOnce(&mut SceneManipulator<'s>) -> Result<()> + Send + 'static,
    {
        let (completion, receiver) = crossbeam_channel::bounded(1);
        let pending = PendingManipulation { action: Box::new(action), completion };
        match self.pending.lock() {
            Ok(mut queue) => queue.push(pending),
            Err(_) => {
                let _ = pending.completion.send(Err(engine_err!(SOURCE, BackendError,
                    "Manipulation queue lock poisoned")));
            }
        }
        ManipulationTicket { receiver, outcome: None }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|queue| queue.len()).unwrap_or(0)
    }

    pub(crate) fn take_pending(&self) -> Vec<PendingManipulation> {
        self.pending.lock().map(|mut queue| std::mem::take(&mut *queue)).unwrap_or_default()
    }
}

// ===== TICKET =====

/// Completion handle of one queued manipulation
pub struct ManipulationTicket {
    receiver: Receiver<Result<()>>,
    outcome: Option<Result<()>>,
}

impl ManipulationTicket {
    fn disconnected() -> Error {
        Error::ConcurrentMutationViolation("Scene was dropped before the manipulation was applied".to_string())
    }

    /// Block until the manipulation has been applied
    pub fn wait(self) -> Result<()> {
        if let Some(outcome) = self.outcome {
            return outcome;
        }
        self.receiver.recv().unwrap_or_else(|_| Err(Self::disconnected()))
    }

    /// Block for at most `timeout`; `None` if the barrier has not run yet
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<Result<()>> {
        if self.outcome.is_none() {
            self.outcome = match self.receiver.recv_timeout(timeout) {
                Ok(result) => Some(result),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => Some(Err(Self::disconnected())),
            };
        }
        self.outcome.clone()
    }

    /// Non-blocking poll
    pub fn try_result(&mut self) -> Option<Result<()>> {
        if self.outcome.is_none() {
            self.outcome = match self.receiver.try_recv() {
                Ok(result) => Some(result),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => Some(Err(Self::disconnected())),
            };
        }
        self.outcome.clone()
    }

    pub fn is_completed(&mut self) -> bool {
        self.try_result().is_some()
    }
}

// ===== MANIPULATOR =====

/// Mutable access to the scene structure, only available at the frame barrier
pub struct SceneManipulator<'a> {
    scene: &'a mut Scene,
}

impl<'a> SceneManipulator<'a> {
    pub(crate) fn new(scene: &'a mut Scene) -> Self {
        Self { scene }
    }

    /// Read access to the scene while manipulating
    pub fn scene(&self) -> &Scene {
        self.scene
    }

    // ----- objects -----

    /// Add an object to the default layer
    pub fn add_object(&mut self, content: impl SceneObject + 'static, state: ObjectState) -> ObjectKey {
        let layer = self.scene.default_layer;
        self.insert_object(layer, Box::new(content), state)
    }

    pub fn add_object_to_layer(
        &mut self,
        layer: LayerKey,
        content: impl SceneObject + 'static,
        state: ObjectState,
    ) -> Result<ObjectKey> {
        if !self.scene.layers.contains_key(layer) {
            engine_bail!(SOURCE, InvalidResource, "Layer {:?} does not exist", layer);
        }
        Ok(self.insert_object(layer, Box::new(content), state))
    }

    fn insert_object(&mut self, layer: LayerKey, content: Box<dyn SceneObject>, mut state: ObjectState) -> ObjectKey {
        state.layer = layer;
        let type_name = content.type_name();
        let key = self.scene.objects.insert(ObjectSlot::new(state, content));
        if let Some(layer) = self.scene.layers.get_mut(layer) {
            layer.push_object(key);
        }
        engine_debug!(SOURCE, "Added {} object {:?}", type_name, key);
        key
    }

    /// Remove an object, its subscriptions and its private resources.
    ///
    /// Returns false for unknown keys.
    pub fn remove_object(&mut self, key: ObjectKey) -> Result<bool> {
        let slot = match self.scene.objects.remove(key) {
            Some(slot) => slot,
            None => return Ok(false),
        };

        for handle in &slot.subscriptions {
            if let Some(subset) = self.scene.subsets.get_mut(&handle.subset()) {
                subset.unsubscribe(*handle);
            }
        }
        if let Some(layer) = self.scene.layers.get_mut(slot.state.layer) {
            layer.remove_object(key);
        }

        if let Some(mut logic) = slot.logic {
            for (_, behavior) in &mut logic.behaviors {
                behavior.on_host_object_changed(Some(key), None);
            }
            for device in &slot.loaded_on {
                if let Some(dictionary) = self.scene.dictionaries.get(device) {
                    if let Err(err) = logic.content.unload_resources(dictionary) {
                        engine_warn!(SOURCE, "Object '{}' failed to release its resources: {}", slot.state.name, err);
                    }
                }
            }
        }

        engine_debug!(SOURCE, "Removed object '{}' ({:?})", slot.state.name, key);
        Ok(true)
    }

    /// Direct access to an object's state (transform, visibility, opacity)
    pub fn object_state_mut(&mut self, key: ObjectKey) -> Option<&mut ObjectState> {
        self.scene.objects.get_mut(key).map(|slot| &mut slot.state)
    }

    pub fn find_object(&self, name: &str) -> Option<ObjectKey> {
        self.scene.find_object(name)
    }

    // ----- resources -----

    /// Register a resource on every device the scene renders to, now and later.
    ///
    /// `factory` runs once per device dictionary; the resource is loaded
    /// lazily by whatever first draws with it.
    pub fn add_resource<T, F>(&mut self, key: impl Into<ResourceKey>, factory: F) -> Result<ResourceKey>
    where
        T: Resource,
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        let key = key.into();
        if self.scene.registrations.iter().any(|(existing, _)| *existing == key) {
            engine_bail!(SOURCE, InvalidResource, "Resource {} is already registered", key);
        }

        let registration: Arc<ResourceRegistration> = Arc::new(move |key: &ResourceKey, dictionary: &ResourceDictionary| {
            dictionary.add_resource(key, factory()?).map(|_| ())
        });
        let mut accepted = Vec::new();
        for dictionary in self.scene.dictionaries.values() {
            if let Err(err) = registration(&key, dictionary) {
                // All devices or none
                for dictionary in accepted {
                    Self::discard_registered(dictionary, &key);
                }
                return Err(err);
            }
            accepted.push(dictionary);
        }
        self.scene.registrations.push((key.clone(), registration));
        Ok(key)
    }

    fn discard_registered(dictionary: &ResourceDictionary, key: &ResourceKey) {
        if let Err(err) = dictionary.remove_resource(key) {
            engine_warn!(SOURCE, "Failed to roll back resource {}: {}", key, err);
        }
    }

    /// Register a resource under a generated key
    pub fn add_generic_resource<T, F>(&mut self, factory: F) -> Result<ResourceKey>
    where
        T: Resource,
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        self.add_resource(ResourceDictionary::next_generic_resource_key(), factory)
    }

    /// Unload and forget a resource on every device
    pub fn remove_resource(&mut self, key: &ResourceKey) -> Result<bool> {
        let before = self.scene.registrations.len();
        self.scene.registrations.retain(|(existing, _)| existing != key);
        let mut removed = self.scene.registrations.len() != before;
        for dictionary in self.scene.dictionaries.values() {
            removed |= dictionary.remove_resource(key)?;
        }
        Ok(removed)
    }

    // ----- layers -----

    pub fn add_layer(&mut self, name: impl Into<String>) -> Result<LayerKey> {
        let name = name.into();
        if self.scene.layer_key(&name).is_some() {
            engine_bail!(SOURCE, InvalidResource, "Layer '{}' already exists", name);
        }
        let creation_index = self.scene.next_layer_index;
        self.scene.next_layer_index += 1;
        let order_id = creation_index as i32;
        engine_debug!(SOURCE, "Added layer '{}'", name);
        Ok(self.scene.layers.insert(SceneLayer::new(name, order_id, creation_index)))
    }

    /// Remove a layer together with its objects. The default layer stays.
    pub fn remove_layer(&mut self, key: LayerKey) -> Result<bool> {
        if key == self.scene.default_layer {
            engine_bail!(SOURCE, InvalidResource, "The default layer cannot be removed");
        }
        let objects = match self.scene.layers.get(key) {
            Some(layer) => layer.objects().to_vec(),
            None => return Ok(false),
        };
        for object in objects {
            self.remove_object(object)?;
        }
        self.scene.subsets.retain(|subset, _| subset.layer != key);
        if let Some(layer) = self.scene.layers.remove(key) {
            engine_debug!(SOURCE, "Removed layer '{}'", layer.name());
        }
        Ok(true)
    }

    pub fn set_layer_order_id(&mut self, key: LayerKey, order_id: i32) -> Result<()> {
        self.layer_mut(key)?.set_order_id(order_id);
        Ok(())
    }

    pub fn set_layer_flags(&mut self, key: LayerKey, flags: LayerFlags) -> Result<()> {
        self.layer_mut(key)?.set_flags(flags);
        Ok(())
    }

    /// Render the layer through a postprocess effect resource (or stop doing so)
    pub fn set_layer_postprocess_effect(&mut self, key: LayerKey, effect: Option<ResourceKey>) -> Result<()> {
        self.layer_mut(key)?.set_postprocess_effect(effect);
        Ok(())
    }

    pub fn layer_key(&self, name: &str) -> Option<LayerKey> {
        self.scene.layer_key(name)
    }

    fn layer_mut(&mut self, key: LayerKey) -> Result<&mut SceneLayer> {
        self.scene.layers.get_mut(key)
            .ok_or_else(|| engine_err!(SOURCE, InvalidResource, "Layer {:?} does not exist", key))
    }

    // ----- behaviors and animations -----

    pub fn attach_behavior(
        &mut self,
        object: ObjectKey,
        mut behavior: impl SceneObjectBehavior + 'static,
    ) -> Result<BehaviorId> {
        let logic = self.scene.objects.get_mut(object)
            .and_then(|slot| slot.logic.as_mut())
            .ok_or_else(|| engine_err!(SOURCE, InvalidResource, "Object {:?} does not exist", object))?;

        behavior.on_host_object_changed(None, Some(object));
        let id = BehaviorId::next();
        logic.behaviors.push((id, Box::new(behavior)));
        Ok(id)
    }

    /// Returns false if the behavior is not attached to `object`
    pub fn detach_behavior(&mut self, object: ObjectKey, id: BehaviorId) -> Result<bool> {
        let logic = self.scene.objects.get_mut(object)
            .and_then(|slot| slot.logic.as_mut())
            .ok_or_else(|| engine_err!(SOURCE, InvalidResource, "Object {:?} does not exist", object))?;

        match logic.behaviors.iter().position(|(existing, _)| *existing == id) {
            Some(index) => {
                let (_, mut behavior) = logic.behaviors.remove(index);
                behavior.on_host_object_changed(Some(object), None);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Queue an animation sequence on an object
    pub fn start_animation(&mut self, object: ObjectKey, sequence: AnimationSequenceBuilder<ObjectState>) -> Result<()> {
        let logic = self.scene.objects.get_mut(object)
            .and_then(|slot| slot.logic.as_mut())
            .ok_or_else(|| engine_err!(SOURCE, InvalidResource, "Object {:?} does not exist", object))?;
        sequence.apply(&mut logic.animations)
    }

    pub fn cancel_animations(&mut self, object: ObjectKey) -> Result<()> {
        let logic = self.scene.objects.get_mut(object)
            .and_then(|slot| slot.logic.as_mut())
            .ok_or_else(|| engine_err!(SOURCE, InvalidResource, "Object {:?} does not exist", object))?;
        logic.animations.cancel_animations();
        Ok(())
    }

    // ----- views -----

    /// Register a view; its device gets a resource dictionary holding every
    /// registered resource
    pub fn register_view(&mut self, view: ViewInformation) -> Result<ViewKey> {
        let device_index = view.device_index();
        if !self.scene.dictionaries.contains_key(&device_index) {
            let dictionary = Arc::new(ResourceDictionary::new(view.device().clone()));
            for (key, registration) in &self.scene.registrations {
                registration(key, &dictionary)?;
            }
            self.scene.dictionaries.insert(device_index, dictionary);
        }

        engine_debug!(SOURCE, "Registered view '{}' on device {}", view.name(), device_index);
        Ok(self.scene.views.insert(view))
    }

    /// Remove a view and its subsets. The device dictionary is cleared once
    /// no view uses that device anymore.
    pub fn deregister_view(&mut self, key: ViewKey) -> Result<bool> {
        let view = match self.scene.views.remove(key) {
            Some(view) => view,
            None => return Ok(false),
        };

        self.scene.subsets.retain(|subset, _| subset.view != key);
        for slot in self.scene.objects.values_mut() {
            slot.subscriptions.retain(|handle| handle.subset().view != key);
        }

        let device_index = view.device_index();
        let device_in_use = self.scene.views.values().any(|other| other.device_index() == device_index);
        if !device_in_use {
            if let Some(dictionary) = self.scene.dictionaries.remove(&device_index) {
                dictionary.clear()?;
            }
            for slot in self.scene.objects.values_mut() {
                slot.loaded_on.remove(&device_index);
            }
        }

        engine_debug!(SOURCE, "Deregistered view '{}'", view.name());
        Ok(true)
    }
}

#[cfg(test)]
#[path = "manipulation_tests.rs"]
mod tests;
