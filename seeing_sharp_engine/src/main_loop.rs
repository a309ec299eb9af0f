/// Main loop.
///
/// Owns the scene and drives the frame sequence:
///
/// 1. frame barrier: queued scene manipulations are applied
/// 2. input handlers are polled once
/// 3. two-phase scene update
/// 4. lost devices that came back get their resources reloaded
/// 5. every render loop prepares and draws its view
///
/// `run_frame` runs one frame on the calling thread. `start` moves the loop
/// to a dedicated thread that runs frames at the configured frame time until
/// the returned handle is stopped.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use crossbeam_channel::{RecvTimeoutError, Sender};
use rustc_hash::FxHashSet;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::{engine_debug, engine_err, engine_error, engine_info, engine_warn};
use crate::graphics_device::DeviceIndex;
use crate::input::{InputFrame, InputHandler};
use crate::render::RenderLoop;
use crate::scene::{
    ManipulationTicket, Scene, SceneManipulationQueue, SceneManipulator, UpdateState, UpdateStatistics,
    ViewInformation, ViewKey,
};

const SOURCE: &str = "seeing_sharp::MainLoop";

/// Outcome of one frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStatistics {
    pub frame_index: u64,
    /// Update step after clamping
    pub elapsed: Duration,
    pub manipulations: usize,
    pub input_frames: usize,
    pub update: UpdateStatistics,
    pub rendered_views: usize,
    /// Views skipped because they are paused or their device is lost
    pub skipped_views: usize,
    pub draw_calls: u32,
    /// Devices whose resources were reloaded this frame
    pub recovered_devices: usize,
}

pub struct MainLoop {
    scene: Scene,
    render_loops: Vec<RenderLoop>,
    input_handlers: Vec<Box<dyn InputHandler>>,
    lost_devices: FxHashSet<DeviceIndex>,
    config: EngineConfig,
    frame_index: u64,
    total_time: Duration,
    last_frame: Option<Instant>,
}

impl MainLoop {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let scene = Scene::new(&config)?;
        Ok(Self {
            scene,
            render_loops: Vec::new(),
            input_handlers: Vec::new(),
            lost_devices: FxHashSet::default(),
            config,
            frame_index: 0,
            total_time: Duration::ZERO,
            last_frame: None,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Direct scene access between frames
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// Run a manipulation right away (see `Scene::manipulate`)
    pub fn manipulate<R>(&mut self, action: impl FnOnce(&mut SceneManipulator<'_>) -> Result<R>) -> Result<R> {
        self.scene.manipulate(action)
    }

    pub fn manipulate_scene_async<F>(&self, action: F) -> ManipulationTicket
    where
        F: for<'s> FnOnce(&mut SceneManipulator<'s>) -> Result<()> + Send + 'static,
    {
        self.scene.manipulate_scene_async(action)
    }

    pub fn manipulation_queue(&self) -> SceneManipulationQueue {
        self.scene.manipulation_queue()
    }

    pub fn add_input_handler(&mut self, handler: impl InputHandler + 'static) {
        self.input_handlers.push(Box::new(handler));
    }

    pub fn input_handler_count(&self) -> usize {
        self.input_handlers.len()
    }

    // ===== RENDER LOOPS =====

    /// Register `view` with the scene and render it every frame
    pub fn add_render_loop(&mut self, view: ViewInformation) -> Result<ViewKey> {
        let name = view.name().to_string();
        let device = view.device().clone();
        let key = self.scene.manipulate(|m| m.register_view(view))?;
        self.render_loops.push(RenderLoop::new(key, name, device));
        Ok(key)
    }

    /// Stop rendering a view and deregister it. Returns false for unknown views.
    pub fn remove_render_loop(&mut self, view: ViewKey) -> Result<bool> {
        let position = match self.render_loops.iter().position(|render_loop| render_loop.view() == view) {
            Some(position) => position,
            None => return Ok(false),
        };
        let render_loop = self.render_loops.remove(position);
        if !self.render_loops.iter().any(|other| other.device_index() == render_loop.device_index()) {
            self.lost_devices.remove(&render_loop.device_index());
        }
        self.scene.manipulate(|m| m.deregister_view(view))
    }

    pub fn render_loops(&self) -> &[RenderLoop] {
        &self.render_loops
    }

    pub fn render_loop_mut(&mut self, view: ViewKey) -> Option<&mut RenderLoop> {
        self.render_loops.iter_mut().find(|render_loop| render_loop.view() == view)
    }

    pub fn is_device_lost(&self, device: DeviceIndex) -> bool {
        self.lost_devices.contains(&device)
    }

    // ===== FRAMES =====

    /// Run one frame, timed against the previous one
    pub fn run_frame(&mut self) -> Result<FrameStatistics> {
        let now = Instant::now();
        let elapsed = match self.last_frame {
            Some(last) => now.duration_since(last),
            None => self.config.target_frame_time,
        };
        self.last_frame = Some(now);
        self.run_frame_with(elapsed)
    }

    /// Run one frame with an explicit update step
    ///
    /// # Errors
    ///
    /// Render errors other than device loss (device loss is handled here:
    /// the device's resources are unloaded and its views skipped until the
    /// device recovers).
    pub fn run_frame_with(&mut self, elapsed: Duration) -> Result<FrameStatistics> {
        let elapsed = self.config.clamp_update_step(elapsed);
        let mut statistics = FrameStatistics {
            frame_index: self.frame_index,
            elapsed,
            ..FrameStatistics::default()
        };

        statistics.manipulations = self.scene.apply_pending_manipulations();

        let input_frames: Vec<InputFrame> = self.input_handlers
            .iter_mut()
            .flat_map(|handler| handler.poll())
            .collect();
        statistics.input_frames = input_frames.len();

        self.total_time += elapsed;
        let update_state = UpdateState::new(elapsed, self.total_time, self.frame_index)
            .with_input_frames(input_frames);
        statistics.update = self.scene.update(&update_state);

        statistics.recovered_devices = self.recover_devices()?;

        for render_loop in &mut self.render_loops {
            let device = render_loop.device_index();
            if self.lost_devices.contains(&device) {
                statistics.skipped_views += 1;
                continue;
            }
            match render_loop.render(&mut self.scene) {
                Ok(Some(render)) => {
                    statistics.rendered_views += 1;
                    statistics.draw_calls += render.draw_calls;
                }
                Ok(None) => statistics.skipped_views += 1,
                Err(err) if err.is_device_loss() => {
                    engine_warn!(SOURCE, "Device {} lost while rendering view '{}': {}",
                        device, render_loop.name(), err);
                    let unloaded = self.scene.unload_device_resources(device)?;
                    engine_debug!(SOURCE, "Released {} resources of device {}", unloaded, device);
                    self.lost_devices.insert(device);
                    statistics.skipped_views += 1;
                }
                Err(err) => return Err(err),
            }
        }

        self.frame_index += 1;
        Ok(statistics)
    }

    /// Reload every lost device that reports itself available again
    fn recover_devices(&mut self) -> Result<usize> {
        let recovered: Vec<DeviceIndex> = self.lost_devices
            .iter()
            .copied()
            .filter(|device| {
                self.render_loops
                    .iter()
                    .find(|render_loop| render_loop.device_index() == *device)
                    .is_some_and(|render_loop| {
                        let device = render_loop.device();
                        !device.is_lost() && !device.is_disposed()
                    })
            })
            .collect();

        for device in &recovered {
            let reloaded = self.scene.reload_device_resources(*device)?;
            self.lost_devices.remove(device);
            engine_info!(SOURCE, "Device {} recovered, {} resources reloaded", device, reloaded);
        }
        Ok(recovered.len())
    }

    /// Frames run so far
    pub fn frame_count(&self) -> u64 {
        self.frame_index
    }

    pub fn total_time(&self) -> Duration {
        self.total_time
    }

    // ===== BACKGROUND THREAD =====

    /// Run frames on a dedicated thread until the handle is stopped
    ///
    /// # Errors
    ///
    /// `InitializationFailed` if the thread cannot be spawned.
    pub fn start(self) -> Result<MainLoopHandle> {
        let (stop, stop_signal) = crossbeam_channel::bounded::<()>(1);
        let queue = self.scene.manipulation_queue();
        let frame_time = self.config.target_frame_time;

        let thread = thread::Builder::new()
            .name("seeing-sharp-main-loop".to_string())
            .spawn(move || {
                let mut main_loop = self;
                engine_info!(SOURCE, "Main loop started");
                loop {
                    let frame_start = Instant::now();
                    if let Err(err) = main_loop.run_frame() {
                        engine_error!(SOURCE, "Frame {} failed: {}", main_loop.frame_index, err);
                    }

                    let remaining = frame_time.saturating_sub(frame_start.elapsed());
                    match stop_signal.recv_timeout(remaining) {
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                    }
                }
                engine_info!(SOURCE, "Main loop stopped after {} frames", main_loop.frame_index);
                main_loop
            })
            .map_err(|err| engine_err!(SOURCE, InitializationFailed, "Failed to spawn the main loop thread: {}", err))?;

        Ok(MainLoopHandle { stop, thread: Some(thread), queue })
    }
}

// ===== HANDLE =====

/// Handle to a main loop running on its own thread
pub struct MainLoopHandle {
    stop: Sender<()>,
    thread: Option<JoinHandle<MainLoop>>,
    queue: SceneManipulationQueue,
}

impl MainLoopHandle {
    /// Queue a manipulation for the loop's next frame barrier
    pub fn manipulate_scene_async<F>(&self, action: F) -> ManipulationTicket
    where
        F: for<'s> FnOnce(&mut SceneManipulator<'s>) -> Result<()> + Send + 'static,
    {
        self.queue.enqueue(action)
    }

    pub fn manipulation_queue(&self) -> SceneManipulationQueue {
        self.queue.clone()
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|thread| !thread.is_finished())
    }

    /// Stop after the current frame and hand the loop back
    ///
    /// # Errors
    ///
    /// `BackendError` if the loop thread panicked.
    pub fn stop(mut self) -> Result<MainLoop> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<MainLoop> {
        let _ = self.stop.try_send(());
        let thread = self.thread.take()
            .ok_or_else(|| Error::BackendError("Main loop already stopped".to_string()))?;
        thread.join()
            .map_err(|_| engine_err!(SOURCE, BackendError, "Main loop thread panicked"))
    }
}

impl Drop for MainLoopHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            if let Err(err) = self.shutdown() {
                engine_warn!(SOURCE, "Main loop shutdown failed: {}", err);
            }
        }
    }
}

#[cfg(test)]
#[path = "main_loop_tests.rs"]
mod tests;
