/// SeeingSharp Engine - global engine state
///
/// Holds the engine configuration, the graphics device registry and the
/// logger. Everything lives in thread-safe statics so the logging macros and
/// device lookups work from any thread, including the update workers.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock, RwLock};
use std::time::SystemTime;
use rustc_hash::FxHashMap;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::graphics_device::{DeviceIndex, GraphicsDevice};
use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};

const SOURCE: &str = "seeing_sharp::Engine";

// ===== INTERNAL STATE =====

/// Global engine state storage
static ENGINE_STATE: OnceLock<EngineState> = OnceLock::new();

/// Global logger (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

/// Entries below this severity are dropped before reaching the logger
static MIN_SEVERITY: AtomicU8 = AtomicU8::new(2);

struct EngineState {
    /// `None` until `initialize`, and again after `shutdown`
    config: RwLock<Option<EngineConfig>>,
    devices: RwLock<FxHashMap<DeviceIndex, Arc<dyn GraphicsDevice>>>,
}

impl EngineState {
    fn new() -> Self {
        Self {
            config: RwLock::new(None),
            devices: RwLock::new(FxHashMap::default()),
        }
    }
}

fn state() -> &'static EngineState {
    ENGINE_STATE.get_or_init(EngineState::new)
}

fn logger() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)))
}

// ===== PUBLIC API =====

/// Engine entry point
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use seeing_sharp_engine::seeing_sharp::{Engine, EngineConfig};
/// use seeing_sharp_engine::seeing_sharp::graphics_device::MockGraphicsDevice;
///
/// Engine::initialize(EngineConfig::default())?;
/// Engine::register_device(Arc::new(MockGraphicsDevice::new(0, "headless")))?;
///
/// let device = Engine::device(0)?;
/// // Build views on `device`...
///
/// Engine::shutdown();
/// # Ok::<(), seeing_sharp_engine::seeing_sharp::Error>(())
/// ```
pub struct Engine;

impl Engine {
    /// Log errors before handing them back to the caller
    fn log_and_return_error(error: Error) -> Error {
        match &error {
            Error::InitializationFailed(msg) => {
                crate::engine_error!(SOURCE, "Initialization failed: {}", msg);
            }
            Error::BackendError(msg) => {
                crate::engine_error!(SOURCE, "Backend error: {}", msg);
            }
            _ => {
                crate::engine_error!(SOURCE, "Engine error: {}", error);
            }
        }
        error
    }

    /// Initialize the engine with `config`
    ///
    /// Applies the configured minimum log severity.
    ///
    /// # Errors
    ///
    /// `InitializationFailed` if the engine is already initialized (call
    /// `shutdown` first) or a lock is poisoned.
    pub fn initialize(config: EngineConfig) -> Result<()> {
        let mut lock = state().config.write()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("Engine config lock poisoned".to_string())
            ))?;

        if lock.is_some() {
            return Err(Self::log_and_return_error(
                Error::InitializationFailed("Engine already initialized. Call Engine::shutdown() first.".to_string())
            ));
        }

        Self::set_min_log_severity(config.min_log_severity);
        *lock = Some(config);
        drop(lock);

        crate::engine_info!(SOURCE, "Engine initialized");
        Ok(())
    }

    pub fn is_initialized() -> bool {
        state().config.read().map(|config| config.is_some()).unwrap_or(false)
    }

    /// Configuration passed to `initialize`
    pub fn config() -> Result<EngineConfig> {
        let lock = state().config.read()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("Engine config lock poisoned".to_string())
            ))?;

        lock.clone()
            .ok_or_else(|| Self::log_and_return_error(
                Error::InitializationFailed("Engine not initialized. Call Engine::initialize() first.".to_string())
            ))
    }

    /// Forget the configuration and every registered device
    ///
    /// Devices stay alive as long as views or dictionaries hold them.
    pub fn shutdown() {
        let state = state();
        if let Ok(mut devices) = state.devices.write() {
            devices.clear();
        }
        if let Ok(mut config) = state.config.write() {
            *config = None;
        }
    }

    // ===== DEVICE REGISTRY =====

    /// Make a graphics device available under its `device_index`
    ///
    /// # Errors
    ///
    /// - `InitializationFailed` if the engine is not initialized
    /// - `InvalidResource` if another device already uses the index
    pub fn register_device(device: Arc<dyn GraphicsDevice>) -> Result<()> {
        if !Self::is_initialized() {
            return Err(Self::log_and_return_error(
                Error::InitializationFailed("Engine not initialized. Call Engine::initialize() first.".to_string())
            ));
        }

        let mut devices = state().devices.write()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("Device registry lock poisoned".to_string())
            ))?;

        let index = device.device_index();
        if devices.contains_key(&index) {
            return Err(Self::log_and_return_error(
                Error::InvalidResource(format!("Device index {} is already registered", index))
            ));
        }

        crate::engine_info!(SOURCE, "Registered device {} ('{}')", index, device.name());
        devices.insert(index, device);
        Ok(())
    }

    /// Registered device by index
    pub fn device(index: DeviceIndex) -> Result<Arc<dyn GraphicsDevice>> {
        let devices = state().devices.read()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("Device registry lock poisoned".to_string())
            ))?;

        devices.get(&index).cloned()
            .ok_or_else(|| Self::log_and_return_error(
                Error::DeviceUnavailable(format!("No device registered with index {}", index))
            ))
    }

    /// Registered devices, sorted by index
    pub fn devices() -> Vec<Arc<dyn GraphicsDevice>> {
        let mut devices: Vec<Arc<dyn GraphicsDevice>> = state().devices.read()
            .map(|devices| devices.values().cloned().collect())
            .unwrap_or_default();
        devices.sort_by_key(|device| device.device_index());
        devices
    }

    pub fn device_count() -> usize {
        state().devices.read().map(|devices| devices.len()).unwrap_or(0)
    }

    /// Returns false if no device used the index
    pub fn unregister_device(index: DeviceIndex) -> Result<bool> {
        let mut devices = state().devices.write()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("Device registry lock poisoned".to_string())
            ))?;

        let removed = devices.remove(&index).is_some();
        if removed {
            crate::engine_info!(SOURCE, "Unregistered device {}", index);
        }
        Ok(removed)
    }

    // ===== LOGGING API =====

    /// Set a custom logger
    ///
    /// # Example
    ///
    /// ```no_run
    /// use seeing_sharp_engine::seeing_sharp::{Engine, log::{Logger, LogEntry}};
    ///
    /// struct FileLogger;
    /// impl Logger for FileLogger {
    ///     fn log(&self, entry: &LogEntry) {
    ///         // Write to file...
    ///     }
    /// }
    ///
    /// Engine::set_logger(FileLogger);
    /// ```
    pub fn set_logger<L: Logger + 'static>(logger_impl: L) {
        if let Ok(mut lock) = logger().write() {
            *lock = Box::new(logger_impl);
        }
    }

    /// Reset logger to default (DefaultLogger)
    pub fn reset_logger() {
        if let Ok(mut lock) = logger().write() {
            *lock = Box::new(DefaultLogger);
        }
    }

    /// Drop entries below `severity`
    pub fn set_min_log_severity(severity: LogSeverity) {
        MIN_SEVERITY.store(severity.to_u8(), Ordering::Relaxed);
    }

    pub fn min_log_severity() -> LogSeverity {
        LogSeverity::from_u8(MIN_SEVERITY.load(Ordering::Relaxed))
    }

    fn is_enabled(severity: LogSeverity) -> bool {
        severity.to_u8() >= MIN_SEVERITY.load(Ordering::Relaxed)
    }

    /// Internal logging method (for simple logs without file:line)
    ///
    /// Used by macros like engine_info!, engine_warn!, etc.
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        if !Self::is_enabled(severity) {
            return;
        }
        if let Ok(lock) = logger().read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: None,
                line: None,
            });
        }
    }

    /// Internal logging method with file:line information (for ERROR logs)
    ///
    /// Used by engine_error! macro to include source location.
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        if !Self::is_enabled(severity) {
            return;
        }
        if let Ok(lock) = logger().read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: Some(file),
                line: Some(line),
            });
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
