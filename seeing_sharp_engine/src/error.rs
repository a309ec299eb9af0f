//! Error types for the SeeingSharp engine
//!
//! One enum covers the whole engine. Variants carry a human readable message;
//! the variant itself is what callers match on.

use std::fmt;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// SeeingSharp engine errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A resource factory or load step failed; the resource stays unloaded
    ResourceUnavailable(String),

    /// Operation on a subscription that is no longer valid
    InvalidSubscriptionState(String),

    /// Animation parameters rejected at construction time
    AnimationConfiguration(String),

    /// Structural mutation attempted outside of the manipulation phase
    ConcurrentMutationViolation(String),

    /// The graphics device was disposed
    DeviceUnavailable(String),

    /// The graphics device was removed or reset; every resource must be reloaded
    DeviceLost(String),

    /// Unknown key, wrong resource type or malformed descriptor
    InvalidResource(String),

    /// Engine or subsystem initialization failed
    InitializationFailed(String),

    /// Backend-specific error reported by a graphics device
    BackendError(String),

    /// A scene object failed during its update callbacks
    ObjectUpdateFailed(String),
}

impl Error {
    /// Fatal conditions abort the current frame instead of being skipped.
    pub fn is_device_loss(&self) -> bool {
        matches!(self, Error::DeviceLost(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ResourceUnavailable(msg) => write!(f, "Resource unavailable: {}", msg),
            Error::InvalidSubscriptionState(msg) => write!(f, "Invalid subscription state: {}", msg),
            Error::AnimationConfiguration(msg) => write!(f, "Invalid animation configuration: {}", msg),
            Error::ConcurrentMutationViolation(msg) => write!(f, "Concurrent scene mutation: {}", msg),
            Error::DeviceUnavailable(msg) => write!(f, "Device unavailable: {}", msg),
            Error::DeviceLost(msg) => write!(f, "Device lost: {}", msg),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::ObjectUpdateFailed(msg) => write!(f, "Object update failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ===== ERROR MACROS =====

/// Build an `Error` and log it at ERROR severity with file:line information
///
/// # Example
///
/// ```no_run
/// use seeing_sharp_engine::engine_err;
///
/// let err = engine_err!("seeing_sharp::Scene", InvalidResource, "Layer '{}' not found", "ui");
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $variant:ident, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::seeing_sharp::Error::$variant(message)
    }};
}

/// Log an error and return it from the current function
///
/// # Example
///
/// ```no_run
/// use seeing_sharp_engine::engine_bail;
/// use seeing_sharp_engine::seeing_sharp::Result;
///
/// fn check(count: usize) -> Result<()> {
///     if count == 0 {
///         engine_bail!("seeing_sharp::Example", InvalidResource, "count must not be zero");
///     }
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $variant:ident, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $variant, $($arg)*))
    };
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
