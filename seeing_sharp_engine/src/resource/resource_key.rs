/// Resource keys.
///
/// Named keys address shared resources from any call site ("Shader.Default").
/// Generated keys are process-unique integers for instance-private resources.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_GENERIC_KEY: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    Named(String),
    Generated(u64),
}

impl ResourceKey {
    /// Next process-unique generated key
    pub fn next_generic() -> Self {
        ResourceKey::Generated(NEXT_GENERIC_KEY.fetch_add(1, Ordering::Relaxed))
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, ResourceKey::Generated(_))
    }
}

impl From<&str> for ResourceKey {
    fn from(name: &str) -> Self {
        ResourceKey::Named(name.to_string())
    }
}

impl From<String> for ResourceKey {
    fn from(name: String) -> Self {
        ResourceKey::Named(name)
    }
}

impl From<&ResourceKey> for ResourceKey {
    fn from(key: &ResourceKey) -> Self {
        key.clone()
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKey::Named(name) => write!(f, "'{}'", name),
            ResourceKey::Generated(id) => write!(f, "#{}", id),
        }
    }
}
