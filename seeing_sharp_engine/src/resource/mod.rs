//! Resource management module
//!
//! Device-bound resources with a load/unload lifecycle, owned per device by a
//! `ResourceDictionary`.

pub mod resource;
pub mod resource_key;
pub mod resource_dictionary;
pub mod texture;
pub mod buffer;
pub mod shader;
pub mod geometry;
pub mod material;

pub use resource::{Resource, HandleSlot};
pub use resource_key::ResourceKey;
pub use resource_dictionary::{ResourceDictionary, RenderPhaseGuard};
pub use texture::{TextureResource, TextureDesc, TextureUsage};
pub use buffer::{BufferResource, BufferKind};
pub use shader::{ShaderResource, ShaderStage};
pub use geometry::{GeometryResource, Vertex};
pub use material::{MaterialResource, MaterialDesc, MaterialConstants};
