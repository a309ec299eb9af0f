//! Scene module
//!
//! Object arena, layers, views, per-view pass subscriptions, the two-phase
//! update and the manipulation queue that serializes structural changes.

mod behavior;
mod layer;
mod layer_subset;
mod manipulation;
mod object;
mod objects;
mod scene;
mod update;
mod view;

pub use behavior::{BehaviorId, FollowObjectBehavior, RotationBehavior, SceneObjectBehavior};
pub use layer::{LayerFlags, LayerKey, SceneLayer};
pub use layer_subset::{RenderPassSubscription, SubscriptionHandle, SubsetKey, ViewRelatedSceneLayerSubset};
pub use manipulation::{ManipulationTicket, SceneManipulationQueue, SceneManipulator};
pub use object::{ObjectKey, ObjectState, SceneObject};
pub use objects::{LineListObject, MeshObject, Overlay2DObject};
pub use scene::{PrepareStatistics, RenderStatistics, Scene};
pub use update::{OverallUpdateContext, UpdateContext, UpdateState, UpdateStatistics};
pub use view::{FrustumCulling, NoCulling, ViewInformation, ViewKey, VisibilityCuller};
