/// Render pass descriptors.
///
/// A pass groups subscriptions that share device state. Within a layer, passes
/// run in ascending `order`: opaque geometry, lines, transparent geometry
/// (sorted back to front), then the 2D overlay.

use std::fmt;

/// How subscriptions of a pass are ordered during traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassSorting {
    /// Subscription index order
    Unordered,
    /// Farthest object first, measured from the view camera
    DepthSortedBackToFront,
}

/// Static description of one render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderPassInfo {
    /// Stable identifier (index of the pass group inside a layer subset)
    pub id: usize,
    pub name: &'static str,
    pub order: u32,
    pub sorting: PassSorting,
}

pub const PASS_PLAIN_RENDER: RenderPassInfo = RenderPassInfo {
    id: 0,
    name: "PlainRender",
    order: 100,
    sorting: PassSorting::Unordered,
};

pub const PASS_LINE_RENDER: RenderPassInfo = RenderPassInfo {
    id: 1,
    name: "LineRender",
    order: 200,
    sorting: PassSorting::Unordered,
};

pub const PASS_TRANSPARENT_RENDER: RenderPassInfo = RenderPassInfo {
    id: 2,
    name: "TransparentRender",
    order: 300,
    sorting: PassSorting::DepthSortedBackToFront,
};

pub const PASS_2D_OVERLAY: RenderPassInfo = RenderPassInfo {
    id: 3,
    name: "2DOverlay",
    order: 400,
    sorting: PassSorting::Unordered,
};

/// Every pass, in traversal order
pub const DEFAULT_RENDER_PASSES: [RenderPassInfo; 4] = [
    PASS_PLAIN_RENDER,
    PASS_LINE_RENDER,
    PASS_TRANSPARENT_RENDER,
    PASS_2D_OVERLAY,
];

impl fmt::Display for RenderPassInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
