pub mod foreground;
pub mod pipeline;
pub mod registry;
pub mod screenshot;
pub mod traits;
pub mod types;
pub mod ui_tree;

pub use pipeline::{PerceptionEngine, ScreenPerception};
pub use registry::ElementRegistry;
pub use types::{Bounds, Element};
