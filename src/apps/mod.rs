pub mod context;
pub mod fuzzy;
pub mod library;
pub mod traits;

pub use context::app_context_for_goal;
pub use library::AppLibrary;
pub use traits::{AppDirectory, AppInfo};
