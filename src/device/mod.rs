pub mod adb;
pub mod connection;
pub mod traits;

pub use traits::{Button, DeviceBridge, PackageFilter};
