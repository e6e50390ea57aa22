//! Command implementations behind the `memoryd` binary.

pub mod daemon;
pub mod memory;
pub mod model;

pub use daemon::{ping, start, status, stop};
pub use memory::{retrieve, store};
pub use model::model_download;
