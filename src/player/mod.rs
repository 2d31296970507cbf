//! Playback through an external player process.
//!
//! - `process.rs` - player binary lookup, spawning and signalling
//! - `controller.rs` - play/pause/resume/stop state machine
//! - `monitor.rs` - background exit detection for the live process

mod controller;
mod error;
mod monitor;
mod process;

#[cfg(all(test, unix))]
mod tests;

pub use controller::{PlaybackController, PlaybackTimings};
pub use error::PlaybackError;
pub use process::{PlayerCommand, PlayerProcess};
