pub mod config;
pub mod library;
pub mod library_watcher;


pub use config::*;
pub use library::*;
pub use library_watcher::*;
