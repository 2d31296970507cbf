pub mod app;
pub mod track_list;


pub use app::*;
