pub mod camera;
pub mod config;
pub mod hardware;
pub mod modes;
pub mod runtime;
pub mod upload;
