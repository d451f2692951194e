/// Initialize logging with the given default level. Respects `RUST_LOG`
/// overrides.
pub fn init_logging(default_level: log::LevelFilter) {
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();
}

pub mod display;
pub mod input;
pub mod menu;
pub mod pages;
pub mod rgb565;
pub mod st7789;
pub mod state;
