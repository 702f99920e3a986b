//! Platform abstraction layer
//!
//! Handles browser/native differences for logger setup. Rendering, input and
//! storage belong to the host embedding the simulation.

/// Install the logger for the current platform.
///
/// Native builds use `env_logger` (respects `RUST_LOG`), browser builds log to
/// the devtools console and route panics there too. Safe to call twice.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

#[cfg(target_arch = "wasm32")]
pub fn init_logging() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
}
