pub mod event;
pub mod hotkey;
pub mod permission;
pub mod process;
pub mod provider;
pub mod window_server;

#[cfg(target_os = "macos")]
pub mod skylight;
