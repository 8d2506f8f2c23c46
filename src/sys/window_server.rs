//! On-screen window enumeration and application activation, used by the
//! fullscreen-space fallback: foregrounding a process that owns a window on
//! a fullscreen space makes the OS switch to that space.

/// One on-screen window as reported by the window server.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowInfo {
    pub window_id: u32,
    pub owner_pid: i32,
    pub layer: i32,
    pub width: f64,
    pub height: f64,
}

impl WindowInfo {
    /// Ordinary top-level windows only: system chrome sits on non-zero
    /// layers and degenerate zero-area windows own no visible content.
    pub fn is_ordinary(&self) -> bool {
        self.layer == 0 && self.width > 0.0 && self.height > 0.0
    }
}

/// Window enumeration and process foregrounding.
pub trait WindowServer: Send {
    fn onscreen_windows(&self) -> Vec<WindowInfo>;

    /// Bring the application owning `pid` to the foreground.
    fn activate_application(&self, pid: i32) -> bool;
}

/// Window server for headless environments: no windows, no activation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullWindowServer;

impl WindowServer for NullWindowServer {
    fn onscreen_windows(&self) -> Vec<WindowInfo> {
        Vec::new()
    }

    fn activate_application(&self, _pid: i32) -> bool {
        false
    }
}

#[cfg(target_os = "macos")]
pub use macos::CgWindowServer;

#[cfg(target_os = "macos")]
mod macos {
    use std::ffi::c_void;

    use objc2_app_kit::{NSApplicationActivationOptions, NSRunningApplication};
    use tracing::warn;

    use super::{WindowInfo, WindowServer};
    use crate::sys::skylight::cf;

    const ON_SCREEN_ONLY: u32 = 1 << 0;
    const EXCLUDE_DESKTOP_ELEMENTS: u32 = 1 << 4;
    const NULL_WINDOW_ID: u32 = 0;

    #[link(name = "CoreGraphics", kind = "framework")]
    unsafe extern "C" {
        fn CGWindowListCopyWindowInfo(option: u32, relative_to_window: u32) -> *const c_void;
    }

    /// Enumeration through the window list API, activation through the
    /// shared workspace.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct CgWindowServer;

    impl WindowServer for CgWindowServer {
        fn onscreen_windows(&self) -> Vec<WindowInfo> {
            unsafe {
                let list = CGWindowListCopyWindowInfo(
                    ON_SCREEN_ONLY | EXCLUDE_DESKTOP_ELEMENTS,
                    NULL_WINDOW_ID,
                );
                if list.is_null() {
                    warn!("window list query returned no data");
                    return Vec::new();
                }

                let mut windows = Vec::new();
                for i in 0..cf::array_count(list) {
                    let dict = cf::array_value(list, i);
                    if dict.is_null() {
                        continue;
                    }
                    let Some(window_id) = cf::dict_u64(dict, "kCGWindowNumber") else {
                        continue;
                    };
                    let Some(owner_pid) = cf::dict_u64(dict, "kCGWindowOwnerPID") else {
                        continue;
                    };
                    let layer = cf::dict_u64(dict, "kCGWindowLayer").unwrap_or(0) as i32;
                    let bounds = cf::dict_value(dict, "kCGWindowBounds");
                    let (width, height) = if bounds.is_null() {
                        (0.0, 0.0)
                    } else {
                        (
                            cf::dict_f64(bounds, "Width").unwrap_or(0.0),
                            cf::dict_f64(bounds, "Height").unwrap_or(0.0),
                        )
                    };
                    windows.push(WindowInfo {
                        window_id: window_id as u32,
                        owner_pid: owner_pid as i32,
                        layer,
                        width,
                        height,
                    });
                }
                cf::release(list);
                windows
            }
        }

        fn activate_application(&self, pid: i32) -> bool {
            let app = unsafe { NSRunningApplication::runningApplicationWithProcessIdentifier(pid) };
            match app {
                Some(app) => unsafe {
                    app.activateWithOptions(
                        NSApplicationActivationOptions::NSApplicationActivateIgnoringOtherApps,
                    )
                },
                None => {
                    warn!(pid, "no running application for pid");
                    false
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chrome_and_degenerate_windows_are_not_ordinary() {
        let ordinary = WindowInfo { window_id: 1, owner_pid: 10, layer: 0, width: 800.0, height: 600.0 };
        let chrome = WindowInfo { layer: 25, ..ordinary };
        let degenerate = WindowInfo { width: 0.0, ..ordinary };

        assert!(ordinary.is_ordinary());
        assert!(!chrome.is_ordinary());
        assert!(!degenerate.is_ordinary());
    }
}
