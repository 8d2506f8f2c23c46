//! Synthesized keyboard input. The switcher posts a key-down/key-up pair
//! that mimics the user pressing the space shortcut; the window manager
//! intercepts it and performs the switch.

/// Sink for synthesized key events on the system-wide input stream.
pub trait InputEventSink: Send {
    /// Post a key-down carrying the resolved code and modifier flags.
    fn post_key_down(&self, key_code: u16, modifier_flags: u64);

    /// Post a key-up with the same key code and no modifiers.
    fn post_key_up(&self, key_code: u16);
}

/// Event sink that drops everything, for headless environments.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl InputEventSink for NullEventSink {
    fn post_key_down(&self, _key_code: u16, _modifier_flags: u64) {}

    fn post_key_up(&self, _key_code: u16) {}
}

#[cfg(target_os = "macos")]
pub use macos::HidEventSink;

#[cfg(target_os = "macos")]
mod macos {
    use std::ffi::c_void;

    use tracing::warn;

    use super::InputEventSink;

    // kCGHIDEventTap: events enter the system at the HID level, upstream of
    // the window manager's shortcut handling.
    const HID_EVENT_TAP: u32 = 0;

    #[link(name = "CoreGraphics", kind = "framework")]
    unsafe extern "C" {
        fn CGEventCreateKeyboardEvent(
            source: *const c_void,
            virtual_key: u16,
            key_down: bool,
        ) -> *mut c_void;
        fn CGEventSetFlags(event: *mut c_void, flags: u64);
        fn CGEventPost(tap: u32, event: *mut c_void);
    }

    #[link(name = "CoreFoundation", kind = "framework")]
    unsafe extern "C" {
        fn CFRelease(cf: *const c_void);
    }

    /// Posts synthesized key events to the global HID event tap.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct HidEventSink;

    fn post(key_code: u16, flags: u64, key_down: bool) {
        unsafe {
            let event = CGEventCreateKeyboardEvent(std::ptr::null(), key_code, key_down);
            if event.is_null() {
                warn!(key_code, key_down, "could not create keyboard event");
                return;
            }
            CGEventSetFlags(event, flags);
            CGEventPost(HID_EVENT_TAP, event);
            CFRelease(event);
        }
    }

    impl InputEventSink for HidEventSink {
        fn post_key_down(&self, key_code: u16, modifier_flags: u64) {
            post(key_code, modifier_flags, true);
        }

        fn post_key_up(&self, key_code: u16) {
            post(key_code, 0, false);
        }
    }
}
