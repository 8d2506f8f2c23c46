//! Accessibility trust gating for input synthesis. Not being trusted is a
//! gating condition rather than an error: calls fail normally and the user
//! is prompted at most once per process.

/// Accessibility-style trust checks and the consent prompt.
pub trait PermissionGate: Send {
    /// Whether the trust flag is already granted.
    fn is_trusted(&self) -> bool;

    /// Clear any stale grant record before prompting, so a previously
    /// revoked grant does not suppress the consent dialog.
    fn reset_stale_grant(&self);

    /// Trigger the OS consent prompt. Returns immediately; the grant only
    /// takes effect once the user approves and the caller re-invokes.
    fn request_trust(&self);
}

/// Gate that never grants trust, for headless environments.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeniedGate;

impl PermissionGate for DeniedGate {
    fn is_trusted(&self) -> bool {
        false
    }

    fn reset_stale_grant(&self) {}

    fn request_trust(&self) {}
}

#[cfg(target_os = "macos")]
pub use macos::AccessibilityGate;

#[cfg(target_os = "macos")]
mod macos {
    use std::ffi::c_void;
    use std::process::Command;

    use tracing::{debug, warn};

    use super::PermissionGate;

    const BUNDLE_ID: &str = "dev.spaceline.spaceline";

    #[link(name = "ApplicationServices", kind = "framework")]
    unsafe extern "C" {
        fn AXIsProcessTrusted() -> bool;
        fn AXIsProcessTrustedWithOptions(options: *const c_void) -> bool;
        static kAXTrustedCheckOptionPrompt: *const c_void;
    }

    #[link(name = "CoreFoundation", kind = "framework")]
    unsafe extern "C" {
        fn CFDictionaryCreate(
            allocator: *const c_void,
            keys: *const *const c_void,
            values: *const *const c_void,
            num_values: isize,
            key_callbacks: *const c_void,
            value_callbacks: *const c_void,
        ) -> *const c_void;
        fn CFRelease(cf: *const c_void);
        static kCFTypeDictionaryKeyCallBacks: c_void;
        static kCFTypeDictionaryValueCallBacks: c_void;
        static kCFBooleanTrue: *const c_void;
    }

    /// Trust checks through the accessibility API, with the system consent
    /// prompt as the request mechanism.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct AccessibilityGate;

    impl PermissionGate for AccessibilityGate {
        fn is_trusted(&self) -> bool {
            unsafe { AXIsProcessTrusted() }
        }

        fn reset_stale_grant(&self) {
            match Command::new("tccutil").args(["reset", "Accessibility", BUNDLE_ID]).status() {
                Ok(status) if status.success() => debug!("cleared stale accessibility grant"),
                Ok(status) => debug!(%status, "tccutil reset declined"),
                Err(err) => warn!(%err, "could not run tccutil"),
            }
        }

        fn request_trust(&self) {
            unsafe {
                let keys = [kAXTrustedCheckOptionPrompt];
                let values = [kCFBooleanTrue];
                let options = CFDictionaryCreate(
                    std::ptr::null(),
                    keys.as_ptr(),
                    values.as_ptr(),
                    1,
                    &kCFTypeDictionaryKeyCallBacks as *const c_void,
                    &kCFTypeDictionaryValueCallBacks as *const c_void,
                );
                AXIsProcessTrustedWithOptions(options);
                if !options.is_null() {
                    CFRelease(options);
                }
            }
        }
    }
}
