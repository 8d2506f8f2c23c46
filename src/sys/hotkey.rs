//! Symbolic hot keys: OS-defined, enable/disable-able shortcut bindings
//! identified by an index, independent of the user's configured physical
//! key combination.

/// Symbolic hot key index for "switch to desktop 1"; desktop `n` lives at
/// `SPACE_HOTKEY_BASE + n - 1`.
pub const SPACE_HOTKEY_BASE: u32 = 118;

/// Highest space ordinal the window manager exposes a shortcut slot for.
pub const MAX_SUPPORTED_SPACE: usize = 16;

/// Current virtual key code and modifier flags bound to a symbolic hot key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotKeyBinding {
    pub key_code: u16,
    pub modifier_flags: u64,
}

/// Low-level symbolic hot key lookup.
pub trait HotKeyProvider: Send {
    /// Whether the symbolic hot key API is resolvable on this system.
    /// Computed once; the rest of the switcher is gated on this flag.
    fn available(&self) -> bool;

    fn value_for(&self, index: u32) -> Option<HotKeyBinding>;

    fn is_enabled(&self, index: u32) -> bool;

    fn set_enabled(&self, index: u32, enabled: bool);
}

/// Hot key provider for systems without the symbolic hot key API.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableHotKeys;

impl HotKeyProvider for UnavailableHotKeys {
    fn available(&self) -> bool {
        false
    }

    fn value_for(&self, _index: u32) -> Option<HotKeyBinding> {
        None
    }

    fn is_enabled(&self, _index: u32) -> bool {
        false
    }

    fn set_enabled(&self, _index: u32, _enabled: bool) {}
}

#[cfg(target_os = "macos")]
pub use macos::SymbolicHotKeys;

#[cfg(target_os = "macos")]
mod macos {
    use super::{HotKeyBinding, HotKeyProvider};
    use crate::sys::skylight;

    /// Symbolic hot key access through the private window server API,
    /// resolved at runtime so missing symbols degrade to "unavailable"
    /// rather than a link failure.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SymbolicHotKeys;

    impl HotKeyProvider for SymbolicHotKeys {
        fn available(&self) -> bool {
            skylight::hotkey_api().is_some()
        }

        fn value_for(&self, index: u32) -> Option<HotKeyBinding> {
            skylight::symbolic_hotkey_value(index)
        }

        fn is_enabled(&self, index: u32) -> bool {
            skylight::symbolic_hotkey_enabled(index)
        }

        fn set_enabled(&self, index: u32, enabled: bool) {
            skylight::set_symbolic_hotkey_enabled(index, enabled);
        }
    }
}
