//! Runtime bindings to the private window server APIs (SkyLight/CGS) that
//! back the space data provider and the symbolic hot key lookup. Symbols
//! are resolved with dlopen/dlsym so a missing facility degrades to "no
//! data" or "capability unavailable" instead of a link failure.

use std::collections::HashSet;
use std::ffi::c_void;

use once_cell::sync::OnceCell;
use tracing::warn;

use crate::sys::hotkey::HotKeyBinding;
use crate::sys::provider::{RawDisplaySpaces, RawSpace, SpaceDataProvider};
use crate::sys::window_server::{CgWindowServer, WindowServer};

const SKYLIGHT_PATH: &std::ffi::CStr =
    c"/System/Library/PrivateFrameworks/SkyLight.framework/SkyLight";

// Selector for SLSCopySpacesForWindows covering all spaces.
const SPACES_ALL: i32 = 0x7;

type MainConnectionIdFn = unsafe extern "C" fn() -> i32;
type CopyManagedDisplaySpacesFn = unsafe extern "C" fn(cid: i32) -> *const c_void;
type CopyActiveMenuBarDisplayIdentifierFn = unsafe extern "C" fn(cid: i32) -> *const c_void;
type CopySpacesForWindowsFn =
    unsafe extern "C" fn(cid: i32, selector: i32, window_ids: *const c_void) -> *const c_void;
type GetSymbolicHotKeyValueFn =
    unsafe extern "C" fn(hotkey: i32, key_equivalent: *mut u16, virtual_key: *mut i32, modifiers: *mut i32) -> i32;
type IsSymbolicHotKeyEnabledFn = unsafe extern "C" fn(hotkey: i32) -> bool;
type SetSymbolicHotKeyEnabledFn = unsafe extern "C" fn(hotkey: i32, enabled: bool) -> i32;

pub(crate) struct SpacesApi {
    main_connection_id: MainConnectionIdFn,
    copy_managed_display_spaces: CopyManagedDisplaySpacesFn,
    copy_active_menu_bar_display_identifier: CopyActiveMenuBarDisplayIdentifierFn,
    copy_spaces_for_windows: CopySpacesForWindowsFn,
}

pub(crate) struct HotKeyApi {
    get_value: GetSymbolicHotKeyValueFn,
    is_enabled: IsSymbolicHotKeyEnabledFn,
    set_enabled: SetSymbolicHotKeyEnabledFn,
}

static SKYLIGHT_HANDLE: OnceCell<Option<usize>> = OnceCell::new();
static SPACES_API: OnceCell<Option<SpacesApi>> = OnceCell::new();
static HOTKEY_API: OnceCell<Option<HotKeyApi>> = OnceCell::new();

fn skylight_handle() -> Option<*mut c_void> {
    SKYLIGHT_HANDLE
        .get_or_init(|| {
            let handle = unsafe { libc::dlopen(SKYLIGHT_PATH.as_ptr(), libc::RTLD_LAZY) };
            if handle.is_null() {
                warn!("could not open the SkyLight framework");
                None
            } else {
                Some(handle as usize)
            }
        })
        .map(|addr| addr as *mut c_void)
}

macro_rules! load_sym {
    ($handle:expr, $name:expr, $ty:ty) => {{
        let sym = unsafe { libc::dlsym($handle, $name.as_ptr()) };
        if sym.is_null() {
            warn!(
                "window server symbol {} not found",
                String::from_utf8_lossy($name.to_bytes())
            );
            return None;
        }
        unsafe { std::mem::transmute::<*mut c_void, $ty>(sym) }
    }};
}

pub(crate) fn spaces_api() -> Option<&'static SpacesApi> {
    SPACES_API
        .get_or_init(|| {
            let handle = skylight_handle()?;
            Some(SpacesApi {
                main_connection_id: load_sym!(handle, c"SLSMainConnectionID", MainConnectionIdFn),
                copy_managed_display_spaces: load_sym!(
                    handle,
                    c"CGSCopyManagedDisplaySpaces",
                    CopyManagedDisplaySpacesFn
                ),
                copy_active_menu_bar_display_identifier: load_sym!(
                    handle,
                    c"CGSCopyActiveMenuBarDisplayIdentifier",
                    CopyActiveMenuBarDisplayIdentifierFn
                ),
                copy_spaces_for_windows: load_sym!(
                    handle,
                    c"SLSCopySpacesForWindows",
                    CopySpacesForWindowsFn
                ),
            })
        })
        .as_ref()
}

pub(crate) fn hotkey_api() -> Option<&'static HotKeyApi> {
    HOTKEY_API
        .get_or_init(|| {
            let handle = skylight_handle()?;
            Some(HotKeyApi {
                get_value: load_sym!(handle, c"CGSGetSymbolicHotKeyValue", GetSymbolicHotKeyValueFn),
                is_enabled: load_sym!(handle, c"CGSIsSymbolicHotKeyEnabled", IsSymbolicHotKeyEnabledFn),
                set_enabled: load_sym!(handle, c"CGSSetSymbolicHotKeyEnabled", SetSymbolicHotKeyEnabledFn),
            })
        })
        .as_ref()
}

pub(crate) fn symbolic_hotkey_value(index: u32) -> Option<HotKeyBinding> {
    let api = hotkey_api()?;
    let mut key_equivalent: u16 = 0;
    let mut virtual_key: i32 = 0;
    let mut modifiers: i32 = 0;
    let err = unsafe {
        (api.get_value)(index as i32, &mut key_equivalent, &mut virtual_key, &mut modifiers)
    };
    if err != 0 {
        return None;
    }
    Some(HotKeyBinding {
        key_code: virtual_key as u16,
        modifier_flags: modifiers as u32 as u64,
    })
}

pub(crate) fn symbolic_hotkey_enabled(index: u32) -> bool {
    hotkey_api().map(|api| unsafe { (api.is_enabled)(index as i32) }).unwrap_or(false)
}

pub(crate) fn set_symbolic_hotkey_enabled(index: u32, enabled: bool) {
    if let Some(api) = hotkey_api() {
        let err = unsafe { (api.set_enabled)(index as i32, enabled) };
        if err != 0 {
            warn!(index, enabled, err, "could not change symbolic hot key state");
        }
    }
}

/// Space data provider backed by the live window server connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkylightProvider;

impl SpaceDataProvider for SkylightProvider {
    fn list_displays_and_spaces(&self) -> Option<Vec<RawDisplaySpaces>> {
        let api = spaces_api()?;
        unsafe {
            let cid = (api.main_connection_id)();
            let display_list = (api.copy_managed_display_spaces)(cid);
            if display_list.is_null() {
                warn!("managed display space query returned no data");
                return None;
            }

            let mut displays = Vec::new();
            for i in 0..cf::array_count(display_list) {
                let display_dict = cf::array_value(display_list, i);
                if display_dict.is_null() {
                    continue;
                }
                let display_id = cf::dict_string(display_dict, "Display Identifier");
                let spaces = {
                    let spaces_array = cf::dict_value(display_dict, "Spaces");
                    if spaces_array.is_null() {
                        None
                    } else {
                        let mut spaces = Vec::new();
                        for j in 0..cf::array_count(spaces_array) {
                            let space_dict = cf::array_value(spaces_array, j);
                            if space_dict.is_null() {
                                continue;
                            }
                            spaces.push(RawSpace {
                                id: cf::dict_u64(space_dict, "id64"),
                                fullscreen: !cf::dict_value(space_dict, "TileLayoutManager")
                                    .is_null(),
                            });
                        }
                        Some(spaces)
                    }
                };
                let current_space_id = {
                    let current = cf::dict_value(display_dict, "Current Space");
                    if current.is_null() { None } else { cf::dict_u64(current, "id64") }
                };
                displays.push(RawDisplaySpaces { display_id, spaces, current_space_id });
            }
            cf::release(display_list);
            Some(displays)
        }
    }

    fn active_display_identifier(&self) -> Option<String> {
        let api = spaces_api()?;
        unsafe {
            let cid = (api.main_connection_id)();
            let identifier = (api.copy_active_menu_bar_display_identifier)(cid);
            if identifier.is_null() {
                return None;
            }
            let value = cf::string_value(identifier);
            cf::release(identifier);
            value
        }
    }

    fn spaces_for_windows(&self, window_ids: &[u32]) -> Vec<u64> {
        let Some(api) = spaces_api() else {
            return vec![0; window_ids.len()];
        };
        unsafe {
            let ids = cf::number_array(window_ids);
            let cid = (api.main_connection_id)();
            let spaces = (api.copy_spaces_for_windows)(cid, SPACES_ALL, ids);
            cf::release(ids);
            if spaces.is_null() {
                return vec![0; window_ids.len()];
            }
            let mut result = Vec::with_capacity(window_ids.len());
            for i in 0..cf::array_count(spaces) {
                result.push(cf::number_value(cf::array_value(spaces, i)).unwrap_or(0));
            }
            cf::release(spaces);
            result.resize(window_ids.len(), 0);
            result
        }
    }

    fn spaces_with_visible_content(&self, candidates: &[u64]) -> HashSet<u64> {
        let window_ids: Vec<u32> =
            CgWindowServer.onscreen_windows().iter().map(|w| w.window_id).collect();
        let occupied: HashSet<u64> = self.spaces_for_windows(&window_ids).into_iter().collect();
        candidates.iter().copied().filter(|id| occupied.contains(id)).collect()
    }
}

/// Thin CoreFoundation helpers over the raw C API, shared by the modules
/// that parse window server dictionaries.
pub(crate) mod cf {
    use std::ffi::c_void;

    const UTF8: u32 = 0x0800_0100;
    const NUMBER_SINT64: isize = 4;
    const NUMBER_FLOAT64: isize = 6;

    #[link(name = "CoreFoundation", kind = "framework")]
    unsafe extern "C" {
        fn CFArrayGetCount(array: *const c_void) -> isize;
        fn CFArrayGetValueAtIndex(array: *const c_void, index: isize) -> *const c_void;
        fn CFArrayCreate(
            allocator: *const c_void,
            values: *const *const c_void,
            count: isize,
            callbacks: *const c_void,
        ) -> *const c_void;
        fn CFDictionaryGetValue(dict: *const c_void, key: *const c_void) -> *const c_void;
        fn CFNumberCreate(
            allocator: *const c_void,
            number_type: isize,
            value: *const c_void,
        ) -> *const c_void;
        fn CFNumberGetValue(number: *const c_void, number_type: isize, out: *mut c_void) -> bool;
        fn CFStringCreateWithCString(
            allocator: *const c_void,
            c_str: *const i8,
            encoding: u32,
        ) -> *const c_void;
        fn CFStringGetLength(string: *const c_void) -> isize;
        fn CFStringGetMaximumSizeForEncoding(length: isize, encoding: u32) -> isize;
        fn CFStringGetCString(
            string: *const c_void,
            buffer: *mut i8,
            buffer_size: isize,
            encoding: u32,
        ) -> bool;
        fn CFRelease(cf: *const c_void);
        static kCFTypeArrayCallBacks: c_void;
    }

    pub(crate) fn array_count(array: *const c_void) -> isize {
        unsafe { CFArrayGetCount(array) }
    }

    pub(crate) fn array_value(array: *const c_void, index: isize) -> *const c_void {
        unsafe { CFArrayGetValueAtIndex(array, index) }
    }

    pub(crate) fn release(cf: *const c_void) {
        if !cf.is_null() {
            unsafe { CFRelease(cf) }
        }
    }

    /// Look up `key` in `dict`. Returns a borrowed reference (not retained).
    pub(crate) fn dict_value(dict: *const c_void, key: &str) -> *const c_void {
        let c_key = match std::ffi::CString::new(key) {
            Ok(c_key) => c_key,
            Err(_) => return std::ptr::null(),
        };
        unsafe {
            let cf_key = CFStringCreateWithCString(std::ptr::null(), c_key.as_ptr(), UTF8);
            if cf_key.is_null() {
                return std::ptr::null();
            }
            let value = CFDictionaryGetValue(dict, cf_key);
            CFRelease(cf_key);
            value
        }
    }

    pub(crate) fn number_value(number: *const c_void) -> Option<u64> {
        if number.is_null() {
            return None;
        }
        let mut out: i64 = 0;
        let ok = unsafe { CFNumberGetValue(number, NUMBER_SINT64, &mut out as *mut i64 as *mut c_void) };
        ok.then_some(out as u64)
    }

    pub(crate) fn dict_u64(dict: *const c_void, key: &str) -> Option<u64> {
        number_value(dict_value(dict, key))
    }

    pub(crate) fn dict_f64(dict: *const c_void, key: &str) -> Option<f64> {
        let number = dict_value(dict, key);
        if number.is_null() {
            return None;
        }
        let mut out: f64 = 0.0;
        let ok = unsafe { CFNumberGetValue(number, NUMBER_FLOAT64, &mut out as *mut f64 as *mut c_void) };
        ok.then_some(out)
    }

    pub(crate) fn string_value(string: *const c_void) -> Option<String> {
        if string.is_null() {
            return None;
        }
        unsafe {
            let length = CFStringGetLength(string);
            let capacity = CFStringGetMaximumSizeForEncoding(length, UTF8) + 1;
            let mut buffer = vec![0i8; capacity as usize];
            if !CFStringGetCString(string, buffer.as_mut_ptr(), capacity, UTF8) {
                return None;
            }
            let c_str = std::ffi::CStr::from_ptr(buffer.as_ptr());
            Some(c_str.to_string_lossy().into_owned())
        }
    }

    pub(crate) fn dict_string(dict: *const c_void, key: &str) -> Option<String> {
        string_value(dict_value(dict, key))
    }

    /// Create a retained CFArray of CFNumbers from window ids.
    pub(crate) fn number_array(values: &[u32]) -> *const c_void {
        unsafe {
            let numbers: Vec<*const c_void> = values
                .iter()
                .map(|&value| {
                    let wide = value as i64;
                    CFNumberCreate(std::ptr::null(), NUMBER_SINT64, &wide as *const i64 as *const c_void)
                })
                .collect();
            let array = CFArrayCreate(
                std::ptr::null(),
                numbers.as_ptr(),
                numbers.len() as isize,
                &kCFTypeArrayCallBacks as *const c_void,
            );
            for number in numbers {
                CFRelease(number);
            }
            array
        }
    }
}
