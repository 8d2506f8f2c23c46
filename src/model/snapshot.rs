use serde::{Deserialize, Serialize};

/// Label used for fullscreen spaces, which never participate in numbering.
pub const FULLSCREEN_LABEL: &str = "F";

/// Label shown when no usable space data exists.
pub const UNKNOWN_LABEL: &str = "?";

/// One space within one display.
///
/// `id` is the window server's opaque identifier, unique within a display's
/// current space list and stable only for the lifetime of that
/// configuration. `regular_index` is the 1-based position among the regular
/// (non-fullscreen) spaces of the display, in reported order, and is absent
/// for fullscreen spaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceEntry {
    pub id: u64,
    pub label: String,
    pub regular_index: Option<usize>,
}

/// One display's parsed space layout.
///
/// Displays keep the provider's order. `global_start_index` is the first
/// global ordinal owned by this display: 1 plus the regular space counts of
/// every display parsed before it, so global numbering partitions the
/// regular spaces across displays with no gaps or overlaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySpaceInfo {
    pub display_id: String,
    pub entries: Vec<SpaceEntry>,
    pub global_start_index: usize,
    pub regular_space_count: usize,
}

/// An immutable point-in-time view of the space layout.
///
/// `all_space_entries` holds the entry list of the active display only;
/// `all_displays_space_info` holds every display for multi-display
/// consumers. The zero/absent values double as the "no usable data"
/// sentinel, so an empty snapshot is indistinguishable in shape from a
/// real-but-degenerate result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub all_displays_space_info: Vec<DisplaySpaceInfo>,
    pub all_space_entries: Vec<SpaceEntry>,
    pub current_display_id: Option<String>,
    /// 1-based position of the active entry in `all_space_entries`; 0 if none.
    pub current_space: usize,
    /// Opaque id of the active entry; 0 if none.
    pub current_space_id: u64,
    /// Display string for the active space; `"?"` if none.
    pub current_space_label: String,
    /// Global ordinal of the active space; 0 if none.
    pub current_global_space_index: usize,
}

impl Snapshot {
    pub fn empty() -> Self {
        Snapshot {
            current_space_label: UNKNOWN_LABEL.to_string(),
            ..Snapshot::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.current_space == 0 && self.all_displays_space_info.is_empty()
    }
}
