//! Raw space data as reported by the window server, before any numbering or
//! validation is applied. The shapes mirror the managed-display-spaces
//! dictionaries: loosely structured, partially untrustworthy, every field
//! optional.

use std::collections::HashSet;

/// Display identifier the window server uses for the primary display. Also
/// serves as the fall-back when the reported active display cannot be
/// matched.
pub const PRIMARY_DISPLAY_ID: &str = "Main";

/// One raw space record within a display's space list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSpace {
    /// Missing ids mark a malformed record; the entry is skipped.
    pub id: Option<u64>,
    /// Set when the record carries a tiling-layout marker, i.e. the space is
    /// a fullscreen space.
    pub fullscreen: bool,
}

/// One raw per-display record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDisplaySpaces {
    pub display_id: Option<String>,
    pub spaces: Option<Vec<RawSpace>>,
    /// Id of the space currently shown on this display, if reported.
    pub current_space_id: Option<u64>,
}

/// Interface to the OS queries backing the snapshot builder and the
/// fullscreen-activation fallback. Implementations must never block for
/// long and must report missing data as `None`/empty rather than failing.
pub trait SpaceDataProvider: Send + Sync {
    /// Per-display raw space listings, in the window server's display order.
    fn list_displays_and_spaces(&self) -> Option<Vec<RawDisplaySpaces>>;

    /// Identifier of the display currently holding window-manager focus.
    fn active_display_identifier(&self) -> Option<String>;

    /// Space membership for a batch of window ids, one result per input in
    /// the same order (0 when unknown). One query for the whole batch.
    fn spaces_for_windows(&self, window_ids: &[u32]) -> Vec<u64>;

    /// Which of the candidate space ids currently have on-screen content.
    fn spaces_with_visible_content(&self, candidates: &[u64]) -> HashSet<u64>;
}

/// Provider for test and headless environments: reports no data at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessProvider;

impl SpaceDataProvider for HeadlessProvider {
    fn list_displays_and_spaces(&self) -> Option<Vec<RawDisplaySpaces>> {
        None
    }

    fn active_display_identifier(&self) -> Option<String> {
        None
    }

    fn spaces_for_windows(&self, window_ids: &[u32]) -> Vec<u64> {
        vec![0; window_ids.len()]
    }

    fn spaces_with_visible_content(&self, _candidates: &[u64]) -> HashSet<u64> {
        HashSet::new()
    }
}
