//! Turns the window server's raw per-display space listings into one
//! consistent, ordered [`Snapshot`]. Pure and infallible: malformed upstream
//! data degrades to skipped records or the empty snapshot, never an error.

use tracing::{debug, warn};

use crate::model::snapshot::{DisplaySpaceInfo, Snapshot, SpaceEntry, FULLSCREEN_LABEL};
use crate::sys::provider::{SpaceDataProvider, PRIMARY_DISPLAY_ID};

/// Builds a snapshot from the provider's current state.
///
/// With `local_numbering` the active space is labeled by its per-display
/// ordinal; otherwise by its global ordinal across all displays. Provider
/// order is authoritative and never re-sorted; numbering is purely
/// positional, since the opaque ids are not guaranteed to sort meaningfully.
pub fn build_snapshot(provider: &dyn SpaceDataProvider, local_numbering: bool) -> Snapshot {
    let Some(raw_displays) = provider.list_displays_and_spaces() else {
        debug!("no managed display space data available");
        return Snapshot::empty();
    };
    let active_hint = provider.active_display_identifier();

    let mut displays = Vec::with_capacity(raw_displays.len());
    for raw in &raw_displays {
        let Some(display_id) = raw.display_id.clone() else {
            warn!("skipping display record without an identifier");
            continue;
        };
        let Some(raw_spaces) = raw.spaces.as_ref() else {
            warn!(%display_id, "skipping display record without a space list");
            continue;
        };

        let mut entries = Vec::with_capacity(raw_spaces.len());
        let mut regular_count = 0usize;
        for raw_space in raw_spaces {
            let Some(id) = raw_space.id else {
                warn!(%display_id, "skipping space record without an id");
                continue;
            };
            if raw_space.fullscreen {
                entries.push(SpaceEntry {
                    id,
                    label: FULLSCREEN_LABEL.to_string(),
                    regular_index: None,
                });
            } else {
                regular_count += 1;
                entries.push(SpaceEntry {
                    id,
                    label: regular_count.to_string(),
                    regular_index: Some(regular_count),
                });
            }
        }
        if entries.is_empty() {
            debug!(%display_id, "discarding display with no usable spaces");
            continue;
        }
        displays.push(DisplaySpaceInfo {
            display_id,
            entries,
            global_start_index: 0,
            regular_space_count: regular_count,
        });
    }

    let mut next_start = 1usize;
    for display in &mut displays {
        display.global_start_index = next_start;
        next_start += display.regular_space_count;
    }

    let active_idx = active_hint
        .as_deref()
        .and_then(|id| displays.iter().position(|d| d.display_id == id))
        .or_else(|| displays.iter().position(|d| d.display_id == PRIMARY_DISPLAY_ID));
    let Some(active_idx) = active_idx else {
        debug!(?active_hint, "active display not found among parsed displays");
        return Snapshot::empty();
    };
    let active_display_id = displays[active_idx].display_id.clone();

    // The current-space id lives in the raw record, not in the parsed entry
    // list, so re-scan the provider data for the selected display.
    let current_id = raw_displays.iter().find_map(|raw| {
        match (raw.display_id.as_deref(), raw.current_space_id) {
            (Some(id), Some(current)) if id == active_display_id => Some(current),
            _ => None,
        }
    });
    let Some(current_id) = current_id else {
        debug!(display_id = %active_display_id, "no current space reported for active display");
        return Snapshot::empty();
    };

    let entries = displays[active_idx].entries.clone();
    let Some(position) = entries.iter().position(|e| e.id == current_id) else {
        debug!(
            display_id = %active_display_id,
            current_id, "current space id not present in active display's entries"
        );
        return Snapshot::empty();
    };
    let entry = &entries[position];
    let global_start = displays[active_idx].global_start_index;
    // Fullscreen entries have no regular ordinal; they occupy the display's
    // first global slot.
    let global_index = match entry.regular_index {
        Some(regular) => global_start + regular - 1,
        None => global_start,
    };
    let label = if entry.regular_index.is_none() {
        FULLSCREEN_LABEL.to_string()
    } else if local_numbering {
        entry.label.clone()
    } else {
        global_index.to_string()
    };

    Snapshot {
        all_space_entries: entries,
        all_displays_space_info: displays,
        current_display_id: Some(active_display_id),
        current_space: position + 1,
        current_space_id: current_id,
        current_space_label: label,
        current_global_space_index: global_index,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::sys::provider::{HeadlessProvider, RawDisplaySpaces, RawSpace};

    #[derive(Default)]
    struct FakeProvider {
        displays: Option<Vec<RawDisplaySpaces>>,
        active: Option<String>,
    }

    impl SpaceDataProvider for FakeProvider {
        fn list_displays_and_spaces(&self) -> Option<Vec<RawDisplaySpaces>> {
            self.displays.clone()
        }

        fn active_display_identifier(&self) -> Option<String> {
            self.active.clone()
        }

        fn spaces_for_windows(&self, window_ids: &[u32]) -> Vec<u64> {
            vec![0; window_ids.len()]
        }

        fn spaces_with_visible_content(&self, _candidates: &[u64]) -> HashSet<u64> {
            HashSet::new()
        }
    }

    fn regular(id: u64) -> RawSpace {
        RawSpace { id: Some(id), fullscreen: false }
    }

    fn fullscreen(id: u64) -> RawSpace {
        RawSpace { id: Some(id), fullscreen: true }
    }

    fn display(id: &str, spaces: Vec<RawSpace>, current: Option<u64>) -> RawDisplaySpaces {
        RawDisplaySpaces {
            display_id: Some(id.to_string()),
            spaces: Some(spaces),
            current_space_id: current,
        }
    }

    #[test]
    fn single_display_regular_spaces_number_from_one() {
        let provider = FakeProvider {
            displays: Some(vec![display(
                "Main",
                vec![regular(10), regular(11), regular(12)],
                Some(10),
            )]),
            active: Some("Main".to_string()),
        };

        let snapshot = build_snapshot(&provider, false);
        let info = &snapshot.all_displays_space_info[0];
        assert_eq!(info.regular_space_count, 3);
        assert_eq!(info.global_start_index, 1);
        let labels: Vec<&str> = info.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["1", "2", "3"]);
    }

    #[test]
    fn second_display_continues_global_numbering() {
        let provider = FakeProvider {
            displays: Some(vec![
                display("Main", vec![regular(10), regular(11)], Some(10)),
                display("Side", vec![regular(20), regular(21), regular(22)], Some(21)),
            ]),
            active: Some("Side".to_string()),
        };

        let snapshot = build_snapshot(&provider, false);
        let side = &snapshot.all_displays_space_info[1];
        assert_eq!(side.global_start_index, 3);
        // Active entry is the second regular space on the second display.
        assert_eq!(snapshot.current_global_space_index, 4);
        assert_eq!(snapshot.current_space_label, "4");
    }

    #[test]
    fn fullscreen_entry_labels_f_regardless_of_preference() {
        let displays = vec![display("Main", vec![regular(1), fullscreen(2)], Some(2))];
        for local_numbering in [false, true] {
            let provider = FakeProvider {
                displays: Some(displays.clone()),
                active: Some("Main".to_string()),
            };
            let snapshot = build_snapshot(&provider, local_numbering);
            assert_eq!(snapshot.current_space_label, "F");
        }
    }

    #[test]
    fn fullscreen_active_entry_pins_global_index_to_display_start() {
        let provider = FakeProvider {
            displays: Some(vec![
                display("Main", vec![regular(1), regular(2)], Some(1)),
                display("Side", vec![regular(10), fullscreen(11)], Some(11)),
            ]),
            active: Some("Side".to_string()),
        };

        let snapshot = build_snapshot(&provider, false);
        assert_eq!(snapshot.current_space, 2);
        assert_eq!(snapshot.current_global_space_index, 3);
    }

    #[test]
    fn active_entry_position_and_id_are_extracted() {
        let provider = FakeProvider {
            displays: Some(vec![display(
                "Main",
                vec![regular(10), regular(11), regular(12)],
                Some(11),
            )]),
            active: Some("Main".to_string()),
        };

        let snapshot = build_snapshot(&provider, false);
        assert_eq!(snapshot.current_space, 2);
        assert_eq!(snapshot.current_space_id, 11);
    }

    #[test]
    fn no_provider_data_yields_empty() {
        assert_eq!(build_snapshot(&HeadlessProvider, false), Snapshot::empty());
        assert_eq!(Snapshot::empty().current_space_label, "?");
    }

    #[test]
    fn unmatched_active_display_yields_empty() {
        let provider = FakeProvider {
            displays: Some(vec![display("External", vec![regular(1)], Some(1))]),
            active: Some("Missing".to_string()),
        };
        assert_eq!(build_snapshot(&provider, false), Snapshot::empty());
    }

    #[test]
    fn unmatched_active_display_falls_back_to_primary() {
        let provider = FakeProvider {
            displays: Some(vec![
                display("External", vec![regular(1)], Some(1)),
                display("Main", vec![regular(5), regular(6)], Some(6)),
            ]),
            active: Some("Gone".to_string()),
        };

        let snapshot = build_snapshot(&provider, false);
        assert_eq!(snapshot.current_display_id.as_deref(), Some("Main"));
        assert_eq!(snapshot.current_space_id, 6);
    }

    #[test]
    fn missing_current_space_record_yields_empty() {
        let provider = FakeProvider {
            displays: Some(vec![display("Main", vec![regular(1)], None)]),
            active: Some("Main".to_string()),
        };
        assert_eq!(build_snapshot(&provider, false), Snapshot::empty());
    }

    #[test]
    fn current_space_id_not_in_entries_yields_empty() {
        let provider = FakeProvider {
            displays: Some(vec![display("Main", vec![regular(1), regular(2)], Some(99))]),
            active: Some("Main".to_string()),
        };
        assert_eq!(build_snapshot(&provider, false), Snapshot::empty());
    }

    #[test]
    fn malformed_records_are_skipped_without_discarding_siblings() {
        let provider = FakeProvider {
            displays: Some(vec![
                RawDisplaySpaces {
                    display_id: None,
                    spaces: Some(vec![regular(1)]),
                    current_space_id: Some(1),
                },
                RawDisplaySpaces {
                    display_id: Some("NoSpaces".to_string()),
                    spaces: None,
                    current_space_id: None,
                },
                display(
                    "Main",
                    vec![
                        RawSpace { id: None, fullscreen: false },
                        regular(10),
                        regular(11),
                    ],
                    Some(11),
                ),
            ]),
            active: Some("Main".to_string()),
        };

        let snapshot = build_snapshot(&provider, false);
        assert_eq!(snapshot.all_displays_space_info.len(), 1);
        assert_eq!(snapshot.all_space_entries.len(), 2);
        assert_eq!(snapshot.current_space, 2);
        assert_eq!(snapshot.current_space_label, "2");
    }

    #[test]
    fn display_with_only_malformed_spaces_is_discarded() {
        let provider = FakeProvider {
            displays: Some(vec![
                display("Empty", vec![RawSpace { id: None, fullscreen: false }], Some(1)),
                display("Main", vec![regular(7)], Some(7)),
            ]),
            active: Some("Main".to_string()),
        };

        let snapshot = build_snapshot(&provider, false);
        assert_eq!(snapshot.all_displays_space_info.len(), 1);
        assert_eq!(snapshot.all_displays_space_info[0].display_id, "Main");
        assert_eq!(snapshot.all_displays_space_info[0].global_start_index, 1);
    }

    #[test]
    fn duplicate_ids_resolve_to_first_match() {
        let provider = FakeProvider {
            displays: Some(vec![display("Main", vec![regular(5), regular(5)], Some(5))]),
            active: Some("Main".to_string()),
        };

        let snapshot = build_snapshot(&provider, false);
        assert_eq!(snapshot.current_space, 1);
    }

    #[test]
    fn rebuilding_unchanged_input_is_deterministic() {
        let provider = FakeProvider {
            displays: Some(vec![
                display("Main", vec![regular(10), fullscreen(13), regular(11)], Some(11)),
                display("Side", vec![regular(20)], Some(20)),
            ]),
            active: Some("Main".to_string()),
        };

        let first = build_snapshot(&provider, true);
        let second = build_snapshot(&provider, true);
        assert_eq!(first, second);
    }

    #[test]
    fn local_numbering_uses_per_display_ordinal() {
        let provider = FakeProvider {
            displays: Some(vec![
                display("Main", vec![regular(1), regular(2)], Some(1)),
                display("Side", vec![regular(10), regular(11)], Some(11)),
            ]),
            active: Some("Side".to_string()),
        };

        let snapshot = build_snapshot(&provider, true);
        assert_eq!(snapshot.current_space_label, "2");
        assert_eq!(snapshot.current_global_space_index, 4);
    }

    #[test]
    fn main_display_scenario_with_trailing_fullscreen_space() {
        let provider = FakeProvider {
            displays: Some(vec![display(
                "Main",
                vec![regular(10), regular(11), regular(12), fullscreen(13)],
                Some(11),
            )]),
            active: Some("Main".to_string()),
        };

        let snapshot = build_snapshot(&provider, false);
        let expected_entries = vec![
            SpaceEntry { id: 10, label: "1".to_string(), regular_index: Some(1) },
            SpaceEntry { id: 11, label: "2".to_string(), regular_index: Some(2) },
            SpaceEntry { id: 12, label: "3".to_string(), regular_index: Some(3) },
            SpaceEntry { id: 13, label: "F".to_string(), regular_index: None },
        ];
        assert_eq!(snapshot.all_space_entries, expected_entries);
        assert_eq!(snapshot.current_space, 2);
        assert_eq!(snapshot.current_space_id, 11);
        assert_eq!(snapshot.current_global_space_index, 2);
        assert_eq!(snapshot.current_space_label, "2");
    }

    #[test]
    fn regular_indices_partition_list_order() {
        let provider = FakeProvider {
            displays: Some(vec![display(
                "Main",
                vec![regular(1), fullscreen(2), regular(3), fullscreen(4), regular(5)],
                Some(3),
            )]),
            active: Some("Main".to_string()),
        };

        let snapshot = build_snapshot(&provider, false);
        let indices: Vec<Option<usize>> =
            snapshot.all_space_entries.iter().map(|e| e.regular_index).collect();
        assert_eq!(indices, vec![Some(1), None, Some(2), None, Some(3)]);
        assert_eq!(snapshot.all_displays_space_info[0].regular_space_count, 3);
    }
}
