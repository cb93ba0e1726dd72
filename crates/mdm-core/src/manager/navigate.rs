//! Cursor motions and search over the records visible in a filter mode.
//! No motion wraps around; when nothing matches in the requested direction
//! the cursor stays where it is.

use crate::record::{DownloadRecord, RecordId};
use crate::registry::{FilterMode, Registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Up,
    Down,
    PageUp,
    PageDown,
    Home,
    End,
    /// Index into the visible (filtered) list.
    Position(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchDirection {
    #[default]
    Forward,
    Backward,
}

/// New cursor for `motion` in `mode`, or `None` to leave it unchanged.
pub(crate) fn target(
    registry: &Registry,
    mode: FilterMode,
    motion: Motion,
    page: usize,
) -> Option<RecordId> {
    let visible = |r: &DownloadRecord| mode.matches(r.state());
    let cur = registry.selected(mode);
    match motion {
        Motion::Down => registry.find_next(cur, visible),
        Motion::Up => registry.find_prev(cur, visible),
        Motion::Home => registry.find_next(None, visible),
        Motion::End => registry.find_prev(None, visible),
        Motion::PageDown => step(cur, page, |from| registry.find_next(from, visible)),
        Motion::PageUp => step(cur, page, |from| registry.find_prev(from, visible)),
        Motion::Position(index) => registry
            .iter()
            .filter(|r| visible(*r))
            .nth(index)
            .map(|r| r.id()),
    }
}

/// Follows `next` up to `count` times; the last record reached, if any.
fn step<F>(start: Option<RecordId>, count: usize, next: F) -> Option<RecordId>
where
    F: Fn(Option<RecordId>) -> Option<RecordId>,
{
    let mut cur = start;
    let mut moved = None;
    for _ in 0..count.max(1) {
        match next(cur) {
            Some(id) => {
                cur = Some(id);
                moved = Some(id);
            }
            None => break,
        }
    }
    moved
}

/// Next record in `direction` from the cursor whose name contains `text`.
pub(crate) fn search(
    registry: &Registry,
    mode: FilterMode,
    text: &str,
    direction: SearchDirection,
) -> Option<RecordId> {
    let hit = |r: &DownloadRecord| mode.matches(r.state()) && r.name().contains(text);
    let cur = registry.selected(mode);
    match direction {
        SearchDirection::Forward => registry.find_next(cur, hit),
        SearchDirection::Backward => registry.find_prev(cur, hit),
    }
}
