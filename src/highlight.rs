use crate::event::Event;
use chrono::{DateTime, Local, NaiveDate, Utc};

/// Rows of already-started events kept above the "now" divider when jumping to it.
pub const MARKER_CONTEXT_ROWS: usize = 2;

pub fn is_today(date: NaiveDate, now: DateTime<Local>) -> bool {
    date == now.date_naive()
}

/// Index the "now" divider is drawn in front of: the first timed event starting
/// strictly after `now`, or `events.len()` when there is none.
pub fn marker_index(events: &[Event], now: DateTime<Utc>) -> usize {
    events
        .iter()
        .position(|e| !e.all_day && e.start > now)
        .unwrap_or(events.len())
}

/// Marker position for the viewed day, `None` unless it is today and something
/// is scheduled.
pub fn now_marker(events: &[Event], viewed: NaiveDate, now: DateTime<Local>) -> Option<usize> {
    if events.is_empty() || !is_today(viewed, now) {
        return None;
    }
    Some(marker_index(events, now.with_timezone(&Utc)))
}

/// Selection applied when a day is (re)loaded.
pub fn default_selection(events: &[Event], viewed: NaiveDate, now: DateTime<Local>) -> usize {
    match now_marker(events, viewed, now) {
        Some(marker) => marker.min(events.len() - 1),
        None => 0,
    }
}

/// List scroll offset that shows the divider near the top of the panel.
pub fn scroll_to_now(events: &[Event], viewed: NaiveDate, now: DateTime<Local>) -> usize {
    now_marker(events, viewed, now)
        .map(|marker| marker.saturating_sub(MARKER_CONTEXT_ROWS))
        .unwrap_or(0)
}

/// Row of event `index` in the rendered list, counting the divider row.
pub fn row_of(index: usize, marker: Option<usize>) -> usize {
    match marker {
        Some(m) if index >= m => index + 1,
        _ => index,
    }
}

/// Total rendered rows, divider included.
pub fn row_count(len: usize, marker: Option<usize>) -> usize {
    len + usize::from(marker.is_some())
}

/// Smallest change to `offset` that keeps `row` inside a viewport of `height` rows.
pub fn keep_visible(offset: usize, row: usize, height: usize) -> usize {
    let height = height.max(1);
    if row < offset {
        row
    } else if row >= offset + height {
        row + 1 - height
    } else {
        offset
    }
}
