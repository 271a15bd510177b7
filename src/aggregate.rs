use crate::calendars::CalendarInfo;
use crate::error::{FetchError, Result};
use crate::event::Event;
use crate::provider::{CalendarSource, FetchQuery};
use futures::future::join_all;
use log::{debug, info, warn};
use std::collections::HashMap;

/// Merges records sharing a dedupe key into one representative carrying every
/// calendar affiliation, in arrival order. Keyless records are kept as-is.
pub fn deduplicate(records: impl IntoIterator<Item = Event>) -> Vec<Event> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<Event> = Vec::new();

    for mut event in records {
        if event.dedupe_key.is_empty() {
            event.calendars = vec![event.own_affiliation()];
            merged.push(event);
            continue;
        }

        match seen.get(&event.dedupe_key) {
            Some(&idx) => {
                let affiliation = event.own_affiliation();
                merged[idx].calendars.push(affiliation);
            }
            None => {
                event.calendars = vec![event.own_affiliation()];
                seen.insert(event.dedupe_key.clone(), merged.len());
                merged.push(event);
            }
        }
    }

    merged
}

/// Stable: simultaneous events keep their relative arrival order.
pub fn sort_by_start(events: &mut [Event]) {
    events.sort_by_key(|e| e.start);
}

/// Combines the per-calendar results of one window. Failed calendars contribute
/// nothing.
pub fn aggregate(results: Vec<(CalendarInfo, Result<Vec<Event>>)>) -> Vec<Event> {
    let mut records = Vec::new();
    for (calendar, result) in results {
        match result {
            Ok(events) => {
                debug!("{} events from calendar '{}'", events.len(), calendar.name);
                records.extend(events);
            }
            Err(e) => warn!("Skipping calendar '{}': {}", calendar.name, e),
        }
    }

    let mut events = deduplicate(records);
    sort_by_start(&mut events);
    events
}

/// Timed events covering the whole window are treated as all-day (multi-day
/// blocks some backends send with explicit times).
pub fn promote_spanning(events: &mut [Event], query: &FetchQuery) {
    for event in events.iter_mut().filter(|e| !e.all_day) {
        if event.start <= query.start && event.end >= query.end {
            event.all_day = true;
        }
    }
}

fn calendars_to_fetch(source: &dyn CalendarSource, query: &FetchQuery) -> Vec<CalendarInfo> {
    source
        .calendars()
        .iter()
        .filter(|c| query.calendar_ids.is_empty() || query.calendar_ids.contains(&c.id))
        .cloned()
        .collect()
}

/// Fetches every selected calendar concurrently and aggregates the results.
/// Only fails when nothing at all could be retrieved.
pub async fn fetch_window(source: &dyn CalendarSource, query: &FetchQuery) -> Result<Vec<Event>> {
    let calendars = calendars_to_fetch(source, query);
    if calendars.is_empty() {
        return Err(FetchError::NoCalendars);
    }

    info!(
        "Fetching {} calendars from {} for {} .. {}",
        calendars.len(),
        source.name(),
        query.start,
        query.end
    );

    let results = join_all(calendars.iter().map(|c| source.fetch_calendar(c, query))).await;

    let failed = results.iter().filter(|r| r.is_err()).count();
    if failed == calendars.len() {
        let last = results
            .into_iter()
            .rev()
            .find_map(|r| r.err())
            .unwrap_or(FetchError::NoCalendars);
        return Err(FetchError::Unavailable {
            failed,
            last: Box::new(last),
        });
    }

    let mut events = aggregate(calendars.into_iter().zip(results).collect());
    promote_spanning(&mut events, query);
    Ok(events)
}
