use crate::event::{local_midnight, Event, EventType, ResponseStatus};
use crate::provider::FetchQuery;
use chrono::{DateTime, Local, NaiveDate, Utc};

/// A span during which the owner of the primary calendar is away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OooPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

pub fn is_visible(event: &Event, query: &FetchQuery) -> bool {
    query.admits_type(event.kind)
        && query.admits_status(event.status)
        && !(query.exclude_all_day && event.all_day)
}

/// Type, status and all-day rules of the query. Order is preserved.
pub fn apply(events: Vec<Event>, query: &FetchQuery) -> Vec<Event> {
    events.into_iter().filter(|e| is_visible(e, query)).collect()
}

/// Out-of-office spans on the primary calendar. Expects the sequence before
/// type/status filtering so that hidden OOO entries still count.
pub fn ooo_periods(events: &[Event], primary: &str) -> Vec<OooPeriod> {
    events
        .iter()
        .filter(|e| e.kind == EventType::OutOfOffice && e.on_calendar(primary))
        .filter(|e| e.status != ResponseStatus::Rejected)
        .map(|e| OooPeriod {
            start: e.start,
            end: e.end,
        })
        .collect()
}

/// Every local calendar day a period touches, walking from its local start to
/// its local end (exclusive).
fn touched_days(period: &OooPeriod) -> Vec<NaiveDate> {
    let end = period.end.with_timezone(&Local);
    let mut day = period.start.with_timezone(&Local).date_naive();
    let mut days = Vec::new();
    while local_midnight(day) < end {
        days.push(day);
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    days
}

fn overlaps_day(event: &Event, day: NaiveDate) -> bool {
    let day_start = local_midnight(day).with_timezone(&Utc);
    let day_end = day
        .succ_opt()
        .map(|d| local_midnight(d).with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    event.start < day_end && event.end > day_start
}

pub fn is_on_ooo_day(event: &Event, periods: &[OooPeriod]) -> bool {
    periods
        .iter()
        .flat_map(touched_days)
        .any(|day| overlaps_day(event, day))
}

/// Hides everything on out-of-office days except the out-of-office entry on the
/// primary calendar itself.
pub fn suppress_ooo_days(events: Vec<Event>, periods: &[OooPeriod], primary: &str) -> Vec<Event> {
    if periods.is_empty() {
        return events;
    }
    events
        .into_iter()
        .filter(|e| {
            !is_on_ooo_day(e, periods) || (e.kind == EventType::OutOfOffice && e.on_calendar(primary))
        })
        .collect()
}
