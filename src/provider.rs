use crate::calendars::{CalendarDirectory, CalendarInfo};
use crate::error::Result;
use crate::event::{day_window, Event, EventType, ResponseStatus};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeSet;

/// Describes one fetch: the window plus the visibility rules applied to it.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Empty means every calendar the source knows about.
    pub calendar_ids: BTreeSet<String>,
    /// Empty means default-typed events only.
    pub include_types: BTreeSet<EventType>,
    /// Empty means every status.
    pub include_statuses: BTreeSet<ResponseStatus>,
    pub exclude_all_day: bool,
}

impl FetchQuery {
    /// Regular events in any status.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            calendar_ids: BTreeSet::new(),
            include_types: BTreeSet::from([EventType::Default]),
            include_statuses: BTreeSet::new(),
            exclude_all_day: false,
        }
    }

    /// Same rules over another window.
    pub fn for_window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            ..self.clone()
        }
    }

    /// Same rules, windowed to the local calendar day `date`.
    pub fn for_day(&self, date: NaiveDate) -> Self {
        let (start, end) = day_window(date);
        self.for_window(start, end)
    }

    pub fn admits_type(&self, kind: EventType) -> bool {
        if self.include_types.is_empty() {
            kind == EventType::Default
        } else {
            self.include_types.contains(&kind)
        }
    }

    pub fn admits_status(&self, status: ResponseStatus) -> bool {
        self.include_statuses.is_empty() || self.include_statuses.contains(&status)
    }
}

/// A calendar backend. The aggregation core only ever talks to this trait.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Stable identity of the source (e.g. "outlook").
    fn id(&self) -> &str;

    /// Human-readable label (e.g. "Outlook Calendar").
    fn name(&self) -> &str;

    fn calendars(&self) -> &CalendarDirectory;

    /// Raw, unfiltered records of one calendar for the query's window. Every
    /// returned record carries `calendar` as its own calendar.
    async fn fetch_calendar(&self, calendar: &CalendarInfo, query: &FetchQuery) -> Result<Vec<Event>>;
}
