//! Fixtures shared by the unit tests.

use crate::calendars::{CalendarDirectory, CalendarInfo};
use crate::error::Result;
use crate::event::{Calendar, Event};
use crate::provider::{CalendarSource, FetchQuery};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 12).unwrap()
}

/// UTC instant on the fixture date.
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 12, hour, minute, 0).unwrap()
}

/// Local wall-clock instant on the fixture date.
pub fn local(hour: u32, minute: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(2024, 6, 12, hour, minute, 0).single().unwrap()
}

pub fn local_on(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Local> {
    Local
        .from_local_datetime(&date.and_hms_opt(hour, minute, 0).unwrap())
        .single()
        .unwrap()
}

pub fn cal_info(id: &str) -> CalendarInfo {
    CalendarInfo::new(id, id.to_uppercase())
}

pub fn event_on(calendar: &str, title: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Event {
    let mut event = Event::new(
        format!("{calendar}/{title}"),
        Calendar::new(calendar, calendar.to_uppercase()),
        title,
        start,
        end,
    );
    event.calendars = vec![event.own_affiliation()];
    event
}

pub fn local_event(calendar: &str, title: &str, start: DateTime<Local>, end: DateTime<Local>) -> Event {
    event_on(calendar, title, start.with_timezone(&Utc), end.with_timezone(&Utc))
}

/// In-memory source returning canned per-calendar results.
pub struct StaticSource {
    directory: CalendarDirectory,
    results: HashMap<String, Result<Vec<Event>>>,
    calls: AtomicUsize,
}

impl StaticSource {
    pub fn new() -> Self {
        Self {
            directory: CalendarDirectory::default(),
            results: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_calendar(mut self, id: &str, result: Result<Vec<Event>>) -> Self {
        let mut entries: Vec<CalendarInfo> = self.directory.iter().cloned().collect();
        entries.push(cal_info(id));
        self.directory = CalendarDirectory::new(entries);
        self.results.insert(id.to_string(), result);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CalendarSource for StaticSource {
    fn id(&self) -> &str {
        "static"
    }

    fn name(&self) -> &str {
        "Static"
    }

    fn calendars(&self) -> &CalendarDirectory {
        &self.directory
    }

    async fn fetch_calendar(&self, calendar: &CalendarInfo, _query: &FetchQuery) -> Result<Vec<Event>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.results.get(&calendar.id).cloned().unwrap_or_else(|| Ok(Vec::new()))
    }
}
