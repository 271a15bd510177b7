use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};

// --- Unified, provider-agnostic event model ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    Default,
    OutOfOffice,
    FocusTime,
    WorkingLocation,
}

impl EventType {
    pub const ALL: [EventType; 4] = [
        EventType::Default,
        EventType::OutOfOffice,
        EventType::FocusTime,
        EventType::WorkingLocation,
    ];

    /// Short badge shown in front of non-default entries.
    pub fn badge(self) -> Option<&'static str> {
        match self {
            EventType::Default => None,
            EventType::OutOfOffice => Some("OOO"),
            EventType::FocusTime => Some("Focus"),
            EventType::WorkingLocation => Some("Location"),
        }
    }
}

/// The user's answer to an invitation, as seen from one calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResponseStatus {
    Accepted,
    Rejected,
    Tentative,
    Awaiting,
    NoResponseNeeded,
}

impl ResponseStatus {
    pub fn label(self) -> &'static str {
        match self {
            ResponseStatus::Accepted => "Accepted ✓",
            ResponseStatus::Rejected => "Declined ✗",
            ResponseStatus::Tentative => "Tentative ?",
            ResponseStatus::Awaiting => "Awaiting response",
            ResponseStatus::NoResponseNeeded => "No response needed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Calendar {
    pub id: String,
    pub name: String,
}

impl Calendar {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// One calendar's view of a (possibly shared) event.
#[derive(Debug, Clone, PartialEq)]
pub struct Affiliation {
    pub calendar: Calendar,
    pub status: ResponseStatus,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub name: String,
    pub url: Option<String>,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: String,
    /// Stable across every calendar the same invitation shows up on. Empty when
    /// the backend has nothing to offer.
    pub dedupe_key: String,
    pub source_id: String,
    /// Calendar the record was fetched from (first-seen after aggregation).
    pub calendar: Calendar,
    pub kind: EventType,
    pub title: String,
    pub description: String,
    pub location: String,
    pub status: ResponseStatus,
    pub url: Option<String>,
    pub meeting_url: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
    pub attachments: Vec<Attachment>,
    pub calendars: Vec<Affiliation>,
}

impl Event {
    /// A default-typed event with no response required. `end` is clamped so that
    /// `start <= end` always holds.
    pub fn new(
        id: impl Into<String>,
        calendar: Calendar,
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            dedupe_key: String::new(),
            source_id: String::new(),
            calendar,
            kind: EventType::Default,
            title: title.into(),
            description: String::new(),
            location: String::new(),
            status: ResponseStatus::NoResponseNeeded,
            url: None,
            meeting_url: None,
            start,
            end: end.max(start),
            all_day: false,
            attachments: Vec::new(),
            calendars: Vec::new(),
        }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn in_progress(&self, now: DateTime<Utc>) -> bool {
        now > self.start && now < self.end
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.end < now
    }

    /// This calendar's own affiliation triple.
    pub fn own_affiliation(&self) -> Affiliation {
        Affiliation {
            calendar: self.calendar.clone(),
            status: self.status,
            url: self.url.clone(),
        }
    }

    /// The calendar an event is attributed to: its first affiliation, else the
    /// calendar it was fetched from.
    pub fn primary_calendar(&self) -> &Calendar {
        self.calendars.first().map_or(&self.calendar, |a| &a.calendar)
    }

    /// True when the event lives on the given calendar, either directly or via
    /// a merged affiliation.
    pub fn on_calendar(&self, calendar_id: &str) -> bool {
        self.calendar.id == calendar_id || self.calendars.iter().any(|a| a.calendar.id == calendar_id)
    }
}

// --- Local day helpers ---

/// Local midnight starting `date`. Falls back to UTC interpretation when the
/// local midnight does not exist (DST gap at 00:00).
pub fn local_midnight(date: NaiveDate) -> DateTime<Local> {
    let naive = date.and_time(chrono::NaiveTime::MIN);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive).with_timezone(&Local))
}

/// The [start, end) window covering the local calendar day `date`.
pub fn day_window(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_midnight(date);
    let end = date
        .succ_opt()
        .map(local_midnight)
        .unwrap_or_else(|| start + Duration::days(1));
    (start.with_timezone(&Utc), end.with_timezone(&Utc))
}

/// Window of a multi-day listing. An explicit `from` starts at that day's
/// midnight, otherwise at `now`. An explicit `to` includes that whole day,
/// otherwise the window runs `days` days from its start.
pub fn range_window(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    days: u32,
    now: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = from.map_or(now, |d| local_midnight(d).with_timezone(&Utc));
    let end = match to {
        Some(d) => day_window(d).1,
        None => start + Duration::days(i64::from(days)),
    };
    (start, end.max(start))
}
