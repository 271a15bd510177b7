//! Plain-text output of the non-interactive subcommands.

use crate::calendars::CalendarDirectory;
use crate::config::DisplaySettings;
use crate::event::Event;
use crate::ui::format::{format_duration, format_event_time, truncate, wrap_text};
use chrono::{DateTime, Duration, Local, Utc};
use std::fmt;

const RULE: &str = "─────────────────────────────────────────────────";
const COMPACT_DESCRIPTION: usize = 80;
const WRAPPED_DESCRIPTION: usize = 60;
const PLAIN_WIDTH: usize = 1000;

/// Which fields an event block prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayOptions {
    pub calendar: bool,
    pub time: bool,
    pub location: bool,
    pub meeting_link: bool,
    pub description: bool,
    pub status: bool,
    pub event_url: bool,
    pub attachments: bool,
    pub id: bool,
    pub in_progress: bool,
    /// Descriptions collapse to one truncated line instead of wrapping.
    pub compact: bool,
}

impl DisplayOptions {
    pub fn list() -> Self {
        Self {
            calendar: true,
            time: true,
            location: true,
            meeting_link: true,
            description: true,
            status: true,
            event_url: true,
            attachments: false,
            id: false,
            in_progress: true,
            compact: true,
        }
    }

    pub fn detailed() -> Self {
        Self {
            attachments: true,
            id: true,
            in_progress: false,
            compact: false,
            ..Self::list()
        }
    }

    /// Applies the `display.*` keys that are set.
    pub fn with_settings(self, settings: &DisplaySettings) -> Self {
        Self {
            calendar: settings.calendar.unwrap_or(self.calendar),
            time: settings.time.unwrap_or(self.time),
            location: settings.location.unwrap_or(self.location),
            meeting_link: settings.meeting_link.unwrap_or(self.meeting_link),
            description: settings.description.unwrap_or(self.description),
            status: settings.status.unwrap_or(self.status),
            event_url: settings.event_url.unwrap_or(self.event_url),
            attachments: settings.attachments.unwrap_or(self.attachments),
            id: settings.id.unwrap_or(self.id),
            in_progress: settings.in_progress.unwrap_or(self.in_progress),
            compact: self.compact,
        }
    }
}

/// `2 hours, 5 minutes`; `NOW` once the instant has passed.
pub fn format_countdown(d: Duration) -> String {
    if d < Duration::zero() {
        return "NOW".to_string();
    }
    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("{} {}", n, unit)
        } else {
            format!("{} {}s", n, unit)
        }
    };

    let mut parts = Vec::new();
    let days = d.num_days();
    let hours = d.num_hours() % 24;
    let minutes = d.num_minutes() % 60;
    if days > 0 {
        parts.push(plural(days, "day"));
    }
    if hours > 0 {
        parts.push(plural(hours, "hour"));
    }
    if minutes > 0 {
        parts.push(plural(minutes, "minute"));
    }
    if parts.is_empty() {
        "less than a minute".to_string()
    } else {
        parts.join(", ")
    }
}

/// The next thing on the agenda: every event sharing the earliest start among
/// those upcoming or in progress. All-day entries only count while upcoming.
pub fn next_group(events: &[Event], now: DateTime<Utc>) -> Vec<&Event> {
    let eligible: Vec<&Event> = events
        .iter()
        .filter(|e| e.start > now || (e.in_progress(now) && !e.all_day))
        .collect();
    let Some(first) = eligible.first() else {
        return Vec::new();
    };
    let start = first.start;
    eligible.into_iter().take_while(|e| e.start == start).collect()
}

fn plain_description(event: &Event) -> String {
    html2text::from_read(event.description.as_bytes(), PLAIN_WIDTH)
        .unwrap_or_else(|_| event.description.clone())
        .trim()
        .to_string()
}

fn write_description(f: &mut fmt::Formatter<'_>, event: &Event, compact: bool) -> fmt::Result {
    let text = plain_description(event);
    if text.is_empty() {
        return Ok(());
    }
    if compact {
        let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
        return writeln!(f, "    Description: {}", truncate(&line, COMPACT_DESCRIPTION));
    }
    writeln!(f, "    Description:")?;
    for line in wrap_text(&text, WRAPPED_DESCRIPTION) {
        writeln!(f, "      {}", line)?;
    }
    Ok(())
}

fn write_event(f: &mut fmt::Formatter<'_>, event: &Event, display: &DisplayOptions, now: DateTime<Utc>) -> fmt::Result {
    let badge = event.kind.badge().map(|b| format!("[{}] ", b)).unwrap_or_default();
    writeln!(f, "  {}{}", badge, event.title)?;

    if display.calendar && !event.calendars.is_empty() {
        let names: Vec<&str> = event.calendars.iter().map(|a| a.calendar.name.as_str()).collect();
        let label = if names.len() > 1 { "Calendars:" } else { "Calendar: " };
        writeln!(f, "    {} {}", label, names.join(", "))?;
    }
    if display.time {
        writeln!(
            f,
            "    When:      {}",
            format_event_time(event.start, event.end, event.all_day)
        )?;
        if !event.all_day {
            writeln!(f, "    Duration:  {}", format_duration(event.duration()))?;
        }
    }
    if display.location && !event.location.is_empty() {
        writeln!(f, "    Location:  {}", event.location)?;
    }
    if display.meeting_link {
        if let Some(url) = &event.meeting_url {
            writeln!(f, "    Join:      {}", url)?;
        }
    }
    if display.description {
        write_description(f, event, display.compact)?;
    }
    if display.status {
        if event.calendars.len() > 1 {
            writeln!(f, "    Responses:")?;
            for affiliation in &event.calendars {
                writeln!(f, "      {}: {}", affiliation.calendar.name, affiliation.status.label())?;
            }
        } else {
            writeln!(f, "    Response:  {}", event.status.label())?;
        }
    }
    if display.event_url {
        if let Some(url) = &event.url {
            writeln!(f, "    Event URL: {}", url)?;
        }
    }
    if display.attachments && !event.attachments.is_empty() {
        writeln!(f, "    Attachments:")?;
        for attachment in &event.attachments {
            match &attachment.url {
                Some(url) => writeln!(f, "      - {} ({})", attachment.name, url)?,
                None => writeln!(f, "      - {}", attachment.name)?,
            }
        }
    }
    if display.in_progress && !event.all_day && event.in_progress(now) {
        writeln!(f, "    IN PROGRESS ({} remaining)", format_duration(event.end - now))?;
    }
    if display.id {
        writeln!(f, "    ID:        {}", event.id)?;
    }
    Ok(())
}

/// Every event of a window, one block each.
pub struct EventListing<'a> {
    pub events: &'a [Event],
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub now: DateTime<Utc>,
    pub display: DisplayOptions,
}

impl fmt::Display for EventListing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.events.is_empty() {
            return writeln!(f, "No upcoming events found.");
        }
        let day = |t: DateTime<Utc>| t.with_timezone(&Local).format("%a %b %-d, %Y").to_string();
        writeln!(f, "Events from {} to {}:", day(self.start), day(self.end))?;
        writeln!(f, "{}", RULE)?;
        for event in self.events {
            writeln!(f)?;
            write_event(f, event, &self.display, self.now)?;
        }
        writeln!(f)?;
        writeln!(f, "{}", RULE)?;
        let noun = if self.events.len() == 1 { "event" } else { "events" };
        writeln!(f, "Total: {} {}", self.events.len(), noun)
    }
}

/// The next event, or every event tied for the next start.
pub struct NextReport<'a> {
    pub events: &'a [Event],
    pub now: DateTime<Utc>,
    pub display: DisplayOptions,
}

impl fmt::Display for NextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let group = next_group(self.events, self.now);
        let Some(first) = group.first() else {
            return writeln!(f, "No upcoming events found.");
        };

        writeln!(f, "{}", RULE)?;
        if group.len() > 1 {
            writeln!(f, "  CONFLICT: {} EVENTS AT THE SAME TIME", group.len())?;
        } else {
            writeln!(f, "  NEXT EVENT")?;
        }
        writeln!(f, "{}", RULE)?;
        writeln!(f)?;
        if first.in_progress(self.now) {
            writeln!(f, "  IN PROGRESS - {} remaining", format_duration(first.end - self.now))?;
        } else {
            writeln!(f, "  STARTS IN: {}", format_countdown(first.start - self.now))?;
        }

        // Conflicts stay short: no descriptions, and the header already
        // carries the progress line.
        let display = DisplayOptions {
            description: self.display.description && group.len() == 1,
            in_progress: false,
            ..self.display
        };
        for (i, event) in group.iter().enumerate() {
            writeln!(f)?;
            if group.len() > 1 {
                writeln!(f, "  EVENT {} of {}", i + 1, group.len())?;
            }
            write_event(f, event, &display, self.now)?;
        }
        writeln!(f)?;
        writeln!(f, "{}", RULE)
    }
}

pub struct CalendarListing<'a> {
    pub directory: &'a CalendarDirectory,
    pub primary: Option<&'a str>,
}

impl fmt::Display for CalendarListing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.directory.is_empty() {
            return writeln!(f, "No calendars found.");
        }
        writeln!(f, "Available calendars:")?;
        writeln!(f, "{}", RULE)?;
        for calendar in self.directory.iter() {
            let mark = if self.primary == Some(calendar.id.as_str()) {
                " (primary)"
            } else {
                ""
            };
            writeln!(f, "\n  • {}{}", calendar.name, mark)?;
            writeln!(f, "    ID: {}", calendar.id)?;
        }
        writeln!(f)?;
        writeln!(f, "Total: {} calendars", self.directory.len())
    }
}
