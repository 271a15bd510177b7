use crate::event::Calendar;
use regex::Regex;
use std::sync::OnceLock;

/// Name the Outlook backend gives to the mailbox's default calendar.
const OUTLOOK_DEFAULT_NAME: &str = "Calendar";
/// Shared/group calendars on Google live under `@group.calendar.google.com` and
/// `@group.v.calendar.google.com`.
const GROUP_MARKER: &str = "@group.";

fn email_shape() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarInfo {
    pub id: String,
    pub name: String,
    /// Set when the backend explicitly flags this as the account's own calendar.
    pub primary: bool,
}

impl CalendarInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            primary: false,
        }
    }

    pub fn as_calendar(&self) -> Calendar {
        Calendar::new(self.id.clone(), self.name.clone())
    }
}

/// Calendar identity → display name, in the order the backend listed them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalendarDirectory {
    entries: Vec<CalendarInfo>,
}

impl CalendarDirectory {
    pub fn new(entries: Vec<CalendarInfo>) -> Self {
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CalendarInfo> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CalendarInfo> {
        self.entries.iter().find(|c| c.id == id)
    }

    /// Turns user-supplied names into identities. An exact identity wins,
    /// otherwise the first calendar whose name contains the filter
    /// (case-insensitive). Unmatched names are dropped.
    pub fn resolve_names<S: AsRef<str>>(&self, names: &[S]) -> Vec<String> {
        let mut ids = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            if let Some(cal) = self.get(name) {
                ids.push(cal.id.clone());
                continue;
            }
            let needle = name.to_lowercase();
            if let Some(cal) = self
                .entries
                .iter()
                .find(|c| c.name.to_lowercase().contains(&needle))
            {
                ids.push(cal.id.clone());
            }
        }
        ids
    }

    /// Picks the calendar that out-of-office periods are read from.
    pub fn detect_primary(&self, configured: Option<&str>) -> Option<String> {
        if let Some(configured) = configured.map(str::trim).filter(|c| !c.is_empty()) {
            return Some(
                self.resolve_names(&[configured])
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| configured.to_string()),
            );
        }

        if let Some(cal) = self.entries.iter().find(|c| c.primary) {
            return Some(cal.id.clone());
        }
        if let Some(cal) = self.get("primary") {
            return Some(cal.id.clone());
        }
        if let Some(cal) = self.entries.iter().find(|c| c.name == OUTLOOK_DEFAULT_NAME) {
            return Some(cal.id.clone());
        }
        if let Some(cal) = self
            .entries
            .iter()
            .find(|c| email_shape().is_match(&c.id) && !c.id.contains(GROUP_MARKER))
        {
            return Some(cal.id.clone());
        }
        self.entries.iter().map(|c| &c.id).min().cloned()
    }
}
