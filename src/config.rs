use crate::calendars::CalendarDirectory;
use crate::error::FilterError;
use crate::event::{EventType, ResponseStatus};
use crate::provider::FetchQuery;
use chrono::Utc;
use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, ConfigError, Environment, File, Map, Value};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

pub const APP_DIR: &str = "agenda-tui";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ConfigTheme {
    pub background: String,
    pub foreground: String,
    pub yellow: String,
    pub blue: String,
    pub mauve: String,
    pub green: String,
    pub red: String,
    pub peach: String,
    pub teal: String,
    pub muted: Option<String>,
    pub surface: Option<String>,
}

/// Which events make it into the agenda.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilterSettings {
    /// Calendar names or identities; empty means all.
    pub calendars: Vec<String>,
    pub include_ooo: bool,
    pub include_focus: bool,
    pub include_working_location: bool,
    pub all_types: bool,
    pub accepted_only: bool,
    /// With `accepted_only`, also keep events that need no response.
    pub include_subscribed: bool,
    pub smart_ooo: bool,
    pub primary_calendar: Option<String>,
    pub exclude_all_day: bool,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            calendars: Vec::new(),
            include_ooo: true,
            include_focus: false,
            include_working_location: false,
            all_types: false,
            accepted_only: true,
            include_subscribed: true,
            smart_ooo: false,
            primary_calendar: None,
            exclude_all_day: false,
        }
    }
}

impl FilterSettings {
    pub fn include_types(&self) -> BTreeSet<EventType> {
        if self.all_types {
            return EventType::ALL.into_iter().collect();
        }
        let mut types = BTreeSet::from([EventType::Default]);
        if self.include_ooo {
            types.insert(EventType::OutOfOffice);
        }
        if self.include_focus {
            types.insert(EventType::FocusTime);
        }
        if self.include_working_location {
            types.insert(EventType::WorkingLocation);
        }
        types
    }

    pub fn include_statuses(&self) -> BTreeSet<ResponseStatus> {
        let mut statuses = BTreeSet::new();
        if self.accepted_only {
            statuses.insert(ResponseStatus::Accepted);
            if self.include_subscribed {
                statuses.insert(ResponseStatus::NoResponseNeeded);
            }
        }
        statuses
    }

    /// Query template for the session. The window is filled in per day.
    pub fn to_query(&self, directory: &CalendarDirectory) -> Result<FetchQuery, FilterError> {
        let now = Utc::now();
        let mut query = FetchQuery::new(now, now);
        if !self.calendars.is_empty() {
            let ids = directory.resolve_names(&self.calendars);
            if ids.is_empty() {
                return Err(FilterError::NoMatchingCalendars(self.calendars.clone()));
            }
            query.calendar_ids = ids.into_iter().collect();
        }
        query.include_types = self.include_types();
        query.include_statuses = self.include_statuses();
        query.exclude_all_day = self.exclude_all_day;
        Ok(query)
    }

    /// Primary calendar for out-of-office suppression, when it is enabled.
    pub fn smart_ooo_calendar(&self, directory: &CalendarDirectory) -> Option<String> {
        if !self.smart_ooo {
            return None;
        }
        directory.detect_primary(self.primary_calendar.as_deref())
    }
}

/// Field toggles for the printed event views. Unset fields keep the view's own
/// default.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DisplaySettings {
    pub calendar: Option<bool>,
    pub time: Option<bool>,
    pub location: Option<bool>,
    pub meeting_link: Option<bool>,
    pub description: Option<bool>,
    pub status: Option<bool>,
    pub event_url: Option<bool>,
    pub attachments: Option<bool>,
    pub id: Option<bool>,
    pub in_progress: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub client_id: String,
    #[serde(default = "default_tenant")]
    pub tenant_id: String,
    pub enable_debug_log: Option<bool>,
    pub theme: Option<String>,
    pub custom_themes: Option<HashMap<String, ConfigTheme>>,
    /// Length of the `list` and `next` windows.
    #[serde(default = "default_days")]
    pub days: u32,
    #[serde(default)]
    pub filters: FilterSettings,
    #[serde(default)]
    pub display: DisplaySettings,
    /// Profile laid over the file, if any.
    #[serde(skip)]
    pub profile: Option<String>,
}

fn default_tenant() -> String {
    "common".to_string()
}

fn default_days() -> u32 {
    7
}

pub fn config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::Message("Could not find the config directory.".into()))?;
    Ok(config_dir.join(APP_DIR).join("Settings.toml"))
}

fn environment() -> Environment {
    Environment::with_prefix("AGENDA")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("filters.calendars")
}

/// Sets every leaf of `table` as an override, so a profile only replaces the
/// keys it names.
fn profile_overrides(
    mut builder: ConfigBuilder<DefaultState>,
    prefix: &str,
    table: Map<String, Value>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    for (key, value) in table {
        let path = if prefix.is_empty() {
            key
        } else {
            format!("{}.{}", prefix, key)
        };
        builder = match value.clone().into_table() {
            Ok(nested) => profile_overrides(builder, &path, nested)?,
            Err(_) => builder.set_override(path, value)?,
        };
    }
    Ok(builder)
}

/// Resolves the active profile (`profile`, else `default_profile`) and lays
/// `profiles.<name>` over the root settings.
fn build(builder: ConfigBuilder<DefaultState>, profile: Option<&str>) -> Result<Settings, ConfigError> {
    let builder = builder.add_source(environment());
    let base = builder.build_cloned()?;
    let active = match profile {
        Some(name) => Some(name.to_string()),
        None => base.get_string("default_profile").ok().filter(|name| !name.is_empty()),
    };

    let builder = match &active {
        Some(name) => {
            let table = base
                .get_table(&format!("profiles.{}", name))
                .map_err(|_| ConfigError::Message(format!("profile '{}' not found in config", name)))?;
            profile_overrides(builder, "", table)?
        }
        None => builder,
    };

    let mut settings: Settings = builder.build()?.try_deserialize()?;
    settings.profile = active;
    Ok(settings)
}

pub fn load_config(profile: Option<&str>) -> Result<Settings, ConfigError> {
    let config_path = config_path()?;
    build(Config::builder().add_source(File::from(config_path).required(true)), profile)
}

/// Parses settings from TOML text, still layered under the environment.
#[cfg(test)]
pub fn load_config_str(toml: &str, profile: Option<&str>) -> Result<Settings, ConfigError> {
    build(
        Config::builder().add_source(File::from_str(toml, config::FileFormat::Toml)),
        profile,
    )
}
