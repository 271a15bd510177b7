use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Utc, Weekday};
use clap::{Parser, Subcommand};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{error, info};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::Arc;

mod aggregate;
mod app;
mod auth;
mod calendars;
mod config;
mod error;
mod event;
mod fetch;
mod filter;
mod graph;
mod highlight;
mod layout;
mod provider;
mod report;
#[cfg(test)]
mod testing;
mod tui;
mod ui;

use calendars::CalendarDirectory;
use config::{FilterSettings, Settings};
use fetch::{Fetcher, PipelineOptions};
use graph::GraphSource;
use provider::{CalendarSource, FetchQuery};
use report::{CalendarListing, DisplayOptions, EventListing, NextReport};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(short, long)]
    debug: bool,

    /// Config profile to use instead of default_profile
    #[arg(short, long)]
    profile: Option<String>,

    /// Day to open on (YYYY-MM-DD, MM-DD, MM/DD/YYYY, today, tomorrow, yesterday, monday, ...)
    #[arg(long)]
    date: Option<String>,

    /// Only show these calendars, by name or id
    #[arg(long, value_delimiter = ',')]
    calendars: Vec<String>,

    /// Hide other calendars' events on days you are out of office
    #[arg(long)]
    smart_ooo: bool,

    /// Calendar whose out-of-office events drive --smart-ooo
    #[arg(long)]
    primary_calendar: Option<String>,

    #[arg(long)]
    no_allday: bool,

    /// Show every event type, including focus time and working location
    #[arg(long)]
    all_types: bool,

    /// Days covered by `list` and `next` (default from config, else 7)
    #[arg(long)]
    days: Option<u32>,

    /// First day of the `list` and `next` window
    #[arg(long)]
    from: Option<String>,

    /// Last day of the `list` and `next` window
    #[arg(long)]
    to: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the available calendars
    Calendars,
    /// Print the next event in the window, flagging overlaps
    Next,
    /// Print every event in the window
    List {
        /// Show attachments and ids, with full descriptions
        #[arg(long)]
        detailed: bool,
    },
    /// Manage the stored login
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },
}

#[derive(Subcommand, Debug)]
enum AuthAction {
    /// Log in again, replacing the stored token
    Login,
    /// Remove the stored token
    Logout,
}

impl Cli {
    fn apply(&self, filters: &mut FilterSettings) {
        if !self.calendars.is_empty() {
            filters.calendars = self.calendars.clone();
        }
        if self.smart_ooo {
            filters.smart_ooo = true;
        }
        if let Some(primary) = &self.primary_calendar {
            filters.primary_calendar = Some(primary.clone());
        }
        if self.no_allday {
            filters.exclude_all_day = true;
        }
        if self.all_types {
            filters.all_types = true;
        }
    }

    /// Window of `list` and `next`. `--days` wins over the configured length.
    fn window(&self, days: u32, today: NaiveDate, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>), String> {
        let from = self.from.as_deref().map(|raw| parse_date(raw, today)).transpose()?;
        let to = self.to.as_deref().map(|raw| parse_date(raw, today)).transpose()?;
        Ok(event::range_window(from, to, self.days.unwrap_or(days), now))
    }
}

fn filter_query(settings: &Settings, directory: &CalendarDirectory) -> Result<FetchQuery, error::FilterError> {
    settings.filters.to_query(directory).map_err(|e| {
        println!("ERROR: {}", e);
        e
    })
}

fn parse_weekday(s: &str) -> Option<Weekday> {
    match s {
        "sunday" | "sun" => Some(Weekday::Sun),
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        _ => None,
    }
}

/// Resolves a `--date` argument relative to `today`. Weekday names mean the
/// next such day, never today.
fn parse_date(input: &str, today: NaiveDate) -> Result<NaiveDate, String> {
    let s = input.trim().to_lowercase();
    match s.as_str() {
        "today" => return Ok(today),
        "tomorrow" => return Ok(today + Duration::days(1)),
        "yesterday" => return Ok(today - Duration::days(1)),
        _ => {}
    }

    if let Some(weekday) = parse_weekday(s.strip_prefix("next ").unwrap_or(&s)) {
        let mut days = weekday.num_days_from_sunday() as i64 - today.weekday().num_days_from_sunday() as i64;
        if days <= 0 {
            days += 7;
        }
        return Ok(today + Duration::days(days));
    }

    let parsed = NaiveDate::parse_from_str(&s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&s, "%m/%d/%Y"))
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}-{}", today.year(), s), "%Y-%m-%d"))
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}/{}", s, today.year()), "%m/%d/%Y"));
    parsed.map_err(|_| {
        format!(
            "unable to parse date: {} (use YYYY-MM-DD, 'today', 'tomorrow', or weekday names)",
            input
        )
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    if let Some(Commands::Auth {
        action: AuthAction::Logout,
    }) = &cli.command
    {
        if auth::logout()? {
            println!("Logged out. The stored token was removed.");
        } else {
            println!("No stored token found.");
        }
        return Ok(());
    }

    let mut settings = config::load_config(cli.profile.as_deref()).map_err(|e| {
        println!("ERROR: Could not find or read the configuration file.");
        if let Ok(path) = config::config_path() {
            println!("Please ensure '{}' exists and sets client_id.", path.display());
        }
        e
    })?;
    cli.apply(&mut settings.filters);

    let today = Local::now().date_naive();
    let date = match &cli.date {
        Some(raw) => parse_date(raw, today)?,
        None => today,
    };

    let enable_logging = cli.debug || settings.enable_debug_log.unwrap_or(false);
    if enable_logging {
        simple_logging::log_to_file("agenda-tui.log", log::LevelFilter::Debug)?;
    }

    info!("Application started.");
    if let Some(profile) = &settings.profile {
        info!("Using profile {}", profile);
    }

    if let Some(Commands::Auth {
        action: AuthAction::Login,
    }) = &cli.command
    {
        auth::login(settings.client_id.clone(), &settings.tenant_id).await?;
        println!("Login successful.");
        return Ok(());
    }

    let access_token = auth::authenticate(settings.client_id.clone(), &settings.tenant_id).await?;
    let source = GraphSource::connect(access_token).await?;
    let directory = source.calendars();

    match &cli.command {
        Some(Commands::Calendars) => {
            let primary = directory.detect_primary(settings.filters.primary_calendar.as_deref());
            print!(
                "{}",
                CalendarListing {
                    directory,
                    primary: primary.as_deref(),
                }
            );
            return Ok(());
        }
        Some(Commands::Next) | Some(Commands::List { .. }) => {
            let now = Utc::now();
            let (start, end) = cli.window(settings.days, today, now)?;
            let query = filter_query(&settings, directory)?.for_window(start, end);
            let smart_ooo = settings.filters.smart_ooo_calendar(directory);
            let events = fetch::run_pipeline(&source, &query, smart_ooo.as_deref()).await?;
            match &cli.command {
                Some(Commands::List { detailed: true }) => {
                    let display = DisplayOptions::detailed().with_settings(&settings.display);
                    print!("{}", EventListing { events: &events, start, end, now, display });
                }
                Some(Commands::List { detailed: false }) => {
                    let display = DisplayOptions::list().with_settings(&settings.display);
                    print!("{}", EventListing { events: &events, start, end, now, display });
                }
                _ => {
                    let display = DisplayOptions::list().with_settings(&settings.display);
                    print!("{}", NextReport { events: &events, now, display });
                }
            }
            return Ok(());
        }
        Some(Commands::Auth { .. }) | None => {}
    }

    let options = PipelineOptions {
        query: filter_query(&settings, directory)?,
        smart_ooo: settings.filters.smart_ooo_calendar(directory),
    };
    if let Some(primary) = &options.smart_ooo {
        info!("Smart out-of-office enabled for {}", primary);
    }
    let fetcher = Fetcher::new(Arc::new(source), options);

    let theme_name = settings.theme.unwrap_or_else(|| "catppuccin".to_string());
    let theme = ui::Theme::from_string(&theme_name, &settings.custom_themes);
    let app = app::App::new(date, Local::now(), theme);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = tui::run_app(&mut terminal, app, fetcher).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    info!("Application terminated.");

    if let Err(err) = res {
        error!("Application runtime error: {}", err);
    }

    Ok(())
}
