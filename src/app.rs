use crate::error::FetchError;
use crate::event::Event;
use crate::fetch::{FetchOutcome, FetchRequest};
use crate::highlight;
use crate::layout::PanelLayout;
use crate::ui::{detail, Theme};
use chrono::{DateTime, Duration, Local, NaiveDate};
use log::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SelectNext,
    SelectPrevious,
    ScrollUp,
    ScrollDown,
    ToggleFocus,
    NextDay,
    PreviousDay,
    Today,
    Refresh,
    OpenMeeting,
    OpenEvent,
    ToggleHelp,
    Quit,
    /// A key with no binding. Still closes the help panel.
    Unbound,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Resize { width: u16, height: u16 },
    FetchCompleted(FetchOutcome),
    /// Once a minute, so countdowns and the divider move.
    Tick,
    Input(Action),
}

/// Side effect requested by `App::update`, executed by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    None,
    Fetch(FetchRequest),
    OpenUrl(String),
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    List,
    Detail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Loading,
    Ready,
    Errored,
}

pub struct App {
    pub date: NaiveDate,
    pub events: Vec<Event>,
    pub selected: usize,
    pub list_scroll: usize,
    pub detail_scroll: usize,
    pub layout: PanelLayout,
    pub focus: Focus,
    pub loading: bool,
    pub error: Option<FetchError>,
    pub show_help: bool,
    pub should_quit: bool,
    /// Wall clock as of the last message; rendering reads time from here.
    pub now: DateTime<Local>,
    pub theme: Theme,
    generation: u64,
    /// Divider position, placed when a sequence arrives and left alone by ticks.
    marker: Option<usize>,
}

impl App {
    pub fn new(date: NaiveDate, now: DateTime<Local>, theme: Theme) -> Self {
        Self {
            date,
            events: Vec::new(),
            selected: 0,
            list_scroll: 0,
            detail_scroll: 0,
            layout: PanelLayout::default(),
            focus: Focus::List,
            loading: false,
            error: None,
            show_help: false,
            should_quit: false,
            now,
            theme,
            generation: 0,
            marker: None,
        }
    }

    /// Issues the first fetch.
    pub fn init(mut self) -> (Self, Command) {
        let command = self.begin_fetch();
        (self, command)
    }

    pub fn status(&self) -> Status {
        if self.loading {
            Status::Loading
        } else if self.error.is_some() {
            Status::Errored
        } else {
            Status::Ready
        }
    }

    pub fn selected_event(&self) -> Option<&Event> {
        self.events.get(self.selected)
    }

    /// Divider position for the current sequence, if it is drawn at all.
    pub fn marker(&self) -> Option<usize> {
        self.marker
    }

    pub fn update(mut self, message: Message, now: DateTime<Local>) -> (Self, Command) {
        self.now = now;
        let command = match message {
            Message::Resize { width, height } => {
                self.layout = PanelLayout::compute(width, height);
                self.clamp_list_scroll();
                self.clamp_detail_scroll();
                Command::None
            }
            Message::FetchCompleted(outcome) => {
                self.complete_fetch(outcome);
                Command::None
            }
            Message::Tick => {
                self.clamp_list_scroll();
                Command::None
            }
            Message::Input(action) => self.handle_action(action),
        };
        (self, command)
    }

    /// Swaps in a new sequence, clamping the selection into range.
    pub fn replace_sequence(&mut self, events: Vec<Event>) {
        self.events = events;
        self.marker = highlight::now_marker(&self.events, self.date, self.now);
        self.selected = match self.events.len() {
            0 => 0,
            len => self.selected.min(len - 1),
        };
        self.clamp_list_scroll();
        self.clamp_detail_scroll();
    }

    fn begin_fetch(&mut self) -> Command {
        self.generation += 1;
        self.loading = true;
        self.error = None;
        debug!("Requesting {} (generation {})", self.date, self.generation);
        Command::Fetch(FetchRequest {
            generation: self.generation,
            date: self.date,
        })
    }

    fn complete_fetch(&mut self, outcome: FetchOutcome) {
        if outcome.generation != self.generation || outcome.date != self.date {
            debug!(
                "Dropping stale result for {} (generation {}, current {})",
                outcome.date, outcome.generation, self.generation
            );
            return;
        }
        self.loading = false;
        match outcome.result {
            Ok(events) => {
                self.error = None;
                self.replace_sequence(events);
                self.place_at_now();
            }
            Err(e) => {
                warn!("Keeping previous events after failure: {}", e);
                self.error = Some(e);
            }
        }
    }

    fn place_at_now(&mut self) {
        self.marker = highlight::now_marker(&self.events, self.date, self.now);
        self.selected = highlight::default_selection(&self.events, self.date, self.now);
        self.list_scroll = highlight::scroll_to_now(&self.events, self.date, self.now);
        self.detail_scroll = 0;
        self.clamp_list_scroll();
    }

    fn change_day(&mut self, date: NaiveDate) -> Command {
        info!("Switching to {}", date);
        self.date = date;
        self.events.clear();
        self.marker = None;
        self.selected = 0;
        self.list_scroll = 0;
        self.detail_scroll = 0;
        self.begin_fetch()
    }

    fn handle_action(&mut self, action: Action) -> Command {
        if self.show_help {
            return match action {
                Action::Quit => self.quit(),
                _ => {
                    self.show_help = false;
                    Command::None
                }
            };
        }

        match action {
            Action::SelectNext => {
                if self.selected + 1 < self.events.len() {
                    self.select(self.selected + 1);
                }
                Command::None
            }
            Action::SelectPrevious => {
                if self.selected > 0 && !self.events.is_empty() {
                    self.select(self.selected - 1);
                }
                Command::None
            }
            Action::ScrollUp => {
                self.scroll(false);
                Command::None
            }
            Action::ScrollDown => {
                self.scroll(true);
                Command::None
            }
            Action::ToggleFocus => {
                self.focus = match self.focus {
                    Focus::List => Focus::Detail,
                    Focus::Detail => Focus::List,
                };
                Command::None
            }
            Action::NextDay => self.change_day(self.date + Duration::days(1)),
            Action::PreviousDay => self.change_day(self.date - Duration::days(1)),
            Action::Today => {
                let today = self.now.date_naive();
                if self.date == today {
                    self.place_at_now();
                    Command::None
                } else {
                    self.change_day(today)
                }
            }
            Action::Refresh => self.begin_fetch(),
            Action::OpenMeeting => self
                .selected_event()
                .and_then(|e| e.meeting_url.clone())
                .map_or(Command::None, Command::OpenUrl),
            Action::OpenEvent => self
                .selected_event()
                .and_then(|e| e.url.clone())
                .map_or(Command::None, Command::OpenUrl),
            Action::ToggleHelp => {
                self.show_help = true;
                Command::None
            }
            Action::Quit => self.quit(),
            Action::Unbound => Command::None,
        }
    }

    fn quit(&mut self) -> Command {
        self.should_quit = true;
        Command::Quit
    }

    fn select(&mut self, index: usize) {
        self.selected = index;
        self.detail_scroll = 0;
        let row = highlight::row_of(index, self.marker());
        self.list_scroll = highlight::keep_visible(self.list_scroll, row, self.list_height());
    }

    /// Page-wise scroll of whichever panel is in front.
    fn scroll(&mut self, down: bool) {
        let page = self.list_height();
        let list_in_front = self.layout.is_single() && self.focus == Focus::List;
        if list_in_front {
            self.list_scroll = if down {
                self.list_scroll.saturating_add(page)
            } else {
                self.list_scroll.saturating_sub(page)
            };
            self.clamp_list_scroll();
        } else {
            self.detail_scroll = if down {
                self.detail_scroll.saturating_add(page)
            } else {
                self.detail_scroll.saturating_sub(page)
            };
            self.clamp_detail_scroll();
        }
    }

    fn list_height(&self) -> usize {
        usize::from(self.layout.viewport_height())
    }

    fn clamp_list_scroll(&mut self) {
        let rows = highlight::row_count(self.events.len(), self.marker());
        let max = rows.saturating_sub(self.list_height());
        self.list_scroll = self.list_scroll.min(max);
    }

    fn clamp_detail_scroll(&mut self) {
        let lines = self
            .selected_event()
            .map(|e| detail::content_lines(e, &self.theme, self.layout.detail_viewport_width(), self.now).len())
            .unwrap_or(0);
        let max = lines.saturating_sub(self.list_height());
        self.detail_scroll = self.detail_scroll.min(max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{local, local_event, test_date};

    fn day() -> Vec<Event> {
        let mut events = vec![
            local_event("me", "9", local(9, 0), local(10, 0)),
            local_event("me", "11", local(11, 0), local(12, 0)),
            local_event("me", "14", local(14, 0), local(15, 0)),
        ];
        events[1].meeting_url = Some("https://meet.example.com/abc".into());
        events[2].url = Some("https://calendar.example.com/14".into());
        events
    }

    fn loaded(now: DateTime<Local>) -> App {
        let (app, command) = App::new(test_date(), now, Theme::default()).init();
        let request = match command {
            Command::Fetch(request) => request,
            other => panic!("expected fetch, got {:?}", other),
        };
        let (app, _) = app.update(
            Message::FetchCompleted(FetchOutcome {
                generation: request.generation,
                date: request.date,
                result: Ok(day()),
            }),
            now,
        );
        app
    }

    fn press(app: App, action: Action) -> (App, Command) {
        let now = app.now;
        app.update(Message::Input(action), now)
    }

    #[test]
    fn test_init_requests_fetch_and_loads() {
        let (app, command) = App::new(test_date(), local(8, 0), Theme::default()).init();
        assert_eq!(app.status(), Status::Loading);
        assert_eq!(
            command,
            Command::Fetch(FetchRequest {
                generation: 1,
                date: test_date()
            })
        );
    }

    #[test]
    fn test_successful_fetch_selects_first_upcoming() {
        let app = loaded(local(11, 30));
        assert_eq!(app.status(), Status::Ready);
        assert_eq!(app.selected, 2);
        assert_eq!(app.marker(), Some(2));
    }

    #[test]
    fn test_stale_fetch_is_dropped() {
        let app = loaded(local(8, 0));
        let (app, command) = press(app, Action::NextDay);
        let stale = match command {
            Command::Fetch(request) => FetchRequest {
                generation: request.generation - 1,
                date: test_date(),
            },
            other => panic!("expected fetch, got {:?}", other),
        };
        let (app, _) = app.update(
            Message::FetchCompleted(FetchOutcome {
                generation: stale.generation,
                date: stale.date,
                result: Ok(day()),
            }),
            local(8, 0),
        );
        assert!(app.events.is_empty());
        assert_eq!(app.status(), Status::Loading);
    }

    #[test]
    fn test_day_change_clears_sequence() {
        let app = loaded(local(8, 0));
        let (app, command) = press(app, Action::PreviousDay);
        assert!(app.events.is_empty());
        assert_eq!(app.selected, 0);
        assert_eq!(app.date, test_date().pred_opt().unwrap());
        assert!(matches!(command, Command::Fetch(_)));
    }

    #[test]
    fn test_error_keeps_previous_sequence() {
        let app = loaded(local(8, 0));
        let (app, command) = press(app, Action::Refresh);
        let request = match command {
            Command::Fetch(request) => request,
            other => panic!("expected fetch, got {:?}", other),
        };
        assert_eq!(app.events.len(), 3);
        let (app, _) = app.update(
            Message::FetchCompleted(FetchOutcome {
                generation: request.generation,
                date: request.date,
                result: Err(FetchError::NoCalendars),
            }),
            local(8, 0),
        );
        assert_eq!(app.status(), Status::Errored);
        assert_eq!(app.events.len(), 3);
    }

    #[test]
    fn test_replace_sequence_clamps_selection() {
        let mut app = loaded(local(8, 0));
        app.selected = 2;
        app.replace_sequence(day().into_iter().take(1).collect());
        assert_eq!(app.selected, 0);
        app.replace_sequence(Vec::new());
        assert_eq!(app.selected, 0);
        assert!(app.selected_event().is_none());
    }

    #[test]
    fn test_selection_stops_at_bounds() {
        let app = loaded(local(8, 0));
        let (app, _) = press(app, Action::SelectPrevious);
        assert_eq!(app.selected, 0);
        let (app, _) = press(app, Action::SelectNext);
        let (app, _) = press(app, Action::SelectNext);
        let (app, _) = press(app, Action::SelectNext);
        assert_eq!(app.selected, 2);
    }

    #[test]
    fn test_moving_selection_resets_detail_scroll() {
        let mut app = loaded(local(8, 0));
        app.detail_scroll = 4;
        let (app, _) = press(app, Action::SelectNext);
        assert_eq!(app.detail_scroll, 0);
    }

    #[test]
    fn test_tick_does_not_move_selection() {
        let app = loaded(local(8, 0));
        assert_eq!(app.selected, 0);
        let (app, command) = app.update(Message::Tick, local(12, 30));
        assert_eq!(command, Command::None);
        assert_eq!(app.selected, 0);
        assert_eq!(app.now, local(12, 30));
    }

    #[test]
    fn test_tick_keeps_marker_in_place() {
        let app = loaded(local(9, 30));
        assert_eq!(app.marker(), Some(1));
        assert_eq!(app.selected, 1);
        let (app, _) = app.update(Message::Tick, local(14, 30));
        assert_eq!(app.marker(), Some(1));
        assert_eq!(app.selected, 1);
        let (app, _) = app.update(Message::Resize { width: 120, height: 40 }, local(14, 45));
        assert_eq!(app.marker(), Some(1));
    }

    #[test]
    fn test_today_on_current_day_replaces_marker_without_fetch() {
        let app = loaded(local(8, 0));
        let (app, _) = app.update(Message::Tick, local(12, 30));
        assert_eq!(app.marker(), Some(0));
        let (app, command) = press(app, Action::Today);
        assert_eq!(command, Command::None);
        assert_eq!(app.selected, 2);
        assert_eq!(app.marker(), Some(2));
    }

    #[test]
    fn test_today_from_other_day_fetches() {
        let app = loaded(local(8, 0));
        let (app, _) = press(app, Action::NextDay);
        let (app, command) = press(app, Action::Today);
        assert_eq!(app.date, test_date());
        assert!(matches!(command, Command::Fetch(FetchRequest { generation: 3, .. })));
    }

    #[test]
    fn test_focus_toggle_has_no_side_effects() {
        let app = loaded(local(8, 0));
        let (app, command) = press(app, Action::ToggleFocus);
        assert_eq!(app.focus, Focus::Detail);
        assert_eq!(command, Command::None);
        assert_eq!(app.events.len(), 3);
    }

    #[test]
    fn test_open_links() {
        let app = loaded(local(8, 0));
        let (app, command) = press(app, Action::OpenMeeting);
        assert_eq!(command, Command::None);
        let (app, _) = press(app, Action::SelectNext);
        let (app, command) = press(app, Action::OpenMeeting);
        assert_eq!(command, Command::OpenUrl("https://meet.example.com/abc".into()));
        let (app, _) = press(app, Action::SelectNext);
        let (_, command) = press(app, Action::OpenEvent);
        assert_eq!(command, Command::OpenUrl("https://calendar.example.com/14".into()));
    }

    #[test]
    fn test_help_swallows_next_key() {
        let app = loaded(local(8, 0));
        let (app, _) = press(app, Action::ToggleHelp);
        assert!(app.show_help);
        let (app, command) = press(app, Action::NextDay);
        assert!(!app.show_help);
        assert_eq!(command, Command::None);
        assert_eq!(app.date, test_date());
    }

    #[test]
    fn test_unbound_key_closes_help() {
        let app = loaded(local(8, 0));
        let (app, _) = press(app, Action::ToggleHelp);
        let (app, command) = press(app, Action::Unbound);
        assert!(!app.show_help);
        assert_eq!(command, Command::None);
        let (app, _) = press(app, Action::Unbound);
        assert!(!app.show_help);
    }

    #[test]
    fn test_quit() {
        let app = loaded(local(8, 0));
        let (app, command) = press(app, Action::Quit);
        assert!(app.should_quit);
        assert_eq!(command, Command::Quit);
    }

    #[test]
    fn test_resize_switches_layout() {
        let app = loaded(local(8, 0));
        let (app, _) = app.update(Message::Resize { width: 60, height: 20 }, local(8, 0));
        assert!(app.layout.is_single());
        let (app, _) = app.update(Message::Resize { width: 120, height: 40 }, local(8, 0));
        assert!(!app.layout.is_single());
    }

    #[test]
    fn test_selection_stays_visible_in_short_viewport() {
        let mut events = day();
        for h in 15..22 {
            events.push(local_event("me", "late", local(h, 0), local(h, 30)));
        }
        let mut app = loaded(local(8, 0));
        app.replace_sequence(events);
        let (mut app, _) = app.update(Message::Resize { width: 100, height: 12 }, local(8, 0));
        let height = usize::from(app.layout.viewport_height());
        for _ in 0..8 {
            app = press(app, Action::SelectNext).0;
        }
        let row = highlight::row_of(app.selected, app.marker());
        assert!(row >= app.list_scroll && row < app.list_scroll + height);
    }

    fn late_day() -> Vec<Event> {
        let mut events = day();
        for h in 15..24 {
            events.push(local_event("me", "late", local(h, 0), local(h, 30)));
        }
        events
    }

    #[test]
    fn test_list_scroll_pages_in_single_mode() {
        let mut app = loaded(local(8, 0));
        app.replace_sequence(late_day());
        let (app, _) = app.update(Message::Resize { width: 60, height: 16 }, local(8, 0));
        assert!(app.layout.is_single());
        assert_eq!(app.focus, Focus::List);
        let page = usize::from(app.layout.viewport_height());
        let rows = highlight::row_count(app.events.len(), app.marker());
        assert_eq!(rows, 13);
        assert!(rows > 2 * page);

        let (app, command) = press(app, Action::ScrollDown);
        assert_eq!(command, Command::None);
        assert_eq!(app.list_scroll, page);
        let (app, command) = press(app, Action::ScrollDown);
        assert_eq!(command, Command::None);
        assert_eq!(app.list_scroll, rows - page);
        assert_eq!(app.detail_scroll, 0);

        let (app, command) = press(app, Action::ScrollUp);
        assert_eq!(command, Command::None);
        assert_eq!(app.list_scroll, rows - 2 * page);
        let (app, _) = press(app, Action::ScrollUp);
        assert_eq!(app.list_scroll, 0);
        assert_eq!(app.status(), Status::Ready);
        assert_eq!(app.events.len(), 12);

        // With the detail panel in front the list stays put.
        let (app, _) = press(app, Action::ToggleFocus);
        let (app, command) = press(app, Action::ScrollDown);
        assert_eq!(command, Command::None);
        assert_eq!(app.list_scroll, 0);
    }

    #[test]
    fn test_detail_scroll_pages_and_clamps_in_paired_mode() {
        let mut events = day();
        events[0].description = "agenda ".repeat(400);
        let mut app = loaded(local(8, 0));
        app.replace_sequence(events);
        let (app, _) = app.update(Message::Resize { width: 100, height: 16 }, local(8, 0));
        assert!(!app.layout.is_single());
        assert_eq!(app.selected, 0);
        let page = usize::from(app.layout.viewport_height());
        let total = detail::content_lines(&app.events[0], &app.theme, app.layout.detail_viewport_width(), app.now).len();
        assert!(total > 2 * page);

        let (mut app, command) = press(app, Action::ScrollDown);
        assert_eq!(command, Command::None);
        assert_eq!(app.detail_scroll, page);
        assert_eq!(app.list_scroll, 0);
        for _ in 0..total {
            app = press(app, Action::ScrollDown).0;
        }
        assert_eq!(app.detail_scroll, total - page);

        let (app, command) = press(app, Action::ScrollUp);
        assert_eq!(command, Command::None);
        assert_eq!(app.detail_scroll, total - 2 * page);
        assert_eq!(app.status(), Status::Ready);
        assert_eq!(app.events.len(), 3);
    }
}
