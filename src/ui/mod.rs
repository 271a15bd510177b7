use crate::app::{App, Focus, Status};
use crate::config::ConfigTheme;
use crate::highlight::is_today;
use crate::layout::PanelLayout;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Padding, Paragraph, Row, Table, Wrap},
    Frame,
};
use std::collections::HashMap;
use unicode_width::UnicodeWidthStr;

pub mod detail;
pub mod format;
pub mod list;

use detail::draw_detail_panel;
use list::draw_list_panel;

#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub background: Color,
    pub foreground: Color,
    pub yellow: Color,
    pub blue: Color,
    pub mauve: Color,
    pub green: Color,
    pub red: Color,
    pub peach: Color,
    pub teal: Color,
    pub muted: Color,
    pub surface: Color,
}

impl Theme {
    pub fn from_string(name: &str, custom_themes: &Option<HashMap<String, ConfigTheme>>) -> Self {
        let name_lower = name.to_lowercase();

        if let Some(themes) = custom_themes {
            if let Some(custom) = themes.get(&name_lower) {
                return Self::from_config(custom);
            }
        }

        match name_lower.as_str() {
            "violet" => Self::violet(),
            _ => Self::default(),
        }
    }

    pub fn from_config(config: &ConfigTheme) -> Self {
        fn parse_color(s: &str) -> Color {
            if s.starts_with('#') && s.len() == 7 && s.is_ascii() {
                let r = u8::from_str_radix(&s[1..3], 16).unwrap_or(255);
                let g = u8::from_str_radix(&s[3..5], 16).unwrap_or(255);
                let b = u8::from_str_radix(&s[5..7], 16).unwrap_or(255);
                Color::Rgb(r, g, b)
            } else {
                Color::White
            }
        }

        let default = Self::default();
        Self {
            background: parse_color(&config.background),
            foreground: parse_color(&config.foreground),
            yellow: parse_color(&config.yellow),
            blue: parse_color(&config.blue),
            mauve: parse_color(&config.mauve),
            green: parse_color(&config.green),
            red: parse_color(&config.red),
            peach: parse_color(&config.peach),
            teal: parse_color(&config.teal),
            muted: config.muted.as_deref().map_or(default.muted, parse_color),
            surface: config.surface.as_deref().map_or(default.surface, parse_color),
        }
    }

    /// Purple/amber palette on dark gray.
    pub fn violet() -> Self {
        Self {
            background: Color::Rgb(31, 41, 55),
            foreground: Color::Rgb(249, 250, 251),
            yellow: Color::Rgb(245, 158, 11),
            blue: Color::Rgb(96, 165, 250),
            mauve: Color::Rgb(124, 58, 237),
            green: Color::Rgb(16, 185, 129),
            red: Color::Rgb(239, 68, 68),
            peach: Color::Rgb(245, 158, 11),
            teal: Color::Rgb(45, 212, 191),
            muted: Color::Rgb(107, 114, 128),
            surface: Color::Rgb(55, 65, 81),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Color::Rgb(30, 30, 46),
            foreground: Color::Rgb(205, 214, 244),
            yellow: Color::Rgb(249, 226, 175),
            blue: Color::Rgb(137, 180, 250),
            mauve: Color::Rgb(203, 166, 247),
            green: Color::Rgb(166, 227, 161),
            red: Color::Rgb(243, 139, 168),
            peach: Color::Rgb(250, 179, 135),
            teal: Color::Rgb(148, 226, 213),
            muted: Color::Rgb(108, 112, 134),
            surface: Color::Rgb(49, 50, 68),
        }
    }
}

const HELP_KEYS: [(&str, &str); 8] = [
    ("↑/↓", "nav"),
    ("←/→", "day"),
    ("tab", "panel"),
    ("t", "now"),
    ("enter", "meet"),
    ("v", "view"),
    ("r", "refresh"),
    ("q", "quit"),
];

const HELP_ROWS: [(&str, &str); 12] = [
    ("↑ / k", "Move up"),
    ("↓ / j", "Move down"),
    ("ctrl+u/d", "Scroll detail panel"),
    ("→ / l", "Next day"),
    ("← / h", "Previous day"),
    ("t", "Jump to now / today"),
    ("tab", "Switch panel"),
    ("enter", "Join meeting"),
    ("v", "Open event in calendar"),
    ("r", "Refresh events"),
    ("?", "Toggle help"),
    ("q / ctrl+c", "Quit"),
];

fn draw_header(f: &mut Frame, app: &App, area: Rect, theme: &Theme) {
    let mut date = app.date.format("%A, %B %-d, %Y").to_string();
    if is_today(app.date, app.now) {
        date = format!("Today • {}", date);
    }
    let mut spans = vec![
        Span::styled(" agenda", Style::default().fg(theme.mauve).add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        Span::styled(date, Style::default().fg(theme.muted)),
    ];
    if app.layout.is_single() {
        let panel = match app.focus {
            Focus::List => " [Events]",
            Focus::Detail => " [Details]",
        };
        spans.push(Span::styled(
            panel,
            Style::default().fg(theme.mauve).add_modifier(Modifier::BOLD),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Help bar line, collapsed to a single hint when it would not fit `width`.
pub fn help_bar(width: u16, theme: &Theme) -> Line<'static> {
    let key = Style::default().fg(theme.mauve).add_modifier(Modifier::BOLD);
    let text = Style::default().fg(theme.muted);
    let full: usize = HELP_KEYS
        .iter()
        .map(|(k, d)| k.width() + 1 + d.width())
        .sum::<usize>()
        + (HELP_KEYS.len() - 1) * 5;
    if full > usize::from(width.saturating_sub(4)) {
        return Line::from(vec![Span::styled("?", key), Span::styled(" help", text)]);
    }

    let mut spans = Vec::new();
    for (i, (k, d)) in HELP_KEYS.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled("  •  ", text));
        }
        spans.push(Span::styled(*k, key));
        spans.push(Span::styled(format!(" {}", d), text));
    }
    Line::from(spans)
}

fn draw_help_panel(f: &mut Frame, area: Rect, theme: &Theme) {
    let rows: Vec<Row> = HELP_ROWS
        .iter()
        .map(|(k, d)| {
            Row::new(vec![
                Span::styled(*k, Style::default().fg(theme.mauve).add_modifier(Modifier::BOLD)),
                Span::styled(*d, Style::default().fg(theme.foreground)),
            ])
        })
        .collect();

    let table = Table::new(rows, [Constraint::Length(12), Constraint::Min(0)])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(theme.mauve))
                .padding(Padding::horizontal(1))
                .title(Span::styled(
                    " Keyboard Shortcuts ",
                    Style::default().fg(theme.mauve).add_modifier(Modifier::BOLD),
                ))
                .title_bottom(Span::styled(
                    " Press any key to close ",
                    Style::default().fg(theme.muted).add_modifier(Modifier::ITALIC),
                )),
        )
        .column_spacing(1);
    f.render_widget(table, area);
}

fn draw_message(f: &mut Frame, area: Rect, text: String, style: Style, alignment: Alignment) {
    let top = area.height / 2;
    let area = if alignment == Alignment::Center {
        Rect {
            y: area.y + top.saturating_sub(1),
            height: area.height - top.saturating_sub(1),
            ..area
        }
    } else {
        area
    };
    f.render_widget(
        Paragraph::new(text)
            .style(style)
            .alignment(alignment)
            .wrap(Wrap { trim: true }),
        area,
    );
}

fn draw_panels(f: &mut Frame, app: &App, area: Rect, layout: &PanelLayout, theme: &Theme) {
    if layout.is_single() {
        let panel = Rect {
            width: layout.list_width.min(area.width),
            ..area
        };
        if app.show_help {
            draw_help_panel(f, panel, theme);
        } else if app.focus == Focus::List {
            draw_list_panel(f, app, panel, theme);
        } else {
            draw_detail_panel(f, app, panel, theme);
        }
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(layout.list_width),
            Constraint::Length(1),
            Constraint::Length(layout.detail_width),
            Constraint::Min(0),
        ])
        .split(area);
    draw_list_panel(f, app, chunks[0], theme);
    if app.show_help {
        draw_help_panel(f, chunks[2], theme);
    } else {
        draw_detail_panel(f, app, chunks[2], theme);
    }
}

pub fn ui(f: &mut Frame, app: &App) {
    let theme = &app.theme;
    f.render_widget(
        Block::default().style(Style::default().bg(theme.background)),
        f.size(),
    );

    let layout = app.layout;
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(2)
        .vertical_margin(1)
        .constraints([
            Constraint::Length(2),                      // Header
            Constraint::Length(layout.content_height), // Panels
            Constraint::Length(1),                      // Spacer
            Constraint::Length(1),                      // Help bar
        ])
        .split(f.size());

    draw_header(f, app, main_chunks[0], theme);

    let content = main_chunks[1];
    match app.status() {
        Status::Loading => draw_message(
            f,
            content,
            "Loading events...".to_string(),
            Style::default().fg(theme.foreground),
            Alignment::Center,
        ),
        Status::Errored => {
            let message = app
                .error
                .as_ref()
                .map(|e| format!("Error: {}", e))
                .unwrap_or_default();
            draw_message(f, content, message, Style::default().fg(theme.red), Alignment::Left);
        }
        Status::Ready => draw_panels(f, app, content, &layout, theme),
    }

    f.render_widget(Paragraph::new(help_bar(f.size().width, theme)), main_chunks[3]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Message;
    use crate::error::FetchError;
    use crate::fetch::FetchOutcome;
    use crate::testing::{local, local_event, test_date};
    use ratatui::{backend::TestBackend, buffer::Buffer, Terminal};

    fn plain(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn screen(buffer: &Buffer) -> String {
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer.get(x, y).symbol());
            }
            out.push('\n');
        }
        out
    }

    fn render(app: &App, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|f| ui(f, app)).unwrap();
        screen(terminal.backend().buffer())
    }

    fn ready_app(width: u16, height: u16, result: crate::error::Result<Vec<crate::event::Event>>) -> App {
        let now = local(10, 0);
        let (app, _) = App::new(test_date(), now, Theme::default()).init();
        let (app, _) = app.update(Message::Resize { width, height }, now);
        let (app, _) = app.update(
            Message::FetchCompleted(FetchOutcome {
                generation: 1,
                date: test_date(),
                result,
            }),
            now,
        );
        app
    }

    #[test]
    fn test_help_bar_collapses_when_narrow() {
        let theme = Theme::default();
        assert_eq!(plain(&help_bar(40, &theme)), "? help");
        let full = plain(&help_bar(140, &theme));
        assert!(full.starts_with("↑/↓ nav  •  ←/→ day"));
        assert!(full.ends_with("q quit"));
    }

    #[test]
    fn test_custom_theme_lookup() {
        let mut themes = HashMap::new();
        themes.insert(
            "mine".to_string(),
            ConfigTheme {
                background: "#000000".into(),
                foreground: "#ffffff".into(),
                yellow: "#ffff00".into(),
                blue: "#0000ff".into(),
                mauve: "#ff00ff".into(),
                green: "#00ff00".into(),
                red: "#ff0000".into(),
                peach: "#ffaa00".into(),
                teal: "#00ffff".into(),
                muted: None,
                surface: Some("bogus".into()),
            },
        );
        let themes = Some(themes);
        let theme = Theme::from_string("Mine", &themes);
        assert_eq!(theme.background, Color::Rgb(0, 0, 0));
        assert_eq!(theme.muted, Theme::default().muted);
        assert_eq!(theme.surface, Color::White);
        assert_eq!(Theme::from_string("violet", &None), Theme::violet());
        assert_eq!(Theme::from_string("unknown", &None), Theme::default());
    }

    #[test]
    fn test_paired_layout_renders_both_panels() {
        let events = vec![local_event("me", "Design review", local(11, 0), local(12, 0))];
        let app = ready_app(120, 30, Ok(events));
        let screen = render(&app, 120, 30);
        assert!(screen.contains("Today • Wednesday, June 12, 2024"));
        assert!(screen.contains("Events"));
        assert!(screen.contains("Event Details"));
        assert!(screen.contains("Design review"));
        assert!(screen.contains("NOW 10:00 AM"));
    }

    #[test]
    fn test_single_layout_shows_focused_panel() {
        let events = vec![local_event("me", "Design review", local(11, 0), local(12, 0))];
        let app = ready_app(60, 30, Ok(events));
        let screen = render(&app, 60, 30);
        assert!(screen.contains("[Events]"));
        assert!(!screen.contains("Event Details"));
    }

    #[test]
    fn test_error_view() {
        let app = ready_app(100, 30, Err(FetchError::NoCalendars));
        let screen = render(&app, 100, 30);
        assert!(screen.contains("Error:"));
    }

    #[test]
    fn test_loading_view() {
        let (app, _) = App::new(test_date(), local(10, 0), Theme::default()).init();
        let screen = render(&app, 100, 30);
        assert!(screen.contains("Loading events..."));
    }
}
