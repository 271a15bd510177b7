use crate::app::{App, Focus};
use crate::event::Event;
use crate::ui::format::{format_clock, format_duration, truncate};
use crate::ui::Theme;
use chrono::{DateTime, Local, Utc};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Padding, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
    Frame,
};
use unicode_width::UnicodeWidthStr;

const TIME_COLUMN: usize = 11;
const DURATION_COLUMN: usize = 7;

/// Centered "now" rule, padded with box-drawing dashes to `width` columns.
pub fn now_divider(now: DateTime<Local>, width: usize) -> String {
    let label = format!(" ▶ NOW {} ◀ ", format_clock(now));
    let free = width.saturating_sub(label.width());
    let left = free / 2;
    format!("{}{}{}", "─".repeat(left), label, "─".repeat(free - left))
}

fn event_row(event: &Event, selected: bool, now: DateTime<Utc>, width: usize, theme: &Theme) -> Line<'static> {
    let past = event.has_ended(now);
    let time = if event.all_day {
        "All day".to_string()
    } else {
        format_clock(event.start.with_timezone(&Local))
    };
    let time = if past { format!("✓ {}", time) } else { time };
    let duration = if event.all_day {
        String::new()
    } else {
        format_duration(event.duration())
    };

    let mut suffix = String::new();
    if event.meeting_url.is_some() {
        suffix.push_str(" ⧉");
    }
    if event.in_progress(now) {
        suffix.push_str(" ●");
    }
    let badge = event.kind.badge().map(|b| format!("[{}] ", b)).unwrap_or_default();
    let title_width = width
        .saturating_sub(TIME_COLUMN + DURATION_COLUMN + suffix.width())
        .max(10);
    let title = truncate(&format!("{}{}", badge, event.title), title_width);

    let (time_style, body_style) = if past {
        let faded = Style::default().fg(theme.muted).add_modifier(Modifier::DIM);
        (faded, faded)
    } else {
        (Style::default().fg(theme.green), Style::default().fg(theme.foreground))
    };

    let mut line = Line::from(vec![
        Span::styled(format!("{:<w$}", time, w = TIME_COLUMN), time_style),
        Span::styled(
            format!("{:<w$}", duration, w = DURATION_COLUMN),
            Style::default().fg(theme.muted),
        ),
        Span::styled(title, body_style),
        Span::styled(suffix, Style::default().fg(theme.teal)),
    ]);
    if selected {
        let highlight = if past {
            Style::default().bg(theme.surface).fg(theme.muted)
        } else {
            Style::default()
                .bg(theme.mauve)
                .fg(theme.background)
                .add_modifier(Modifier::BOLD)
        };
        line = line.patch_style(highlight);
    }
    line
}

/// Every row of the list, divider included, in display order.
pub fn list_rows(app: &App, width: usize, theme: &Theme) -> Vec<Line<'static>> {
    let now = app.now.with_timezone(&Utc);
    let marker = app.marker();
    let divider = || {
        Line::from(Span::styled(
            now_divider(app.now, width),
            Style::default().fg(theme.yellow).add_modifier(Modifier::BOLD),
        ))
    };

    let mut rows = Vec::with_capacity(app.events.len() + 1);
    for (i, event) in app.events.iter().enumerate() {
        if marker == Some(i) {
            rows.push(divider());
        }
        rows.push(event_row(event, i == app.selected, now, width, theme));
    }
    if marker == Some(app.events.len()) {
        rows.push(divider());
    }
    rows
}

pub fn draw_list_panel(f: &mut Frame, app: &App, area: Rect, theme: &Theme) {
    let border = if app.focus == Focus::List || !app.layout.is_single() {
        theme.mauve
    } else {
        theme.muted
    };
    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border))
        .padding(Padding::horizontal(1))
        .title(Span::styled(
            " Events ",
            Style::default().fg(theme.mauve).add_modifier(Modifier::BOLD),
        ));

    if app.events.is_empty() {
        let empty = Paragraph::new("No events")
            .style(Style::default().fg(theme.muted))
            .block(block);
        f.render_widget(empty, area);
        return;
    }

    let width = usize::from(app.layout.list_viewport_width());
    let rows = list_rows(app, width, theme);
    let total = rows.len();
    let viewport = usize::from(area.height.saturating_sub(2));
    if total > viewport {
        block = block.title(Span::styled(
            format!("({}/{}) ", app.selected + 1, app.events.len()),
            Style::default().fg(theme.muted),
        ));
    }

    let scroll = u16::try_from(app.list_scroll).unwrap_or(u16::MAX);
    f.render_widget(Paragraph::new(rows).block(block).scroll((scroll, 0)), area);

    if total > viewport {
        let mut state = ScrollbarState::new(total.saturating_sub(viewport)).position(app.list_scroll);
        f.render_stateful_widget(
            Scrollbar::default()
                .orientation(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓")),
            area,
            &mut state,
        );
    }
}
