use crate::app::{App, Focus};
use crate::event::{Event, ResponseStatus};
use crate::ui::format::{format_duration, format_event_time, truncate, wrap_text};
use crate::ui::Theme;
use chrono::{DateTime, Local, Utc};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Padding, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
    Frame,
};

const LABEL_WIDTH: usize = 12;

fn status_style(status: ResponseStatus, theme: &Theme) -> Style {
    match status {
        ResponseStatus::Accepted => Style::default().fg(theme.green),
        ResponseStatus::Rejected => Style::default().fg(theme.red),
        ResponseStatus::Tentative | ResponseStatus::Awaiting => Style::default().fg(theme.yellow),
        ResponseStatus::NoResponseNeeded => Style::default().fg(theme.muted),
    }
}

/// Label column followed by a value wrapped under itself.
fn field(lines: &mut Vec<Line<'static>>, label: &str, value: &str, value_style: Style, width: usize, theme: &Theme) {
    let label_style = Style::default().fg(theme.peach).add_modifier(Modifier::BOLD);
    let value_width = width.saturating_sub(LABEL_WIDTH + 1).max(10);
    let indent = " ".repeat(LABEL_WIDTH + 1);
    for (i, chunk) in wrap_text(value, value_width).into_iter().enumerate() {
        let head = if i == 0 {
            Span::styled(format!("{:<w$} ", label, w = LABEL_WIDTH), label_style)
        } else {
            Span::raw(indent.clone())
        };
        lines.push(Line::from(vec![head, Span::styled(chunk, value_style)]));
    }
}

fn section(lines: &mut Vec<Line<'static>>, label: &str, theme: &Theme) {
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        label.to_string(),
        Style::default().fg(theme.peach).add_modifier(Modifier::BOLD),
    )));
}

/// Fully wrapped body of the detail panel. The line count is what the
/// detail scroll is clamped against.
pub fn content_lines(event: &Event, theme: &Theme, width: u16, now: DateTime<Local>) -> Vec<Line<'static>> {
    let width = usize::from(width).max(10);
    let value = Style::default().fg(theme.foreground);
    let now_utc = now.with_timezone(&Utc);
    let mut lines: Vec<Line<'static>> = Vec::new();

    let title_style = Style::default().fg(theme.mauve).add_modifier(Modifier::BOLD);
    for chunk in wrap_text(&event.title, width) {
        lines.push(Line::from(Span::styled(chunk, title_style)));
    }
    lines.push(Line::from(""));

    if event.calendars.len() > 1 {
        let names: Vec<&str> = event.calendars.iter().map(|a| a.calendar.name.as_str()).collect();
        field(&mut lines, "Calendars", &names.join(", "), value, width, theme);
    } else if !event.primary_calendar().name.is_empty() {
        field(&mut lines, "Calendar", &event.primary_calendar().name, value, width, theme);
    }
    if let Some(badge) = event.kind.badge() {
        field(&mut lines, "Type", badge, Style::default().fg(theme.teal), width, theme);
    }
    field(
        &mut lines,
        "When",
        &format_event_time(event.start, event.end, event.all_day),
        value,
        width,
        theme,
    );
    if !event.all_day {
        field(&mut lines, "Duration", &format_duration(event.duration()), value, width, theme);
    }

    lines.push(Line::from(""));
    if event.has_ended(now_utc) {
        lines.push(Line::from(Span::styled(
            format!("✓ Ended {} ago", format_duration(now_utc - event.end)),
            Style::default().fg(theme.muted).add_modifier(Modifier::ITALIC),
        )));
    } else if event.in_progress(now_utc) {
        lines.push(Line::from(Span::styled(
            format!(" IN PROGRESS • {} remaining ", format_duration(event.end - now_utc)),
            Style::default()
                .bg(theme.green)
                .fg(theme.background)
                .add_modifier(Modifier::BOLD),
        )));
    } else if event.start > now_utc {
        lines.push(Line::from(Span::styled(
            format!("Starts in {}", format_duration(event.start - now_utc)),
            Style::default().fg(theme.yellow),
        )));
    }
    lines.push(Line::from(""));

    if !event.location.is_empty() {
        field(&mut lines, "Location", &event.location, value, width, theme);
    }
    if let Some(url) = &event.meeting_url {
        let shown = truncate(url, width.saturating_sub(LABEL_WIDTH + 1));
        let link = Style::default().fg(theme.blue).add_modifier(Modifier::UNDERLINED);
        lines.push(Line::from(vec![
            Span::styled(
                format!("{:<w$} ", "Join", w = LABEL_WIDTH),
                Style::default().fg(theme.peach).add_modifier(Modifier::BOLD),
            ),
            Span::styled(shown, link),
        ]));
    }

    if event.calendars.len() > 1 {
        section(&mut lines, "Responses", theme);
        for affiliation in &event.calendars {
            lines.push(Line::from(vec![
                Span::styled(format!("   {}: ", affiliation.calendar.name), value),
                Span::styled(affiliation.status.label(), status_style(affiliation.status, theme)),
            ]));
        }
    } else {
        field(
            &mut lines,
            "Response",
            event.status.label(),
            status_style(event.status, theme),
            width,
            theme,
        );
    }

    if !event.description.trim().is_empty() {
        section(&mut lines, "Description", theme);
        let text = html2text::from_read(event.description.as_bytes(), width)
            .unwrap_or_else(|_| event.description.clone());
        let mut blank_run = 0;
        for chunk in wrap_text(text.trim_end(), width) {
            blank_run = if chunk.is_empty() { blank_run + 1 } else { 0 };
            if blank_run < 2 {
                lines.push(Line::from(Span::styled(chunk, value)));
            }
        }
    }

    if !event.attachments.is_empty() {
        section(&mut lines, "Attachments", theme);
        let max = width.saturating_sub(5);
        for attachment in &event.attachments {
            let style = if attachment.url.is_some() {
                Style::default().fg(theme.blue).add_modifier(Modifier::UNDERLINED)
            } else {
                value
            };
            lines.push(Line::from(vec![
                Span::raw("   • "),
                Span::styled(truncate(&attachment.name, max), style),
            ]));
        }
    }

    lines
}

pub fn draw_detail_panel(f: &mut Frame, app: &App, area: Rect, theme: &Theme) {
    let border = if app.focus == Focus::Detail {
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
            " Event Details ",
            Style::default().fg(theme.mauve).add_modifier(Modifier::BOLD),
        ));

    let Some(event) = app.selected_event() else {
        let empty = Paragraph::new("No event selected")
            .style(Style::default().fg(theme.muted))
            .block(block);
        f.render_widget(empty, area);
        return;
    };

    let lines = content_lines(event, theme, app.layout.detail_viewport_width(), app.now);
    let total = lines.len();
    let viewport = usize::from(area.height.saturating_sub(2));
    if total > viewport && total > 0 {
        let max = total.saturating_sub(viewport).max(1);
        let percent = app.detail_scroll.min(max) * 100 / max;
        block = block.title_bottom(Line::from(Span::styled(
            format!(" {}% ", percent),
            Style::default().fg(theme.muted),
        )));
    }

    let scroll = u16::try_from(app.detail_scroll).unwrap_or(u16::MAX);
    let paragraph = Paragraph::new(lines).block(block).scroll((scroll, 0));
    f.render_widget(paragraph, area);

    if total > viewport {
        let mut state = ScrollbarState::new(total.saturating_sub(viewport)).position(app.detail_scroll);
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
