use chrono::{DateTime, Duration, Local, Utc};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Compact duration: `45m`, `1h 30m`, `2d 3h`. Negative spans are shown by magnitude.
pub fn format_duration(d: Duration) -> String {
    let d = if d < Duration::zero() { -d } else { d };
    let days = d.num_days();
    let hours = d.num_hours() % 24;
    let minutes = d.num_minutes() % 60;

    if days > 0 {
        if hours > 0 {
            format!("{}d {}h", days, hours)
        } else {
            format!("{}d", days)
        }
    } else if hours > 0 {
        if minutes > 0 {
            format!("{}h {}m", hours, minutes)
        } else {
            format!("{}h", hours)
        }
    } else {
        format!("{}m", minutes)
    }
}

pub fn format_clock(t: DateTime<Local>) -> String {
    t.format("%-I:%M %p").to_string()
}

/// Local-time description of an event's span.
pub fn format_event_time(start: DateTime<Utc>, end: DateTime<Utc>, all_day: bool) -> String {
    let start = start.with_timezone(&Local);
    let end = end.with_timezone(&Local);
    if all_day {
        return format!("{} (all day)", start.format("%a, %b %-d"));
    }
    if start.date_naive() == end.date_naive() {
        format!(
            "{}, {} - {}",
            start.format("%a, %b %-d"),
            format_clock(start),
            format_clock(end)
        )
    } else {
        format!(
            "{} {} - {} {}",
            start.format("%a, %b %-d"),
            format_clock(start),
            end.format("%a, %b %-d"),
            format_clock(end)
        )
    }
}

/// Cuts `s` to at most `max` display columns, ending with `…` when shortened.
pub fn truncate(s: &str, max: usize) -> String {
    if s.width() <= max {
        return s.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > max - 1 {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

/// Greedy word wrap by display width. Words longer than a line are split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        let mut used = 0;
        for word in paragraph.split_whitespace() {
            let mut word = word.to_string();
            loop {
                let w = word.width();
                let gap = usize::from(used > 0);
                if used + gap + w <= width {
                    if gap == 1 {
                        line.push(' ');
                    }
                    line.push_str(&word);
                    used += gap + w;
                    break;
                }
                if used > 0 {
                    lines.push(std::mem::take(&mut line));
                    used = 0;
                    continue;
                }
                let (head, tail) = split_at_width(&word, width);
                lines.push(head);
                word = tail;
            }
        }
        lines.push(line);
    }
    lines
}

fn split_at_width(s: &str, width: usize) -> (String, String) {
    let mut used = 0;
    for (i, c) in s.char_indices() {
        let w = c.width().unwrap_or(0);
        if used + w > width && i > 0 {
            return (s[..i].to_string(), s[i..].to_string());
        }
        used += w;
    }
    (s.to_string(), String::new())
}
