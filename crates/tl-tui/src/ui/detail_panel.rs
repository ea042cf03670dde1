use chrono::{DateTime, Utc};
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use crate::app::{App, ServiceRow};
use crate::ui::service_table::state_color;

pub fn render_with_now(f: &mut Frame, area: Rect, app: &App, now: DateTime<Utc>) {
    let block = Block::default()
        .title(" Details ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let Some(row) = app.selected_service() else {
        let empty = Paragraph::new(" No service selected").block(block);
        f.render_widget(empty, area);
        return;
    };

    let lines = build_detail_lines(row, now);
    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}

fn build_detail_lines(row: &ServiceRow, now: DateTime<Utc>) -> Vec<Line<'static>> {
    let state = if row.stopped {
        format!("{} (stopped)", row.status.state)
    } else {
        row.status.state.to_string()
    };
    let mut lines = vec![
        detail_line("Image", &row.image, Color::White),
        detail_line("State", &state, state_color(row.status.state)),
        detail_line("Lifetime", &row.lifetime, Color::White),
    ];

    if let Some(ref reason) = row.status.reason {
        lines.push(detail_line("Reason", reason, Color::Red));
    }

    match (row.status.started_at, row.status.ready_at) {
        (Some(started), Some(ready)) => {
            let took = ready.signed_duration_since(started);
            lines.push(detail_line(
                "Ready in",
                &format_duration(took),
                Color::Green,
            ));
            let up = now.signed_duration_since(ready);
            lines.push(detail_line("Uptime", &format_duration(up), Color::Green));
        }
        (Some(started), None) => {
            let waiting = now.signed_duration_since(started);
            lines.push(detail_line(
                "Starting",
                &format!("{} ago", format_duration(waiting)),
                Color::Yellow,
            ));
        }
        _ => {}
    }

    if !row.wait_for.is_empty() {
        lines.push(detail_line("Waits for", &row.wait_for.join(", "), Color::White));
    }
    if let Some(ref parent) = row.parent {
        lines.push(detail_line("Parent", parent, Color::White));
    }
    if !row.children.is_empty() {
        lines.push(detail_line("Children", &row.children.join(", "), Color::White));
    }

    for (label, url) in &row.endpoints {
        lines.push(detail_line(label, url, Color::Cyan));
    }

    lines
}

fn format_duration(d: chrono::Duration) -> String {
    let total_secs = d.num_seconds().max(0);
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{hours}h {mins:02}m")
    } else if mins > 0 {
        format!("{mins}m {secs:02}s")
    } else {
        format!("{secs}s")
    }
}

fn detail_line(label: &str, value: &str, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!("  {label:<10} "),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(value.to_string(), Style::default().fg(color)),
    ])
}
