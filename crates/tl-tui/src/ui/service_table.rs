use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState};
use ratatui::Frame;

use tl_core::models::RunState;

use crate::app::{App, ServiceRow};

pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let items: Vec<ListItem> = app
        .services
        .iter()
        .map(|row| {
            let line = Line::from(vec![
                Span::raw(" "),
                state_icon(row),
                Span::raw(" "),
                Span::styled(row.name.clone(), Style::default().fg(Color::White)),
                Span::raw("  "),
                Span::styled(state_label(row), Style::default().fg(Color::DarkGray)),
            ]);
            ListItem::new(line)
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .title(" Services ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Rgb(0x1A, 0x3A, 0x5C))
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    if !app.services.is_empty() {
        state.select(Some(app.selected_index));
    }

    f.render_stateful_widget(list, area, &mut state);
}

pub fn state_icon(row: &ServiceRow) -> Span<'static> {
    if row.stopped {
        return Span::styled("■", Style::default().fg(Color::DarkGray));
    }
    match row.status.state {
        RunState::Pending => Span::styled("…", Style::default().fg(Color::DarkGray)),
        RunState::Starting => Span::styled("◎", Style::default().fg(Color::Yellow)),
        RunState::Ready => Span::styled("▶", Style::default().fg(Color::Green)),
        RunState::Failed => Span::styled("✗", Style::default().fg(Color::Red)),
        RunState::SkippedDueToDependencyFailure => {
            Span::styled("⊘", Style::default().fg(Color::Red))
        }
        RunState::Cancelled => Span::styled("○", Style::default().fg(Color::DarkGray)),
    }
}

/// Short label for the table; the detail panel shows the full state.
pub fn state_label(row: &ServiceRow) -> &'static str {
    if row.stopped {
        return "stopped";
    }
    match row.status.state {
        RunState::Pending => "pending",
        RunState::Starting => "starting",
        RunState::Ready => "ready",
        RunState::Failed => "failed",
        RunState::SkippedDueToDependencyFailure => "skipped",
        RunState::Cancelled => "cancelled",
    }
}

pub fn state_color(state: RunState) -> Color {
    match state {
        RunState::Ready => Color::Green,
        RunState::Starting => Color::Yellow,
        RunState::Failed | RunState::SkippedDueToDependencyFailure => Color::Red,
        RunState::Pending | RunState::Cancelled => Color::DarkGray,
    }
}
