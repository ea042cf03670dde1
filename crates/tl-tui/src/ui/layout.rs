use ratatui::layout::{Constraint, Flex, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::app::App;

/// Screen regions of the dashboard.
///
/// ```text
/// title
/// services | details
///          | logs
/// status (2 lines)
/// ```
pub struct Areas {
    pub title: Rect,
    pub services: Rect,
    pub details: Rect,
    pub logs: Rect,
    pub status: Rect,
}

impl Areas {
    /// Detail rows: image, state, lifetime, reason, two timing lines,
    /// edges and the first endpoints, plus borders.
    const DETAIL_HEIGHT: u16 = 11;

    pub fn new(area: Rect) -> Self {
        let [title, content, status] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(10),
            Constraint::Length(2),
        ])
        .areas(area);
        let [services, right] =
            Layout::horizontal([Constraint::Percentage(35), Constraint::Percentage(65)])
                .areas(content);
        let [details, logs] =
            Layout::vertical([Constraint::Length(Self::DETAIL_HEIGHT), Constraint::Min(5)])
                .areas(right);

        Self {
            title,
            services,
            details,
            logs,
            status,
        }
    }
}

/// Title bar: topology name and how many services are up.
pub fn render_title(f: &mut Frame, area: Rect, app: &App) {
    let progress_color = if app.launch_finished {
        Color::Green
    } else {
        Color::Yellow
    };
    let title = Paragraph::new(Line::from(vec![
        Span::styled(" Topology Launcher ", Style::default().fg(Color::Yellow)),
        Span::styled(
            format!("{} ", app.topology_name),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!("{}/{} ready", app.ready_count(), app.services.len()),
            Style::default().fg(progress_color),
        ),
    ]));
    f.render_widget(title, area);
}

/// Overlay area centered in `area`, sized in percent of it.
pub fn popup_area(area: Rect, width_pct: u16, height_pct: u16) -> Rect {
    let [row] = Layout::vertical([Constraint::Percentage(height_pct)])
        .flex(Flex::Center)
        .areas(area);
    let [popup] = Layout::horizontal([Constraint::Percentage(width_pct)])
        .flex(Flex::Center)
        .areas(row);
    popup
}
