use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::app::App;

pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let name = app
        .selected_service()
        .map(|r| r.name.as_str())
        .unwrap_or("");
    let follow = if app.log_auto_follow { "" } else { "[F] follow " };

    let block = Block::default()
        .title(format!(" Logs {name} {follow}"))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let lines = app.logs.lines(name).filter(|l| !l.is_empty());
    let Some(lines) = lines else {
        let empty = Paragraph::new(Span::styled(
            " No log output",
            Style::default().fg(Color::DarkGray),
        ))
        .block(block);
        f.render_widget(empty, area);
        return;
    };

    let inner_height = area.height.saturating_sub(2) as usize; // borders
    let total_lines = lines.len();
    let end = if app.log_auto_follow {
        total_lines
    } else {
        app.log_scroll.min(total_lines)
    };
    let start = end.saturating_sub(inner_height);

    let visible: Vec<Line> = lines
        .range(start..end)
        .map(|l| Line::from(Span::styled(l.clone(), Style::default().fg(Color::White))))
        .collect();

    let paragraph = Paragraph::new(visible).block(block);
    f.render_widget(paragraph, area);
}
