use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use crate::ui::layout::popup_area;

pub fn render(f: &mut Frame) {
    let area = popup_area(f.area(), 60, 70);
    f.render_widget(Clear, area);

    let block = Block::default()
        .title(" Help: Keybindings ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let lines = vec![
        section_header("Services"),
        key_line("Up / k", "Select previous service"),
        key_line("Down / j", "Select next service"),
        key_line("S", "Stop service and its children"),
        key_line("?", "Show this help"),
        key_line("Q / Esc", "Quit and stop all services"),
        key_line("Ctrl+C", "Quit immediately"),
        Line::from(""),
        section_header("Logs"),
        key_line("PgUp", "Scroll back"),
        key_line("PgDn", "Scroll forward"),
        key_line("F", "Re-engage auto-follow"),
        Line::from(""),
        section_header("Dialogs"),
        key_line("Y / Enter", "Confirm"),
        key_line("N / Esc", "Cancel / close"),
    ];

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}

fn section_header(title: &str) -> Line<'static> {
    Line::from(Span::styled(
        format!("  {title}"),
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    ))
}

fn key_line(key: &str, desc: &str) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!("    {key:<12}"),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(desc.to_string(), Style::default().fg(Color::White)),
    ])
}
