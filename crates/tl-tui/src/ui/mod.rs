pub mod detail_panel;
pub mod dialog_confirm;
pub mod dialog_help;
pub mod layout;
pub mod log_view;
pub mod service_table;
pub mod status_bar;

use chrono::{DateTime, Utc};
use ratatui::Frame;

use crate::app::{App, Mode};

/// Top-level render dispatch. Pass `now` to pin timestamps for deterministic output,
/// or `None` to use the current time.
pub fn render(f: &mut Frame, app: &App, now: Option<DateTime<Utc>>) {
    let now = now.unwrap_or_else(Utc::now);
    let areas = layout::Areas::new(f.area());

    layout::render_title(f, areas.title, app);
    service_table::render(f, areas.services, app);
    detail_panel::render_with_now(f, areas.details, app, now);
    log_view::render(f, areas.logs, app);

    // Status bar / hotkey hints
    status_bar::render(f, areas.status, app);

    // Overlay dialogs
    match &app.mode {
        Mode::ConfirmDialog { message, action } => dialog_confirm::render(f, message, action),
        Mode::HelpDialog => dialog_help::render(f),
        Mode::ServiceList => {}
    }
}
