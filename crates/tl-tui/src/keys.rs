use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tokio::sync::mpsc;

use tl_core::services::launcher::TopologyLauncher;

use crate::app::{App, ConfirmAction, Mode};
use crate::event::AppEvent;

const LOG_PAGE: usize = 10;

/// Handle a key event, dispatching based on current mode.
pub fn handle_key(
    app: &mut App,
    key: KeyEvent,
    launcher: &TopologyLauncher,
    event_tx: &mpsc::UnboundedSender<AppEvent>,
) {
    tracing::debug!(mode = ?app.mode, key = ?key.code, "handle_key");
    match &app.mode {
        Mode::ServiceList => handle_service_list(app, key),
        Mode::ConfirmDialog { .. } => handle_confirm_dialog(app, key, launcher, event_tx),
        Mode::HelpDialog => handle_help_dialog(app, key),
    }
}

// ─── Service List Mode ──────────────────────────────────────────────────

fn handle_service_list(app: &mut App, key: KeyEvent) {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.should_quit = true;
        return;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            if app.services.is_empty() {
                app.should_quit = true;
            } else {
                app.mode = Mode::ConfirmDialog {
                    message: "Quit launcher? Running services will be stopped.".into(),
                    action: ConfirmAction::Quit,
                };
            }
        }
        KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::PageUp => app.scroll_log_up(LOG_PAGE),
        KeyCode::PageDown => app.scroll_log_down(LOG_PAGE),
        KeyCode::Char('f') => {
            app.log_auto_follow = true;
        }
        KeyCode::Char('s') => {
            let Some(row) = app.selected_service() else {
                return;
            };
            let message = if row.children.is_empty() {
                format!("Stop '{}'?", row.name)
            } else {
                format!(
                    "Stop '{}' and everything grouped under it ({})?",
                    row.name,
                    row.children.join(", ")
                )
            };
            let name = row.name.clone();
            app.mode = Mode::ConfirmDialog {
                message,
                action: ConfirmAction::StopService(name),
            };
        }
        KeyCode::Char('?') => {
            app.mode = Mode::HelpDialog;
        }
        _ => {}
    }
}

// ─── Dialog Handlers ────────────────────────────────────────────────────

fn handle_confirm_dialog(
    app: &mut App,
    key: KeyEvent,
    launcher: &TopologyLauncher,
    event_tx: &mpsc::UnboundedSender<AppEvent>,
) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('n') => {
            app.mode = Mode::ServiceList;
        }
        KeyCode::Char('y') | KeyCode::Enter => {
            let Mode::ConfirmDialog { action, .. } = &app.mode else {
                return;
            };
            match action.clone() {
                ConfirmAction::Quit => {
                    app.should_quit = true;
                }
                ConfirmAction::StopService(name) => {
                    app.set_status(format!("Stopping {name}..."));
                    let tx = event_tx.clone();
                    let launcher = launcher.clone();
                    tokio::spawn(async move {
                        match launcher.stop_service(&name).await {
                            Ok(stopped) if stopped.is_empty() => {
                                let _ = tx.send(AppEvent::Info(format!("{name} is not running")));
                            }
                            Ok(stopped) => {
                                let _ = tx.send(AppEvent::Info(format!(
                                    "Stopped {}",
                                    stopped.join(", ")
                                )));
                            }
                            Err(e) => {
                                let _ = tx.send(AppEvent::Error(format!("Stop failed: {e}")));
                            }
                        }
                    });
                }
            }
            app.mode = Mode::ServiceList;
        }
        _ => {}
    }
}

fn handle_help_dialog(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?') => {
            app.mode = Mode::ServiceList;
        }
        _ => {}
    }
}
