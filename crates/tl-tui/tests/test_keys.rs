mod common;

use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tokio::sync::mpsc;

use tl_core::models::{LauncherConfig, RunState};
use tl_core::services::launcher::TopologyLauncher;
use tl_core::services::runtime::DockerRuntime;
use tl_tui::app::{App, ConfirmAction, Mode};
use tl_tui::event::AppEvent;
use tl_tui::keys::handle_key;

use common::{make_row, sample_topology};

fn launcher() -> TopologyLauncher {
    TopologyLauncher::new(
        Arc::new(DockerRuntime::new("test-net")),
        LauncherConfig::default(),
    )
}

fn press(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

#[tokio::test]
async fn navigation_wraps() {
    let launcher = launcher();
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut app = App::from_topology(&sample_topology());

    handle_key(&mut app, press(KeyCode::Down), &launcher, &tx);
    assert_eq!(app.selected_index, 1);
    handle_key(&mut app, press(KeyCode::Char('k')), &launcher, &tx);
    handle_key(&mut app, press(KeyCode::Up), &launcher, &tx);
    assert_eq!(app.selected_index, 2);
}

#[tokio::test]
async fn stop_asks_for_confirmation_naming_children() {
    let launcher = launcher();
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut app = App::from_topology(&sample_topology());

    handle_key(&mut app, press(KeyCode::Char('s')), &launcher, &tx);
    match &app.mode {
        Mode::ConfirmDialog { message, action } => {
            assert!(message.contains("schema-registry"));
            assert_eq!(action, &ConfirmAction::StopService("kafka".into()));
        }
        other => panic!("expected confirm dialog, got {other:?}"),
    }

    handle_key(&mut app, press(KeyCode::Esc), &launcher, &tx);
    assert_eq!(app.mode, Mode::ServiceList);
}

#[tokio::test]
async fn confirmed_stop_reports_back() {
    let launcher = launcher();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut app = App::new();
    app.services.push(make_row("kafka", RunState::Ready));

    handle_key(&mut app, press(KeyCode::Char('s')), &launcher, &tx);
    handle_key(&mut app, press(KeyCode::Char('y')), &launcher, &tx);
    assert_eq!(app.mode, Mode::ServiceList);
    assert_eq!(app.status_message.as_deref(), Some("Stopping kafka..."));

    // Nothing was launched, so the launcher does not know the service.
    match rx.recv().await {
        Some(AppEvent::Error(msg)) => assert!(msg.contains("Stop failed"), "{msg}"),
        other => panic!("expected error event, got {other:?}"),
    }
}

#[tokio::test]
async fn quit_requires_confirmation() {
    let launcher = launcher();
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut app = App::new();
    app.services.push(make_row("kafka", RunState::Ready));

    handle_key(&mut app, press(KeyCode::Char('q')), &launcher, &tx);
    assert!(!app.should_quit);
    assert!(matches!(
        app.mode,
        Mode::ConfirmDialog {
            action: ConfirmAction::Quit,
            ..
        }
    ));
    handle_key(&mut app, press(KeyCode::Enter), &launcher, &tx);
    assert!(app.should_quit);
}

#[tokio::test]
async fn ctrl_c_quits_immediately() {
    let launcher = launcher();
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut app = App::new();
    app.services.push(make_row("kafka", RunState::Ready));

    let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
    handle_key(&mut app, key, &launcher, &tx);
    assert!(app.should_quit);
}

#[tokio::test]
async fn help_toggles() {
    let launcher = launcher();
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut app = App::new();

    handle_key(&mut app, press(KeyCode::Char('?')), &launcher, &tx);
    assert_eq!(app.mode, Mode::HelpDialog);
    handle_key(&mut app, press(KeyCode::Char('?')), &launcher, &tx);
    assert_eq!(app.mode, Mode::ServiceList);
}
