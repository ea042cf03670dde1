use std::time::Duration;

use crossterm::event::{self, Event, KeyEvent};
use tokio::sync::mpsc;

use tl_core::models::{LaunchEvent, LaunchReport, LogLine};

/// Events flowing into the main loop.
#[derive(Debug)]
pub enum AppEvent {
    /// A key press from the user.
    Key(KeyEvent),
    /// Periodic tick for refreshing service state.
    Tick,
    /// Progress from the launcher.
    Launch(LaunchEvent),
    /// A line of container output.
    Log(LogLine),
    /// The launch settled every service.
    LaunchFinished(LaunchReport),
    /// An async operation produced an error to display.
    Error(String),
    /// An async operation completed successfully with a message.
    Info(String),
}

/// Spawn the crossterm input polling task.
pub fn spawn_input_task(tx: mpsc::UnboundedSender<AppEvent>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            // Poll crossterm events with 50ms timeout (non-blocking feel)
            let has_event = tokio::task::spawn_blocking(|| {
                event::poll(Duration::from_millis(50)).unwrap_or(false)
            })
            .await
            .unwrap_or(false);

            if has_event {
                if let Ok(Event::Key(key)) = tokio::task::spawn_blocking(event::read)
                    .await
                    .unwrap_or(Err(std::io::Error::other("spawn_blocking failed")))
                {
                    if tx.send(AppEvent::Key(key)).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

/// Spawn the periodic tick task.
pub fn spawn_tick_task(tx: mpsc::UnboundedSender<AppEvent>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            if tx.send(AppEvent::Tick).is_err() {
                break;
            }
        }
    })
}

/// Forward launcher progress into the main loop.
pub fn spawn_launch_forwarder(
    mut rx: mpsc::UnboundedReceiver<LaunchEvent>,
    tx: mpsc::UnboundedSender<AppEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if tx.send(AppEvent::Launch(event)).is_err() {
                break;
            }
        }
    })
}

/// Forward container output into the main loop.
pub fn spawn_log_forwarder(
    mut rx: mpsc::UnboundedReceiver<LogLine>,
    tx: mpsc::UnboundedSender<AppEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if tx.send(AppEvent::Log(line)).is_err() {
                break;
            }
        }
    })
}
