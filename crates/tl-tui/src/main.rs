use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use tl_core::error::LauncherError;
use tl_core::models::{LaunchEvent, LauncherConfig, LogLine, RunState};
use tl_core::services::config_loader;
use tl_core::services::launcher::TopologyLauncher;
use tl_core::services::runtime::DockerRuntime;
use tl_core::services::topology::Topology;

use tl_tui::app::App;
use tl_tui::event::{
    spawn_input_task, spawn_launch_forwarder, spawn_log_forwarder, spawn_tick_task, AppEvent,
};
use tl_tui::{keys, report, ui};

const USAGE: &str = "\
Usage: tl-tui [--file PATH] [--plan] [--headless] [--json] [--debug]

  --file PATH   topology file (default: topology.yaml in this or a parent directory)
  --plan        print the launch order and exit
  --headless    launch without the UI and print the final report
  --json        with --headless, print the report as JSON
  --debug       write debug logs";

struct CliArgs {
    file: Option<PathBuf>,
    plan: bool,
    headless: bool,
    json: bool,
    debug: bool,
    help: bool,
}

fn parse_args(args: &[String]) -> CliArgs {
    CliArgs {
        file: args
            .iter()
            .position(|a| a == "--file" || a == "-f")
            .and_then(|i| args.get(i + 1))
            .map(PathBuf::from),
        plan: args.iter().any(|a| a == "--plan"),
        headless: args.iter().any(|a| a == "--headless"),
        json: args.iter().any(|a| a == "--json"),
        debug: args.iter().any(|a| a == "--debug"),
        help: args.iter().any(|a| a == "--help" || a == "-h"),
    }
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args: Vec<String> = std::env::args().collect();
    let cli = parse_args(&args);
    if cli.help {
        println!("{USAGE}");
        return Ok(());
    }

    let path = match cli.file {
        Some(path) => path,
        None => config_loader::find_topology_file(&std::env::current_dir()?)?,
    };
    let topology = config_loader::load_topology(&path)?;

    if cli.plan {
        print!("{}", report::render_plan(&topology));
        return Ok(());
    }

    if cli.headless {
        setup_stderr_logging(cli.debug);
        let code = run_headless(topology, cli.json).await?;
        if code != 0 {
            std::process::exit(code);
        }
        return Ok(());
    }

    // The terminal belongs to ratatui, so logs only go to a file.
    let _guard = if cli.debug {
        Some(setup_debug_logging())
    } else {
        None
    };
    tracing::info!(path = %path.display(), services = topology.len(), "topology loaded");
    run_interactive(topology).await
}

/// Configure file-based tracing to `.topology-launcher-debug.log` in CWD.
/// Returns the guard that must be held alive for the duration of the program.
fn setup_debug_logging() -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::never(".", ".topology-launcher-debug.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_ansi(false)
        .init();

    guard
}

fn setup_stderr_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}

/// Launch without a UI. Ctrl+C cancels and stops whatever already started.
/// Returns the process exit code.
async fn run_headless(topology: Topology, json: bool) -> color_eyre::Result<i32> {
    let runtime = Arc::new(DockerRuntime::new(topology.network()));
    let launcher = TopologyLauncher::new(runtime, LauncherConfig::default());

    let cancel = launcher.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, cancelling launch");
            cancel.cancel();
        }
    });

    let (launch_report, code) = match launcher.launch_topology(&topology).await {
        Ok(launch_report) => (launch_report, 0),
        Err(LauncherError::NoServiceReady(launch_report)) => (launch_report, 1),
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&launch_report)?);
    } else {
        print!("{}", report::render_report(&launch_report));
    }
    Ok(code)
}

/// Run the interactive dashboard with crossterm backend.
async fn run_interactive(topology: Topology) -> color_eyre::Result<()> {
    let runtime = Arc::new(DockerRuntime::new(topology.network()));
    let (launch_tx, launch_rx) = mpsc::unbounded_channel::<LaunchEvent>();
    let (log_tx, log_rx) = mpsc::unbounded_channel::<LogLine>();
    let launcher =
        TopologyLauncher::new(runtime.clone(), LauncherConfig::default()).with_events(launch_tx);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<AppEvent>();
    let _input_task = spawn_input_task(event_tx.clone());
    let _tick_task = spawn_tick_task(event_tx.clone());
    let _launch_forwarder = spawn_launch_forwarder(launch_rx, event_tx.clone());
    let _log_forwarder = spawn_log_forwarder(log_rx, event_tx.clone());

    let launch_task = {
        let launcher = launcher.clone();
        let topology = topology.clone();
        let tx = event_tx.clone();
        tokio::spawn(async move {
            match launcher.launch_topology(&topology).await {
                Ok(launch_report) => {
                    let _ = tx.send(AppEvent::LaunchFinished(launch_report));
                }
                Err(LauncherError::NoServiceReady(launch_report)) => {
                    let _ = tx.send(AppEvent::LaunchFinished(launch_report));
                    let _ = tx.send(AppEvent::Error("no service reached Ready".into()));
                }
                Err(e) => {
                    let _ = tx.send(AppEvent::Error(format!("Launch failed: {e}")));
                }
            }
        })
    };

    // Initialize terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::from_topology(&topology);
    let mut followers: HashMap<String, JoinHandle<()>> = HashMap::new();

    // Main event loop
    loop {
        terminal.draw(|f| ui::render(f, &app, None))?;

        if let Ok(event) = event_rx.try_recv() {
            let ctx = EventContext {
                launcher: &launcher,
                runtime: &runtime,
                log_tx: &log_tx,
                event_tx: &event_tx,
            };
            process_event(&mut app, event, &ctx, &mut followers).await;
        } else {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    println!("Stopping services...");
    launcher.cancel_token().cancel();
    let _ = launch_task.await;
    for (_, follower) in followers.drain() {
        follower.abort();
    }
    launcher.shutdown().await?;

    Ok(())
}

struct EventContext<'a> {
    launcher: &'a TopologyLauncher,
    runtime: &'a Arc<DockerRuntime>,
    log_tx: &'a mpsc::UnboundedSender<LogLine>,
    event_tx: &'a mpsc::UnboundedSender<AppEvent>,
}

/// Process a single AppEvent, updating app state accordingly.
async fn process_event(
    app: &mut App,
    event: AppEvent,
    ctx: &EventContext<'_>,
    followers: &mut HashMap<String, JoinHandle<()>>,
) {
    match event {
        AppEvent::Key(key) => {
            if key.kind == crossterm::event::KeyEventKind::Press {
                keys::handle_key(app, key, ctx.launcher, ctx.event_tx);
            }
        }
        AppEvent::Tick => {
            let snapshot = ctx.launcher.snapshot().await;
            app.apply_statuses(snapshot.services.iter());
        }
        AppEvent::Launch(launch_event) => {
            app.apply_launch_event(&launch_event);
            match &launch_event {
                LaunchEvent::ContainerStarted { handle } => {
                    let follower = ctx.runtime.follow_logs(handle, ctx.log_tx.clone());
                    if let Some(previous) = followers.insert(handle.service.clone(), follower) {
                        previous.abort();
                    }
                }
                LaunchEvent::ContainerStopped { service } => {
                    if let Some(follower) = followers.remove(service) {
                        follower.abort();
                    }
                }
                LaunchEvent::StateChanged { .. } => {}
            }
        }
        AppEvent::Log(line) => {
            app.push_log(line);
        }
        AppEvent::LaunchFinished(launch_report) => {
            tracing::debug!(services = launch_report.services.len(), "launch_finished");
            app.apply_statuses(launch_report.services.iter());
            app.launch_finished = true;
            app.set_status(format!(
                "Launch finished: {} of {} ready",
                launch_report.count(RunState::Ready),
                launch_report.services.len()
            ));
        }
        AppEvent::Error(msg) => {
            tracing::debug!(error = %msg, "event_error");
            app.set_status(format!("Error: {msg}"));
        }
        AppEvent::Info(msg) => {
            tracing::debug!(info = %msg, "event_info");
            app.set_status(msg);
        }
    }
}
