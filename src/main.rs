mod api;
mod app;
mod cli;
mod config;
mod grafana;
mod input;
mod manifest;
mod merge;
mod model;
mod owned;
mod poller;
mod status;
mod ui;
mod variant;

use anyhow::{Context, Result};
use api::{Backend, KubeGateway, RestGateway, ServingApi};
use app::{App, AppCommand, FetchEvent, FetchRequest};
use clap::Parser;
use cli::{BackendKind, CliArgs};
use config::Settings;
use crossterm::event::{
    Event, EventStream, KeyEventKind, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
    supports_keyboard_enhancement,
};
use futures::StreamExt;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::future::Future;
use std::io::{self, Stdout};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::time::{Duration, sleep_until, timeout};
use tracing::debug;
use tracing_subscriber::EnvFilter;

type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;
const FETCH_TIMEOUT: Duration = Duration::from_secs(8);
const OWNED_TIMEOUT: Duration = Duration::from_secs(15);
const MUTATION_TIMEOUT: Duration = Duration::from_secs(15);
const IDLE_REDRAW: Duration = Duration::from_secs(1);
const DEFAULT_REST_NAMESPACE: &str = "default";

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let settings = Settings::load(&args)?;
    init_tracing(&settings.log_filter)?;
    if let Some(source) = &settings.source {
        debug!("loaded settings from {source}");
    }

    let (backend, namespace) = connect(&settings).await?;
    let mut app = App::new(
        backend.label(),
        namespace,
        settings.view_poller(),
        settings.logs_poller(),
        settings.grafana_prefix.clone(),
    );

    run(&mut app, &backend).await
}

fn init_tracing(level_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_writer(std::io::sink)
        .try_init();

    Ok(())
}

async fn connect(settings: &Settings) -> Result<(Backend, String)> {
    match settings.backend {
        BackendKind::Kube => {
            let gateway = KubeGateway::new(settings.context.clone()).await?;
            let namespace = settings
                .namespace
                .clone()
                .unwrap_or_else(|| gateway.default_namespace().to_string());
            Ok((Backend::Kube(gateway), namespace))
        }
        BackendKind::Rest => {
            let gateway = RestGateway::new(&settings.api_prefix)?;
            let namespace = settings
                .namespace
                .clone()
                .unwrap_or_else(|| DEFAULT_REST_NAMESPACE.to_string());
            Ok((Backend::Rest(gateway), namespace))
        }
    }
}

async fn run(app: &mut App, backend: &Backend) -> Result<()> {
    let (mut terminal, keyboard_enhanced) = init_terminal()?;
    let run_result = run_loop(&mut terminal, app, backend).await;
    let restore_result = restore_terminal(&mut terminal, keyboard_enhanced);

    match (run_result, restore_result) {
        (Err(run_error), Err(restore_error)) => Err(anyhow::anyhow!(
            "{run_error:#}\nterminal restore error: {restore_error:#}"
        )),
        (Err(error), _) => Err(error),
        (_, Err(error)) => Err(error),
        (Ok(()), Ok(())) => Ok(()),
    }
}

fn init_terminal() -> Result<(TuiTerminal, bool)> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    let keyboard_enhanced = matches!(supports_keyboard_enhancement(), Ok(true));
    if keyboard_enhanced {
        execute!(
            stdout,
            EnterAlternateScreen,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
            )
        )
        .context("failed to enter alternate screen with keyboard enhancement")?;
    } else {
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().context("failed to clear terminal")?;
    Ok((terminal, keyboard_enhanced))
}

fn restore_terminal(terminal: &mut TuiTerminal, keyboard_enhanced: bool) -> Result<()> {
    if keyboard_enhanced {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)
            .context("failed to pop keyboard enhancement flags")?;
    }
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

async fn run_loop(terminal: &mut TuiTerminal, app: &mut App, backend: &Backend) -> Result<()> {
    let mut reader = EventStream::new();
    let (fetch_tx, mut fetch_rx) = mpsc::unbounded_channel::<FetchEvent>();

    loop {
        for request in app.due_requests(Instant::now()) {
            spawn_request(backend, request, &fetch_tx);
        }

        terminal
            .draw(|frame| ui::render(frame, app))
            .context("failed to render terminal frame")?;

        if !app.running() {
            break;
        }

        let idle = Instant::now() + IDLE_REDRAW;
        let wake = app.next_due().map_or(idle, |due| due.min(idle));

        tokio::select! {
            maybe_event = reader.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        if let Some(action) = input::map_key(app.mode(), key) {
                            debug!("action={action:?}");
                            let command = app.apply_action(action);
                            execute_app_command(backend, command, &fetch_tx);
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        app.set_status(format!("terminal event error: {error}"));
                    }
                    None => {
                        app.set_status("terminal event stream closed");
                        break;
                    }
                }
            }
            maybe_fetch = fetch_rx.recv() => {
                if let Some(event) = maybe_fetch {
                    app.apply_fetch(event, Instant::now());
                }
            }
            _ = sleep_until(tokio::time::Instant::from_std(wake)) => {}
        }
    }

    Ok(())
}

fn execute_app_command(
    backend: &Backend,
    command: AppCommand,
    fetch_tx: &mpsc::UnboundedSender<FetchEvent>,
) {
    match command {
        AppCommand::None => {}
        AppCommand::Create { namespace, isvc } => {
            let backend = backend.clone();
            let fetch_tx = fetch_tx.clone();
            tokio::spawn(async move {
                debug!("creating inferenceservice {namespace}/{}", isvc.name());
                let result = bounded(
                    MUTATION_TIMEOUT,
                    "create",
                    backend.create(&namespace, &isvc),
                )
                .await;
                let _ = fetch_tx.send(FetchEvent::Created { namespace, result });
            });
        }
        AppCommand::Delete { namespace, name } => {
            let backend = backend.clone();
            let fetch_tx = fetch_tx.clone();
            tokio::spawn(async move {
                debug!("deleting inferenceservice {namespace}/{name}");
                let result =
                    bounded(MUTATION_TIMEOUT, "delete", backend.delete(&namespace, &name)).await;
                let _ = fetch_tx.send(FetchEvent::Deleted {
                    namespace,
                    name,
                    result,
                });
            });
        }
    }
}

/// Runs one fetch in the background. Every ticketed request produces exactly
/// one event, timeouts included, so its poller always gets the ticket back.
fn spawn_request(
    backend: &Backend,
    request: FetchRequest,
    fetch_tx: &mpsc::UnboundedSender<FetchEvent>,
) {
    let backend = backend.clone();
    let fetch_tx = fetch_tx.clone();
    tokio::spawn(async move {
        let event = match request {
            FetchRequest::List { ticket, namespace } => FetchEvent::List {
                ticket,
                result: bounded(FETCH_TIMEOUT, "list", backend.list(&namespace)).await,
            },
            FetchRequest::Detail {
                ticket,
                namespace,
                name,
            } => FetchEvent::Detail {
                ticket,
                result: bounded(FETCH_TIMEOUT, "refresh", backend.get(&namespace, &name)).await,
            },
            FetchRequest::Logs {
                ticket,
                namespace,
                name,
                component,
            } => FetchEvent::Logs {
                ticket,
                component,
                result: bounded(
                    FETCH_TIMEOUT,
                    "logs",
                    backend.logs(&namespace, &name, component),
                )
                .await,
            },
            FetchRequest::Owned { ticket, isvc } => FetchEvent::Owned {
                ticket,
                resources: owned::resolve_owned(&backend, &isvc, OWNED_TIMEOUT).await,
            },
            FetchRequest::Grafana { prefix } => FetchEvent::Grafana(grafana::probe(&prefix).await),
        };

        if fetch_tx.send(event).is_err() {
            debug!("event loop closed before a fetch finished");
        }
    });
}

async fn bounded<T>(
    limit: Duration,
    what: &str,
    future: impl Future<Output = Result<T>>,
) -> std::result::Result<T, String> {
    match timeout(limit, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(compact_error(&error)),
        Err(_) => Err(format!("{what} timed out after {}s", limit.as_secs())),
    }
}

fn compact_error(error: &anyhow::Error) -> String {
    let mut out = Vec::new();
    for (index, cause) in error.chain().enumerate() {
        if index == 0 {
            out.push(cause.to_string());
        } else if index <= 2 {
            out.push(format!("caused by: {cause}"));
        } else {
            break;
        }
    }

    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::{bounded, compact_error};
    use anyhow::anyhow;
    use std::time::Duration;

    #[test]
    fn compact_error_keeps_two_causes() {
        let error = anyhow!("root cause")
            .context("middle")
            .context("outer")
            .context("top");
        assert_eq!(
            compact_error(&error),
            "top\ncaused by: outer\ncaused by: middle"
        );
    }

    #[tokio::test]
    async fn bounded_reports_timeouts_as_errors() {
        let result: Result<(), String> = bounded(
            Duration::from_millis(10),
            "list",
            futures::future::pending::<anyhow::Result<()>>(),
        )
        .await;
        assert_eq!(result, Err("list timed out after 0s".to_string()));
    }
}
