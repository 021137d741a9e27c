//! storkval - keeps a Stork oracle validator session alive and shows its status.
//!
//! Logs in, then submits one validation vote per interval while a terminal
//! display shows the latest account stats.

mod ui;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    cursor::Show,
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use storkval_core::api::StorkClient;
use storkval_core::auth::{AccountFile, CognitoProvider, CredentialStore, SessionStore, TokenManager};
use storkval_core::report::StatusReport;
use storkval_core::{Config, DisplayState, PollingScheduler, ValidationClient};

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

/// Default log filter when RUST_LOG is unset
const DEFAULT_LOG_FILTER: &str = "storkval=info,storkval_core=info,warn";

/// Log directory name, under the cache directory when there is one
const LOG_DIR: &str = "logs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Tui,
    Plain,
    Once,
    StorePassword,
}

impl Mode {
    fn from_args(args: &[String]) -> Result<Self> {
        match args.first().map(String::as_str) {
            None => Ok(Mode::Tui),
            Some("--plain") => Ok(Mode::Plain),
            Some("--once") => Ok(Mode::Once),
            Some("--store-password") => Ok(Mode::StorePassword),
            Some(other) => anyhow::bail!(
                "Unknown argument: {} (expected --plain, --once or --store-password)",
                other
            ),
        }
    }
}

/// Where TUI-mode logs go: the cache directory, or `./logs` without one.
fn log_dir(cache_dir: Option<PathBuf>) -> PathBuf {
    cache_dir
        .map(|dir| dir.join(LOG_DIR))
        .unwrap_or_else(|| PathBuf::from(LOG_DIR))
}

/// Initialize the tracing subscriber. In TUI mode the terminal belongs to the
/// display, so logs always go to a daily file.
fn init_tracing(mode: Mode, config: &Config) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    if mode == Mode::Tui {
        let appender =
            tracing_appender::rolling::daily(log_dir(config.cache_dir().ok()), "storkval.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(writer).with_ansi(false))
            .with(filter)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(io::stderr))
            .with(filter)
            .init();
        None
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mode = Mode::from_args(&args)?;

    let config = Config::load().context("Failed to load configuration")?;
    let _log_guard = init_tracing(mode, &config);
    info!(?mode, "storkval starting");

    if mode == Mode::StorePassword {
        return store_password(&config);
    }

    let scheduler = Arc::new(build_scheduler(&config).await?);

    eprintln!("Logging in...");
    scheduler
        .startup()
        .await
        .context("Initial login failed")?;

    let result = match mode {
        Mode::Once => run_once(&scheduler),
        Mode::Plain => run_plain(&scheduler).await,
        _ => run_tui(&scheduler).await,
    };

    info!("storkval shutting down");
    result
}

/// Wire the token manager, API client and scheduler from configuration.
async fn build_scheduler(config: &Config) -> Result<PollingScheduler> {
    let credentials = AccountFile::load(&config.account_file)?.credentials()?;

    let provider = CognitoProvider::new(&config.cognito_region, config.cognito_client_id.clone())?;
    let tokens = TokenManager::new(Arc::new(provider), credentials)
        .with_store(SessionStore::new(config.token_path()?));
    tokens.load_persisted().await;

    let api = StorkClient::new(&config.api_base_url, config.request_timeout())?;
    let (state_tx, _) = watch::channel(DisplayState::default());
    let client = ValidationClient::new(Arc::new(api), Arc::new(tokens), state_tx, config.timezone()?);

    Ok(PollingScheduler::new(
        Arc::new(client),
        config.validation_interval(),
        config.render_interval(),
    ))
}

/// Prompt for the account password and keep it in the OS keychain.
fn store_password(config: &Config) -> Result<()> {
    let account = AccountFile::load(&config.account_file)?;
    let password = rpassword::prompt_password(format!("Password for {}: ", account.email))
        .context("Failed to read password")?;
    if password.is_empty() {
        anyhow::bail!("Password must not be empty");
    }
    CredentialStore::store(&account.email, &password)?;
    eprintln!("Password stored in keychain for {}", account.email);
    Ok(())
}

/// Print the report from the startup cycle and exit.
fn run_once(scheduler: &PollingScheduler) -> Result<()> {
    let state = scheduler.subscribe().borrow().clone();
    println!("{}", StatusReport::to_text(&state));
    if state.status.is_error() {
        anyhow::bail!("Validation cycle failed: {}", state.status.label());
    }
    Ok(())
}

/// Print the report whenever it changes until Ctrl+C.
async fn run_plain(scheduler: &Arc<PollingScheduler>) -> Result<()> {
    let validation = scheduler.spawn_validation_activity();

    let mut last_printed = String::new();
    let render = scheduler.spawn_render_activity(move |state| {
        let text = StatusReport::to_text(state);
        if text != last_printed {
            let mut stdout = io::stdout().lock();
            let _ = writeln!(stdout, "{}\n", text);
            last_printed = text;
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    validation.abort();
    render.abort();
    Ok(())
}

/// Full-screen status display until the user quits.
async fn run_tui(scheduler: &Arc<PollingScheduler>) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    terminal.clear()?;

    let validation = scheduler.spawn_validation_activity();

    let mut tick = 0usize;
    let render = scheduler.spawn_render_activity(move |state| {
        tick = tick.wrapping_add(1);
        if let Err(e) = terminal.draw(|f| ui::render::render(f, state, tick)) {
            warn!(error = %e, "Failed to draw status display");
        }
    });

    let result = tokio::task::spawn_blocking(wait_for_quit_key)
        .await
        .context("Input task failed")?;

    validation.abort();
    render.abort();
    // Wait for the render task to drop the terminal before restoring it
    let _ = render.await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, Show)?;

    result.context("Failed to read terminal input")
}

/// Block until q, Esc or Ctrl+C is pressed.
fn wait_for_quit_key() -> io::Result<()> {
    loop {
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let ctrl_c = key.code == KeyCode::Char('c')
                    && key.modifiers.contains(KeyModifiers::CONTROL);
                if ctrl_c || matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_args() {
        assert_eq!(Mode::from_args(&[]).unwrap(), Mode::Tui);
        assert_eq!(Mode::from_args(&["--plain".to_string()]).unwrap(), Mode::Plain);
        assert_eq!(Mode::from_args(&["--once".to_string()]).unwrap(), Mode::Once);
        assert_eq!(
            Mode::from_args(&["--store-password".to_string()]).unwrap(),
            Mode::StorePassword
        );
        assert!(Mode::from_args(&["--bogus".to_string()]).is_err());
    }

    #[test]
    fn test_log_dir_without_cache_dir_is_relative() {
        assert_eq!(
            log_dir(Some(PathBuf::from("/home/u/.cache/storkval"))),
            PathBuf::from("/home/u/.cache/storkval/logs")
        );
        assert_eq!(log_dir(None), PathBuf::from("logs"));
    }
}
