//! brewcache - a V60 pour-over calculator for the terminal.
//!
//! Computes brew recipes for a chosen coffee-to-water ratio, walks through
//! the four pour steps, and keeps the web app's assets in a versioned
//! offline cache.

mod app;
mod ui;
mod utils;

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::{App, AppState};
use brewcache_core::{recipe_table, Config};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

/// Log file written under the cache directory while the TUI owns the terminal
const LOG_FILE_NAME: &str = "brewcache.log";

/// Initialize logging to a file so output does not corrupt the TUI.
///
/// The returned guard flushes buffered lines on drop and must be held for the
/// lifetime of the program.
fn init_tracing(log_dir: &Path) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!("Warning: could not create log directory: {}", e);
        return None;
    }

    let appender = tracing_appender::rolling::never(log_dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();

    Some(guard)
}

/// Logging for one-shot CLI commands goes to stderr.
fn init_cli_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: {:#}, using defaults", e);
            Config::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    // Check for CLI commands
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 && args[1] == "--dump-table" {
        init_cli_tracing();
        return dump_table(args.get(2).map(String::as_str));
    }
    if args.len() > 1 && args[1] == "--cache-status" {
        init_cli_tracing();
        return cache_status().await;
    }

    let log_dir = load_config()
        .cache_dir()
        .unwrap_or_else(|_| PathBuf::from("./cache"));
    let _guard = init_tracing(&log_dir);
    info!("brewcache starting");

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create app
    let result = match App::new().await {
        Ok(mut app) => {
            app.start_background();
            let result = run_app(&mut terminal, &mut app).await;
            app.save_preferences();
            result
        }
        Err(e) => Err(e),
    };

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
    }

    info!("brewcache shutting down");
    Ok(())
}

/// Print the recipe table for a ratio (or the configured one) as JSON
fn dump_table(ratio: Option<&str>) -> Result<()> {
    let config = load_config();
    let ratio = match ratio {
        Some(raw) => raw
            .parse::<f64>()
            .map_err(|_| anyhow::anyhow!("Invalid ratio: {}", raw))?,
        None => config.last_ratio.unwrap_or(config.recipe.default_ratio),
    };

    let table = recipe_table(ratio, &config.recipe);
    println!("{}", serde_json::to_string_pretty(&table)?);
    Ok(())
}

/// Install the configured generation and print the registration status as JSON
async fn cache_status() -> Result<()> {
    let config = load_config();
    let cache_dir = config
        .cache_dir()
        .unwrap_or_else(|_| PathBuf::from("./cache"));
    let registration = app::build_registration(&config, &cache_dir)?;

    match registration.register(&config.cache).await {
        Ok(outcome) => eprintln!("Register: {:?}", outcome),
        Err(e) => eprintln!("Install failed: {}", e),
    }

    let status = registration.snapshot().await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                if handle_input(app, key).await? {
                    return Ok(());
                }
            }
        }

        // Check for completed background tasks
        app.check_background_tasks().await;

        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}
