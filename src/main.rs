use std::io;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing_subscriber::EnvFilter;

use gdl_tui::app::App;
use gdl_tui::command::DEFAULT_RETRIES;
use gdl_tui::cookies;
use gdl_tui::tui::{Renderer, handle_key};

/// Default maximum buffer lines per pane
const DEFAULT_MAX_BUFFER_LINES: usize = 10000;

/// Poll interval for supervisor events and key input (milliseconds)
const POLL_INTERVAL_MS: u64 = 10;

/// Rows taken by header, URL box, stats, tabs, log borders and status bar
const CHROME_ROWS: u16 = 9;

#[derive(Parser, Debug)]
#[command(
    name = "gdl-tui",
    author,
    version,
    about = "Supervise gallery-dl downloads in a terminal UI",
    long_about = None
)]
struct Args {
    /// Target URL; the download starts immediately when given
    url: Option<String>,

    /// Netscape cookie file passed to gallery-dl
    #[arg(short, long)]
    cookies: Option<PathBuf>,

    /// Retry count passed to gallery-dl
    #[arg(long, default_value_t = DEFAULT_RETRIES)]
    retries: u32,

    /// Seconds without output before the run is stopped as stalled
    #[arg(long, default_value_t = 120)]
    stall_timeout: u64,

    /// Maximum buffer lines per pane
    #[arg(short = 'b', long, default_value_t = DEFAULT_MAX_BUFFER_LINES)]
    max_buffer_lines: usize,
}

/// Log to a file; stderr would fight the alternate screen
fn init_logging() -> tracing_appender::non_blocking::WorkerGuard {
    let appender = tracing_appender::rolling::never(".", "gdl-tui.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gdl_tui=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    guard
}

/// Initialize the terminal for TUI
fn init_terminal() -> io::Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

/// Restore the terminal to its original state
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()
}

/// Run the application
async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut app: App,
    autostart: bool,
) -> io::Result<()> {
    if autostart {
        app.start_download();
    }

    loop {
        // Update visible lines based on terminal size
        let size = terminal.size()?;
        let visible_lines = size.height.saturating_sub(CHROME_ROWS) as usize;
        app.set_visible_lines(visible_lines);

        // Render
        terminal.draw(|frame| {
            Renderer::render(frame, &app);
        })?;

        // Drain supervisor events
        app.poll_run().await;

        // Handle key events
        if event::poll(Duration::from_millis(POLL_INTERVAL_MS))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            handle_key(&mut app, key);
        }

        if app.should_quit() {
            break;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging();

    cookies::ensure_dirs()?;

    let autostart = args.url.is_some();
    let app = App::new(
        args.url,
        args.cookies,
        args.retries,
        Duration::from_secs(args.stall_timeout),
        args.max_buffer_lines,
    );

    let mut terminal = init_terminal()?;
    let result = run_app(&mut terminal, app, autostart).await;
    restore_terminal(&mut terminal)?;

    result
}
