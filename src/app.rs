use std::path::{Path, PathBuf};
use std::time::Duration;

use tui_input::Input;

use crate::buffer::LogLine;
use crate::classify::Severity;
use crate::command::DownloadCommand;
use crate::cookies;
use crate::supervisor::{RunHandle, Supervisor, SupervisorEvent};
use crate::tui::LogView;

/// Application mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Normal mode
    Normal,
    /// Editing the target URL
    EditUrl,
}

/// Which pane is visible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Log,
    Failed,
}

/// Events drained from the run handle per frame
const MAX_EVENTS_PER_POLL: usize = 500;

/// Application state
pub struct App {
    mode: Mode,
    pane: Pane,
    url: String,
    url_input: Input,
    cookie_file: Option<PathBuf>,
    retries: u32,
    log: LogView,
    failed: LogView,
    failed_unread: bool,
    stats_line: String,
    status: String,
    supervisor: Supervisor,
    run: Option<RunHandle>,
    should_quit: bool,
}

impl App {
    pub fn new(
        url: Option<String>,
        cookie_file: Option<PathBuf>,
        retries: u32,
        stall_timeout: Duration,
        max_buffer_lines: usize,
    ) -> Self {
        Self {
            mode: Mode::Normal,
            pane: Pane::Log,
            url: url.unwrap_or_default(),
            url_input: Input::default(),
            cookie_file,
            retries,
            log: LogView::new(max_buffer_lines),
            failed: LogView::new(max_buffer_lines),
            failed_unread: false,
            stats_line: String::new(),
            status: "Ready".to_string(),
            supervisor: Supervisor::new(stall_timeout),
            run: None,
            should_quit: false,
        }
    }

    /// Start a new run. Ignored while a run is in flight; a new run may only
    /// begin once the previous one has finished.
    pub fn start_download(&mut self) {
        if self.run.is_some() {
            self.status = "A download is already running.".to_string();
            return;
        }
        let url = self.url.trim().to_string();
        if url.is_empty() {
            self.status = "Enter a URL first.".to_string();
            return;
        }

        self.log.reset();
        self.failed.reset();
        self.failed_unread = false;
        self.stats_line.clear();

        let command = DownloadCommand::gallery_dl(
            &url,
            self.cookie_file.as_deref(),
            self.retries,
            Path::new("gallery-dl.conf"),
        );
        self.push_log(Severity::Dim, "─".repeat(56));
        self.push_log(Severity::Dim, command.display_line());
        self.push_log(Severity::Dim, "─".repeat(56));

        match self.supervisor.start(&command) {
            Ok(handle) => {
                self.run = Some(handle);
                self.status = "Downloading…".to_string();
            }
            Err(err) => {
                self.push_log(Severity::Error, format!("Error: {err}"));
                self.status = "Error".to_string();
            }
        }
    }

    /// Request forced termination of the current run
    pub fn stop_download(&mut self) {
        if let Some(run) = &self.run {
            run.stop();
        }
    }

    /// Drain pending supervisor events into the views
    pub async fn poll_run(&mut self) {
        let Some(run) = self.run.as_mut() else {
            return;
        };
        let mut batch = Vec::new();
        while batch.len() < MAX_EVENTS_PER_POLL {
            match tokio::time::timeout(Duration::from_millis(1), run.next_event()).await {
                Ok(Some(event)) => batch.push(event),
                // Channel closed or no event ready
                Ok(None) | Err(_) => break,
            }
        }
        for event in batch {
            self.handle_event(event);
        }
    }

    fn handle_event(&mut self, event: SupervisorEvent) {
        match event {
            SupervisorEvent::Line { event, stats } => {
                self.stats_line = stats.render(event.speed.as_deref());
                if let Some(record) = &event.failure_record {
                    self.failed.push(LogLine::new(Severity::Error, record.clone()));
                    if self.pane != Pane::Failed {
                        self.failed_unread = true;
                    }
                }
                self.log.push(LogLine::new(event.severity, event.rendered_line));
            }
            SupervisorEvent::Notice { severity, text } => {
                self.push_log(severity, text);
            }
            SupervisorEvent::Finished { stats, outcome } => {
                self.push_log(outcome.severity(), outcome.summary_line());
                self.stats_line = stats.render(None);
                self.status = outcome.status_label();
                self.run = None;
            }
        }
    }

    /// Convert JSON cookie exports and report each file into the log
    pub fn convert_cookies(&mut self) {
        let results = match cookies::convert_dir(
            Path::new(cookies::JSON_INPUT_DIR),
            Path::new(cookies::COOKIE_DIR),
        ) {
            Ok(results) => results,
            Err(err) => {
                self.push_log(Severity::Error, format!("Cookie conversion failed: {err}"));
                return;
            }
        };
        if results.is_empty() {
            self.push_log(
                Severity::Warning,
                format!("No JSON files found in {}/", cookies::JSON_INPUT_DIR),
            );
            return;
        }
        for conversion in results {
            match conversion.result {
                Ok(out) => self.push_log(
                    Severity::Success,
                    format!("Converted → {}", out.display()),
                ),
                Err(err) => self.push_log(
                    Severity::Error,
                    format!("Error converting {}: {err}", conversion.source.display()),
                ),
            }
        }
    }

    fn push_log(&mut self, severity: Severity, text: String) {
        self.log.push(LogLine::new(severity, text));
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Quit, killing a live run first
    pub fn quit(&mut self) {
        self.stop_download();
        self.should_quit = true;
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn pane(&self) -> Pane {
        self.pane
    }

    /// Switch between the Log and Failed Items panes
    pub fn toggle_pane(&mut self) {
        self.pane = match self.pane {
            Pane::Log => {
                self.failed_unread = false;
                Pane::Failed
            }
            Pane::Failed => Pane::Log,
        };
    }

    pub fn failed_unread(&self) -> bool {
        self.failed_unread
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn url_input(&self) -> &Input {
        &self.url_input
    }

    pub fn url_input_mut(&mut self) -> &mut Input {
        &mut self.url_input
    }

    /// Enter URL editing mode, seeding the input with the current URL
    pub fn begin_edit_url(&mut self) {
        self.url_input = Input::new(self.url.clone());
        self.mode = Mode::EditUrl;
    }

    /// Commit the edited URL and return to normal mode
    pub fn commit_url(&mut self) {
        self.url = self.url_input.value().trim().to_string();
        self.mode = Mode::Normal;
    }

    /// Discard the edit and return to normal mode
    pub fn cancel_edit_url(&mut self) {
        self.mode = Mode::Normal;
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn stats_line(&self) -> &str {
        &self.stats_line
    }

    pub fn log_view(&self) -> &LogView {
        &self.log
    }

    pub fn failed_view(&self) -> &LogView {
        &self.failed
    }

    /// The pane currently on screen
    pub fn current_view(&self) -> &LogView {
        match self.pane {
            Pane::Log => &self.log,
            Pane::Failed => &self.failed,
        }
    }

    pub fn current_view_mut(&mut self) -> &mut LogView {
        match self.pane {
            Pane::Log => &mut self.log,
            Pane::Failed => &mut self.failed,
        }
    }

    pub fn set_visible_lines(&mut self, lines: usize) {
        self.log.set_visible_lines(lines);
        self.failed.set_visible_lines(lines);
    }
}
