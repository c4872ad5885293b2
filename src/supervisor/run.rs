use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::classify::{ClassifiedEvent, Severity, classify};
use crate::command::DownloadCommand;
use crate::error::Error;
use crate::stats::{RunStats, StatsAggregator};

use super::clock::ActivityClock;
use super::partial::PartialFileGuard;

/// How often the watchdog samples the activity clock
const WATCHDOG_POLL: Duration = Duration::from_secs(1);

/// Default idle duration after which a run is considered stalled
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Why a run was stopped before the child exited on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    User,
    Timeout,
}

/// Lifecycle of one supervised run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    StoppingUser,
    StoppingTimeout,
    Finished,
}

impl RunState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::StoppingUser,
            3 => Self::StoppingTimeout,
            _ => Self::Finished,
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Child exited on its own
    Exited { code: i32 },
    /// Forced termination
    Stopped { reason: StopReason },
}

impl RunOutcome {
    /// Severity for the final summary line
    pub fn severity(&self) -> Severity {
        match self {
            Self::Exited { code: 0 } => Severity::Success,
            _ => Severity::Warning,
        }
    }

    /// Status-bar label
    pub fn status_label(&self) -> String {
        match self {
            Self::Exited { code: 0 } => "Done".to_string(),
            Self::Exited { code } => format!("Done with errors (code {code})"),
            Self::Stopped {
                reason: StopReason::User,
            } => "Stopped".to_string(),
            Self::Stopped {
                reason: StopReason::Timeout,
            } => "Stopped (timeout)".to_string(),
        }
    }

    /// Message appended to the log
    pub fn summary_line(&self) -> String {
        match self {
            Self::Exited { code } => format!("Finished - exit code {code}"),
            Self::Stopped {
                reason: StopReason::User,
            } => "Stopped by user".to_string(),
            Self::Stopped {
                reason: StopReason::Timeout,
            } => "Stopped after stall timeout".to_string(),
        }
    }
}

/// Event delivered to the presentation boundary
#[derive(Debug)]
pub enum SupervisorEvent {
    /// One classified output line plus the stats snapshot after applying it
    Line {
        event: ClassifiedEvent,
        stats: RunStats,
    },
    /// Supervisor-originated message (stopping, cleanup notes)
    Notice { severity: Severity, text: String },
    /// Output drained and child gone; always the last event of a run
    Finished {
        stats: RunStats,
        outcome: RunOutcome,
    },
}

/// State shared between the draining loop, the watchdog and the run handle
#[derive(Debug)]
struct Shared {
    state: AtomicU8,
    clock: ActivityClock,
    partial: PartialFileGuard,
    pid: Option<u32>,
    stall_timeout: Duration,
    notice_tx: mpsc::Sender<SupervisorEvent>,
}

impl Shared {
    fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: RunState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Running -> StoppingUser/StoppingTimeout. Compare-and-swap makes a
    /// second stop request (user racing the watchdog) a no-op.
    fn try_begin_stopping(&self, reason: StopReason) -> bool {
        let target = match reason {
            StopReason::User => RunState::StoppingUser,
            StopReason::Timeout => RunState::StoppingTimeout,
        };
        self.state
            .compare_exchange(
                RunState::Running as u8,
                target as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Force-terminate the child and clean up the partial file.
    ///
    /// Safe to call from any task; never blocks. Notices are sent with
    /// `try_send` so a slow presentation layer cannot stall the caller.
    fn request_stop(&self, reason: StopReason) {
        if !self.try_begin_stopping(reason) {
            debug!(?reason, "stop requested but run is not running");
            return;
        }

        let text = match reason {
            StopReason::User => "Stopping… (user request)".to_string(),
            StopReason::Timeout => format!(
                "⏱ No output for {}s, stopping automatically.",
                self.stall_timeout.as_secs()
            ),
        };
        info!(?reason, "terminating gallery-dl");
        self.notice(Severity::Warning, text);

        // The child leads its own process group; kill the whole group so
        // grandchildren cannot keep the output pipes open.
        if let Some(pid) = self.pid
            && let Err(err) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL)
        {
            warn!(pid, %err, "failed to kill child process group");
        }

        if let Some(path) = self.partial.remove() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            self.notice(Severity::Dim, format!("Removed incomplete file: {name}"));
        }
    }

    fn notice(&self, severity: Severity, text: String) {
        let _ = self
            .notice_tx
            .try_send(SupervisorEvent::Notice { severity, text });
    }
}

/// Handle for one supervised run, polled by the presentation layer
#[derive(Debug)]
pub struct RunHandle {
    receiver: mpsc::Receiver<SupervisorEvent>,
    shared: Arc<Shared>,
}

impl RunHandle {
    /// Receive the next event asynchronously
    pub async fn next_event(&mut self) -> Option<SupervisorEvent> {
        self.receiver.recv().await
    }

    /// Receive an event without blocking
    pub fn try_event(&mut self) -> Option<SupervisorEvent> {
        self.receiver.try_recv().ok()
    }

    /// Request forced termination on behalf of the user
    pub fn stop(&self) {
        self.shared.request_stop(StopReason::User);
    }

    pub fn state(&self) -> RunState {
        self.shared.state()
    }

    pub fn is_finished(&self) -> bool {
        self.state() == RunState::Finished
    }

    pub fn pid(&self) -> Option<u32> {
        self.shared.pid
    }
}

/// Spawns and supervises one gallery-dl process at a time
#[derive(Debug, Clone)]
pub struct Supervisor {
    stall_timeout: Duration,
}

impl Supervisor {
    pub fn new(stall_timeout: Duration) -> Self {
        Self { stall_timeout }
    }

    /// Spawn the child and start draining its combined output.
    ///
    /// Stdout and stderr are read by separate tasks feeding one channel, the
    /// draining task classifies each line and forwards events, and the
    /// watchdog task watches for stalls. The returned handle is the only way
    /// to observe the run.
    pub fn start(&self, command: &DownloadCommand) -> Result<RunHandle, Error> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .envs(command.envs.iter().cloned())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::GalleryDlNotFound
                } else {
                    Error::Spawn {
                        reason: e.to_string(),
                    }
                }
            })?;

        let pid = child.id();
        info!(?pid, program = %command.program, "spawned download process");

        let (raw_tx, raw_rx) = mpsc::channel::<String>(1000);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(read_lines(stdout, raw_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(read_lines(stderr, raw_tx.clone()));
        }
        // Channel closes once both reader tasks finish
        drop(raw_tx);

        let (event_tx, event_rx) = mpsc::channel::<SupervisorEvent>(1000);
        let shared = Arc::new(Shared {
            state: AtomicU8::new(RunState::Running as u8),
            clock: ActivityClock::new(),
            partial: PartialFileGuard::new(),
            pid,
            stall_timeout: self.stall_timeout,
            notice_tx: event_tx.clone(),
        });
        shared.clock.touch();

        tokio::spawn(watchdog(Arc::clone(&shared)));
        tokio::spawn(drain(child, raw_rx, Arc::clone(&shared), event_tx));

        Ok(RunHandle {
            receiver: event_rx,
            shared,
        })
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(DEFAULT_STALL_TIMEOUT)
    }
}

/// Forward lines from one child stream into the combined channel
async fn read_lines<R>(stream: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).await.is_err() {
            break;
        }
    }
}

/// The output-draining loop: classify each line, update stats, clock and
/// partial-file hint, forward events, then wait for the child and emit the
/// final summary.
async fn drain(
    mut child: Child,
    mut raw_rx: mpsc::Receiver<String>,
    shared: Arc<Shared>,
    tx: mpsc::Sender<SupervisorEvent>,
) {
    let mut aggregator = StatsAggregator::new();
    let mut last_url: Option<String> = None;

    while let Some(line) = raw_rx.recv().await {
        // Stop flag observed at each line boundary
        if shared.state() != RunState::Running {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        shared.clock.touch();

        let (event, new_last_url) = classify(line, last_url.as_deref());
        last_url = new_last_url;
        if let Some(path) = &event.observed_path {
            shared.partial.observe(path.clone());
        }
        let stats = aggregator.apply(event.delta);
        if tx.send(SupervisorEvent::Line { event, stats }).await.is_err() {
            // Presentation side went away
            break;
        }
    }

    let code = match child.wait().await {
        Ok(status) => status.code().unwrap_or(-1),
        Err(err) => {
            warn!(%err, "failed to wait for child");
            -1
        }
    };
    let outcome = match shared.state() {
        RunState::StoppingUser => RunOutcome::Stopped {
            reason: StopReason::User,
        },
        RunState::StoppingTimeout => RunOutcome::Stopped {
            reason: StopReason::Timeout,
        },
        _ => RunOutcome::Exited { code },
    };
    shared.partial.clear();
    shared.set_state(RunState::Finished);
    info!(?outcome, "run finished");

    let _ = tx
        .send(SupervisorEvent::Finished {
            stats: aggregator.stats(),
            outcome,
        })
        .await;
}

/// Poll the activity clock once a second; trigger the timeout stop when the
/// idle duration crosses the threshold. Exits as soon as the run leaves
/// Running, so a user stop makes this a no-op.
async fn watchdog(shared: Arc<Shared>) {
    let mut ticker = tokio::time::interval(WATCHDOG_POLL);
    loop {
        ticker.tick().await;
        if shared.state() != RunState::Running {
            break;
        }
        if shared.clock.idle() >= shared.stall_timeout {
            shared.request_stop(StopReason::Timeout);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> DownloadCommand {
        DownloadCommand::new("sh", ["-c", script])
    }

    /// Drain all events until Finished, returning (lines, notices, final)
    async fn collect(
        handle: &mut RunHandle,
    ) -> (Vec<(ClassifiedEvent, RunStats)>, Vec<String>, (RunStats, RunOutcome)) {
        let mut lines = Vec::new();
        let mut notices = Vec::new();
        loop {
            match handle.next_event().await {
                Some(SupervisorEvent::Line { event, stats }) => lines.push((event, stats)),
                Some(SupervisorEvent::Notice { text, .. }) => notices.push(text),
                Some(SupervisorEvent::Finished { stats, outcome }) => {
                    return (lines, notices, (stats, outcome));
                }
                None => panic!("channel closed before Finished event"),
            }
        }
    }

    #[tokio::test]
    async fn supervisor_counts_downloads_and_failures() {
        let supervisor = Supervisor::default();
        let mut handle = supervisor
            .start(&sh(
                "echo '# 1 a.jpg'; echo '# 2 b.jpg'; echo \"[error] 'boom'\"; echo 'Retrying 1/10'",
            ))
            .unwrap();

        let (lines, _, (stats, outcome)) = collect(&mut handle).await;

        assert_eq!(stats.downloaded, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.retried, 1);
        assert_eq!(outcome, RunOutcome::Exited { code: 0 });
        // Events arrive in emission order with monotone snapshots
        let downloads: Vec<u64> = lines.iter().map(|(_, s)| s.downloaded).collect();
        assert!(downloads.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn supervisor_reports_nonzero_exit_code() {
        let supervisor = Supervisor::default();
        let mut handle = supervisor.start(&sh("exit 3")).unwrap();

        let (_, _, (_, outcome)) = collect(&mut handle).await;

        assert_eq!(outcome, RunOutcome::Exited { code: 3 });
        assert_eq!(outcome.severity(), Severity::Warning);
        assert_eq!(outcome.status_label(), "Done with errors (code 3)");
    }

    #[tokio::test]
    async fn supervisor_zero_exit_is_success() {
        let supervisor = Supervisor::default();
        let mut handle = supervisor.start(&sh("echo done")).unwrap();

        let (_, _, (_, outcome)) = collect(&mut handle).await;

        assert_eq!(outcome.severity(), Severity::Success);
        assert_eq!(outcome.status_label(), "Done");
    }

    #[tokio::test]
    async fn supervisor_user_stop_terminates_child() {
        let supervisor = Supervisor::default();
        let mut handle = supervisor.start(&sh("echo start; sleep 30")).unwrap();

        // Wait for the first line so the child is definitely up
        loop {
            match handle.next_event().await.unwrap() {
                SupervisorEvent::Line { .. } => break,
                _ => continue,
            }
        }
        handle.stop();

        let (_, _, (_, outcome)) =
            tokio::time::timeout(Duration::from_secs(10), collect(&mut handle))
                .await
                .expect("stop should finish the run promptly");
        assert_eq!(
            outcome,
            RunOutcome::Stopped {
                reason: StopReason::User
            }
        );
    }

    #[tokio::test]
    async fn supervisor_double_stop_is_idempotent() {
        let supervisor = Supervisor::default();
        let mut handle = supervisor.start(&sh("echo start; sleep 30")).unwrap();

        loop {
            match handle.next_event().await.unwrap() {
                SupervisorEvent::Line { .. } => break,
                _ => continue,
            }
        }
        handle.stop();
        handle.stop();

        let (_, notices, (_, outcome)) =
            tokio::time::timeout(Duration::from_secs(10), collect(&mut handle))
                .await
                .expect("stop should finish the run promptly");
        assert_eq!(
            outcome,
            RunOutcome::Stopped {
                reason: StopReason::User
            }
        );
        // Only the first request transitions; the second is a no-op
        let stopping = notices.iter().filter(|n| n.contains("Stopping")).count();
        assert_eq!(stopping, 1);
    }

    #[tokio::test]
    async fn supervisor_watchdog_stops_stalled_run() {
        let supervisor = Supervisor::new(Duration::from_secs(1));
        let mut handle = supervisor.start(&sh("echo start; sleep 60")).unwrap();

        let (_, notices, (_, outcome)) =
            tokio::time::timeout(Duration::from_secs(15), collect(&mut handle))
                .await
                .expect("watchdog should stop the stalled run");

        assert_eq!(
            outcome,
            RunOutcome::Stopped {
                reason: StopReason::Timeout
            }
        );
        assert!(notices.iter().any(|n| n.contains("stopping automatically")));
    }

    #[tokio::test]
    async fn supervisor_stop_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("img_0001.jpg");
        std::fs::write(&file, b"partial").unwrap();

        let supervisor = Supervisor::default();
        let script = format!("echo '# 1 {}'; sleep 30", file.display());
        let mut handle = supervisor.start(&sh(&script)).unwrap();

        // Wait until the path has been observed
        loop {
            match handle.next_event().await.unwrap() {
                SupervisorEvent::Line { event, .. } if event.observed_path.is_some() => break,
                _ => continue,
            }
        }
        handle.stop();

        let (_, notices, _) =
            tokio::time::timeout(Duration::from_secs(10), collect(&mut handle))
                .await
                .expect("stop should finish the run promptly");
        assert!(!file.exists(), "partial file should have been removed");
        assert!(notices.iter().any(|n| n.contains("Removed incomplete file")));
    }

    #[tokio::test]
    async fn supervisor_missing_executable_is_spawn_failure() {
        let supervisor = Supervisor::default();
        let command = DownloadCommand::new("/nonexistent/gallery-dl", ["--version"]);

        let err = supervisor.start(&command).unwrap_err();
        assert!(matches!(err, Error::GalleryDlNotFound));
    }
}
