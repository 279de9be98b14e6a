//! Readiness of a detached server
//!
//! The supervisor never gets an exit signal from the server (it is detached),
//! so readiness is established by observation:
//!
//! - [`ProcessTableReadiness`] walks an explicit state machine over the
//!   process table: `WaitingForSpawn` discovers candidates matching a search
//!   pattern, `WaitingForConfirmation` checks that at least one of them stays
//!   alive, and the walk ends in `Confirmed` or `Failed`
//! - [`PingReadiness`] probes the server's own HTTP endpoint a fixed number
//!   of times
//!
//! Every loop is bounded by an iteration count derived from its window.

use crate::health::{Expect, HttpProbe, Probe};
use crate::pidfile::read_exit_code;
use crate::process::ProcessEntry;
use crate::status::StatusReporter;
use crate::{CoreError, Result};
use async_trait::async_trait;
use schema::{LauncherConfig, PidRecord, ProcessHandle};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How a readiness wait ended without a fatal error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessOutcome {
    /// The server is up; `record` goes to the PID file
    Confirmed {
        /// Primary pid plus its provenance
        record: PidRecord,
        /// Number of candidates found alive, always > 0
        confirmed: usize,
    },
    /// Readiness could not be established but is not treated as fatal
    Unconfirmed,
}

/// Strategy that decides when a launched server counts as started
#[async_trait]
pub trait Readiness: Send + Sync + fmt::Debug {
    /// Wait until the server is confirmed or the strategy gives up.
    ///
    /// A fatal failure is returned as [`CoreError::StartupTimeout`].
    async fn wait(&self, handle: &ProcessHandle, status: &StatusReporter)
        -> Result<ReadinessOutcome>;
}

/// Read access to the operating system's process table
pub trait ProcessTable: Send + Sync + fmt::Debug {
    /// Processes whose command line contains `pattern`, ordered by pid
    fn scan(&self, pattern: &str) -> Vec<ProcessEntry>;
    /// Whether `pid` exists and has not exited
    fn is_alive(&self, pid: u32) -> bool;
}

/// The host's own process table
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessTable;

impl ProcessTable for SystemProcessTable {
    fn scan(&self, pattern: &str) -> Vec<ProcessEntry> {
        crate::process::scan_process_table(pattern)
    }

    fn is_alive(&self, pid: u32) -> bool {
        crate::process::pid_is_alive(pid)
    }
}

/// Windows and poll cadence of the process-table walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessTiming {
    pub discovery_window: Duration,
    pub startup_window: Duration,
    pub poll_interval: Duration,
}

impl ReadinessTiming {
    fn polls(window: Duration, interval: Duration) -> u32 {
        let interval = interval.as_millis().max(1);
        ((window.as_millis() / interval) as u32).max(1)
    }

    /// Number of scans in the discovery window
    pub fn discovery_polls(&self) -> u32 {
        Self::polls(self.discovery_window, self.poll_interval)
    }

    /// Number of liveness checks in the startup window
    pub fn confirmation_polls(&self) -> u32 {
        Self::polls(self.startup_window, self.poll_interval)
    }
}

/// States of the process-table walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitState {
    WaitingForSpawn,
    WaitingForConfirmation { candidates: Vec<ProcessEntry> },
    Confirmed { alive: Vec<ProcessEntry> },
    Failed,
}

impl WaitState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WaitState::Confirmed { .. } | WaitState::Failed)
    }
}

/// Process-table readiness used on POSIX hosts
#[derive(Debug)]
pub struct ProcessTableReadiness {
    pattern: String,
    timing: ReadinessTiming,
    shell_whitelist: Vec<PathBuf>,
    exit_code_file: PathBuf,
    log_file: PathBuf,
    table: Box<dyn ProcessTable>,
}

impl ProcessTableReadiness {
    pub fn new(
        pattern: impl Into<String>,
        timing: ReadinessTiming,
        exit_code_file: impl Into<PathBuf>,
        log_file: impl Into<PathBuf>,
        table: Box<dyn ProcessTable>,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            timing,
            shell_whitelist: Vec::new(),
            exit_code_file: exit_code_file.into(),
            log_file: log_file.into(),
            table,
        }
    }

    /// Readiness wired from the launcher configuration
    pub fn from_config(config: &LauncherConfig, table: Box<dyn ProcessTable>) -> Self {
        let timing = ReadinessTiming {
            discovery_window: config.readiness.discovery_window(),
            startup_window: config.readiness.startup_window(),
            poll_interval: config.readiness.poll_interval(),
        };
        Self::new(
            config.effective_search_pattern(),
            timing,
            Path::new(&config.pid_dir).join(&config.exit_code_file_name),
            &config.log_file,
            table,
        )
        .with_shell_whitelist(config.shell_whitelist.iter().map(PathBuf::from))
    }

    /// Executables that never count as the server itself
    pub fn with_shell_whitelist(mut self, shells: impl IntoIterator<Item = PathBuf>) -> Self {
        self.shell_whitelist = shells.into_iter().collect();
        self
    }

    /// Drive the state machine from `WaitingForSpawn` to a terminal state
    pub async fn run(&self) -> WaitState {
        let mut state = WaitState::WaitingForSpawn;
        while !state.is_terminal() {
            state = self.step(state).await;
        }
        state
    }

    async fn step(&self, state: WaitState) -> WaitState {
        match state {
            WaitState::WaitingForSpawn => {
                let candidates = self.discover().await;
                if candidates.is_empty() {
                    warn!("No process matching '{}' appeared", self.pattern);
                    WaitState::Failed
                } else {
                    WaitState::WaitingForConfirmation { candidates }
                }
            }
            WaitState::WaitingForConfirmation { candidates } => {
                let alive = self.confirm(&candidates).await;
                if alive.is_empty() {
                    WaitState::Failed
                } else {
                    WaitState::Confirmed { alive }
                }
            }
            terminal => terminal,
        }
    }

    /// Re-scan for the whole discovery window; the last scan wins
    async fn discover(&self) -> Vec<ProcessEntry> {
        let polls = self.timing.discovery_polls();
        let mut last = Vec::new();
        for i in 0..polls {
            last = self.table.scan(&self.pattern);
            debug!(
                "Discovery scan {}/{} for '{}': {:?}",
                i + 1,
                polls,
                self.pattern,
                last.iter().map(|e| e.pid).collect::<Vec<_>>()
            );
            if i + 1 < polls {
                tokio::time::sleep(self.timing.poll_interval).await;
            }
        }
        last
    }

    /// Stop as soon as at least one candidate is alive
    async fn confirm(&self, candidates: &[ProcessEntry]) -> Vec<ProcessEntry> {
        let polls = self.timing.confirmation_polls();
        for i in 0..polls {
            let alive: Vec<ProcessEntry> = candidates
                .iter()
                .filter(|c| self.table.is_alive(c.pid))
                .cloned()
                .collect();
            debug!("Confirmation poll {}/{}: {} alive", i + 1, polls, alive.len());
            if !alive.is_empty() {
                return alive;
            }
            if i + 1 < polls {
                tokio::time::sleep(self.timing.poll_interval).await;
            }
        }
        Vec::new()
    }

    /// First alive process that is not one of the wrapper shells
    pub fn primary<'a>(&self, alive: &'a [ProcessEntry]) -> Option<&'a ProcessEntry> {
        alive
            .iter()
            .find(|e| match &e.exe {
                Some(exe) => !self.shell_whitelist.iter().any(|s| s == exe),
                None => true,
            })
            .or_else(|| alive.first())
    }
}

#[async_trait]
impl Readiness for ProcessTableReadiness {
    async fn wait(
        &self,
        handle: &ProcessHandle,
        _status: &StatusReporter,
    ) -> Result<ReadinessOutcome> {
        info!("Waiting for server start (launcher pid {})", handle.pid);

        match self.run().await {
            WaitState::Confirmed { alive } => {
                let primary = self.primary(&alive).map(|e| e.pid).ok_or_else(|| {
                    CoreError::Other("confirmed without any live process".to_string())
                })?;
                info!("Server process {} confirmed alive", primary);
                Ok(ReadinessOutcome::Confirmed {
                    record: PidRecord {
                        pid: primary,
                        daemonized: true,
                    },
                    confirmed: alive.len(),
                })
            }
            _ => {
                let exit = read_exit_code(&self.exit_code_file);
                let err = CoreError::StartupTimeout {
                    exit_code: exit.exit_code,
                    log_file: self.log_file.display().to_string(),
                };
                error!("{}", err);
                Err(err)
            }
        }
    }
}

/// Network readiness used on Windows hosts
#[derive(Debug)]
pub struct PingReadiness {
    probe: Box<dyn Probe>,
    attempts: u32,
}

impl PingReadiness {
    pub fn new(probe: Box<dyn Probe>, attempts: u32) -> Self {
        Self { probe, attempts }
    }

    pub fn from_config(config: &LauncherConfig) -> Self {
        let probe = HttpProbe::new(
            config.readiness.ping_url.clone(),
            Expect::Any2xx,
            config.readiness.ping_timeout(),
        );
        Self::new(Box::new(probe), config.readiness.ping_attempts)
    }
}

#[async_trait]
impl Readiness for PingReadiness {
    async fn wait(
        &self,
        handle: &ProcessHandle,
        status: &StatusReporter,
    ) -> Result<ReadinessOutcome> {
        for attempt in 1..=self.attempts {
            match self.probe.check().await {
                Ok(()) => {
                    info!("Server answered on attempt {}", attempt);
                    return Ok(ReadinessOutcome::Confirmed {
                        record: PidRecord {
                            pid: handle.pid,
                            daemonized: false,
                        },
                        confirmed: 1,
                    });
                }
                Err(e) => {
                    debug!("Ping attempt {}/{} failed: {}", attempt, self.attempts, e);
                    status.start_pending();
                }
            }
        }
        // the service manager enforces its own start timeout
        warn!(
            "Server did not answer after {} attempts; leaving the outcome to the service manager",
            self.attempts
        );
        Ok(ReadinessOutcome::Unconfirmed)
    }
}

/// Scriptable process table for tests and dry runs
#[derive(Debug, Default)]
pub struct MockProcessTable {
    scans: std::sync::Mutex<std::collections::VecDeque<Vec<ProcessEntry>>>,
    alive: std::sync::Mutex<std::collections::BTreeSet<u32>>,
    scan_calls: std::sync::atomic::AtomicUsize,
    alive_calls: std::sync::atomic::AtomicUsize,
}

impl MockProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next scan; the last queued result repeats
    pub fn push_scan(self, entries: Vec<ProcessEntry>) -> Self {
        if let Ok(mut scans) = self.scans.lock() {
            scans.push_back(entries);
        }
        self
    }

    /// Mark `pid` as alive
    pub fn alive(self, pid: u32) -> Self {
        if let Ok(mut alive) = self.alive.lock() {
            alive.insert(pid);
        }
        self
    }

    pub fn scan_calls(&self) -> usize {
        self.scan_calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn alive_calls(&self) -> usize {
        self.alive_calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl ProcessTable for MockProcessTable {
    fn scan(&self, _pattern: &str) -> Vec<ProcessEntry> {
        self.scan_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let Ok(mut scans) = self.scans.lock() else {
            return Vec::new();
        };
        if scans.len() > 1 {
            scans.pop_front().unwrap_or_default()
        } else {
            scans.front().cloned().unwrap_or_default()
        }
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.alive_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.alive.lock().map(|a| a.contains(&pid)).unwrap_or(false)
    }
}

impl ProcessTable for std::sync::Arc<MockProcessTable> {
    fn scan(&self, pattern: &str) -> Vec<ProcessEntry> {
        self.as_ref().scan(pattern)
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.as_ref().is_alive(pid)
    }
}
