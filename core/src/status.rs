//! Phase signals for an external service-control listener
//!
//! The listener is optional. [`StatusReporter`] wraps it so that every call
//! is a no-op when nobody listens, and so that the terminal signals stay
//! mutually exclusive: once `Started` or `StopPending` went out, further
//! terminal reports are dropped.

use schema::StartupPhase;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Receiver of startup phase signals
pub trait StatusListener: Send + Sync {
    /// Startup is progressing; may be called any number of times
    fn report_start_pending(&self);
    /// The server is up
    fn report_started(&self);
    /// The start attempt failed
    fn report_stop_pending(&self);
}

/// Optional listener plus terminal-signal bookkeeping
#[derive(Clone, Default)]
pub struct StatusReporter {
    listener: Option<Arc<dyn StatusListener>>,
    terminal: Arc<Mutex<Option<StartupPhase>>>,
}

impl fmt::Debug for StatusReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusReporter")
            .field("listener", &self.listener.is_some())
            .field("terminal", &self.terminal_phase())
            .finish()
    }
}

impl StatusReporter {
    /// Reporter that forwards to `listener`, or drops everything for `None`
    pub fn new(listener: Option<Arc<dyn StatusListener>>) -> Self {
        Self {
            listener,
            terminal: Arc::new(Mutex::new(None)),
        }
    }

    /// Reporter without a listener
    pub fn silent() -> Self {
        Self::new(None)
    }

    /// Terminal phase reported so far, if any
    pub fn terminal_phase(&self) -> Option<StartupPhase> {
        self.terminal.lock().ok().and_then(|t| *t)
    }

    pub fn start_pending(&self) {
        if self.terminal_phase().is_some() {
            return;
        }
        debug!("Status: start pending");
        if let Some(l) = &self.listener {
            l.report_start_pending();
        }
    }

    pub fn started(&self) {
        if self.claim_terminal(StartupPhase::Started) {
            info!("Status: started");
            if let Some(l) = &self.listener {
                l.report_started();
            }
        }
    }

    pub fn stop_pending(&self) {
        if self.claim_terminal(StartupPhase::StopPending) {
            info!("Status: stop pending");
            if let Some(l) = &self.listener {
                l.report_stop_pending();
            }
        }
    }

    fn claim_terminal(&self, phase: StartupPhase) -> bool {
        let Ok(mut terminal) = self.terminal.lock() else {
            return false;
        };
        if terminal.is_some() {
            debug!("Dropping {:?}; already reported {:?}", phase, *terminal);
            return false;
        }
        *terminal = Some(phase);
        true
    }
}

/// Listener that writes every signal to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl StatusListener for LoggingListener {
    fn report_start_pending(&self) {
        info!("Server start pending");
    }

    fn report_started(&self) {
        info!("Server started");
    }

    fn report_stop_pending(&self) {
        info!("Server stop pending");
    }
}

/// Listener that records the signals it receives
#[derive(Debug, Default)]
pub struct RecordingListener {
    calls: Mutex<Vec<StartupPhase>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything received, in order
    pub fn calls(&self) -> Vec<StartupPhase> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// How often `phase` was received
    pub fn count(&self, phase: StartupPhase) -> usize {
        self.calls().iter().filter(|p| **p == phase).count()
    }

    fn record(&self, phase: StartupPhase) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(phase);
        }
    }
}

impl StatusListener for RecordingListener {
    fn report_start_pending(&self) {
        self.record(StartupPhase::StartPending);
    }

    fn report_started(&self) {
        self.record(StartupPhase::Started);
    }

    fn report_stop_pending(&self) {
        self.record(StartupPhase::StopPending);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_reporter_is_a_noop() {
        let reporter = StatusReporter::silent();
        reporter.start_pending();
        reporter.stop_pending();
        assert_eq!(reporter.terminal_phase(), Some(StartupPhase::StopPending));
    }

    #[test]
    fn forwards_in_order() {
        let listener = Arc::new(RecordingListener::new());
        let reporter = StatusReporter::new(Some(listener.clone()));
        reporter.start_pending();
        reporter.start_pending();
        reporter.started();

        assert_eq!(
            listener.calls(),
            vec![
                StartupPhase::StartPending,
                StartupPhase::StartPending,
                StartupPhase::Started
            ]
        );
    }

    #[test]
    fn terminal_signals_are_exclusive() {
        let listener = Arc::new(RecordingListener::new());
        let reporter = StatusReporter::new(Some(listener.clone()));
        reporter.stop_pending();
        reporter.stop_pending();
        reporter.started();
        reporter.start_pending();

        assert_eq!(listener.calls(), vec![StartupPhase::StopPending]);
    }

    #[test]
    fn clones_share_terminal_state() {
        let listener = Arc::new(RecordingListener::new());
        let reporter = StatusReporter::new(Some(listener.clone()));
        let other = reporter.clone();
        other.started();
        reporter.stop_pending();
        assert_eq!(listener.count(StartupPhase::Started), 1);
        assert_eq!(listener.count(StartupPhase::StopPending), 0);
    }
}
