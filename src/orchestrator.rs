use std::fmt;
use std::io::Write;
use std::net::IpAddr;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use crate::dialer::{DialOutcome, DialerManager};
use crate::listener::ListenerManager;
use crate::report::{now_rfc3339, write_summary, RunReport};
use crate::results::ResultAggregator;
use crate::types::ReadinessConfig;

pub const READY_PROMPT: &str = "Hit Enter when all ports are listening: ";
pub const SHUTDOWN_PROMPT: &str = "Hit Enter to shutdown listeners: ";

/// Run phases, in the only order they can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    ListenersStarting,
    AwaitingReadySignal,
    Dialing,
    AwaitingShutdownSignal,
    Reporting,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Initializing => "initializing",
            Phase::ListenersStarting => "listeners-starting",
            Phase::AwaitingReadySignal => "awaiting-ready-signal",
            Phase::Dialing => "dialing",
            Phase::AwaitingShutdownSignal => "awaiting-shutdown-signal",
            Phase::Reporting => "reporting",
            Phase::Done => "done",
        };
        f.write_str(s)
    }
}

/// Pause point between phases.
///
/// With an input stream it prints a prompt and waits for one line, whose
/// content is discarded. End of input also releases the pause. Without an
/// input stream it only waits for the settle delay, which is also applied
/// after every line read.
#[derive(Debug)]
pub struct PhaseGate<R> {
    input: Option<R>,
    settle: Duration,
}

impl<R: AsyncBufRead + Unpin> PhaseGate<R> {
    pub fn interactive(input: R) -> Self {
        Self {
            input: Some(input),
            settle: Duration::ZERO,
        }
    }

    pub fn unattended(settle: Duration) -> Self {
        Self {
            input: None,
            settle,
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub async fn wait(&mut self, prompt: &str) {
        if let Some(input) = self.input.as_mut() {
            print!("{prompt}\n\n");
            let _ = std::io::stdout().flush();
            let mut line = String::new();
            if let Err(e) = input.read_line(&mut line).await {
                warn!("failed to read operator input, continuing: {e}");
            }
        }
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: RunReport,
    pub dials: Vec<DialOutcome>,
    pub phases: Vec<Phase>,
}

/// Drives one run: listeners, pause, dials, pause, report.
pub struct Orchestrator<R> {
    config: ReadinessConfig,
    results: ResultAggregator,
    listeners: ListenerManager,
    dialer: DialerManager,
    gate: PhaseGate<R>,
    phases: Vec<Phase>,
}

impl<R: AsyncBufRead + Unpin> Orchestrator<R> {
    pub fn new(config: ReadinessConfig, gate: PhaseGate<R>) -> Self {
        let results = ResultAggregator::new();
        Self {
            config,
            listeners: ListenerManager::new(results.clone()),
            dialer: DialerManager::new(results.clone()),
            results,
            gate,
            phases: vec![Phase::Initializing],
        }
    }

    pub fn with_bind_ip(mut self, bind_ip: IpAddr) -> Self {
        self.listeners = ListenerManager::with_bind_ip(bind_ip, self.results.clone());
        self
    }

    pub fn with_dial_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.dialer = self.dialer.with_timeout(timeout);
        self
    }

    fn enter(&mut self, phase: Phase) {
        info!("phase: {phase}");
        self.phases.push(phase);
    }

    /// Run every phase to completion and write the summary to `report_out`.
    ///
    /// Individual endpoint failures never stop the run. Listeners are shut
    /// down once the summary has been written.
    pub async fn run(mut self, report_out: &mut impl Write) -> RunOutcome {
        let started_at = now_rfc3339();

        self.enter(Phase::ListenersStarting);
        let listeners = self.listeners.launch(&self.config.local_connection_details);
        info!("{} listener task(s) started", listeners.len());

        self.enter(Phase::AwaitingReadySignal);
        self.gate.wait(READY_PROMPT).await;

        self.enter(Phase::Dialing);
        let dials = self.dialer.dial_all(&self.config.remote_target()).await;

        self.enter(Phase::AwaitingShutdownSignal);
        self.gate.wait(SHUTDOWN_PROMPT).await;

        self.enter(Phase::Reporting);
        let counters = self.results.snapshot();
        if let Err(e) = write_summary(report_out, &counters) {
            warn!("failed to write summary: {e}");
        }
        listeners.shutdown().await;

        self.enter(Phase::Done);
        RunOutcome {
            report: RunReport {
                counters,
                started_at,
                finished_at: now_rfc3339(),
            },
            dials,
            phases: self.phases,
        }
    }
}
