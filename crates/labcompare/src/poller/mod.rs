//! Job Poller: observes one comparison job until it settles.
//!
//! The first fetch happens immediately; after every non-terminal answer (or
//! failed fetch) the attempt counter goes up and the next fetch waits one
//! interval. When the counter passes `max_attempts` the poller gives up with
//! `TimedOut`, which is a client-side condition only: the server job keeps
//! running and can still be fetched later.

mod task;

pub use task::ScheduledTask;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::api::ComparisonApi;
use crate::error::ApiError;
use crate::models::{Comparison, ComparisonStatus};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(20);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

const PROGRESS_PENDING: u8 = 20;
const PROGRESS_PROCESSING: u8 = 60;
const PROGRESS_DONE: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    Idle,
    Polling,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl PollState {
    pub fn is_active(&self) -> bool {
        matches!(self, PollState::Polling)
    }
}

impl std::fmt::Display for PollState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollState::Idle => write!(f, "idle"),
            PollState::Polling => write!(f, "polling"),
            PollState::Completed => write!(f, "completed"),
            PollState::Failed => write!(f, "failed"),
            PollState::TimedOut => write!(f, "timed out"),
            PollState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Emitted on every poll outcome. Each chain ends with exactly one of
/// `Completed`, `Failed`, `TimedOut` or `Cancelled`.
#[derive(Debug, Clone)]
pub enum PollEvent {
    Progress {
        job_id: String,
        /// `None` when the fetch itself failed.
        status: Option<ComparisonStatus>,
        progress: u8,
        attempts: u32,
    },
    Completed {
        job_id: String,
        comparison: Box<Comparison>,
    },
    /// The server reported failure; `error_message` is passed through untouched.
    Failed {
        job_id: String,
        error_message: Option<String>,
    },
    /// The attempt budget ran out. The job may still finish server-side.
    TimedOut { job_id: String, attempts: u32 },
    Cancelled { job_id: String },
}

impl PollEvent {
    pub fn job_id(&self) -> &str {
        match self {
            PollEvent::Progress { job_id, .. }
            | PollEvent::Completed { job_id, .. }
            | PollEvent::Failed { job_id, .. }
            | PollEvent::TimedOut { job_id, .. }
            | PollEvent::Cancelled { job_id } => job_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollEvent::Progress { .. })
    }
}

#[derive(Debug)]
struct PollShared {
    state: PollState,
    job_id: Option<String>,
    attempts: u32,
    progress: u8,
    /// Bumped on every start and cancel; a chain whose generation no longer
    /// matches must not touch state.
    generation: u64,
}

fn lock(shared: &Mutex<PollShared>) -> MutexGuard<'_, PollShared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Polls one job at a time. Starting a new job cancels the previous chain.
///
/// Must be used from within a tokio runtime.
pub struct JobPoller {
    api: Arc<dyn ComparisonApi>,
    config: PollerConfig,
    shared: Arc<Mutex<PollShared>>,
    task: Mutex<Option<ScheduledTask>>,
    events: broadcast::Sender<PollEvent>,
}

impl JobPoller {
    pub fn new(api: Arc<dyn ComparisonApi>, config: PollerConfig) -> Self {
        let (events, _) = broadcast::channel(100);
        Self {
            api,
            config,
            shared: Arc::new(Mutex::new(PollShared {
                state: PollState::Idle,
                job_id: None,
                attempts: 0,
                progress: 0,
                generation: 0,
            })),
            task: Mutex::new(None),
            events,
        }
    }

    pub fn config(&self) -> PollerConfig {
        self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PollEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> PollState {
        lock(&self.shared).state
    }

    /// Cosmetic completion estimate in percent.
    pub fn progress(&self) -> u8 {
        lock(&self.shared).progress
    }

    pub fn attempts(&self) -> u32 {
        lock(&self.shared).attempts
    }

    pub fn job_id(&self) -> Option<String> {
        lock(&self.shared).job_id.clone()
    }

    /// Begin polling `job_id`, cancelling any chain still running.
    pub fn start(&self, job_id: &str) {
        self.cancel();

        let generation = {
            let mut shared = lock(&self.shared);
            shared.generation += 1;
            shared.state = PollState::Polling;
            shared.job_id = Some(job_id.to_string());
            shared.attempts = 0;
            shared.progress = 0;
            shared.generation
        };
        log::info!("Polling comparison {}", job_id);

        let chain = PollChain {
            api: Arc::clone(&self.api),
            config: self.config,
            shared: Arc::clone(&self.shared),
            events: self.events.clone(),
            job_id: job_id.to_string(),
            generation,
        };
        let task = ScheduledTask::spawn(chain.run());
        if let Some(previous) = self.task_slot().replace(task) {
            previous.cancel();
        }
    }

    /// Stop the active chain. Returns false when nothing was polling.
    pub fn cancel(&self) -> bool {
        let job_id = {
            let mut shared = lock(&self.shared);
            if shared.state != PollState::Polling {
                None
            } else {
                shared.generation += 1;
                shared.state = PollState::Cancelled;
                shared.job_id.clone()
            }
        };

        if let Some(task) = self.task_slot().take() {
            task.cancel();
        }

        match job_id {
            Some(job_id) => {
                log::info!("Cancelled polling for comparison {}", job_id);
                let _ = self.events.send(PollEvent::Cancelled { job_id });
                true
            }
            None => false,
        }
    }

    fn task_slot(&self) -> MutexGuard<'_, Option<ScheduledTask>> {
        self.task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for JobPoller {
    fn drop(&mut self) {
        self.cancel();
    }
}

enum Step {
    Wait,
    Done,
}

struct PollChain {
    api: Arc<dyn ComparisonApi>,
    config: PollerConfig,
    shared: Arc<Mutex<PollShared>>,
    events: broadcast::Sender<PollEvent>,
    job_id: String,
    generation: u64,
}

impl PollChain {
    async fn run(self) {
        loop {
            let result = self.api.get(&self.job_id).await;
            match self.apply(result) {
                Step::Wait => tokio::time::sleep(self.config.interval).await,
                Step::Done => return,
            }
        }
    }

    /// Fold one fetch outcome into the shared state.
    fn apply(&self, result: Result<Comparison, ApiError>) -> Step {
        let mut shared = lock(&self.shared);
        if shared.generation != self.generation {
            return Step::Done;
        }

        let status = match result {
            Ok(comparison) => match comparison.status {
                ComparisonStatus::Completed => {
                    shared.state = PollState::Completed;
                    shared.progress = PROGRESS_DONE;
                    log::info!(
                        "Comparison {} completed after {} attempts",
                        self.job_id,
                        shared.attempts
                    );
                    self.emit(PollEvent::Completed {
                        job_id: self.job_id.clone(),
                        comparison: Box::new(comparison),
                    });
                    return Step::Done;
                }
                ComparisonStatus::Failed => {
                    shared.state = PollState::Failed;
                    log::info!(
                        "Comparison {} failed: {}",
                        self.job_id,
                        comparison.error_message.as_deref().unwrap_or("no message")
                    );
                    self.emit(PollEvent::Failed {
                        job_id: self.job_id.clone(),
                        error_message: comparison.error_message,
                    });
                    return Step::Done;
                }
                ComparisonStatus::Pending => {
                    shared.progress = PROGRESS_PENDING;
                    Some(ComparisonStatus::Pending)
                }
                ComparisonStatus::Processing => {
                    shared.progress = PROGRESS_PROCESSING;
                    Some(ComparisonStatus::Processing)
                }
            },
            Err(e) => {
                if e.is_transient() {
                    log::warn!("Status fetch for {} failed, will retry: {}", self.job_id, e);
                } else {
                    log::warn!("Status fetch for {} returned an error: {}", self.job_id, e);
                }
                None
            }
        };

        shared.attempts += 1;
        log::debug!(
            "Comparison {} attempt {}: {}",
            self.job_id,
            shared.attempts,
            status.map(|s| s.as_str()).unwrap_or("fetch error")
        );

        if shared.attempts > self.config.max_attempts {
            shared.state = PollState::TimedOut;
            log::info!(
                "Stopped waiting for comparison {} after {} attempts",
                self.job_id,
                shared.attempts
            );
            self.emit(PollEvent::TimedOut {
                job_id: self.job_id.clone(),
                attempts: shared.attempts,
            });
            return Step::Done;
        }

        self.emit(PollEvent::Progress {
            job_id: self.job_id.clone(),
            status,
            progress: shared.progress,
            attempts: shared.attempts,
        });
        Step::Wait
    }

    fn emit(&self, event: PollEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
