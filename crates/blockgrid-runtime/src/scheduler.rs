#![forbid(unsafe_code)]

//! Bulk task scheduling with bounded concurrency and per-task timeouts.
//!
//! Independent of the board: tasks run on `std::thread` workers and report
//! back over an mpsc channel. Each task receives a [`CancellationToken`]
//! that is tripped when its timeout elapses.
//!
//! # Invariants
//!
//! 1. Outcomes are returned in submission order, one per task.
//! 2. At most `max` tasks are in flight in [`SchedulerMode::Pooled`] mode;
//!    [`SchedulerMode::Sequential`] is a pool of one and
//!    [`SchedulerMode::FanOut`] starts everything at once.
//! 3. A timed-out task frees its slot immediately. Whatever it returns later
//!    is dropped.
//!
//! # Failure Modes
//!
//! - **Panicking task**: caught on the worker and reported as
//!   [`TaskOutcome::Failed`].
//! - **Thread spawn failure**: reported as `Failed` for that task; the rest
//!   still run.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;

use tracing::{debug, debug_span, warn};
use web_time::{Duration, Instant};

use crate::cancellation::{CancellationSource, CancellationToken};
use crate::error::panic_message;

/// How many tasks may run at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerMode {
    /// Bounded pool; `max` of zero is treated as one.
    Pooled { max: usize },
    FanOut,
    Sequential,
}

impl SchedulerMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pooled { .. } => "pooled",
            Self::FanOut => "fan-out",
            Self::Sequential => "sequential",
        }
    }

    fn concurrency(self, tasks: usize) -> usize {
        match self {
            Self::Pooled { max } => max.max(1),
            Self::FanOut => tasks.max(1),
            Self::Sequential => 1,
        }
    }
}

/// Result of one scheduled task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<T> {
    Completed(T),
    /// The task returned an error or panicked.
    Failed(String),
    TimedOut,
}

impl<T> TaskOutcome<T> {
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    #[must_use]
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            _ => None,
        }
    }
}

/// A boxed task as accepted by [`TaskScheduler::run`].
pub type Task<T> = Box<dyn FnOnce(&CancellationToken) -> Result<T, String> + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskScheduler {
    mode: SchedulerMode,
    timeout: Option<Duration>,
}

struct InFlight {
    index: usize,
    deadline: Option<Instant>,
    source: CancellationSource,
}

impl TaskScheduler {
    #[must_use]
    pub const fn new(mode: SchedulerMode) -> Self {
        Self {
            mode,
            timeout: None,
        }
    }

    /// Bound every task by `timeout`, measured from its start.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub const fn mode(&self) -> SchedulerMode {
        self.mode
    }

    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run every task and collect outcomes in submission order.
    pub fn run<T: Send + 'static>(&self, tasks: Vec<Task<T>>) -> Vec<TaskOutcome<T>> {
        let total = tasks.len();
        let limit = self.mode.concurrency(total);
        let _span = debug_span!(
            target: "blockgrid.scheduler",
            "run",
            mode = self.mode.as_str(),
            tasks = total,
            limit
        )
        .entered();

        let mut outcomes: Vec<Option<TaskOutcome<T>>> = (0..total).map(|_| None).collect();
        let (tx, rx) = mpsc::channel::<(usize, TaskOutcome<T>)>();
        let mut pending = tasks.into_iter().enumerate();
        let mut in_flight: Vec<InFlight> = Vec::with_capacity(limit);

        loop {
            while in_flight.len() < limit {
                let Some((index, task)) = pending.next() else {
                    break;
                };
                match self.launch(index, task, &tx) {
                    Ok(slot) => in_flight.push(slot),
                    Err(reason) => outcomes[index] = Some(TaskOutcome::Failed(reason)),
                }
            }
            if in_flight.is_empty() {
                break;
            }

            let next_deadline = in_flight.iter().filter_map(|slot| slot.deadline).min();
            let received = match next_deadline {
                Some(deadline) => {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    rx.recv_timeout(wait)
                }
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok((index, outcome)) => {
                    // Late results from timed-out tasks have no slot left.
                    if let Some(at) = in_flight.iter().position(|slot| slot.index == index) {
                        in_flight.swap_remove(at);
                        outcomes[index] = Some(outcome);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    let now = Instant::now();
                    in_flight.retain(|slot| {
                        let expired = slot.deadline.is_some_and(|deadline| deadline <= now);
                        if expired {
                            warn!(target: "blockgrid.scheduler", task = slot.index, "task timed out");
                            slot.source.cancel();
                            outcomes[slot.index] = Some(TaskOutcome::TimedOut);
                        }
                        !expired
                    });
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let outcomes: Vec<TaskOutcome<T>> = outcomes
            .into_iter()
            .map(|outcome| {
                outcome.unwrap_or_else(|| TaskOutcome::Failed("worker vanished".to_string()))
            })
            .collect();
        debug!(
            target: "blockgrid.scheduler",
            completed = outcomes.iter().filter(|o| o.is_completed()).count(),
            timed_out = outcomes.iter().filter(|o| matches!(o, TaskOutcome::TimedOut)).count(),
            "run finished"
        );
        outcomes
    }

    fn launch<T: Send + 'static>(
        &self,
        index: usize,
        task: Task<T>,
        tx: &Sender<(usize, TaskOutcome<T>)>,
    ) -> Result<InFlight, String> {
        let source = CancellationSource::new();
        let token = source.token();
        let tx = tx.clone();
        thread::Builder::new()
            .name(format!("blockgrid-task-{index}"))
            .spawn(move || {
                let outcome = match catch_unwind(AssertUnwindSafe(|| task(&token))) {
                    Ok(Ok(value)) => TaskOutcome::Completed(value),
                    Ok(Err(reason)) => TaskOutcome::Failed(reason),
                    Err(payload) => TaskOutcome::Failed(panic_message(payload.as_ref())),
                };
                let _ = tx.send((index, outcome));
            })
            .map_err(|err| err.to_string())?;
        Ok(InFlight {
            index,
            deadline: self.timeout.map(|timeout| Instant::now() + timeout),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn task<T: Send + 'static>(
        f: impl FnOnce(&CancellationToken) -> Result<T, String> + Send + 'static,
    ) -> Task<T> {
        Box::new(f)
    }

    #[test]
    fn outcomes_follow_submission_order() {
        let tasks: Vec<Task<u32>> = (0..6u32)
            .map(|i| {
                task(move |_| {
                    thread::sleep(Duration::from_millis(u64::from(6 - i)));
                    Ok(i * 10)
                })
            })
            .collect();
        let outcomes = TaskScheduler::new(SchedulerMode::FanOut).run(tasks);
        let values: Vec<u32> = outcomes.into_iter().filter_map(TaskOutcome::completed).collect();
        assert_eq!(values, vec![0, 10, 20, 30, 40, 50]);
    }

    #[test]
    fn pool_bounds_concurrency() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let tasks: Vec<Task<()>> = (0..8)
            .map(|_| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                task(move |_| {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(10));
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
            })
            .collect();
        let outcomes = TaskScheduler::new(SchedulerMode::Pooled { max: 2 }).run(tasks);
        assert!(outcomes.iter().all(TaskOutcome::is_completed));
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn failures_and_panics_are_reported() {
        let tasks: Vec<Task<u8>> = vec![
            task(|_| Ok(1)),
            task(|_| Err("bad input".to_string())),
            task(|_| panic!("boom")),
        ];
        let outcomes = TaskScheduler::new(SchedulerMode::Sequential).run(tasks);
        assert_eq!(outcomes[0], TaskOutcome::Completed(1));
        assert_eq!(outcomes[1], TaskOutcome::Failed("bad input".to_string()));
        assert_eq!(outcomes[2], TaskOutcome::Failed("boom".to_string()));
    }

    #[test]
    fn timeout_trips_token_and_frees_slot() {
        let tasks: Vec<Task<&'static str>> = vec![
            task(|token| {
                token.wait_timeout(Duration::from_secs(5));
                Ok("slow")
            }),
            task(|_| Ok("fast")),
        ];
        let started = Instant::now();
        let outcomes = TaskScheduler::new(SchedulerMode::Sequential)
            .with_timeout(Duration::from_millis(50))
            .run(tasks);
        assert_eq!(outcomes[0], TaskOutcome::TimedOut);
        assert_eq!(outcomes[1], TaskOutcome::Completed("fast"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn empty_run_returns_nothing() {
        let outcomes: Vec<TaskOutcome<()>> = TaskScheduler::new(SchedulerMode::FanOut).run(Vec::new());
        assert!(outcomes.is_empty());
    }
}
