//! Bounded, cancellable polling of a stack until it reaches a terminal state.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace};

use crate::application::{
    ApplicationError,
    ports::{CloudApi, CloudError, ProgressSink},
};
use crate::domain::StackPhase;

/// How often and how long to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl PollPolicy {
    pub const DEFAULT_ATTEMPTS: u32 = 120;
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Total wall-clock budget.
    pub fn bound(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ATTEMPTS, Self::DEFAULT_INTERVAL)
    }
}

/// A stack that reached a `_COMPLETE` status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOutcome {
    pub stack: String,
    pub status: String,
    /// Polls performed, counting the one that saw the terminal status.
    pub iterations: u32,
    pub events_forwarded: usize,
}

pub struct StackWaiter {
    cloud: Arc<dyn CloudApi>,
    policy: PollPolicy,
}

impl StackWaiter {
    pub fn new(cloud: Arc<dyn CloudApi>, policy: PollPolicy) -> Self {
        Self { cloud, policy }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Poll `stack` until its status ends in `_COMPLETE` or `_FAILED`.
    ///
    /// Each iteration forwards the events not seen before, in arrival order,
    /// then checks the status. An error from either call ends the wait at
    /// once. `cancel` is checked before every iteration and raced against
    /// every call and every sleep.
    pub async fn wait(
        &self,
        stack: &str,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<DeployOutcome, ApplicationError> {
        self.wait_after(stack, HashSet::new(), sink, cancel).await
    }

    /// Like [`Self::wait`], but events whose ids are in `history` are
    /// treated as already forwarded.
    #[instrument(skip(self, history, sink, cancel), fields(attempts = self.policy.max_attempts))]
    pub async fn wait_after(
        &self,
        stack: &str,
        history: HashSet<String>,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<DeployOutcome, ApplicationError> {
        let mut seen = history;
        let mut forwarded = 0usize;

        for iteration in 1..=self.policy.max_attempts {
            if cancel.is_cancelled() {
                return Err(cancelled(stack));
            }
            trace!(iteration, "polling stack");

            let events = race(stack, cancel, self.cloud.describe_stack_events(stack)).await?;
            for event in events {
                if seen.insert(event.id.clone()) {
                    sink.on_event(&event);
                    forwarded += 1;
                }
            }

            let status = race(stack, cancel, self.cloud.stack_status(stack)).await?;
            match StackPhase::of(&status) {
                StackPhase::Complete => {
                    info!(%status, iteration, "stack reached terminal state");
                    return Ok(DeployOutcome {
                        stack: stack.to_string(),
                        status,
                        iterations: iteration,
                        events_forwarded: forwarded,
                    });
                }
                StackPhase::Failed => {
                    return Err(ApplicationError::StackFailed {
                        stack: stack.to_string(),
                        status,
                    });
                }
                StackPhase::InProgress => debug!(%status, iteration, "stack still in progress"),
            }

            if iteration < self.policy.max_attempts {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(cancelled(stack)),
                    _ = tokio::time::sleep(self.policy.interval) => {}
                }
            }
        }

        Err(ApplicationError::TimedOut {
            stack: stack.to_string(),
            attempts: self.policy.max_attempts,
            bound: self.policy.bound(),
        })
    }
}

fn cancelled(stack: &str) -> ApplicationError {
    ApplicationError::Cancelled {
        stack: stack.to_string(),
    }
}

/// Run a platform call unless `cancel` fires first.
pub(crate) async fn race<T>(
    stack: &str,
    cancel: &CancellationToken,
    call: impl Future<Output = Result<T, CloudError>>,
) -> Result<T, ApplicationError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(cancelled(stack)),
        result = call => result.map_err(ApplicationError::from),
    }
}
