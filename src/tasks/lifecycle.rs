use super::error::LifecycleError;
use super::scheduler::TaskScheduler;
use serde::Deserialize;
use tracing::{debug, warn};

/// What to do with the deferred batches when the handler failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DeferredTasksPolicy {
    /// Start deferred tasks regardless of how the handler ended.
    #[default]
    Release,
    /// Drop the deferred tasks of a request that ended in a server error.
    DiscardOnServerError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Active,
    RouteCompleted,
    ResponseSent,
    Done,
}

/// Drives one request's scheduler through its checkpoints.
///
/// `Active → RouteCompleted → ResponseSent → Done`; each transition happens
/// exactly once and none can be skipped.
#[derive(Debug)]
pub struct RequestLifecycle {
    scheduler: TaskScheduler,
    policy: DeferredTasksPolicy,
    state: LifecycleState,
}

impl RequestLifecycle {
    pub fn new(scheduler: TaskScheduler, policy: DeferredTasksPolicy) -> Self {
        Self {
            scheduler,
            policy,
            state: LifecycleState::Active,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    fn advance(&mut self, from: LifecycleState, to: LifecycleState) -> Result<(), LifecycleError> {
        if self.state != from {
            return Err(LifecycleError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    /// The handler has returned: release `after_route`.
    ///
    /// Returns how many tasks were started.
    pub fn route_completed(&mut self, outcome: RouteOutcome) -> Result<usize, LifecycleError> {
        self.advance(LifecycleState::Active, LifecycleState::RouteCompleted)?;

        if outcome == RouteOutcome::Failed
            && self.policy == DeferredTasksPolicy::DiscardOnServerError
        {
            warn!("Handler failed, discarding deferred tasks");
            self.scheduler.after_route().discard();
            self.scheduler.after_response().discard();
            return Ok(0);
        }

        let group = self.scheduler.group();
        Ok(self.scheduler.after_route().release(group))
    }

    /// The response has been handed to the transport: release `after_response`.
    pub fn response_sent(&mut self) -> Result<usize, LifecycleError> {
        self.advance(LifecycleState::RouteCompleted, LifecycleState::ResponseSent)?;

        let group = self.scheduler.group();
        Ok(self.scheduler.after_response().release(group))
    }

    pub fn finish(&mut self) -> Result<(), LifecycleError> {
        self.advance(LifecycleState::ResponseSent, LifecycleState::Done)?;
        debug!("Request lifecycle done");
        Ok(())
    }
}
