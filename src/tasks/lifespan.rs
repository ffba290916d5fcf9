use super::config::TaskConfig;
use super::error::InitializationError;
use super::group::TaskGroup;
use super::lifecycle::DeferredTasksPolicy;
use super::scheduler::TaskScheduler;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

#[derive(Debug)]
enum LifespanState {
    NotStarted,
    Running(TaskGroup),
    ShutDown,
}

/// Owns the process-wide [`TaskGroup`] and the default [`TaskConfig`].
///
/// Construct one at startup, [`start`](Self::start) it from within the
/// runtime, hand clones to the web layer and call
/// [`shutdown`](Self::shutdown) once the server has stopped accepting
/// requests.
#[derive(Debug, Clone)]
pub struct TasksLifespan {
    config: TaskConfig,
    policy: DeferredTasksPolicy,
    state: Arc<RwLock<LifespanState>>,
}

impl TasksLifespan {
    pub fn new(config: TaskConfig) -> Self {
        Self {
            config,
            policy: DeferredTasksPolicy::default(),
            state: Arc::new(RwLock::new(LifespanState::NotStarted)),
        }
    }

    pub fn with_deferred_policy(mut self, policy: DeferredTasksPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    pub fn deferred_policy(&self) -> DeferredTasksPolicy {
        self.policy
    }

    /// Create the task group. Calling it again while running returns the
    /// same group.
    pub fn start(&self) -> Result<TaskGroup, InitializationError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let group = match &*state {
            LifespanState::Running(group) => return Ok(group.clone()),
            LifespanState::ShutDown => return Err(InitializationError::ShutDown),
            LifespanState::NotStarted => TaskGroup::new()?,
        };
        info!("Task group started");
        *state = LifespanState::Running(group.clone());
        Ok(group)
    }

    pub fn group(&self) -> Result<TaskGroup, InitializationError> {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            LifespanState::Running(group) => Ok(group.clone()),
            LifespanState::NotStarted => Err(InitializationError::NotStarted),
            LifespanState::ShutDown => Err(InitializationError::ShutDown),
        }
    }

    /// A fresh scheduler for one request, bound to the running group.
    pub fn scheduler(&self) -> Result<TaskScheduler, InitializationError> {
        Ok(TaskScheduler::new(self.group()?, self.config.clone()))
    }

    /// Stop handing out schedulers, cancel non-shielded tasks and wait for
    /// every task to return.
    pub async fn shutdown(&self) {
        let previous = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *state, LifespanState::ShutDown)
        };

        match previous {
            LifespanState::Running(group) => group.shutdown().await,
            LifespanState::NotStarted => warn!("Tasks lifespan shut down before being started"),
            LifespanState::ShutDown => {}
        }
    }
}
