use axum::extract::FromRef;

use crate::messages::MessageStore;
use crate::tasks::TasksLifespan;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedMessageStore = Arc<MessageStore>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub lifespan: TasksLifespan,
    pub messages: GuardedMessageStore,
}

impl ServerState {
    pub fn new(config: ServerConfig, lifespan: TasksLifespan) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            lifespan,
            messages: Arc::new(MessageStore::new()),
        }
    }
}

impl FromRef<ServerState> for GuardedMessageStore {
    fn from_ref(input: &ServerState) -> Self {
        input.messages.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for TasksLifespan {
    fn from_ref(input: &ServerState) -> Self {
        input.lifespan.clone()
    }
}
