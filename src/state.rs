use crate::config::Config;
use crate::realtime::fanout::{EventBus, FanoutService};
use crate::realtime::SessionDirectory;
use crate::repository::{ConversationRepository, MessageRepository};
use crate::services::{ConversationService, MessageService};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub directory: SessionDirectory,
    pub fanout: Arc<FanoutService>,
    pub conversations: Arc<ConversationService>,
    pub messages: Arc<MessageService>,
}

impl AppState {
    /// Wires one process's messaging core: a fresh session directory, the
    /// fan-out service bound to the given bus, and the use-case services on
    /// top of the given repositories.
    pub fn new(
        config: Arc<Config>,
        conversation_repo: Arc<dyn ConversationRepository>,
        message_repo: Arc<dyn MessageRepository>,
        bus: Arc<dyn EventBus>,
    ) -> Self {
        let directory = SessionDirectory::new();
        let fanout = Arc::new(FanoutService::new(
            directory.clone(),
            bus,
            config.instance_name.clone(),
        ));
        let conversations = Arc::new(ConversationService::new(
            conversation_repo.clone(),
            fanout.clone(),
        ));
        let messages = Arc::new(MessageService::new(
            conversation_repo,
            message_repo,
            fanout.clone(),
            config.max_page_size,
        ));

        Self {
            config,
            directory,
            fanout,
            conversations,
            messages,
        }
    }
}
