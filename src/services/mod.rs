pub mod conversation_service;
pub mod message_service;
pub mod validation;

pub use conversation_service::ConversationService;
pub use message_service::MessageService;
