pub mod budget;
pub mod context;
pub mod conversation;
pub mod core;

pub use budget::{model_max_tokens, select_window, TokenEstimator};
pub use context::{AgentContext, DEFAULT_PROMPT, SYSTEM_MSG_DEFAULT};
pub use conversation::{HistoryError, Message, MessageHistory, Role};
pub use self::core::{ConversationSession, SessionError};
