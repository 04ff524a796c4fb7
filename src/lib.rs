//! esbmc-ai: ESBMC連携チャットツール
//!
//! ESBMCの検証結果をLLMとの会話に注入し、違反の内容を
//! 自然言語で対話的に解説するRust製CLIツール。

pub mod agent;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod verifier;

// 主要な型の再エクスポート
pub use agent::{ConversationSession, Message, MessageHistory, Role, SessionError};
pub use app::{Launch, RunOutcome};
pub use cli::{Command, Repl, RenderOptions, Spinner};
pub use config::{Config, Credentials, SessionConfig};
pub use error::AppError;
pub use llm::{BackendError, ChatBackend, OpenAiClient, Response};
pub use verifier::{VerifierOutcome, VerifierResult, VerifierRunner};

/// バージョン情報
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
