use std::sync::Arc;
use thiserror::Error;

use crate::config::SessionConfig;
use crate::llm::{BackendError, ChatBackend, ChatRequest, Response};
use super::budget::select_window;
use super::context::AgentContext;
use super::conversation::{HistoryError, Message, MessageHistory};

/// セッションエラー
#[derive(Debug, Error)]
pub enum SessionError {
    /// バックエンド呼び出しの失敗（リトライしない）
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// シードと新しい入力だけで上限を超える
    #[error("message does not fit the token budget ({required} estimated tokens, limit {limit})")]
    BudgetExceeded { required: usize, limit: usize },
    #[error("session has already been bootstrapped")]
    AlreadyBootstrapped,
    #[error(transparent)]
    History(#[from] HistoryError),
}

/// 会話セッション
///
/// 履歴・バックエンド・設定を所有し、1回の送信ごとに履歴へ
/// user/assistantの組を確定する。送信に失敗した場合、履歴は変更されない。
pub struct ConversationSession {
    /// LLMバックエンド
    backend: Arc<dyn ChatBackend>,
    /// セッション設定
    config: SessionConfig,
    /// 会話履歴
    history: MessageHistory,
}

impl ConversationSession {
    pub fn new(config: SessionConfig, backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            config,
            history: MessageHistory::new(),
        }
    }

    /// ソースコードと検証器出力を注入してシードトランスクリプトを作成
    pub fn bootstrap(&mut self, source_code: &str, verifier_output: &str) -> Result<(), SessionError> {
        if !self.history.is_empty() {
            return Err(SessionError::AlreadyBootstrapped);
        }

        if self.config.system_messages.is_empty() {
            tracing::info!("Using default system messages");
        } else {
            tracing::info!(
                count = self.config.system_messages.len(),
                "Using system messages from config"
            );
        }

        let context = AgentContext::new(source_code, verifier_output);
        for message in context.seed_messages(&self.config.system_messages) {
            self.history.append(message)?;
        }
        Ok(())
    }

    /// ユーザー入力を送信し、応答を履歴に追加して返す
    pub async fn send_message(&mut self, user_text: &str) -> Result<Response, SessionError> {
        let pending = Message::user(user_text);
        let messages = select_window(
            self.history.seed(),
            self.history.exchanges(),
            &pending,
            self.config.max_tokens,
            self.config.completion_reserve,
        )
        .map_err(|over| SessionError::BudgetExceeded {
            required: over.required,
            limit: over.limit,
        })?;

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages,
            temperature: self.config.temperature,
        };

        let response = self.backend.chat_complete(&request).await?;

        self.history.append(pending)?;
        self.history.append(Message::assistant(response.content.clone()))?;
        tracing::debug!(
            history_len = self.history.len(),
            estimated_tokens = self.history.estimated_size(),
            "Conversation updated"
        );

        Ok(response)
    }

    pub fn history(&self) -> &MessageHistory {
        &self.history
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// 送信ウィンドウの上限
    pub fn max_tokens(&self) -> usize {
        self.config.max_tokens
    }
}
