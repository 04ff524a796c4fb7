//! チャットバックエンドの境界
//!
//! バックエンドの応答はここで型付きの[`Response`]に検証され、
//! 内部コードが未型付けの構造を探ることはない。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::agent::conversation::{Message, Role};

/// バックエンドへのリクエスト
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
}

/// トークン使用量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// 生成終了理由
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// 正常終了
    Stop,
    /// トークン上限による打ち切り
    Length,
    ContentFilter,
    Other(String),
}

impl FinishReason {
    pub fn parse(value: &str) -> Self {
        match value {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            "content_filter" => FinishReason::ContentFilter,
            other => FinishReason::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::ContentFilter => "content_filter",
            FinishReason::Other(other) => other,
        }
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, FinishReason::Length)
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// バックエンドの応答
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub role: Role,
    pub content: String,
    pub usage: Option<Usage>,
    pub finish_reason: Option<FinishReason>,
    /// 受信したままのJSON（rawモード表示用）
    pub raw: serde_json::Value,
}

impl Response {
    pub fn total_tokens(&self) -> Option<u32> {
        self.usage.map(|u| u.total_tokens)
    }
}

/// バックエンドエラー
#[derive(Debug, Error)]
pub enum BackendError {
    /// 送信・受信に失敗
    #[error("request to chat backend failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// APIがエラーを返した
    #[error("chat backend returned an error ({status}): {message}")]
    Api { status: u16, message: String },
    /// 応答の形式が不正
    #[error("malformed response from chat backend: {0}")]
    MalformedResponse(String),
}

/// チャット補完バックエンド
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// 順序付きメッセージ列を送信し、応答を1件受け取る
    async fn chat_complete(&self, request: &ChatRequest) -> Result<Response, BackendError>;
}
