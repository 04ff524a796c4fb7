//! OpenAI互換チャットクライアント
//!
//! `/chat/completions` に会話全体を送信し、応答を[`Response`]に変換する。
//! リトライは行わない（失敗はそのまま呼び出し元へ返す）。

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::backend::{BackendError, ChatBackend, ChatRequest, FinishReason, Response, Usage};
use crate::agent::conversation::{Message, Role};
use crate::config::AiConfig;

#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
}

#[derive(Deserialize, Debug)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    usage: Option<Usage>,
}

#[derive(Deserialize, Debug)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CompletionMessage {
    role: Option<Role>,
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

impl OpenAiClient {
    fn build_client(connect_timeout_secs: u64, read_timeout_secs: u64) -> Client {
        Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .read_timeout(Duration::from_secs(read_timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new())
    }

    /// 基本的なクライアントを作成（デフォルトタイムアウト使用）
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self::with_timeout(base_url, api_key, 30, 300)
    }

    /// タイムアウト設定付きでクライアントを作成
    pub fn with_timeout(
        base_url: &str,
        api_key: &str,
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Self {
        Self {
            client: Self::build_client(connect_timeout_secs, read_timeout_secs),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// AiConfigからクライアントを作成
    pub fn from_config(config: &AiConfig, api_key: &str) -> Self {
        Self::with_timeout(
            &config.base_url,
            api_key,
            config.connect_timeout,
            config.read_timeout,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// 受信したJSONを型付きの応答に変換
fn parse_completion(raw: serde_json::Value) -> Result<Response, BackendError> {
    let parsed: CompletionResponse = serde_json::from_value(raw.clone())
        .map_err(|e| BackendError::MalformedResponse(e.to_string()))?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::MalformedResponse("response contains no choices".to_string()))?;
    let message = choice
        .message
        .ok_or_else(|| BackendError::MalformedResponse("choice contains no message".to_string()))?;

    Ok(Response {
        role: message.role.unwrap_or(Role::Assistant),
        content: message.content.unwrap_or_default(),
        usage: parsed.usage,
        finish_reason: choice.finish_reason.as_deref().map(FinishReason::parse),
        raw,
    })
}

/// エラー応答本文からメッセージを取り出す
fn api_error(status: u16, body: &str) -> BackendError {
    let message = match serde_json::from_str::<ApiError>(body) {
        Ok(error) => match error.error.error_type {
            Some(kind) => format!("{}: {}", kind, error.error.message),
            None => error.error.message,
        },
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().to_string(),
    };
    BackendError::Api { status, message }
}

#[async_trait]
impl ChatBackend for OpenAiClient {
    async fn chat_complete(&self, request: &ChatRequest) -> Result<Response, BackendError> {
        let body = CompletionRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
        };

        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            temperature = request.temperature,
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &text));
        }

        let raw: serde_json::Value = response.json().await?;
        parse_completion(raw)
    }
}
