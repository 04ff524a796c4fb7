use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::budget::TokenEstimator;

/// 会話のロール
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 会話メッセージ（追加後は不変）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// 履歴操作のエラー（呼び出し側のバグを示す）
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("{role} message cannot follow {}", previous_label(.previous))]
    RoleSequence { previous: Option<Role>, role: Role },
}

fn previous_label(previous: &Option<Role>) -> &'static str {
    previous.map(|r| r.as_str()).unwrap_or("an empty history")
}

/// 会話履歴
///
/// 追加専用の台帳。先頭のシードブロック（system と "OK" 応答の組）の後は
/// user → assistant の順で交互に並ぶ。削除・要約は行わない。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageHistory {
    messages: Vec<Message>,
    /// 最初のuserメッセージの位置（未到達ならNone）
    first_user: Option<usize>,
}

impl MessageHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// メッセージを追加
    ///
    /// ロール順序の違反のみ拒否する。内容は検査しない。
    pub fn append(&mut self, message: Message) -> Result<(), HistoryError> {
        let previous = self.messages.last().map(|m| m.role);
        let started = self.first_user.is_some();

        let allowed = match (previous, message.role) {
            (None, Role::System) | (None, Role::User) => true,
            (Some(Role::System), Role::System) => !started,
            (Some(Role::System), Role::Assistant) => !started,
            (Some(Role::System), Role::User) => true,
            (Some(Role::Assistant), Role::System) => !started,
            (Some(Role::Assistant), Role::User) => true,
            (Some(Role::User), Role::Assistant) => true,
            _ => false,
        };

        if !allowed {
            return Err(HistoryError::RoleSequence {
                previous,
                role: message.role,
            });
        }

        if message.role == Role::User && self.first_user.is_none() {
            self.first_user = Some(self.messages.len());
        }
        self.messages.push(message);
        Ok(())
    }

    /// 全メッセージを順序通りに取得
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// シードブロック（最初のuserメッセージより前）
    pub fn seed(&self) -> &[Message] {
        &self.messages[..self.seed_len()]
    }

    /// シードブロック後のuser/assistantのやり取り
    pub fn exchanges(&self) -> &[Message] {
        &self.messages[self.seed_len()..]
    }

    pub fn seed_len(&self) -> usize {
        self.first_user.unwrap_or(self.messages.len())
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// 推定トークン数を取得
    pub fn estimated_size(&self) -> usize {
        TokenEstimator::new().estimate_messages(&self.messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MessageHistory {
        let mut history = MessageHistory::new();
        history.append(Message::system("persona")).unwrap();
        history.append(Message::system("source")).unwrap();
        history.append(Message::assistant("OK")).unwrap();
        history.append(Message::system("output")).unwrap();
        history.append(Message::assistant("OK")).unwrap();
        history
    }

    #[test]
    fn test_seed_block() {
        let history = seeded();
        assert_eq!(history.len(), 5);
        assert_eq!(history.seed_len(), 5);
        assert!(history.exchanges().is_empty());
    }

    #[test]
    fn test_alternation_after_seed() {
        let mut history = seeded();
        history.append(Message::user("why?")).unwrap();
        history.append(Message::assistant("because")).unwrap();
        history.append(Message::user("and?")).unwrap();

        assert_eq!(history.seed_len(), 5);
        assert_eq!(history.exchanges().len(), 3);
        assert_eq!(history.messages()[5].role, Role::User);
    }

    #[test]
    fn test_rejects_consecutive_users() {
        let mut history = seeded();
        history.append(Message::user("one")).unwrap();
        let err = history.append(Message::user("two")).unwrap_err();
        assert_eq!(
            err,
            HistoryError::RoleSequence {
                previous: Some(Role::User),
                role: Role::User
            }
        );
        assert_eq!(history.len(), 6);
    }

    #[test]
    fn test_rejects_consecutive_assistants() {
        let mut history = seeded();
        assert!(history.append(Message::assistant("again")).is_err());
    }

    #[test]
    fn test_rejects_system_after_conversation_started() {
        let mut history = seeded();
        history.append(Message::user("hi")).unwrap();
        history.append(Message::assistant("hello")).unwrap();
        assert!(history.append(Message::system("late")).is_err());
    }

    #[test]
    fn test_rejects_assistant_first() {
        let mut history = MessageHistory::new();
        let err = history.append(Message::assistant("OK")).unwrap_err();
        assert_eq!(err.to_string(), "assistant message cannot follow an empty history");
    }

    #[test]
    fn test_estimated_size_grows() {
        let mut history = seeded();
        let before = history.estimated_size();
        history.append(Message::user("x".repeat(400))).unwrap();
        let after = history.estimated_size();
        assert!(after >= before + 100);
    }
}
