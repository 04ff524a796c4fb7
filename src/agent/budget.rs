//! トークン予算管理
//!
//! 会話履歴の推定トークン数を計算し、モデルのコンテキスト上限に収まる
//! 送信ウィンドウを選択する。シードブロックは常に保持し、古いやり取りから
//! 送信対象外にする（履歴そのものは変更しない）。

use super::conversation::{Message, Role};

/// role分のオーバーヘッド
const MESSAGE_OVERHEAD: usize = 4;

/// モデル名から既知のコンテキスト上限を返す
pub fn model_max_tokens(model: &str) -> usize {
    match model {
        "gpt-4-32k" => 32768,
        "gpt-4" => 8192,
        "gpt-3.5-turbo-16k" => 16384,
        "gpt-3.5-turbo" => 4096,
        _ => 4096,
    }
}

/// トークン数推定器
///
/// 簡易推定: ASCIIは4文字=1トークン、非ASCIIは2文字=1トークン
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenEstimator;

impl TokenEstimator {
    pub fn new() -> Self {
        Self
    }

    /// テキストのトークン数を推定
    pub fn estimate_text(&self, text: &str) -> usize {
        let ascii_count = text.chars().filter(|c| c.is_ascii()).count();
        let non_ascii_count = text.chars().count() - ascii_count;

        (ascii_count / 4) + (non_ascii_count / 2) + 1
    }

    /// メッセージのトークン数を推定
    pub fn estimate_message(&self, message: &Message) -> usize {
        self.estimate_text(&message.content) + MESSAGE_OVERHEAD
    }

    pub fn estimate_messages(&self, messages: &[Message]) -> usize {
        messages.iter().map(|m| self.estimate_message(m)).sum()
    }
}

/// 予算超過
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverBudget {
    pub required: usize,
    pub limit: usize,
}

/// 送信ウィンドウを選択
///
/// `seed` + 収まる限り新しいやり取り + `pending` を返す。やり取りは
/// user/assistant の組単位で古い方から落とす。ウィンドウは `context` から
/// 応答用の `reserve` を差し引いた範囲に収める。`seed` と `pending` だけで
/// 収まらない場合はエラー。
pub fn select_window(
    seed: &[Message],
    exchanges: &[Message],
    pending: &Message,
    context: usize,
    reserve: usize,
) -> Result<Vec<Message>, OverBudget> {
    let limit = context.saturating_sub(reserve);
    let estimator = TokenEstimator::new();
    let fixed = estimator.estimate_messages(seed) + estimator.estimate_message(pending);
    if fixed > limit {
        return Err(OverBudget {
            required: fixed,
            limit,
        });
    }

    // 新しい方から組単位で積み上げる
    let mut used = fixed;
    let mut start = exchanges.len();
    while start > 0 {
        let mut candidate = start - 1;
        if exchanges[candidate].role == Role::Assistant && candidate > 0 {
            candidate -= 1;
        }
        let cost = estimator.estimate_messages(&exchanges[candidate..start]);
        if used + cost > limit {
            break;
        }
        used += cost;
        start = candidate;
    }

    let dropped = start;
    if dropped > 0 {
        tracing::info!(
            dropped,
            estimated_tokens = used,
            limit,
            reserve,
            "Older exchanges left out of the request to fit the token budget"
        );
    }

    let mut window = Vec::with_capacity(seed.len() + exchanges.len() - dropped + 1);
    window.extend_from_slice(seed);
    window.extend_from_slice(&exchanges[start..]);
    window.push(pending.clone());
    Ok(window)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(n: usize, size: usize) -> Vec<Message> {
        (0..n)
            .flat_map(|i| {
                vec![
                    Message::user(format!("{}{}", i, "q".repeat(size))),
                    Message::assistant(format!("{}{}", i, "a".repeat(size))),
                ]
            })
            .collect()
    }

    #[test]
    fn test_estimate_text() {
        let estimator = TokenEstimator::new();
        assert_eq!(estimator.estimate_text(""), 1);
        assert_eq!(estimator.estimate_text("abcdefgh"), 3);
        assert_eq!(estimator.estimate_text("検証結果"), 3);
    }

    #[test]
    fn test_estimate_is_deterministic() {
        let estimator = TokenEstimator::new();
        let msg = Message::user("same input every time");
        assert_eq!(estimator.estimate_message(&msg), estimator.estimate_message(&msg));
    }

    #[test]
    fn test_model_max_tokens() {
        assert_eq!(model_max_tokens("gpt-4"), 8192);
        assert_eq!(model_max_tokens("gpt-4-32k"), 32768);
        assert_eq!(model_max_tokens("gpt-3.5-turbo-16k"), 16384);
        assert_eq!(model_max_tokens("something-else"), 4096);
    }

    #[test]
    fn test_window_keeps_everything_when_it_fits() {
        let seed = vec![Message::system("persona")];
        let exchanges = exchange(3, 10);
        let pending = Message::user("next");

        let window = select_window(&seed, &exchanges, &pending, 10_000, 0).unwrap();
        assert_eq!(window.len(), 1 + 6 + 1);
        assert_eq!(window.last(), Some(&pending));
    }

    #[test]
    fn test_window_drops_oldest_pairs_first() {
        let seed = vec![Message::system("persona")];
        let exchanges = exchange(3, 400);
        let pending = Message::user("next");
        let estimator = TokenEstimator::new();
        let one_pair = estimator.estimate_messages(&exchanges[4..6]);
        let limit = estimator.estimate_messages(&seed) + estimator.estimate_message(&pending) + one_pair;

        let window = select_window(&seed, &exchanges, &pending, limit, 0).unwrap();
        assert_eq!(window.len(), 1 + 2 + 1);
        assert_eq!(window[0], seed[0]);
        assert_eq!(window[1], exchanges[4]);
        assert_eq!(window[2], exchanges[5]);
        assert_eq!(window[1].role, Role::User);
    }

    #[test]
    fn test_window_rejects_oversized_seed() {
        let seed = vec![Message::system("x".repeat(4000))];
        let pending = Message::user("hi");
        let err = select_window(&seed, &[], &pending, 100, 0).unwrap_err();
        assert_eq!(err.limit, 100);
        assert!(err.required > 100);
    }

    #[test]
    fn test_window_leaves_room_for_completion() {
        let seed = vec![Message::system("persona")];
        let exchanges = exchange(6, 200);
        let pending = Message::user("next");
        let estimator = TokenEstimator::new();
        let context = estimator.estimate_messages(&seed)
            + estimator.estimate_messages(&exchanges)
            + estimator.estimate_message(&pending);
        let reserve = 150;

        let window = select_window(&seed, &exchanges, &pending, context, reserve).unwrap();
        assert!(window.len() < 1 + exchanges.len() + 1);
        assert!(estimator.estimate_messages(&window) + reserve <= context);
        assert_eq!(window.last(), Some(&pending));
    }

    #[test]
    fn test_reserve_larger_than_context() {
        let seed = vec![Message::system("persona")];
        let pending = Message::user("hi");
        let err = select_window(&seed, &[], &pending, 256, 512).unwrap_err();
        assert_eq!(err.limit, 0);
    }
}
