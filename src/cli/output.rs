//! 色付き出力モジュール
//!
//! CLIの出力を色分けして表示するためのユーティリティ関数と、
//! バックエンド応答の表示を提供する

use std::io::{self, Write};
use crossterm::{
    execute,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
};

use crate::llm::Response;

/// 応答の表示オプション
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// トークン使用量と終了理由を表示
    pub verbose: bool,
    /// 受信したJSONをそのまま表示
    pub raw: bool,
}

/// エラーメッセージを赤色で出力
pub fn print_error<W: Write>(out: &mut W, msg: &str) -> io::Result<()> {
    execute!(
        out,
        SetForegroundColor(Color::Red),
        Print(format!("Error: {}\n", msg)),
        ResetColor
    )
}

/// 成功メッセージを緑色で出力
pub fn print_success<W: Write>(out: &mut W, msg: &str) -> io::Result<()> {
    execute!(
        out,
        SetForegroundColor(Color::Green),
        Print(format!("{}\n", msg)),
        ResetColor
    )
}

/// 情報メッセージを青色で出力
pub fn print_info<W: Write>(out: &mut W, msg: &str) -> io::Result<()> {
    execute!(
        out,
        SetForegroundColor(Color::Blue),
        Print(format!("{}\n", msg)),
        ResetColor
    )
}

/// 起動時のバナーを表示
pub fn print_banner<W: Write>(out: &mut W) -> io::Result<()> {
    execute!(
        out,
        SetForegroundColor(Color::Cyan),
        SetAttribute(Attribute::Bold),
        Print("ESBMC-AI\n\n"),
        SetAttribute(Attribute::Reset),
        ResetColor
    )
}

/// 統計行を生成
pub fn format_stats(response: &Response, max_tokens: usize) -> String {
    let total = response
        .total_tokens()
        .map(|t| t.to_string())
        .unwrap_or_else(|| "n/a".to_string());
    let finish = response
        .finish_reason
        .as_ref()
        .map(|r| r.to_string())
        .unwrap_or_else(|| "n/a".to_string());
    format!(
        "stats: total tokens: {}, max tokens: {} finish reason: {}",
        total, max_tokens, finish
    )
}

/// 応答を表示
///
/// rawモードでは受信したJSONのみ、それ以外は`role: content`形式。
pub fn render_response<W: Write>(
    out: &mut W,
    response: &Response,
    options: RenderOptions,
    max_tokens: usize,
) -> io::Result<()> {
    if options.raw {
        let raw = serde_json::to_string_pretty(&response.raw)
            .unwrap_or_else(|_| response.raw.to_string());
        writeln!(out, "{}", raw)?;
        return out.flush();
    }

    if options.verbose {
        writeln!(out, "{}\n", format_stats(response, max_tokens))?;
    }

    execute!(
        out,
        SetForegroundColor(Color::Green),
        SetAttribute(Attribute::Bold),
        Print(format!("{}:", response.role)),
        SetAttribute(Attribute::Reset),
        ResetColor,
        Print(format!(" {}\n\n", response.content))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Role;
    use crate::llm::{FinishReason, Usage};

    fn response() -> Response {
        Response {
            role: Role::Assistant,
            content: "The array index is out of bounds.".to_string(),
            usage: Some(Usage {
                prompt_tokens: 900,
                completion_tokens: 100,
                total_tokens: 1000,
            }),
            finish_reason: Some(FinishReason::Stop),
            raw: serde_json::json!({"id": "chatcmpl-42"}),
        }
    }

    fn render(options: RenderOptions) -> String {
        let mut out = Vec::new();
        render_response(&mut out, &response(), options, 4096).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_format_stats() {
        assert_eq!(
            format_stats(&response(), 4096),
            "stats: total tokens: 1000, max tokens: 4096 finish reason: stop"
        );

        let mut bare = response();
        bare.usage = None;
        bare.finish_reason = None;
        assert!(format_stats(&bare, 8192).contains("total tokens: n/a"));
    }

    #[test]
    fn test_render_role_prefixed() {
        let text = render(RenderOptions::default());
        assert!(text.contains("assistant:"));
        assert!(text.contains(" The array index is out of bounds.\n\n"));
        assert!(!text.contains("stats:"));
    }

    #[test]
    fn test_render_verbose() {
        let text = render(RenderOptions { verbose: true, raw: false });
        assert!(text.starts_with("stats: total tokens: 1000"));
        assert!(text.contains("assistant:"));
    }

    #[test]
    fn test_render_raw() {
        let text = render(RenderOptions { verbose: true, raw: true });
        assert!(text.contains("\"id\": \"chatcmpl-42\""));
        assert!(!text.contains("assistant:"));
        assert!(!text.contains("stats:"));
    }

    #[test]
    fn test_print_helpers() {
        let mut out = Vec::new();
        print_error(&mut out, "boom").unwrap();
        print_success(&mut out, "Success!").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Error: boom"));
        assert!(text.contains("Success!"));
    }
}
