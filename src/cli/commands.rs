/// 対話ループのコマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 空行（何もしない）
    Empty,
    /// ヘルプ表示
    Help,
    /// 終了
    Exit,
    /// 通常のメッセージ（コマンドではない）
    Message(String),
}

impl Command {
    /// 入力行（改行除去済み）をコマンドにパース
    ///
    /// 行全体で完全一致させる。空白のみの行や未知の`/`付き入力は
    /// そのままメッセージとして扱う。
    pub fn parse(input: &str) -> Self {
        match input {
            "" => Command::Empty,
            "/help" => Command::Help,
            "/exit" => Command::Exit,
            _ => Command::Message(input.to_string()),
        }
    }

    /// 履歴に影響しないコマンドか
    pub fn is_local(&self) -> bool {
        !matches!(self, Command::Message(_))
    }
}

/// ヘルプテキスト
pub fn help_text() -> String {
    [
        "Commands:",
        "/help: Print this help message.",
        "/exit: Exit the program.",
    ]
    .join("\n")
}
