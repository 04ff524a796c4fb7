use super::conversation::Message;

/// デフォルトのシステムメッセージ（ペルソナ）
pub const SYSTEM_MSG_DEFAULT: &str = "You are a security focused assistant that parses the output of \
ESBMC, a formal verification tool for C programs. ESBMC reports violated properties together with a \
counterexample trace. Explain the output to the user in plain language, refer to the relevant parts of \
the source code, and suggest how the reported issue can be fixed. Do not invent results that ESBMC did \
not report.";

/// 最初の問い合わせに使うデフォルトプロンプト
pub const DEFAULT_PROMPT: &str = "Walk me through the source code, while also explaining the output of \
ESBMC at the relevant parts. You shall not start the reply with an acknowledgement message such as \
'Certainly'.";

/// 注入メッセージへの応答
pub const ACKNOWLEDGEMENT: &str = "OK";

/// 検証コンテキスト（ソースコードと検証器出力）
///
/// 会話の先頭に注入するシードトランスクリプトを組み立てる。
/// ソースコードを検証器出力より先に置く（初期プロンプトが両方を参照するため）。
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub source_code: String,
    pub verifier_output: String,
}

impl AgentContext {
    pub fn new(source_code: impl Into<String>, verifier_output: impl Into<String>) -> Self {
        Self {
            source_code: source_code.into(),
            verifier_output: verifier_output.into(),
        }
    }

    /// シードトランスクリプトを生成
    ///
    /// `system_messages` が空ならデフォルトのペルソナを使用する。
    pub fn seed_messages(&self, system_messages: &[String]) -> Vec<Message> {
        let mut messages: Vec<Message> = if system_messages.is_empty() {
            vec![Message::system(SYSTEM_MSG_DEFAULT)]
        } else {
            system_messages.iter().map(Message::system).collect()
        };

        messages.push(Message::system(format!(
            "Reply OK if you understand that the following text is the program source code: {}",
            self.source_code
        )));
        messages.push(Message::assistant(ACKNOWLEDGEMENT));
        messages.push(Message::system(format!(
            "Reply OK if you understand that the following text is the output from ESBMC after reading the program source code: {}",
            self.verifier_output
        )));
        messages.push(Message::assistant(ACKNOWLEDGEMENT));

        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::conversation::Role;

    #[test]
    fn test_default_seed_order() {
        let context = AgentContext::new("int main() {}", "VERIFICATION FAILED");
        let seed = context.seed_messages(&[]);

        assert_eq!(seed.len(), 5);
        assert_eq!(seed[0].content, SYSTEM_MSG_DEFAULT);
        assert!(seed[1].content.ends_with("program source code: int main() {}"));
        assert_eq!(seed[2], Message::assistant("OK"));
        assert!(seed[3].content.ends_with("VERIFICATION FAILED"));
        assert_eq!(seed[4].role, Role::Assistant);
    }

    #[test]
    fn test_override_system_messages() {
        let context = AgentContext::new("src", "out");
        let overrides = vec!["first".to_string(), "second".to_string()];
        let seed = context.seed_messages(&overrides);

        assert_eq!(seed.len(), 6);
        assert_eq!(seed[0], Message::system("first"));
        assert_eq!(seed[1], Message::system("second"));
        assert!(!seed.iter().any(|m| m.content == SYSTEM_MSG_DEFAULT));
    }

    #[test]
    fn test_seed_is_deterministic() {
        let a = AgentContext::new("code", "output").seed_messages(&[]);
        let b = AgentContext::new("code", "output").seed_messages(&[]);
        assert_eq!(a, b);
    }
}
