//! アプリケーションレベルのエラーと終了コード

use thiserror::Error;

use crate::agent::core::SessionError;
use crate::verifier::VerifierError;

/// 起動前提条件エラーの終了コード
pub const EXIT_PRECONDITION: i32 = 3;
/// ツール・バックエンド失敗の終了コード
pub const EXIT_FAILURE: i32 = 1;

#[derive(Debug, Error)]
pub enum AppError {
    /// 認証情報ファイルや検証器が見つからない
    #[error("{0}")]
    Precondition(String),
    /// 検証器が0/1以外で終了した
    #[error("ESBMC exit code: {code}")]
    VerifierTool { code: i32 },
    #[error(transparent)]
    Verifier(#[from] VerifierError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// プロセスの終了コード
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Precondition(_) => EXIT_PRECONDITION,
            AppError::Verifier(VerifierError::NotFound(_)) => EXIT_PRECONDITION,
            _ => EXIT_FAILURE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_exit_codes() {
        assert_eq!(AppError::Precondition("missing".into()).exit_code(), 3);
        assert_eq!(
            AppError::Verifier(VerifierError::NotFound(PathBuf::from("/nope/esbmc"))).exit_code(),
            3
        );
        assert_eq!(AppError::VerifierTool { code: 6 }.exit_code(), 1);
        assert_eq!(AppError::Other(anyhow::anyhow!("io")).exit_code(), 1);
    }

    #[test]
    fn test_verifier_tool_message() {
        assert_eq!(AppError::VerifierTool { code: 6 }.to_string(), "ESBMC exit code: 6");
    }
}
