//! 起動から対話終了までのセッションフロー
//!
//! 前提条件の確認 → ESBMC実行 → 終了コードで分岐 → シード注入 →
//! 初期プロンプト送信 → 対話ループ。

use anyhow::Context;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncBufRead;

use crate::agent::ConversationSession;
use crate::cli::{print_info, print_success, Repl};
use crate::config::{Config, Credentials};
use crate::error::AppError;
use crate::llm::ChatBackend;
use crate::verifier::{VerifierOutcome, VerifierRunner};

/// 検証対象と追加パラメータ
#[derive(Debug, Clone)]
pub struct Launch {
    pub filename: PathBuf,
    /// ESBMCへそのまま渡す引数
    pub extra_args: Vec<String>,
}

/// セッションの結末
pub enum RunOutcome {
    /// 検証成功（LLMは呼び出していない）
    Verified,
    /// 違反が検出され、対話を行った
    Conversed(ConversationSession),
}

/// 起動前提条件を確認し、APIキーと検証器ランナーを返す
///
/// 認証情報ファイル・APIキー・ESBMC実行ファイルのいずれかが欠けていれば
/// `AppError::Precondition`（終了コード3）。
pub fn preflight(config: &Config) -> Result<(String, VerifierRunner), AppError> {
    tracing::info!("Performing init health check...");
    let credentials = Credentials::load(&config.ai.credentials_file)?;
    let api_key = credentials.api_key()?;

    tracing::info!("Performing health check...");
    let runner = VerifierRunner::new(config.esbmc_path(), config.esbmc.params.clone());
    runner.ensure_available()?;

    Ok((api_key, runner))
}

/// 検証と対話を実行
pub async fn run_session<R, W>(
    config: &Config,
    runner: &VerifierRunner,
    backend: Arc<dyn ChatBackend>,
    launch: &Launch,
    input: &mut R,
    repl: &mut Repl<W>,
) -> Result<RunOutcome, AppError>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    tracing::info!("Reading source code...");
    let source_code = tokio::fs::read_to_string(&launch.filename)
        .await
        .with_context(|| format!("Failed to read source file: {}", launch.filename.display()))?;

    tracing::info!("Running ESBMC with {:?}", runner.default_params());
    let result = repl
        .busy(
            "ESBMC is processing... Please Wait",
            runner.run(&launch.filename, &launch.extra_args),
        )
        .await?;

    match result.outcome() {
        VerifierOutcome::Success => {
            print_success(repl.out(), "Success!").context("Failed to write output")?;
            writeln!(repl.out(), "{}", result.stdout).context("Failed to write output")?;
            return Ok(RunOutcome::Verified);
        }
        VerifierOutcome::ToolFailure(code) => {
            if !result.stderr.trim().is_empty() {
                tracing::error!("ESBMC stderr: {}", result.stderr.trim());
            }
            return Err(AppError::VerifierTool { code });
        }
        VerifierOutcome::DefectFound => {}
    }

    let session_config = config.session_config();
    let mut session = ConversationSession::new(session_config, backend);
    session.bootstrap(&source_code, &result.stdout)?;
    tracing::info!("Using AI Model: {}", session.model());

    if session.config().initial_prompt.is_some() {
        tracing::info!("Using initial prompt from config...");
    } else {
        tracing::info!("Using default initial prompts...");
    }
    let initial_prompt = session.config().initial_prompt().to_string();
    let response = repl
        .busy(
            "Model is parsing ESBMC output... Please Wait",
            session.send_message(&initial_prompt),
        )
        .await?;
    repl.render(&session, &response)?;

    print_info(repl.out(), "Type /help in order to view available commands.")
        .context("Failed to write output")?;
    repl.run(&mut session, input).await?;

    Ok(RunOutcome::Conversed(session))
}
