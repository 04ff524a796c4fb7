//! ESBMC実行エンジン
//!
//! 検証器を子プロセスとして起動し、終了コードと出力を取得する。
//! 終了コードの意味は検証器側の契約: 0=欠陥なし、1=違反を検出、それ以外=検証器の異常終了。

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// 検証器の起動に関するエラー
#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("ESBMC could not be found in {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to run ESBMC ({}): {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 終了コードの分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifierOutcome {
    /// 検証成功（欠陥なし）
    Success,
    /// 検証完了、違反を検出
    DefectFound,
    /// 検証器自体の失敗（シグナル終了は-1）
    ToolFailure(i32),
}

impl VerifierOutcome {
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            0 => VerifierOutcome::Success,
            1 => VerifierOutcome::DefectFound,
            other => VerifierOutcome::ToolFailure(other),
        }
    }
}

/// 検証結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierResult {
    pub exit_code: i32,
    /// 出力（stdout）
    pub stdout: String,
    /// エラー出力（stderr）
    pub stderr: String,
}

impl VerifierResult {
    pub fn outcome(&self) -> VerifierOutcome {
        VerifierOutcome::from_exit_code(self.exit_code)
    }
}

/// エスケープされた改行（`\` + `n`）を実際の改行に変換
pub fn normalize_output(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).replace("\\n", "\n")
}

/// 検証器ランナー
#[derive(Debug, Clone)]
pub struct VerifierRunner {
    path: PathBuf,
    default_params: Vec<String>,
}

impl VerifierRunner {
    pub fn new(path: impl Into<PathBuf>, default_params: Vec<String>) -> Self {
        Self {
            path: path.into(),
            default_params,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn default_params(&self) -> &[String] {
        &self.default_params
    }

    /// 実行ファイルが存在するか確認
    ///
    /// パス区切りを含まない名前は`PATH`から探す。
    pub fn ensure_available(&self) -> Result<(), VerifierError> {
        if self.locate().is_some() {
            tracing::info!("ESBMC has been located");
            Ok(())
        } else {
            Err(VerifierError::NotFound(self.path.clone()))
        }
    }

    fn locate(&self) -> Option<PathBuf> {
        if self.path.exists() {
            return Some(self.path.clone());
        }
        if self.path.components().count() != 1 {
            return None;
        }
        let search = std::env::var_os("PATH")?;
        std::env::split_paths(&search)
            .map(|dir| dir.join(&self.path))
            .find(|candidate| candidate.is_file())
    }

    /// 引数列を構築: デフォルトパラメータ、追加パラメータ、対象ファイルの順
    pub fn build_args(&self, file: &Path, extra_args: &[String]) -> Vec<OsString> {
        self.default_params
            .iter()
            .chain(extra_args.iter())
            .map(OsString::from)
            .chain(std::iter::once(file.as_os_str().to_os_string()))
            .collect()
    }

    /// 検証器を実行して終了まで待機
    pub async fn run(&self, file: &Path, extra_args: &[String]) -> Result<VerifierResult, VerifierError> {
        let args = self.build_args(file, extra_args);
        tracing::info!("Running ESBMC: {} {:?}", self.path.display(), args);

        let spawn_error = |source: std::io::Error| VerifierError::Spawn {
            path: self.path.clone(),
            source,
        };

        let mut child = Command::new(&self.path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut out = child.stdout.take();
        let mut err = child.stderr.take();

        // パイプが詰まらないよう両方を同時に読む
        let read_out = async {
            match out.as_mut() {
                Some(pipe) => pipe.read_to_end(&mut stdout).await.map(|_| ()),
                None => Ok(()),
            }
        };
        let read_err = async {
            match err.as_mut() {
                Some(pipe) => pipe.read_to_end(&mut stderr).await.map(|_| ()),
                None => Ok(()),
            }
        };
        let (out_result, err_result) = tokio::join!(read_out, read_err);
        out_result.map_err(spawn_error)?;
        err_result.map_err(spawn_error)?;

        let status = child.wait().await.map_err(spawn_error)?;
        let exit_code = status.code().unwrap_or(-1);
        tracing::info!(exit_code, "ESBMC finished");

        Ok(VerifierResult {
            exit_code,
            stdout: normalize_output(&stdout),
            stderr: normalize_output(&stderr),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_classification() {
        assert_eq!(VerifierOutcome::from_exit_code(0), VerifierOutcome::Success);
        assert_eq!(VerifierOutcome::from_exit_code(1), VerifierOutcome::DefectFound);
        assert_eq!(VerifierOutcome::from_exit_code(2), VerifierOutcome::ToolFailure(2));
        assert_eq!(VerifierOutcome::from_exit_code(-1), VerifierOutcome::ToolFailure(-1));
    }

    #[test]
    fn test_normalize_output() {
        assert_eq!(normalize_output(b"line one\\nline two"), "line one\nline two");
        assert_eq!(normalize_output(b"already\nsplit"), "already\nsplit");
    }

    #[test]
    fn test_build_args_order() {
        let runner = VerifierRunner::new("esbmc", vec!["--unwind".into(), "5".into()]);
        let args = runner.build_args(Path::new("main.c"), &["--no-bounds-check".to_string()]);
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, vec!["--unwind", "5", "--no-bounds-check", "main.c"]);
    }

    #[test]
    fn test_ensure_available_missing() {
        let runner = VerifierRunner::new("/definitely/not/here/esbmc", Vec::new());
        let err = runner.ensure_available().unwrap_err();
        assert!(matches!(err, VerifierError::NotFound(_)));
        assert_eq!(err.to_string(), "ESBMC could not be found in /definitely/not/here/esbmc");
    }

    #[cfg(unix)]
    fn script(body: &str) -> VerifierRunner {
        // `sh -c <body> <file>`: 対象ファイルは$0として渡る
        VerifierRunner::new("sh", vec!["-c".to_string(), body.to_string()])
    }

    #[cfg(unix)]
    #[test]
    fn test_ensure_available_on_path() {
        assert!(script("exit 0").ensure_available().is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_success() {
        let runner = script("echo 'VERIFICATION SUCCESSFUL'; exit 0");
        let result = runner.run(Path::new("main.c"), &[]).await.unwrap();
        assert_eq!(result.outcome(), VerifierOutcome::Success);
        assert_eq!(result.stdout.trim(), "VERIFICATION SUCCESSFUL");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_defect_found() {
        let runner = script("printf 'Violated property:\\\\nassertion'; echo 'on stderr' >&2; exit 1");
        let result = runner.run(Path::new("main.c"), &[]).await.unwrap();
        assert_eq!(result.outcome(), VerifierOutcome::DefectFound);
        assert_eq!(result.stdout, "Violated property:\nassertion");
        assert_eq!(result.stderr.trim(), "on stderr");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_failure() {
        let runner = script("exit 2");
        let result = runner.run(Path::new("main.c"), &[]).await.unwrap();
        assert_eq!(result.outcome(), VerifierOutcome::ToolFailure(2));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_passes_file_last() {
        let runner = script("echo \"$0 $1\"");
        let result = runner
            .run(Path::new("target.c"), &["--extra".to_string()])
            .await
            .unwrap();
        // sh -c は最初の引数を$0に割り当てる
        assert_eq!(result.stdout.trim(), "--extra target.c");
    }

    #[tokio::test]
    async fn test_run_missing_binary() {
        let runner = VerifierRunner::new("/definitely/not/here/esbmc", Vec::new());
        let err = runner.run(Path::new("main.c"), &[]).await.unwrap_err();
        assert!(matches!(err, VerifierError::Spawn { .. }));
    }
}
