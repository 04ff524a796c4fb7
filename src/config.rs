//! 設定ファイル管理モジュール
//!
//! default.tomlから設定を読み込み、アプリケーション全体で使用できる
//! 型安全な設定構造体を提供します。認証情報は別の`.env`ファイルから読み込む。

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::agent::budget::model_max_tokens;
use crate::agent::context::DEFAULT_PROMPT;
use crate::error::AppError;

/// APIキーの環境変数名
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// アプリケーション全体の設定
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// ESBMC関連設定
    #[serde(default)]
    pub esbmc: EsbmcConfig,
    /// AIバックエンド関連設定
    #[serde(default)]
    pub ai: AiConfig,
    /// チャットプロンプト設定
    #[serde(default)]
    pub chat: ChatConfig,
    /// 出力設定
    #[serde(default)]
    pub output: OutputConfig,
}

/// ESBMC実行設定
#[derive(Debug, Clone, Deserialize)]
pub struct EsbmcConfig {
    /// ESBMC実行ファイルのパス（`~/`展開あり）
    #[serde(default = "default_esbmc_path")]
    pub path: String,
    /// 常に渡すパラメータ
    #[serde(default = "default_esbmc_params")]
    pub params: Vec<String>,
}

/// AIバックエンド設定
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    /// 使用するモデル名
    #[serde(default = "default_model")]
    pub model: String,
    /// サンプリング温度
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// APIのベースURL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 接続タイムアウト（秒）
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    /// 読み取りタイムアウト（秒）
    #[serde(default = "default_read_timeout")]
    pub read_timeout: u64,
    /// コンテキスト上限（未指定の場合はモデル名から決定）
    #[serde(default)]
    pub max_tokens: Option<usize>,
    /// 応答用に空けておくトークン数
    #[serde(default = "default_completion_reserve")]
    pub completion_reserve: usize,
    /// 認証情報ファイル
    #[serde(default = "default_credentials_file")]
    pub credentials_file: PathBuf,
}

/// チャットプロンプト設定
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatConfig {
    /// デフォルトのペルソナを置き換えるシステムメッセージ
    #[serde(default)]
    pub system_messages: Vec<String>,
    /// 最初に送信するプロンプト
    #[serde(default)]
    pub initial_prompt: Option<String>,
}

/// 出力設定
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub verbose: bool,
    /// 応答をそのまま表示する
    #[serde(default)]
    pub raw_responses: bool,
}

// デフォルト値を返す関数群
fn default_esbmc_path() -> String {
    "~/.local/bin/esbmc".to_string()
}

fn default_esbmc_params() -> Vec<String> {
    [
        "--interval-analysis",
        "--goto-unwind",
        "--unlimited-goto-unwind",
        "--k-induction",
        "--state-hashing",
        "--add-symex-value-sets",
        "--k-step",
        "2",
        "--floatbv",
        "--unlimited-k-steps",
        "--memory-leak-check",
        "--context-bound",
        "2",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_temperature() -> f32 {
    1.0
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_read_timeout() -> u64 {
    300
}

fn default_completion_reserve() -> usize {
    512
}

fn default_credentials_file() -> PathBuf {
    PathBuf::from(".env")
}

impl Default for EsbmcConfig {
    fn default() -> Self {
        Self {
            path: default_esbmc_path(),
            params: default_esbmc_params(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            base_url: default_base_url(),
            connect_timeout: default_connect_timeout(),
            read_timeout: default_read_timeout(),
            max_tokens: None,
            completion_reserve: default_completion_reserve(),
            credentials_file: default_credentials_file(),
        }
    }
}

/// `~/`で始まるパスをホームディレクトリに展開
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

impl Config {
    /// TOMLファイルから設定を読み込む
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// TOML文字列から設定をパース
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML config")
    }

    /// デフォルト設定ファイルパスを取得
    pub fn default_config_path() -> PathBuf {
        if let Ok(config_path) = std::env::var("ESBMC_AI_CONFIG") {
            return PathBuf::from(config_path);
        }

        // カレントディレクトリのconfig/default.toml
        let cwd_config = PathBuf::from("config/default.toml");
        if cwd_config.exists() {
            return cwd_config;
        }

        // ホームディレクトリの.esbmc-ai/config.toml
        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".esbmc-ai").join("config.toml");
            if home_config.exists() {
                return home_config;
            }
        }

        cwd_config
    }

    /// デフォルト設定ファイルから読み込み（存在しない場合は自動生成）
    pub fn load_default() -> Result<Self> {
        let config_path = Self::default_config_path();

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            if let Err(e) = Self::create_default_config(&config_path) {
                tracing::warn!("Failed to create default config: {}", e);
            } else {
                tracing::info!("Created default config at {}", config_path.display());
            }
            Ok(Self::default())
        }
    }

    /// デフォルト設定ファイルを生成
    fn create_default_config(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let default_content = r#"# esbmc-ai default configuration

[esbmc]
path = "~/.local/bin/esbmc"
params = [
    "--interval-analysis", "--goto-unwind", "--unlimited-goto-unwind",
    "--k-induction", "--state-hashing", "--add-symex-value-sets",
    "--k-step", "2", "--floatbv", "--unlimited-k-steps",
    "--memory-leak-check", "--context-bound", "2",
]

[ai]
model = "gpt-3.5-turbo"
temperature = 1.0
base_url = "https://api.openai.com/v1"
connect_timeout = 30   # seconds
read_timeout = 300     # seconds
credentials_file = ".env"
# max_tokens = 4096
completion_reserve = 512

[chat]
# system_messages = ["You are ..."]
# initial_prompt = "Explain the counterexample."

[output]
verbose = false
raw_responses = false
"#;

        std::fs::write(path, default_content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// コマンドライン引数で上書き
    pub fn apply_overrides(&mut self, verbose: bool, raw_output: bool, model: Option<&str>) {
        self.output.verbose |= verbose;
        self.output.raw_responses |= raw_output;
        if let Some(model) = model.filter(|m| !m.is_empty()) {
            self.ai.model = model.to_string();
        }
    }

    /// ESBMC実行ファイルのパス（展開済み）
    pub fn esbmc_path(&self) -> PathBuf {
        expand_home(&self.esbmc.path)
    }

    /// セッション設定のスナップショットを作成
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            model: self.ai.model.clone(),
            temperature: self.ai.temperature,
            max_tokens: self
                .ai
                .max_tokens
                .unwrap_or_else(|| model_max_tokens(&self.ai.model)),
            completion_reserve: self.ai.completion_reserve,
            system_messages: self.chat.system_messages.clone(),
            initial_prompt: self
                .chat
                .initial_prompt
                .clone()
                .filter(|p| !p.trim().is_empty()),
        }
    }
}

/// セッション設定（起動時に一度だけ作成され、以後変更されない）
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub model: String,
    pub temperature: f32,
    /// コンテキスト上限（推定トークン数）
    pub max_tokens: usize,
    /// 送信ウィンドウは `max_tokens - completion_reserve` に収める
    pub completion_reserve: usize,
    /// 空ならデフォルトのペルソナを使用
    pub system_messages: Vec<String>,
    pub initial_prompt: Option<String>,
}

impl SessionConfig {
    pub fn new(model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            max_tokens: model_max_tokens(&model),
            completion_reserve: default_completion_reserve(),
            model,
            temperature: default_temperature(),
            system_messages: Vec::new(),
            initial_prompt: None,
        }
    }

    /// 最初に送信するプロンプト（設定がなければデフォルト）
    pub fn initial_prompt(&self) -> &str {
        self.initial_prompt.as_deref().unwrap_or(DEFAULT_PROMPT)
    }
}

/// 認証情報（`.env`形式のKEY=VALUEファイル）
#[derive(Debug, Clone)]
pub struct Credentials {
    values: HashMap<String, String>,
}

impl Credentials {
    /// 認証情報ファイルを読み込む
    ///
    /// ファイルが存在しない場合は起動前提条件エラー。
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            return Err(AppError::Precondition(format!(
                "{} file is not found in project directory",
                path.display()
            )));
        }
        tracing::info!("Environment file has been located");

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials file: {}", path.display()))?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let values = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| {
                let line = line.strip_prefix("export ").unwrap_or(line);
                let (key, value) = line.split_once('=')?;
                let value = value.trim().trim_matches('"').trim_matches('\'');
                Some((key.trim().to_string(), value.to_string()))
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    /// APIキーを取得（ファイルになければ環境変数）
    pub fn api_key(&self) -> Result<String, AppError> {
        self.get(API_KEY_VAR)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .or_else(|| std::env::var(API_KEY_VAR).ok().filter(|v| !v.is_empty()))
            .ok_or_else(|| AppError::Precondition(format!("{} is not set", API_KEY_VAR)))
    }
}
