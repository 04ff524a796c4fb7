use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use esbmc_ai::{
    app::{self, Launch, RunOutcome},
    cli::{print_banner, print_error},
    AppError, Config, OpenAiClient, RenderOptions, Repl,
};

#[derive(Parser, Debug)]
#[command(name = "esbmc-ai")]
#[command(about = "Tool that passes ESBMC output into ChatGPT and allows for natural language explanations. Type /help in order to view available commands.")]
#[command(version)]
struct Args {
    /// ESBMCに渡すファイル
    filename: PathBuf,

    /// ファイル名以降の引数はESBMCのパラメータとして渡す
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    remaining: Vec<String>,

    /// 詳細出力
    #[arg(short, long)]
    verbose: bool,

    /// AIモデルの応答をそのまま表示
    #[arg(short, long)]
    raw_output: bool,

    /// 使用するAIモデル
    #[arg(short = 'm', long)]
    ai_model: Option<String>,

    /// 設定ファイルパス
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let mut stdout = io::stdout();

    // 設定ファイルを読み込み
    let config_result = match &args.config {
        Some(path) => Config::load_from_file(path),
        None => Config::load_default(),
    };
    let mut config = match config_result {
        Ok(config) => config,
        Err(e) => {
            let _ = print_error(&mut stdout, &format!("{:#}", e));
            std::process::exit(AppError::Other(e).exit_code());
        }
    };
    // コマンドライン引数で設定を上書き
    config.apply_overrides(args.verbose, args.raw_output, args.ai_model.as_deref());

    // トレーシング初期化（デフォルトはWARN、verboseでINFO）
    let default_level = if config.output.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let _ = print_banner(&mut stdout);
    tracing::info!("esbmc-ai v{} starting...", esbmc_ai::VERSION);

    let code = match run(args, config).await {
        Ok(RunOutcome::Verified) | Ok(RunOutcome::Conversed(_)) => 0,
        Err(e) => {
            tracing::error!("{:?}", e);
            let _ = print_error(&mut stdout, &e.to_string());
            e.exit_code()
        }
    };
    std::process::exit(code);
}

async fn run(args: Args, config: Config) -> Result<RunOutcome, AppError> {
    let (api_key, runner) = app::preflight(&config)?;

    tracing::info!("Initializing OpenAI client ({})", config.ai.base_url);
    let backend = Arc::new(OpenAiClient::from_config(&config.ai, &api_key));

    let render = RenderOptions {
        verbose: config.output.verbose,
        raw: config.output.raw_responses,
    };
    let mut repl = Repl::new(io::stdout(), render);
    let mut input = tokio::io::BufReader::new(tokio::io::stdin());

    let launch = Launch {
        filename: args.filename,
        extra_args: args.remaining,
    };

    app::run_session(&config, &runner, backend, &launch, &mut input, &mut repl).await
}
