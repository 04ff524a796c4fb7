//! 待機中のスピナー表示
//!
//! ESBMCの実行やLLMの応答待ちなど、1回の呼び出しの間だけ表示する。

use crossterm::{
    cursor::{Hide, MoveToColumn, Show},
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use std::future::Future;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const FRAMES: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
const TICK: Duration = Duration::from_millis(80);

/// 1フレーム描画
fn draw<W: Write>(out: &mut W, frame: char, msg: &str) {
    let _ = execute!(
        out,
        MoveToColumn(0),
        Clear(ClearType::CurrentLine),
        SetForegroundColor(Color::Cyan),
        Print(frame),
        ResetColor,
        Print(' '),
        Print(msg)
    );
}

/// スピナー行を消してカーソルを戻す
fn clear<W: Write>(out: &mut W) {
    let _ = execute!(out, MoveToColumn(0), Clear(ClearType::CurrentLine), Show);
}

/// スピナー
///
/// 描画は別タスクで行い、`running`が落ちた時点で行を消して終了する。
pub struct Spinner {
    running: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl Spinner {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    /// 表示を開始（動作中なら何もしない）
    pub fn start(&mut self, msg: impl Into<String>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let running = Arc::clone(&self.running);
        let msg = msg.into();
        self.task = Some(tokio::spawn(async move {
            let mut out = io::stdout();
            let mut ticker = tokio::time::interval(TICK);
            let _ = execute!(out, Hide);

            for frame in FRAMES.iter().cycle() {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                draw(&mut out, *frame, &msg);
                ticker.tick().await;
            }
            clear(&mut out);
        }));
    }

    /// 表示を止め、描画タスクの終了を待つ
    pub async fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// `fut`の完了までスピナーを表示する
    ///
    /// 結果が成功でも失敗でも、返る前に停止している。
    pub async fn wrap<F: Future>(&mut self, msg: &str, fut: F) -> F::Output {
        self.start(msg);
        let output = fut.await;
        self.stop().await;
        output
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for Spinner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        // wrap途中で破棄された場合も行を消す
        if self.running.swap(false, Ordering::SeqCst) {
            if let Some(task) = self.task.take() {
                task.abort();
            }
            clear(&mut io::stdout());
        }
    }
}
