use anyhow::Result;
use std::future::Future;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::agent::{ConversationSession, SessionError};
use crate::llm::Response;
use super::commands::{help_text, Command};
use super::output::{print_error, render_response, RenderOptions};
use super::spinner::Spinner;

/// 入力待ちのプロンプト
pub const PROMPT: &str = ">: ";

/// 対話ループの状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopState {
    /// 入力待ち
    AwaitingInput,
    /// メッセージを送信中
    Dispatching(String),
    /// 終了
    Terminated,
}

/// 対話ループ
///
/// 1行ずつ入力を読み、`/help`・`/exit`・空行はローカルで処理し、
/// それ以外をセッションに送信して応答を表示する。
pub struct Repl<W: Write> {
    out: W,
    render: RenderOptions,
    spinner: Option<Spinner>,
}

impl<W: Write> Repl<W> {
    pub fn new(out: W, render: RenderOptions) -> Self {
        Self {
            out,
            render,
            spinner: Some(Spinner::new()),
        }
    }

    /// スピナーを無効化（非対話環境・テスト用）
    pub fn without_spinner(mut self) -> Self {
        self.spinner = None;
        self
    }

    pub fn out(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn render_options(&self) -> RenderOptions {
        self.render
    }

    /// スピナーを表示しながら処理を待つ
    pub async fn busy<F: Future>(&mut self, msg: &str, fut: F) -> F::Output {
        match self.spinner.as_mut() {
            Some(spinner) => spinner.wrap(msg, fut).await,
            None => fut.await,
        }
    }

    /// 応答を表示
    pub fn render(&mut self, session: &ConversationSession, response: &Response) -> Result<()> {
        render_response(&mut self.out, response, self.render, session.max_tokens())?;
        Ok(())
    }

    /// プロンプトを表示して1行読み込む（入力終端ではNone）
    pub async fn read_line<R: AsyncBufRead + Unpin>(&mut self, input: &mut R) -> Result<Option<String>> {
        write!(self.out, "{}", PROMPT)?;
        self.out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line).await? == 0 {
            writeln!(self.out)?;
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// 終了状態になるまでループを実行
    pub async fn run<R: AsyncBufRead + Unpin>(
        &mut self,
        session: &mut ConversationSession,
        input: &mut R,
    ) -> Result<()> {
        let mut state = LoopState::AwaitingInput;

        loop {
            state = match state {
                LoopState::AwaitingInput => match self.read_line(input).await? {
                    None => self.terminate()?,
                    Some(line) => match Command::parse(&line) {
                        Command::Empty => LoopState::AwaitingInput,
                        Command::Help => {
                            writeln!(self.out, "\n{}\n", help_text())?;
                            LoopState::AwaitingInput
                        }
                        Command::Exit => self.terminate()?,
                        Command::Message(text) => {
                            writeln!(self.out)?;
                            LoopState::Dispatching(text)
                        }
                    },
                },
                LoopState::Dispatching(payload) => {
                    self.dispatch(session, &payload).await?;
                    LoopState::AwaitingInput
                }
                LoopState::Terminated => return Ok(()),
            };
        }
    }

    async fn dispatch(&mut self, session: &mut ConversationSession, payload: &str) -> Result<()> {
        let result = self
            .busy("Generating response... Please Wait", session.send_message(payload))
            .await;

        match result {
            Ok(response) => self.render(session, &response),
            Err(e @ SessionError::Backend(_)) | Err(e @ SessionError::BudgetExceeded { .. }) => {
                tracing::error!("Failed to get a response: {}", e);
                print_error(&mut self.out, &e.to_string())?;
                writeln!(self.out)?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn terminate(&mut self) -> Result<LoopState> {
        writeln!(self.out, "exiting...")?;
        self.out.flush()?;
        Ok(LoopState::Terminated)
    }
}
