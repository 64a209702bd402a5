//! Line-oriented command front end shared by both surfaces.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::time::interval;

use crate::error::{AppError, AppResult};
use crate::presenters::views::Screen;
use crate::presenters::Confirm;
use crate::session::SessionBootstrapper;

pub mod admin;
pub mod user;

#[derive(Debug)]
pub enum Parsed<C> {
    Command(C),
    /// help, version or a usage error to print as is.
    Showing(String),
}

/// `None` for blank lines.
pub fn parse_line<C: Parser>(line: &str) -> Option<Parsed<C>> {
    let splitted = match shell_words::split(line) {
        Ok(v) => v,
        Err(e) => return Some(Parsed::Showing(format!("cannot split line: {}", e))),
    };
    if splitted.is_empty() {
        return None;
    }

    match C::try_parse_from(splitted) {
        Ok(c) => Some(Parsed::Command(c)),
        Err(e) => Some(Parsed::Showing(e.to_string())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[async_trait]
pub trait Dispatch {
    type Line: Parser + Send;

    fn session(&self) -> &SessionBootstrapper;

    async fn dispatch(&self, line: Self::Line, out: &mpsc::Sender<String>) -> AppResult<Flow>;
}

/// confirmation taken from a `--yes` flag; without it the prompt is shown and
/// the action declined.
pub struct CommandLineConfirm {
    pub yes: bool,
    pub out: mpsc::Sender<String>,
}

#[async_trait]
impl Confirm for CommandLineConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        if !self.yes {
            let _ = self
                .out
                .send(format!("{} (repeat with --yes to confirm)", prompt))
                .await;
        }

        self.yes
    }
}

pub struct Conductor<S> {
    pub surface: Arc<S>,
    pub out: mpsc::Sender<String>,
}

impl<S> Conductor<S>
where S: Dispatch + Sync + Send
{
    /// reads commands until `quit`, end of input or a redirect away from this surface.
    pub async fn run<R>(&self, input: R) -> anyhow::Result<()>
    where R: AsyncBufRead + Unpin {
        let mut lines = input.lines();
        let mut tick = interval(Duration::from_millis(200));

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let line = match line? {
                        Some(l) => l,
                        None => break tracing::info!("input closed"),
                    };

                    if self.handle(&line).await == Flow::Quit {
                        break;
                    }
                },
                _ = tick.tick() => {},
            }

            if self.surface.session().state.read().await.screen == Screen::Redirected {
                break tracing::info!("redirected away from this surface");
            }
        }

        Ok(())
    }

    pub async fn handle(&self, line: &str) -> Flow {
        let cmd = match parse_line::<S::Line>(line) {
            None => return Flow::Continue,
            Some(Parsed::Showing(text)) => {
                let _ = self.out.send(text).await;
                return Flow::Continue;
            },
            Some(Parsed::Command(c)) => c,
        };

        match self.surface.dispatch(cmd, &self.out).await {
            Ok(f) => f,
            Err(AppError::Unauthorized(m)) => {
                let _ = self.out.send(format!("unauthorized: {}", m)).await;
                Flow::Continue
            },
            Err(e) => {
                tracing::debug!("command failed - {}", e);
                Flow::Continue
            },
        }
    }
}
