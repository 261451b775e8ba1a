//! Serve-mode session: the command loop plus its ping emitter.
//!
//! The loop reads one command per line, asks the registry, and writes the
//! reply through the shared output.  Registry calls run on the blocking pool
//! *before* the output lock is taken, so a slow lookup never stalls pings.

use std::borrow::Cow;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite};
use tracing::{debug, info};

use super::output::SharedOutput;
use super::ping::PingEmitter;
use crate::config::ServeConfig;
use crate::core::protocol::{Command, Response};
use crate::core::registry::{Registry, RegistryError};

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The controller sent `exit`.
    Exit,
    /// stdin closed.
    EndOfInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub termination: Termination,
    /// Lines read, `exit` included.
    pub commands: u64,
    pub pings: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Running,
    Terminating(Termination),
}

pub struct Session<W> {
    registry: Arc<dyn Registry>,
    output: SharedOutput<W>,
    config: ServeConfig,
}

impl<W> Session<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(registry: Arc<dyn Registry>, output: SharedOutput<W>, config: ServeConfig) -> Self {
        Self {
            registry,
            output,
            config,
        }
    }

    /// Serve commands from `input` until `exit` or end-of-input.
    ///
    /// The ping emitter is always stopped and joined before this returns,
    /// including when the command loop fails.
    pub async fn run<R: AsyncBufRead + Unpin>(self, input: R) -> anyhow::Result<SessionSummary> {
        info!(ping_interval = ?self.config.ping_interval, "serve session started");
        let pinger = PingEmitter::spawn(self.output.clone(), self.config.ping_interval);

        let outcome = self.command_loop(input).await;
        let pings = pinger.stop().await;

        let (termination, commands) = outcome?;
        Ok(SessionSummary {
            termination,
            commands,
            pings: pings?,
        })
    }

    async fn command_loop<R: AsyncBufRead + Unpin>(
        &self,
        mut input: R,
    ) -> anyhow::Result<(Termination, u64)> {
        let mut buf = Vec::new();
        let mut commands: u64 = 0;

        loop {
            buf.clear();
            let read = input
                .read_until(b'\n', &mut buf)
                .await
                .context("failed to read command")?;
            let state = if read == 0 {
                LoopState::Terminating(Termination::EndOfInput)
            } else {
                commands += 1;
                self.handle(Command::parse(&command_text(&buf))).await?
            };
            if let LoopState::Terminating(termination) = state {
                debug!(?termination, commands, "command loop leaving");
                return Ok((termination, commands));
            }
        }
    }

    async fn handle(&self, command: Command) -> anyhow::Result<LoopState> {
        let response = match command {
            Command::Exit => return Ok(LoopState::Terminating(Termination::Exit)),
            Command::ListAll => {
                let records = self.query(|registry| registry.applications()).await?;
                debug!(count = records.len(), "list-all");
                Response::Listing(records)
            }
            Command::Find(identifier) => {
                let key = identifier.clone();
                match self.query(move |registry| registry.label(&key)).await? {
                    Some(label) => Response::Package { identifier, label },
                    None => {
                        debug!(%identifier, "not found");
                        Response::NotFound(identifier)
                    }
                }
            }
            Command::Unknown(line) => {
                debug!(%line, "unknown command");
                Response::UnknownCommand(line)
            }
        };

        self.output
            .send(&response)
            .await
            .context("failed to write response")?;
        Ok(LoopState::Running)
    }

    /// Run a registry call on the blocking pool.
    async fn query<T, F>(&self, call: F) -> anyhow::Result<T>
    where
        F: FnOnce(&dyn Registry) -> Result<T, RegistryError> + Send + 'static,
        T: Send + 'static,
    {
        let registry = Arc::clone(&self.registry);
        let result = tokio::task::spawn_blocking(move || call(registry.as_ref()))
            .await
            .context("registry task panicked")?;
        Ok(result?)
    }
}

/// One raw input line minus its terminator.  Bytes that are not UTF-8 become
/// U+FFFD so a garbled line is answered instead of ending the session.
fn command_text(raw: &[u8]) -> Cow<'_, str> {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line)
}
