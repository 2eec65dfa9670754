use std::fmt;
use std::time::Instant;
use tracing::{debug, error, info};
use uuid::Uuid;

const TELEMETRY_TARGET: &str = "coursegraph::events::telemetry";

/// Navigator commands that are traced end to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    LoadRoot,
    ExpandNode,
    ResetView,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Command::LoadRoot => "LoadRoot",
            Command::ExpandNode => "ExpandNode",
            Command::ResetView => "ResetView",
        })
    }
}

pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// One traced run of a [`Command`].
///
/// Starting a span emits `command_start`; finishing it with
/// [`succeed`](Self::succeed) or [`fail`](Self::fail) emits the matching
/// record with the same correlation id and the elapsed time.
#[derive(Debug)]
pub struct CommandSpan {
    command: Command,
    correlation_id: String,
    started: Instant,
}

impl CommandSpan {
    pub fn start(command: Command) -> Self {
        let span = Self {
            command,
            correlation_id: new_correlation_id(),
            started: Instant::now(),
        };
        info!(
            target: TELEMETRY_TARGET,
            command = %span.command,
            correlation_id = %span.correlation_id,
            "command_start"
        );
        span
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Attach free-form context (node id, request shape) to the running
    /// command.
    pub fn context(&self, context: impl fmt::Display) {
        debug!(
            target: TELEMETRY_TARGET,
            command = %self.command,
            correlation_id = %self.correlation_id,
            %context,
            "command_context"
        );
    }

    pub fn succeed(self) {
        info!(
            target: TELEMETRY_TARGET,
            command = %self.command,
            correlation_id = %self.correlation_id,
            duration_ms = self.started.elapsed().as_millis(),
            "command_success"
        );
    }

    pub fn fail(self, reason: &str) {
        error!(
            target: TELEMETRY_TARGET,
            command = %self.command,
            correlation_id = %self.correlation_id,
            duration_ms = self.started.elapsed().as_millis(),
            error = %reason,
            "command_failure"
        );
    }
}
