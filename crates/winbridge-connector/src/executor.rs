//! Command execution against one remote session.
//!
//! Builds the command line, dispatches it, splits both streams into lines
//! and classifies the exit code. A failing exit code is data, not an error.

use std::sync::Arc;

use winbridge_command::CommandBuilder;
use winbridge_core::{ConnectorError, ExecutionRequest, ExecutionResult, OutputStore, PrintOptions};
use winbridge_session::RemoteSession;

use crate::facts::Fact;

/// Line terminator of the remote platform.
const LINE_TERMINATOR: &str = "\r\n";

/// Decode a raw output buffer and split it on `\r\n`.
///
/// An empty buffer has no lines, unlike a plain string split, which would
/// yield one empty line. A trailing terminator leaves a trailing empty line.
#[must_use]
pub fn split_lines(buffer: &[u8]) -> Vec<String> {
    if buffer.is_empty() {
        return Vec::new();
    }
    String::from_utf8_lossy(buffer)
        .split(LINE_TERMINATOR)
        .map(str::to_string)
        .collect()
}

/// Runs requests through a shared session and records their output.
#[derive(Clone)]
pub struct CommandExecutor {
    session: Arc<RemoteSession>,
    output: Arc<OutputStore>,
}

impl CommandExecutor {
    #[must_use]
    pub fn new(session: Arc<RemoteSession>) -> Self {
        Self::with_output(session, Arc::new(OutputStore::new()))
    }

    /// Executor pushing captured lines into `output`.
    #[must_use]
    pub const fn with_output(session: Arc<RemoteSession>, output: Arc<OutputStore>) -> Self {
        Self { session, output }
    }

    #[must_use]
    pub fn session(&self) -> &RemoteSession {
        &self.session
    }

    #[must_use]
    pub const fn output(&self) -> &Arc<OutputStore> {
        &self.output
    }

    /// Run one request.
    ///
    /// # Errors
    /// Returns error if the command cannot be built or the transport fails.
    /// An unexpected exit code is reported through `ExecutionResult::success`.
    pub async fn run(
        &self,
        request: &ExecutionRequest,
        print: PrintOptions,
    ) -> Result<ExecutionResult, ConnectorError> {
        let shell = request.target_shell();
        let command = CommandBuilder::from_request(request)
            .build(shell)
            .map_err(|e| ConnectorError::InvalidCommand(e.to_string()))?;

        let identity = self.session.identity();
        let prefix = identity.print_prefix();
        if print.print_input {
            tracing::info!("{prefix}>>> {command}");
        }
        tracing::debug!(host = identity.name(), %shell, %command, "Running command");

        let response = self.session.invoke(shell, &command, &request.env).await?;
        let stdout = split_lines(&response.std_out);
        let stderr = split_lines(&response.std_err);
        let success = request.is_success(response.status_code);
        tracing::debug!(
            host = identity.name(),
            exit_code = response.status_code,
            success,
            ?stdout,
            ?stderr,
            "Command finished"
        );

        for line in &stdout {
            if print.print_output {
                tracing::info!("{prefix}{line}");
            }
            self.output.push_stdout(line.as_str());
        }
        for line in &stderr {
            if print.print_output {
                tracing::info!("{prefix}{line}");
            }
            self.output.push_stderr(line.as_str());
        }
        self.output.push_finished(response.status_code, success);

        Ok(ExecutionResult::new(response.status_code, stdout, stderr, success))
    }

    /// Query a fact and parse its output.
    ///
    /// # Errors
    /// Returns error if the query fails or its output cannot be parsed.
    pub async fn get_fact<F: Fact>(&self, fact: &F) -> Result<F::Output, ConnectorError> {
        let request = ExecutionRequest::new(fact.command()).shell(fact.shell());
        let result = self.run(&request, PrintOptions::default()).await?;
        if !result.success {
            return Err(ConnectorError::Fact {
                fact: F::NAME,
                reason: format!(
                    "exit code {}: {}",
                    result.exit_code,
                    result.stderr.join(" ").trim()
                ),
            });
        }
        fact.process(&result.stdout)
            .map_err(|reason| ConnectorError::Fact { fact: F::NAME, reason })
    }
}
