//! Core traits for transports and connectors.

use std::{collections::BTreeMap, path::Path};

use async_trait::async_trait;

use crate::{
    ConnectError, ConnectorError, ExecutionRequest, ExecutionResult, PrintOptions, ShellKind,
    TransportFault, UploadSource,
};

/// Raw reply of one remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    pub status_code: i32,
    pub std_out: Vec<u8>,
    pub std_err: Vec<u8>,
}

impl RawResponse {
    #[must_use]
    pub fn new(status_code: i32, std_out: impl Into<Vec<u8>>, std_err: impl Into<Vec<u8>>) -> Self {
        Self {
            status_code,
            std_out: std_out.into(),
            std_err: std_err.into(),
        }
    }
}

/// Authenticated channel to one remote command-execution endpoint.
///
/// Implementations are driven by one caller at a time; `RemoteSession`
/// serialises access.
#[async_trait]
pub trait ShellTransport: Send + Sync {
    /// Perform the authentication handshake.
    async fn open(&mut self) -> Result<(), ConnectError>;

    /// Run an already-built command line in the given shell dialect.
    ///
    /// Blocks until the command completes or a transport timeout elapses.
    async fn execute(
        &mut self,
        shell: ShellKind,
        command: &str,
        env: &BTreeMap<String, String>,
    ) -> Result<RawResponse, TransportFault>;

    /// Release remote resources held by the channel.
    async fn close(&mut self) -> Result<(), TransportFault>;
}

/// Capability surface an orchestration engine drives per host.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish the host's session.
    async fn connect(&mut self) -> Result<(), ConnectError>;

    /// Run one command. A failing exit code is reported in the result.
    async fn run_shell_command(
        &self,
        request: &ExecutionRequest,
        print: PrintOptions,
    ) -> Result<ExecutionResult, ConnectorError>;

    /// Upload `source` to `remote_filename`. Returns whether it landed.
    async fn put_file(
        &self,
        source: UploadSource,
        remote_filename: &str,
        print: PrintOptions,
    ) -> Result<bool, ConnectorError>;

    /// Download a remote file. Not available on this connector.
    async fn get_file(
        &self,
        _remote_filename: &str,
        _local_path: &Path,
        _print: PrintOptions,
    ) -> Result<bool, ConnectorError> {
        Err(ConnectorError::Unsupported("get_file"))
    }
}
