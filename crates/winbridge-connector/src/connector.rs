//! The `@winrm` connector.

use std::{
    num::NonZeroUsize,
    sync::{Arc, Once},
};

use async_trait::async_trait;
use tokio::sync::OnceCell;
use winbridge_command::{
    upload::{DEFAULT_CHUNK_SIZE, join_windows_path, temp_file_name},
    winget::{InstalledPackages, WingetError, ensure_packages},
};
use winbridge_core::{
    ConnectError, Connector, ConnectorData, ConnectorError, ExecutionRequest, ExecutionResult,
    HostIdentity, OutputStore, PrintOptions, ShellTransport, UploadSource, host::names_data,
};
use winbridge_session::RemoteSession;

use crate::{
    executor::CommandExecutor,
    facts::{Fact, TempDir, WingetPackages},
    upload::ChunkedUploader,
};

static ALPHA_WARNING: Once = Once::new();

/// Warn once per process that this connector is alpha.
pub fn show_alpha_warning() {
    ALPHA_WARNING.call_once(|| tracing::warn!("The @winrm connector is alpha!"));
}

/// Inventory name and data for `hostname`.
#[must_use]
pub fn make_names_data(hostname: &str) -> (String, ConnectorData) {
    show_alpha_warning();
    names_data(hostname)
}

/// Connector for one Windows host.
///
/// Holds at most one session. The remote temp directory is looked up once
/// per session and reused for every upload.
pub struct WinRmConnector {
    identity: HostIdentity,
    executor: Option<CommandExecutor>,
    output: Arc<OutputStore>,
    temp_dir: OnceCell<String>,
    chunk_size: NonZeroUsize,
}

impl WinRmConnector {
    #[must_use]
    pub fn new(identity: HostIdentity) -> Self {
        Self {
            identity,
            executor: None,
            output: Arc::new(OutputStore::new()),
            temp_dir: OnceCell::new(),
            chunk_size: NonZeroUsize::new(DEFAULT_CHUNK_SIZE).unwrap_or(NonZeroUsize::MIN),
        }
    }

    /// Use `chunk_size` bytes per upload command.
    #[must_use]
    pub const fn with_chunk_size(mut self, chunk_size: NonZeroUsize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    #[must_use]
    pub const fn identity(&self) -> &HostIdentity {
        &self.identity
    }

    /// Output of every command run through this connector.
    #[must_use]
    pub fn output(&self) -> Arc<OutputStore> {
        Arc::clone(&self.output)
    }

    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.executor.is_some()
    }

    /// Connect over a caller-supplied transport.
    ///
    /// # Errors
    /// Returns error if the transport handshake fails.
    pub async fn connect_with(&mut self, transport: Box<dyn ShellTransport>) -> Result<(), ConnectError> {
        let session = RemoteSession::connect_with(self.identity.clone(), transport).await?;
        self.attach(session);
        Ok(())
    }

    fn attach(&mut self, session: RemoteSession) {
        self.executor = Some(CommandExecutor::with_output(
            Arc::new(session),
            Arc::clone(&self.output),
        ));
        self.temp_dir = OnceCell::new();
    }

    /// Re-authenticate with a fresh transport, keeping the connector state.
    ///
    /// # Errors
    /// Returns error if not connected or the new handshake fails.
    pub async fn reconnect(&mut self, transport: Box<dyn ShellTransport>) -> Result<(), ConnectorError> {
        self.executor()?.session().reconnect(transport).await?;
        self.temp_dir = OnceCell::new();
        Ok(())
    }

    /// Close the session. A later `connect` opens a new one.
    ///
    /// # Errors
    /// Returns error if the remote side could not be told.
    pub async fn disconnect(&mut self) -> Result<(), ConnectorError> {
        self.temp_dir = OnceCell::new();
        match self.executor.take() {
            Some(executor) => Ok(executor.session().disconnect().await?),
            None => Ok(()),
        }
    }

    fn executor(&self) -> Result<&CommandExecutor, ConnectorError> {
        self.executor
            .as_ref()
            .ok_or_else(|| ConnectorError::NotConnected(self.identity.name().to_string()))
    }

    /// Query a fact on the connected host.
    ///
    /// # Errors
    /// Returns error if not connected, or the query fails.
    pub async fn get_fact<F: Fact>(&self, fact: &F) -> Result<F::Output, ConnectorError> {
        self.executor()?.get_fact(fact).await
    }

    /// Remote temp directory, queried on first use.
    ///
    /// # Errors
    /// Returns error if not connected, or the query fails.
    pub async fn temp_dir(&self) -> Result<&str, ConnectorError> {
        let executor = self.executor()?;
        let dir = self
            .temp_dir
            .get_or_try_init(|| executor.get_fact(&TempDir))
            .await?;
        Ok(dir.as_str())
    }

    /// Install commands bringing winget `packages` to the wanted state.
    ///
    /// Packages are `id` or `id=version`; those already installed are skipped.
    ///
    /// # Errors
    /// Returns error for removal requests, malformed specs or a failed query.
    pub async fn winget_install_commands(
        &self,
        packages: &[&str],
        present: bool,
    ) -> Result<Vec<String>, ConnectorError> {
        let installed = if present && !packages.is_empty() {
            self.get_fact(&WingetPackages).await?
        } else {
            InstalledPackages::default()
        };
        ensure_packages(packages, present, &installed).map_err(|e| match e {
            WingetError::UninstallUnsupported => ConnectorError::Unsupported("winget uninstall"),
            other => ConnectorError::InvalidCommand(other.to_string()),
        })
    }
}

#[async_trait]
impl Connector for WinRmConnector {
    async fn connect(&mut self) -> Result<(), ConnectError> {
        if self.is_connected() {
            return Ok(());
        }
        let session = RemoteSession::connect(self.identity.clone()).await?;
        self.attach(session);
        Ok(())
    }

    async fn run_shell_command(
        &self,
        request: &ExecutionRequest,
        print: PrintOptions,
    ) -> Result<ExecutionResult, ConnectorError> {
        self.executor()?.run(request, print).await
    }

    async fn put_file(
        &self,
        source: UploadSource,
        remote_filename: &str,
        print: PrintOptions,
    ) -> Result<bool, ConnectorError> {
        let executor = self.executor()?;
        let data = source.read_all().await?;
        let temp_path = join_windows_path(self.temp_dir().await?, &temp_file_name(remote_filename));

        let uploaded = ChunkedUploader::new(executor, self.chunk_size)
            .put(&data, &temp_path, remote_filename, print)
            .await?;
        if uploaded && print.print_output {
            tracing::info!("{}Uploaded {remote_filename}", self.identity.print_prefix());
        }
        Ok(uploaded)
    }
}
