//! Remote session owning one authenticated transport.

use std::collections::BTreeMap;

use tokio::sync::Mutex;
use winbridge_core::{
    ConnectError, HostIdentity, RawResponse, ShellKind, ShellTransport, TransportFault,
};

use crate::{clixml, wsman::WsManTransport};

/// Authenticated handle to one remote host.
///
/// Commands are serialised: the transport lock is held for the whole
/// round trip, so at most one command is in flight per session.
pub struct RemoteSession {
    identity: HostIdentity,
    transport: Mutex<Option<Box<dyn ShellTransport>>>,
}

impl RemoteSession {
    /// Connect over WS-Management using the identity's attributes.
    ///
    /// # Errors
    /// Returns error if the settings are invalid, the endpoint is
    /// unreachable or the credentials are rejected.
    pub async fn connect(identity: HostIdentity) -> Result<Self, ConnectError> {
        let transport = WsManTransport::new(&identity)?;
        Self::connect_with(identity, Box::new(transport)).await
    }

    /// Connect over a caller-supplied transport.
    ///
    /// # Errors
    /// Returns error if the transport handshake fails.
    pub async fn connect_with(
        identity: HostIdentity,
        mut transport: Box<dyn ShellTransport>,
    ) -> Result<Self, ConnectError> {
        tracing::debug!(
            host = identity.name(),
            hostname = identity.hostname(),
            username = identity.username(),
            "Opening remote session"
        );
        transport.open().await?;
        Ok(Self {
            identity,
            transport: Mutex::new(Some(transport)),
        })
    }

    #[must_use]
    pub const fn identity(&self) -> &HostIdentity {
        &self.identity
    }

    /// Run a built command line in `shell`, forwarding `env` to the process.
    ///
    /// PowerShell error streams serialized as CLIXML are reduced to text.
    ///
    /// # Errors
    /// Returns error on network failure or if the session is closed.
    pub async fn invoke(
        &self,
        shell: ShellKind,
        command: &str,
        env: &BTreeMap<String, String>,
    ) -> Result<RawResponse, TransportFault> {
        let mut guard = self.transport.lock().await;
        let transport = guard.as_mut().ok_or_else(|| TransportFault::Closed {
            host: self.identity.name().to_string(),
        })?;

        let mut response = transport.execute(shell, command, env).await?;
        if shell == ShellKind::PowerShell && clixml::is_clixml(&response.std_err) {
            response.std_err = clixml::clean_error_stream(&response.std_err);
        }
        Ok(response)
    }

    /// Run a PowerShell script.
    ///
    /// # Errors
    /// See [`RemoteSession::invoke`].
    pub async fn run_ps(
        &self,
        script: &str,
        env: &BTreeMap<String, String>,
    ) -> Result<RawResponse, TransportFault> {
        self.invoke(ShellKind::PowerShell, script, env).await
    }

    /// Run a cmd.exe command line.
    ///
    /// # Errors
    /// See [`RemoteSession::invoke`].
    pub async fn run_cmd(
        &self,
        command: &str,
        env: &BTreeMap<String, String>,
    ) -> Result<RawResponse, TransportFault> {
        self.invoke(ShellKind::Cmd, command, env).await
    }

    /// Replace the handle with a freshly authenticated one.
    ///
    /// The new transport is opened first; the old one is closed only after
    /// the swap, and only once no command holds it.
    ///
    /// # Errors
    /// Returns error if the new handshake fails; the old handle stays in place.
    pub async fn reconnect(&self, mut transport: Box<dyn ShellTransport>) -> Result<(), ConnectError> {
        transport.open().await?;
        let previous = self.transport.lock().await.replace(transport);
        if let Some(mut previous) = previous {
            if let Err(e) = previous.close().await {
                tracing::debug!(host = self.identity.name(), "Closing replaced transport: {e}");
            }
        }
        tracing::debug!(host = self.identity.name(), "Session re-authenticated");
        Ok(())
    }

    /// Close the handle. Later calls fail with `TransportFault::Closed`.
    ///
    /// # Errors
    /// Returns error if the remote side could not be told.
    pub async fn disconnect(&self) -> Result<(), TransportFault> {
        let previous = self.transport.lock().await.take();
        match previous {
            Some(mut transport) => transport.close().await,
            None => Ok(()),
        }
    }

    /// Whether a handle is held.
    pub async fn is_connected(&self) -> bool {
        self.transport.lock().await.is_some()
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::memory::MemoryTransport;

    fn identity() -> HostIdentity {
        HostIdentity::from_hostname("win01")
    }

    #[tokio::test]
    async fn test_invoke_records_call() {
        let transport = MemoryTransport::new();
        transport.push_response(RawResponse::new(0, "hi\r\n", ""));
        let session = RemoteSession::connect_with(identity(), Box::new(transport.clone()))
            .await
            .unwrap();

        let env = BTreeMap::from([("FOO".to_string(), "bar".to_string())]);
        let response = session.run_ps("echo hi", &env).await.unwrap();
        assert_eq!(response.std_out, b"hi\r\n");

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].shell, ShellKind::PowerShell);
        assert_eq!(calls[0].command, "echo hi");
        assert_eq!(calls[0].env, env);
    }

    #[tokio::test]
    async fn test_clixml_stderr_is_cleaned_for_powershell_only() {
        let clixml = "#< CLIXML\r\n<Objs><S S=\"Error\">bad_x000D__x000A_</S></Objs>";
        let transport = MemoryTransport::new();
        transport.push_response(RawResponse::new(1, "", clixml));
        transport.push_response(RawResponse::new(1, "", clixml));
        let session = RemoteSession::connect_with(identity(), Box::new(transport))
            .await
            .unwrap();

        let ps = session.run_ps("x", &BTreeMap::new()).await.unwrap();
        assert_eq!(ps.std_err, b"bad");
        let cmd = session.run_cmd("x", &BTreeMap::new()).await.unwrap();
        assert_eq!(cmd.std_err, clixml.as_bytes());
    }

    #[tokio::test]
    async fn test_rejected_credentials_fail_connect() {
        let transport = MemoryTransport::rejecting_credentials("win01", "vagrant");
        let err = RemoteSession::connect_with(identity(), Box::new(transport))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ConnectError::AuthenticationRejected { .. }));
    }

    #[tokio::test]
    async fn test_disconnect_closes_session() {
        let transport = MemoryTransport::new();
        let session = RemoteSession::connect_with(identity(), Box::new(transport.clone()))
            .await
            .unwrap();
        session.disconnect().await.unwrap();

        assert!(!transport.is_open());
        assert!(!session.is_connected().await);
        assert!(matches!(
            session.run_cmd("dir", &BTreeMap::new()).await,
            Err(TransportFault::Closed { .. })
        ));
    }

    #[tokio::test]
    async fn test_reconnect_replaces_handle() {
        let first = MemoryTransport::new();
        let second = MemoryTransport::new();
        let session = RemoteSession::connect_with(identity(), Box::new(first.clone()))
            .await
            .unwrap();

        session.reconnect(Box::new(second.clone())).await.unwrap();
        session.run_cmd("ver", &BTreeMap::new()).await.unwrap();

        assert!(!first.is_open());
        assert!(first.calls().is_empty());
        assert_eq!(second.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_reconnect_keeps_old_handle() {
        let first = MemoryTransport::new();
        let session = RemoteSession::connect_with(identity(), Box::new(first.clone()))
            .await
            .unwrap();

        let rejected = MemoryTransport::rejecting_credentials("win01", "vagrant");
        assert!(session.reconnect(Box::new(rejected)).await.is_err());

        session.run_cmd("ver", &BTreeMap::new()).await.unwrap();
        assert_eq!(first.calls().len(), 1);
    }
}
