//! Error taxonomy shared by every layer.
//!
//! A command that exits with an unexpected code is not an error: it is
//! reported as an unsuccessful `ExecutionResult`. Only connection and
//! transport problems travel through these types.

use thiserror::Error;

use crate::host::TransportKind;

/// Failure to establish an authenticated session.
///
/// Messages carry host and username, never the password.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("Authentication error (username={username}, host={host})")]
    AuthenticationRejected { host: String, username: String },
    #[error("Cannot reach {host} as {username}: {reason}")]
    Unreachable {
        host: String,
        username: String,
        reason: String,
    },
    #[error("Transport {transport} is not supported by the winrm connector (username={username}, host={host})")]
    UnsupportedTransport {
        host: String,
        username: String,
        transport: TransportKind,
    },
    #[error("Invalid connection settings (username={username}, host={host}): {reason}")]
    InvalidConfig {
        host: String,
        username: String,
        reason: String,
    },
}

/// Network-level failure while a command is in flight.
#[derive(Debug, Error)]
pub enum TransportFault {
    #[error("Timed out waiting for {host}")]
    Timeout { host: String },
    #[error("Connection to {host} failed: {reason}")]
    Connection { host: String, reason: String },
    #[error("Remote fault from {host}: {reason}")]
    Protocol { host: String, reason: String },
    #[error("Credentials for {host} were rejected")]
    Unauthorized { host: String },
    #[error("Session for {host} is closed")]
    Closed { host: String },
}

/// Error surfaced by a `Connector` capability.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error(transparent)]
    Transport(#[from] TransportFault),
    #[error("Not supported by the winrm connector: {0}")]
    Unsupported(&'static str),
    #[error("Host {0} is not connected")]
    NotConnected(String),
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
    #[error("Fact {fact} returned unusable output: {reason}")]
    Fact { fact: &'static str, reason: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_error_mentions_user_and_host() {
        let err = ConnectError::AuthenticationRejected {
            host: "win01".into(),
            username: "vagrant".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("vagrant"));
        assert!(msg.contains("win01"));
    }

    #[test]
    fn test_transport_fault_is_wrapped() {
        let err: ConnectorError = TransportFault::Timeout { host: "win01".into() }.into();
        assert!(matches!(err, ConnectorError::Transport(TransportFault::Timeout { .. })));
        assert_eq!(err.to_string(), "Timed out waiting for win01");
    }
}
