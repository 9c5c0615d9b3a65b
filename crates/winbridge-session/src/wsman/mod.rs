//! WS-Management shell transport over HTTP(S) with basic authentication.
//!
//! Each command runs in its own remote shell: create, command, receive
//! until done, terminate, delete. The environment of a command is attached
//! to the shell it runs in.

pub mod envelope;
pub mod response;

use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header::CONTENT_TYPE};
use winbridge_command::encode_powershell;
use winbridge_core::{
    ConnectError, HostIdentity, Password, RawResponse, ShellKind, ShellTransport, TransportFault,
};

use self::{envelope::EnvelopeContext, response::Fault};

const SOAP_CONTENT_TYPE: &str = "application/soap+xml;charset=UTF-8";

#[derive(Debug)]
enum PostError {
    Unauthorized,
    Timeout,
    Connection(String),
    Fault(Fault),
    Status(u16),
}

impl PostError {
    fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Connection(err.to_string())
        }
    }
}

/// WinRM transport speaking SOAP to `/wsman`.
#[derive(Debug)]
pub struct WsManTransport {
    client: Client,
    endpoint: String,
    host: String,
    username: String,
    password: Password,
    operation_timeout: Duration,
}

impl WsManTransport {
    /// Build a transport from the identity's connection attributes.
    ///
    /// Nothing is sent until [`ShellTransport::open`].
    ///
    /// # Errors
    /// Returns error for a missing hostname or username, an unsupported
    /// transport kind or inconsistent timeouts.
    pub fn new(identity: &HostIdentity) -> Result<Self, ConnectError> {
        let host = identity.hostname().to_string();
        let username = identity.username().to_string();
        let data = identity.data();
        let invalid = |reason: &str| ConnectError::InvalidConfig {
            host: host.clone(),
            username: username.clone(),
            reason: reason.to_string(),
        };

        if host.trim().is_empty() {
            return Err(invalid("no hostname configured"));
        }
        if username.is_empty() {
            return Err(invalid("no username configured"));
        }
        if !data.transport.is_supported() {
            return Err(ConnectError::UnsupportedTransport {
                host: host.clone(),
                username: username.clone(),
                transport: data.transport,
            });
        }
        let timeouts = data.timeouts();
        timeouts.validate().map_err(|reason| invalid(&reason))?;

        let client = Client::builder()
            .timeout(timeouts.read)
            .connect_timeout(timeouts.read)
            .build()
            .map_err(|e| invalid(&format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: identity.endpoint(),
            username,
            password: data.password.clone().unwrap_or_default(),
            operation_timeout: timeouts.operation,
            host,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn context(&self) -> EnvelopeContext<'_> {
        EnvelopeContext {
            endpoint: self.endpoint.as_str(),
            operation_timeout_secs: self.operation_timeout.as_secs(),
        }
    }

    async fn post(&self, body: String) -> Result<String, PostError> {
        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.username, Some(self.password.expose()))
            .header(CONTENT_TYPE, SOAP_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| PostError::from_reqwest(&e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(PostError::Unauthorized);
        }
        let text = response
            .text()
            .await
            .map_err(|e| PostError::from_reqwest(&e))?;
        if status.is_success() {
            Ok(text)
        } else if text.contains("Fault") {
            Err(PostError::Fault(response::parse_fault(&text)))
        } else {
            Err(PostError::Status(status.as_u16()))
        }
    }

    fn fault(&self, err: PostError) -> TransportFault {
        let host = self.host.clone();
        match err {
            PostError::Unauthorized => TransportFault::Unauthorized { host },
            PostError::Timeout => TransportFault::Timeout { host },
            PostError::Connection(reason) => TransportFault::Connection { host, reason },
            PostError::Fault(fault) => TransportFault::Protocol {
                host,
                reason: fault.reason,
            },
            PostError::Status(code) => TransportFault::Protocol {
                host,
                reason: format!("unexpected HTTP status {code}"),
            },
        }
    }

    fn protocol(&self, reason: impl Into<String>) -> TransportFault {
        TransportFault::Protocol {
            host: self.host.clone(),
            reason: reason.into(),
        }
    }

    async fn create_shell(&self, env: &BTreeMap<String, String>) -> Result<String, TransportFault> {
        let xml = self
            .post(envelope::create_shell(self.context(), env))
            .await
            .map_err(|e| self.fault(e))?;
        response::shell_id(&xml).ok_or_else(|| self.protocol("no ShellId in Create response"))
    }

    async fn run_in_shell(
        &self,
        shell_id: &str,
        command_line: &str,
    ) -> Result<RawResponse, TransportFault> {
        let xml = self
            .post(envelope::command(self.context(), shell_id, command_line))
            .await
            .map_err(|e| self.fault(e))?;
        let command_id =
            response::command_id(&xml).ok_or_else(|| self.protocol("no CommandId in Command response"))?;

        let mut output = RawResponse::default();
        let exit_code = loop {
            let xml = match self
                .post(envelope::receive(self.context(), shell_id, &command_id))
                .await
            {
                Ok(xml) => xml,
                Err(PostError::Fault(fault)) if fault.is_operation_timeout() => {
                    tracing::trace!(host = %self.host, %command_id, "No output yet, polling again");
                    continue;
                }
                Err(e) => return Err(self.fault(e)),
            };
            let chunk = response::parse_receive(&xml).map_err(|reason| self.protocol(reason))?;
            output.std_out.extend(chunk.stdout);
            output.std_err.extend(chunk.stderr);
            if chunk.done {
                break chunk.exit_code.unwrap_or_default();
            }
        };
        output.status_code = exit_status(exit_code);

        if let Err(e) = self
            .post(envelope::signal_terminate(self.context(), shell_id, &command_id))
            .await
        {
            tracing::debug!(host = %self.host, %command_id, "Terminate signal failed: {e:?}");
        }
        Ok(output)
    }
}

/// Windows reports exit codes as DWORDs; values above `i32::MAX` wrap.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_possible_wrap)]
const fn exit_status(code: i64) -> i32 {
    code as u32 as i32
}

#[async_trait]
impl ShellTransport for WsManTransport {
    async fn open(&mut self) -> Result<(), ConnectError> {
        tracing::debug!(endpoint = %self.endpoint, username = %self.username, "Identify");
        let reason = match self.post(envelope::identify()).await {
            Ok(_) => return Ok(()),
            Err(PostError::Unauthorized) => {
                return Err(ConnectError::AuthenticationRejected {
                    host: self.host.clone(),
                    username: self.username.clone(),
                });
            }
            Err(PostError::Timeout) => "timed out".to_string(),
            Err(PostError::Connection(reason)) => reason,
            Err(PostError::Fault(fault)) => fault.reason,
            Err(PostError::Status(code)) => format!("unexpected HTTP status {code}"),
        };
        Err(ConnectError::Unreachable {
            host: self.host.clone(),
            username: self.username.clone(),
            reason,
        })
    }

    async fn execute(
        &mut self,
        shell: ShellKind,
        command: &str,
        env: &BTreeMap<String, String>,
    ) -> Result<RawResponse, TransportFault> {
        let command_line = match shell {
            ShellKind::PowerShell => encode_powershell(command),
            ShellKind::Cmd => command.to_string(),
        };

        let shell_id = self.create_shell(env).await?;
        let result = self.run_in_shell(&shell_id, &command_line).await;
        if let Err(e) = self.post(envelope::delete_shell(self.context(), &shell_id)).await {
            tracing::debug!(host = %self.host, %shell_id, "Deleting shell failed: {e:?}");
        }
        result
    }

    async fn close(&mut self) -> Result<(), TransportFault> {
        tracing::debug!(endpoint = %self.endpoint, "Closing WS-Management transport");
        Ok(())
    }
}
