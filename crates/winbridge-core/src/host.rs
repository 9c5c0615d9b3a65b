//! Host identity and connection attributes.

use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::{Map, Value};

/// Prefix of inventory names handled by this connector.
pub const NAME_PREFIX: &str = "@winrm/";

/// Default WS-Management HTTP port.
pub const DEFAULT_HTTP_PORT: u16 = 5985;
/// Default WS-Management HTTPS port.
pub const DEFAULT_HTTPS_PORT: u16 = 5986;
/// Seconds to wait for a response before giving up on the HTTP request.
pub const DEFAULT_READ_TIMEOUT_SEC: u64 = 30;
/// Seconds the remote endpoint may spend on one WS-Management operation.
pub const DEFAULT_OPERATION_TIMEOUT_SEC: u64 = 20;

/// Remote-management transport (authentication + channel) kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Basic authentication over unencrypted HTTP.
    #[default]
    Plaintext,
    /// Basic authentication over HTTPS.
    Ssl,
    /// Basic authentication, same channel as `Plaintext`.
    Basic,
    Ntlm,
    Kerberos,
    Credssp,
    Certificate,
}

impl TransportKind {
    /// Name as accepted in host attributes.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plaintext => "plaintext",
            Self::Ssl => "ssl",
            Self::Basic => "basic",
            Self::Ntlm => "ntlm",
            Self::Kerberos => "kerberos",
            Self::Credssp => "credssp",
            Self::Certificate => "certificate",
        }
    }

    /// Whether the connector can establish a session with this transport.
    #[must_use]
    pub const fn is_supported(self) -> bool {
        matches!(self, Self::Plaintext | Self::Ssl | Self::Basic)
    }

    /// Whether the channel is TLS-wrapped.
    #[must_use]
    pub const fn uses_tls(self) -> bool {
        matches!(self, Self::Ssl)
    }

    /// Port used when the host attributes do not name one.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        if self.uses_tls() {
            DEFAULT_HTTPS_PORT
        } else {
            DEFAULT_HTTP_PORT
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown transport name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown winrm transport: {0}")]
pub struct UnknownTransport(pub String);

impl FromStr for TransportKind {
    type Err = UnknownTransport;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plaintext" => Ok(Self::Plaintext),
            "ssl" => Ok(Self::Ssl),
            "basic" => Ok(Self::Basic),
            "ntlm" => Ok(Self::Ntlm),
            "kerberos" => Ok(Self::Kerberos),
            "credssp" => Ok(Self::Credssp),
            "certificate" => Ok(Self::Certificate),
            other => Err(UnknownTransport(other.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for TransportKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(de::Error::custom)
    }
}

/// Port given either as a number or as a numeric string.
fn deserialize_port<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u16>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Option::<Port>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Port::Number(port)) => Ok(Some(port)),
        Some(Port::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("invalid port: {text:?}"))),
    }
}

/// Password that never shows up in `Debug` output or log lines.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Raw secret, for the authentication header only.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Read and operation timeouts of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Time to wait for the first byte of a response.
    pub read: Duration,
    /// Time the endpoint may spend completing one operation.
    pub operation: Duration,
}

impl Timeouts {
    /// Check the pair is usable: both non-zero, read strictly longer than operation.
    ///
    /// # Errors
    /// Returns a description of the violated rule.
    pub fn validate(&self) -> Result<(), String> {
        if self.read.is_zero() || self.operation.is_zero() {
            return Err("timeouts must be greater than zero".to_string());
        }
        if self.read <= self.operation {
            return Err(format!(
                "read timeout ({}s) must exceed operation timeout ({}s)",
                self.read.as_secs(),
                self.operation.as_secs()
            ));
        }
        Ok(())
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(DEFAULT_READ_TIMEOUT_SEC),
            operation: Duration::from_secs(DEFAULT_OPERATION_TIMEOUT_SEC),
        }
    }
}

/// Connection attributes read from a host's data bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorData {
    /// Hostname or address of the endpoint.
    pub winrm_hostname: Option<String>,
    /// Endpoint port; defaults per transport.
    #[serde(deserialize_with = "deserialize_port")]
    pub port: Option<u16>,
    #[serde(alias = "winrm_username", alias = "ssh_user")]
    pub winrm_user: Option<String>,
    #[serde(alias = "winrm_password", alias = "ssh_password")]
    pub password: Option<Password>,
    pub transport: TransportKind,
    pub read_timeout_sec: u64,
    pub operation_timeout_sec: u64,
}

impl Default for ConnectorData {
    fn default() -> Self {
        Self {
            winrm_hostname: None,
            port: None,
            winrm_user: None,
            password: None,
            transport: TransportKind::default(),
            read_timeout_sec: DEFAULT_READ_TIMEOUT_SEC,
            operation_timeout_sec: DEFAULT_OPERATION_TIMEOUT_SEC,
        }
    }
}

impl ConnectorData {
    /// Extract the connector attributes from a host data bag.
    ///
    /// Unrelated keys are ignored.
    ///
    /// # Errors
    /// Returns error if a known key carries a value of the wrong type.
    pub fn from_attributes(attributes: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(attributes.clone()))
    }

    /// Port to connect to.
    #[must_use]
    pub fn effective_port(&self) -> u16 {
        self.port
            .filter(|p| *p != 0)
            .unwrap_or_else(|| self.transport.default_port())
    }

    #[must_use]
    pub const fn timeouts(&self) -> Timeouts {
        Timeouts {
            read: Duration::from_secs(self.read_timeout_sec),
            operation: Duration::from_secs(self.operation_timeout_sec),
        }
    }
}

/// Inventory name and data for a bare hostname (`@winrm/<hostname>`).
#[must_use]
pub fn names_data(hostname: &str) -> (String, ConnectorData) {
    let data = ConnectorData {
        winrm_hostname: Some(hostname.to_string()),
        ..ConnectorData::default()
    };
    (format!("{NAME_PREFIX}{hostname}"), data)
}

/// One remote host: inventory name plus its connection attributes.
///
/// Immutable once a session has been established for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    name: String,
    data: ConnectorData,
}

impl HostIdentity {
    /// Create an identity from an inventory name and its attributes.
    #[must_use]
    pub fn new(name: impl Into<String>, mut data: ConnectorData) -> Self {
        let name = name.into();
        if data.winrm_hostname.is_none() {
            if let Some(hostname) = name.strip_prefix(NAME_PREFIX) {
                data.winrm_hostname = Some(hostname.to_string());
            }
        }
        Self { name, data }
    }

    /// Create an identity from a bare hostname with default attributes.
    #[must_use]
    pub fn from_hostname(hostname: &str) -> Self {
        let (name, data) = names_data(hostname);
        Self { name, data }
    }

    /// Inventory name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn data(&self) -> &ConnectorData {
        &self.data
    }

    /// Hostname to connect to, falling back to the inventory name.
    #[must_use]
    pub fn hostname(&self) -> &str {
        self.data
            .winrm_hostname
            .as_deref()
            .unwrap_or_else(|| self.name.strip_prefix(NAME_PREFIX).unwrap_or(&self.name))
    }

    /// Username, empty when none is configured.
    #[must_use]
    pub fn username(&self) -> &str {
        self.data.winrm_user.as_deref().unwrap_or_default()
    }

    /// Prefix for echoed input/output lines.
    #[must_use]
    pub fn print_prefix(&self) -> String {
        format!("[{}] ", self.name)
    }

    /// WS-Management endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> String {
        let scheme = if self.data.transport.uses_tls() { "https" } else { "http" };
        let host = self.hostname();
        let host = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]")
        } else {
            host.to_string()
        };
        format!("{scheme}://{host}:{}/wsman", self.data.effective_port())
    }
}
