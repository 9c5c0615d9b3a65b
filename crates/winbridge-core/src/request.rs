//! Execution requests and upload sources.

use std::{collections::BTreeMap, fmt, path::PathBuf};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Remote command interpreter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShellKind {
    /// Script shell (`powershell`).
    #[default]
    PowerShell,
    /// Legacy command interpreter (`cmd.exe`).
    Cmd,
}

impl ShellKind {
    /// Map a shell executable name to a dialect.
    #[must_use]
    pub fn from_executable(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "ps" | "powershell" | "powershell.exe" | "pwsh" | "pwsh.exe" => Some(Self::PowerShell),
            "cmd" | "cmd.exe" => Some(Self::Cmd),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PowerShell => "ps",
            Self::Cmd => "cmd",
        }
    }
}

impl fmt::Display for ShellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One command to run on a remote host.
///
/// `command` is shell text sent as-is; `args` are literal arguments that
/// get quoted for the target shell and appended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub command: String,
    pub args: Vec<String>,
    pub shell: Option<ShellKind>,
    pub env: BTreeMap<String, String>,
    pub success_exit_codes: Option<Vec<i32>>,
}

impl ExecutionRequest {
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    /// Append literal arguments.
    #[must_use]
    pub fn args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub const fn shell(mut self, shell: ShellKind) -> Self {
        self.shell = Some(shell);
        self
    }

    /// Set one environment variable for the remote process.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Replace the default `{0}` success policy.
    #[must_use]
    pub fn success_exit_codes<I: IntoIterator<Item = i32>>(mut self, codes: I) -> Self {
        self.success_exit_codes = Some(codes.into_iter().collect());
        self
    }

    /// Shell the command runs in; the script shell unless set.
    #[must_use]
    pub fn target_shell(&self) -> ShellKind {
        self.shell.unwrap_or_default()
    }

    /// Classify an exit code under this request's success policy.
    #[must_use]
    pub fn is_success(&self, exit_code: i32) -> bool {
        is_success(exit_code, self.success_exit_codes.as_deref())
    }
}

/// Success-code policy: membership when codes are given, zero otherwise.
///
/// An empty code list counts as not given.
#[must_use]
pub fn is_success(exit_code: i32, success_exit_codes: Option<&[i32]>) -> bool {
    match success_exit_codes {
        Some(codes) if !codes.is_empty() => codes.contains(&exit_code),
        _ => exit_code == 0,
    }
}

/// Echo settings for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrintOptions {
    pub print_input: bool,
    pub print_output: bool,
}

/// Bytes to upload. Read once, front to back.
pub enum UploadSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

impl UploadSource {
    /// Read the whole source into memory.
    ///
    /// # Errors
    /// Returns error if the file or reader fails.
    pub async fn read_all(self) -> std::io::Result<Vec<u8>> {
        match self {
            Self::Path(path) => tokio::fs::read(path).await,
            Self::Bytes(bytes) => Ok(bytes),
            Self::Reader(mut reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                Ok(buf)
            }
        }
    }
}

impl fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Self::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

impl From<Vec<u8>> for UploadSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for UploadSource {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl From<PathBuf> for UploadSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}
