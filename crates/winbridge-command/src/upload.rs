//! PowerShell command templates for chunked uploads.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha2::{Digest, Sha256};

use crate::quote::quote_powershell;

/// Bytes per chunk command.
pub const DEFAULT_CHUNK_SIZE: usize = 2048;

/// How a chunk lands in the staging file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Create or truncate the file with this chunk.
    Create,
    /// Append the chunk to the file.
    Append,
}

impl WriteMode {
    const fn cmdlet(self) -> &'static str {
        match self {
            Self::Create => "Set-Content",
            Self::Append => "Add-Content",
        }
    }
}

/// Staging file name for `remote_filename`.
///
/// Derived from the destination path only, so uploads to different
/// destinations never share a staging file.
#[must_use]
pub fn temp_file_name(remote_filename: &str) -> String {
    let digest = Sha256::digest(remote_filename.as_bytes());
    format!("winbridge-{}", hex::encode(digest))
}

/// Join Windows path components the way `ntpath.join` does for two parts.
#[must_use]
pub fn join_windows_path(dir: &str, name: &str) -> String {
    let dir = dir.trim();
    if dir.is_empty() {
        return name.to_string();
    }
    if dir.ends_with(['\\', '/']) {
        format!("{dir}{name}")
    } else {
        format!("{dir}\\{name}")
    }
}

/// Number of chunk commands for `len` bytes.
#[must_use]
pub const fn chunk_count(len: usize, chunk_size: usize) -> usize {
    len.div_ceil(chunk_size)
}

/// Decode one base64 chunk and write it to `path`.
#[must_use]
pub fn write_chunk_command(chunk: &[u8], path: &str, mode: WriteMode) -> String {
    format!(
        "$data = [System.Convert]::FromBase64String('{}'); {} -LiteralPath {} -Value $data -Encoding Byte",
        BASE64.encode(chunk),
        mode.cmdlet(),
        quote_powershell(path),
    )
}

/// Create `path` as an empty file.
#[must_use]
pub fn create_empty_command(path: &str) -> String {
    format!(
        "[System.IO.File]::WriteAllBytes({}, [byte[]]@())",
        quote_powershell(path)
    )
}

/// Move `from` over `to`, replacing any existing file.
#[must_use]
pub fn move_command(from: &str, to: &str) -> String {
    format!(
        "Move-Item -LiteralPath {} -Destination {} -Force",
        quote_powershell(from),
        quote_powershell(to)
    )
}

/// Query for the remote temp directory.
pub const TEMP_DIR_COMMAND: &str = "[System.IO.Path]::GetTempPath()";
