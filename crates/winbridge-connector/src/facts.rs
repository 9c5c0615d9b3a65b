//! Host facts: one query command plus a parser for its stdout lines.

use winbridge_command::{
    upload::TEMP_DIR_COMMAND,
    winget::{InstalledPackages, WINGET_PACKAGES_COMMAND, parse_winget_packages},
};
use winbridge_core::ShellKind;

/// A value read from the remote host.
pub trait Fact {
    type Output;

    /// Name used in errors and logs.
    const NAME: &'static str;

    fn command(&self) -> &str;

    fn shell(&self) -> ShellKind {
        ShellKind::PowerShell
    }

    /// Parse the query's stdout lines.
    ///
    /// # Errors
    /// Returns a reason when the output is unusable.
    fn process(&self, stdout: &[String]) -> Result<Self::Output, String>;
}

/// Per-user temporary directory of the remote host.
#[derive(Debug, Clone, Copy, Default)]
pub struct TempDir;

impl Fact for TempDir {
    type Output = String;

    const NAME: &'static str = "temp_dir";

    fn command(&self) -> &str {
        TEMP_DIR_COMMAND
    }

    fn process(&self, stdout: &[String]) -> Result<String, String> {
        stdout
            .iter()
            .map(|line| line.trim())
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| "no path in output".to_string())
    }
}

/// Installed winget packages, id to versions.
#[derive(Debug, Clone, Copy, Default)]
pub struct WingetPackages;

impl Fact for WingetPackages {
    type Output = InstalledPackages;

    const NAME: &'static str = "winget_packages";

    fn command(&self) -> &str {
        WINGET_PACKAGES_COMMAND
    }

    fn process(&self, stdout: &[String]) -> Result<InstalledPackages, String> {
        Ok(parse_winget_packages(stdout))
    }
}
