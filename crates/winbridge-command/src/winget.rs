//! winget package commands, as a worked example of command building.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::LazyLock,
};

use regex::Regex;
use thiserror::Error;
use winbridge_core::ShellKind;

use crate::command::{CommandBuildError, CommandBuilder};

/// Lists installed packages as an `Id InstalledVersion` table.
pub const WINGET_PACKAGES_COMMAND: &str =
    "Get-WingetPackage | Select -Property Id, InstalledVersion";

static WINGET_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\S+)\s+(\S+)").expect("static regex"));

/// Installed packages: id -> versions.
pub type InstalledPackages = BTreeMap<String, BTreeSet<String>>;

/// winget error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WingetError {
    #[error("Uninstalling winget packages is not currently supported.")]
    UninstallUnsupported,
    #[error("Invalid package spec: {0:?}")]
    InvalidSpec(String),
    #[error(transparent)]
    Build(#[from] CommandBuildError),
}

/// Parse the output of `WINGET_PACKAGES_COMMAND`.
#[must_use]
pub fn parse_winget_packages(lines: &[String]) -> InstalledPackages {
    let mut packages = InstalledPackages::new();
    for line in lines {
        let Some(caps) = WINGET_LINE.captures(line) else {
            continue;
        };
        let (id, version) = (&caps[1], &caps[2]);
        if id == "Id" || id.starts_with("--") {
            continue;
        }
        packages
            .entry(id.to_string())
            .or_default()
            .insert(version.to_string());
    }
    packages
}

/// A requested package, optionally pinned (`<id>=<version>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub id: String,
    pub version: Option<String>,
}

impl PackageSpec {
    /// Parse `id` or `id=version`.
    ///
    /// # Errors
    /// Returns error on an empty id or version.
    pub fn parse(spec: &str) -> Result<Self, WingetError> {
        let spec = spec.trim();
        let (id, version) = match spec.split_once('=') {
            Some((id, version)) => (id.trim(), Some(version.trim())),
            None => (spec, None),
        };
        if id.is_empty() || version.is_some_and(str::is_empty) {
            return Err(WingetError::InvalidSpec(spec.to_string()));
        }
        Ok(Self {
            id: id.to_string(),
            version: version.map(str::to_string),
        })
    }

    fn is_satisfied_by(&self, installed: &InstalledPackages) -> bool {
        installed.get(&self.id).is_some_and(|versions| {
            self.version
                .as_ref()
                .is_none_or(|wanted| versions.contains(wanted))
        })
    }

    /// `winget install` line for this package.
    ///
    /// # Errors
    /// Never in practice; the base command is fixed.
    pub fn install_command(&self) -> Result<String, WingetError> {
        let mut builder = CommandBuilder::new("winget install --no-upgrade --silent --exact")
            .params([self.id.as_str()]);
        if let Some(version) = &self.version {
            builder = builder.extend_params(["--version", version.as_str()]);
        }
        Ok(format!("{};", builder.build(ShellKind::PowerShell)?))
    }
}

/// Commands that bring `packages` to the requested state.
///
/// Each missing package gets its own install command; packages already
/// present at the requested version are skipped.
///
/// # Errors
/// Returns error for removal requests and malformed specs.
pub fn ensure_packages(
    packages: &[&str],
    present: bool,
    installed: &InstalledPackages,
) -> Result<Vec<String>, WingetError> {
    if packages.is_empty() {
        return Ok(Vec::new());
    }
    if !present {
        return Err(WingetError::UninstallUnsupported);
    }

    let mut commands = Vec::new();
    for spec in packages {
        let spec = PackageSpec::parse(spec)?;
        if spec.is_satisfied_by(installed) {
            tracing::debug!(package = %spec.id, "winget package already installed");
            continue;
        }
        commands.push(spec.install_command()?);
    }
    Ok(commands)
}
