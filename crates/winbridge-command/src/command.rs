//! Command building utilities.

use thiserror::Error;
use winbridge_core::{ExecutionRequest, ShellKind};

use crate::quote::quote;

/// Command build error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandBuildError {
    #[error("Base command is empty")]
    EmptyCommand,
}

/// Builder for one remote command line.
///
/// `base` is shell text authored by the caller (program plus fixed flags)
/// and is emitted verbatim; `params` are literal values quoted for the
/// target shell.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    /// Base command text.
    pub base: String,
    /// Optional literal parameters to append.
    pub params: Option<Vec<String>>,
}

impl CommandBuilder {
    /// Create a new command builder.
    #[must_use]
    pub fn new<S: Into<String>>(base: S) -> Self {
        Self {
            base: base.into(),
            params: None,
        }
    }

    /// Builder for an execution request's command and arguments.
    #[must_use]
    pub fn from_request(request: &ExecutionRequest) -> Self {
        let builder = Self::new(request.command.clone());
        if request.args.is_empty() {
            builder
        } else {
            builder.params(request.args.iter().cloned())
        }
    }

    /// Set parameters.
    #[must_use]
    pub fn params<I>(mut self, params: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.params = Some(params.into_iter().map(Into::into).collect());
        self
    }

    /// Extend parameters.
    #[must_use]
    pub fn extend_params<I>(mut self, more: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let extra: Vec<String> = more.into_iter().map(Into::into).collect();
        match &mut self.params {
            Some(p) => p.extend(extra),
            None => self.params = Some(extra),
        }
        self
    }

    /// Render the command line for `shell`.
    ///
    /// # Errors
    /// Returns error if the base is blank.
    pub fn build(&self, shell: ShellKind) -> Result<String, CommandBuildError> {
        let base = self.base.trim();
        if base.is_empty() {
            return Err(CommandBuildError::EmptyCommand);
        }

        let mut line = base.to_string();
        for param in self.params.iter().flatten() {
            line.push(' ');
            line.push_str(&quote(shell, param));
        }
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_quotes_params_per_shell() {
        let builder = CommandBuilder::new("Remove-Item -LiteralPath").params(["C:\\it's here"]);
        assert_eq!(
            builder.build(ShellKind::PowerShell).unwrap(),
            "Remove-Item -LiteralPath 'C:\\it''s here'"
        );

        let builder = CommandBuilder::new("type").params(["C:\\a b.txt"]);
        assert_eq!(
            builder.build(ShellKind::Cmd).unwrap(),
            "type ^\"C:\\a b.txt^\""
        );
    }

    #[test]
    fn test_build_without_params_is_verbatim() {
        let builder = CommandBuilder::new("  Get-ChildItem | Select -First 1 ");
        assert_eq!(
            builder.build(ShellKind::PowerShell).unwrap(),
            "Get-ChildItem | Select -First 1"
        );
    }

    #[test]
    fn test_extend_params() {
        let builder = CommandBuilder::new("Write-Output")
            .extend_params(["a"])
            .extend_params(["b"]);
        assert_eq!(
            builder.build(ShellKind::PowerShell).unwrap(),
            "Write-Output 'a' 'b'"
        );
    }

    #[test]
    fn test_empty_base_is_rejected() {
        assert_eq!(
            CommandBuilder::new("   ").build(ShellKind::Cmd),
            Err(CommandBuildError::EmptyCommand)
        );
    }

    #[test]
    fn test_from_request() {
        let request = ExecutionRequest::new("Write-Output").args(["x y"]);
        assert_eq!(
            CommandBuilder::from_request(&request)
                .build(ShellKind::PowerShell)
                .unwrap(),
            "Write-Output 'x y'"
        );
    }
}
