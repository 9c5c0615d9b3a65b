//! Command building for remote Windows shells.
//!
//! Provides:
//! - Quoting for PowerShell and cmd.exe
//! - `CommandBuilder` for program + argument lines
//! - PowerShell `-EncodedCommand` encoding
//! - Chunked upload command templates
//! - winget command and fact helpers

pub mod command;
pub mod encode;
pub mod quote;
pub mod upload;
pub mod winget;

pub use command::{CommandBuildError, CommandBuilder};
pub use encode::{decode_powershell, encode_powershell};
pub use quote::{quote, quote_cmd, quote_powershell};
