//! WinRM connector for remote Windows hosts.
//!
//! Provides:
//! - `WinRmConnector` - The connect / run / put capability surface for one host
//! - `CommandExecutor` - Build, dispatch and classify one command
//! - `ChunkedUploader` - File uploads as base64 chunk commands
//! - Facts for the remote temp directory and installed winget packages

pub mod connector;
pub mod executor;
pub mod facts;
pub mod upload;

pub use connector::{WinRmConnector, make_names_data, show_alpha_warning};
pub use executor::{CommandExecutor, split_lines};
pub use facts::{Fact, TempDir, WingetPackages};
pub use upload::{ChunkedUploader, chunk_commands};
