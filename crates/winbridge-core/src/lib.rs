//! Core abstractions for the WinRM execution bridge.
//!
//! This crate provides the fundamental building blocks:
//! - `HostIdentity` / `ConnectorData` - Per-host connection attributes
//! - `ExecutionRequest` / `ExecutionResult` - One command round trip
//! - `OutputStore` - Broadcast + history of captured output lines
//! - `ShellTransport` and `Connector` traits
//! - The error taxonomy shared by every layer

pub mod error;
pub mod host;
pub mod inventory;
pub mod output;
pub mod request;
pub mod traits;

pub use error::{ConnectError, ConnectorError, TransportFault};
pub use host::{ConnectorData, HostIdentity, Password, Timeouts, TransportKind};
pub use inventory::{Inventory, InventoryError};
pub use output::{ExecutionResult, OutputEvent, OutputLine, OutputStore};
pub use request::{ExecutionRequest, PrintOptions, ShellKind, UploadSource};
pub use traits::{Connector, RawResponse, ShellTransport};
