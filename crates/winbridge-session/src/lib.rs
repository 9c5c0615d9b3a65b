//! Remote sessions for WinRM hosts.
//!
//! Provides:
//! - `RemoteSession` - One authenticated handle per host, one command at a time
//! - `WsManTransport` - WS-Management over HTTP(S) with basic authentication
//! - `MemoryTransport` - Scripted in-process transport (feature: memory)

pub mod clixml;
pub mod session;
pub mod wsman;

#[cfg(feature = "memory")]
pub mod memory;

pub use session::RemoteSession;
pub use wsman::WsManTransport;

#[cfg(feature = "memory")]
pub use memory::{MemoryTransport, RecordedCall};
