//! A pretend Windows host that understands the upload and fact commands.

#![allow(dead_code)]

use std::{
    collections::BTreeMap,
    io,
    sync::{Arc, Mutex},
};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;
use winbridge_command::{upload::TEMP_DIR_COMMAND, winget::WINGET_PACKAGES_COMMAND};
use winbridge_core::{ConnectorData, HostIdentity, Password, RawResponse};
use winbridge_session::{MemoryTransport, RecordedCall};

pub const TEMP_DIR: &str = "C:\\Users\\vagrant\\AppData\\Local\\Temp\\";

/// stderr of a refused `Move-Item`.
pub const MOVE_DENIED: &str = "Access to the path is denied.";

#[derive(Default)]
struct State {
    files: BTreeMap<String, Vec<u8>>,
    writes: usize,
    fail_writes_after: Option<usize>,
    fail_moves: bool,
}

/// Filesystem-backed responder for a `MemoryTransport`.
#[derive(Clone, Default)]
pub struct FakeWindowsHost {
    state: Arc<Mutex<State>>,
}

impl FakeWindowsHost {
    pub fn transport(&self) -> MemoryTransport {
        let host = self.clone();
        MemoryTransport::with_responder(move |call| host.respond(call))
    }

    /// Make every chunk write after the first `n` fail.
    pub fn fail_writes_after(&self, n: usize) {
        self.state.lock().unwrap().fail_writes_after = Some(n);
    }

    /// Make every `Move-Item` fail.
    pub fn fail_moves(&self) {
        self.state.lock().unwrap().fail_moves = true;
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().files.get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.state.lock().unwrap().files.keys().cloned().collect()
    }

    fn respond(&self, call: &RecordedCall) -> RawResponse {
        let command = call.command.as_str();
        let mut state = self.state.lock().unwrap();

        if command == TEMP_DIR_COMMAND {
            return RawResponse::new(0, format!("{TEMP_DIR}\r\n"), "");
        }
        if command == WINGET_PACKAGES_COMMAND {
            return RawResponse::new(
                0,
                "\r\nId            InstalledVersion\r\n--            ----------------\r\nGit.Git       2.43.0\r\n",
                "",
            );
        }
        if let Some(payload) = literal_after(command, "FromBase64String('") {
            state.writes += 1;
            if state.fail_writes_after.is_some_and(|n| state.writes > n) {
                return RawResponse::new(1, "", "Access to the path is denied.\r\n");
            }
            let path = literal_after(command, "-LiteralPath '").unwrap().to_string();
            let bytes = STANDARD.decode(payload).unwrap();
            let file = state.files.entry(path).or_default();
            if command.contains("Set-Content") {
                *file = bytes;
            } else {
                file.extend(bytes);
            }
            return RawResponse::default();
        }
        if let Some(path) = literal_after(command, "WriteAllBytes('") {
            state.files.insert(path.to_string(), Vec::new());
            return RawResponse::default();
        }
        if command.starts_with("Move-Item") {
            if state.fail_moves {
                return RawResponse::new(1, "", format!("{MOVE_DENIED}\r\n"));
            }
            let from = literal_after(command, "-LiteralPath '").unwrap();
            let to = literal_after(command, "-Destination '").unwrap().to_string();
            return match state.files.remove(from) {
                Some(bytes) => {
                    state.files.insert(to, bytes);
                    RawResponse::default()
                }
                None => RawResponse::new(1, "", format!("Cannot find path '{from}'.\r\n")),
            };
        }
        RawResponse::default()
    }
}

fn literal_after<'a>(command: &'a str, marker: &str) -> Option<&'a str> {
    let start = command.find(marker)? + marker.len();
    let rest = &command[start..];
    rest.find('\'').map(|end| &rest[..end])
}

pub fn identity() -> HostIdentity {
    HostIdentity::new(
        "@winrm/win01",
        ConnectorData {
            winrm_user: Some("vagrant".into()),
            password: Some(Password::new("hunter2")),
            ..ConnectorData::default()
        },
    )
}

pub fn chunk_writes(calls: &[RecordedCall]) -> Vec<&RecordedCall> {
    calls
        .iter()
        .filter(|c| c.command.contains("FromBase64String"))
        .collect()
}

/// Formatted events of the current thread, collected while installed.
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Capture `info` and above until the guard drops.
    pub fn install(&self) -> DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .without_time()
            .with_target(false)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
