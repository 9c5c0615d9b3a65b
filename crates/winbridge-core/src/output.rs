//! Command results and the broadcast + history output store.

use std::{
    collections::VecDeque,
    sync::{PoisonError, RwLock},
};

use futures::{StreamExt, future};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// History size limit (4 MB of line text).
const HISTORY_BYTES: usize = 4 * 1024 * 1024;

/// One captured line, tagged with its stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stream", content = "line", rename_all = "snake_case")]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

impl OutputLine {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Stdout(s) | Self::Stderr(s) => s,
        }
    }

    #[must_use]
    pub const fn is_stderr(&self) -> bool {
        matches!(self, Self::Stderr(_))
    }
}

/// Outcome of one remote command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub success: bool,
}

impl ExecutionResult {
    #[must_use]
    pub const fn new(exit_code: i32, stdout: Vec<String>, stderr: Vec<String>, success: bool) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            success,
        }
    }

    /// Both streams merged into one sequence, stdout first.
    ///
    /// The remote endpoint hands back complete buffers, so the merge keeps
    /// each stream's own order and places stdout ahead of stderr.
    #[must_use]
    pub fn combined(&self) -> Vec<OutputLine> {
        self.stdout
            .iter()
            .cloned()
            .map(OutputLine::Stdout)
            .chain(self.stderr.iter().cloned().map(OutputLine::Stderr))
            .collect()
    }
}

/// Event pushed through an `OutputStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    Line(OutputLine),
    /// The command finished; no more lines follow.
    Finished { exit_code: i32, success: bool },
}

impl OutputEvent {
    fn approx_bytes(&self) -> usize {
        match self {
            Self::Line(line) => line.text().len() + 8,
            Self::Finished { .. } => 8,
        }
    }
}

#[derive(Clone)]
struct StoredEvent {
    event: OutputEvent,
    bytes: usize,
}

struct Inner {
    history: VecDeque<StoredEvent>,
    total_bytes: usize,
}

/// Output store with broadcast and history support.
///
/// Lines become visible to live listeners as soon as they are pushed;
/// late subscribers replay history first.
pub struct OutputStore {
    inner: RwLock<Inner>,
    sender: broadcast::Sender<OutputEvent>,
}

impl Default for OutputStore {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputStore {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(4096);
        Self {
            inner: RwLock::new(Inner {
                history: VecDeque::with_capacity(32),
                total_bytes: 0,
            }),
            sender,
        }
    }

    /// Push an event to both live listeners and history.
    pub fn push(&self, event: OutputEvent) {
        let _ = self.sender.send(event.clone()); // live listeners
        let bytes = event.approx_bytes();

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        while inner.total_bytes.saturating_add(bytes) > HISTORY_BYTES {
            if let Some(front) = inner.history.pop_front() {
                inner.total_bytes = inner.total_bytes.saturating_sub(front.bytes);
            } else {
                break;
            }
        }
        inner.history.push_back(StoredEvent { event, bytes });
        inner.total_bytes = inner.total_bytes.saturating_add(bytes);
    }

    pub fn push_stdout<S: Into<String>>(&self, s: S) {
        self.push(OutputEvent::Line(OutputLine::Stdout(s.into())));
    }

    pub fn push_stderr<S: Into<String>>(&self, s: S) {
        self.push(OutputEvent::Line(OutputLine::Stderr(s.into())));
    }

    pub fn push_finished(&self, exit_code: i32, success: bool) {
        self.push(OutputEvent::Finished { exit_code, success });
    }

    /// Get a receiver for live updates.
    #[must_use]
    pub fn get_receiver(&self) -> broadcast::Receiver<OutputEvent> {
        self.sender.subscribe()
    }

    /// Snapshot of the history.
    #[must_use]
    pub fn get_history(&self) -> Vec<OutputEvent> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .iter()
            .map(|s| s.event.clone())
            .collect()
    }

    /// Lines in history, in push order.
    #[must_use]
    pub fn lines(&self) -> Vec<OutputLine> {
        self.get_history()
            .into_iter()
            .filter_map(|event| match event {
                OutputEvent::Line(line) => Some(line),
                OutputEvent::Finished { .. } => None,
            })
            .collect()
    }

    /// Stream that yields history first, then live updates.
    #[must_use]
    pub fn history_plus_stream(&self) -> futures::stream::BoxStream<'static, OutputEvent> {
        let (history, rx) = (self.get_history(), self.get_receiver());

        let hist = futures::stream::iter(history);
        let live = BroadcastStream::new(rx).filter_map(|res| async move { res.ok() });

        Box::pin(hist.chain(live))
    }

    /// Stream of lines for the current command (until `Finished`).
    #[must_use]
    pub fn line_stream(&self) -> futures::stream::BoxStream<'static, OutputLine> {
        self.history_plus_stream()
            .take_while(|event| future::ready(!matches!(event, OutputEvent::Finished { .. })))
            .filter_map(|event| async move {
                match event {
                    OutputEvent::Line(line) => Some(line),
                    OutputEvent::Finished { .. } => None,
                }
            })
            .boxed()
    }
}
