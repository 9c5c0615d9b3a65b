//! In-memory transport.
//!
//! Records every call and answers from a queue or a responder function.
//! Useful for tests and dry runs; nothing leaves the process.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use winbridge_core::{ConnectError, RawResponse, ShellKind, ShellTransport, TransportFault};

/// One command seen by a `MemoryTransport`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub shell: ShellKind,
    pub command: String,
    pub env: BTreeMap<String, String>,
}

type Responder = Box<dyn Fn(&RecordedCall) -> RawResponse + Send + Sync>;

enum Scripted {
    Response(RawResponse),
    Fault(TransportFault),
}

struct Inner {
    calls: Mutex<Vec<RecordedCall>>,
    queue: Mutex<VecDeque<Scripted>>,
    responder: Option<Responder>,
    rejection: Option<(String, String)>,
    open: Mutex<bool>,
}

/// Scripted transport sharing its state between clones.
///
/// Keep a clone to inspect calls after handing one to a session.
#[derive(Clone)]
pub struct MemoryTransport {
    inner: Arc<Inner>,
}

impl MemoryTransport {
    /// Transport where every command succeeds with empty output.
    #[must_use]
    pub fn new() -> Self {
        Self::build(None, None)
    }

    /// Transport answering unqueued calls with `responder`.
    #[must_use]
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&RecordedCall) -> RawResponse + Send + Sync + 'static,
    {
        Self::build(Some(Box::new(responder)), None)
    }

    /// Transport whose handshake rejects the credentials.
    #[must_use]
    pub fn rejecting_credentials(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self::build(None, Some((host.into(), username.into())))
    }

    fn build(responder: Option<Responder>, rejection: Option<(String, String)>) -> Self {
        Self {
            inner: Arc::new(Inner {
                calls: Mutex::new(Vec::new()),
                queue: Mutex::new(VecDeque::new()),
                responder,
                rejection,
                open: Mutex::new(false),
            }),
        }
    }

    /// Queue a response for the next unanswered call.
    pub fn push_response(&self, response: RawResponse) {
        self.queue().push_back(Scripted::Response(response));
    }

    /// Queue a transport fault for the next unanswered call.
    pub fn push_fault(&self, fault: TransportFault) {
        self.queue().push_back(Scripted::Fault(fault));
    }

    /// Calls made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether the handshake succeeded and no close followed.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.inner.open.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn queue(&self) -> std::sync::MutexGuard<'_, VecDeque<Scripted>> {
        self.inner.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_open(&self, open: bool) {
        *self.inner.open.lock().unwrap_or_else(PoisonError::into_inner) = open;
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShellTransport for MemoryTransport {
    async fn open(&mut self) -> Result<(), ConnectError> {
        if let Some((host, username)) = &self.inner.rejection {
            return Err(ConnectError::AuthenticationRejected {
                host: host.clone(),
                username: username.clone(),
            });
        }
        self.set_open(true);
        Ok(())
    }

    async fn execute(
        &mut self,
        shell: ShellKind,
        command: &str,
        env: &BTreeMap<String, String>,
    ) -> Result<RawResponse, TransportFault> {
        let call = RecordedCall {
            shell,
            command: command.to_string(),
            env: env.clone(),
        };
        self.inner
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call.clone());

        let scripted = self.queue().pop_front();
        match scripted {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::Fault(fault)) => Err(fault),
            None => Ok(self
                .inner
                .responder
                .as_ref()
                .map_or_else(RawResponse::default, |respond| respond(&call))),
        }
    }

    async fn close(&mut self) -> Result<(), TransportFault> {
        self.set_open(false);
        Ok(())
    }
}
