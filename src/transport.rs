// src/transport.rs
use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, error, info, warn};

use crate::error::TransportError;
use crate::nfc::NfcTag;
use crate::protocol::Command;
use crate::util::lock;

pub type MessageHandler = Arc<dyn Fn(String) + Send + Sync>;
pub type DisconnectHandler = Arc<dyn Fn() + Send + Sync>;

/// Handlers passed to [`SessionTransport::bind`].
///
/// Exactly one of `on_connected` and `on_connection_failed` fires per bind.
/// `on_message_received` gets every raw JSON message of the session;
/// `on_disconnected` fires if the remote goes away after `on_connected`.
pub struct BindCallbacks {
    pub on_connected: Box<dyn FnOnce() + Send>,
    pub on_connection_failed: Box<dyn FnOnce() + Send>,
    pub on_message_received: MessageHandler,
    pub on_disconnected: DisconnectHandler,
}

/// Connection to the remote eID service.
///
/// This is the only place that knows how the remote is reached. `send` and
/// `update_nfc_tag` return `false` without a live session instead of failing.
pub trait SessionTransport: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Asynchronous: the outcome is reported through `callbacks`.
    fn bind(&self, callbacks: BindCallbacks);

    /// Idempotent. No message is delivered after it returns.
    fn unbind(&self);

    fn send(&self, command: &Command) -> bool;

    fn update_nfc_tag(&self, tag: &NfcTag) -> bool;
}

// Requests TO the remote side of a ChannelTransport
#[derive(Clone, Debug, PartialEq)]
pub enum RemoteRequest {
    Bind,
    Unbind,
    Send { session_id: String, json: String },
    UpdateNfcTag { session_id: String, tag: NfcTag },
}

struct PendingBind {
    on_connected: Box<dyn FnOnce() + Send>,
    on_connection_failed: Box<dyn FnOnce() + Send>,
}

#[derive(Clone)]
struct Handlers {
    on_message_received: MessageHandler,
    on_disconnected: DisconnectHandler,
}

#[derive(Default)]
struct Shared {
    session_id: Mutex<Option<String>>,
    pending: Mutex<Option<PendingBind>>,
    handlers: Mutex<Option<Handlers>>,
}

impl Shared {
    fn session_id(&self) -> Option<String> {
        lock(&self.session_id).clone()
    }

    fn reset(&self) {
        *lock(&self.session_id) = None;
        *lock(&self.pending) = None;
        *lock(&self.handlers) = None;
    }
}

/// [`SessionTransport`] over a pair of channels.
///
/// The platform glue (a binder stub, a pipe, a socket) owns the
/// [`RemoteEndpoint`]: it drains [`RemoteRequest`]s and reports the session
/// state and inbound JSON back. The transport counts as connected once the
/// remote reported a session id.
pub struct ChannelTransport {
    shared: Arc<Shared>,
    requests: Sender<RemoteRequest>,
}

pub struct RemoteEndpoint {
    shared: Arc<Shared>,
    requests: Receiver<RemoteRequest>,
}

pub fn channel_transport() -> (ChannelTransport, RemoteEndpoint) {
    let shared = Arc::new(Shared::default());
    let (tx, rx) = unbounded();
    (
        ChannelTransport {
            shared: shared.clone(),
            requests: tx,
        },
        RemoteEndpoint {
            shared,
            requests: rx,
        },
    )
}

impl ChannelTransport {
    fn submit(&self, request: RemoteRequest) -> Result<(), TransportError> {
        self.requests
            .send(request)
            .map_err(|_| TransportError::Closed)
    }

    fn send_json(&self, command: &Command) -> Result<(), TransportError> {
        let session_id = self.shared.session_id().ok_or(TransportError::NotConnected)?;
        let json = command.to_json()?;
        self.submit(RemoteRequest::Send { session_id, json })
    }
}

impl SessionTransport for ChannelTransport {
    fn is_connected(&self) -> bool {
        lock(&self.shared.session_id).is_some()
    }

    fn bind(&self, callbacks: BindCallbacks) {
        let BindCallbacks {
            on_connected,
            on_connection_failed,
            on_message_received,
            on_disconnected,
        } = callbacks;

        *lock(&self.shared.handlers) = Some(Handlers {
            on_message_received,
            on_disconnected,
        });
        *lock(&self.shared.pending) = Some(PendingBind {
            on_connected,
            on_connection_failed,
        });

        if let Err(e) = self.submit(RemoteRequest::Bind) {
            error!("Could not bind remote service: {}", e);
            *lock(&self.shared.handlers) = None;
            let pending = lock(&self.shared.pending).take();
            if let Some(pending) = pending {
                (pending.on_connection_failed)();
            }
        }
    }

    fn unbind(&self) {
        self.shared.reset();
        if self.submit(RemoteRequest::Unbind).is_err() {
            debug!("Remote endpoint already gone");
        }
    }

    fn send(&self, command: &Command) -> bool {
        match self.send_json(command) {
            Ok(()) => true,
            Err(e) => {
                debug!("Could not send {}: {}", command.tag(), e);
                false
            }
        }
    }

    fn update_nfc_tag(&self, tag: &NfcTag) -> bool {
        let Some(session_id) = self.shared.session_id() else {
            return false;
        };
        match self.submit(RemoteRequest::UpdateNfcTag {
            session_id,
            tag: tag.clone(),
        }) {
            Ok(()) => true,
            Err(e) => {
                debug!("Could not update nfc tag: {}", e);
                false
            }
        }
    }
}

impl RemoteEndpoint {
    pub fn requests(&self) -> &Receiver<RemoteRequest> {
        &self.requests
    }

    /// The remote accepted the pending bind and generated a session id.
    pub fn session_established(&self, session_id: impl Into<String>) {
        let pending = lock(&self.shared.pending).take();
        let Some(pending) = pending else {
            warn!("Session established without pending bind");
            return;
        };
        let session_id = session_id.into();
        info!("Remote session {} established", session_id);
        *lock(&self.shared.session_id) = Some(session_id);
        (pending.on_connected)();
    }

    pub fn connection_failed(&self) {
        let pending = lock(&self.shared.pending).take();
        *lock(&self.shared.handlers) = None;
        match pending {
            Some(pending) => (pending.on_connection_failed)(),
            None => warn!("Connection failure without pending bind"),
        }
    }

    /// Deliver a raw JSON message. Dropped without a live session.
    pub fn receive(&self, json: impl Into<String>) {
        if self.shared.session_id().is_none() {
            debug!("Dropping message outside of a session");
            return;
        }
        let handlers = lock(&self.shared.handlers).clone();
        if let Some(handlers) = handlers {
            (handlers.on_message_received)(json.into());
        }
    }

    /// The remote went away after the session was established.
    pub fn disconnected(&self) {
        let had_session = lock(&self.shared.session_id).take().is_some();
        let handlers = lock(&self.shared.handlers).take();
        info!("Remote service disconnected");
        if let (true, Some(handlers)) = (had_session, handlers) {
            (handlers.on_disconnected)();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::nfc::ISO_DEP;

    #[derive(Default)]
    struct Counters {
        connected: AtomicUsize,
        failed: AtomicUsize,
        disconnected: AtomicUsize,
        messages: Mutex<Vec<String>>,
    }

    fn callbacks(counters: &Arc<Counters>) -> BindCallbacks {
        let (c1, c2, c3, c4) = (
            counters.clone(),
            counters.clone(),
            counters.clone(),
            counters.clone(),
        );
        BindCallbacks {
            on_connected: Box::new(move || {
                c1.connected.fetch_add(1, Ordering::SeqCst);
            }),
            on_connection_failed: Box::new(move || {
                c2.failed.fetch_add(1, Ordering::SeqCst);
            }),
            on_message_received: Arc::new(move |json| c3.messages.lock().unwrap().push(json)),
            on_disconnected: Arc::new(move || {
                c4.disconnected.fetch_add(1, Ordering::SeqCst);
            }),
        }
    }

    #[test]
    fn bind_then_session_established() {
        let (transport, remote) = channel_transport();
        let counters = Arc::new(Counters::default());

        transport.bind(callbacks(&counters));
        assert_eq!(remote.requests().try_recv().unwrap(), RemoteRequest::Bind);
        assert!(!transport.is_connected());
        assert!(!transport.send(&Command::GetInfo));

        remote.session_established("4711");
        assert!(transport.is_connected());
        assert_eq!(counters.connected.load(Ordering::SeqCst), 1);

        assert!(transport.send(&Command::GetInfo));
        assert_eq!(
            remote.requests().try_recv().unwrap(),
            RemoteRequest::Send {
                session_id: "4711".into(),
                json: r#"{"cmd":"GET_INFO"}"#.into()
            }
        );

        let tag = NfcTag::new(vec![1, 2, 3], &[ISO_DEP]);
        assert!(transport.update_nfc_tag(&tag));
        assert_eq!(
            remote.requests().try_recv().unwrap(),
            RemoteRequest::UpdateNfcTag {
                session_id: "4711".into(),
                tag
            }
        );

        remote.receive(r#"{"msg":"INSERT_CARD"}"#);
        assert_eq!(
            *counters.messages.lock().unwrap(),
            vec![r#"{"msg":"INSERT_CARD"}"#.to_string()]
        );
    }

    #[test]
    fn failed_bind_fires_once() {
        let (transport, remote) = channel_transport();
        let counters = Arc::new(Counters::default());

        transport.bind(callbacks(&counters));
        remote.connection_failed();
        remote.connection_failed();
        remote.session_established("late");

        assert_eq!(counters.failed.load(Ordering::SeqCst), 1);
        assert_eq!(counters.connected.load(Ordering::SeqCst), 0);
        assert!(!transport.is_connected());
    }

    #[test]
    fn bind_without_remote_fails() {
        let (transport, remote) = channel_transport();
        drop(remote);
        let counters = Arc::new(Counters::default());

        transport.bind(callbacks(&counters));
        assert_eq!(counters.failed.load(Ordering::SeqCst), 1);
        assert!(!transport.is_connected());
    }

    #[test]
    fn unbind_stops_delivery() {
        let (transport, remote) = channel_transport();
        let counters = Arc::new(Counters::default());

        transport.bind(callbacks(&counters));
        remote.session_established("1");
        transport.unbind();
        transport.unbind();

        assert!(!transport.is_connected());
        assert!(!transport.send(&Command::Cancel));
        remote.receive(r#"{"msg":"AUTH"}"#);
        remote.disconnected();
        assert!(counters.messages.lock().unwrap().is_empty());
        assert_eq!(counters.disconnected.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn remote_disconnect_is_reported() {
        let (transport, remote) = channel_transport();
        let counters = Arc::new(Counters::default());

        transport.bind(callbacks(&counters));
        remote.session_established("1");
        remote.disconnected();

        assert!(!transport.is_connected());
        assert_eq!(counters.disconnected.load(Ordering::SeqCst), 1);
        assert!(!transport.update_nfc_tag(&NfcTag::new(vec![], &[ISO_DEP])));
    }
}
