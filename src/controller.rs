// src/controller.rs
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use log::{debug, error, info, warn};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use url::Url;

use crate::callbacks::WorkflowCallbacks;
use crate::dispatch::events_for;
use crate::error::NfcError;
use crate::event::WorkflowEvent;
use crate::nfc::NfcTag;
use crate::protocol::{Command, Message};
use crate::transport::{BindCallbacks, SessionTransport};
use crate::types::{AccessRight, Simulator};
use crate::util::lock;

const TAG: &str = "WorkflowController";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    /// `bind` is in flight.
    Starting,
    Started,
}

type Observers = Arc<Mutex<Vec<Arc<dyn WorkflowCallbacks>>>>;

// Work for the delivery task, kept in one queue so the order holds
enum Delivery {
    Inbound(String),
    Event(WorkflowEvent),
}

// Work for the send task
enum Outbound {
    Command {
        operation: &'static str,
        command: Command,
    },
    Tag(NfcTag),
}

impl Outbound {
    fn operation(&self) -> &'static str {
        match self {
            Outbound::Command { operation, .. } => *operation,
            Outbound::Tag(_) => "on_nfc_tag_detected",
        }
    }
}

struct Connection {
    transport: Arc<dyn SessionTransport>,
    state: Mutex<ControllerState>,
}

impl Connection {
    // A lost transport turns Started back into Idle
    fn effective(&self, stored: ControllerState) -> ControllerState {
        match stored {
            ControllerState::Started if !self.transport.is_connected() => ControllerState::Idle,
            other => other,
        }
    }

    fn state(&self) -> ControllerState {
        let stored = *lock(&self.state);
        self.effective(stored)
    }

    fn is_started(&self) -> bool {
        self.state() == ControllerState::Started
    }

    // Runs on a blocking thread. Returns the error to deliver, if any.
    fn execute(&self, job: Outbound) -> Option<WorkflowEvent> {
        let operation = job.operation();
        if !self.is_started() {
            return Some(not_started(operation));
        }

        let delivered = match &job {
            Outbound::Command { command, .. } => {
                debug!("Sending {}", command.tag());
                self.transport.send(command)
            }
            Outbound::Tag(tag) => self.transport.update_nfc_tag(tag),
        };
        if delivered {
            return None;
        }
        if !self.is_started() {
            return Some(not_started(operation));
        }
        warn!("Transport rejected {}", operation);
        None
    }
}

fn not_started(operation: &str) -> WorkflowEvent {
    WorkflowEvent::wrapper_error(format!("{}::{}", TAG, operation), "Not started")
}

fn deliver(delivery: &UnboundedSender<Delivery>, item: Delivery) {
    if delivery.send(item).is_err() {
        debug!("Delivery stopped, dropping notification");
    }
}

struct Inner {
    connection: Arc<Connection>,
    observers: Observers,
    outbound: UnboundedSender<Outbound>,
    delivery: UnboundedSender<Delivery>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        for worker in lock(&self.workers).drain(..) {
            worker.abort();
        }
    }
}

/// Controls the authentication and PIN change workflows of the remote eID
/// service.
///
/// `start` binds the transport; wait for `on_started` before using the
/// workflow operations. Every operation returns immediately: the command is
/// sent from a background task and any failure, including calling it while
/// not started, arrives as `on_wrapper_error` on the registered observers.
/// Whether a command fits the current remote workflow is decided by the
/// remote, which answers illegal ones with `BAD_STATE`.
///
/// Handles are cheap to clone and share one controller.
#[derive(Clone)]
pub struct WorkflowController {
    inner: Arc<Inner>,
}

impl WorkflowController {
    /// Creates the controller and spawns its send and delivery tasks on
    /// `runtime`.
    pub fn new<T: SessionTransport + 'static>(transport: Arc<T>, runtime: &Handle) -> Self {
        let connection = Arc::new(Connection {
            transport,
            state: Mutex::new(ControllerState::Idle),
        });
        let observers: Observers = Arc::new(Mutex::new(Vec::new()));
        let (outbound_tx, outbound_rx) = unbounded_channel();
        let (delivery_tx, delivery_rx) = unbounded_channel();

        let workers = vec![
            runtime.spawn(run_outbound(
                outbound_rx,
                connection.clone(),
                delivery_tx.clone(),
            )),
            runtime.spawn(run_delivery(delivery_rx, observers.clone())),
        ];

        Self {
            inner: Arc::new(Inner {
                connection,
                observers,
                outbound: outbound_tx,
                delivery: delivery_tx,
                workers: Mutex::new(workers),
            }),
        }
    }

    pub fn state(&self) -> ControllerState {
        self.inner.connection.state()
    }

    /// Whether the controller is bound and ready for workflow operations.
    pub fn is_started(&self) -> bool {
        self.inner.connection.is_started()
    }

    /// Bind the remote service. Does nothing while starting or started.
    ///
    /// Success is reported with `on_started`, failure with an
    /// `on_wrapper_error` for `WorkflowController::start`.
    pub fn start(&self) {
        let connection = &self.inner.connection;
        {
            let mut state = lock(&connection.state);
            match connection.effective(*state) {
                ControllerState::Starting => {
                    debug!("{} is already starting", TAG);
                    return;
                }
                ControllerState::Started => {
                    debug!("{} already started", TAG);
                    return;
                }
                ControllerState::Idle => *state = ControllerState::Starting,
            }
        }

        info!("Binding remote eID service");
        connection.transport.bind(self.bind_callbacks());
    }

    /// Release the remote service. No notification follows.
    pub fn stop(&self) {
        let connection = &self.inner.connection;
        {
            let mut state = lock(&connection.state);
            if connection.effective(*state) == ControllerState::Idle {
                debug!("{} not started", TAG);
                return;
            }
            *state = ControllerState::Idle;
        }

        info!("Unbinding remote eID service");
        connection.transport.unbind();
    }

    /// Stop and cancel every pending send and notification. The controller
    /// is unusable afterwards.
    pub fn shutdown(&self) {
        self.stop();
        for worker in lock(&self.inner.workers).drain(..) {
            worker.abort();
        }
    }

    /// Registering the same observer twice has no effect.
    pub fn register_callbacks(&self, callbacks: Arc<dyn WorkflowCallbacks>) {
        let mut observers = lock(&self.inner.observers);
        if observers.iter().any(|o| same_observer(o, &callbacks)) {
            return;
        }
        observers.push(callbacks);
    }

    pub fn unregister_callbacks(&self, callbacks: &Arc<dyn WorkflowCallbacks>) {
        lock(&self.inner.observers).retain(|o| !same_observer(o, callbacks));
    }

    /// Start an authentication with the TcToken at `tc_token_url`.
    ///
    /// `developer_mode` enables test cards and relaxes some checks of
    /// BSI TR-03124-1. With `status` the remote reports progress through
    /// `on_status`.
    pub fn start_authentication(&self, tc_token_url: &Url, developer_mode: bool, status: bool) {
        self.send(
            "start_authentication",
            Command::RunAuth {
                tc_token_url: tc_token_url.to_string(),
                developer_mode,
                status,
            },
        );
    }

    pub fn start_change_pin(&self, status: bool) {
        self.send("start_change_pin", Command::RunChangePin { status });
    }

    /// Enabled optional rights. An empty list disables every optional right.
    pub fn set_access_rights(&self, access_rights: &[AccessRight]) {
        let chat = access_rights
            .iter()
            .map(|right| right.raw_name().to_owned())
            .collect();
        self.send("set_access_rights", Command::SetAccessRights { chat });
    }

    pub fn get_access_rights(&self) {
        self.send("get_access_rights", Command::GetAccessRights);
    }

    pub fn get_info(&self) {
        self.send("get_info", Command::GetInfo);
    }

    /// 6 digits, 5 for a transport PIN. `None` for readers with keypad.
    ///
    /// A wrong PIN is answered with another `on_enter_pin` and a lower retry
    /// counter; at 1 the remote asks for the CAN first, at 0 for the PUK.
    pub fn set_pin(&self, pin: Option<&str>) {
        self.send(
            "set_pin",
            Command::SetPin {
                value: pin.map(str::to_owned),
            },
        );
    }

    pub fn set_new_pin(&self, new_pin: Option<&str>) {
        self.send(
            "set_new_pin",
            Command::SetNewPin {
                value: new_pin.map(str::to_owned),
            },
        );
    }

    /// 10 digits. Unblocks the PIN, which gets a retry counter of 3 again.
    pub fn set_puk(&self, puk: Option<&str>) {
        self.send(
            "set_puk",
            Command::SetPuk {
                value: puk.map(str::to_owned),
            },
        );
    }

    /// 6 digits. Enables the last PIN attempt.
    pub fn set_can(&self, can: Option<&str>) {
        self.send(
            "set_can",
            Command::SetCan {
                value: can.map(str::to_owned),
            },
        );
    }

    /// Insert a virtual card into the reader `name`.
    pub fn set_card(&self, name: &str, simulator: Option<Simulator>) {
        self.send(
            "set_card",
            Command::SetCard {
                name: name.to_owned(),
                simulator,
            },
        );
    }

    /// Accept the requested access rights together with the certificate.
    pub fn accept(&self) {
        self.send("accept", Command::Accept);
    }

    pub fn cancel(&self) {
        self.send("cancel", Command::Cancel);
    }

    /// Resume after `on_pause`.
    pub fn continue_workflow(&self) {
        self.send("continue_workflow", Command::ContinueWorkflow);
    }

    pub fn get_certificate(&self) {
        self.send("get_certificate", Command::GetCertificate);
    }

    pub fn get_status(&self) {
        self.send("get_status", Command::GetStatus);
    }

    pub fn get_reader(&self, name: &str) {
        self.send(
            "get_reader",
            Command::GetReader {
                name: name.to_owned(),
            },
        );
    }

    pub fn get_reader_list(&self) {
        self.send("get_reader_list", Command::GetReaderList);
    }

    /// Hand a discovered id card to the remote service.
    ///
    /// Only the foreground application sees NFC tags, so they have to be
    /// passed on. Fails right away for tags without ISO-DEP (ISO 14443-4).
    pub fn on_nfc_tag_detected(&self, tag: NfcTag) -> Result<(), NfcError> {
        tag.ensure_iso_dep()?;
        self.enqueue(Outbound::Tag(tag));
        Ok(())
    }

    fn send(&self, operation: &'static str, command: Command) {
        self.enqueue(Outbound::Command { operation, command });
    }

    fn enqueue(&self, job: Outbound) {
        if self.inner.outbound.send(job).is_err() {
            debug!("{} shut down, dropping request", TAG);
        }
    }

    fn bind_callbacks(&self) -> BindCallbacks {
        let (connected, failed, disconnected) = (
            self.inner.connection.clone(),
            self.inner.connection.clone(),
            self.inner.connection.clone(),
        );
        let (connected_tx, failed_tx, message_tx, disconnected_tx) = (
            self.inner.delivery.clone(),
            self.inner.delivery.clone(),
            self.inner.delivery.clone(),
            self.inner.delivery.clone(),
        );

        BindCallbacks {
            on_connected: Box::new(move || {
                {
                    let mut state = lock(&connected.state);
                    if *state != ControllerState::Starting {
                        debug!("Ignoring connection after stop");
                        return;
                    }
                    *state = ControllerState::Started;
                }
                info!("{} started", TAG);
                deliver(&connected_tx, Delivery::Event(WorkflowEvent::Started));
            }),
            on_connection_failed: Box::new(move || {
                {
                    let mut state = lock(&failed.state);
                    if *state != ControllerState::Starting {
                        debug!("Ignoring connection failure after stop");
                        return;
                    }
                    *state = ControllerState::Idle;
                }
                error!("Could not connect to the remote eID service");
                deliver(
                    &failed_tx,
                    Delivery::Event(WorkflowEvent::wrapper_error(
                        format!("{}::start", TAG),
                        "Connection failed",
                    )),
                );
            }),
            on_message_received: Arc::new(move |json| {
                deliver(&message_tx, Delivery::Inbound(json));
            }),
            on_disconnected: Arc::new(move || {
                {
                    let mut state = lock(&disconnected.state);
                    if *state == ControllerState::Idle {
                        return;
                    }
                    *state = ControllerState::Idle;
                }
                warn!("Lost connection to the remote eID service");
                deliver(&disconnected_tx, Delivery::Event(WorkflowEvent::Disconnected));
            }),
        }
    }
}

fn same_observer(a: &Arc<dyn WorkflowCallbacks>, b: &Arc<dyn WorkflowCallbacks>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

// Sends in submission order, each on a blocking thread since the transport
// may block on IPC
async fn run_outbound(
    mut rx: UnboundedReceiver<Outbound>,
    connection: Arc<Connection>,
    delivery: UnboundedSender<Delivery>,
) {
    while let Some(job) = rx.recv().await {
        let connection = connection.clone();
        match tokio::task::spawn_blocking(move || connection.execute(job)).await {
            Ok(Some(event)) => deliver(&delivery, Delivery::Event(event)),
            Ok(None) => {}
            Err(e) => error!("Send task failed: {}", e),
        }
    }
}

async fn run_delivery(mut rx: UnboundedReceiver<Delivery>, observers: Observers) {
    while let Some(delivery) = rx.recv().await {
        let events = match delivery {
            Delivery::Event(event) => vec![event],
            Delivery::Inbound(json) => {
                debug!("Received message: {}", json);
                match Message::from_json(&json) {
                    Ok(message) => events_for(&message),
                    Err(e) => {
                        error!("Could not parse json message: {}", e);
                        continue;
                    }
                }
            }
        };

        for event in &events {
            let snapshot = lock(&observers).clone();
            for observer in &snapshot {
                // A panicking observer must not end delivery for the others
                let notified = panic::catch_unwind(AssertUnwindSafe(|| {
                    event.notify(observer.as_ref());
                }));
                if notified.is_err() {
                    error!("Observer panicked while handling {:?}", event);
                }
            }
        }
    }
}
