//! Client for the AusweisApp SDK: drives authentication and PIN change
//! workflows of a separately running eID service over its JSON
//! command/message protocol.
//!
//! The [`WorkflowController`] sends [`Command`]s through a
//! [`SessionTransport`], decodes the messages coming back and notifies every
//! registered [`WorkflowCallbacks`] observer.

pub mod bridge;
pub mod callbacks;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod nfc;
pub mod protocol;
pub mod stdio;
pub mod transport;
pub mod types;
mod util;

pub use callbacks::WorkflowCallbacks;
pub use controller::{ControllerState, WorkflowController};
pub use error::{ConfigError, NfcError, TransportError};
pub use event::{EventForwarder, WorkflowEvent};
pub use nfc::{NfcDispatcher, NfcTag};
pub use protocol::{Command, Message};
pub use transport::{
    BindCallbacks, ChannelTransport, RemoteEndpoint, RemoteRequest, SessionTransport,
    channel_transport,
};
pub use types::*;
pub use util::is_number;
