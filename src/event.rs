// src/event.rs
use log::debug;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::callbacks::WorkflowCallbacks;
use crate::types::{
    AccessRights, AuthResult, Cause, CertificateDescription, ChangePinResult, Reader, VersionInfo,
    WorkflowProgress, WrapperError,
};

// One variant per observer notification
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowEvent {
    Started,
    Disconnected,
    AuthenticationStarted,
    AuthenticationStartFailed {
        error: String,
    },
    AuthenticationCompleted {
        result: AuthResult,
    },
    ChangePinStarted,
    ChangePinCompleted {
        result: ChangePinResult,
    },
    AccessRights {
        error: Option<String>,
        access_rights: AccessRights,
    },
    Certificate {
        description: CertificateDescription,
    },
    InsertCard {
        error: Option<String>,
    },
    Pause {
        cause: Cause,
    },
    Reader {
        reader: Option<Reader>,
    },
    ReaderList {
        readers: Option<Vec<Reader>>,
    },
    EnterPin {
        error: Option<String>,
        reader: Reader,
    },
    EnterNewPin {
        error: Option<String>,
        reader: Reader,
    },
    EnterPuk {
        error: Option<String>,
        reader: Reader,
    },
    EnterCan {
        error: Option<String>,
        reader: Reader,
    },
    WrapperError {
        error: WrapperError,
    },
    Status {
        progress: WorkflowProgress,
    },
    Info {
        version_info: VersionInfo,
    },
    InternalError {
        error: String,
    },
}

impl WorkflowEvent {
    pub fn wrapper_error(msg: impl Into<String>, error: impl Into<String>) -> Self {
        WorkflowEvent::WrapperError {
            error: WrapperError::new(msg, error),
        }
    }

    /// Invoke the matching observer method.
    pub fn notify(&self, callbacks: &dyn WorkflowCallbacks) {
        match self {
            WorkflowEvent::Started => callbacks.on_started(),
            WorkflowEvent::Disconnected => callbacks.on_disconnected(),
            WorkflowEvent::AuthenticationStarted => callbacks.on_authentication_started(),
            WorkflowEvent::AuthenticationStartFailed { error } => {
                callbacks.on_authentication_start_failed(error)
            }
            WorkflowEvent::AuthenticationCompleted { result } => {
                callbacks.on_authentication_completed(result)
            }
            WorkflowEvent::ChangePinStarted => callbacks.on_change_pin_started(),
            WorkflowEvent::ChangePinCompleted { result } => {
                callbacks.on_change_pin_completed(result)
            }
            WorkflowEvent::AccessRights {
                error,
                access_rights,
            } => callbacks.on_access_rights(error.as_deref(), access_rights),
            WorkflowEvent::Certificate { description } => callbacks.on_certificate(description),
            WorkflowEvent::InsertCard { error } => callbacks.on_insert_card(error.as_deref()),
            WorkflowEvent::Pause { cause } => callbacks.on_pause(*cause),
            WorkflowEvent::Reader { reader } => callbacks.on_reader(reader.as_ref()),
            WorkflowEvent::ReaderList { readers } => callbacks.on_reader_list(readers.as_deref()),
            WorkflowEvent::EnterPin { error, reader } => {
                callbacks.on_enter_pin(error.as_deref(), reader)
            }
            WorkflowEvent::EnterNewPin { error, reader } => {
                callbacks.on_enter_new_pin(error.as_deref(), reader)
            }
            WorkflowEvent::EnterPuk { error, reader } => {
                callbacks.on_enter_puk(error.as_deref(), reader)
            }
            WorkflowEvent::EnterCan { error, reader } => {
                callbacks.on_enter_can(error.as_deref(), reader)
            }
            WorkflowEvent::WrapperError { error } => callbacks.on_wrapper_error(error),
            WorkflowEvent::Status { progress } => callbacks.on_status(progress),
            WorkflowEvent::Info { version_info } => callbacks.on_info(version_info),
            WorkflowEvent::InternalError { error } => callbacks.on_internal_error(error),
        }
    }
}

/// Observer that republishes every notification as a [`WorkflowEvent`] on a
/// broadcast channel.
pub struct EventForwarder {
    tx: broadcast::Sender<WorkflowEvent>,
}

impl EventForwarder {
    pub fn new(tx: broadcast::Sender<WorkflowEvent>) -> Self {
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.tx.subscribe()
    }

    fn forward(&self, event: WorkflowEvent) {
        if self.tx.send(event).is_err() {
            debug!("No subscriber for workflow event");
        }
    }
}

impl WorkflowCallbacks for EventForwarder {
    fn on_started(&self) {
        self.forward(WorkflowEvent::Started);
    }

    fn on_disconnected(&self) {
        self.forward(WorkflowEvent::Disconnected);
    }

    fn on_authentication_started(&self) {
        self.forward(WorkflowEvent::AuthenticationStarted);
    }

    fn on_authentication_start_failed(&self, error: &str) {
        self.forward(WorkflowEvent::AuthenticationStartFailed {
            error: error.to_owned(),
        });
    }

    fn on_authentication_completed(&self, auth_result: &AuthResult) {
        self.forward(WorkflowEvent::AuthenticationCompleted {
            result: auth_result.clone(),
        });
    }

    fn on_change_pin_started(&self) {
        self.forward(WorkflowEvent::ChangePinStarted);
    }

    fn on_change_pin_completed(&self, change_pin_result: &ChangePinResult) {
        self.forward(WorkflowEvent::ChangePinCompleted {
            result: change_pin_result.clone(),
        });
    }

    fn on_access_rights(&self, error: Option<&str>, access_rights: &AccessRights) {
        self.forward(WorkflowEvent::AccessRights {
            error: error.map(str::to_owned),
            access_rights: access_rights.clone(),
        });
    }

    fn on_certificate(&self, certificate_description: &CertificateDescription) {
        self.forward(WorkflowEvent::Certificate {
            description: certificate_description.clone(),
        });
    }

    fn on_insert_card(&self, error: Option<&str>) {
        self.forward(WorkflowEvent::InsertCard {
            error: error.map(str::to_owned),
        });
    }

    fn on_pause(&self, cause: Cause) {
        self.forward(WorkflowEvent::Pause { cause });
    }

    fn on_reader(&self, reader: Option<&Reader>) {
        self.forward(WorkflowEvent::Reader {
            reader: reader.cloned(),
        });
    }

    fn on_reader_list(&self, readers: Option<&[Reader]>) {
        self.forward(WorkflowEvent::ReaderList {
            readers: readers.map(<[Reader]>::to_vec),
        });
    }

    fn on_enter_pin(&self, error: Option<&str>, reader: &Reader) {
        self.forward(WorkflowEvent::EnterPin {
            error: error.map(str::to_owned),
            reader: reader.clone(),
        });
    }

    fn on_enter_new_pin(&self, error: Option<&str>, reader: &Reader) {
        self.forward(WorkflowEvent::EnterNewPin {
            error: error.map(str::to_owned),
            reader: reader.clone(),
        });
    }

    fn on_enter_puk(&self, error: Option<&str>, reader: &Reader) {
        self.forward(WorkflowEvent::EnterPuk {
            error: error.map(str::to_owned),
            reader: reader.clone(),
        });
    }

    fn on_enter_can(&self, error: Option<&str>, reader: &Reader) {
        self.forward(WorkflowEvent::EnterCan {
            error: error.map(str::to_owned),
            reader: reader.clone(),
        });
    }

    fn on_wrapper_error(&self, error: &WrapperError) {
        self.forward(WorkflowEvent::WrapperError {
            error: error.clone(),
        });
    }

    fn on_status(&self, workflow_progress: &WorkflowProgress) {
        self.forward(WorkflowEvent::Status {
            progress: workflow_progress.clone(),
        });
    }

    fn on_info(&self, version_info: &VersionInfo) {
        self.forward(WorkflowEvent::Info {
            version_info: version_info.clone(),
        });
    }

    fn on_internal_error(&self, error: &str) {
        self.forward(WorkflowEvent::InternalError {
            error: error.to_owned(),
        });
    }
}
