// src/nfc.rs
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};

use crate::controller::WorkflowController;
use crate::error::NfcError;

// Technology name an ISO 14443-4 capable tag reports
pub const ISO_DEP: &str = "android.nfc.tech.IsoDep";

/// Raw handle of a discovered NFC tag as handed over by the platform.
#[derive(Clone, PartialEq, Eq)]
pub struct NfcTag {
    pub id: Vec<u8>,
    pub tech_list: Vec<String>,
}

impl NfcTag {
    pub fn new(id: impl Into<Vec<u8>>, tech_list: &[&str]) -> Self {
        Self {
            id: id.into(),
            tech_list: tech_list.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn is_iso_dep(&self) -> bool {
        self.tech_list.iter().any(|t| t == ISO_DEP)
    }

    pub(crate) fn ensure_iso_dep(&self) -> Result<(), NfcError> {
        if self.is_iso_dep() {
            Ok(())
        } else {
            Err(NfcError::UnsupportedTag)
        }
    }
}

impl fmt::Debug for NfcTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NfcTag")
            .field("id", &hex::encode(&self.id))
            .field("tech_list", &self.tech_list)
            .finish()
    }
}

/// Gate between the platform's tag discovery and the controller.
///
/// While started, ISO-DEP tags are passed on to
/// [`WorkflowController::on_nfc_tag_detected`]; every other tag is ignored.
/// Stop it whenever the application leaves the foreground.
pub struct NfcDispatcher {
    controller: WorkflowController,
    started: AtomicBool,
}

impl NfcDispatcher {
    pub fn new(controller: WorkflowController) -> Self {
        Self {
            controller,
            started: AtomicBool::new(false),
        }
    }

    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("NFC dispatch enabled");
    }

    pub fn stop(&self) {
        if !self.started.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("NFC dispatch disabled");
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Returns whether the tag was handed to the controller.
    pub fn tag_discovered(&self, tag: NfcTag) -> bool {
        if !self.is_started() {
            debug!("Ignoring tag {:?}, dispatch stopped", tag);
            return false;
        }
        match self.controller.on_nfc_tag_detected(tag) {
            Ok(()) => true,
            Err(e) => {
                debug!("Ignoring tag: {}", e);
                false
            }
        }
    }
}
