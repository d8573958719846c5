// src/callbacks.rs
use crate::types::{
    AccessRights, AuthResult, Cause, CertificateDescription, ChangePinResult, Reader, VersionInfo,
    WorkflowProgress, WrapperError,
};

/// Observer of a [`WorkflowController`](crate::controller::WorkflowController).
///
/// Register implementations with `register_callbacks`. All notifications of
/// one controller are delivered from a single task in the order they were
/// produced. Every method defaults to doing nothing.
///
/// Minimal authentication flow: `on_authentication_started`,
/// `on_access_rights` (answer with `accept`), `on_insert_card`,
/// `on_enter_pin` (answer with `set_pin`), `on_authentication_completed`.
///
/// Minimal PIN change flow: `on_change_pin_started`, `on_insert_card`,
/// `on_enter_pin`, `on_enter_new_pin`, `on_change_pin_completed`.
#[allow(unused_variables)]
pub trait WorkflowCallbacks: Send + Sync {
    /// The controller is bound to the remote service.
    fn on_started(&self) {}

    /// The binding to the remote service was lost after `on_started`.
    fn on_disconnected(&self) {}

    fn on_authentication_started(&self) {}

    /// The authentication could not be started at all. This is different
    /// from an authentication that fails later on, which ends with
    /// `on_authentication_completed`.
    fn on_authentication_start_failed(&self, error: &str) {}

    /// Check `auth_result.result` for the outcome; `url` is the refresh url
    /// or the communication error address.
    fn on_authentication_completed(&self, auth_result: &AuthResult) {}

    fn on_change_pin_started(&self) {}

    fn on_change_pin_completed(&self, change_pin_result: &ChangePinResult) {}

    /// `error` is set if a previous `set_access_rights` failed.
    fn on_access_rights(&self, error: Option<&str>, access_rights: &AccessRights) {}

    fn on_certificate(&self, certificate_description: &CertificateDescription) {}

    /// The workflow needs a card. `error` is set if a previous `set_card`
    /// failed.
    fn on_insert_card(&self, error: Option<&str>) {}

    /// Resume with `continue_workflow` after the cause is resolved.
    fn on_pause(&self, cause: Cause) {}

    /// `None` if an unknown reader was requested with `get_reader`.
    fn on_reader(&self, reader: Option<&Reader>) {}

    fn on_reader_list(&self, readers: Option<&[Reader]>) {}

    // Answer with set_pin / set_new_pin / set_puk / set_can respectively
    fn on_enter_pin(&self, error: Option<&str>, reader: &Reader) {}

    fn on_enter_new_pin(&self, error: Option<&str>, reader: &Reader) {}

    fn on_enter_puk(&self, error: Option<&str>, reader: &Reader) {}

    fn on_enter_can(&self, error: Option<&str>, reader: &Reader) {}

    fn on_wrapper_error(&self, error: &WrapperError) {}

    fn on_status(&self, workflow_progress: &WorkflowProgress) {}

    fn on_info(&self, version_info: &VersionInfo) {}

    /// An error inside the remote service. Indicates a bug there.
    fn on_internal_error(&self, error: &str) {}
}
