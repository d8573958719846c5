// src/dispatch.rs
use log::debug;

use crate::event::WorkflowEvent;
use crate::protocol::message::*;
use crate::protocol::Message;
use crate::types::{Cause, ChangePinResult};

/// Classify an inbound message and decode it into the notifications it
/// triggers, in delivery order. Unknown discriminators yield nothing.
pub fn events_for(message: &Message) -> Vec<WorkflowEvent> {
    let msg = message.kind();

    match msg {
        MSG_INFO => match message.version_info() {
            Some(version_info) => vec![WorkflowEvent::Info { version_info }],
            None => vec![WorkflowEvent::wrapper_error(msg, "Parsing error")],
        },
        MSG_AUTH => {
            let mut events = Vec::with_capacity(2);
            if let Some(error) = &message.error {
                events.push(WorkflowEvent::AuthenticationStartFailed {
                    error: error.clone(),
                });
            }
            match message.auth_result() {
                // empty AUTH: the remote started the authentication
                None => events.push(WorkflowEvent::AuthenticationStarted),
                Some(result) => events.push(WorkflowEvent::AuthenticationCompleted { result }),
            }
            events
        }
        MSG_ACCESS_RIGHTS => match message.access_rights() {
            Some(access_rights) => vec![WorkflowEvent::AccessRights {
                error: message.error.clone(),
                access_rights,
            }],
            None => vec![WorkflowEvent::wrapper_error(msg, "Missing access rights")],
        },
        MSG_BAD_STATE => vec![WorkflowEvent::wrapper_error(
            msg,
            message.error.as_deref().unwrap_or("Unknown bad state"),
        )],
        MSG_CHANGE_PIN => match message.success {
            None => vec![WorkflowEvent::ChangePinStarted],
            Some(success) => vec![WorkflowEvent::ChangePinCompleted {
                result: ChangePinResult {
                    success,
                    reason: message.reason.clone(),
                },
            }],
        },
        MSG_ENTER_PIN | MSG_ENTER_NEW_PIN | MSG_ENTER_PUK | MSG_ENTER_CAN => {
            vec![enter_secret(message)]
        }
        MSG_INSERT_CARD => vec![WorkflowEvent::InsertCard { error: None }],
        MSG_CERTIFICATE => match message.certificate_description() {
            Some(description) => vec![WorkflowEvent::Certificate { description }],
            None => vec![WorkflowEvent::wrapper_error(
                msg,
                "Missing certificateDescription",
            )],
        },
        MSG_PAUSE => match message.cause.as_deref().and_then(Cause::from_raw_name) {
            Some(cause) => vec![WorkflowEvent::Pause { cause }],
            None => vec![WorkflowEvent::wrapper_error(
                msg,
                format!(
                    "Failed to map cause \"{}\" to PauseReason",
                    message.cause.as_deref().unwrap_or_default()
                ),
            )],
        },
        MSG_READER => vec![WorkflowEvent::Reader {
            reader: message.reader_from_root(),
        }],
        MSG_READER_LIST => vec![WorkflowEvent::ReaderList {
            readers: message.reader_list(),
        }],
        MSG_INVALID | MSG_UNKNOWN_COMMAND => vec![WorkflowEvent::wrapper_error(
            msg,
            message
                .error
                .as_deref()
                .unwrap_or("Unknown SDK Wrapper error"),
        )],
        MSG_INTERNAL_ERROR => vec![WorkflowEvent::InternalError {
            error: message
                .error
                .clone()
                .unwrap_or_else(|| "Unknown internal error".into()),
        }],
        MSG_STATUS => vec![WorkflowEvent::Status {
            progress: message.workflow_progress(),
        }],
        _ => {
            debug!("Received unknown message {:?}", message.msg);
            Vec::new()
        }
    }
}

fn enter_secret(message: &Message) -> WorkflowEvent {
    let Some(reader) = message.reader_from_member() else {
        return WorkflowEvent::wrapper_error(message.kind(), "Missing reader");
    };
    let error = message.error.clone();

    match message.kind() {
        MSG_ENTER_PIN => WorkflowEvent::EnterPin { error, reader },
        MSG_ENTER_NEW_PIN => WorkflowEvent::EnterNewPin { error, reader },
        MSG_ENTER_PUK => WorkflowEvent::EnterPuk { error, reader },
        _ => WorkflowEvent::EnterCan { error, reader },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccessRight, WorkflowProgressType, WrapperError};

    fn events(json: &str) -> Vec<WorkflowEvent> {
        events_for(&Message::from_json(json).unwrap())
    }

    fn wrapper_error(events: &[WorkflowEvent]) -> &WrapperError {
        match events {
            [WorkflowEvent::WrapperError { error }] => error,
            other => panic!("expected a single wrapper error, got {:?}", other),
        }
    }

    const READER: &str = r#"{"name":"NFC","attached":true,"insertable":false,"keypad":false,"card":{"retryCounter":3}}"#;

    #[test]
    fn empty_auth_starts_authentication() {
        assert_eq!(events(r#"{"msg":"AUTH"}"#), vec![WorkflowEvent::AuthenticationStarted]);
    }

    #[test]
    fn auth_with_result_completes_authentication() {
        let events = events(
            r#"{"msg":"AUTH","result":{"major":"http://www.bsi.bund.de/ecard/api/1.1/resultmajor#ok"},"url":"https://test.test/refresh"}"#,
        );
        match events.as_slice() {
            [WorkflowEvent::AuthenticationCompleted { result }] => {
                assert_eq!(result.url.as_deref(), Some("https://test.test/refresh"));
                assert!(result.result.as_ref().unwrap().major.ends_with("resultmajor#ok"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn auth_with_relative_or_empty_url_completes_authentication() {
        for json in [
            r#"{"msg":"AUTH","url":"/gov_autent/async?refID=1"}"#,
            r#"{"msg":"AUTH","url":""}"#,
        ] {
            match events(json).as_slice() {
                [WorkflowEvent::AuthenticationCompleted { result }] => {
                    assert!(result.url.is_some());
                    assert_eq!(result.result, None);
                }
                other => panic!("unexpected {:?} for {}", other, json),
            }
        }
    }

    #[test]
    fn auth_error_is_reported_before_the_auth_event() {
        let events = events(r#"{"msg":"AUTH","error":"Invalid tcTokenURL"}"#);
        assert_eq!(
            events,
            vec![
                WorkflowEvent::AuthenticationStartFailed {
                    error: "Invalid tcTokenURL".into()
                },
                WorkflowEvent::AuthenticationStarted,
            ]
        );
    }

    #[test]
    fn access_rights_keep_the_error() {
        let events = events(
            r#"{"msg":"ACCESS_RIGHTS","error":"Some entries are not allowed","chat":{"required":["Address"],"optional":[],"effective":["Address"]}}"#,
        );
        match events.as_slice() {
            [WorkflowEvent::AccessRights { error, access_rights }] => {
                assert_eq!(error.as_deref(), Some("Some entries are not allowed"));
                assert_eq!(access_rights.required_rights, vec![AccessRight::Address]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn decode_failures_become_wrapper_errors() {
        let cases = [
            (r#"{"msg":"INFO"}"#, "INFO", "Parsing error"),
            (r#"{"msg":"ACCESS_RIGHTS"}"#, "ACCESS_RIGHTS", "Missing access rights"),
            (r#"{"msg":"CERTIFICATE"}"#, "CERTIFICATE", "Missing certificateDescription"),
            (r#"{"msg":"ENTER_PIN"}"#, "ENTER_PIN", "Missing reader"),
            (r#"{"msg":"ENTER_CAN","reader":{"name":"NFC"}}"#, "ENTER_CAN", "Missing reader"),
        ];
        for (json, msg, error) in cases {
            let events = events(json);
            let wrapper = wrapper_error(&events);
            assert_eq!(wrapper.msg, msg);
            assert_eq!(wrapper.error, error);
        }
    }

    #[test]
    fn unknown_pause_cause() {
        let unknown = events(r#"{"msg":"PAUSE","cause":"CardOnFire"}"#);
        let wrapper = wrapper_error(&unknown);
        assert_eq!(wrapper.msg, "PAUSE");
        assert!(wrapper.error.starts_with("Failed to map cause"));
        assert!(wrapper.error.contains("CardOnFire"));

        assert_eq!(
            events(r#"{"msg":"PAUSE","cause":"BadCardPosition"}"#),
            vec![WorkflowEvent::Pause {
                cause: Cause::BadCardPosition
            }]
        );
    }

    #[test]
    fn remote_errors_are_relayed() {
        let events_bad_state = events(r#"{"msg":"BAD_STATE","error":"SET_PIN"}"#);
        assert_eq!(wrapper_error(&events_bad_state), &WrapperError::new("BAD_STATE", "SET_PIN"));

        let events_bad_state = events(r#"{"msg":"BAD_STATE"}"#);
        assert_eq!(wrapper_error(&events_bad_state).error, "Unknown bad state");

        let invalid = events(r#"{"msg":"INVALID","error":"Invalid JSON"}"#);
        assert_eq!(wrapper_error(&invalid), &WrapperError::new("INVALID", "Invalid JSON"));

        let unknown = events(r#"{"msg":"UNKNOWN_COMMAND"}"#);
        assert_eq!(
            wrapper_error(&unknown),
            &WrapperError::new("UNKNOWN_COMMAND", "Unknown SDK Wrapper error")
        );

        assert_eq!(
            events(r#"{"msg":"INTERNAL_ERROR"}"#),
            vec![WorkflowEvent::InternalError {
                error: "Unknown internal error".into()
            }]
        );
        assert_eq!(
            events(r#"{"msg":"INTERNAL_ERROR","error":"boom"}"#),
            vec![WorkflowEvent::InternalError { error: "boom".into() }]
        );
    }

    #[test]
    fn change_pin_started_and_completed() {
        assert_eq!(events(r#"{"msg":"CHANGE_PIN"}"#), vec![WorkflowEvent::ChangePinStarted]);
        assert_eq!(
            events(r#"{"msg":"CHANGE_PIN","success":false,"reason":"User_Cancelled"}"#),
            vec![WorkflowEvent::ChangePinCompleted {
                result: ChangePinResult {
                    success: false,
                    reason: Some("User_Cancelled".into())
                }
            }]
        );
    }

    #[test]
    fn enter_messages_map_to_their_callback() {
        let cases = [
            ("ENTER_PIN", "EnterPin"),
            ("ENTER_NEW_PIN", "EnterNewPin"),
            ("ENTER_PUK", "EnterPuk"),
            ("ENTER_CAN", "EnterCan"),
        ];
        for (msg, variant) in cases {
            let json = format!(r#"{{"msg":"{}","reader":{}}}"#, msg, READER);
            let events = events(&json);
            assert_eq!(events.len(), 1);
            assert!(format!("{:?}", events[0]).starts_with(variant), "{:?}", events[0]);
        }
    }

    #[test]
    fn insert_card_reader_and_status() {
        assert_eq!(
            events(r#"{"msg":"INSERT_CARD","error":"ignored"}"#),
            vec![WorkflowEvent::InsertCard { error: None }]
        );
        assert_eq!(
            events(r#"{"msg":"READER","name":"NFC"}"#),
            vec![WorkflowEvent::Reader { reader: None }]
        );
        assert_eq!(
            events(r#"{"msg":"READER_LIST"}"#),
            vec![WorkflowEvent::ReaderList { readers: None }]
        );
        match events(r#"{"msg":"STATUS","workflow":"CHANGE_PIN","progress":10}"#).as_slice() {
            [WorkflowEvent::Status { progress }] => {
                assert_eq!(progress.workflow, Some(WorkflowProgressType::ChangePin));
                assert_eq!(progress.progress, Some(10));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_discriminator_is_dropped() {
        assert!(events(r#"{"msg":"SOMETHING_NEW","error":"x"}"#).is_empty());
        assert!(events(r#"{"error":"no msg at all"}"#).is_empty());
    }
}
