// src/protocol/command.rs
use serde::{Deserialize, Serialize};

use crate::types::Simulator;

// Commands sent TO the remote eID service. The `cmd` field carries the tag.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "cmd", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    Accept,
    Cancel,
    #[serde(rename = "CONTINUE")]
    ContinueWorkflow,
    GetCertificate,
    RunAuth {
        #[serde(rename = "tcTokenURL")]
        tc_token_url: String,
        #[serde(rename = "developerMode")]
        developer_mode: bool,
        status: bool,
    },
    RunChangePin {
        status: bool,
    },
    GetAccessRights,
    SetAccessRights {
        chat: Vec<String>,
    },
    // `None` values are left out, the remote reads them from a keypad reader
    SetCan {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    SetCard {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        simulator: Option<Simulator>,
    },
    SetPin {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    SetNewPin {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    SetPuk {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    GetStatus,
    GetInfo,
    GetReader {
        name: String,
    },
    GetReaderList,
}

impl Command {
    /// The wire tag of this command.
    pub fn tag(&self) -> &'static str {
        match self {
            Command::Accept => "ACCEPT",
            Command::Cancel => "CANCEL",
            Command::ContinueWorkflow => "CONTINUE",
            Command::GetCertificate => "GET_CERTIFICATE",
            Command::RunAuth { .. } => "RUN_AUTH",
            Command::RunChangePin { .. } => "RUN_CHANGE_PIN",
            Command::GetAccessRights => "GET_ACCESS_RIGHTS",
            Command::SetAccessRights { .. } => "SET_ACCESS_RIGHTS",
            Command::SetCan { .. } => "SET_CAN",
            Command::SetCard { .. } => "SET_CARD",
            Command::SetPin { .. } => "SET_PIN",
            Command::SetNewPin { .. } => "SET_NEW_PIN",
            Command::SetPuk { .. } => "SET_PUK",
            Command::GetStatus => "GET_STATUS",
            Command::GetInfo => "GET_INFO",
            Command::GetReader { .. } => "GET_READER",
            Command::GetReaderList => "GET_READER_LIST",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::types::{SimulatorFile, SimulatorKey};

    fn encode(command: &Command) -> Value {
        serde_json::from_str(&command.to_json().unwrap()).unwrap()
    }

    #[test]
    fn run_auth_uses_wire_field_names() {
        let command = Command::RunAuth {
            tc_token_url: "https://test.test".into(),
            developer_mode: false,
            status: true,
        };
        assert_eq!(
            encode(&command),
            json!({
                "cmd": "RUN_AUTH",
                "tcTokenURL": "https://test.test",
                "developerMode": false,
                "status": true
            })
        );
    }

    #[test]
    fn tag_matches_encoded_cmd_field() {
        let commands = vec![
            Command::Accept,
            Command::Cancel,
            Command::ContinueWorkflow,
            Command::GetCertificate,
            Command::RunAuth {
                tc_token_url: "https://a.b".into(),
                developer_mode: true,
                status: false,
            },
            Command::RunChangePin { status: true },
            Command::GetAccessRights,
            Command::SetAccessRights { chat: vec![] },
            Command::SetCan { value: None },
            Command::SetCard {
                name: "Simulator".into(),
                simulator: None,
            },
            Command::SetPin { value: None },
            Command::SetNewPin { value: None },
            Command::SetPuk { value: None },
            Command::GetStatus,
            Command::GetInfo,
            Command::GetReader { name: "NFC".into() },
            Command::GetReaderList,
        ];
        assert_eq!(commands.len(), 17);
        for command in &commands {
            assert_eq!(encode(command)["cmd"], command.tag());
        }
    }

    #[test]
    fn missing_secret_is_omitted() {
        assert_eq!(encode(&Command::SetPin { value: None }), json!({ "cmd": "SET_PIN" }));
        assert_eq!(
            encode(&Command::SetPuk {
                value: Some("1234567890".into())
            }),
            json!({ "cmd": "SET_PUK", "value": "1234567890" })
        );
    }

    #[test]
    fn set_card_carries_simulator_files_and_keys() {
        let command = Command::SetCard {
            name: "Simulator".into(),
            simulator: Some(Simulator {
                files: vec![SimulatorFile {
                    file_id: "0101".into(),
                    short_file_id: "01".into(),
                    content: "610413024944".into(),
                }],
                keys: Some(vec![SimulatorKey {
                    id: 1,
                    content: "a0b1".into(),
                }]),
            }),
        };
        assert_eq!(
            encode(&command),
            json!({
                "cmd": "SET_CARD",
                "name": "Simulator",
                "simulator": {
                    "files": [{ "fileId": "0101", "shortFileId": "01", "content": "610413024944" }],
                    "keys": [{ "id": 1, "content": "a0b1" }]
                }
            })
        );
    }

    #[test]
    fn commands_parse_back_from_json() {
        let command: Command =
            serde_json::from_str(r#"{"cmd":"SET_ACCESS_RIGHTS","chat":["Address","DateOfBirth"]}"#)
                .unwrap();
        assert_eq!(
            command,
            Command::SetAccessRights {
                chat: vec!["Address".into(), "DateOfBirth".into()]
            }
        );
        let command: Command = serde_json::from_str(r#"{"cmd":"CONTINUE"}"#).unwrap();
        assert_eq!(command, Command::ContinueWorkflow);
    }
}
