// src/protocol/message.rs
use serde::Deserialize;

pub const MSG_ACCESS_RIGHTS: &str = "ACCESS_RIGHTS";
pub const MSG_AUTH: &str = "AUTH";
pub const MSG_BAD_STATE: &str = "BAD_STATE";
pub const MSG_CERTIFICATE: &str = "CERTIFICATE";
pub const MSG_CHANGE_PIN: &str = "CHANGE_PIN";
pub const MSG_ENTER_CAN: &str = "ENTER_CAN";
pub const MSG_ENTER_NEW_PIN: &str = "ENTER_NEW_PIN";
pub const MSG_ENTER_PIN: &str = "ENTER_PIN";
pub const MSG_ENTER_PUK: &str = "ENTER_PUK";
pub const MSG_INFO: &str = "INFO";
pub const MSG_INSERT_CARD: &str = "INSERT_CARD";
pub const MSG_INTERNAL_ERROR: &str = "INTERNAL_ERROR";
pub const MSG_INVALID: &str = "INVALID";
pub const MSG_PAUSE: &str = "PAUSE";
pub const MSG_READER: &str = "READER";
pub const MSG_READER_LIST: &str = "READER_LIST";
pub const MSG_STATUS: &str = "STATUS";
pub const MSG_UNKNOWN_COMMAND: &str = "UNKNOWN_COMMAND";

/// Any message received FROM the remote eID service.
///
/// The wire format is not partitioned by `msg`, so every field is optional.
/// Which fields are meaningful depends on the discriminator; the rest is
/// ignored by the decoders in [`crate::protocol::decode`].
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub msg: Option<String>,
    pub attached: Option<bool>,
    pub aux: Option<Aux>,
    pub card: Option<CardRecord>,
    pub cause: Option<String>,
    pub chat: Option<Chat>,
    pub description: Option<Description>,
    pub error: Option<String>,
    pub insertable: Option<bool>,
    pub keypad: Option<bool>,
    pub name: Option<String>,
    pub progress: Option<u32>,
    pub reader: Option<ReaderRecord>,
    pub readers: Option<Vec<ReaderRecord>>,
    pub reason: Option<String>,
    pub result: Option<ResultRecord>,
    pub state: Option<String>,
    pub success: Option<bool>,
    pub transaction_info: Option<String>,
    pub url: Option<String>,
    pub validity: Option<Validity>,
    #[serde(rename = "VersionInfo")]
    pub version_info: Option<VersionInfoRecord>,
    pub workflow: Option<String>,
}

impl Message {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn kind(&self) -> &str {
        self.msg.as_deref().unwrap_or_default()
    }
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Description {
    pub issuer_name: Option<String>,
    pub issuer_url: Option<String>,
    pub purpose: Option<String>,
    pub subject_name: Option<String>,
    pub subject_url: Option<String>,
    pub terms_of_usage: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Validity {
    pub effective_date: Option<String>,
    pub expiration_date: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Chat {
    #[serde(default)]
    pub effective: Vec<String>,
    #[serde(default)]
    pub optional: Vec<String>,
    #[serde(default)]
    pub required: Vec<String>,
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Aux {
    pub age_verification_date: Option<String>,
    // the remote sends a string, older versions a number
    pub required_age: Option<serde_json::Value>,
    pub validity_date: Option<String>,
    pub community_id: Option<String>,
}

#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CardRecord {
    pub inoperative: Option<bool>,
    pub deactivated: Option<bool>,
    pub retry_counter: Option<u32>,
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ReaderRecord {
    pub name: Option<String>,
    pub insertable: Option<bool>,
    pub attached: Option<bool>,
    pub keypad: Option<bool>,
    pub card: Option<CardRecord>,
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ResultRecord {
    pub major: Option<String>,
    pub minor: Option<String>,
    pub language: Option<String>,
    pub description: Option<String>,
    pub message: Option<String>,
    pub reason: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct VersionInfoRecord {
    #[serde(rename = "Name")]
    pub name: Option<String>,
    #[serde(rename = "Implementation-Title")]
    pub implementation_title: Option<String>,
    #[serde(rename = "Implementation-Vendor")]
    pub implementation_vendor: Option<String>,
    #[serde(rename = "Implementation-Version")]
    pub implementation_version: Option<String>,
    #[serde(rename = "Specification-Title")]
    pub specification_title: Option<String>,
    #[serde(rename = "Specification-Vendor")]
    pub specification_vendor: Option<String>,
    #[serde(rename = "Specification-Version")]
    pub specification_version: Option<String>,
}
