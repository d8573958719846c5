// src/types.rs
use std::collections::HashMap;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize, Serializer};
use time::Date;
use url::Url;

use crate::util::is_number;

pub const PIN_LENGTH: usize = 6;
pub const TRANSPORT_PIN_LENGTH: usize = 5;
pub const PUK_LENGTH: usize = 10;
pub const CAN_LENGTH: usize = 6;

pub fn is_valid_pin(pin: &str) -> bool {
    pin.len() == PIN_LENGTH && is_number(pin)
}

pub fn is_valid_transport_pin(pin: &str) -> bool {
    pin.len() == TRANSPORT_PIN_LENGTH && is_number(pin)
}

pub fn is_valid_puk(puk: &str) -> bool {
    puk.len() == PUK_LENGTH && is_number(puk)
}

pub fn is_valid_can(can: &str) -> bool {
    can.len() == CAN_LENGTH && is_number(can)
}

/// Wire format of every date the remote service sends: `yyyy-MM-dd`.
pub(crate) mod wire_date {
    use serde::Serializer;
    use time::Date;
    use time::macros::format_description;

    pub fn parse(raw: &str) -> Option<Date> {
        Date::parse(raw, format_description!("[year]-[month]-[day]")).ok()
    }

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        let formatted = date
            .format(format_description!("[year]-[month]-[day]"))
            .map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    pub mod option {
        use serde::Serializer;
        use time::Date;

        pub fn serialize<S: Serializer>(
            date: &Option<Date>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(date) => super::serialize(date, serializer),
                None => serializer.serialize_none(),
            }
        }
    }
}

/// Detailed description of the provider's certificate.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CertificateDescription {
    pub issuer_name: String,
    pub issuer_url: Option<Url>,
    pub purpose: String,
    pub subject_name: String,
    pub subject_url: Option<Url>,
    /// Raw terms of usage as delivered by the certificate.
    pub terms_of_usage: String,
    pub validity: CertificateValidity,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CertificateValidity {
    #[serde(serialize_with = "wire_date::serialize")]
    pub effective_date: Date,
    #[serde(serialize_with = "wire_date::serialize")]
    pub expiration_date: Date,
}

/// Access rights requested by the provider.
///
/// Required rights cannot be disabled, optional ones can be toggled with
/// `set_access_rights`, effective rights are the currently enabled union.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccessRights {
    pub required_rights: Vec<AccessRight>,
    pub optional_rights: Vec<AccessRight>,
    pub effective_rights: Vec<AccessRight>,
    pub transaction_info: Option<String>,
    pub auxiliary_data: Option<AuxiliaryData>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuxiliaryData {
    #[serde(serialize_with = "wire_date::option::serialize")]
    pub age_verification_date: Option<Date>,
    pub required_age: Option<u32>,
    #[serde(serialize_with = "wire_date::option::serialize")]
    pub validity_date: Option<Date>,
    pub community_id: Option<String>,
}

/// Information about an inserted card.
///
/// A card without eID function is reported with every field set to `None`.
#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub deactivated: Option<bool>,
    pub inoperative: Option<bool>,
    pub pin_retry_counter: Option<u32>,
}

impl Card {
    pub fn is_unknown(&self) -> bool {
        self.deactivated.is_none() && self.inoperative.is_none() && self.pin_retry_counter.is_none()
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Reader {
    pub name: String,
    /// Whether a card can be inserted via `set_card`.
    pub insertable: bool,
    pub attached: bool,
    pub keypad: bool,
    pub card: Option<Card>,
}

/// Final result of an authentication.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct AuthResult {
    /// Refresh url or communication error address, as sent. May be relative.
    pub url: Option<String>,
    pub result: Option<AuthResultData>,
}

impl AuthResult {
    /// `url` if it is an absolute url.
    pub fn absolute_url(&self) -> Option<Url> {
        Url::parse(self.url.as_deref()?).ok()
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct AuthResultData {
    pub major: String,
    pub minor: Option<String>,
    pub language: Option<String>,
    pub description: Option<String>,
    pub message: Option<String>,
    pub reason: Option<String>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ChangePinResult {
    pub success: bool,
    pub reason: Option<String>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub name: String,
    pub implementation_title: String,
    pub implementation_vendor: String,
    pub implementation_version: String,
    pub specification_title: String,
    pub specification_vendor: String,
    pub specification_version: String,
}

/// Error raised by the wrapper itself. `msg` names the message type or the
/// controller operation the error belongs to.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct WrapperError {
    pub msg: String,
    pub error: String,
}

impl WrapperError {
    pub fn new(msg: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            error: error.into(),
        }
    }
}

#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkflowProgress {
    pub workflow: Option<WorkflowProgressType>,
    /// Percentage, `None` without running workflow.
    pub progress: Option<u32>,
    /// Name of the current state while paused.
    pub state: Option<String>,
}

// Optional definition of files and keys for the simulator reader (SET_CARD)
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Simulator {
    pub files: Vec<SimulatorFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<SimulatorKey>>,
}

// All fields are hex encoded, content is DER
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorFile {
    pub file_id: String,
    pub short_file_id: String,
    pub content: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SimulatorKey {
    pub id: u32,
    pub content: String,
}

macro_rules! raw_name_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident => $raw:literal,)+ }
        table = $table:ident;
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
        }

        lazy_static! {
            static ref $table: HashMap<&'static str, $name> = {
                let mut m = HashMap::new();
                $(m.insert($raw, $name::$variant);)+
                m
            };
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn raw_name(&self) -> &'static str {
                match self {
                    $($name::$variant => $raw,)+
                }
            }

            /// Unknown tokens yield `None`.
            pub fn from_raw_name(raw: &str) -> Option<Self> {
                $table.get(raw).copied()
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.raw_name())
            }
        }
    };
}

raw_name_enum! {
    /// Every access right a provider might request.
    pub enum AccessRight {
        Address => "Address",
        BirthName => "BirthName",
        FamilyName => "FamilyName",
        GivenNames => "GivenNames",
        PlaceOfBirth => "PlaceOfBirth",
        DateOfBirth => "DateOfBirth",
        DoctoralDegree => "DoctoralDegree",
        ArtisticName => "ArtisticName",
        Pseudonym => "Pseudonym",
        ValidUntil => "ValidUntil",
        Nationality => "Nationality",
        IssuingCountry => "IssuingCountry",
        DocumentType => "DocumentType",
        ResidencePermitI => "ResidencePermitI",
        ResidencePermitII => "ResidencePermitII",
        CommunityId => "CommunityID",
        AddressVerification => "AddressVerification",
        AgeVerification => "AgeVerification",
        WriteAddress => "WriteAddress",
        WriteCommunityId => "WriteCommunityID",
        WriteResidencePermitI => "WriteResidencePermitI",
        WriteResidencePermitII => "WriteResidencePermitII",
        CanAllowed => "CanAllowed",
        PinManagement => "PinManagement",
    }
    table = ACCESS_RIGHTS_BY_NAME;
}

raw_name_enum! {
    /// Reasons for a PAUSE message.
    pub enum Cause {
        // unstable or lost card connection
        BadCardPosition => "BadCardPosition",
    }
    table = CAUSES_BY_NAME;
}

raw_name_enum! {
    pub enum WorkflowProgressType {
        Authentication => "AUTH",
        ChangePin => "CHANGE_PIN",
    }
    table = WORKFLOWS_BY_NAME;
}
