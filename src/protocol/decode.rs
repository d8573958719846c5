// src/protocol/decode.rs
//
// Projections from the wide inbound `Message` onto domain types. Every
// decoder checks each field it needs and returns `None` instead of failing.
use log::{debug, warn};
use url::Url;

use crate::protocol::message::{Aux, CardRecord, Message, ReaderRecord, ResultRecord};
use crate::types::wire_date;
use crate::types::{
    AccessRight, AccessRights, AuthResult, AuthResultData, AuxiliaryData, Card,
    CertificateDescription, CertificateValidity, Reader, VersionInfo, WorkflowProgress,
    WorkflowProgressType,
};

impl Message {
    /// `None` if there is no `chat`. Unknown right tokens are dropped.
    pub fn access_rights(&self) -> Option<AccessRights> {
        let chat = self.chat.as_ref()?;

        Some(AccessRights {
            required_rights: map_rights(&chat.required),
            optional_rights: map_rights(&chat.optional),
            effective_rights: map_rights(&chat.effective),
            transaction_info: self.transaction_info.clone(),
            auxiliary_data: self.aux.as_ref().map(auxiliary_data),
        })
    }

    pub fn certificate_description(&self) -> Option<CertificateDescription> {
        let description = self.description.as_ref()?;
        let validity = self.validity.as_ref()?;
        let effective_date = wire_date::parse(validity.effective_date.as_deref()?)?;
        let expiration_date = wire_date::parse(validity.expiration_date.as_deref()?)?;

        Some(CertificateDescription {
            issuer_name: description.issuer_name.clone().unwrap_or_default(),
            issuer_url: optional_url(description.issuer_url.as_deref()),
            purpose: description.purpose.clone().unwrap_or_default(),
            subject_name: description.subject_name.clone().unwrap_or_default(),
            subject_url: optional_url(description.subject_url.as_deref()),
            terms_of_usage: description.terms_of_usage.clone().unwrap_or_default(),
            validity: CertificateValidity {
                effective_date,
                expiration_date,
            },
        })
    }

    /// Card of the message, either top level or inside `reader`.
    pub fn card(&self) -> Option<Card> {
        self.card
            .as_ref()
            .or_else(|| self.reader.as_ref().and_then(|r| r.card.as_ref()))
            .map(card)
    }

    // READER carries the reader fields at the top level
    pub fn reader_from_root(&self) -> Option<Reader> {
        Some(Reader {
            name: self.name.clone()?,
            insertable: self.insertable?,
            attached: self.attached?,
            keypad: self.keypad?,
            card: self.card(),
        })
    }

    // ENTER_* nest them below `reader`
    pub fn reader_from_member(&self) -> Option<Reader> {
        let record = self.reader.as_ref()?;
        Some(Reader {
            card: self.card(),
            ..reader(record)?
        })
    }

    /// `None` without `readers`, an empty list if the remote knows no reader.
    pub fn reader_list(&self) -> Option<Vec<Reader>> {
        let readers = self.readers.as_ref()?;

        Some(
            readers
                .iter()
                .filter_map(|record| {
                    let decoded = reader(record);
                    if decoded.is_none() {
                        debug!("Skipping incomplete reader {:?}", record.name);
                    }
                    decoded
                })
                .collect(),
        )
    }

    pub fn version_info(&self) -> Option<VersionInfo> {
        let info = self.version_info.as_ref()?;

        Some(VersionInfo {
            name: info.name.clone()?,
            implementation_title: info.implementation_title.clone()?,
            implementation_vendor: info.implementation_vendor.clone()?,
            implementation_version: info.implementation_version.clone()?,
            specification_title: info.specification_title.clone()?,
            specification_vendor: info.specification_vendor.clone()?,
            specification_version: info.specification_version.clone()?,
        })
    }

    /// `None` for the empty AUTH that confirms a started authentication.
    /// Any `url` field, even a blank or relative one, completes it.
    pub fn auth_result(&self) -> Option<AuthResult> {
        let url = self.url.clone();
        let result = self.auth_result_data();

        if url.is_none() && result.is_none() {
            return None;
        }
        Some(AuthResult { url, result })
    }

    /// A result without `major` counts as absent.
    pub fn auth_result_data(&self) -> Option<AuthResultData> {
        let ResultRecord {
            major,
            minor,
            language,
            description,
            message,
            reason,
        } = self.result.clone()?;

        Some(AuthResultData {
            major: major?,
            minor,
            language,
            description,
            message,
            reason,
        })
    }

    pub fn workflow_progress(&self) -> WorkflowProgress {
        WorkflowProgress {
            workflow: self
                .workflow
                .as_deref()
                .and_then(WorkflowProgressType::from_raw_name),
            progress: self.progress,
            state: self.state.clone(),
        }
    }
}

fn map_rights(raw: &[String]) -> Vec<AccessRight> {
    raw.iter()
        .filter_map(|name| {
            let right = AccessRight::from_raw_name(name);
            if right.is_none() {
                debug!("Dropping unknown access right {}", name);
            }
            right
        })
        .collect()
}

fn auxiliary_data(aux: &Aux) -> AuxiliaryData {
    let required_age = match &aux.required_age {
        Some(serde_json::Value::String(age)) => age.trim().parse().ok(),
        Some(serde_json::Value::Number(age)) => age.as_u64().and_then(|a| u32::try_from(a).ok()),
        _ => None,
    };

    AuxiliaryData {
        age_verification_date: aux.age_verification_date.as_deref().and_then(wire_date::parse),
        required_age,
        validity_date: aux.validity_date.as_deref().and_then(wire_date::parse),
        community_id: aux.community_id.clone(),
    }
}

fn card(record: &CardRecord) -> Card {
    Card {
        deactivated: record.deactivated,
        inoperative: record.inoperative,
        pin_retry_counter: record.retry_counter,
    }
}

fn reader(record: &ReaderRecord) -> Option<Reader> {
    Some(Reader {
        name: record.name.clone()?,
        insertable: record.insertable?,
        attached: record.attached?,
        keypad: record.keypad?,
        card: record.card.as_ref().map(card),
    })
}

// Blank urls are absent, unparseable ones too
fn optional_url(raw: Option<&str>) -> Option<Url> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match Url::parse(raw) {
        Ok(url) => Some(url),
        Err(e) => {
            warn!("Ignoring invalid url {:?}: {}", raw, e);
            None
        }
    }
}
