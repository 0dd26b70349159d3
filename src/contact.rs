//! Client side of the contact form: the required-field gate and the status
//! line. Delivery is delegated to a [`FormRelay`].

use serde::{Deserialize, Serialize};

use crate::error::ContactError;

pub const SUBJECT: &str = "Portfolio Contact Form";

/// Payload handed to the relay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub access_key: String,
    pub name: String,
    pub email: String,
    pub message: String,
    pub subject: String,
    pub from_name: String,
    /// Honeypot; humans leave it empty.
    pub botcheck: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct RelayResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

impl RelayResponse {
    pub fn from_json(body: &str) -> Result<Self, ContactError> {
        serde_json::from_str(body).map_err(|e| ContactError::Rejected(format!("unreadable relay response: {e}")))
    }
}

pub trait FormRelay {
    fn submit(&mut self, submission: &Submission) -> Result<RelayResponse, ContactError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContactStatus {
    Success,
    Error(String),
}

#[derive(Clone, Debug, Default)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub message: String,
    pub botcheck: String,
    status: Option<ContactStatus>,
}

impl ContactForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// A form with the three required fields typed in.
    pub fn filled(name: impl Into<String>, email: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn status(&self) -> Option<&ContactStatus> {
        self.status.as_ref()
    }

    /// Names of required fields that are still blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [("name", &self.name), ("email", &self.email), ("message", &self.message)]
            .into_iter()
            .filter(|(_, v)| v.trim().is_empty())
            .map(|(k, _)| k)
            .collect()
    }

    pub fn can_submit(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Sends the form through `relay`. Incomplete forms never reach the relay
    /// and leave the status as it was. Returns whether the relay was called.
    pub fn submit(&mut self, relay: &mut dyn FormRelay, access_key: &str, from_name: &str) -> bool {
        if !self.can_submit() {
            return false;
        }
        if access_key.trim().is_empty() {
            tracing::error!("contact relay access key missing");
            self.status = Some(ContactStatus::Error("relay not configured".to_string()));
            return false;
        }
        self.status = None;

        let submission = Submission {
            access_key: access_key.to_string(),
            name: self.name.clone(),
            email: self.email.clone(),
            message: self.message.clone(),
            subject: SUBJECT.to_string(),
            from_name: from_name.to_string(),
            botcheck: self.botcheck.clone(),
        };

        self.status = Some(match relay.submit(&submission) {
            Ok(resp) if resp.success => {
                self.name.clear();
                self.email.clear();
                self.message.clear();
                self.botcheck.clear();
                ContactStatus::Success
            }
            Ok(resp) => {
                let reason = resp.message.unwrap_or_else(|| "relay reported failure".to_string());
                tracing::warn!(%reason, "contact relay rejected submission");
                ContactStatus::Error(reason)
            }
            Err(err) => {
                tracing::warn!(%err, "contact submission failed");
                ContactStatus::Error(err.to_string())
            }
        });
        true
    }
}
