use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What the user types into the login form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credential {
    pub api_key: String,
    pub username: String,
    pub password: String,
}

/// Reply body of `GET /authentication`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResult {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "UserID", default)]
    pub user_id: i64,
    #[serde(rename = "APIKey", default)]
    pub api_key: String,
    #[serde(rename = "UserKey", default)]
    pub user_key: String,
}

/// Cached login. `key` is the encoded token sent with `Userkeyauth`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSettings {
    pub name: String,
    pub id: i64,
    pub key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputType {
    Phone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LookupStatus {
    Pending,
    Success,
    Failed,
}

/// A CRM contact kept verbatim, tagged with the number that found it.
///
/// The CRM object is nested rather than flattened: its own keys may clash
/// with ours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub lookup_phone: String,
    pub received_at: DateTime<Utc>,
    pub crm: Map<String, Value>,
}

impl Contact {
    /// Wrap a raw CRM object. Non-object values land under `"value"`.
    pub fn from_crm(raw: Value, lookup_phone: &str, received_at: DateTime<Utc>) -> Self {
        let crm = match raw {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Self {
            lookup_phone: lookup_phone.to_string(),
            received_at,
            crm,
        }
    }

    /// Best-effort display name from the usual CRM name fields.
    pub fn display_name(&self) -> String {
        let field = |key: &str| {
            self.crm
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };

        if let Some(full) = field("full_name").or_else(|| field("FullName")) {
            return full.to_string();
        }

        let parts: Vec<&str> = [
            field("first_name").or_else(|| field("FirstName")),
            field("last_name").or_else(|| field("LastName")),
        ]
        .into_iter()
        .flatten()
        .collect();

        if parts.is_empty() {
            field("company_name").unwrap_or("(unnamed contact)").to_string()
        } else {
            parts.join(" ")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupRecord {
    pub timestamp: DateTime<Utc>,
    pub crm_name: String,
    pub input_type: InputType,
    pub raw_input: String,
    pub status: LookupStatus,
    pub details: String,
    pub results: Vec<Contact>,
}

impl LookupRecord {
    pub fn pending(crm_name: &str, raw_input: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            crm_name: crm_name.to_string(),
            input_type: InputType::Phone,
            raw_input: raw_input.to_string(),
            status: LookupStatus::Pending,
            details: "Looking up contact...".to_string(),
            results: Vec::new(),
        }
    }
}
