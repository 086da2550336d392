use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::error::CrmError;
use crate::model::{AuthResult, Credential};

pub const DEFAULT_BASE_URL: &str = "https://smf.crm3.redtailtechnology.com/api/public/v1";

/// Display name for the CRM in lookup records.
pub const CRM_NAME: &str = "Redtail";

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    contacts: Vec<Value>,
}

/// Blocking client for the two CRM endpoints we use.
pub struct CrmClient {
    base_url: String,
    agent: ureq::Agent,
}

impl CrmClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
        }
    }

    /// `GET /authentication` with Basic credentials.
    pub fn authenticate_basic(&self, credential: &Credential) -> Result<AuthResult, CrmError> {
        let header = format!("Basic {}", basic_token(credential));
        self.get_json("/authentication", &header, &[])
    }

    /// `GET /authentication` with a derived user-key token. Only this form
    /// returns the user's display name.
    pub fn authenticate_token(&self, token: &str) -> Result<AuthResult, CrmError> {
        let header = format!("Userkeyauth {}", token);
        self.get_json("/authentication", &header, &[])
    }

    /// Contacts whose phone number matches `digits`. May be empty.
    pub fn search_by_phone(&self, token: &str, digits: &str) -> Result<Vec<Value>, CrmError> {
        let header = format!("Userkeyauth {}", token);
        let reply: SearchResponse =
            self.get_json("/contacts/search", &header, &[("phone_number", digits)])?;
        Ok(reply.contacts)
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        authorization: &str,
        query: &[(&str, &str)],
    ) -> Result<T, CrmError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .agent
            .get(&url)
            .set("Authorization", authorization)
            .set("Accept", "application/json");
        for (name, value) in query {
            request = request.query(name, value);
        }

        tracing::debug!(path, "CRM request");

        let response = request.call().map_err(|e| match e {
            ureq::Error::Status(code, _) => classify_status(code),
            ureq::Error::Transport(t) => CrmError::Transport(t.to_string()),
        })?;

        // ureq treats every 2xx as success; only 200 carries a body we understand.
        if response.status() != 200 {
            return Err(classify_status(response.status()));
        }

        let text = response
            .into_string()
            .map_err(|e| CrmError::Transport(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| CrmError::Decode(e.to_string()))
    }
}

pub(crate) fn classify_status(code: u16) -> CrmError {
    if (400..500).contains(&code) {
        CrmError::Rejected(code)
    } else {
        CrmError::Server(code)
    }
}

pub(crate) fn basic_token(credential: &Credential) -> String {
    STANDARD.encode(format!(
        "{}:{}:{}",
        credential.api_key, credential.username, credential.password
    ))
}

pub(crate) fn user_key_token(api_key: &str, user_key: &str) -> String {
    STANDARD.encode(format!("{}:{}", api_key, user_key))
}
