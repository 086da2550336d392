//! Lookup orchestration: owns the login cache and the lookup list, and
//! sequences "ensure auth → parse number → call CRM → update record".

use chrono::Utc;

use crate::auth::{self, AuthFailure};
use crate::bridge::{AuthPrompt, Bridge, Event, Message, Request, SettingsView};
use crate::crm::{CRM_NAME, CrmClient};
use crate::error::LookupError;
use crate::history::HistoryStore;
use crate::model::{AuthSettings, Contact, Credential, LookupRecord, LookupStatus};
use crate::phone;
use crate::secrets::SecretStore;

pub struct AppOptions {
    pub country_code: String,
    pub default_api_key: Option<String>,
    pub history: Option<HistoryStore>,
}

pub struct App {
    client: CrmClient,
    secrets: Box<dyn SecretStore>,
    bridge: Bridge,
    options: AppOptions,
    auth: Option<AuthSettings>,
    records: Vec<LookupRecord>,
    pending: Option<String>,
    prompt_message: Option<String>,
}

impl App {
    /// Restores the cached login and history. Unreadable state is logged and
    /// treated as absent.
    pub fn new(
        client: CrmClient,
        secrets: Box<dyn SecretStore>,
        bridge: Bridge,
        mut options: AppOptions,
    ) -> Self {
        let auth = auth::load_settings(secrets.as_ref()).unwrap_or_else(|e| {
            tracing::warn!(error = %format!("{e:#}"), "ignoring unreadable stored login");
            None
        });

        let mut keep_saving = true;
        let records = match &options.history {
            Some(history) => match history.load(secrets.as_ref()) {
                Ok(records) => records,
                Err(e) => {
                    let err = LookupError::LocalIo(format!("{e:#}"));
                    tracing::warn!(path = ?history.path(), error = %err, "starting with empty history");
                    // Never let a later save overwrite what we could not read.
                    match history.set_aside() {
                        Ok(moved) => {
                            tracing::warn!(?moved, "kept unreadable history file");
                        }
                        Err(e) => {
                            tracing::error!(error = %format!("{e:#}"), "history saving disabled for this session");
                            keep_saving = false;
                        }
                    }
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        if !keep_saving {
            options.history = None;
        }

        Self {
            client,
            secrets,
            bridge,
            options,
            auth,
            records,
            pending: None,
            prompt_message: None,
        }
    }

    pub fn auth(&self) -> Option<&AuthSettings> {
        self.auth.as_ref()
    }

    pub fn records(&self) -> &[LookupRecord] {
        &self.records
    }

    pub fn latest(&self) -> Option<&LookupRecord> {
        self.records.last()
    }

    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    /// Look up `raw`. Without a cached login the input is parked and a login
    /// prompt is published; the CRM is not called.
    pub fn lookup(&mut self, raw: &str) -> Result<(), LookupError> {
        let Some(digits) = phone::normalize(raw, &self.options.country_code) else {
            let err = LookupError::InvalidNumber(raw.to_string());
            self.bridge.publish(Message::Status(err.to_string()));
            return Err(err);
        };

        let Some(token) = self.auth.as_ref().map(|a| a.key.clone()) else {
            tracing::info!(input = raw, "lookup deferred until login");
            self.pending = Some(raw.to_string());
            self.prompt(LookupError::MissingCredentials.to_string());
            return Err(LookupError::MissingCredentials);
        };

        self.records
            .push(LookupRecord::pending(CRM_NAME, raw, Utc::now()));
        let idx = self.records.len() - 1;
        self.publish_record(idx);

        let outcome = self.client.search_by_phone(&token, &digits);
        let received_at = Utc::now();

        let result = match outcome {
            Ok(contacts) => {
                let record = &mut self.records[idx];
                record.status = LookupStatus::Success;
                record.details = match contacts.len() {
                    0 => "No matching contact".to_string(),
                    1 => "1 contact found".to_string(),
                    n => format!("{n} contacts found"),
                };
                record.results = contacts
                    .into_iter()
                    .map(|c| Contact::from_crm(c, &digits, received_at))
                    .collect();
                tracing::info!(phone = %digits, matches = record.results.len(), "lookup complete");
                Ok(())
            }
            Err(crm_err) => {
                let err = LookupError::from(crm_err);
                let record = &mut self.records[idx];
                record.status = LookupStatus::Failed;
                record.details = err.to_string();
                match &err {
                    LookupError::AuthRejected(code) => {
                        tracing::warn!(status = *code, "CRM rejected stored login");
                    }
                    LookupError::CrmServer(detail) => {
                        tracing::error!(phone = %digits, %detail, "CRM lookup failed");
                    }
                    _ => {}
                }
                Err(err)
            }
        };

        self.publish_record(idx);
        self.bridge.publish(Message::History(self.records.clone()));
        self.persist();

        if let Err(err @ LookupError::AuthRejected(_)) = &result {
            let message = err.to_string();
            self.clear_auth();
            self.pending = Some(raw.to_string());
            self.prompt(message);
        }

        result
    }

    /// One login attempt. On success a parked lookup is run once.
    pub fn submit_credentials(&mut self, mut credential: Credential) -> Result<(), AuthFailure> {
        if credential.api_key.is_empty() {
            if let Some(default) = &self.options.default_api_key {
                credential.api_key = default.clone();
            }
        }

        let settings = match auth::login(&self.client, &credential) {
            Ok(settings) => settings,
            Err(failure) => {
                tracing::warn!(error = %failure, "login failed");
                self.prompt(failure.user_message());
                return Err(failure);
            }
        };

        if let Err(e) = auth::save_settings(self.secrets.as_ref(), &settings) {
            tracing::error!(error = %format!("{e:#}"), "could not store login; it lasts until exit");
        }
        if let Err(e) = auth::remember_login(self.secrets.as_ref(), &credential) {
            tracing::warn!(error = %format!("{e:#}"), "could not remember username");
        }

        self.auth = Some(settings);
        self.prompt_message = None;
        self.bridge.publish(Message::Settings(self.settings_view()));

        if let Some(raw) = self.pending.take() {
            tracing::info!(input = %raw, "retrying deferred lookup");
            // Failures are already recorded and published.
            let _ = self.lookup(&raw);
        }
        Ok(())
    }

    pub fn logout(&mut self) {
        self.clear_auth();
        self.bridge.publish(Message::Settings(self.settings_view()));
        self.bridge.publish(Message::Status("Logged out".to_string()));
    }

    /// Answer a display request on the channel of the same name.
    pub fn handle(&self, request: Request) -> Message {
        match request {
            Request::ContactData => Message::ContactData(self.latest().cloned()),
            Request::AuthPrompt => Message::AuthPrompt(self.auth_prompt()),
            Request::History => Message::History(self.records.clone()),
            Request::Settings => Message::Settings(self.settings_view()),
        }
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::CredentialsSubmitted(credential) => {
                let _ = self.submit_credentials(credential);
            }
            Event::Logout => self.logout(),
        }
    }

    pub fn settings_view(&self) -> SettingsView {
        match &self.auth {
            Some(auth) => SettingsView {
                logged_in: true,
                name: auth.name.clone(),
                id: auth.id,
            },
            None => SettingsView {
                logged_in: false,
                name: String::new(),
                id: 0,
            },
        }
    }

    pub fn auth_prompt(&self) -> AuthPrompt {
        let mut remembered = auth::remembered_login(self.secrets.as_ref()).unwrap_or_default();
        if remembered.api_key.is_empty() {
            remembered.api_key = self.options.default_api_key.clone().unwrap_or_default();
        }
        AuthPrompt {
            message: self
                .prompt_message
                .clone()
                .unwrap_or_else(|| LookupError::MissingCredentials.to_string()),
            pending_input: self.pending.clone(),
            remembered,
        }
    }

    fn prompt(&mut self, message: String) {
        self.prompt_message = Some(message);
        self.bridge.publish(Message::AuthPrompt(self.auth_prompt()));
    }

    /// Name, id and key are dropped together, in memory and in the store.
    fn clear_auth(&mut self) {
        self.auth = None;
        if let Err(e) = auth::clear_settings(self.secrets.as_ref()) {
            tracing::error!(error = %format!("{e:#}"), "could not remove stored login");
        }
    }

    fn publish_record(&self, idx: usize) {
        self.bridge
            .publish(Message::ContactData(self.records.get(idx).cloned()));
    }

    fn persist(&self) {
        let Some(history) = &self.options.history else {
            return;
        };
        if let Err(e) = history.save(self.secrets.as_ref(), &self.records) {
            let err = LookupError::LocalIo(format!("{e:#}"));
            tracing::warn!(path = ?history.path(), error = %err, "could not save lookup history");
        }
    }
}
