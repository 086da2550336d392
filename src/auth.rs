//! Two-step CRM login and persistence of the resulting [`AuthSettings`].
//!
//! The first `/authentication` call (Basic credentials) yields the user key
//! but not the display name. The second call, made with the derived
//! `Userkeyauth` token, returns the name and id we show in the window.

use anyhow::{Context, Result};
use std::fmt;
use thiserror::Error;

use crate::crm::{self, CrmClient};
use crate::error::CrmError;
use crate::model::{AuthSettings, Credential};
use crate::secrets::{self, SecretStore};

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    Unauthenticated,
    BasicAuth,
    TokenFetch { token: String },
    Authenticated(AuthSettings),
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthState::Unauthenticated => "unauthenticated",
            AuthState::BasicAuth => BASIC_STEP,
            AuthState::TokenFetch { .. } => TOKEN_STEP,
            AuthState::Authenticated(_) => "authenticated",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("login failed during {step}: {source}")]
pub struct AuthFailure {
    pub step: &'static str,
    #[source]
    pub source: CrmError,
}

const BASIC_STEP: &str = "basic auth";
const TOKEN_STEP: &str = "token fetch";

impl AuthFailure {
    fn at(step: &'static str, source: CrmError) -> Self {
        Self { step, source }
    }

    /// Message for the login form.
    pub fn user_message(&self) -> String {
        match &self.source {
            CrmError::Rejected(_) => "Login rejected. Check your API key, username and password.".to_string(),
            other => format!("Login failed: {other}"),
        }
    }
}

/// Advance one state. `Authenticated` is terminal and returned unchanged.
pub fn advance(
    state: AuthState,
    client: &CrmClient,
    credential: &Credential,
) -> Result<AuthState, AuthFailure> {
    match state {
        AuthState::Unauthenticated => Ok(AuthState::BasicAuth),
        AuthState::BasicAuth => {
            let reply = client
                .authenticate_basic(credential)
                .map_err(|e| AuthFailure::at(BASIC_STEP, e))?;
            if reply.user_key.is_empty() {
                return Err(AuthFailure::at(
                    BASIC_STEP,
                    CrmError::Decode("authentication reply has no UserKey".into()),
                ));
            }
            let api_key = if reply.api_key.is_empty() {
                &credential.api_key
            } else {
                &reply.api_key
            };
            Ok(AuthState::TokenFetch {
                token: crm::user_key_token(api_key, &reply.user_key),
            })
        }
        AuthState::TokenFetch { token } => {
            let reply = client
                .authenticate_token(&token)
                .map_err(|e| AuthFailure::at(TOKEN_STEP, e))?;
            Ok(AuthState::Authenticated(AuthSettings {
                name: reply.name,
                id: reply.user_id,
                key: token,
            }))
        }
        done @ AuthState::Authenticated(_) => Ok(done),
    }
}

/// Run the flow from `Unauthenticated` to `Authenticated`. One attempt, no retry.
pub fn login(client: &CrmClient, credential: &Credential) -> Result<AuthSettings, AuthFailure> {
    let mut state = AuthState::Unauthenticated;
    loop {
        state = advance(state, client, credential)?;
        tracing::debug!(%state, "auth state");
        if let AuthState::Authenticated(settings) = state {
            tracing::info!(user = %settings.name, id = settings.id, "logged in to CRM");
            return Ok(settings);
        }
    }
}

/// Cached login from the secret store, if any.
pub fn load_settings(store: &dyn SecretStore) -> Result<Option<AuthSettings>> {
    let Some(raw) = store.get(secrets::AUTH)? else {
        return Ok(None);
    };
    let settings = serde_json::from_str(&raw).context("parsing stored CRM login")?;
    Ok(Some(settings))
}

/// All three fields go into one entry, so they are written together.
pub fn save_settings(store: &dyn SecretStore, settings: &AuthSettings) -> Result<()> {
    let raw = serde_json::to_string(settings).context("serializing CRM login")?;
    store.set(secrets::AUTH, &raw)
}

pub fn clear_settings(store: &dyn SecretStore) -> Result<()> {
    store.delete(secrets::AUTH)
}

/// Remember API key and username (never the password) to pre-fill the login form.
pub fn remember_login(store: &dyn SecretStore, credential: &Credential) -> Result<()> {
    store.set(secrets::API_KEY, &credential.api_key)?;
    store.set(secrets::USERNAME, &credential.username)
}

pub fn remembered_login(store: &dyn SecretStore) -> Result<Credential> {
    Ok(Credential {
        api_key: store.get(secrets::API_KEY)?.unwrap_or_default(),
        username: store.get(secrets::USERNAME)?.unwrap_or_default(),
        password: String::new(),
    })
}
