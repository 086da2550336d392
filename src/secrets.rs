use anyhow::{Context, Result};
use keyring::Entry;
use std::cell::RefCell;
use std::collections::HashMap;

pub const SERVICE_NAME: &str = "crm-screen-pop";

pub const USERNAME: &str = "crm-username";
pub const API_KEY: &str = "crm-api-key";
pub const AUTH: &str = "crm-auth";
pub const HISTORY_KEY: &str = "history-key";

/// Named string secrets. `get` returns `None` when nothing is stored.
pub trait SecretStore {
    fn get(&self, name: &str) -> Result<Option<String>>;
    fn set(&self, name: &str, value: &str) -> Result<()>;
    fn delete(&self, name: &str) -> Result<()>;
}

/// OS keychain (macOS Keychain, Secret Service, Windows Credential Manager).
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, name: &str) -> Result<Entry> {
        Entry::new(&self.service, name).context("failed to create keyring entry")
    }
}

impl SecretStore for KeyringStore {
    fn get(&self, name: &str) -> Result<Option<String>> {
        match self.entry(name)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(anyhow::anyhow!("failed to read secret '{}': {e}", name)),
        }
    }

    fn set(&self, name: &str, value: &str) -> Result<()> {
        self.entry(name)?
            .set_password(value)
            .with_context(|| format!("failed to store secret '{}' in keychain", name))
    }

    fn delete(&self, name: &str) -> Result<()> {
        match self.entry(name)?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(anyhow::anyhow!("failed to delete secret '{}': {e}", name)),
        }
    }
}

/// Process-local store for tests and `--no-keychain` runs.
#[derive(Default)]
pub struct MemoryStore {
    values: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemoryStore {
    fn get(&self, name: &str) -> Result<Option<String>> {
        Ok(self.values.borrow().get(name).cloned())
    }

    fn set(&self, name: &str, value: &str) -> Result<()> {
        self.values
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<()> {
        self.values.borrow_mut().remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests;
