use aes::Aes256;
use anyhow::{Context, Result};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::LookupRecord;
use crate::secrets::{self, SecretStore};

type HistoryEncryptor = cbc::Encryptor<Aes256>;
type HistoryDecryptor = cbc::Decryptor<Aes256>;

const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

/// Encrypted on-disk copy of the lookup list.
///
/// File layout: a fresh random IV followed by the AES-256-CBC ciphertext.
/// The key lives in the secret store.
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file means no history yet.
    pub fn load(&self, store: &dyn SecretStore) -> Result<Vec<LookupRecord>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("reading {:?}", self.path)),
        };

        let key = stored_key(store)?
            .context("history file exists but its encryption key is missing")?;

        if bytes.len() < IV_LEN {
            anyhow::bail!("{:?} is too short to be a history file", self.path);
        }
        let (iv, ciphertext) = bytes.split_at(IV_LEN);

        let plaintext = HistoryDecryptor::new_from_slices(&key, iv)
            .map_err(|e| anyhow::anyhow!("invalid history key: {e}"))?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|e| anyhow::anyhow!("decrypting {:?}: {e}", self.path))?;

        serde_json::from_slice(&plaintext).with_context(|| format!("parsing {:?}", self.path))
    }

    pub fn save(&self, store: &dyn SecretStore, records: &[LookupRecord]) -> Result<()> {
        let key = match stored_key(store)? {
            Some(key) => key,
            None => generate_key(store)?,
        };
        let iv: [u8; IV_LEN] = rand::random();

        let plaintext = serde_json::to_vec(records).context("serializing history")?;
        let ciphertext = HistoryEncryptor::new_from_slices(&key, &iv)
            .map_err(|e| anyhow::anyhow!("invalid history key: {e}"))?
            .encrypt_padded_vec_mut::<Pkcs7>(&plaintext);

        let mut bytes = Vec::with_capacity(IV_LEN + ciphertext.len());
        bytes.extend_from_slice(&iv);
        bytes.extend_from_slice(&ciphertext);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
        }

        // Write then rename so a crash never leaves a truncated file behind.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &bytes).with_context(|| format!("writing {:?}", tmp))?;
        fs::rename(&tmp, &self.path).with_context(|| format!("replacing {:?}", self.path))?;
        Ok(())
    }

    /// Move an unreadable file out of the way so the next save cannot
    /// overwrite it. Returns where it went, or `None` if there was no file.
    pub fn set_aside(&self) -> Result<Option<PathBuf>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(format!(".unreadable-{}", Utc::now().format("%Y%m%dT%H%M%S%.3f")));
        let target = self.path.with_file_name(name);
        fs::rename(&self.path, &target)
            .with_context(|| format!("moving {:?} to {:?}", self.path, target))?;
        Ok(Some(target))
    }
}

fn stored_key(store: &dyn SecretStore) -> Result<Option<Vec<u8>>> {
    let Some(key) = store.get(secrets::HISTORY_KEY)? else {
        return Ok(None);
    };
    Ok(Some(hex::decode(key).context("decoding history key")?))
}

fn generate_key(store: &dyn SecretStore) -> Result<Vec<u8>> {
    let key: [u8; KEY_LEN] = rand::random();
    store.set(secrets::HISTORY_KEY, &hex::encode(key))?;
    tracing::info!("generated new history encryption key");
    Ok(key.to_vec())
}

#[cfg(test)]
mod tests;
