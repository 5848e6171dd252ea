//! Usage: File-backed credential cache keyed by fingerprint, guarded by a cross-process lock.
//!
//! Layout: `{"version":1,"credentials":{"<fingerprint>": <credential>}}`. The advisory lock
//! lives in a sibling `<file>.lock` so the store file itself can be replaced atomically.

use crate::domain::credential::{Credential, CredentialFingerprint};
use crate::shared::blocking;
use crate::shared::error::AppResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const STORE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    version: u32,
    // Raw values so one undecodable entry never hides or drops the others.
    #[serde(default)]
    credentials: BTreeMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Blocks (off the executor) until the exclusive store lock is held.
    pub async fn begin(&self) -> AppResult<StoreTransaction> {
        let path = self.path.clone();
        blocking::run("credential_store_lock", move || StoreTransaction::acquire(path)).await
    }

    pub async fn get(&self, fingerprint: &CredentialFingerprint) -> AppResult<Option<Credential>> {
        let tx = self.begin().await?;
        Ok(tx.get(fingerprint))
    }

    pub async fn put(
        &self,
        fingerprint: &CredentialFingerprint,
        credential: &Credential,
    ) -> AppResult<()> {
        let tx = self.begin().await?;
        tx.put(fingerprint, credential)
    }

    /// Deletes the store file under the lock. Returns whether a file was removed.
    pub async fn reset(&self) -> AppResult<bool> {
        let tx = self.begin().await?;
        tx.clear()
    }
}

/// Holds the exclusive lock for a get-then-maybe-put sequence; released on drop.
#[derive(Debug)]
pub struct StoreTransaction {
    path: PathBuf,
    lock_file: File,
}

impl StoreTransaction {
    fn acquire(path: PathBuf) -> AppResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                format!(
                    "FILE_ERROR: failed to create credential store dir {}: {e}",
                    parent.display()
                )
            })?;
        }

        let lock_path = lock_path_for(&path);
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)
            .map_err(|e| {
                format!(
                    "FILE_ERROR: failed to open credential store lock {}: {e}",
                    lock_path.display()
                )
            })?;

        match fs2::FileExt::try_lock_exclusive(&lock_file) {
            Ok(()) => {}
            Err(err) if err.kind() == fs2::lock_contended_error().kind() => {
                tracing::info!(
                    store = %path.display(),
                    "credential store is locked by another process; waiting"
                );
                fs2::FileExt::lock_exclusive(&lock_file).map_err(|e| {
                    format!("FILE_ERROR: failed to lock credential store: {e}")
                })?;
            }
            Err(err) => {
                return Err(format!("FILE_ERROR: failed to lock credential store: {err}").into());
            }
        }

        tracing::trace!(store = %path.display(), "credential store lock acquired");
        Ok(Self { path, lock_file })
    }

    fn read_document(&self) -> StoreDocument {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return StoreDocument::default();
            }
            Err(err) => {
                tracing::warn!(
                    store = %self.path.display(),
                    error = %err,
                    "credential store unreadable; treating as empty"
                );
                return StoreDocument::default();
            }
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return StoreDocument::default();
        }
        match serde_json::from_slice::<StoreDocument>(&bytes) {
            Ok(doc) => doc,
            Err(err) => {
                tracing::warn!(
                    store = %self.path.display(),
                    error = %err,
                    "credential store is corrupt; treating as empty"
                );
                StoreDocument::default()
            }
        }
    }

    fn write_document(&self, doc: &StoreDocument) -> AppResult<()> {
        let encoded = serde_json::to_vec_pretty(doc)
            .map_err(|e| format!("INTERNAL_ERROR: credential store encode failed: {e}"))?;
        write_file_atomic(&self.path, &encoded)
    }

    /// Absent and undecodable entries read as a miss.
    pub fn get(&self, fingerprint: &CredentialFingerprint) -> Option<Credential> {
        let mut doc = self.read_document();
        let raw = doc.credentials.remove(fingerprint.as_str())?;
        match serde_json::from_value::<Credential>(raw) {
            Ok(credential) => Some(credential),
            Err(err) => {
                tracing::debug!(
                    fingerprint = %fingerprint,
                    error = %err,
                    "cached credential undecodable; ignoring"
                );
                None
            }
        }
    }

    pub fn put(
        &self,
        fingerprint: &CredentialFingerprint,
        credential: &Credential,
    ) -> AppResult<()> {
        let value = serde_json::to_value(credential)
            .map_err(|e| format!("INTERNAL_ERROR: credential encode failed: {e}"))?;
        let mut doc = self.read_document();
        doc.version = STORE_FORMAT_VERSION;
        doc.credentials.insert(fingerprint.as_str().to_string(), value);
        self.write_document(&doc)?;
        tracing::debug!(fingerprint = %fingerprint, "credential stored");
        Ok(())
    }

    pub fn remove(&self, fingerprint: &CredentialFingerprint) -> AppResult<bool> {
        let mut doc = self.read_document();
        if doc.credentials.remove(fingerprint.as_str()).is_none() {
            return Ok(false);
        }
        doc.version = STORE_FORMAT_VERSION;
        self.write_document(&doc)?;
        tracing::debug!(fingerprint = %fingerprint, "credential removed from store");
        Ok(true)
    }

    fn clear(&self) -> AppResult<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(format!(
                "FILE_ERROR: failed to remove credential store {}: {err}",
                self.path.display()
            )
            .into()),
        }
    }
}

impl Drop for StoreTransaction {
    fn drop(&mut self) {
        if let Err(err) = fs2::FileExt::unlock(&self.lock_file) {
            tracing::warn!(
                store = %self.path.display(),
                error = %err,
                "credential store unlock failed; lock is released when the file closes"
            );
        }
    }
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(".lock");
    PathBuf::from(raw)
}

/// Temp file in the target directory, then rename. The temp file is created 0600 on unix.
fn write_file_atomic(path: &Path, bytes: &[u8]) -> AppResult<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| format!("FILE_ERROR: failed to create temp file in {}: {e}", dir.display()))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| format!("FILE_ERROR: failed to write credential store: {e}"))?;
    tmp.persist(path).map_err(|e| {
        format!(
            "FILE_ERROR: failed to replace credential store {}: {}",
            path.display(),
            e.error
        )
    })?;
    Ok(())
}
