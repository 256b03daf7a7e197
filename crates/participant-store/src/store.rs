//! JSON-file participant store.

use crate::error::StoreError;
use crate::types::{normalize_phone, Participant};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use ttl_cache::{Clock, TtlCell};

/// Ordered list of participants persisted as one JSON array.
///
/// Every mutation takes the writer lock, re-reads the file, and rewrites it
/// in full through a temp file and rename. Plain reads are served from a
/// cache that may be up to `cache_ttl` old.
pub struct ParticipantStore {
    path: PathBuf,
    lock: Mutex<()>,
    cache: TtlCell<Vec<Participant>>,
}

impl ParticipantStore {
    /// Default read-cache freshness.
    pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

    /// Open the store at `path`, creating an empty file if none exists.
    pub async fn open(
        path: impl Into<PathBuf>,
        cache_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError> {
        let store = Self {
            path: path.into(),
            lock: Mutex::new(()),
            cache: TtlCell::new(cache_ttl, clock),
        };

        if !store.path.exists() {
            info!("Participant file not found at {:?}, creating it", store.path);
            store.write_file(&[]).await?;
        }

        Ok(store)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All participants in insertion order.
    ///
    /// Read or parse failures yield an empty list.
    pub async fn load(&self) -> Vec<Participant> {
        if let Some(participants) = self.cache.get().await {
            debug!("Serving {} participants from cache", participants.len());
            return participants;
        }

        let _guard = self.lock.lock().await;
        match self.read_file().await {
            Ok(participants) => {
                self.cache.set(participants.clone()).await;
                participants
            }
            Err(e) => {
                warn!(path = ?self.path, "Failed to read participants: {}", e);
                Vec::new()
            }
        }
    }

    /// Number of participants, as seen by [`ParticipantStore::load`].
    pub async fn count(&self) -> usize {
        self.load().await.len()
    }

    /// Append a participant and return the new store length.
    ///
    /// Fails with [`StoreError::DuplicatePhone`] if the phone digits are
    /// already on file.
    #[instrument(skip(self, participant))]
    pub async fn append(&self, participant: Participant) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().await;

        let mut participants = self.read_file().await?;
        let phone = participant.normalized_phone();
        if !phone.is_empty() && participants.iter().any(|p| p.normalized_phone() == phone) {
            return Err(StoreError::DuplicatePhone(participant.phone));
        }

        participants.push(participant);
        self.commit(participants).await
    }

    /// Remove the participant at `index` and return it.
    ///
    /// Indices refer to the current on-disk order and shift after every
    /// deletion.
    #[instrument(skip(self))]
    pub async fn delete(&self, index: usize) -> Result<Participant, StoreError> {
        let _guard = self.lock.lock().await;

        let mut participants = self.read_file().await?;
        if index >= participants.len() {
            return Err(StoreError::NotFound {
                index,
                len: participants.len(),
            });
        }

        let removed = participants.remove(index);
        self.commit(participants).await?;
        Ok(removed)
    }

    /// Remove every participant and return how many there were.
    #[instrument(skip(self))]
    pub async fn delete_all(&self) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().await;

        // An unreadable file is wiped too.
        let removed = self.read_file().await.map(|p| p.len()).unwrap_or(0);
        self.commit(Vec::new()).await?;
        Ok(removed)
    }

    /// Whether a participant with the same phone digits exists.
    pub async fn is_phone_registered(&self, phone: &str) -> bool {
        let wanted = normalize_phone(phone);
        if wanted.is_empty() {
            return false;
        }

        self.load()
            .await
            .iter()
            .any(|p| p.normalized_phone() == wanted)
    }

    /// Write `participants` and refresh the cache. Caller holds the lock.
    async fn commit(&self, participants: Vec<Participant>) -> Result<usize, StoreError> {
        self.write_file(&participants).await?;
        let len = participants.len();
        self.cache.set(participants).await;
        Ok(len)
    }

    async fn read_file(&self) -> Result<Vec<Participant>, StoreError> {
        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_slice(&data)?)
    }

    async fn write_file(&self, participants: &[Participant]) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(participants)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        // Write atomically using temp file + rename
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, &data).await?;
        fs::rename(&temp_path, &self.path).await?;

        debug!(
            "Saved {} participants ({} bytes) to {:?}",
            participants.len(),
            data.len(),
            self.path
        );
        Ok(())
    }
}
