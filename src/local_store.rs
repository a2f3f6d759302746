use crate::{
    store::{ReservationStore, StoreError},
    types::Booking,
};
use async_trait::async_trait;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{fs, sync::Mutex};
use tracing::{debug, error};

/// Key under which the whole booking list is kept as one JSON blob.
pub const STORAGE_KEY: &str = "rent-a-ferri-bookings";

/// Single-user store. Not shared between processes or machines.
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl LocalStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(format!("{STORAGE_KEY}.json")),
            lock: Arc::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<Booking>, StoreError> {
        let blob = match fs::read_to_string(&self.path).await {
            Ok(blob) => blob,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(err) => {
                error!(?err, path = %self.path.display(), "Failed to read bookings");
                return Err(err.into());
            }
        };
        decode(&blob).map_err(|err| {
            error!(?err, path = %self.path.display(), "Stored bookings are corrupt");
            err
        })
    }

    async fn store(&self, bookings: &[Booking]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.path, encode(bookings)?).await?;
        Ok(())
    }
}

pub fn encode(bookings: &[Booking]) -> Result<String, StoreError> {
    Ok(serde_json::to_string(bookings)?)
}

pub fn decode(blob: &str) -> Result<Vec<Booking>, StoreError> {
    Ok(serde_json::from_str(blob)?)
}

#[async_trait]
impl ReservationStore for LocalStore {
    async fn list_all(&self) -> Result<Vec<Booking>, StoreError> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    async fn append(&self, booking: Booking) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut bookings = self.load().await?;
        bookings.push(booking);
        self.store(&bookings).await?;
        debug!(count = bookings.len(), "Local bookings written");
        Ok(())
    }
}
