use crate::types::Booking;
use async_trait::async_trait;

/// Every variant means the backing store could not serve the request.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Missing required Google Sheets configuration: {0}")]
    MissingConfiguration(&'static str),
    #[error("Failed to reach the spreadsheet backend: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("The spreadsheet backend answered with status {code}: {body}")]
    Status {
        code: reqwest::StatusCode,
        body: String,
    },
    #[error("Failed to sign the service account assertion: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("Unexpected header row {found:?}, missing column '{missing}'")]
    Header {
        found: Vec<String>,
        missing: &'static str,
    },
    #[error("Failed to access local booking storage: {0}")]
    Io(#[from] std::io::Error),
    #[error("Stored bookings are not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait ReservationStore: Clone + Send + Sync + 'static {
    /// All persisted bookings in insertion order.
    async fn list_all(&self) -> Result<Vec<Booking>, StoreError>;

    /// Records the booking. Uniqueness of its slot is the caller's concern.
    async fn append(&self, booking: Booking) -> Result<(), StoreError>;

    async fn is_available(&self, date: &str, time: &str) -> Result<bool, StoreError> {
        let bookings = self.list_all().await?;
        Ok(!bookings.iter().any(|booking| booking.occupies(date, time)))
    }
}
