use crate::{
    store::{ReservationStore, StoreError},
    types::{
        is_valid_date, Booking, Slot, INVALID_AMOUNT, INVALID_DATE, INVALID_TIME, MISSING_FIELD,
        TIME_SLOTS,
    },
};
use axum::http::StatusCode;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tracing::{info, warn};
use validator::{Validate, ValidationErrors};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidBooking {
    #[error("missing field")]
    MissingField,
    #[error("invalid amount")]
    InvalidAmount,
    #[error("invalid date")]
    InvalidDate,
    #[error("invalid time")]
    InvalidTime,
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error(transparent)]
    Validation(InvalidBooking),
    #[error("slot already booked")]
    Conflict { date: String, time: String },
    #[error(transparent)]
    Backend(#[from] StoreError),
}

impl BookingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BookingError::Validation(_) => StatusCode::BAD_REQUEST,
            BookingError::Conflict { .. } => StatusCode::CONFLICT,
            BookingError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationErrors> for InvalidBooking {
    /// The first failing check in the order the booking form reports them.
    fn from(errors: ValidationErrors) -> Self {
        let codes: Vec<_> = errors
            .field_errors()
            .into_values()
            .flat_map(|errors| errors.iter().map(|error| error.code.clone()))
            .collect();
        [
            (MISSING_FIELD, InvalidBooking::MissingField),
            (INVALID_AMOUNT, InvalidBooking::InvalidAmount),
            (INVALID_DATE, InvalidBooking::InvalidDate),
            (INVALID_TIME, InvalidBooking::InvalidTime),
        ]
        .into_iter()
        .find(|(code, _)| codes.iter().any(|found| found == code))
        .map(|(_, invalid)| invalid)
        .unwrap_or(InvalidBooking::MissingField)
    }
}

/// Slot locks currently handed out. An entry lives as long as someone holds it.
type SlotLocks = Arc<Mutex<HashMap<Slot, Arc<tokio::sync::Mutex<()>>>>>;

#[derive(Debug, Clone)]
pub struct BookingService<T: ReservationStore> {
    store: T,
    slot_locks: SlotLocks,
}

impl<T: ReservationStore> BookingService<T> {
    pub fn new(store: T) -> Self {
        Self {
            store,
            slot_locks: SlotLocks::default(),
        }
    }

    pub async fn bookings(&self) -> Result<Vec<Booking>, StoreError> {
        self.store.list_all().await
    }

    pub async fn available_slots(&self, date: &str) -> Result<Vec<&'static str>, BookingError> {
        if !is_valid_date(date) {
            return Err(BookingError::Validation(InvalidBooking::InvalidDate));
        }
        let bookings = self.store.list_all().await?;
        Ok(TIME_SLOTS
            .into_iter()
            .filter(|time| !bookings.iter().any(|booking| booking.occupies(date, time)))
            .collect())
    }

    /// Validates the request, then checks and claims the slot while holding
    /// its lock, so two calls on this service can never both win a slot.
    pub async fn reserve(
        &self,
        date: &str,
        time: &str,
        name: &str,
        bribe: &str,
    ) -> Result<Booking, BookingError> {
        let booking = Booking::new(date, time, name, bribe);
        if let Err(errors) = booking.validate() {
            let invalid = InvalidBooking::from(errors);
            warn!(%invalid, date, time, "Rejected booking request");
            return Err(BookingError::Validation(invalid));
        }

        let lease = self.lease_slot(booking.slot());
        let _guard = lease.lock.lock().await;
        self.check_and_append(booking).await
    }

    async fn check_and_append(&self, booking: Booking) -> Result<Booking, BookingError> {
        if !self.store.is_available(&booking.date, &booking.time).await? {
            warn!(date = %booking.date, time = %booking.time, "Slot already booked");
            return Err(BookingError::Conflict {
                date: booking.date,
                time: booking.time,
            });
        }

        self.store.append(booking.clone()).await?;
        info!(date = %booking.date, time = %booking.time, "Slot booked");
        Ok(booking)
    }

    fn lease_slot(&self, slot: Slot) -> SlotLease<'_> {
        let lock = self
            .slot_locks
            .lock()
            .unwrap()
            .entry(slot.clone())
            .or_default()
            .clone();
        SlotLease {
            slot_locks: &self.slot_locks,
            slot,
            lock,
        }
    }
}

/// Hands the slot lock back when dropped, also when the reserving future is
/// cancelled halfway.
struct SlotLease<'a> {
    slot_locks: &'a SlotLocks,
    slot: Slot,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for SlotLease<'_> {
    fn drop(&mut self) {
        let mut slot_locks = self.slot_locks.lock().unwrap();
        // One reference in the map, one in this lease: nobody else is waiting.
        if Arc::strong_count(&self.lock) == 2 {
            slot_locks.remove(&self.slot);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{local_store::LocalStore, testutils::MockStore};
    use std::{sync::atomic::Ordering, time::Duration};
    use test_case::test_case;

    fn seeded_service() -> (MockStore, BookingService<MockStore>) {
        let store = MockStore::new();
        store
            .0
            .bookings
            .lock()
            .unwrap()
            .push(Booking::new("01.01.2030", "10:00", "X", "1"));
        (store.clone(), BookingService::new(store))
    }

    #[test_case("", "10:00", "A", "5", InvalidBooking::MissingField)]
    #[test_case("01.01.2030", "", "A", "5", InvalidBooking::MissingField)]
    #[test_case("01.01.2030", "10:00", "   ", "5", InvalidBooking::MissingField)]
    #[test_case("01.01.2030", "10:00", "A", "", InvalidBooking::MissingField)]
    #[test_case("", "10:00", "A", "-5", InvalidBooking::MissingField)]
    #[test_case("01.01.2030", "10:00", "A", "-5", InvalidBooking::InvalidAmount)]
    #[test_case("01.01.2030", "10:00", "A", "abc", InvalidBooking::InvalidAmount)]
    #[test_case("2030-01-01", "10:00", "A", "abc", InvalidBooking::InvalidAmount)]
    #[test_case("2030-01-01", "10:00", "A", "5", InvalidBooking::InvalidDate)]
    #[test_case("01.01.2030", "08:00", "A", "5", InvalidBooking::InvalidTime)]
    #[tokio::test]
    async fn test_validation_rejects(
        date: &str,
        time: &str,
        name: &str,
        bribe: &str,
        expected: InvalidBooking,
    ) {
        let store = MockStore::new();
        let service = BookingService::new(store.clone());

        match service.reserve(date, time, name, bribe).await {
            Err(BookingError::Validation(invalid)) => assert_eq!(invalid, expected),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(store.0.calls_to_list_all.load(Ordering::SeqCst), 0);
        assert_eq!(store.0.calls_to_append.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_conflict_leaves_store_unchanged() {
        let (store, service) = seeded_service();

        let err = service
            .reserve("01.01.2030", "10:00", "Y", "2")
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Conflict { .. }));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(store.0.bookings.lock().unwrap().len(), 1);
        assert_eq!(store.0.calls_to_append.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_happy_path() {
        let (store, service) = seeded_service();

        let booking = service
            .reserve("01.01.2030", "11:00", "Y", "2")
            .await
            .unwrap();
        assert_eq!(booking, Booking::new("01.01.2030", "11:00", "Y", "2"));

        let bookings = service.bookings().await.unwrap();
        assert_eq!(
            bookings,
            vec![
                Booking::new("01.01.2030", "10:00", "X", "1"),
                Booking::new("01.01.2030", "11:00", "Y", "2"),
            ]
        );
        assert_eq!(store.0.calls_to_append.load(Ordering::SeqCst), 1);
        assert!(service.slot_locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_backend_error() {
        let (store, service) = seeded_service();
        store.0.success.store(false, Ordering::SeqCst);

        let err = service
            .reserve("01.01.2030", "11:00", "Y", "2")
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Backend(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("Supposed to fail"));
        assert!(service.slot_locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_serialized_reservations_keep_slots_unique() {
        let dir = tempfile::tempdir().unwrap();
        let service = BookingService::new(LocalStore::new(dir.path()));

        let attempts = [
            ("01.01.2030", "10:00", "A"),
            ("01.01.2030", "10:00", "B"),
            ("01.01.2030", "11:00", "C"),
            ("02.01.2030", "10:00", "D"),
            ("02.01.2030", "10:00", "E"),
            ("01.01.2030", "11:00", "F"),
        ];
        for (date, time, name) in attempts {
            let _ = service.reserve(date, time, name, "1").await;
        }

        let bookings = service.bookings().await.unwrap();
        let names: Vec<_> = bookings.iter().map(|booking| booking.name.as_str()).collect();
        assert_eq!(names, vec!["A", "C", "D"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reservations_claim_slot_once() {
        let dir = tempfile::tempdir().unwrap();
        let service = BookingService::new(LocalStore::new(dir.path()));

        let attempts: Vec<_> = (0..16)
            .map(|i| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .reserve("05.05.2030", "12:00", &format!("Racer {i}"), "1")
                        .await
                })
            })
            .collect();

        let mut won = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => won += 1,
                Err(BookingError::Conflict { .. }) => {}
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
        assert_eq!(won, 1);
        assert_eq!(service.bookings().await.unwrap().len(), 1);
        assert!(service.slot_locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_reservation_releases_slot_lock() {
        let (store, service) = seeded_service();
        let slot = Booking::new("01.01.2030", "11:00", "Y", "2").slot();

        let held = service.lease_slot(slot);
        let guard = held.lock.lock().await;
        let attempt = tokio::time::timeout(
            Duration::from_millis(20),
            service.reserve("01.01.2030", "11:00", "Y", "2"),
        )
        .await;
        assert!(attempt.is_err());
        assert_eq!(service.slot_locks.lock().unwrap().len(), 1);

        drop(guard);
        drop(held);
        assert!(service.slot_locks.lock().unwrap().is_empty());
        assert_eq!(store.0.calls_to_append.load(Ordering::SeqCst), 0);

        service.reserve("01.01.2030", "11:00", "Y", "2").await.unwrap();
        assert!(service.slot_locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_available_slots() {
        let (_store, service) = seeded_service();
        service.reserve("01.01.2030", "23:00", "Y", "2").await.unwrap();

        let slots = service.available_slots("01.01.2030").await.unwrap();
        assert_eq!(slots.len(), TIME_SLOTS.len() - 2);
        assert!(!slots.contains(&"10:00"));
        assert!(!slots.contains(&"23:00"));
        assert!(slots.contains(&"09:00"));

        assert_eq!(
            service.available_slots("02.01.2030").await.unwrap(),
            TIME_SLOTS.to_vec()
        );
        assert!(matches!(
            service.available_slots("2030-01-02").await,
            Err(BookingError::Validation(InvalidBooking::InvalidDate))
        ));
    }
}
