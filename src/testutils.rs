use std::{
    io,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;

use crate::{
    store::{ReservationStore, StoreError},
    types::Booking,
};

#[derive(Debug)]
pub struct MockStoreInner {
    pub success: AtomicBool,
    pub calls_to_list_all: AtomicU64,
    pub calls_to_append: AtomicU64,
    pub bookings: Mutex<Vec<Booking>>,
}

#[derive(Debug, Clone)]
pub struct MockStore(pub Arc<MockStoreInner>);

impl MockStoreInner {
    fn new() -> Self {
        Self {
            success: AtomicBool::new(true),
            calls_to_list_all: AtomicU64::default(),
            calls_to_append: AtomicU64::default(),
            bookings: Mutex::default(),
        }
    }
}

impl MockStore {
    pub fn new() -> Self {
        Self(Arc::new(MockStoreInner::new()))
    }

    fn result(&self) -> Result<(), StoreError> {
        match self.0.success.load(Ordering::SeqCst) {
            true => Ok(()),
            false => Err(io::Error::new(io::ErrorKind::Other, "Supposed to fail").into()),
        }
    }
}

#[async_trait]
impl ReservationStore for MockStore {
    async fn list_all(&self) -> Result<Vec<Booking>, StoreError> {
        self.0.calls_to_list_all.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        Ok(self.0.bookings.lock().unwrap().clone())
    }

    async fn append(&self, booking: Booking) -> Result<(), StoreError> {
        self.0.calls_to_append.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        self.0.bookings.lock().unwrap().push(booking);
        Ok(())
    }
}
