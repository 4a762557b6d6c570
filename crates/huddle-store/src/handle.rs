//! Shared, async-friendly access to a [`Database`].
//!
//! `rusqlite` is blocking, so every call is moved onto tokio's blocking
//! thread pool while the connection is held behind a mutex.  Components
//! receive a `StoreHandle` explicitly; tests hand them one backed by an
//! in-memory database.

use std::sync::{Arc, Mutex};

use crate::database::Database;
use crate::error::{Result, StoreError};

#[derive(Clone)]
pub struct StoreHandle {
    db: Arc<Mutex<Database>>,
}

impl StoreHandle {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Shortcut for a handle over a fresh in-memory database.
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Run `f` with exclusive access to the database on the blocking pool.
    ///
    /// Everything `f` does happens under one lock acquisition, so a
    /// read-check-write sequence inside a single call is not interleaved with
    /// other callers.  `f` may return any error type a [`StoreError`]
    /// converts into.
    pub async fn call<F, T, E>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Database) -> std::result::Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut guard = db.lock().map_err(|_| E::from(StoreError::Poisoned))?;
            f(&mut *guard)
        })
        .await
        .map_err(|e| E::from(StoreError::Join(e)))?
    }
}
