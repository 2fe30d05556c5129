use std::sync::{Mutex, MutexGuard, PoisonError};

use shared::domain::UserId;

mod archive;
mod error;
pub mod model;
mod session;

pub use archive::{prepare_database_url, ReplicaArchive};
pub use error::StoreError;
pub use model::Replica;
pub use session::Session;

/// The local replica behind a single-writer lock.
///
/// Each [`Store::write`] runs against a private copy of the replica and commits it
/// only if the closure succeeds, so readers never observe half an event.
#[derive(Debug, Default)]
pub struct Store {
    replica: Mutex<Replica>,
}

impl Store {
    pub fn new(replica: Replica) -> Self {
        Self {
            replica: Mutex::new(replica),
        }
    }

    pub fn for_user(user_id: UserId) -> Self {
        Self::new(Replica::with_current_user(user_id))
    }

    pub fn write<T>(
        &self,
        f: impl FnOnce(&mut Session<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut replica = self.lock();
        let (result, working) = {
            let mut session = Session::begin(&replica);
            let result = f(&mut session);
            (result, session.into_replica())
        };
        if result.is_ok() {
            *replica = working;
        }
        result
    }

    pub fn read<T>(&self, f: impl FnOnce(&Replica) -> T) -> T {
        f(&self.lock())
    }

    pub fn snapshot(&self) -> Replica {
        self.lock().clone()
    }

    pub fn replace(&self, replica: Replica) {
        *self.lock() = replica;
    }

    fn lock(&self) -> MutexGuard<'_, Replica> {
        self.replica.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
