//! MongoDB session store: guarded `find_one_and_replace` and change streams.
//!
//! Change streams need a replica set (a single-node one is enough).

mod config;
mod connection;
mod error;
mod models;
mod store;

pub use config::MongoConfig;
pub use error::{MongoDaoError, MongoResult};
pub use store::MongoSessionStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        StorageError::unavailable("mongodb", err)
    }
}
