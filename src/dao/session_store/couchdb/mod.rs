//! CouchDB session store: `_rev` compare-and-swap and a `_changes` long-poll feed.

mod config;
mod error;
mod models;
mod store;

pub use config::CouchConfig;
pub use error::{CouchDaoError, CouchResult};
pub use store::CouchSessionStore;
