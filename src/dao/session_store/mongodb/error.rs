use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures that can occur while interacting with MongoDB.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to insert session `{id}`")]
    InsertSession {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load session `{id}`")]
    LoadSession {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to update session `{id}`")]
    UpdateSession {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to list sessions")]
    ListSessions {
        #[source]
        source: MongoError,
    },
    #[error("failed to watch session `{id}`")]
    WatchSession {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("stored session id `{value}` is not a UUID")]
    InvalidId { value: String },
    #[error("stored session `{id}` has negative revision {value}")]
    InvalidRevision { id: Uuid, value: i64 },
}
