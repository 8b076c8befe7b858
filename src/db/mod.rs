//! Database layer: a document store with find/insert/update-by-filter.
//!
//! Backed by Firestore in production and by an in-process map for local
//! runs and tests. Every call is bounded by the configured timeout.

pub mod firestore;
pub mod memory;
pub mod object_id;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;
pub use object_id::{ObjectId, ObjectIdError};

use crate::config::DatabaseConfig;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const DEVICES: &str = "devices";
}

/// Unique constraints declared at connect time.
pub const UNIQUE_INDEXES: &[(&str, &str)] = &[
    (collections::USERS, "mobile"),
    (collections::DEVICES, "device_id"),
];

/// Field name under which the store-assigned id is kept in every document.
pub const ID_FIELD: &str = "id";

/// Raw document representation shared by the backends.
pub type Document = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated on {collection}.{field}")]
    UniqueViolation { collection: String, field: String },

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("store backend error: {0}")]
    Backend(String),

    #[error("document codec error: {0}")]
    Codec(String),

    #[error("invalid database uri: {0}")]
    InvalidUri(String),

    #[error("database not connected (offline mode)")]
    Offline,
}

/// Conjunction of equality clauses over top-level string fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    clauses: Vec<(String, String)>,
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<String>) -> Self {
        Self::default().and(field, value)
    }

    pub fn and(mut self, field: &str, value: impl Into<String>) -> Self {
        self.clauses.push((field.to_string(), value.into()));
        self
    }

    pub fn clauses(&self) -> &[(String, String)] {
        &self.clauses
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.clauses
            .iter()
            .all(|(field, value)| document.get(field).and_then(Value::as_str) == Some(value.as_str()))
    }
}

/// Field assignments applied by `update_one` (`$set` semantics).
///
/// Unique-indexed fields are immutable after insert and must not be patched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
    sets: Vec<(String, String)>,
}

impl Patch {
    pub fn set(field: &str, value: impl Into<String>) -> Self {
        Self::default().and_set(field, value)
    }

    pub fn and_set(mut self, field: &str, value: impl Into<String>) -> Self {
        self.sets.push((field.to_string(), value.into()));
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.sets.iter().map(|(field, _)| field.as_str())
    }

    pub(crate) fn apply(&self, document: &mut Document) {
        for (field, value) in &self.sets {
            document.insert(field.clone(), Value::String(value.clone()));
        }
    }

    pub(crate) fn to_document(&self) -> Document {
        let mut document = Document::new();
        self.apply(&mut document);
        document
    }
}

#[derive(Clone)]
enum Backend {
    Firestore(FirestoreStore),
    Memory(MemoryStore),
    Offline,
}

/// Document store handle. Cheap to clone; clones share the connection.
#[derive(Clone)]
pub struct Database {
    backend: Backend,
    prefix: String,
    op_timeout: Duration,
    faults: Arc<faults::ReadFaults>,
}

impl Database {
    /// Connect to the store named by `config.uri` and declare the unique indexes.
    ///
    /// Supported schemes: `memory://` and `firestore://<project-id>`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let op_timeout = Duration::from_secs(config.timeout_secs);

        let backend = if config.uri.is_empty() {
            return Err(StoreError::InvalidUri("database uri is not set".to_string()));
        } else if config.uri.starts_with("memory://") {
            Backend::Memory(MemoryStore::new())
        } else if let Some(project_id) = config.uri.strip_prefix("firestore://") {
            let project_id = project_id.trim_end_matches('/');
            if project_id.is_empty() {
                return Err(StoreError::InvalidUri(
                    "firestore uri is missing a project id".to_string(),
                ));
            }
            let store = tokio::time::timeout(op_timeout, FirestoreStore::new(project_id))
                .await
                .map_err(|_| StoreError::Timeout(op_timeout))??;
            Backend::Firestore(store)
        } else {
            let scheme = config.uri.split("://").next().unwrap_or_default();
            return Err(StoreError::InvalidUri(format!(
                "unsupported scheme '{}'",
                scheme
            )));
        };

        let db = Self {
            backend,
            prefix: config.name.clone(),
            op_timeout,
            faults: Default::default(),
        };

        for (collection, field) in UNIQUE_INDEXES {
            db.ensure_unique_index(collection, field).await?;
        }

        tracing::info!(
            backend = db.backend_name(),
            prefix = %db.prefix,
            timeout_secs = config.timeout_secs,
            "Database ready"
        );

        Ok(db)
    }

    /// In-process store with the unique indexes already declared.
    pub fn in_memory() -> Self {
        let store = MemoryStore::new();
        let defaults = DatabaseConfig::default();
        let db = Self {
            backend: Backend::Memory(store.clone()),
            prefix: defaults.name,
            op_timeout: Duration::from_secs(defaults.timeout_secs),
            faults: Default::default(),
        };
        for (collection, field) in UNIQUE_INDEXES {
            store.ensure_unique_index(&db.collection(collection), field);
        }
        db
    }

    /// Create a mock database for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self {
            backend: Backend::Offline,
            prefix: String::new(),
            op_timeout: Duration::from_secs(1),
            faults: Default::default(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Firestore(_) => "firestore",
            Backend::Memory(_) => "memory",
            Backend::Offline => "offline",
        }
    }

    fn collection(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}_{}", self.prefix, name)
        }
    }

    /// Run one store call under the per-operation deadline.
    async fn bounded<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        tokio::time::timeout(self.op_timeout, call)
            .await
            .map_err(|_| StoreError::Timeout(self.op_timeout))?
    }

    pub async fn ensure_unique_index(&self, collection: &str, field: &str) -> Result<(), StoreError> {
        let collection = self.collection(collection);
        match &self.backend {
            Backend::Firestore(store) => store.ensure_unique_index(&collection, field),
            Backend::Memory(store) => store.ensure_unique_index(&collection, field),
            Backend::Offline => return Err(StoreError::Offline),
        }
        Ok(())
    }

    /// First document matching `filter`, if any.
    pub async fn find_one<T>(&self, collection: &str, filter: &Filter) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        self.faults.check()?;
        let collection = self.collection(collection);
        self.bounded(async {
            match &self.backend {
                Backend::Firestore(store) => store.find_one(&collection, filter).await,
                Backend::Memory(store) => store
                    .find_one(&collection, filter)
                    .map(decode)
                    .transpose(),
                Backend::Offline => Err(StoreError::Offline),
            }
        })
        .await
    }

    /// All documents matching `filter`, in store order.
    pub async fn find_many<T>(&self, collection: &str, filter: &Filter) -> Result<Vec<T>, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        self.faults.check()?;
        let collection = self.collection(collection);
        self.bounded(async {
            match &self.backend {
                Backend::Firestore(store) => store.find_many(&collection, filter).await,
                Backend::Memory(store) => store
                    .find_many(&collection, filter)
                    .into_iter()
                    .map(decode)
                    .collect(),
                Backend::Offline => Err(StoreError::Offline),
            }
        })
        .await
    }

    /// Insert a document and return the id the store assigned to it.
    ///
    /// Fails with [`StoreError::UniqueViolation`] if a declared unique field
    /// collides with an existing document.
    pub async fn insert_one<T>(&self, collection: &str, document: &T) -> Result<ObjectId, StoreError>
    where
        T: Serialize,
    {
        let collection = self.collection(collection);
        let id = ObjectId::generate().map_err(|e| StoreError::Backend(e.to_string()))?;

        let mut document = match serde_json::to_value(document) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(StoreError::Codec("document must be an object".to_string())),
            Err(e) => return Err(StoreError::Codec(e.to_string())),
        };
        document.insert(ID_FIELD.to_string(), Value::String(id.to_hex()));

        self.bounded(async {
            match &self.backend {
                Backend::Firestore(store) => store.insert_one(&collection, &id, &document).await,
                Backend::Memory(store) => store.insert_one(&collection, document.clone()),
                Backend::Offline => Err(StoreError::Offline),
            }
        })
        .await?;

        self.faults.note_write();
        Ok(id)
    }

    /// Apply `patch` to the first document matching `filter`.
    ///
    /// Returns the number of matched documents (0 or 1).
    pub async fn update_one(&self, collection: &str, filter: &Filter, patch: &Patch) -> Result<u64, StoreError> {
        let collection = self.collection(collection);
        let matched = self.bounded(async {
            match &self.backend {
                Backend::Firestore(store) => store.update_one(&collection, filter, patch).await,
                Backend::Memory(store) => Ok(store.update_one(&collection, filter, patch)),
                Backend::Offline => Err(StoreError::Offline),
            }
        })
        .await?;

        self.faults.note_write();
        Ok(matched)
    }
}

#[cfg(test)]
impl Database {
    /// Make every read fail once the next write has gone through.
    pub(crate) fn fail_reads_after_next_write(&self) {
        self.faults.arm();
    }

    pub(crate) fn heal_reads(&self) {
        self.faults.heal();
    }
}


#[cfg(not(test))]
mod faults {
    use super::StoreError;

    #[derive(Default)]
    pub struct ReadFaults;

    impl ReadFaults {
        #[inline]
        pub fn note_write(&self) {}

        #[inline]
        pub fn check(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }
}

fn decode<T: DeserializeOwned>(document: Document) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(document)).map_err(|e| StoreError::Codec(e.to_string()))
}
