// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper implementing the document-store operations.
//!
//! Firestore has no secondary unique indexes. A unique field is enforced with
//! a claim collection whose document id is derived from the field value. The
//! claims are created with create-only writes in the same transaction as the
//! document, so a second writer for the same value gets a conflict and a
//! winner's document is visible as soon as its claim is.

use super::{Document, Filter, ObjectId, Patch, StoreError};
use dashmap::DashMap;
use firestore::errors::FirestoreError;
use firestore::FirestoreWritePrecondition;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Firestore-backed document store.
#[derive(Clone)]
pub struct FirestoreStore {
    client: firestore::FirestoreDb,
    unique_fields: Arc<DashMap<String, Vec<String>>>,
}

/// Marker document held in a claim collection.
#[derive(Serialize, Deserialize)]
struct UniqueClaim {
    owner: String,
}

/// Just the id of a matched document (every document stores its own `id`).
#[derive(Deserialize)]
struct DocumentRef {
    id: String,
}

fn claim_collection(collection: &str, field: &str) -> String {
    format!("{}_{}_unique", collection, field)
}

/// Document id for a claimed value.
///
/// The prefix keeps ids like "." and "__x__", which Firestore reserves,
/// valid.
fn claim_document_id(value: &str) -> String {
    format!("v_{}", urlencoding::encode(value))
}

impl FirestoreStore {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, StoreError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self::with_client(client))
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, StoreError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            StoreError::Backend(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self::with_client(client))
    }

    fn with_client(client: firestore::FirestoreDb) -> Self {
        Self {
            client,
            unique_fields: Arc::new(DashMap::new()),
        }
    }

    pub fn ensure_unique_index(&self, collection: &str, field: &str) {
        let mut fields = self.unique_fields.entry(collection.to_string()).or_default();
        if !fields.iter().any(|f| f == field) {
            fields.push(field.to_string());
        }
    }

    async fn query<T>(&self, collection: &str, filter: &Filter, limit: Option<u32>) -> Result<Vec<T>, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        let clauses = filter.clauses();
        let query = self
            .client
            .fluent()
            .select()
            .from(collection)
            .filter(|q| {
                q.for_all(
                    clauses
                        .iter()
                        .map(|(field, value)| q.field(field.as_str()).eq(value.as_str())),
                )
            });

        let query = match limit {
            Some(limit) => query.limit(limit),
            None => query,
        };

        query
            .obj()
            .query()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    pub async fn find_one<T>(&self, collection: &str, filter: &Filter) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        let mut found: Vec<T> = self.query(collection, filter, Some(1)).await?;
        Ok(found.pop())
    }

    pub async fn find_many<T>(&self, collection: &str, filter: &Filter) -> Result<Vec<T>, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        self.query(collection, filter, None).await
    }

    /// Insert `document` under `id` together with its unique claims.
    ///
    /// Claims and document are create-only writes committed in one
    /// transaction: either all of them land or none do, so a claim never
    /// exists without the document that owns it.
    pub async fn insert_one(&self, collection: &str, id: &ObjectId, document: &Document) -> Result<(), StoreError> {
        let unique = self
            .unique_fields
            .get(collection)
            .map(|fields| fields.clone())
            .unwrap_or_default();

        let owner = UniqueClaim { owner: id.to_hex() };
        let claims: Vec<(String, String, String)> = unique
            .into_iter()
            .filter_map(|field| {
                let value = document.get(&field).and_then(|v| v.as_str())?;
                Some((claim_collection(collection, &field), claim_document_id(value), field))
            })
            .collect();

        let mut transaction = self
            .client
            .begin_transaction()
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to begin transaction: {}", e)))?;

        for (claim_col, claim_id, _) in &claims {
            self.client
                .fluent()
                .update()
                .in_col(claim_col)
                .precondition(FirestoreWritePrecondition::Exists(false))
                .document_id(claim_id)
                .object(&owner)
                .add_to_transaction(&mut transaction)
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        }

        self.client
            .fluent()
            .update()
            .in_col(collection)
            .precondition(FirestoreWritePrecondition::Exists(false))
            .document_id(id.to_hex())
            .object(document)
            .add_to_transaction(&mut transaction)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let commit_err = match transaction.commit().await {
            Ok(_) => return Ok(()),
            Err(e) => e,
        };

        // A lost race against a concurrent insert may surface as contention
        // rather than a conflict; a committed claim settles which it was.
        for (claim_col, claim_id, field) in &claims {
            let taken: Option<UniqueClaim> = self
                .client
                .fluent()
                .select()
                .by_id_in(claim_col)
                .obj()
                .one(claim_id)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            if taken.is_some_and(|claim| claim.owner != owner.owner) {
                return Err(StoreError::UniqueViolation {
                    collection: collection.to_string(),
                    field: field.clone(),
                });
            }
        }

        match commit_err {
            FirestoreError::DataConflictError(_) => Err(StoreError::Backend(format!(
                "document {} already exists in {}",
                id, collection
            ))),
            e => Err(StoreError::Backend(e.to_string())),
        }
    }

    pub async fn update_one(&self, collection: &str, filter: &Filter, patch: &Patch) -> Result<u64, StoreError> {
        let mut matched: Vec<DocumentRef> = self.query(collection, filter, Some(1)).await?;
        let Some(target) = matched.pop() else {
            return Ok(0);
        };

        let fields: Vec<String> = patch.fields().map(str::to_string).collect();
        let _: Document = self
            .client
            .fluent()
            .update()
            .fields(fields)
            .in_col(collection)
            .document_id(&target.id)
            .object(&patch.to_document())
            .execute()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        tracing::debug!(collection, id = %target.id, "Document patched");

        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_document_id_avoids_reserved_ids() {
        assert_eq!(claim_document_id("."), "v_.");
        assert_eq!(claim_document_id(".."), "v_..");
        assert_eq!(claim_document_id("__name__"), "v___name__");
        assert_eq!(claim_document_id("a/b"), "v_a%2Fb");
        assert_ne!(claim_document_id("."), claim_document_id(".."));
    }

    #[test]
    fn test_claim_collection_name() {
        assert_eq!(
            claim_collection("iotdb_users", "mobile"),
            "iotdb_users_mobile_unique"
        );
    }
}
