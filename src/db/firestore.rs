// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper for credential records.
//!
//! Writes are merge writes limited to the credential fields, so other fields
//! stored on a user document survive. Document changes are published on a
//! change feed that drives the token refresh listener: in Firestore mode they
//! come from a listen stream on the users collection (see `watch_credentials`),
//! offline every write to the in-memory store is published directly.
//!
//! Offline mode (tests and local development without GCP) keeps documents as
//! JSON objects in memory with the same merge semantics.

use crate::db::collections;
use crate::error::AppError;
use crate::models::{CredentialChange, CredentialRecord};
use dashmap::DashMap;
use firestore::{
    FirestoreDocument, FirestoreListenEvent, FirestoreListener, FirestoreListenerTarget,
    FirestoreMemListenStateStorage,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capacity of the change feed; slow subscribers lag rather than block writers.
const CHANGE_FEED_CAPACITY: usize = 64;

/// Listen target id for the users collection.
const USERS_LISTEN_TARGET: u32 = 17;

/// Running Firestore listen stream feeding the change feed.
pub type CredentialListener = FirestoreListener<firestore::FirestoreDb, FirestoreMemListenStateStorage>;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
    /// Documents held in offline mode, keyed by uid
    offline: Arc<DashMap<String, Map<String, Value>>>,
    changes: broadcast::Sender<CredentialChange>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self::with_client(Some(client)))
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
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
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore Emulator");

        Ok(Self::with_client(Some(client)))
    }

    /// Create an in-memory store for testing and offline development.
    pub fn new_mock() -> Self {
        Self::with_client(None)
    }

    fn with_client(client: Option<firestore::FirestoreDb>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            client,
            offline: Arc::new(DashMap::new()),
            changes,
        }
    }

    pub fn is_offline(&self) -> bool {
        self.client.is_none()
    }

    /// Subscribe to credential document changes.
    ///
    /// In Firestore mode nothing arrives until `watch_credentials` is running.
    pub fn subscribe(&self) -> broadcast::Receiver<CredentialChange> {
        self.changes.subscribe()
    }

    /// Start listening for changes to user documents, whoever writes them.
    ///
    /// Returns `None` offline, where writes publish directly. The listener
    /// replays existing documents when it starts. Keep the returned handle
    /// alive and call `shutdown` on it to stop.
    pub async fn watch_credentials(&self) -> Result<Option<CredentialListener>, AppError> {
        let Some(client) = &self.client else {
            return Ok(None);
        };

        let mut listener = client
            .create_listener(FirestoreMemListenStateStorage::new())
            .await
            .map_err(|e| AppError::Database(format!("Failed to create listener: {}", e)))?;

        client
            .fluent()
            .select()
            .from(collections::USERS)
            .listen()
            .add_target(FirestoreListenerTarget::new(USERS_LISTEN_TARGET), &mut listener)
            .map_err(|e| AppError::Database(format!("Failed to add listen target: {}", e)))?;

        let changes = self.changes.clone();
        listener
            .start(move |event| {
                let changes = changes.clone();
                async move {
                    if let FirestoreListenEvent::DocumentChange(change) = event {
                        if let Some(doc) = change.document {
                            publish_document(&changes, &doc);
                        }
                    }
                    Ok(())
                }
            })
            .await
            .map_err(|e| AppError::Database(format!("Failed to start listener: {}", e)))?;

        tracing::info!(collection = collections::USERS, "Listening for credential changes");
        Ok(Some(listener))
    }

    fn publish(&self, uid: &str, record: CredentialRecord) {
        // No subscribers is not an error
        let _ = self.changes.send(CredentialChange {
            uid: uid.to_string(),
            record,
        });
    }

    // ─── Credential Operations ───────────────────────────────────

    /// Point read of a user's credential record.
    pub async fn get_credentials(&self, uid: &str) -> Result<Option<CredentialRecord>, AppError> {
        match &self.client {
            Some(client) => client
                .fluent()
                .select()
                .by_id_in(collections::USERS)
                .obj()
                .one(uid)
                .await
                .map_err(|e| AppError::StoreReadFailure(e.to_string())),
            None => self
                .offline
                .get(uid)
                .map(|doc| serde_json::from_value(Value::Object(doc.clone())))
                .transpose()
                .map_err(|e| AppError::StoreReadFailure(e.to_string())),
        }
    }

    /// Merge-write the credential fields of a user document.
    ///
    /// Fields outside `CredentialRecord` are left untouched.
    pub async fn merge_credentials(
        &self,
        uid: &str,
        record: &CredentialRecord,
    ) -> Result<(), AppError> {
        match &self.client {
            Some(client) => {
                let _: () = client
                    .fluent()
                    .update()
                    .fields(firestore::paths!(CredentialRecord::{
                        uid,
                        access_token,
                        refresh_token,
                        expires_at,
                        enabled
                    }))
                    .in_col(collections::USERS)
                    .document_id(uid)
                    .object(record)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
            }
            None => {
                let fields = match serde_json::to_value(record)
                    .map_err(|e| AppError::Internal(e.into()))?
                {
                    Value::Object(fields) => fields,
                    other => {
                        return Err(AppError::Internal(anyhow::anyhow!(
                            "Credential record serialized to {}",
                            other
                        )))
                    }
                };
                self.offline.entry(uid.to_string()).or_default().extend(fields);
                self.publish(uid, record.clone());
            }
        }

        tracing::debug!(uid, "Credential record merged");
        Ok(())
    }

    /// Raw document in offline mode, including non-credential fields.
    pub fn offline_document(&self, uid: &str) -> Option<Map<String, Value>> {
        self.offline.get(uid).map(|doc| doc.clone())
    }

    /// Replace a raw document in offline mode.
    ///
    /// Stands in for writes made outside this service. The change is
    /// published when the document holds a readable credential record.
    pub fn put_offline_document(&self, uid: &str, doc: Map<String, Value>) -> Result<(), AppError> {
        if !self.is_offline() {
            return Err(AppError::Database(
                "Raw document writes are only available offline".to_string(),
            ));
        }
        let record = serde_json::from_value::<CredentialRecord>(Value::Object(doc.clone()));
        self.offline.insert(uid.to_string(), doc);

        match record {
            Ok(record) => self.publish(uid, record),
            Err(e) => tracing::warn!(uid, error = %e, "Unreadable credential document, not published"),
        }
        Ok(())
    }
}

/// Publish a listened document on the change feed.
fn publish_document(changes: &broadcast::Sender<CredentialChange>, doc: &FirestoreDocument) {
    let Some(uid) = doc.name.rsplit('/').next().filter(|id| !id.is_empty()) else {
        return;
    };

    match firestore::FirestoreDb::deserialize_doc_to::<CredentialRecord>(doc) {
        Ok(record) => {
            tracing::debug!(uid, "Credential document changed");
            let _ = changes.send(CredentialChange {
                uid: uid.to_string(),
                record,
            });
        }
        Err(e) => tracing::warn!(uid, error = %e, "Unreadable credential document change"),
    }
}
