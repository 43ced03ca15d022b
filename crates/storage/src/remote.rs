use std::env;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use prep_core::model::{ContentId, ProgressRecord, StreakState, UserId};

use crate::mapping::{
    ProgressDocument, patch_to_value, progress_doc_key, streak_from_profile, streak_to_patch,
};
use crate::repository::{ProgressPatch, ProgressStore, ProfileStore, StorageError, Stores};

/// Connection settings for the hosted document store.
#[derive(Clone, Debug)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_key: String,
}

impl RemoteConfig {
    /// Read configuration from `PREP_STORE_URL` / `PREP_STORE_API_KEY`,
    /// `None` when the store is not configured.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("PREP_STORE_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let api_key = env::var("PREP_STORE_API_KEY").unwrap_or_default();
        Some(Self { base_url, api_key })
    }
}

/// REST adapter for the remote document store.
///
/// Progress documents live under `/progress`, profiles under
/// `/profiles`; all writes are PATCH merge-writes. Any transport or
/// non-success response maps to `StorageError::Unavailable`, which the
/// engine degrades from rather than surfacing.
#[derive(Clone)]
pub struct RemoteStore {
    client: Client,
    config: RemoteConfig,
}

impl RemoteStore {
    #[must_use]
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Bundle a remote adapter into the store aggregate.
    #[must_use]
    pub fn into_stores(self) -> Stores {
        let progress = std::sync::Arc::new(self.clone());
        let profiles = std::sync::Arc::new(self);
        Stores { progress, profiles }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    async fn patch_document(&self, path: &str, body: &Value) -> Result<(), StorageError> {
        let response = self
            .client
            .patch(self.url(path))
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError::Unavailable(format!(
                "merge write to {path} failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ProgressStore for RemoteStore {
    async fn load_all(&self, user_id: &UserId) -> Result<Vec<ProgressRecord>, StorageError> {
        let response = self
            .client
            .get(self.url("progress"))
            .query(&[("userId", user_id.as_str())])
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError::Unavailable(format!(
                "progress query failed with status {}",
                response.status()
            )));
        }

        let documents: Vec<ProgressDocument> = response
            .json()
            .await
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        documents
            .into_iter()
            .map(ProgressDocument::into_record)
            .collect()
    }

    async fn upsert(
        &self,
        user_id: &UserId,
        content_id: &ContentId,
        patch: &ProgressPatch,
    ) -> Result<(), StorageError> {
        let key = progress_doc_key(user_id, content_id);
        self.patch_document(&format!("progress/{key}"), &patch_to_value(patch))
            .await
    }
}

#[async_trait]
impl ProfileStore for RemoteStore {
    async fn read_streak(&self, user_id: &UserId) -> Result<Option<StreakState>, StorageError> {
        let response = self
            .client
            .get(self.url(&format!("profiles/{user_id}")))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(StorageError::Unavailable(format!(
                "profile read failed with status {}",
                response.status()
            )));
        }

        let doc: Value = response
            .json()
            .await
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        streak_from_profile(&doc)
    }

    async fn write_streak(
        &self,
        user_id: &UserId,
        streak: &StreakState,
    ) -> Result<(), StorageError> {
        self.patch_document(&format!("profiles/{user_id}"), &streak_to_patch(streak))
            .await
    }
}
