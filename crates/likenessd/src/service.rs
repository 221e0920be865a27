//! Enroll/verify orchestration on top of the engine and the profile store.

use crate::engine::{EngineError, EngineHandle};
use crate::store::{ProfileStore, StoreError};
use image::DynamicImage;
use likeness_core::imaging::{self, ImageError};
use likeness_core::{Matcher, MatchResult, PersonProfile, ProfileError, Thresholds, VariantVotingMatcher};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("image: {0}")]
    Image(#[from] ImageError),
    #[error("engine: {0}")]
    Engine(#[from] EngineError),
    #[error("profile: {0}")]
    Profile(#[from] ProfileError),
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Where a request's photo comes from. The D-Bus surface only sends paths;
/// tests also feed encoded bytes and in-memory images.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Path(PathBuf),
    #[cfg(test)]
    Bytes(Vec<u8>),
    #[cfg(test)]
    Decoded(DynamicImage),
}

impl ImageSource {
    fn load(self) -> Result<DynamicImage, ImageError> {
        match self {
            ImageSource::Path(path) => imaging::load_image(path),
            #[cfg(test)]
            ImageSource::Bytes(bytes) => imaging::decode_image(&bytes),
            #[cfg(test)]
            ImageSource::Decoded(image) => Ok(image),
        }
    }
}

/// Reply to a successful enrollment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollSummary {
    pub samples_stored: usize,
    pub max_intra_distance: f32,
    pub min_intra_similarity: f32,
}

/// Reply to a verification. An unknown name is an outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyOutcome {
    NotRegistered { name: String },
    Checked(MatchResult),
}

/// One async mutex per person name, created on demand.
///
/// Idle entries are pruned whenever a new lock is taken.
#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            map.retain(|k, m| k == key || Arc::strong_count(m) > 1);
            map.entry(key.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// The request surface: enroll and verify by person name.
pub struct FaceService {
    engine: EngineHandle,
    store: Arc<dyn ProfileStore>,
    locks: KeyedLocks,
    matcher: VariantVotingMatcher,
    model_version: Option<String>,
}

impl FaceService {
    pub fn new(engine: EngineHandle, store: Arc<dyn ProfileStore>, thresholds: Thresholds) -> Self {
        Self {
            engine,
            store,
            locks: KeyedLocks::default(),
            matcher: VariantVotingMatcher::new(thresholds),
            model_version: None,
        }
    }

    /// Tag stored profiles with the extractor's model version.
    pub fn with_model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = Some(version.into());
        self
    }

    pub fn thresholds(&self) -> Thresholds {
        self.matcher.thresholds
    }

    /// Build a profile from every variant of every image and replace whatever
    /// was stored under `name`.
    pub async fn enroll(
        &self,
        name: &str,
        images: Vec<ImageSource>,
    ) -> Result<EnrollSummary, ServiceError> {
        let name = validate_name(name)?;
        if images.is_empty() {
            return Err(ServiceError::Validation("at least one image is required".into()));
        }
        let image_count = images.len();

        let decoded = tokio::task::spawn_blocking(move || {
            images
                .into_iter()
                .map(ImageSource::load)
                .collect::<Result<Vec<_>, _>>()
        })
        .await??;

        let embeddings = self.engine.embed_all(decoded).await?;
        let mut profile = PersonProfile::build(embeddings)?;
        if let Some(version) = &self.model_version {
            profile = profile.with_model_version(version.clone());
        }

        let summary = EnrollSummary {
            samples_stored: profile.samples(),
            max_intra_distance: profile.max_intra_distance,
            min_intra_similarity: profile.min_intra_similarity,
        };

        {
            let _guard = self.locks.lock(&name).await;
            let store = Arc::clone(&self.store);
            let key = name.clone();
            tokio::task::spawn_blocking(move || store.put(&key, &profile)).await??;
        }

        tracing::info!(
            name = %name,
            images = image_count,
            samples = summary.samples_stored,
            max_intra_distance = summary.max_intra_distance,
            min_intra_similarity = summary.min_intra_similarity,
            "enrolled"
        );
        Ok(summary)
    }

    /// Compare `image` against the profile stored under `name`.
    pub async fn verify(
        &self,
        name: &str,
        image: Option<ImageSource>,
    ) -> Result<VerifyOutcome, ServiceError> {
        let name = validate_name(name)?;
        let image = image.ok_or_else(|| ServiceError::Validation("a query image is required".into()))?;

        let Some(profile) = self.load_profile(&name).await? else {
            tracing::info!(name = %name, "verify: not registered");
            return Ok(VerifyOutcome::NotRegistered { name });
        };

        let decoded = tokio::task::spawn_blocking(move || image.load()).await??;
        let query = self.engine.embed(decoded).await?;
        let result = self.matcher.compare(&query, &profile);

        tracing::info!(
            name = %name,
            query_variants = query.len(),
            stored_variants = profile.samples(),
            min_distance = result.min_distance,
            max_similarity = result.max_similarity,
            variant_matches = result.variant_matches,
            is_match = result.is_match,
            "verified"
        );
        Ok(VerifyOutcome::Checked(result))
    }

    /// Delete the profile stored under `name`. Returns whether one existed.
    pub async fn remove(&self, name: &str) -> Result<bool, ServiceError> {
        let name = validate_name(name)?;
        let _guard = self.locks.lock(&name).await;
        let store = Arc::clone(&self.store);
        let key = name.clone();
        let removed = tokio::task::spawn_blocking(move || store.remove(&key)).await??;
        tracing::info!(name = %name, removed, "remove");
        Ok(removed)
    }

    /// All enrolled names, sorted.
    pub async fn list(&self) -> Result<Vec<String>, ServiceError> {
        let store = Arc::clone(&self.store);
        Ok(tokio::task::spawn_blocking(move || store.list()).await??)
    }

    async fn load_profile(&self, name: &str) -> Result<Option<PersonProfile>, ServiceError> {
        let _guard = self.locks.lock(name).await;
        let store = Arc::clone(&self.store);
        let key = name.to_string();
        Ok(tokio::task::spawn_blocking(move || store.get(&key)).await??)
    }
}

fn validate_name(name: &str) -> Result<String, ServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::Validation("name is required".into()));
    }
    Ok(name.to_string())
}
