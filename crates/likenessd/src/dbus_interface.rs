use crate::service::{FaceService, ImageSource, ServiceError, VerifyOutcome};
use std::path::PathBuf;
use std::sync::Arc;
use zbus::interface;

pub const BUS_NAME: &str = "org.likeness.Verifier1";
pub const OBJECT_PATH: &str = "/org/likeness/Verifier1";

/// D-Bus interface for the Likeness daemon.
///
/// Bus name: org.likeness.Verifier1
/// Object path: /org/likeness/Verifier1
pub struct LikenessService {
    service: Arc<FaceService>,
    crop_ratios: Vec<f32>,
}

impl LikenessService {
    pub fn new(service: Arc<FaceService>, crop_ratios: Vec<f32>) -> Self {
        Self {
            service,
            crop_ratios,
        }
    }
}

#[interface(name = "org.likeness.Verifier1")]
impl LikenessService {
    /// Enroll `name` from one or more image files, replacing any previous profile.
    async fn enroll(&self, name: &str, image_paths: Vec<String>) -> zbus::fdo::Result<String> {
        tracing::info!(name, images = image_paths.len(), "enroll requested");
        let images = image_paths.into_iter().map(image_source).collect();
        let summary = self.service.enroll(name, images).await.map_err(to_fdo)?;
        Ok(serde_json::json!({
            "message": format!("{} enrolled", name.trim()),
            "samplesStored": summary.samples_stored,
            "maxIntraDistance": summary.max_intra_distance,
            "minIntraSimilarity": summary.min_intra_similarity,
        })
        .to_string())
    }

    /// Verify an image file against the profile enrolled under `name`.
    async fn verify(&self, name: &str, image_path: &str) -> zbus::fdo::Result<String> {
        tracing::info!(name, "verify requested");
        let image = (!image_path.trim().is_empty()).then(|| image_source(image_path.to_string()));
        let outcome = self.service.verify(name, image).await.map_err(to_fdo)?;
        Ok(verify_json(&outcome).to_string())
    }

    /// Remove the profile enrolled under `name`.
    async fn remove(&self, name: &str) -> zbus::fdo::Result<bool> {
        tracing::info!(name, "remove requested");
        self.service.remove(name).await.map_err(to_fdo)
    }

    /// List enrolled names as a JSON array.
    async fn list_profiles(&self) -> zbus::fdo::Result<String> {
        let names = self.service.list().await.map_err(to_fdo)?;
        Ok(serde_json::json!(names).to_string())
    }

    /// Return daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let enrolled = self.service.list().await.map_err(to_fdo)?.len();
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "thresholds": self.service.thresholds(),
            "cropRatios": self.crop_ratios,
            "enrolled": enrolled,
        })
        .to_string())
    }
}

fn image_source(path: String) -> ImageSource {
    ImageSource::Path(PathBuf::from(path))
}

fn verify_json(outcome: &VerifyOutcome) -> serde_json::Value {
    match outcome {
        VerifyOutcome::NotRegistered { name } => serde_json::json!({
            "registered": false,
            "message": format!("{name} is not registered"),
        }),
        VerifyOutcome::Checked(result) => {
            let mut value = serde_json::json!(result);
            if let Some(map) = value.as_object_mut() {
                map.insert("registered".into(), true.into());
                let message = if result.is_match { "match" } else { "no match" };
                map.insert("message".into(), message.into());
            }
            value
        }
    }
}

fn to_fdo(err: ServiceError) -> zbus::fdo::Error {
    tracing::warn!(error = %err, "request failed");
    match err {
        ServiceError::Validation(msg) => zbus::fdo::Error::InvalidArgs(msg),
        other => zbus::fdo::Error::Failed(other.to_string()),
    }
}
