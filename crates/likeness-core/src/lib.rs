//! likeness-core — Face identity profiles and match decisions.
//!
//! Embeds several deterministic framings of each photo with ArcFace (ONNX
//! Runtime, CPU), aggregates them into per-person profiles and decides
//! whether a query photo matches a stored profile by pairwise voting.

pub mod augment;
pub mod imaging;
pub mod matcher;
pub mod profile;
pub mod recognizer;
pub mod types;
pub mod vector;

use std::path::PathBuf;

pub use augment::{AugmentError, VariantSampler};
pub use imaging::ImageError;
pub use matcher::{MatchResult, Matcher, Thresholds, VariantVotingMatcher};
pub use profile::{PersonProfile, ProfileError};
pub use recognizer::{Extractor, FaceRecognizer, RecognizerError};
pub use types::{Embedding, NormalizedEmbedding};

/// Directory searched for ONNX model files when none is configured.
pub fn default_model_dir() -> PathBuf {
    PathBuf::from("/usr/share/likeness/models")
}
