//! ArcFace face recognizer via ONNX Runtime.
//!
//! Extracts 512-dimensional face embeddings from 112x112 RGB face regions,
//! using the w600k_r50 ArcFace model.

use crate::types::Embedding;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

pub const ARCFACE_INPUT_SIZE: usize = 112;
const ARCFACE_MEAN: f32 = 127.5;
const ARCFACE_STD: f32 = 128.0;
pub const ARCFACE_EMBEDDING_DIM: usize = 512;
pub const ARCFACE_MODEL_VERSION: &str = "w600k_r50";
pub const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("model file not found: {0} — download from insightface and place in models/")]
    ModelNotFound(String),
    #[error("invalid input: expected {expected}x{expected} RGB, got {width}x{height}")]
    InvalidInput {
        expected: usize,
        width: u32,
        height: u32,
    },
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// The opaque embedding model: one fixed-size face region in, one raw embedding out.
///
/// Implementations must be deterministic for identical input. `&mut self`
/// because ONNX sessions need exclusive access to run.
pub trait Extractor {
    fn extract(&mut self, face: &RgbImage) -> Result<Embedding, RecognizerError>;
}

/// ArcFace-based face recognizer.
pub struct FaceRecognizer {
    session: Session,
}

impl FaceRecognizer {
    /// Load the ArcFace ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, RecognizerError> {
        if !Path::new(model_path).exists() {
            return Err(RecognizerError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded ArcFace model"
        );

        Ok(Self { session })
    }

    /// Preprocess a 112x112 RGB face region into a NCHW float tensor.
    ///
    /// Each value maps to `(v - 127.5) / 128.0`; channels are written in BGR
    /// order, which is what the InsightFace exports expect.
    fn preprocess(face: &RgbImage) -> Result<Array4<f32>, RecognizerError> {
        let size = ARCFACE_INPUT_SIZE;
        if face.width() as usize != size || face.height() as usize != size {
            return Err(RecognizerError::InvalidInput {
                expected: size,
                width: face.width(),
                height: face.height(),
            });
        }

        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
        for (x, y, pixel) in face.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..3 {
                // RGB buffer → BGR tensor
                tensor[[0, c, y, x]] = (pixel[2 - c] as f32 - ARCFACE_MEAN) / ARCFACE_STD;
            }
        }

        Ok(tensor)
    }
}

impl Extractor for FaceRecognizer {
    fn extract(&mut self, face: &RgbImage) -> Result<Embedding, RecognizerError> {
        let input = Self::preprocess(face)?;

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RecognizerError::InferenceFailed(format!("embedding extraction: {e}")))?;

        let values: Vec<f32> = raw_data.to_vec();

        if values.len() != ARCFACE_EMBEDDING_DIM {
            return Err(RecognizerError::InferenceFailed(format!(
                "expected {ARCFACE_EMBEDDING_DIM}-dim embedding, got {}",
                values.len()
            )));
        }
        check_finite(&values)?;

        Ok(Embedding {
            values,
            model_version: Some(ARCFACE_MODEL_VERSION.to_string()),
        })
    }
}

fn check_finite(values: &[f32]) -> Result<(), RecognizerError> {
    match values.iter().position(|x| !x.is_finite()) {
        Some(i) => Err(RecognizerError::InferenceFailed(format!(
            "non-finite embedding value {} at index {i}",
            values[i]
        ))),
        None => Ok(()),
    }
}
