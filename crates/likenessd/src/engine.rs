use image::DynamicImage;
use likeness_core::{AugmentError, Extractor, NormalizedEmbedding, VariantSampler};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Requests queued ahead of the engine thread before senders wait.
const ENGINE_QUEUE_DEPTH: usize = 8;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("augmentation: {0}")]
    Augment(#[from] AugmentError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Messages sent from request handlers to the engine thread.
enum EngineRequest {
    Embed {
        image: DynamicImage,
        reply: oneshot::Sender<Result<Vec<NormalizedEmbedding>, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Embed every augmentation variant of `image`, normalized, in variant order.
    pub async fn embed(&self, image: DynamicImage) -> Result<Vec<NormalizedEmbedding>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Embed {
                image,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Embed several images and flatten their variants into one list.
    ///
    /// Stops at the first failure; nothing is returned for a partial batch.
    pub async fn embed_all(
        &self,
        images: Vec<DynamicImage>,
    ) -> Result<Vec<NormalizedEmbedding>, EngineError> {
        let mut all = Vec::new();
        for image in images {
            all.extend(self.embed(image).await?);
        }
        Ok(all)
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The thread owns the extractor (and with it the loaded model) for its whole
/// life; requests are served one at a time in arrival order.
pub fn spawn_engine<E>(mut extractor: E, sampler: VariantSampler) -> Result<EngineHandle, EngineError>
where
    E: Extractor + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(ENGINE_QUEUE_DEPTH);

    std::thread::Builder::new()
        .name("likeness-engine".into())
        .spawn(move || {
            tracing::info!(crop_ratios = ?sampler.crop_ratios(), "engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Embed { image, reply } => {
                        let result = sampler
                            .embed(&mut extractor, &image)
                            .map_err(EngineError::from);
                        if let Err(e) = &result {
                            tracing::warn!(error = %e, "embedding failed");
                        }
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use likeness_core::{Embedding, RecognizerError};

    struct Constant;

    impl Extractor for Constant {
        fn extract(&mut self, _face: &RgbImage) -> Result<Embedding, RecognizerError> {
            Ok(Embedding::new(vec![0.0, 2.0]))
        }
    }

    struct Broken;

    impl Extractor for Broken {
        fn extract(&mut self, _face: &RgbImage) -> Result<Embedding, RecognizerError> {
            Err(RecognizerError::InferenceFailed("no session".into()))
        }
    }

    fn photo() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(160, 120, Rgb([10, 20, 30])))
    }

    #[tokio::test]
    async fn test_embed_returns_all_variants() {
        let engine = spawn_engine(Constant, VariantSampler::default()).unwrap();
        let embeddings = engine.embed(photo()).await.unwrap();
        assert_eq!(embeddings.len(), 3);
        assert_eq!(embeddings[0].as_slice(), &[0.0f32, 1.0][..]);
    }

    #[tokio::test]
    async fn test_embed_all_flattens() {
        let engine = spawn_engine(Constant, VariantSampler::default()).unwrap();
        let embeddings = engine.embed_all(vec![photo(), photo()]).await.unwrap();
        assert_eq!(embeddings.len(), 6);
    }

    #[tokio::test]
    async fn test_extraction_error_propagates() {
        let engine = spawn_engine(Broken, VariantSampler::default()).unwrap();
        let err = engine.embed(photo()).await.unwrap_err();
        assert!(matches!(err, EngineError::Augment(AugmentError::Recognizer(_))));
    }

    #[tokio::test]
    async fn test_concurrent_handles() {
        let engine = spawn_engine(Constant, VariantSampler::new(vec![0.9])).unwrap();
        let a = engine.clone();
        let b = engine.clone();
        let (ra, rb) = tokio::join!(a.embed(photo()), b.embed(photo()));
        assert_eq!(ra.unwrap().len(), 2);
        assert_eq!(rb.unwrap().len(), 2);
    }
}
