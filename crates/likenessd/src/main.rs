use anyhow::{Context, Result};
use likeness_core::recognizer::ARCFACE_MODEL_VERSION;
use likeness_core::{FaceRecognizer, VariantSampler};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;
mod service;
mod store;

use config::Config;
use dbus_interface::{LikenessService, BUS_NAME, OBJECT_PATH};
use service::FaceService;
use store::JsonFileStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("likenessd starting");

    let config = Config::from_env();
    tracing::info!(
        model_dir = %config.model_dir.display(),
        store_dir = %config.store_dir.display(),
        distance_threshold = config.thresholds.distance,
        cosine_threshold = config.thresholds.cosine,
        required_variant_matches = config.thresholds.required_variant_matches,
        crop_ratios = ?config.crop_ratios,
        "configuration loaded"
    );

    // Load the model once; the engine thread owns it from here on.
    let model_path = config.arcface_model_path();
    let recognizer = FaceRecognizer::load(&model_path)
        .with_context(|| format!("loading ArcFace model from {model_path}"))?;
    let sampler = VariantSampler::new(config.crop_ratios.clone());
    let engine = engine::spawn_engine(recognizer, sampler)?;

    let store = JsonFileStore::open(&config.store_dir)
        .with_context(|| format!("opening profile store {}", config.store_dir.display()))?;

    let service = Arc::new(
        FaceService::new(engine, Arc::new(store), config.thresholds)
            .with_model_version(ARCFACE_MODEL_VERSION),
    );
    let iface = LikenessService::new(service, config.crop_ratios.clone());

    let builder = if config.system_bus {
        zbus::connection::Builder::system()?
    } else {
        zbus::connection::Builder::session()?
    };
    let _conn = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, iface)?
        .build()
        .await
        .context("registering on D-Bus")?;

    tracing::info!(bus = BUS_NAME, system_bus = config.system_bus, "likenessd ready");

    // Keep running until signaled
    tokio::signal::ctrl_c().await?;
    tracing::info!("likenessd shutting down");

    Ok(())
}
