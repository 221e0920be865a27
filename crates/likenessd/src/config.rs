use likeness_core::augment::DEFAULT_CROP_RATIOS;
use likeness_core::matcher::{
    DEFAULT_COSINE_THRESHOLD, DEFAULT_DISTANCE_THRESHOLD, DEFAULT_REQUIRED_VARIANT_MATCHES,
};
use likeness_core::recognizer::ARCFACE_MODEL_FILE;
use likeness_core::Thresholds;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Daemon configuration, read once at startup.
///
/// Sources, lowest priority first: built-in defaults, the TOML file named by
/// `LIKENESS_CONFIG`, then `LIKENESS_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Directory holding one JSON profile per enrolled person.
    pub store_dir: PathBuf,
    /// Match thresholds.
    pub thresholds: Thresholds,
    /// Centered-crop ratios for augmentation.
    pub crop_ratios: Vec<f32>,
    /// Serve on the system bus instead of the session bus.
    ///
    /// `LIKENESS_SYSTEM_BUS` accepts 1/true/yes/on and 0/false/no/off.
    pub system_bus: bool,
}

/// On-disk TOML overlay. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub model_dir: Option<PathBuf>,
    pub store_dir: Option<PathBuf>,
    pub distance_threshold: Option<f32>,
    pub cosine_threshold: Option<f32>,
    pub required_variant_matches: Option<usize>,
    pub crop_ratios: Option<Vec<f32>>,
    pub system_bus: Option<bool>,
}

impl ConfigFile {
    fn load(path: &Path) -> Option<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "config file unreadable; using defaults");
                return None;
            }
        };
        match toml::from_str(&text) {
            Ok(file) => Some(file),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "config file invalid; using defaults");
                None
            }
        }
    }
}

impl Config {
    /// Load configuration from the optional config file and `LIKENESS_*` environment variables.
    pub fn from_env() -> Self {
        let file = std::env::var("LIKENESS_CONFIG")
            .ok()
            .and_then(|p| ConfigFile::load(Path::new(&p)))
            .unwrap_or_default();
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Merge defaults, `file` and variables returned by `var`.
    pub fn resolve(file: ConfigFile, var: impl Fn(&str) -> Option<String>) -> Self {
        let model_dir = var("LIKENESS_MODEL_DIR")
            .map(PathBuf::from)
            .or(file.model_dir)
            .unwrap_or_else(likeness_core::default_model_dir);

        let data_dir = var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("likeness");

        let store_dir = var("LIKENESS_STORE_DIR")
            .map(PathBuf::from)
            .or(file.store_dir)
            .unwrap_or_else(|| data_dir.join("profiles"));

        let thresholds = Thresholds {
            distance: parsed(&var, "LIKENESS_DISTANCE_THRESHOLD")
                .or(file.distance_threshold)
                .unwrap_or(DEFAULT_DISTANCE_THRESHOLD),
            cosine: parsed(&var, "LIKENESS_COSINE_THRESHOLD")
                .or(file.cosine_threshold)
                .unwrap_or(DEFAULT_COSINE_THRESHOLD),
            required_variant_matches: parsed(&var, "LIKENESS_REQUIRED_VARIANT_MATCHES")
                .or(file.required_variant_matches)
                .unwrap_or(DEFAULT_REQUIRED_VARIANT_MATCHES),
        };

        let crop_ratios = var("LIKENESS_CROP_RATIOS")
            .and_then(|v| parse_ratios(&v))
            .or(file.crop_ratios)
            .unwrap_or_else(|| DEFAULT_CROP_RATIOS.to_vec());

        let system_bus = flag(&var, "LIKENESS_SYSTEM_BUS")
            .or(file.system_bus)
            .unwrap_or(false);

        Self {
            model_dir,
            store_dir,
            thresholds,
            crop_ratios,
            system_bus,
        }
    }

    /// Path to the ArcFace recognition model.
    pub fn arcface_model_path(&self) -> String {
        self.model_dir
            .join(ARCFACE_MODEL_FILE)
            .to_string_lossy()
            .into_owned()
    }
}

fn parsed<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = var(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "unparseable value; ignoring");
            None
        }
    }
}

fn flag(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<bool> {
    let raw = var(key)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            tracing::warn!(key, value = %raw, "unrecognised boolean; ignoring");
            None
        }
    }
}

/// Parse "0.92,0.85". An empty list is valid (full frame only); any bad entry
/// rejects the whole value.
fn parse_ratios(raw: &str) -> Option<Vec<f32>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(Vec::new());
    }
    raw.split(',')
        .map(|r| r.trim().parse::<f32>().ok())
        .collect()
}
