//! Engine settings shared by the service and the scanner.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use argus_detect::config::{DetectionConfig, DetectionMode};
use argus_detect::engine::AnomalyEngine;

/// Builds the engine from an optional JSON config file, falling back to the
/// preset for `mode`. A timeout given here overrides the file's.
pub fn build_engine(
    config_path: Option<&Path>,
    mode: DetectionMode,
    detector_timeout_ms: Option<u64>,
) -> anyhow::Result<AnomalyEngine> {
    let mut config = match config_path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            DetectionConfig::from_json(&raw)
                .with_context(|| format!("invalid config file {}", path.display()))?
        }
        None => DetectionConfig::for_mode(mode),
    };
    if let Some(ms) = detector_timeout_ms {
        config = config.with_detector_timeout(Duration::from_millis(ms));
    }

    AnomalyEngine::new(config).context("failed to build detection engine")
}
