//! # Argus Detect - Ensemble Anomaly Detection for Metric Series
//!
//! Argus Detect finds anomalous points in a univariate time series by letting
//! three independent statistical detectors vote and reporting the points on
//! which enough of them agree.
//!
//! ## Quick Start
//!
//! ```rust
//! use argus_detect::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let engine = AnomalyEngine::new(DetectionConfig::ensemble())?;
//!
//! let mut values = vec![10.0; 30];
//! values[12] = 250.0;
//! let timestamps = (0..30).map(|i| 1_700_000_000 + i * 60).collect();
//!
//! let result = engine
//!     .detect(DetectionRequest::new("cpu_usage", timestamps, values))
//!     .await?;
//! assert_eq!(result.anomaly_count, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Detection modes
//!
//! - **Ensemble** (default): a forecast-interval detector (weight 0.4), a
//!   seasonal-residual detector (0.3) and an isolation-forest detector (0.3).
//!   A point is reported when the detectors flagging it carry a combined
//!   weight of at least 0.6, so no detector can report a point on its own.
//!   Series need at least 20 points.
//! - **Single**: the isolation forest alone, reporting its own outliers with
//!   the absolute isolation score. Series need at least 10 points.
//!
//! A detector that cannot fit a series abstains instead of failing the
//! request; its vote counts as "not anomalous" everywhere.
//!
//! ## Architecture
//!
//! - **`series`**: the observed series and the length check
//! - **`detectors`**: the `Detector` trait and the three detectors
//! - **`ensemble`**: weighted vote aggregation
//! - **`engine`**: wiring, concurrency and per-detector deadlines
//! - **`config`**: presets and per-detector settings
//! - **`formatters`**: JSON, console and Markdown reports
//! - **`logging`**: subscriber setup for binaries

pub mod config;
pub mod detectors;
pub mod engine;
pub mod ensemble;
pub mod error;
pub mod formatters;
pub mod logging;
pub mod prelude;
pub mod series;
mod stats;
pub mod types;
