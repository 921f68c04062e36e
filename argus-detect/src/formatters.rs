//! Result formatting for detection results.
//!
//! Three formatters render a [`DetectionResult`]: JSON for programmatic
//! consumption, a human-readable console report, and Markdown for reports
//! and pull-request comments.
//!
//! # Examples
//!
//! ```rust
//! use argus_detect::formatters::{FormatterConfig, HumanFormatter, ResultFormatter};
//! use argus_detect::types::{AnomalyRecord, DetectionResult};
//!
//! let result = DetectionResult {
//!     metric_id: serde_json::json!(1),
//!     metric_name: Some("cpu_usage".to_string()),
//!     anomalies: vec![AnomalyRecord::new(
//!         1_700_000_720,
//!         250.0,
//!         1.0,
//!         vec!["forecast".into(), "isolation".into()],
//!     )],
//!     total_points: 30,
//!     anomaly_count: 1,
//!     detectors: Vec::new(),
//! };
//!
//! let formatter = HumanFormatter::with_config(FormatterConfig::ci());
//! let output = formatter.format(&result).unwrap();
//! assert!(output.contains("cpu_usage"));
//! ```

use chrono::{DateTime, Utc};
use std::fmt::Write;

use crate::error::{DetectionError, Result};
use crate::types::{AnomalyRecord, DetectionResult, DetectorStatus, Severity};

/// Configuration options for formatting detection results.
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// Include the individual anomaly records (text reports only; JSON
    /// always carries the full list)
    pub include_anomalies: bool,
    /// Include per-detector summaries
    pub include_detectors: bool,
    /// Maximum number of anomalies to display in text reports (`None` for all)
    pub max_anomalies: Option<usize>,
    /// Whether to use colorized output (human formatter)
    pub use_colors: bool,
    /// Whether to render timestamps as RFC 3339 next to epoch seconds
    pub include_timestamps: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            include_anomalies: true,
            include_detectors: true,
            max_anomalies: None,
            use_colors: true,
            include_timestamps: true,
        }
    }
}

impl FormatterConfig {
    /// Summary counts only.
    pub fn minimal() -> Self {
        Self {
            include_anomalies: false,
            include_detectors: false,
            max_anomalies: Some(0),
            use_colors: false,
            include_timestamps: false,
        }
    }

    pub fn detailed() -> Self {
        Self::default()
    }

    /// No colors and a bounded anomaly list.
    pub fn ci() -> Self {
        Self {
            include_anomalies: true,
            include_detectors: true,
            max_anomalies: Some(50),
            use_colors: false,
            include_timestamps: true,
        }
    }

    pub fn with_anomalies(mut self, include: bool) -> Self {
        self.include_anomalies = include;
        self
    }

    pub fn with_detectors(mut self, include: bool) -> Self {
        self.include_detectors = include;
        self
    }

    pub fn with_max_anomalies(mut self, max: usize) -> Self {
        self.max_anomalies = Some(max);
        self
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    fn visible<'a>(&self, anomalies: &'a [AnomalyRecord]) -> &'a [AnomalyRecord] {
        match self.max_anomalies {
            Some(max) => &anomalies[..max.min(anomalies.len())],
            None => anomalies,
        }
    }
}

/// Trait for rendering a detection result.
pub trait ResultFormatter {
    /// Formats a result with the formatter's own configuration.
    fn format(&self, result: &DetectionResult) -> Result<String>;

    /// Formats a result with a custom configuration.
    fn format_with_config(
        &self,
        result: &DetectionResult,
        _config: &FormatterConfig,
    ) -> Result<String> {
        self.format(result)
    }
}

/// Formats results as JSON.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    config: FormatterConfig,
    pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
            pretty: true,
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            pretty: true,
        }
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultFormatter for JsonFormatter {
    fn format(&self, result: &DetectionResult) -> Result<String> {
        self.format_with_config(result, &self.config)
    }

    fn format_with_config(
        &self,
        result: &DetectionResult,
        config: &FormatterConfig,
    ) -> Result<String> {
        // The anomaly list stays whole so `anomaly_count` matches it.
        let mut filtered = result.clone();
        if !config.include_detectors {
            filtered.detectors.clear();
        }

        let json = if self.pretty {
            serde_json::to_string_pretty(&filtered)?
        } else {
            serde_json::to_string(&filtered)?
        };
        Ok(json)
    }
}

/// Formats results for terminal output.
#[derive(Debug, Clone)]
pub struct HumanFormatter {
    config: FormatterConfig,
}

impl HumanFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self { config }
    }
}

impl Default for HumanFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultFormatter for HumanFormatter {
    fn format(&self, result: &DetectionResult) -> Result<String> {
        self.format_with_config(result, &self.config)
    }

    fn format_with_config(
        &self,
        result: &DetectionResult,
        config: &FormatterConfig,
    ) -> Result<String> {
        let mut output = String::new();
        render_human(&mut output, result, config).map_err(render_error)?;
        Ok(output)
    }
}

fn render_human(
    output: &mut String,
    result: &DetectionResult,
    config: &FormatterConfig,
) -> std::fmt::Result {
    writeln!(output)?;
    let headline = if result.anomaly_count == 0 {
        "No anomalies detected".to_string()
    } else {
        format!("{} anomalies detected", result.anomaly_count)
    };
    match (result.anomaly_count, config.use_colors) {
        (0, true) => writeln!(output, "✅ \x1b[32m{headline}\x1b[0m")?,
        (0, false) => writeln!(output, "✅ {headline}")?,
        (_, true) => writeln!(output, "🚨 \x1b[31m{headline}\x1b[0m")?,
        (_, false) => writeln!(output, "🚨 {headline}")?,
    }

    writeln!(output)?;
    writeln!(output, "Metric: {}", metric_label(result))?;
    writeln!(output, "Points analysed: {}", result.total_points)?;

    if config.include_detectors && !result.detectors.is_empty() {
        writeln!(output)?;
        writeln!(output, "📊 Detectors:")?;
        for summary in &result.detectors {
            match summary.status {
                DetectorStatus::Voted => writeln!(
                    output,
                    "   {}: voted, {} flagged",
                    summary.method, summary.flagged
                )?,
                DetectorStatus::Abstained => writeln!(
                    output,
                    "   {}: abstained ({})",
                    summary.method,
                    summary.reason.as_deref().unwrap_or("no reason given")
                )?,
            }
        }
    }

    if config.include_anomalies && !result.anomalies.is_empty() {
        let shown = config.visible(&result.anomalies);
        writeln!(output)?;
        writeln!(output, "🔍 Anomalies:")?;

        for (i, record) in shown.iter().enumerate() {
            let severity = record.severity();
            let marker = if config.use_colors {
                format!("{}{}\x1b[0m", severity_color(severity), severity)
            } else {
                severity.to_string()
            };
            writeln!(output)?;
            writeln!(output, "   #{} [{marker}] value {}", i + 1, record.value)?;
            writeln!(
                output,
                "      Time: {}",
                timestamp_label(record.timestamp, config)
            )?;
            writeln!(output, "      Score: {:.3}", record.score)?;
            writeln!(output, "      Methods: {}", record.methods.join(", "))?;
        }

        if result.anomalies.len() > shown.len() {
            writeln!(output)?;
            writeln!(
                output,
                "   ... and {} more anomalies (use --max-anomalies to show more)",
                result.anomalies.len() - shown.len()
            )?;
        }
    }

    writeln!(output)
}

/// Formats results as Markdown.
#[derive(Debug, Clone)]
pub struct MarkdownFormatter {
    config: FormatterConfig,
    heading_level: u8,
}

impl MarkdownFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
            heading_level: 2,
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            heading_level: 2,
        }
    }

    /// Sets the base heading level for the output.
    pub fn with_heading_level(mut self, level: u8) -> Self {
        self.heading_level = level.clamp(1, 6);
        self
    }
}

impl Default for MarkdownFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultFormatter for MarkdownFormatter {
    fn format(&self, result: &DetectionResult) -> Result<String> {
        self.format_with_config(result, &self.config)
    }

    fn format_with_config(
        &self,
        result: &DetectionResult,
        config: &FormatterConfig,
    ) -> Result<String> {
        let mut output = String::new();
        let h = "#".repeat(self.heading_level as usize);
        render_markdown(&mut output, &h, result, config).map_err(render_error)?;
        Ok(output)
    }
}

fn render_markdown(
    output: &mut String,
    h: &str,
    result: &DetectionResult,
    config: &FormatterConfig,
) -> std::fmt::Result {
    if result.anomaly_count == 0 {
        writeln!(output, "{h} ✅ Anomaly Report - CLEAN")?;
    } else {
        writeln!(output, "{h} 🚨 Anomaly Report - {} FOUND", result.anomaly_count)?;
    }
    writeln!(output)?;
    writeln!(output, "**Metric:** {}", metric_label(result))?;
    writeln!(output, "**Points:** {}", result.total_points)?;

    if config.include_detectors && !result.detectors.is_empty() {
        writeln!(output)?;
        writeln!(output, "{h}# Detectors")?;
        writeln!(output)?;
        writeln!(output, "| Method | Status | Flagged | Reason |")?;
        writeln!(output, "|--------|--------|---------|--------|")?;
        for summary in &result.detectors {
            let status = match summary.status {
                DetectorStatus::Voted => "voted",
                DetectorStatus::Abstained => "abstained",
            };
            writeln!(
                output,
                "| {} | {status} | {} | {} |",
                summary.method,
                summary.flagged,
                summary.reason.as_deref().unwrap_or("")
            )?;
        }
    }

    if config.include_anomalies && !result.anomalies.is_empty() {
        let shown = config.visible(&result.anomalies);
        writeln!(output)?;
        writeln!(output, "{h}# Anomalies")?;
        writeln!(output)?;
        writeln!(output, "| Time | Value | Score | Severity | Methods |")?;
        writeln!(output, "|------|-------|-------|----------|---------|")?;
        for record in shown {
            writeln!(
                output,
                "| {} | {} | {:.3} | {} | {} |",
                timestamp_label(record.timestamp, config),
                record.value,
                record.score,
                record.severity(),
                record.methods.join(", ")
            )?;
        }

        if result.anomalies.len() > shown.len() {
            writeln!(output)?;
            writeln!(
                output,
                "> **Note:** {} additional anomalies not shown in this report.",
                result.anomalies.len() - shown.len()
            )?;
        }
    }

    Ok(())
}

fn render_error(e: std::fmt::Error) -> DetectionError {
    DetectionError::Serialization(format!("failed to render report: {e}"))
}

fn metric_label(result: &DetectionResult) -> String {
    match (&result.metric_name, &result.metric_id) {
        (Some(name), serde_json::Value::Null) => name.clone(),
        (Some(name), id) => format!("{name} (id {id})"),
        (None, serde_json::Value::Null) => "unnamed".to_string(),
        (None, id) => format!("id {id}"),
    }
}

fn timestamp_label(timestamp: i64, config: &FormatterConfig) -> String {
    if !config.include_timestamps {
        return timestamp.to_string();
    }
    match DateTime::<Utc>::from_timestamp(timestamp, 0) {
        Some(dt) => format!("{} ({timestamp})", dt.to_rfc3339()),
        None => timestamp.to_string(),
    }
}

fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "\x1b[31m",
        Severity::High => "\x1b[35m",
        Severity::Medium => "\x1b[33m",
        Severity::Low => "\x1b[34m",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DetectorSummary;

    fn create_test_result() -> DetectionResult {
        DetectionResult {
            metric_id: serde_json::json!(42),
            metric_name: Some("request_latency".to_string()),
            anomalies: vec![
                AnomalyRecord::new(
                    1_700_000_000,
                    812.0,
                    1.0,
                    vec!["forecast".into(), "seasonal".into(), "isolation".into()],
                ),
                AnomalyRecord::new(
                    1_700_000_600,
                    640.0,
                    0.6,
                    vec!["seasonal".into(), "isolation".into()],
                ),
            ],
            total_points: 48,
            anomaly_count: 2,
            detectors: vec![
                DetectorSummary {
                    method: "forecast".into(),
                    status: DetectorStatus::Voted,
                    flagged: 1,
                    reason: None,
                },
                DetectorSummary {
                    method: "seasonal".into(),
                    status: DetectorStatus::Abstained,
                    flagged: 0,
                    reason: Some("requires at least 24 points, got 20".into()),
                },
            ],
        }
    }

    #[test]
    fn test_formatter_config() {
        let config = FormatterConfig::default();
        assert!(config.include_anomalies);
        assert!(config.use_colors);
        assert!(config.max_anomalies.is_none());

        let minimal = FormatterConfig::minimal();
        assert!(!minimal.include_anomalies);
        assert!(!minimal.use_colors);

        let ci = FormatterConfig::ci();
        assert!(!ci.use_colors);
        assert_eq!(ci.max_anomalies, Some(50));
    }

    #[test]
    fn test_json_formatter() {
        let result = create_test_result();
        let output = JsonFormatter::new().format(&result).unwrap();
        assert!(output.contains("\"anomaly_count\": 2"));
        assert!(output.contains("\"request_latency\""));

        let output = JsonFormatter::new()
            .with_pretty(false)
            .format_with_config(&result, &FormatterConfig::minimal())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["anomalies"].as_array().unwrap().len(), 2);
        assert_eq!(value["anomaly_count"], 2);
        assert!(value.get("detectors").is_none());
    }

    #[test]
    fn test_json_count_matches_anomalies() {
        let result = create_test_result();
        let config = FormatterConfig::default().with_max_anomalies(1);
        let output = JsonFormatter::with_config(config).format(&result).unwrap();

        let parsed: DetectionResult = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed.anomaly_count, parsed.anomalies.len());
        assert_eq!(parsed.anomalies, result.anomalies);
    }

    #[test]
    fn test_human_formatter() {
        let result = create_test_result();
        let output = HumanFormatter::new().format(&result).unwrap();
        assert!(output.contains("2 anomalies detected"));
        assert!(output.contains("request_latency (id 42)"));
        assert!(output.contains("2023-11-14T22:13:20+00:00"));
        assert!(output.contains("seasonal: abstained (requires at least 24 points, got 20)"));

        let config = FormatterConfig::default().with_colors(false);
        let output = HumanFormatter::new()
            .format_with_config(&result, &config)
            .unwrap();
        assert!(output.contains("[critical]"));
        assert!(!output.contains("\x1b["));
    }

    #[test]
    fn test_markdown_formatter() {
        let result = create_test_result();
        let output = MarkdownFormatter::new().format(&result).unwrap();
        assert!(output.contains("## 🚨 Anomaly Report - 2 FOUND"));
        assert!(output.contains("**Metric:** request_latency (id 42)"));
        assert!(output.contains("| forecast | voted | 1 |  |"));
        assert!(output.contains("| 812 | 1.000 | critical | forecast, seasonal, isolation |"));

        let output = MarkdownFormatter::new()
            .with_heading_level(1)
            .format(&result)
            .unwrap();
        assert!(output.contains("# 🚨 Anomaly Report"));
    }

    #[test]
    fn test_max_anomalies() {
        let result = create_test_result();
        let config = FormatterConfig::default()
            .with_colors(false)
            .with_max_anomalies(1);
        let output = HumanFormatter::new()
            .format_with_config(&result, &config)
            .unwrap();
        assert!(output.contains("#1 [critical]"));
        assert!(output.contains("... and 1 more anomalies"));
    }
}
