//! Export tunables: page geometry, packing rules and capture timing.

use crate::rendering::{PackingRules, PageGeometry};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How sections are snapshotted in the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// CSS pixel width the clone is frozen at (8.5in at 96dpi)
    pub width: u32,
    /// Device pixel ratio used for the screenshot
    pub device_scale: f64,
    /// Delay after styles are applied
    pub settle_ms: u64,
    /// Extra delay when the clone holds svg or canvas content
    pub chart_settle_ms: u64,
    /// Delay before capturing a mounted cover
    pub cover_settle_ms: u64,
    pub padding_top: u32,
    pub padding_bottom: u32,
    /// Fixed height for report preview pages (11in at 96dpi)
    pub report_page_height: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 816,
            device_scale: 2.0,
            settle_ms: 1000,
            chart_settle_ms: 800,
            cover_settle_ms: 500,
            padding_top: 8,
            padding_bottom: 40,
            report_page_height: 1056,
        }
    }
}

impl CaptureConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn chart_settle(&self) -> Duration {
        Duration::from_millis(self.chart_settle_ms)
    }

    pub fn cover_settle(&self) -> Duration {
        Duration::from_millis(self.cover_settle_ms)
    }
}

/// Configuration for one export run
///
/// ```
/// let cfg = riskos_export::ExportConfig::default();
/// assert_eq!(cfg.page.usable_height(), 732.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub page: PageGeometry,
    pub packing: PackingRules,
    pub capture: CaptureConfig,
    /// JPEG quality for PDF image streams
    pub jpeg_quality: u8,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            page: PageGeometry::default(),
            packing: PackingRules::default(),
            capture: CaptureConfig::default(),
            jpeg_quality: 90,
        }
    }
}

impl ExportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON config; missing keys take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let cfg: ExportConfig = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let page = &self.page;
        if !(page.width > 0.0 && page.height > 0.0) {
            return Err(Error::ConfigError(format!(
                "page size must be positive, got {}x{}",
                page.width, page.height
            )));
        }
        if page.padding < 0.0 || page.usable_height() <= 0.0 || page.content_width() <= 0.0 {
            return Err(Error::ConfigError(format!(
                "padding {} leaves no usable area on a {}x{} page",
                page.padding, page.width, page.height
            )));
        }

        let rules = &self.packing;
        if rules.scale_up_cap < 1.0 {
            return Err(Error::ConfigError(format!(
                "scale_up_cap must be at least 1.0, got {}",
                rules.scale_up_cap
            )));
        }
        if !(rules.pair_threshold > 0.0 && rules.pair_threshold <= 1.0) {
            return Err(Error::ConfigError(format!(
                "pair_threshold must be in (0, 1], got {}",
                rules.pair_threshold
            )));
        }
        if rules.gap_factor < 0.0 {
            return Err(Error::ConfigError("gap_factor must not be negative".into()));
        }

        if self.capture.width == 0 || self.capture.device_scale <= 0.0 {
            return Err(Error::ConfigError(
                "capture width and device scale must be positive".into(),
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(Error::ConfigError(format!(
                "jpeg_quality must be within 1-100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_us_letter_layout() {
        let cfg = ExportConfig::new();
        assert_eq!(cfg.page.width, 612.0);
        assert_eq!(cfg.page.height, 792.0);
        assert_eq!(cfg.page.usable_height(), 732.0);
        assert_eq!(cfg.page.content_width(), 552.0);
        assert_eq!(cfg.capture.width, 816);
        assert_eq!(cfg.jpeg_quality, 90);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = ExportConfig::from_json_str(r#"{ "packing": { "scale_up_cap": 1.3 } }"#).unwrap();
        assert_eq!(cfg.packing.scale_up_cap, 1.3);
        assert_eq!(cfg.packing.pair_threshold, 0.45);
        assert_eq!(cfg.capture.settle_ms, 1000);
        assert_eq!(cfg.jpeg_quality, 90);
    }

    #[test]
    fn rejects_padding_that_eats_the_page() {
        let mut cfg = ExportConfig::new();
        cfg.page.padding = 400.0;
        assert!(matches!(cfg.validate(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn rejects_bad_rules() {
        let mut cfg = ExportConfig::new();
        cfg.packing.scale_up_cap = 0.9;
        assert!(cfg.validate().is_err());

        let mut cfg = ExportConfig::new();
        cfg.packing.pair_threshold = 0.0;
        assert!(cfg.validate().is_err());

        assert!(ExportConfig::from_json_str(r#"{ "jpeg_quality": 0 }"#).is_err());
    }
}
