//! Risk OS report export
//!
//! Captures the sections of a rendered Risk OS dashboard in a headless
//! browser and packs them into paginated PDF or Word documents.
//!
//! # Pipeline
//!
//! - **Capture**: each section is cloned off-screen with its computed styles
//!   frozen inline, then screenshotted through an [`Engine`]
//! - **Packing**: [`rendering::pack`] decides which sections share a US Letter
//!   page and at what scale, without ever clipping one
//! - **Emitting**: [`document::PdfEmitter`] and [`document::WordEmitter`]
//!   serialize the packed pages, and [`document::ReportDocument::save`] writes
//!   the file
//!
//! # Example
//!
//! ```no_run
//! use riskos_export::{Engine, EngineConfig, ExportConfig};
//! use riskos_export::document::{ExportFormat, ReportMeta, ReportType};
//! use riskos_export::export::{ExportRequest, Exporter};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut engine = riskos_export::new_engine(EngineConfig::default())?;
//! engine.load_url("https://app.example.com/dashboard/cro")?;
//!
//! let config = ExportConfig::default();
//! let meta = ReportMeta::new(ReportType::Cro, "Acme Holdings");
//! let request = ExportRequest::new(meta, ExportFormat::Pdf, "./out");
//! let outcome = Exporter::new(&mut engine, &config).export_dashboard(&request)?;
//! println!("saved {}", outcome.path.display());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use base64::Engine as Base64Engine;

pub mod error;
pub use error::{Error, Result};

pub mod capture;
pub mod color;
pub mod config;
pub mod document;
pub mod export;
pub mod rendering;
pub mod session;

pub use config::{CaptureConfig, ExportConfig};

#[cfg(feature = "cdp")]
pub mod cdp;

// Async-friendly browser API (worker-backed abstraction)
#[cfg(feature = "cdp")]
pub mod async_api;

#[cfg(feature = "cdp")]
pub use async_api::Browser;

/// Configuration for the headless engine
///
/// The defaults suit dashboard capture: a desktop-sized window, a generous
/// navigation timeout and a headless browser found on `PATH`.
///
/// # Examples
///
/// ```
/// let cfg = riskos_export::EngineConfig::default();
/// assert!(cfg.headless);
/// assert_eq!(cfg.viewport.width, 1280);
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// User agent string to send with requests
    pub user_agent: String,
    /// Viewport dimensions
    pub viewport: Viewport,
    /// Timeout for page loads and protocol calls in milliseconds
    pub timeout_ms: u64,
    /// Custom HTTP headers
    pub headers: HashMap<String, String>,
    /// Explicit browser binary; autodetected when `None`
    pub chrome_path: Option<PathBuf>,
    /// Run without a visible window
    pub headless: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36 RiskOS-Export/0.1".to_string(),
            viewport: Viewport::default(),
            timeout_ms: 30000,
            headers: HashMap::new(),
            chrome_path: None,
            headless: true,
        }
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

impl std::str::FromStr for Viewport {
    type Err = Error;

    /// Parses `WIDTHxHEIGHT`, e.g. `1280x720`.
    fn from_str(s: &str) -> Result<Self> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| Error::ConfigError(format!("expected WIDTHxHEIGHT, got '{}'", s)))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| Error::ConfigError(format!("invalid viewport dimension '{}'", v)))
        };
        Ok(Self {
            width: parse(w)?,
            height: parse(h)?,
        })
    }
}

/// A rectangle in document coordinates (CSS pixels), used to clip screenshots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Result of JavaScript execution
///
/// `value` is the serialized result of the evaluation. Capture scripts always
/// return `JSON.stringify(...)` output, so it is JSON text. When the script
/// throws, `is_error` is set and `value` holds the exception description.
#[derive(Debug, Clone)]
pub struct ScriptResult {
    /// Serialized result value
    pub value: String,
    /// Whether the script threw an error
    pub is_error: bool,
}

/// Core trait for headless engine implementations
///
/// The export pipeline only needs four primitives from a browser: load a page,
/// evaluate script against its DOM, screenshot a region, and wait.
pub trait Engine {
    /// Create a new engine instance with the given configuration
    fn new(config: EngineConfig) -> Result<Self>
    where
        Self: Sized;

    /// Load a URL and wait for the page to be ready
    fn load_url(&mut self, url: &str) -> Result<()>;

    /// Load an HTML document directly. The default implementation navigates to
    /// a base64 `data:` URL.
    fn load_html(&mut self, html: &str) -> Result<()> {
        let b64 = Base64Engine::encode(&base64::engine::general_purpose::STANDARD, html);
        self.load_url(&format!("data:text/html;charset=utf-8;base64,{}", b64))
    }

    /// Evaluate JavaScript in the page's global context. When `await_promise`
    /// is set, a returned promise is awaited before the value is read.
    fn evaluate(&mut self, script: &str, await_promise: bool) -> Result<ScriptResult>;

    /// Screenshot `clip` at `scale` device pixels per CSS pixel, as PNG bytes.
    fn capture_region(&mut self, clip: Region, scale: f64) -> Result<Vec<u8>>;

    /// Block for `duration` while the page settles.
    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }

    /// Close the engine and clean up resources
    fn close(self) -> Result<()>;
}

/// Create a new engine instance with the default (CDP) backend
#[cfg(feature = "cdp")]
pub fn new_engine(config: EngineConfig) -> Result<impl Engine> {
    cdp::CdpEngine::new(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.viewport.width, 1280);
        assert_eq!(config.viewport.height, 720);
        assert!(config.headless);
        assert!(config.chrome_path.is_none());
    }

    #[test]
    fn test_viewport_parse() {
        let v: Viewport = "1920x1080".parse().unwrap();
        assert_eq!(v, Viewport { width: 1920, height: 1080 });
        assert!("1920".parse::<Viewport>().is_err());
        assert!("0x10".parse::<Viewport>().is_err());
    }
}
