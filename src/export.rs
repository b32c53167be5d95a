//! Export orchestration: discover, capture, pack, emit, save.

use crate::capture::{run_script, scripts, CaptureTarget, Snapshotter};
use crate::config::ExportConfig;
use crate::document::cover::cover_html;
use crate::document::{
    emitter_for, report_filename, Cover, ExportFormat, ReportDocument, ReportMeta, Section,
};
use crate::{Engine, Error, Result};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

const SECTION_ATTR: &str = "data-riskos-section";
const COVER_ATTR: &str = "data-riskos-cover";
const PAGE_ATTR: &str = "data-riskos-page";

pub const DEFAULT_ROOT: &str = "main";
pub const DEFAULT_CONTAINER: &str = ".space-y-6, .space-y-8";
pub const DEFAULT_COVER: &str = ".report-cover";
pub const DEFAULT_PREVIEW_CONTAINER: &str = ".space-y-8";
pub const DEFAULT_PAGES_FILENAME: &str = "Risk-Assessment-Report.docx";

/// Callback receiving human-readable progress lines.
pub type ProgressFn = Arc<dyn Fn(&str) + Send + Sync>;

/// A dashboard export.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub meta: ReportMeta,
    pub format: ExportFormat,
    pub out_dir: PathBuf,
    pub root_selector: String,
    /// Section container inside the root. When unset, the first of
    /// [`DEFAULT_CONTAINER`] is used, or the root itself.
    pub container_selector: Option<String>,
    pub cover_selector: String,
}

impl ExportRequest {
    pub fn new(meta: ReportMeta, format: ExportFormat, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            meta,
            format,
            out_dir: out_dir.into(),
            root_selector: DEFAULT_ROOT.to_string(),
            container_selector: None,
            cover_selector: DEFAULT_COVER.to_string(),
        }
    }

    pub fn with_root(mut self, selector: impl Into<String>) -> Self {
        self.root_selector = selector.into();
        self
    }

    pub fn with_container(mut self, selector: impl Into<String>) -> Self {
        self.container_selector = Some(selector.into());
        self
    }

    pub fn with_cover(mut self, selector: impl Into<String>) -> Self {
        self.cover_selector = selector.into();
        self
    }
}

/// An export of the report preview, one page per child element.
#[derive(Debug, Clone)]
pub struct ReportPagesRequest {
    pub format: ExportFormat,
    pub out_dir: PathBuf,
    pub filename: String,
    pub container_selector: String,
    pub title: String,
}

impl ReportPagesRequest {
    pub fn new(format: ExportFormat, out_dir: impl Into<PathBuf>) -> Self {
        let filename = match format {
            ExportFormat::Docx => DEFAULT_PAGES_FILENAME.to_string(),
            ExportFormat::Pdf => DEFAULT_PAGES_FILENAME.replace(".docx", ".pdf"),
        };
        Self {
            format,
            out_dir: out_dir.into(),
            filename,
            container_selector: DEFAULT_PREVIEW_CONTAINER.to_string(),
            title: "Risk Assessment Report".to_string(),
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn with_container(mut self, selector: impl Into<String>) -> Self {
        self.container_selector = selector.into();
        self
    }
}

/// Where the file went and what is in it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOutcome {
    pub path: PathBuf,
    /// Pages in the file, cover included
    pub pages: usize,
    /// Sections that were captured successfully
    pub sections: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DiscoverArgs<'a> {
    root: &'a str,
    container: Option<&'a str>,
    default_container: &'a str,
    cover: &'a str,
    attr: &'a str,
    cover_attr: &'a str,
}

#[derive(Serialize)]
struct PagesArgs<'a> {
    container: &'a str,
    attr: &'a str,
}

#[derive(Serialize)]
struct ClearArgs<'a> {
    attrs: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
enum Discovery {
    Found {
        sections: Vec<FoundSection>,
        #[serde(default)]
        cover: bool,
    },
    NoRoot,
    NoContainer,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FoundSection {
    index: usize,
    #[serde(default)]
    full_page: bool,
}

#[derive(Clone, Default)]
struct Progress(Option<ProgressFn>);

impl Progress {
    fn report(&self, message: &str) {
        debug!("{}", message);
        if let Some(callback) = &self.0 {
            callback(message);
        }
    }
}

/// Runs exports against a loaded page.
pub struct Exporter<'a, E: Engine> {
    engine: &'a mut E,
    config: &'a ExportConfig,
    progress: Progress,
}

impl<'a, E: Engine> Exporter<'a, E> {
    pub fn new(engine: &'a mut E, config: &'a ExportConfig) -> Self {
        Self {
            engine,
            config,
            progress: Progress::default(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Progress(Some(progress));
        self
    }

    /// Export the dashboard under `request.root_selector` as a covered,
    /// packed report.
    pub fn export_dashboard(&mut self, request: &ExportRequest) -> Result<ExportOutcome> {
        self.progress.report(&format!(
            "Initializing {} generation...",
            request.format.display_name()
        ));

        let args = DiscoverArgs {
            root: &request.root_selector,
            container: request.container_selector.as_deref(),
            default_container: DEFAULT_CONTAINER,
            cover: &request.cover_selector,
            attr: SECTION_ATTR,
            cover_attr: COVER_ATTR,
        };
        let discovery: Result<Discovery> =
            run_script(self.engine, scripts::DISCOVER_SECTIONS, &args, false);
        let result = match discovery {
            Ok(Discovery::Found { sections, cover }) => {
                self.build_dashboard(request, &sections, cover)
            }
            Ok(Discovery::NoRoot) => Err(Error::ContentNotFound),
            Ok(Discovery::NoContainer) => Err(Error::ContainerNotFound),
            Err(e) => Err(e),
        };
        self.clear_markers(&[SECTION_ATTR, COVER_ATTR]);
        result
    }

    /// Export every child of the report preview container as its own
    /// full-bleed page.
    pub fn export_report_pages(&mut self, request: &ReportPagesRequest) -> Result<ExportOutcome> {
        self.progress.report(&format!(
            "Initializing {} generation...",
            request.format.display_name()
        ));

        let args = PagesArgs {
            container: &request.container_selector,
            attr: PAGE_ATTR,
        };
        let result = match run_script::<_, _, Discovery>(self.engine, scripts::DISCOVER_PAGES, &args, false) {
            Ok(Discovery::Found { sections, .. }) => self.build_pages(request, &sections),
            Ok(Discovery::NoRoot | Discovery::NoContainer) => Err(Error::PreviewNotFound),
            Err(e) => Err(e),
        };
        self.clear_markers(&[PAGE_ATTR]);
        result
    }

    fn build_dashboard(
        &mut self,
        request: &ExportRequest,
        found: &[FoundSection],
        has_cover: bool,
    ) -> Result<ExportOutcome> {
        if found.is_empty() {
            return Err(Error::NoSections);
        }
        let config = self.config;

        self.progress.report("Generating cover page...");
        if has_cover {
            self.engine.pause(config.capture.cover_settle());
        }
        let mut snap = Snapshotter::new(&mut *self.engine, &config.capture);
        let cover = capture_cover(
            &mut snap,
            &self.progress,
            &request.meta,
            has_cover,
            config.capture.report_page_height,
        );

        self.progress.report("Capturing dashboard content...");
        let total = found.len();
        self.progress
            .report(&format!("Found {} dashboard sections to export", total));

        let mut sections = Vec::with_capacity(total);
        for (i, section) in found.iter().enumerate() {
            self.progress
                .report(&format!("Capturing section {}/{}...", i + 1, total));
            let target = CaptureTarget::new(marker_selector(SECTION_ATTR, section.index));
            match snap.capture(&target) {
                Ok(raster) => sections.push(Section {
                    raster,
                    full_page: section.full_page,
                }),
                Err(e) => error!("Failed to capture section {}: {}", i + 1, e),
            }
        }
        drop(snap);

        let captured = sections.len();
        if captured < total {
            warn!("{} of {} sections could not be captured", total - captured, total);
        }

        let doc = ReportDocument::packed(&request.meta, cover, sections, &config.page, &config.packing);
        let pages = doc.page_count();
        let filename = report_filename(
            &request.meta,
            request.format,
            chrono::Local::now().date_naive(),
        );
        let emitter = emitter_for(request.format, config.jpeg_quality);
        let path = doc.save(emitter.as_ref(), &request.out_dir, &filename)?;

        self.progress.report(&match request.format {
            ExportFormat::Pdf => format!("PDF exported successfully! ({} pages)", pages),
            ExportFormat::Docx => {
                format!("Word document exported successfully! ({} sections)", captured)
            }
        });
        info!(
            "exported {} report to {} ({} pages, {} sections)",
            request.meta.report_type,
            path.display(),
            pages,
            captured
        );

        Ok(ExportOutcome {
            path,
            pages,
            sections: captured,
        })
    }

    fn build_pages(&mut self, request: &ReportPagesRequest, found: &[FoundSection]) -> Result<ExportOutcome> {
        if found.is_empty() {
            return Err(Error::NoReportPages);
        }
        let config = self.config;
        let total = found.len();

        let mut sections = Vec::with_capacity(total);
        let mut snap = Snapshotter::new(&mut *self.engine, &config.capture);
        for (i, page) in found.iter().enumerate() {
            self.progress
                .report(&format!("Capturing page {}/{}...", i + 1, total));
            let target = CaptureTarget::new(marker_selector(PAGE_ATTR, page.index))
                .with_height(config.capture.report_page_height);
            match snap.capture(&target) {
                Ok(raster) => sections.push(Section {
                    raster,
                    full_page: true,
                }),
                Err(e) => error!("Failed to capture page {}: {}", i + 1, e),
            }
        }
        drop(snap);

        if sections.is_empty() {
            return Err(Error::Capture(format!(
                "none of the {} report pages could be captured",
                total
            )));
        }

        let captured = sections.len();
        let doc = ReportDocument::full_bleed(request.title.clone(), sections, &config.page);
        let pages = doc.page_count();
        let emitter = emitter_for(request.format, config.jpeg_quality);
        let path = doc.save(emitter.as_ref(), &request.out_dir, &request.filename)?;

        self.progress.report(&match request.format {
            ExportFormat::Pdf => format!("PDF exported successfully! ({} pages)", pages),
            ExportFormat::Docx => format!("Word document exported successfully! ({} pages)", pages),
        });
        info!("exported report preview to {} ({} pages)", path.display(), pages);

        Ok(ExportOutcome {
            path,
            pages,
            sections: captured,
        })
    }

    fn clear_markers(&mut self, attrs: &[&str]) {
        if let Err(e) =
            run_script::<_, _, serde_json::Value>(self.engine, scripts::CLEAR_MARKERS, &ClearArgs { attrs }, false)
        {
            warn!("failed to clear export markers: {}", e);
        }
    }
}

/// The mounted cover if there is one, else the generated cover markup, else
/// a typeset cover.
fn capture_cover<E: Engine>(
    snap: &mut Snapshotter<'_, E>,
    progress: &Progress,
    meta: &ReportMeta,
    has_cover: bool,
    cover_height: u32,
) -> Cover {
    if has_cover {
        match snap.capture(&CaptureTarget::new(format!("[{}]", COVER_ATTR))) {
            Ok(raster) => return Cover::Captured(raster),
            Err(e) => warn!("Mounted cover capture failed, falling back to generated cover: {}", e),
        }
    }

    progress.report("Creating fallback cover page...");
    match snap.capture_markup(&cover_html(meta), Some(cover_height)) {
        Ok(raster) => Cover::Captured(raster),
        Err(e) => {
            warn!("generated cover could not be rasterized, typesetting it: {}", e);
            Cover::Typeset(meta.clone())
        }
    }
}

fn marker_selector(attr: &str, index: usize) -> String {
    format!("[{}=\"{}\"]", attr, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ReportType;

    #[test]
    fn discovery_replies_decode() {
        let found: Discovery = serde_json::from_str(
            r#"{"status":"found","sections":[{"index":0,"fullPage":true},{"index":1}],"cover":true}"#,
        )
        .unwrap();
        match found {
            Discovery::Found { sections, cover } => {
                assert!(cover);
                assert_eq!(sections.len(), 2);
                assert!(sections[0].full_page);
                assert!(!sections[1].full_page);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            serde_json::from_str::<Discovery>(r#"{"status":"no-root"}"#).unwrap(),
            Discovery::NoRoot
        ));
    }

    #[test]
    fn marker_selectors_quote_the_index() {
        assert_eq!(marker_selector(SECTION_ATTR, 3), "[data-riskos-section=\"3\"]");
    }

    #[test]
    fn request_defaults() {
        let meta = ReportMeta::new(ReportType::Board, "Acme");
        let req = ExportRequest::new(meta, ExportFormat::Pdf, "/tmp/out");
        assert_eq!(req.root_selector, "main");
        assert_eq!(req.cover_selector, ".report-cover");
        assert!(req.container_selector.is_none());

        let pages = ReportPagesRequest::new(ExportFormat::Pdf, "/tmp/out");
        assert_eq!(pages.filename, "Risk-Assessment-Report.pdf");
        assert_eq!(pages.container_selector, ".space-y-8");
        assert_eq!(
            ReportPagesRequest::new(ExportFormat::Docx, ".").filename,
            "Risk-Assessment-Report.docx"
        );
    }
}
