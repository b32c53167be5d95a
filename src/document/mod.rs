//! Report documents: metadata, packed pages and their serialized forms.

pub mod cover;
pub mod pdf;
pub mod word;

pub use pdf::PdfEmitter;
pub use word::WordEmitter;

use crate::rendering::{pack, PackingRules, PageGeometry, PagePlan, Placement, Raster, SectionBox};
use crate::{Error, Result};
use chrono::NaiveDate;
use log::info;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Which executive audience a dashboard report targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportType {
    Cro,
    Ciso,
    Board,
}

impl ReportType {
    /// Upper-case tag used in badges and filenames.
    pub fn label(&self) -> &'static str {
        match self {
            ReportType::Cro => "CRO",
            ReportType::Ciso => "CISO",
            ReportType::Board => "BOARD",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReportType::Cro => "Chief Risk Officer Report",
            ReportType::Ciso => "Chief Information Security Officer Report",
            ReportType::Board => "Board of Directors Report",
        }
    }

    pub fn subtitle(&self) -> &'static str {
        match self {
            ReportType::Cro => "Comprehensive Risk Assessment & Financial Exposure Analysis",
            ReportType::Ciso => "Security Posture & Control Maturity Assessment",
            ReportType::Board => "Executive Cyber Risk Summary",
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ReportType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cro" => Ok(ReportType::Cro),
            "ciso" => Ok(ReportType::Ciso),
            "board" => Ok(ReportType::Board),
            other => Err(Error::ConfigError(format!(
                "unknown report type '{}' (expected cro, ciso or board)",
                other
            ))),
        }
    }
}

/// Output container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Pdf,
    Docx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Docx => "docx",
        }
    }

    /// Name used in progress messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "PDF",
            ExportFormat::Docx => "Word",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(ExportFormat::Pdf),
            "docx" | "word" => Ok(ExportFormat::Docx),
            other => Err(Error::ConfigError(format!(
                "unknown format '{}' (expected pdf or docx)",
                other
            ))),
        }
    }
}

/// Who the report is for and when it was generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportMeta {
    pub report_type: ReportType,
    pub organization: String,
    pub generated: NaiveDate,
}

impl ReportMeta {
    /// Metadata stamped with today's local date.
    pub fn new(report_type: ReportType, organization: impl Into<String>) -> Self {
        Self {
            report_type,
            organization: organization.into(),
            generated: chrono::Local::now().date_naive(),
        }
    }

    pub fn with_date(mut self, generated: NaiveDate) -> Self {
        self.generated = generated;
        self
    }

    /// Long US-style date, e.g. "March 4, 2025".
    pub fn display_date(&self) -> String {
        self.generated.format("%B %-d, %Y").to_string()
    }
}

/// `{TYPE}-Report-{organization}-{YYYY-MM-DD}.{ext}`
///
/// Whitespace runs in the organization collapse to a single `-` and path
/// separators are replaced so the name stays a single path component.
pub fn report_filename(meta: &ReportMeta, format: ExportFormat, date: NaiveDate) -> String {
    let org = meta
        .organization
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .replace(['/', '\\'], "-");
    format!(
        "{}-Report-{}-{}.{}",
        meta.report_type.label(),
        org,
        date.format("%Y-%m-%d"),
        format.extension()
    )
}

/// First page of a dashboard report.
#[derive(Debug, Clone, PartialEq)]
pub enum Cover {
    /// The application's own cover component, or the generated cover markup,
    /// rasterized in the browser
    Captured(Raster),
    /// Typeset by the emitter when no raster could be produced
    Typeset(ReportMeta),
}

/// One captured dashboard section.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub raster: Raster,
    pub full_page: bool,
}

/// A finished, paginated document waiting to be serialized.
///
/// Built once from captured sections and consumed by [`ReportDocument::save`].
#[derive(Debug, Clone)]
pub struct ReportDocument {
    title: String,
    cover: Option<Cover>,
    sections: Vec<Section>,
    pages: Vec<PagePlan>,
    geometry: PageGeometry,
}

impl ReportDocument {
    /// Pack dashboard sections behind a cover page.
    pub fn packed(
        meta: &ReportMeta,
        cover: Cover,
        sections: Vec<Section>,
        geometry: &PageGeometry,
        rules: &PackingRules,
    ) -> Self {
        let boxes: Vec<SectionBox> = sections
            .iter()
            .map(|s| {
                SectionBox::from_pixels(s.raster.width(), s.raster.height(), geometry, s.full_page)
            })
            .collect();
        let pages = pack(&boxes, geometry, rules);
        Self {
            title: meta.report_type.title().to_string(),
            cover: Some(cover),
            sections,
            pages,
            geometry: *geometry,
        }
    }

    /// One section per page, drawn edge to edge at the page width and top
    /// aligned. Sections taller than the page are shrunk to fit.
    pub fn full_bleed(title: impl Into<String>, sections: Vec<Section>, geometry: &PageGeometry) -> Self {
        let pages = sections
            .iter()
            .enumerate()
            .map(|(index, s)| {
                let natural = s.raster.height_at(geometry.width);
                let scale = if natural > geometry.height {
                    geometry.height / natural
                } else {
                    1.0
                };
                let width = geometry.width * scale;
                PagePlan {
                    placements: vec![Placement {
                        section: index,
                        x: (geometry.width - width) / 2.0,
                        y: 0.0,
                        width,
                        height: natural * scale,
                        scale,
                    }],
                }
            })
            .collect();
        Self {
            title: title.into(),
            cover: None,
            sections,
            pages,
            geometry: *geometry,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn cover(&self) -> Option<&Cover> {
        self.cover.as_ref()
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn pages(&self) -> &[PagePlan] {
        &self.pages
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    /// Pages in the emitted file, cover included.
    pub fn page_count(&self) -> usize {
        self.pages.len() + usize::from(self.cover.is_some())
    }

    pub(crate) fn section(&self, index: usize) -> Result<&Section> {
        self.sections
            .get(index)
            .ok_or_else(|| Error::Emit(format!("placement refers to missing section {}", index)))
    }

    /// Serialize with `emitter` and write `dir/filename`.
    ///
    /// The file extension always follows the emitter's format. Nothing touches
    /// the filesystem until the whole document is serialized.
    pub fn save(self, emitter: &dyn DocumentEmitter, dir: &Path, filename: &str) -> Result<PathBuf> {
        let bytes = emitter.emit(&self)?;
        std::fs::create_dir_all(dir)?;
        let path = dir.join(filename).with_extension(emitter.format().extension());
        std::fs::write(&path, &bytes)?;
        info!(
            "wrote {} ({} pages, {} bytes)",
            path.display(),
            self.page_count(),
            bytes.len()
        );
        Ok(path)
    }
}

/// Serializes a [`ReportDocument`] into a file format.
pub trait DocumentEmitter {
    fn format(&self) -> ExportFormat;

    fn emit(&self, doc: &ReportDocument) -> Result<Vec<u8>>;
}

/// The emitter for `format`, with PDF images encoded at `jpeg_quality`.
pub fn emitter_for(format: ExportFormat, jpeg_quality: u8) -> Box<dyn DocumentEmitter> {
    match format {
        ExportFormat::Pdf => Box::new(PdfEmitter::new(jpeg_quality)),
        ExportFormat::Docx => Box::new(WordEmitter::new()),
    }
}
