//! Word (.docx) serialization.
//!
//! Writes a minimal OOXML package by hand: one zero-margin section, and one
//! centered paragraph per placement holding an inline PNG. Word has no
//! absolute positioning in flow text, so a packed page is reproduced with a
//! page break before its first picture and the packed vertical offsets as
//! paragraph spacing.

use super::{Cover, DocumentEmitter, ExportFormat, ReportDocument, ReportMeta};
use crate::rendering::{Placement, Raster};
use crate::Result;
use quick_xml::escape::escape;
use std::fmt::Write as _;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const EMU_PER_POINT: f32 = 12_700.0;
const TWIPS_PER_POINT: f32 = 20.0;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/></Relationships>"#;

/// Writes .docx packages.
#[derive(Debug, Clone, Default)]
pub struct WordEmitter;

impl WordEmitter {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentEmitter for WordEmitter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Docx
    }

    fn emit(&self, doc: &ReportDocument) -> Result<Vec<u8>> {
        let mut body = BodyWriter::default();

        match doc.cover() {
            Some(Cover::Captured(raster)) => {
                let width = doc.geometry().width;
                body.picture(raster, width, raster.height_at(width), 0.0, false);
            }
            Some(Cover::Typeset(meta)) => body.text_cover(meta),
            None => {}
        }

        for plan in doc.pages() {
            let mut cursor = 0.0;
            for (i, placement) in plan.placements.iter().enumerate() {
                let raster = &doc.section(placement.section)?.raster;
                let before = (placement.y - cursor).max(0.0);
                let page_break = i == 0 && !body.is_empty();
                body.placement(raster, placement, before, page_break);
                cursor = placement.y + placement.height;
            }
        }

        let document_xml = body.document_xml(doc);
        let rels_xml = body.rels_xml();
        let core_xml = core_properties(doc.title());

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let deflated = || SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        // PNG data is already compressed
        let stored = || SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        zip.start_file("[Content_Types].xml", deflated())?;
        zip.write_all(CONTENT_TYPES.as_bytes())?;
        zip.start_file("_rels/.rels", deflated())?;
        zip.write_all(PACKAGE_RELS.as_bytes())?;
        zip.start_file("docProps/core.xml", deflated())?;
        zip.write_all(core_xml.as_bytes())?;
        zip.start_file("word/document.xml", deflated())?;
        zip.write_all(document_xml.as_bytes())?;
        zip.start_file("word/_rels/document.xml.rels", deflated())?;
        zip.write_all(rels_xml.as_bytes())?;
        for (n, png) in body.media.iter().enumerate() {
            zip.start_file(format!("word/media/image{}.png", n + 1), stored())?;
            zip.write_all(png)?;
        }

        Ok(zip.finish()?.into_inner())
    }
}

#[derive(Default)]
struct BodyWriter<'a> {
    xml: String,
    media: Vec<&'a [u8]>,
}

impl<'a> BodyWriter<'a> {
    fn is_empty(&self) -> bool {
        self.xml.is_empty()
    }

    fn placement(&mut self, raster: &'a Raster, p: &Placement, before: f32, page_break: bool) {
        self.picture(raster, p.width, p.height, before, page_break);
    }

    fn picture(&mut self, raster: &'a Raster, width: f32, height: f32, before: f32, page_break: bool) {
        self.media.push(raster.png_data());
        let n = self.media.len();
        let cx = (width * EMU_PER_POINT).round() as i64;
        let cy = (height * EMU_PER_POINT).round() as i64;

        self.xml.push_str("<w:p><w:pPr>");
        if page_break {
            self.xml.push_str("<w:pageBreakBefore/>");
        }
        let _ = write!(
            self.xml,
            r#"<w:spacing w:before="{}" w:after="0" w:line="240" w:lineRule="auto"/><w:jc w:val="center"/></w:pPr>"#,
            twips(before)
        );
        let _ = write!(
            self.xml,
            concat!(
                r#"<w:r><w:drawing><wp:inline distT="0" distB="0" distL="0" distR="0">"#,
                r#"<wp:extent cx="{cx}" cy="{cy}"/><wp:docPr id="{n}" name="Picture {n}"/>"#,
                r#"<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
                r#"<pic:pic><pic:nvPicPr><pic:cNvPr id="{n}" name="image{n}.png"/><pic:cNvPicPr/></pic:nvPicPr>"#,
                r#"<pic:blipFill><a:blip r:embed="rIdImg{n}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
                r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
                r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr></pic:pic>"#,
                r#"</a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#,
            ),
            cx = cx,
            cy = cy,
            n = n,
        );
    }

    fn text_cover(&mut self, meta: &ReportMeta) {
        let rt = meta.report_type;
        self.text_paragraph(&format!("{} Report", rt.label()), 1440, 720, 36, true);
        self.text_paragraph(rt.title(), 0, 360, 28, true);
        self.text_paragraph(&meta.organization, 0, 360, 24, false);
        self.text_paragraph(&meta.display_date(), 0, 1440, 24, false);
    }

    /// Centered run; `half_points` is the OOXML font size unit.
    fn text_paragraph(&mut self, text: &str, before: u32, after: u32, half_points: u32, bold: bool) {
        let _ = write!(
            self.xml,
            r#"<w:p><w:pPr><w:spacing w:before="{}" w:after="{}"/><w:jc w:val="center"/></w:pPr><w:r><w:rPr>{}<w:sz w:val="{}"/></w:rPr><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
            before,
            after,
            if bold { "<w:b/>" } else { "" },
            half_points,
            escape(text)
        );
    }

    fn document_xml(&self, doc: &ReportDocument) -> String {
        let g = doc.geometry();
        let body = if self.xml.is_empty() { "<w:p/>" } else { self.xml.as_str() };
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                "\n",
                r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" "#,
                r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
                r#"xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" "#,
                r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
                r#"xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
                "<w:body>{body}<w:sectPr>",
                r#"<w:pgSz w:w="{w}" w:h="{h}"/>"#,
                r#"<w:pgMar w:top="0" w:right="0" w:bottom="0" w:left="0" w:header="0" w:footer="0" w:gutter="0"/>"#,
                "</w:sectPr></w:body></w:document>",
            ),
            body = body,
            w = twips(g.width),
            h = twips(g.height),
        )
    }

    fn rels_xml(&self) -> String {
        let mut xml = String::from(concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            "\n",
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        ));
        for n in 1..=self.media.len() {
            let _ = write!(
                xml,
                r#"<Relationship Id="rIdImg{n}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image{n}.png"/>"#,
                n = n
            );
        }
        xml.push_str("</Relationships>");
        xml
    }
}

fn twips(points: f32) -> u32 {
    (points * TWIPS_PER_POINT).round().max(0.0) as u32
}

fn core_properties(title: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            "\n",
            r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" "#,
            r#"xmlns:dc="http://purl.org/dc/elements/1.1/">"#,
            "<dc:title>{}</dc:title><dc:creator>riskos-export</dc:creator></cp:coreProperties>",
        ),
        escape(title)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_convert_to_twips() {
        assert_eq!(twips(612.0), 12240);
        assert_eq!(twips(792.0), 15840);
        assert_eq!(twips(-3.0), 0);
    }

    #[test]
    fn core_properties_escape_the_title() {
        let xml = core_properties("Risk & Exposure");
        assert!(xml.contains("<dc:title>Risk &amp; Exposure</dc:title>"));
    }
}
