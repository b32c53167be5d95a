//! PDF serialization with `pdf-writer`.
//!
//! Every placement becomes a JPEG image XObject drawn at its packed position.
//! Page coordinates are top-left based everywhere else in the crate, so they
//! are flipped to PDF's bottom-left origin here and nowhere else.

use super::cover::CoverText;
use super::{Cover, DocumentEmitter, ExportFormat, ReportDocument};
use crate::rendering::raster::png_to_jpeg;
use crate::rendering::{PageGeometry, Placement, Raster};
use crate::Result;
use log::debug;
use pdf_writer::{Content, Filter, Name, Pdf, Rect, Ref, Str, TextStr};

const REGULAR: Name<'static> = Name(b"F1");
const BOLD: Name<'static> = Name(b"F2");

type Rgb = (f32, f32, f32);

const BRAND: Rgb = (9.0 / 255.0, 66.0 / 255.0, 60.0 / 255.0);
const ACCENT: Rgb = (79.0 / 255.0, 150.0 / 255.0, 144.0 / 255.0);
const MUTED: Rgb = (107.0 / 255.0, 138.0 / 255.0, 135.0 / 255.0);
const FAINT: Rgb = (148.0 / 255.0, 163.0 / 255.0, 184.0 / 255.0);
const WHITE: Rgb = (1.0, 1.0, 1.0);

/// Writes US Letter PDFs with JPEG-compressed section images.
#[derive(Debug, Clone)]
pub struct PdfEmitter {
    jpeg_quality: u8,
}

impl PdfEmitter {
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }
}

impl Default for PdfEmitter {
    fn default() -> Self {
        Self::new(90)
    }
}

impl DocumentEmitter for PdfEmitter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Pdf
    }

    fn emit(&self, doc: &ReportDocument) -> Result<Vec<u8>> {
        let mut writer = PdfBuilder::new(*doc.geometry(), self.jpeg_quality);

        match doc.cover() {
            Some(Cover::Captured(raster)) => {
                let width = doc.geometry().width;
                let cover = Placement {
                    section: 0,
                    x: 0.0,
                    y: 0.0,
                    width,
                    height: raster.height_at(width),
                    scale: 1.0,
                };
                writer.image_page(&[(raster, cover)])?;
            }
            Some(Cover::Typeset(meta)) => writer.text_cover(&CoverText::new(meta)),
            None => {}
        }

        for plan in doc.pages() {
            let images = plan
                .placements
                .iter()
                .map(|p| Ok((&doc.section(p.section)?.raster, *p)))
                .collect::<Result<Vec<_>>>()?;
            writer.image_page(&images)?;
        }

        Ok(writer.finish(doc.title()))
    }
}

struct PdfBuilder {
    pdf: Pdf,
    geometry: PageGeometry,
    jpeg_quality: u8,
    next_id: i32,
    catalog_id: Ref,
    pages_id: Ref,
    regular_id: Ref,
    bold_id: Ref,
    page_ids: Vec<Ref>,
}

impl PdfBuilder {
    fn new(geometry: PageGeometry, jpeg_quality: u8) -> Self {
        let mut builder = Self {
            pdf: Pdf::new(),
            geometry,
            jpeg_quality,
            next_id: 1,
            catalog_id: Ref::new(1),
            pages_id: Ref::new(1),
            regular_id: Ref::new(1),
            bold_id: Ref::new(1),
            page_ids: Vec::new(),
        };
        builder.catalog_id = builder.alloc();
        builder.pages_id = builder.alloc();
        builder.regular_id = builder.alloc();
        builder.bold_id = builder.alloc();

        builder
            .pdf
            .type1_font(builder.regular_id)
            .base_font(Name(b"Helvetica"))
            .encoding_predefined(Name(b"WinAnsiEncoding"));
        builder
            .pdf
            .type1_font(builder.bold_id)
            .base_font(Name(b"Helvetica-Bold"))
            .encoding_predefined(Name(b"WinAnsiEncoding"));
        builder
    }

    fn alloc(&mut self) -> Ref {
        let r = Ref::new(self.next_id);
        self.next_id += 1;
        r
    }

    /// A page holding the given rasters at their placements.
    fn image_page(&mut self, images: &[(&Raster, Placement)]) -> Result<()> {
        let page_height = self.geometry.height;
        let mut content = Content::new();
        let mut xobjects = Vec::with_capacity(images.len());

        for (i, (raster, placement)) in images.iter().enumerate() {
            let jpeg = png_to_jpeg(raster.png_data(), self.jpeg_quality)?;
            let image_id = self.alloc();
            {
                let mut xobj = self.pdf.image_xobject(image_id, &jpeg);
                xobj.filter(Filter::DctDecode);
                xobj.width(raster.width() as i32);
                xobj.height(raster.height() as i32);
                xobj.color_space().device_rgb();
                xobj.bits_per_component(8);
            }
            debug!(
                "embedded {}x{} image as {} bytes of jpeg",
                raster.width(),
                raster.height(),
                jpeg.len()
            );

            let name = format!("Im{}", i + 1);
            let bottom = page_height - placement.y - placement.height;
            content.save_state();
            content.transform([placement.width, 0.0, 0.0, placement.height, placement.x, bottom]);
            content.x_object(Name(name.as_bytes()));
            content.restore_state();
            xobjects.push((name, image_id));
        }

        self.write_page(content, &xobjects);
        Ok(())
    }

    fn text_cover(&mut self, text: &CoverText) {
        let g = self.geometry;
        let mut c = Content::new();
        let max_width = g.width - 72.0;

        // Brand block, top left
        text_at(&mut c, BOLD, 11.0, BRAND, 36.0, g.height - 52.0, "MOKSHYA");
        text_at(&mut c, REGULAR, 8.0, ACCENT, 36.0, g.height - 64.0, "RISK OS");

        let mut y = g.height * 0.58;

        // Badge pill
        let badge = text.badge.to_uppercase();
        let badge_width = text_width(&badge, true, 9.0) + 24.0;
        c.set_fill_rgb(BRAND.0, BRAND.1, BRAND.2);
        c.rect((g.width - badge_width) / 2.0, y - 6.0, badge_width, 20.0);
        c.fill_nonzero();
        centered(&mut c, &g, BOLD, 9.0, WHITE, y, &badge);
        y -= 48.0;

        let size = fit_size(&text.title, true, 26.0, max_width);
        centered(&mut c, &g, BOLD, size, BRAND, y, &text.title);
        y -= 30.0;
        let size = fit_size(&text.subtitle, false, 13.0, max_width);
        centered(&mut c, &g, REGULAR, size, ACCENT, y, &text.subtitle);
        y -= 64.0;

        centered(&mut c, &g, BOLD, 8.0, ACCENT, y, "ORGANIZATION");
        y -= 22.0;
        let size = fit_size(&text.organization, true, 16.0, max_width);
        centered(&mut c, &g, BOLD, size, BRAND, y, &text.organization);
        y -= 40.0;
        centered(&mut c, &g, BOLD, 8.0, ACCENT, y, "REPORT GENERATED");
        y -= 20.0;
        centered(&mut c, &g, BOLD, 13.0, BRAND, y, &text.generated);
        y -= 56.0;
        centered(&mut c, &g, BOLD, 8.0, MUTED, y, &text.notice.to_uppercase());

        text_at(&mut c, REGULAR, 8.0, FAINT, 36.0, 36.0, &text.footer);
        let generated = format!("Generated: {}", text.generated);
        let right = g.width - 36.0 - text_width(&generated, false, 8.0);
        text_at(&mut c, REGULAR, 8.0, FAINT, right, 36.0, &generated);

        self.write_page(c, &[]);
    }

    fn write_page(&mut self, content: Content, xobjects: &[(String, Ref)]) {
        let page_id = self.alloc();
        let content_id = self.alloc();

        let raw = content.finish();
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(raw.as_slice(), 6);
        self.pdf
            .stream(content_id, &compressed)
            .filter(Filter::FlateDecode);

        let (width, height) = (self.geometry.width, self.geometry.height);
        let mut page = self.pdf.page(page_id);
        page.media_box(Rect::new(0.0, 0.0, width, height))
            .parent(self.pages_id)
            .contents(content_id);
        let mut resources = page.resources();
        {
            let mut fonts = resources.fonts();
            fonts.pair(REGULAR, self.regular_id);
            fonts.pair(BOLD, self.bold_id);
        }
        if !xobjects.is_empty() {
            let mut dict = resources.x_objects();
            for (name, id) in xobjects {
                dict.pair(Name(name.as_bytes()), *id);
            }
        }
        drop(resources);
        drop(page);

        self.page_ids.push(page_id);
    }

    fn finish(mut self, title: &str) -> Vec<u8> {
        let info_id = self.alloc();
        self.pdf.catalog(self.catalog_id).pages(self.pages_id);
        self.pdf
            .pages(self.pages_id)
            .kids(self.page_ids.iter().copied())
            .count(self.page_ids.len() as i32);
        self.pdf
            .document_info(info_id)
            .title(TextStr(title))
            .producer(TextStr("riskos-export"));
        self.pdf.finish()
    }
}

fn text_at(c: &mut Content, font: Name, size: f32, color: Rgb, x: f32, y: f32, text: &str) {
    let bytes = win_ansi(text);
    c.begin_text();
    c.set_fill_rgb(color.0, color.1, color.2);
    c.set_font(font, size);
    c.next_line(x, y);
    c.show(Str(&bytes));
    c.end_text();
}

fn centered(c: &mut Content, g: &PageGeometry, font: Name, size: f32, color: Rgb, y: f32, text: &str) {
    let width = text_width(text, font == BOLD, size);
    text_at(c, font, size, color, (g.width - width) / 2.0, y, text);
}

/// Largest size up to `max_size` at which `text` fits in `max_width`.
fn fit_size(text: &str, bold: bool, max_size: f32, max_width: f32) -> f32 {
    let at_one = text_width(text, bold, 1.0);
    if at_one <= 0.0 {
        return max_size;
    }
    max_size.min(max_width / at_one)
}

/// Advance width in points of `text` set in Helvetica.
pub(crate) fn text_width(text: &str, bold: bool, size: f32) -> f32 {
    let table = if bold { &HELVETICA_BOLD } else { &HELVETICA };
    let units: u32 = text
        .chars()
        .map(|ch| match ch as u32 {
            code @ 32..=126 => table[(code - 32) as usize] as u32,
            _ => 556,
        })
        .sum();
    units as f32 * size / 1000.0
}

/// Encode for the base-14 fonts' WinAnsi encoding; unmappable chars become `?`.
pub(crate) fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch {
            '\u{20}'..='\u{7e}' | '\u{a0}'..='\u{ff}' => ch as u8,
            '\u{20ac}' => 0x80,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201c}' => 0x93,
            '\u{201d}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            _ => b'?',
        })
        .collect()
}

// AFM advance widths for codes 32..=126
#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helvetica_widths() {
        // "Hi" = H(722) + i(222)
        assert!((text_width("Hi", false, 10.0) - 9.44).abs() < 1e-4);
        assert!(text_width("Hi", true, 10.0) > text_width("Hi", false, 10.0));
    }

    #[test]
    fn long_titles_shrink_to_fit() {
        let title = "Chief Information Security Officer Report";
        // about 507pt at 26pt bold
        assert_eq!(fit_size(title, true, 26.0, 540.0), 26.0);

        let size = fit_size(title, true, 26.0, 300.0);
        assert!(size < 26.0 && size > 10.0);
        assert!(text_width(title, true, size) <= 300.0 + 1e-3);
        assert!((text_width(title, true, size) - 300.0).abs() < 1e-2);
        assert_eq!(fit_size("CRO", true, 26.0, 300.0), 26.0);
    }

    #[test]
    fn win_ansi_maps_latin1_and_punctuation() {
        assert_eq!(win_ansi("\u{a9} 2025"), vec![0xA9, b' ', b'2', b'0', b'2', b'5']);
        assert_eq!(win_ansi("a\u{2014}b"), vec![b'a', 0x97, b'b']);
        assert_eq!(win_ansi("\u{4e2d}"), vec![b'?']);
    }
}
