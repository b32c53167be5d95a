//! PDF and Word serialization of packed documents

use std::io::{Cursor, Read};

use chrono::NaiveDate;
use riskos_export::document::{
    Cover, DocumentEmitter, ExportFormat, PdfEmitter, ReportDocument, ReportMeta, ReportType,
    Section, WordEmitter,
};
use riskos_export::rendering::{PackingRules, PageGeometry, Raster};

fn raster(width: u32, height: u32) -> Raster {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([30, 58, 95, 255]));
    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();
    Raster::from_png(png).unwrap()
}

fn section(height: u32) -> Section {
    Section {
        raster: raster(1632, height),
        full_page: false,
    }
}

fn meta() -> ReportMeta {
    ReportMeta::new(ReportType::Board, "Globex & Partners")
        .with_date(NaiveDate::from_ymd_opt(2024, 11, 30).unwrap())
}

/// Cover, a shared page for two short sections, then one tall section.
fn dashboard(cover: Cover) -> ReportDocument {
    ReportDocument::packed(
        &meta(),
        cover,
        vec![section(400), section(500), section(3000)],
        &PageGeometry::default(),
        &PackingRules::default(),
    )
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn count(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

fn part(docx: &[u8], name: &str) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(docx)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut text = String::new();
    file.read_to_string(&mut text).unwrap();
    text
}

#[test]
fn packed_document_counts_the_cover() {
    let doc = dashboard(Cover::Typeset(meta()));
    assert_eq!(doc.pages().len(), 2);
    assert_eq!(doc.page_count(), 3);
    assert_eq!(doc.title(), "Board of Directors Report");
}

#[test]
fn pdf_has_one_page_per_plan_plus_cover() {
    let doc = dashboard(Cover::Captured(raster(1632, 2112)));
    let bytes = PdfEmitter::default().emit(&doc).unwrap();

    assert!(bytes.starts_with(b"%PDF-"));
    assert!(contains(&bytes, b"/Count 3"));
    assert_eq!(count(&bytes, b"/MediaBox"), 3);
    // cover plus three sections, all JPEG
    assert_eq!(count(&bytes, b"/DCTDecode"), 4);
    assert!(contains(&bytes, b"(Board of Directors Report)"));
}

#[test]
fn pdf_typeset_cover_needs_no_images() {
    let doc = ReportDocument::packed(
        &meta(),
        Cover::Typeset(meta()),
        Vec::new(),
        &PageGeometry::default(),
        &PackingRules::default(),
    );
    let bytes = PdfEmitter::new(80).emit(&doc).unwrap();
    assert!(contains(&bytes, b"/Count 1"));
    assert!(!contains(&bytes, b"/DCTDecode"));
    assert!(contains(&bytes, b"/Helvetica-Bold"));
}

#[test]
fn docx_package_has_every_part() {
    let doc = dashboard(Cover::Captured(raster(1632, 2112)));
    let bytes = WordEmitter::new().emit(&doc).unwrap();

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "[Content_Types].xml",
            "_rels/.rels",
            "docProps/core.xml",
            "word/_rels/document.xml.rels",
            "word/document.xml",
            "word/media/image1.png",
            "word/media/image2.png",
            "word/media/image3.png",
            "word/media/image4.png",
        ]
    );
    let media = archive.by_name("word/media/image2.png").unwrap();
    assert_eq!(media.compression(), zip::CompressionMethod::Stored);
}

#[test]
fn docx_breaks_before_each_packed_page() {
    let doc = dashboard(Cover::Captured(raster(1632, 2112)));
    let bytes = WordEmitter::new().emit(&doc).unwrap();
    let document = part(&bytes, "word/document.xml");

    // two packed pages after the cover, three pictures on them
    assert_eq!(document.matches("<w:pageBreakBefore/>").count(), 2);
    assert_eq!(document.matches("<w:drawing>").count(), 4);
    assert!(document.contains(r#"<w:pgSz w:w="12240" w:h="15840"/>"#));
    assert!(document.contains(r#"r:embed="rIdImg4""#));

    let core = part(&bytes, "docProps/core.xml");
    assert!(core.contains("<dc:title>Board of Directors Report</dc:title>"));
}

#[test]
fn docx_typeset_cover_escapes_text() {
    let doc = dashboard(Cover::Typeset(meta()));
    let bytes = WordEmitter::new().emit(&doc).unwrap();
    let document = part(&bytes, "word/document.xml");

    assert!(document.contains("BOARD Report"));
    assert!(document.contains("Globex &amp; Partners"));
    assert!(document.contains("November 30, 2024"));
    // the text cover counts as body content, so the first picture breaks too
    assert_eq!(document.matches("<w:pageBreakBefore/>").count(), 2);
}

#[test]
fn full_bleed_pages_fill_the_width() {
    let doc = ReportDocument::full_bleed(
        "Risk Assessment Report",
        vec![section(2112), section(4000)],
        &PageGeometry::default(),
    );
    assert!(doc.cover().is_none());
    assert_eq!(doc.page_count(), 2);

    let first = doc.pages()[0].placements[0];
    assert_eq!((first.x, first.y, first.width), (0.0, 0.0, 612.0));
    assert!((first.height - 792.0).abs() < 1e-3);

    // too tall for the page: shrunk and centered horizontally
    let second = doc.pages()[1].placements[0];
    assert!((second.height - 792.0).abs() < 1e-3);
    assert!(second.width < 612.0);
    assert!((second.x - (612.0 - second.width) / 2.0).abs() < 1e-3);

    assert_eq!(WordEmitter::new().format(), ExportFormat::Docx);
    let bytes = PdfEmitter::default().emit(&doc).unwrap();
    assert!(contains(&bytes, b"/Count 2"));
}

#[test]
fn save_writes_into_a_new_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("reports").join("2024");
    let doc = dashboard(Cover::Typeset(meta()));

    let path = doc
        .save(&WordEmitter::new(), &dir, "BOARD-Report-Globex.docx")
        .unwrap();
    assert_eq!(path, dir.join("BOARD-Report-Globex.docx"));
    let bytes = std::fs::read(path).unwrap();
    assert_eq!(&bytes[..2], b"PK");
}

#[test]
fn saved_extension_follows_the_emitter() {
    let tmp = tempfile::tempdir().unwrap();
    let doc = || dashboard(Cover::Typeset(meta()));

    let pdf = doc()
        .save(&PdfEmitter::default(), tmp.path(), "board-report.docx")
        .unwrap();
    assert_eq!(pdf, tmp.path().join("board-report.pdf"));
    assert!(std::fs::read(&pdf).unwrap().starts_with(b"%PDF"));

    let docx = doc()
        .save(&WordEmitter::new(), tmp.path(), "board-report")
        .unwrap();
    assert_eq!(docx, tmp.path().join("board-report.docx"));
}
