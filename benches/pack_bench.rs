use criterion::{black_box, criterion_group, criterion_main, Criterion};
use riskos_export::config::ExportConfig;
use riskos_export::rendering::{pack, SectionBox};

// Heights cycling through small, pairable, large and oversized sections
fn sections(n: usize) -> Vec<SectionBox> {
    const HEIGHTS: [f32; 7] = [120.0, 310.0, 45.0, 560.0, 980.0, 200.0, 733.0];
    (0..n)
        .map(|i| SectionBox {
            width: 552.0,
            height: HEIGHTS[i % HEIGHTS.len()],
            full_page: i % 13 == 12,
        })
        .collect()
}

fn bench_pack(c: &mut Criterion) {
    let cfg = ExportConfig::default();

    let dashboard = sections(12);
    c.bench_function("pack_dashboard_12", |b| {
        b.iter(|| pack(black_box(&dashboard), &cfg.page, &cfg.packing))
    });

    let long = sections(2000);
    c.bench_function("pack_sections_2000", |b| {
        b.iter(|| pack(black_box(&long), &cfg.page, &cfg.packing))
    });
}

fn bench_emit_pdf(c: &mut Criterion) {
    use riskos_export::document::{
        Cover, DocumentEmitter, PdfEmitter, ReportDocument, ReportMeta, ReportType, Section,
    };
    use riskos_export::rendering::Raster;

    let img = image::RgbaImage::from_pixel(1632, 600, image::Rgba([245, 247, 250, 255]));
    let mut png = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .expect("encode png");
    let raster = Raster::from_png(png).expect("decode png");

    let cfg = ExportConfig::default();
    let meta = ReportMeta::new(ReportType::Board, "Bench Corp");
    let sections = (0..6)
        .map(|_| Section {
            raster: raster.clone(),
            full_page: false,
        })
        .collect();
    let doc = ReportDocument::packed(&meta, Cover::Typeset(meta.clone()), sections, &cfg.page, &cfg.packing);
    let emitter = PdfEmitter::default();

    c.bench_function("emit_pdf_6_sections", |b| {
        b.iter(|| emitter.emit(black_box(&doc)).unwrap())
    });
}

criterion_group!(benches, bench_pack, bench_emit_pdf);
criterion_main!(benches);
