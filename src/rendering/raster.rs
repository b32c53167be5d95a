//! PNG inspection and JPEG re-encoding for captured rasters

use crate::Result;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, ImageReader};
use std::io::Cursor;

/// Read the pixel size from PNG bytes without decoding the pixel data.
pub fn png_dimensions(png: &[u8]) -> Result<(u32, u32)> {
    let reader = ImageReader::with_format(Cursor::new(png), ImageFormat::Png);
    Ok(reader.into_dimensions()?)
}

/// Re-encode PNG bytes as an RGB JPEG at `quality` (1-100).
///
/// Transparent pixels are flattened onto white, the same background the
/// capture container uses.
pub fn png_to_jpeg(png: &[u8], quality: u8) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory_with_format(png, ImageFormat::Png)?;
    let rgba = decoded.to_rgba8();
    let mut rgb = image::RgbImage::new(rgba.width(), rgba.height());
    for (dst, src) in rgb.pixels_mut().zip(rgba.pixels()) {
        let [r, g, b, a] = src.0;
        let alpha = a as u16;
        let over_white = |c: u8| ((c as u16 * alpha + 255 * (255 - alpha)) / 255) as u8;
        dst.0 = [over_white(r), over_white(g), over_white(b)];
    }

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)).encode_image(&rgb)?;
    Ok(out)
}

#[cfg(test)]
pub(crate) fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .expect("encode png");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_png_dimensions() {
        let png = solid_png(32, 12, [0, 0, 0, 255]);
        assert_eq!(png_dimensions(&png).unwrap(), (32, 12));
    }

    #[test]
    fn rejects_non_png_bytes() {
        assert!(png_dimensions(b"not an image").is_err());
    }

    #[test]
    fn jpeg_flattens_transparency_onto_white() {
        let png = solid_png(8, 8, [0, 0, 0, 0]);
        let jpeg = png_to_jpeg(&png, 90).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let back = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg)
            .unwrap()
            .to_rgb8();
        assert!(back.pixels().all(|p| p.0.iter().all(|c| *c > 245)));
    }

    #[test]
    fn raster_rejects_garbage() {
        assert!(crate::rendering::Raster::from_png(vec![1, 2, 3]).is_err());
    }
}
