//! Rasterized sections and their placement on document pages

pub mod layout;
pub mod raster;

pub use layout::{pack, PackingRules, PageGeometry, PagePlan, Placement, SectionBox};

/// A rasterized capture of one DOM subtree.
///
/// Rasters are immutable once built; dimensions always come from the decoded
/// PNG header, never from the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    width: u32,
    height: u32,
    png_data: Vec<u8>,
}

impl Raster {
    /// Wrap PNG bytes, reading the pixel size from the image itself.
    pub fn from_png(png_data: Vec<u8>) -> crate::Result<Self> {
        let (width, height) = raster::png_dimensions(&png_data)?;
        if width == 0 || height == 0 {
            return Err(crate::Error::Capture(format!(
                "rasterizer returned an empty {}x{} image",
                width, height
            )));
        }
        Ok(Self {
            width,
            height,
            png_data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn png_data(&self) -> &[u8] {
        &self.png_data
    }

    /// Height in points when the raster is drawn `width_pt` wide.
    pub fn height_at(&self, width_pt: f32) -> f32 {
        self.height as f32 * width_pt / self.width as f32
    }
}
