//! Page packing for captured report sections.
//!
//! Sections are walked two at a time in capture order. A pair shares a page
//! only when neither is oversized, full-page or "large", and the stacked block
//! still fits the usable height. Everything else goes on a page of its own.
//! All coordinates are points with a top-left origin.

use serde::{Deserialize, Serialize};

/// Physical page size and edge padding, in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub padding: f32,
}

impl Default for PageGeometry {
    /// US Letter with 30pt padding
    fn default() -> Self {
        Self {
            width: 612.0,
            height: 792.0,
            padding: 30.0,
        }
    }
}

impl PageGeometry {
    pub fn usable_height(&self) -> f32 {
        self.height - self.padding * 2.0
    }

    /// Width every section is laid out at before any scaling.
    pub fn content_width(&self) -> f32 {
        self.width - self.padding * 2.0
    }
}

/// Tunables for the pairing heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackingRules {
    /// Gap between paired sections, as a multiple of the page padding.
    pub gap_factor: f32,
    /// Sections taller than this fraction of the usable height are never paired.
    pub pair_threshold: f32,
    /// Upper bound for scaling a pair up to fill slack.
    pub scale_up_cap: f32,
    /// A pair is only scaled up when the achievable factor exceeds this.
    pub scale_up_min: f32,
}

impl Default for PackingRules {
    fn default() -> Self {
        Self {
            gap_factor: 1.5,
            pair_threshold: 0.45,
            scale_up_cap: 1.15,
            scale_up_min: 1.05,
        }
    }
}

/// Size of one captured section once mapped onto the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionBox {
    pub width: f32,
    pub height: f32,
    pub full_page: bool,
}

impl SectionBox {
    /// Map a pixel capture onto the page's content width.
    pub fn from_pixels(width_px: u32, height_px: u32, geometry: &PageGeometry, full_page: bool) -> Self {
        let width = geometry.content_width();
        let height = if width_px == 0 {
            0.0
        } else {
            height_px as f32 * width / width_px as f32
        };
        Self {
            width,
            height,
            full_page,
        }
    }
}

/// Where one section lands on a page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Index into the packed section list
    pub section: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub scale: f32,
}

/// One output page and the sections drawn on it, top to bottom.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PagePlan {
    pub placements: Vec<Placement>,
}

impl PagePlan {
    pub fn section_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.placements.iter().map(|p| p.section)
    }
}

/// Pack `sections` onto pages.
pub fn pack(sections: &[SectionBox], geometry: &PageGeometry, rules: &PackingRules) -> Vec<PagePlan> {
    let packer = Packer { geometry, rules };
    let mut pages = Vec::new();

    for (pair_idx, pair) in sections.chunks(2).enumerate() {
        let first = pair_idx * 2;
        match pair {
            [a, b] => packer.place_pair(first, a, b, &mut pages),
            [a] => pages.push(packer.alone(first, a)),
            _ => unreachable!("chunks(2) yields one or two items"),
        }
    }

    pages
}

struct Packer<'a> {
    geometry: &'a PageGeometry,
    rules: &'a PackingRules,
}

impl Packer<'_> {
    fn usable(&self) -> f32 {
        self.geometry.usable_height()
    }

    fn gap(&self) -> f32 {
        self.geometry.padding * self.rules.gap_factor
    }

    fn place_pair(&self, first: usize, a: &SectionBox, b: &SectionBox, pages: &mut Vec<PagePlan>) {
        let usable = self.usable();
        let oversized = a.height > usable || b.height > usable;
        let large_limit = usable * self.rules.pair_threshold;
        let keep_apart = a.full_page || b.full_page || a.height > large_limit || b.height > large_limit;

        if oversized || keep_apart {
            pages.push(self.alone(first, a));
            pages.push(self.alone(first + 1, b));
            return;
        }

        let gap = self.gap();
        let total = a.height + b.height + gap;
        if total > usable {
            pages.push(self.alone(first, a));
            pages.push(self.alone(first + 1, b));
            return;
        }

        let widest = a.width.max(b.width);
        let mut scale = self.rules.scale_up_cap.min(usable / total);
        if widest > 0.0 {
            scale = scale.min(self.geometry.width / widest);
        }
        if scale <= self.rules.scale_up_min {
            scale = 1.0;
        }

        let h1 = a.height * scale;
        let h2 = b.height * scale;
        let block = h1 + h2 + gap;
        let top = (self.geometry.height - block) / 2.0;

        pages.push(PagePlan {
            placements: vec![
                self.placement(first, a, scale, top),
                self.placement(first + 1, b, scale, top + h1 + gap),
            ],
        });
    }

    /// A section on a page of its own, shrunk if it cannot fit.
    fn alone(&self, index: usize, section: &SectionBox) -> PagePlan {
        let usable = self.usable();
        let scale = if section.height > usable {
            usable / section.height
        } else {
            1.0
        };
        let top = (self.geometry.height - section.height * scale) / 2.0;
        PagePlan {
            placements: vec![self.placement(index, section, scale, top)],
        }
    }

    fn placement(&self, index: usize, section: &SectionBox, scale: f32, y: f32) -> Placement {
        let width = section.width * scale;
        Placement {
            section: index,
            x: (self.geometry.width - width) / 2.0,
            y,
            width,
            height: section.height * scale,
            scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(height: f32) -> SectionBox {
        SectionBox {
            width: 552.0,
            height,
            full_page: false,
        }
    }

    #[test]
    fn empty_input_yields_no_pages() {
        assert!(pack(&[], &PageGeometry::default(), &PackingRules::default()).is_empty());
    }

    #[test]
    fn single_section_is_centered_unscaled() {
        let pages = pack(&[section(200.0)], &PageGeometry::default(), &PackingRules::default());
        assert_eq!(pages.len(), 1);
        let p = pages[0].placements[0];
        assert_eq!(p.scale, 1.0);
        assert_eq!(p.x, 30.0);
        assert_eq!(p.y, 296.0);
    }

    #[test]
    fn oversized_partner_splits_the_pair() {
        let pages = pack(
            &[section(100.0), section(1000.0)],
            &PageGeometry::default(),
            &PackingRules::default(),
        );
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].placements[0].scale, 1.0);
        let tall = pages[1].placements[0];
        assert!((tall.height - 732.0).abs() < 1e-3);
        assert!((tall.y - 30.0).abs() < 1e-3);
    }

    #[test]
    fn large_sections_are_not_paired() {
        // 0.45 * 732 = 329.4
        let pages = pack(
            &[section(330.0), section(100.0)],
            &PageGeometry::default(),
            &PackingRules::default(),
        );
        assert_eq!(pages.len(), 2);
    }

    #[test]
    fn small_slack_keeps_pair_unscaled() {
        // 329 + 329 + 45 = 703; 732 / 703 = 1.041, below the 1.05 trigger
        let pages = pack(
            &[section(329.0), section(329.0)],
            &PageGeometry::default(),
            &PackingRules::default(),
        );
        assert_eq!(pages.len(), 1);
        let [a, b] = [pages[0].placements[0], pages[0].placements[1]];
        assert_eq!(a.scale, 1.0);
        assert_eq!(a.x, 30.0);
        assert!((a.y - (792.0 - 703.0) / 2.0).abs() < 1e-3);
        assert!((b.y - (a.y + 329.0 + 45.0)).abs() < 1e-3);
    }

    #[test]
    fn scale_up_never_exceeds_page_width() {
        let pages = pack(
            &[section(100.0), section(100.0)],
            &PageGeometry::default(),
            &PackingRules::default(),
        );
        let p = pages[0].placements[0];
        assert!(p.width <= 612.0 + 1e-3);
        assert!(p.x >= -1e-3);
    }
}
