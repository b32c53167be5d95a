//! Perceptual color normalization
//!
//! Tailwind-era stylesheets emit `oklch(...)` and `oklab(...)` colors in computed
//! styles. Frozen snapshot styles are rewritten to plain `rgb()`/`rgba()` so the
//! captured markup renders identically in any rasterizer.

use palette::{Clamp, FromColor, Oklab, Oklch, Srgb};

/// Returned when a perceptual color function cannot be parsed.
pub const FALLBACK_COLOR: &str = "rgb(0, 0, 0)";

/// Percentage reference for chroma and the a/b axes (100% == 0.4).
const CHROMA_PERCENT_REF: f32 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Space {
    Oklch,
    Oklab,
}

impl Space {
    fn prefix(self) -> &'static str {
        match self {
            Space::Oklch => "oklch(",
            Space::Oklab => "oklab(",
        }
    }
}

/// Whether `value` contains a color function that needs rewriting.
pub fn needs_normalization(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    lower.contains("oklch") || lower.contains("oklab")
}

fn is_sentinel(value: &str) -> bool {
    matches!(
        value,
        "" | "transparent" | "none" | "rgba(0, 0, 0, 0)" | "rgba(0,0,0,0)"
    )
}

/// Rewrite every `oklch(...)`/`oklab(...)` occurrence in `value` into sRGB.
///
/// Values without a perceptual marker, and the sentinels `transparent`,
/// `none` and fully transparent black, come back unchanged. Composite values
/// (gradients, shadows) keep their surrounding text. A function that fails to
/// parse is replaced with opaque black.
pub fn normalize_color(value: &str) -> String {
    if is_sentinel(value.trim()) || !needs_normalization(value) {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some((start, space)) = find_function(rest) {
        out.push_str(&rest[..start]);
        let call = &rest[start..];
        match split_call(call, space) {
            Some((args, consumed)) => {
                let converted = convert(space, args).unwrap_or_else(|| FALLBACK_COLOR.to_string());
                out.push_str(&converted);
                rest = &call[consumed..];
            }
            None => {
                // unterminated call swallows the remainder
                out.push_str(FALLBACK_COLOR);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn find_function(haystack: &str) -> Option<(usize, Space)> {
    // ASCII lowering keeps byte offsets aligned with the original
    let lower = haystack.to_ascii_lowercase();
    [Space::Oklch, Space::Oklab]
        .into_iter()
        .filter_map(|space| lower.find(space.prefix()).map(|idx| (idx, space)))
        .min_by_key(|(idx, _)| *idx)
}

/// Returns the argument text and the number of bytes the call spans.
fn split_call(call: &str, space: Space) -> Option<(&str, usize)> {
    let open = space.prefix().len();
    let mut depth = 1usize;
    for (offset, ch) in call[open..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    let end = open + offset;
                    return Some((&call[open..end], end + 1));
                }
            }
            _ => {}
        }
    }
    None
}

fn convert(space: Space, args: &str) -> Option<String> {
    let (channels, alpha) = match args.split_once('/') {
        Some((channels, alpha)) => (channels, Some(alpha.trim())),
        None => (args, None),
    };
    let channels = channels.replace(',', " ");
    let parts: Vec<&str> = channels.split_whitespace().collect();
    if parts.len() != 3 {
        return None;
    }

    let lightness = parse_number_or_percent(parts[0], 1.0)?.clamp(0.0, 1.0);
    let srgb: Srgb<f32> = match space {
        Space::Oklch => {
            let chroma = parse_number_or_percent(parts[1], CHROMA_PERCENT_REF)?.max(0.0);
            let hue = parse_hue(parts[2])?;
            Srgb::from_color(Oklch::new(lightness, chroma, hue))
        }
        Space::Oklab => {
            let a = parse_number_or_percent(parts[1], CHROMA_PERCENT_REF)?;
            let b = parse_number_or_percent(parts[2], CHROMA_PERCENT_REF)?;
            Srgb::from_color(Oklab::new(lightness, a, b))
        }
    };
    let rgb: Srgb<u8> = srgb.clamp().into_format();

    let alpha = match alpha {
        Some(raw) => parse_number_or_percent(raw, 1.0)?.clamp(0.0, 1.0),
        None => 1.0,
    };

    if alpha >= 1.0 {
        Some(format!("rgb({}, {}, {})", rgb.red, rgb.green, rgb.blue))
    } else {
        let alpha = (alpha * 1000.0).round() / 1000.0;
        Some(format!(
            "rgba({}, {}, {}, {})",
            rgb.red, rgb.green, rgb.blue, alpha
        ))
    }
}

/// `percent_ref` is the value that `100%` maps to.
fn parse_number_or_percent(token: &str, percent_ref: f32) -> Option<f32> {
    if token.eq_ignore_ascii_case("none") {
        return Some(0.0);
    }
    let value = match token.strip_suffix('%') {
        Some(pct) => pct.trim().parse::<f32>().ok()? / 100.0 * percent_ref,
        None => token.parse::<f32>().ok()?,
    };
    value.is_finite().then_some(value)
}

fn parse_hue(token: &str) -> Option<f32> {
    if token.eq_ignore_ascii_case("none") {
        return Some(0.0);
    }
    let lower = token.to_ascii_lowercase();
    let degrees = if let Some(v) = lower.strip_suffix("grad") {
        v.parse::<f32>().ok()? * 0.9
    } else if let Some(v) = lower.strip_suffix("deg") {
        v.parse::<f32>().ok()?
    } else if let Some(v) = lower.strip_suffix("rad") {
        v.parse::<f32>().ok()?.to_degrees()
    } else if let Some(v) = lower.strip_suffix("turn") {
        v.parse::<f32>().ok()? * 360.0
    } else {
        lower.parse::<f32>().ok()?
    };
    degrees.is_finite().then_some(degrees)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channels(rgb: &str) -> Vec<f32> {
        rgb.trim_start_matches("rgba(")
            .trim_start_matches("rgb(")
            .trim_end_matches(')')
            .split(',')
            .map(|c| c.trim().parse::<f32>().unwrap())
            .collect()
    }

    #[test]
    fn passes_through_supported_values() {
        for value in ["rgb(1, 2, 3)", "#ffffff", "red", "rgba(10, 20, 30, 0.5)", "12px"] {
            assert_eq!(normalize_color(value), value);
        }
    }

    #[test]
    fn passes_through_sentinels() {
        for value in ["transparent", "none", "rgba(0, 0, 0, 0)", ""] {
            assert_eq!(normalize_color(value), value);
        }
    }

    #[test]
    fn converts_oklch_extremes() {
        assert_eq!(normalize_color("oklch(1 0 0)"), "rgb(255, 255, 255)");
        assert_eq!(normalize_color("oklch(0 0 0)"), "rgb(0, 0, 0)");
        assert_eq!(normalize_color("oklch(100% 0 0)"), "rgb(255, 255, 255)");
    }

    #[test]
    fn converts_oklab_red() {
        let out = normalize_color("oklab(0.627955 0.224863 0.125846)");
        let c = channels(&out);
        assert!(c[0] >= 253.0 && c[1] <= 2.0 && c[2] <= 2.0, "{}", out);
    }

    #[test]
    fn converts_oklch_with_units() {
        let out = normalize_color("oklch(62.8% 0.2577 29.23deg)");
        let c = channels(&out);
        assert!(c[0] >= 253.0 && c[1] <= 3.0 && c[2] <= 3.0, "{}", out);

        let turns = normalize_color("oklch(62.8% 0.2577 0.0812turn)");
        assert_eq!(channels(&turns)[0], c[0]);
    }

    #[test]
    fn keeps_alpha() {
        assert_eq!(
            normalize_color("oklch(1 0 0 / 50%)"),
            "rgba(255, 255, 255, 0.5)"
        );
        assert_eq!(normalize_color("oklch(0 0 0 / 1)"), "rgb(0, 0, 0)");
    }

    #[test]
    fn rewrites_functions_inside_composite_values() {
        assert_eq!(
            normalize_color("0px 1px 2px 0px oklch(0 0 0 / 0.05)"),
            "0px 1px 2px 0px rgba(0, 0, 0, 0.05)"
        );
        assert_eq!(
            normalize_color("linear-gradient(oklch(1 0 0), oklab(0 0 0))"),
            "linear-gradient(rgb(255, 255, 255), rgb(0, 0, 0))"
        );
    }

    #[test]
    fn unparseable_values_fall_back_to_black() {
        assert_eq!(normalize_color("oklch(banana)"), FALLBACK_COLOR);
        assert_eq!(normalize_color("oklch(0.5 0.1"), FALLBACK_COLOR);
        assert_eq!(normalize_color("oklab(a b c)"), FALLBACK_COLOR);
    }
}
