//! Pixel diff engine seam.
//!
//! The similarity metric is a black box behind [`PixelDiffEngine`]: it takes
//! two RGBA buffers plus [`DiffFlags`] and returns a mismatch percentage, a
//! diff bounding rectangle and the list of mismatched pixels.
//! [`ToleranceDiffEngine`] is a per-channel tolerance engine that ships so
//! the crate works without an external diff library.

use crate::geometry::BoundingBox;
use crate::result::VisregResult;
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// One mismatched pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DiffPixel {
    /// Column
    pub x: u32,
    /// Row
    pub y: u32,
}

impl DiffPixel {
    /// Create a new diff pixel
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Comparison sensitivity flags handed to the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiffFlags {
    /// Do not compare the alpha channel
    pub ignore_alpha: bool,
    /// Treat anti-aliased edges as equal
    pub ignore_antialiasing: bool,
    /// Compare brightness only
    pub ignore_colors: bool,
    /// Tolerant comparison (16 levels per channel)
    pub ignore_less: bool,
    /// Strict comparison, every channel difference counts
    pub ignore_nothing: bool,
}

impl DiffFlags {
    /// Strict flags
    #[must_use]
    pub fn strict() -> Self {
        Self {
            ignore_nothing: true,
            ..Self::default()
        }
    }

    /// Tolerances these flags resolve to. `ignore_nothing` wins over every
    /// other flag.
    #[must_use]
    pub fn tolerance(&self) -> Tolerance {
        if self.ignore_nothing {
            Tolerance::STRICT
        } else if self.ignore_antialiasing {
            Tolerance::ANTIALIASING
        } else {
            Tolerance::LESS
        }
    }

    /// True when no flag deviates from the default tolerant mode
    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Per-channel and brightness tolerances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tolerance {
    /// Max per-channel RGB difference
    pub color: u8,
    /// Max alpha difference
    pub alpha: u8,
    /// Max brightness difference for brightness-only comparison
    pub min_brightness: u8,
    /// Brightness contrast that marks an edge for anti-aliasing detection
    pub max_brightness: u8,
}

impl Tolerance {
    /// Every difference counts
    pub const STRICT: Self = Self {
        color: 0,
        alpha: 0,
        min_brightness: 0,
        max_brightness: 255,
    };

    /// Default tolerant mode
    pub const LESS: Self = Self {
        color: 16,
        alpha: 16,
        min_brightness: 16,
        max_brightness: 240,
    };

    /// Anti-aliasing tolerant mode
    pub const ANTIALIASING: Self = Self {
        color: 32,
        alpha: 32,
        min_brightness: 64,
        max_brightness: 96,
    };
}

/// Engine output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffOutput {
    /// Mismatched pixels as a percentage of compared pixels, 0..=100
    pub raw_mismatch_percentage: f64,
    /// Box around every mismatched pixel
    pub diff_bounds: Option<BoundingBox>,
    /// Every mismatched pixel, row-major
    pub diff_pixels: Vec<DiffPixel>,
}

impl DiffOutput {
    /// Output for identical images
    #[must_use]
    pub fn identical() -> Self {
        Self::default()
    }
}

/// External pixel comparison
pub trait PixelDiffEngine: Send + Sync {
    /// Compare two images. Size differences are the engine's concern.
    fn compare(
        &self,
        actual: &RgbaImage,
        baseline: &RgbaImage,
        flags: &DiffFlags,
    ) -> VisregResult<DiffOutput>;
}

/// Tolerance-based engine.
///
/// Images of different size are compared on the union canvas; pixels that
/// exist in only one image always count as mismatched.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToleranceDiffEngine;

impl ToleranceDiffEngine {
    /// Create a new engine
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn pixels_match(
        actual: &RgbaImage,
        baseline: &RgbaImage,
        x: u32,
        y: u32,
        flags: &DiffFlags,
        tol: Tolerance,
    ) -> bool {
        let a = *actual.get_pixel(x, y);
        let b = *baseline.get_pixel(x, y);

        if flags.ignore_colors && !flags.ignore_nothing {
            let alpha_ok = flags.ignore_alpha || channel_diff(a[3], b[3]) <= tol.alpha;
            return alpha_ok
                && (brightness(a) - brightness(b)).abs() <= f64::from(tol.min_brightness);
        }
        if is_similar(a, b, tol, flags.ignore_alpha) {
            return true;
        }
        flags.ignore_antialiasing
            && !flags.ignore_nothing
            && (is_antialiased(actual, x, y, b, tol, flags.ignore_alpha)
                || is_antialiased(baseline, x, y, a, tol, flags.ignore_alpha))
    }
}

impl PixelDiffEngine for ToleranceDiffEngine {
    fn compare(
        &self,
        actual: &RgbaImage,
        baseline: &RgbaImage,
        flags: &DiffFlags,
    ) -> VisregResult<DiffOutput> {
        let width = actual.width().max(baseline.width());
        let height = actual.height().max(baseline.height());
        let total = u64::from(width) * u64::from(height);
        if total == 0 {
            return Ok(DiffOutput::identical());
        }

        let tol = flags.tolerance();
        let mut diff_pixels = Vec::new();
        let mut bounds: Option<BoundingBox> = None;

        for y in 0..height {
            for x in 0..width {
                let in_both = x < actual.width()
                    && y < actual.height()
                    && x < baseline.width()
                    && y < baseline.height();
                if in_both && Self::pixels_match(actual, baseline, x, y, flags, tol) {
                    continue;
                }
                diff_pixels.push(DiffPixel::new(x, y));
                match bounds.as_mut() {
                    Some(b) => b.include(x, y),
                    None => bounds = Some(BoundingBox::point(x, y)),
                }
            }
        }

        let raw_mismatch_percentage = (diff_pixels.len() as f64 / total as f64) * 100.0;
        Ok(DiffOutput {
            raw_mismatch_percentage,
            diff_bounds: bounds,
            diff_pixels,
        })
    }
}

fn channel_diff(a: u8, b: u8) -> u8 {
    a.abs_diff(b)
}

fn is_similar(a: Rgba<u8>, b: Rgba<u8>, tol: Tolerance, ignore_alpha: bool) -> bool {
    let Rgba([r1, g1, b1, a1]) = a;
    let Rgba([r2, g2, b2, a2]) = b;
    channel_diff(r1, r2) <= tol.color
        && channel_diff(g1, g2) <= tol.color
        && channel_diff(b1, b2) <= tol.color
        && (ignore_alpha || channel_diff(a1, a2) <= tol.alpha)
}

/// Perceived brightness, weighted for human vision
fn brightness(p: Rgba<u8>) -> f64 {
    let Rgba([r, g, b, _]) = p;
    0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b)
}

/// A pixel counts as anti-aliased when it sits on an edge (a neighbour with
/// high brightness contrast) and the other image's value appears among its
/// neighbours, i.e. the edge merely shifted by a sub-pixel.
fn is_antialiased(
    image: &RgbaImage,
    x: u32,
    y: u32,
    other: Rgba<u8>,
    tol: Tolerance,
    ignore_alpha: bool,
) -> bool {
    let centre = brightness(*image.get_pixel(x, y));
    let mut on_edge = false;
    let mut shifted_match = false;

    for ny in y.saturating_sub(1)..=(y + 1).min(image.height() - 1) {
        for nx in x.saturating_sub(1)..=(x + 1).min(image.width() - 1) {
            if nx == x && ny == y {
                continue;
            }
            let n = *image.get_pixel(nx, ny);
            if (brightness(n) - centre).abs() > f64::from(tol.max_brightness) {
                on_edge = true;
            }
            if is_similar(n, other, tol, ignore_alpha) {
                shifted_match = true;
            }
        }
    }
    on_edge && shifted_match
}
