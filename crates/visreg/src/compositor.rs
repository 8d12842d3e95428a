//! Image compositor: decode, crop, scale and encode captures.
//!
//! All rectangles handed to the compositor are in device pixels. Requests
//! that reach past the decoded image are trimmed to the image bounds and
//! logged; they never fail.

use crate::engine::DiffPixel;
use crate::geometry::{DeviceProfile, DeviceRectangles, Platform, Rectangle};
use crate::result::{VisregError, VisregResult};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageEncoder, Rgba, RgbaImage};
use tracing::{debug, warn};

/// Corner radius of notched iPhones, in points
const PHONE_BEZEL_RADIUS: u32 = 39;

/// Corner radius of home-indicator iPads, in points
const TABLET_BEZEL_RADIUS: u32 = 18;

/// Decode a PNG/JPEG buffer
pub fn decode(bytes: &[u8], what: &str) -> VisregResult<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| VisregError::decode(what, e.to_string()))
}

/// Encode an image as PNG
pub fn encode_png(image: &DynamicImage) -> VisregResult<Vec<u8>> {
    let rgba = image.to_rgba8();
    let mut buffer = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buffer)
        .write_image(
            rgba.as_raw(),
            rgba.width(),
            rgba.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| VisregError::image_processing(format!("Failed to encode PNG: {e}")))?;
    Ok(buffer)
}

/// Crops raw captures down to logical regions
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCompositor;

impl ImageCompositor {
    /// Crop to `rect`, trimming it to the image bounds first.
    ///
    /// Fails only when nothing of the request lies inside the image.
    pub fn crop(image: &DynamicImage, rect: Rectangle) -> VisregResult<DynamicImage> {
        let (width, height) = image.dimensions();
        let bounds = Rectangle::sized(width, height);
        let clamped = rect.clamp_to(&bounds);

        if clamped != rect {
            warn!(
                requested = ?rect,
                trimmed = ?clamped,
                image_width = width,
                image_height = height,
                "crop request exceeds decoded image, trimming"
            );
        }
        if clamped.is_empty() {
            return Err(VisregError::image_processing(format!(
                "Crop {rect:?} lies outside the {width}x{height} capture"
            )));
        }
        if clamped == bounds {
            return Ok(image.clone());
        }

        Ok(image.crop_imm(clamped.x, clamped.y, clamped.width, clamped.height))
    }

    /// Crop a rectangle given in logical pixels
    pub fn crop_logical(
        image: &DynamicImage,
        logical: Rectangle,
        dpr: f64,
    ) -> VisregResult<DynamicImage> {
        Self::crop(image, logical.to_device(dpr))
    }

    /// Cut the web viewport out of a full-screen capture
    pub fn crop_viewport(
        image: &DynamicImage,
        rects: &DeviceRectangles,
    ) -> VisregResult<DynamicImage> {
        Self::crop(image, rects.viewport)
    }

    /// Crop a raw capture and, when a bezel is given, produce a report copy
    /// with rounded corners. The bezel never touches the compared image.
    pub fn compose(
        raw: &DynamicImage,
        target: Rectangle,
        bezel: Option<&BezelMask>,
    ) -> VisregResult<ComposedImage> {
        let image = Self::crop(raw, target)?;
        let report_copy = bezel.map(|mask| mask.apply(&image));
        Ok(ComposedImage { image, report_copy })
    }

    /// Same-size scaling: both images are brought down to the common
    /// `min(width) x min(height)` box, so no axis is ever upscaled. Returns
    /// the pair in input order.
    #[must_use]
    pub fn downscale_to_match(
        actual: DynamicImage,
        baseline: DynamicImage,
    ) -> (DynamicImage, DynamicImage) {
        let a = actual.dimensions();
        let b = baseline.dimensions();
        if a == b {
            return (actual, baseline);
        }

        let target = (a.0.min(b.0), a.1.min(b.1));
        debug!(actual = ?a, baseline = ?b, ?target, "scaling images to the same size");
        let shrink = |image: DynamicImage, size: (u32, u32)| {
            if size == target {
                image
            } else {
                image.resize_exact(target.0, target.1, FilterType::Triangle)
            }
        };
        (shrink(actual, a), shrink(baseline, b))
    }

    /// Diff artifact: mismatched pixels in red over a dimmed copy of `actual`
    #[must_use]
    pub fn render_diff_image(actual: &RgbaImage, diff_pixels: &[DiffPixel]) -> RgbaImage {
        let mut diff = RgbaImage::from_fn(actual.width(), actual.height(), |x, y| {
            let Rgba([r, g, b, _]) = *actual.get_pixel(x, y);
            Rgba([r / 2, g / 2, b / 2, 128])
        });
        for p in diff_pixels {
            if p.x < diff.width() && p.y < diff.height() {
                diff.put_pixel(p.x, p.y, Rgba([255, 0, 0, 255]));
            }
        }
        diff
    }
}

/// Output of [`ImageCompositor::compose`]
#[derive(Debug, Clone)]
pub struct ComposedImage {
    /// Image used for comparison
    pub image: DynamicImage,
    /// Cosmetic copy for reports, present when a bezel was requested
    pub report_copy: Option<DynamicImage>,
}

/// Rounded device corners painted onto report images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BezelMask {
    /// Corner radius in device pixels
    pub radius: u32,
}

impl BezelMask {
    /// Bezel for an iOS device with a home indicator; `None` for devices
    /// with square screen corners.
    #[must_use]
    pub fn for_device(profile: &DeviceProfile, rects: &DeviceRectangles) -> Option<Self> {
        if profile.platform != Platform::Ios || rects.home_bar.is_empty() {
            return None;
        }
        let (w, h) = profile.oriented_screen();
        let longest = (f64::from(w.max(h)) / profile.device_pixel_ratio).round() as u32;
        let points = if longest < 1024 {
            PHONE_BEZEL_RADIUS
        } else {
            TABLET_BEZEL_RADIUS
        };
        Some(Self {
            radius: crate::geometry::scale_round(points, profile.device_pixel_ratio),
        })
    }

    /// Copy of `image` with pixels outside the rounded corners cleared
    #[must_use]
    pub fn apply(&self, image: &DynamicImage) -> DynamicImage {
        let mut rgba = image.to_rgba8();
        let (w, h) = rgba.dimensions();
        let r = self.radius.min(w / 2).min(h / 2);
        if r == 0 {
            return DynamicImage::ImageRgba8(rgba);
        }
        let r_f = f64::from(r);

        for dy in 0..r {
            for dx in 0..r {
                // Distance from the corner circle's centre
                let cx = r_f - f64::from(dx) - 0.5;
                let cy = r_f - f64::from(dy) - 0.5;
                if cx.hypot(cy) <= r_f {
                    continue;
                }
                for (x, y) in [
                    (dx, dy),
                    (w - 1 - dx, dy),
                    (dx, h - 1 - dy),
                    (w - 1 - dx, h - 1 - dy),
                ] {
                    rgba.put_pixel(x, y, Rgba([0, 0, 0, 0]));
                }
            }
        }
        DynamicImage::ImageRgba8(rgba)
    }
}
