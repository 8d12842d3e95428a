//! Ignore and block-out regions.
//!
//! Masked regions are painted with the same neutral colour in both images
//! before comparison, so whatever they contain never counts as a mismatch.

use crate::geometry::{BoundingBox, DeviceRectangles, Rectangle};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Fill used for masked pixels
pub const NEUTRAL_FILL: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Where a masked region came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RegionSource {
    /// Caller-supplied ignore region
    Ignore,
    /// Caller-supplied block-out region
    BlockOut,
    /// Device status bar
    StatusBar,
    /// Device tool bar or home indicator
    ToolBar,
    /// Tablet side bar
    SideBar,
}

/// Rectangle masked out of both images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreRegion {
    /// Region in device pixels of the compared image
    #[serde(flatten)]
    pub rect: Rectangle,
    /// Origin of the region
    pub source: RegionSource,
}

impl IgnoreRegion {
    /// Create a region
    #[must_use]
    pub const fn new(rect: Rectangle, source: RegionSource) -> Self {
        Self { rect, source }
    }

    /// Caller ignore region
    #[must_use]
    pub const fn ignore(rect: Rectangle) -> Self {
        Self::new(rect, RegionSource::Ignore)
    }

    /// Caller block-out region
    #[must_use]
    pub const fn block_out(rect: Rectangle) -> Self {
        Self::new(rect, RegionSource::BlockOut)
    }

    /// Region trimmed to a `width x height` image, `None` if nothing is left
    #[must_use]
    pub fn clamped(&self, width: u32, height: u32) -> Option<Self> {
        let rect = self.rect.clamp_to(&Rectangle::sized(width, height));
        if rect != self.rect {
            warn!(
                requested = ?self.rect,
                trimmed = ?rect,
                source = ?self.source,
                "ignore region exceeds image bounds, trimming"
            );
        }
        (!rect.is_empty()).then_some(Self::new(rect, self.source))
    }
}

/// Which device chrome to block out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeviceBlockOuts {
    /// Status bar (and address bar)
    pub status_bar: bool,
    /// Tool bar or home indicator
    pub tool_bar: bool,
    /// Tablet side bar
    pub side_bar: bool,
}

impl DeviceBlockOuts {
    /// True when nothing is blocked out
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !(self.status_bar || self.tool_bar || self.side_bar)
    }

    /// Block-out regions derived from the device chrome. The rectangles are
    /// in screen coordinates, so they only apply to full-screen images.
    #[must_use]
    pub fn regions(&self, rects: &DeviceRectangles) -> Vec<IgnoreRegion> {
        let mut regions = Vec::new();
        if self.status_bar {
            regions.push(IgnoreRegion::new(
                rects.status_bar_and_address_bar,
                RegionSource::StatusBar,
            ));
        }
        if self.tool_bar {
            regions.push(IgnoreRegion::new(rects.tool_bar, RegionSource::ToolBar));
            if rects.home_bar != rects.tool_bar {
                regions.push(IgnoreRegion::new(rects.home_bar, RegionSource::ToolBar));
            }
        }
        if self.side_bar {
            regions.push(IgnoreRegion::new(rects.left_side_padding, RegionSource::SideBar));
            regions.push(IgnoreRegion::new(rects.right_side_padding, RegionSource::SideBar));
        }
        regions.retain(|r| !r.rect.is_empty());
        regions
    }
}

/// Paint every region onto `image`, each trimmed to the image first
pub fn apply_mask(image: &mut RgbaImage, regions: &[IgnoreRegion]) {
    let (width, height) = image.dimensions();
    for region in regions.iter().filter_map(|r| r.clamped(width, height)) {
        let rect = region.rect;
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                image.put_pixel(x, y, NEUTRAL_FILL);
            }
        }
    }
}

/// Mask both images and return the masked areas as inclusive boxes on the
/// union canvas of the two images
pub fn mask_pair(
    actual: &mut RgbaImage,
    baseline: &mut RgbaImage,
    regions: &[IgnoreRegion],
) -> Vec<BoundingBox> {
    if regions.is_empty() {
        return Vec::new();
    }
    apply_mask(actual, regions);
    apply_mask(baseline, regions);

    let width = actual.width().max(baseline.width());
    let height = actual.height().max(baseline.height());
    let boxes: Vec<_> = regions
        .iter()
        .filter_map(|r| r.clamped(width, height))
        .filter_map(|r| r.rect.to_bounding_box())
        .collect();
    debug!(regions = regions.len(), masked = boxes.len(), "masked ignore regions");
    boxes
}
