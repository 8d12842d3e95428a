//! Screenshot capture: driver seam, strategy selection and capture session.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  ScreenshotCaptureSession                                            │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  CaptureStrategy::select(capabilities, target, legacy)  (once/call)  │
//! │                                                                      │
//! │  Direct ────────► driver.capture_region(rect)                        │
//! │  SingleShot ────► driver.capture_screen() → ImageCompositor::crop    │
//! │  MultiShot ─────► FullPageStitcher (scroll → settle → capture)*      │
//! │  NativeWebview ─► calibrate once → translate → capture → crop        │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

mod calibration;
mod mock;

pub use calibration::{OverlayReading, WebviewBounds, WebviewCalibrator};
pub use mock::MockCaptureDriver;

use crate::compositor::{self, BezelMask, ImageCompositor};
use crate::geometry::{DeviceContext, Orientation, Rectangle};
use crate::result::{VisregError, VisregResult};
use crate::stitch::{FullPageStitcher, StitchConfig};
use async_trait::async_trait;
use base64::Engine as _;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Raw buffer returned by the capture primitive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawCapture {
    /// Encoded PNG/JPEG bytes
    Png(Vec<u8>),
    /// Base64-encoded PNG, as WebDriver returns screenshots
    Base64(String),
}

impl RawCapture {
    /// Decode into an image
    pub fn decode(&self) -> VisregResult<DynamicImage> {
        match self {
            Self::Png(bytes) => compositor::decode(bytes, "capture"),
            Self::Base64(encoded) => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| VisregError::decode("capture", format!("invalid base64: {e}")))?;
                compositor::decode(&bytes, "capture")
            }
        }
    }
}

/// What the transport can do
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureCapabilities {
    /// Stable "capture exactly this rectangle" primitive
    pub direct_region: bool,
    /// Session drives a native app hosting a webview
    pub native_webview: bool,
}

/// Page metrics in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DomMetrics {
    /// Full document height
    pub scroll_height: u32,
    /// Inner viewport width
    pub inner_width: u32,
    /// Inner viewport height
    pub inner_height: u32,
    /// Device pixel ratio
    pub device_pixel_ratio: f64,
    /// Orientation reported by the page
    pub orientation: Orientation,
}

/// Region to capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureTarget {
    /// The visible viewport
    Viewport,
    /// The whole document
    FullPage,
    /// An element, in CSS pixels relative to the viewport (or webview)
    Element {
        /// Element bounds
        rect: Rectangle,
        /// Element lives inside a native app's webview
        in_native_webview: bool,
    },
}

/// External automation transport
#[async_trait]
pub trait CaptureDriver: Send + Sync {
    /// Capability flags, read once per capture call
    fn capabilities(&self) -> CaptureCapabilities;

    /// Capture exactly `rect` (CSS pixels)
    async fn capture_region(&self, rect: Rectangle) -> VisregResult<RawCapture>;

    /// Capture the whole current screen or viewport
    async fn capture_screen(&self) -> VisregResult<RawCapture>;

    /// Read DOM metrics
    async fn dom_metrics(&self) -> VisregResult<DomMetrics>;

    /// Scroll the document to `y` (CSS pixels)
    async fn scroll_to(&self, y: u32) -> VisregResult<()>;

    /// Hide or restore elements matching `selectors`
    async fn set_elements_hidden(&self, selectors: &[String], hidden: bool) -> VisregResult<()>;

    /// Inject the invisible full-viewport calibration overlay
    async fn inject_calibration_overlay(&self) -> VisregResult<()>;

    /// Tap the screen at device pixel coordinates
    async fn tap(&self, x: u32, y: u32) -> VisregResult<()>;

    /// Read what the overlay recorded, `None` if it saw no click
    async fn read_calibration_overlay(&self) -> VisregResult<Option<OverlayReading>>;

    /// Remove the calibration overlay
    async fn remove_calibration_overlay(&self) -> VisregResult<()>;
}

/// How a capture call obtains its image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureStrategy {
    /// Transport captures the exact rectangle, no compositing
    Direct,
    /// One screen capture cropped by the compositor
    SingleShot,
    /// Scroll-and-capture, stitched
    MultiShot,
    /// Element inside a native webview, coordinates translated to screen
    NativeWebview,
}

impl CaptureStrategy {
    /// Pick the strategy for one call
    #[must_use]
    pub fn select(
        capabilities: &CaptureCapabilities,
        target: &CaptureTarget,
        force_legacy: bool,
        metrics: &DomMetrics,
    ) -> Self {
        match target {
            CaptureTarget::Element {
                in_native_webview: true,
                ..
            } if capabilities.native_webview => Self::NativeWebview,
            _ if capabilities.direct_region && !force_legacy => Self::Direct,
            CaptureTarget::FullPage if metrics.scroll_height > metrics.inner_height => {
                Self::MultiShot
            }
            _ => Self::SingleShot,
        }
    }
}

/// Capture behaviour options
#[derive(Debug, Clone, Default)]
pub struct CaptureOptions {
    /// Never use the direct region primitive
    pub force_legacy: bool,
    /// Produce a bezel-cornered report copy on iOS
    pub add_bezel_corners: bool,
    /// Full-page stitching settings
    pub stitch: StitchConfig,
}

/// Normalized capture
#[derive(Debug, Clone)]
pub struct CaptureOutput {
    /// Image to compare
    pub image: DynamicImage,
    /// Cosmetic report copy
    pub report_copy: Option<DynamicImage>,
    /// Strategy that produced the image
    pub strategy: CaptureStrategy,
}

/// Drives one driver through capture calls
#[derive(Debug)]
pub struct ScreenshotCaptureSession<'a, D: CaptureDriver + ?Sized> {
    driver: &'a D,
    options: CaptureOptions,
    calibrator: WebviewCalibrator,
}

impl<'a, D: CaptureDriver + ?Sized> ScreenshotCaptureSession<'a, D> {
    /// Create a session over `driver`
    #[must_use]
    pub fn new(driver: &'a D, options: CaptureOptions) -> Self {
        Self {
            driver,
            options,
            calibrator: WebviewCalibrator::new(),
        }
    }

    /// Webview calibration state
    #[must_use]
    pub const fn calibrator(&self) -> &WebviewCalibrator {
        &self.calibrator
    }

    /// Capture `target` and normalize it to device pixels of the requested
    /// region. Steps run strictly in order; any capture error aborts.
    pub async fn capture(
        &mut self,
        target: &CaptureTarget,
        context: &mut DeviceContext,
    ) -> VisregResult<CaptureOutput> {
        let metrics = self.driver.dom_metrics().await?;
        context.set_orientation(metrics.orientation);
        let rects = context.rectangles();
        let profile = *context.profile();
        let dpr = profile.device_pixel_ratio;

        let strategy = CaptureStrategy::select(
            &self.driver.capabilities(),
            target,
            self.options.force_legacy,
            &metrics,
        );
        info!(?strategy, ?target, "capturing screenshot");

        let bezel = if self.options.add_bezel_corners {
            BezelMask::for_device(&profile, &rects)
        } else {
            None
        };

        let composed = match (strategy, *target) {
            (CaptureStrategy::Direct, target) => {
                let region = match target {
                    CaptureTarget::Viewport => {
                        Rectangle::sized(metrics.inner_width, metrics.inner_height)
                    }
                    CaptureTarget::FullPage => {
                        Rectangle::sized(metrics.inner_width, metrics.scroll_height)
                    }
                    CaptureTarget::Element { rect, .. } => rect,
                };
                let image = self.driver.capture_region(region).await?.decode()?;
                return Ok(CaptureOutput {
                    image,
                    report_copy: None,
                    strategy,
                });
            }
            (CaptureStrategy::MultiShot, _) => {
                let stitched = FullPageStitcher::new(self.options.stitch.clone())
                    .stitch(self.driver, &metrics, &rects, &profile)
                    .await?;
                return Ok(CaptureOutput {
                    image: DynamicImage::ImageRgba8(stitched.image),
                    report_copy: None,
                    strategy,
                });
            }
            (CaptureStrategy::SingleShot, target) => {
                let raw = self.driver.capture_screen().await?.decode()?;
                let crop = match target {
                    CaptureTarget::Viewport => rects.viewport,
                    CaptureTarget::FullPage => {
                        let page_height = crate::geometry::scale_round(metrics.scroll_height, dpr);
                        Rectangle::new(
                            rects.viewport.x,
                            rects.viewport.y,
                            rects.viewport.width,
                            rects.viewport.height.min(page_height),
                        )
                    }
                    CaptureTarget::Element { rect, .. } => rect
                        .to_device(dpr)
                        .translate(i64::from(rects.viewport.x), i64::from(rects.viewport.y)),
                };
                ImageCompositor::compose(&raw, crop, bezel.as_ref())?
            }
            (CaptureStrategy::NativeWebview, target) => {
                let CaptureTarget::Element { rect, .. } = target else {
                    return Err(VisregError::capture(
                        "native webview capture needs an element target",
                    ));
                };
                let webview = match context.webview_bounds() {
                    Some(bounds) => bounds,
                    None => {
                        self.calibrator.invalidate();
                        let bounds = self.calibrator.calibrate(self.driver, &rects).await?;
                        context.set_webview_bounds(bounds);
                        bounds
                    }
                };
                let screen_rect = webview.to_screen(rect, dpr, &rects);
                debug!(?rect, ?screen_rect, "translated webview element to screen");
                let raw = self.driver.capture_screen().await?.decode()?;
                ImageCompositor::compose(&raw, screen_rect, bezel.as_ref())?
            }
        };

        Ok(CaptureOutput {
            image: composed.image,
            report_copy: composed.report_copy,
            strategy,
        })
    }
}
