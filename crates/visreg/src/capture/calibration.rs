//! Native webview calibration.
//!
//! In a native app the webview does not start at the viewport origin the
//! browser tables describe. A transparent overlay records where a tap at a
//! known screen point lands inside the webview; the difference is the
//! webview's offset. Calibration runs once per [`DeviceContext`] and again
//! after the context is marked dirty.
//!
//! [`DeviceContext`]: crate::geometry::DeviceContext

use super::CaptureDriver;
use crate::geometry::{DeviceRectangles, Rectangle};
use crate::result::VisregResult;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// What the calibration overlay recorded, in device pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayReading {
    /// Click x inside the webview
    pub click_x: u32,
    /// Click y inside the webview
    pub click_y: u32,
    /// Overlay width
    pub width: u32,
    /// Overlay height
    pub height: u32,
}

/// Webview placement relative to the app viewport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WebviewBounds {
    /// Offset of the webview's origin from the viewport origin
    pub offset_x: i64,
    /// Offset of the webview's origin from the viewport origin
    pub offset_y: i64,
    /// Webview size
    pub width: u32,
    /// Webview size
    pub height: u32,
}

impl WebviewBounds {
    /// Translate a webview-local element (CSS pixels) to screen pixels:
    /// first into the webview's box, then from the viewport to the screen.
    #[must_use]
    pub fn to_screen(&self, element: Rectangle, dpr: f64, rects: &DeviceRectangles) -> Rectangle {
        element
            .to_device(dpr)
            .translate(self.offset_x, self.offset_y)
            .translate(i64::from(rects.viewport.x), i64::from(rects.viewport.y))
    }
}

/// Caches webview bounds for one session
#[derive(Debug, Clone, Default)]
pub struct WebviewCalibrator {
    overlay_injected: bool,
    bounds: Option<WebviewBounds>,
}

impl WebviewCalibrator {
    /// Uncalibrated state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached bounds, if calibrated
    #[must_use]
    pub const fn bounds(&self) -> Option<WebviewBounds> {
        self.bounds
    }

    /// Drop cached bounds so the next [`calibrate`](Self::calibrate) measures again
    pub fn invalidate(&mut self) {
        self.bounds = None;
    }

    /// Inject the overlay unless it is already present
    pub async fn ensure_overlay<D: CaptureDriver + ?Sized>(
        &mut self,
        driver: &D,
    ) -> VisregResult<()> {
        if !self.overlay_injected {
            driver.inject_calibration_overlay().await?;
            self.overlay_injected = true;
        }
        Ok(())
    }

    /// Webview bounds, measured on first use
    pub async fn calibrate<D: CaptureDriver + ?Sized>(
        &mut self,
        driver: &D,
        rects: &DeviceRectangles,
    ) -> VisregResult<WebviewBounds> {
        if let Some(bounds) = self.bounds {
            return Ok(bounds);
        }

        self.ensure_overlay(driver).await?;
        let viewport = rects.viewport;
        let tap_x = viewport.x + viewport.width / 2;
        let tap_y = viewport.y + viewport.height / 2;
        let reading = match driver.tap(tap_x, tap_y).await {
            Ok(()) => driver.read_calibration_overlay().await,
            Err(err) => Err(err),
        };
        // Remove the overlay whatever the measurement outcome.
        let removed = driver.remove_calibration_overlay().await;
        if removed.is_ok() {
            self.overlay_injected = false;
        }
        let reading = reading?;
        removed?;

        let bounds = match reading {
            Some(r) => WebviewBounds {
                offset_x: i64::from(tap_x) - i64::from(r.click_x) - i64::from(viewport.x),
                offset_y: i64::from(tap_y) - i64::from(r.click_y) - i64::from(viewport.y),
                width: r.width,
                height: r.height,
            },
            None => {
                warn!("calibration overlay saw no tap, assuming webview fills the viewport");
                WebviewBounds {
                    width: viewport.width,
                    height: viewport.height,
                    ..WebviewBounds::default()
                }
            }
        };
        debug!(?bounds, "webview calibrated");
        self.bounds = Some(bounds);
        Ok(bounds)
    }
}
