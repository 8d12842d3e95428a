//! Scriptable in-memory driver.

use super::{CaptureCapabilities, CaptureDriver, DomMetrics, OverlayReading, RawCapture};
use crate::compositor::encode_png;
use crate::geometry::{scale_round, Rectangle};
use crate::result::{VisregError, VisregResult};
use async_trait::async_trait;
use image::{DynamicImage, RgbaImage};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct MockState {
    call_history: Vec<String>,
    scroll_y: u32,
    hidden: Vec<String>,
    screen_captures: usize,
}

/// Mock driver for unit testing
///
/// `capture_screen` renders, in order of preference: the window of the
/// configured page at the current scroll position, or the fixed screen image.
#[derive(Debug)]
pub struct MockCaptureDriver {
    /// DOM metrics returned by `dom_metrics`
    pub metrics: DomMetrics,
    /// Capability flags
    pub capabilities: CaptureCapabilities,
    screen: Option<RgbaImage>,
    region: Option<RgbaImage>,
    page: Option<RgbaImage>,
    overlay_reading: Option<OverlayReading>,
    fail_capture_at: Option<usize>,
    fail_tap: bool,
    state: Mutex<MockState>,
}

impl MockCaptureDriver {
    /// Create new mock driver
    #[must_use]
    pub fn new(metrics: DomMetrics) -> Self {
        Self {
            metrics,
            capabilities: CaptureCapabilities::default(),
            screen: None,
            region: None,
            page: None,
            overlay_reading: None,
            fail_capture_at: None,
            fail_tap: false,
            state: Mutex::new(MockState::default()),
        }
    }

    /// Set capability flags
    #[must_use]
    pub const fn with_capabilities(mut self, capabilities: CaptureCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Fixed image returned by `capture_screen`
    #[must_use]
    pub fn with_screen(mut self, screen: RgbaImage) -> Self {
        self.screen = Some(screen);
        self
    }

    /// Image returned by `capture_region`
    #[must_use]
    pub fn with_region(mut self, region: RgbaImage) -> Self {
        self.region = Some(region);
        self
    }

    /// Full document in device pixels; screen captures show the scrolled window
    #[must_use]
    pub fn with_page(mut self, page: RgbaImage) -> Self {
        self.page = Some(page);
        self
    }

    /// Reading returned by the calibration overlay
    #[must_use]
    pub const fn with_overlay_reading(mut self, reading: OverlayReading) -> Self {
        self.overlay_reading = Some(reading);
        self
    }

    /// Fail the `n`th (zero-based) screen capture
    #[must_use]
    pub const fn failing_capture_at(mut self, n: usize) -> Self {
        self.fail_capture_at = Some(n);
        self
    }

    /// Make every `tap` fail
    #[must_use]
    pub const fn failing_tap(mut self) -> Self {
        self.fail_tap = true;
        self
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: String) {
        self.state().call_history.push(call);
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.state().call_history.clone()
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.state().call_history.iter().any(|c| c.starts_with(method))
    }

    /// Number of calls starting with `method`
    #[must_use]
    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_history
            .iter()
            .filter(|c| c.starts_with(method))
            .count()
    }

    /// Selectors currently hidden
    #[must_use]
    pub fn hidden_selectors(&self) -> Vec<String> {
        self.state().hidden.clone()
    }

    /// Current scroll position in CSS pixels
    #[must_use]
    pub fn scroll_position(&self) -> u32 {
        self.state().scroll_y
    }

    fn render_screen(&self, scroll_y: u32) -> VisregResult<RgbaImage> {
        if let Some(page) = &self.page {
            let dpr = self.metrics.device_pixel_ratio;
            let height = scale_round(self.metrics.inner_height, dpr).min(page.height());
            let top = scale_round(scroll_y, dpr).min(page.height() - height);
            let view = image::imageops::crop_imm(page, 0, top, page.width(), height);
            return Ok(view.to_image());
        }
        self.screen
            .clone()
            .ok_or_else(|| VisregError::capture("mock has no screen image"))
    }
}

#[async_trait]
impl CaptureDriver for MockCaptureDriver {
    fn capabilities(&self) -> CaptureCapabilities {
        self.capabilities
    }

    async fn capture_region(&self, rect: Rectangle) -> VisregResult<RawCapture> {
        self.record(format!(
            "capture_region:{},{},{},{}",
            rect.x, rect.y, rect.width, rect.height
        ));
        let region = self
            .region
            .clone()
            .ok_or_else(|| VisregError::capture("mock has no region image"))?;
        Ok(RawCapture::Png(encode_png(&DynamicImage::ImageRgba8(region))?))
    }

    async fn capture_screen(&self) -> VisregResult<RawCapture> {
        let (index, scroll_y) = {
            let mut state = self.state();
            state.call_history.push("capture_screen".to_string());
            let index = state.screen_captures;
            state.screen_captures += 1;
            (index, state.scroll_y)
        };
        if self.fail_capture_at == Some(index) {
            return Err(VisregError::capture(format!("mock capture {index} failed")));
        }
        let screen = self.render_screen(scroll_y)?;
        Ok(RawCapture::Png(encode_png(&DynamicImage::ImageRgba8(screen))?))
    }

    async fn dom_metrics(&self) -> VisregResult<DomMetrics> {
        self.record("dom_metrics".to_string());
        Ok(self.metrics)
    }

    async fn scroll_to(&self, y: u32) -> VisregResult<()> {
        let max = self
            .metrics
            .scroll_height
            .saturating_sub(self.metrics.inner_height);
        let mut state = self.state();
        state.call_history.push(format!("scroll_to:{y}"));
        state.scroll_y = y.min(max);
        Ok(())
    }

    async fn set_elements_hidden(&self, selectors: &[String], hidden: bool) -> VisregResult<()> {
        let mut state = self.state();
        state
            .call_history
            .push(format!("set_elements_hidden:{}:{hidden}", selectors.join(",")));
        if hidden {
            state.hidden.extend(selectors.iter().cloned());
        } else {
            state.hidden.retain(|s| !selectors.contains(s));
        }
        Ok(())
    }

    async fn inject_calibration_overlay(&self) -> VisregResult<()> {
        self.record("inject_calibration_overlay".to_string());
        Ok(())
    }

    async fn tap(&self, x: u32, y: u32) -> VisregResult<()> {
        self.record(format!("tap:{x},{y}"));
        if self.fail_tap {
            return Err(VisregError::capture("mock tap failed"));
        }
        Ok(())
    }

    async fn read_calibration_overlay(&self) -> VisregResult<Option<OverlayReading>> {
        self.record("read_calibration_overlay".to_string());
        Ok(self.overlay_reading)
    }

    async fn remove_calibration_overlay(&self) -> VisregResult<()> {
        self.record("remove_calibration_overlay".to_string());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::geometry::Orientation;
    use image::{GenericImageView, Rgba};

    fn metrics() -> DomMetrics {
        DomMetrics {
            scroll_height: 300,
            inner_width: 10,
            inner_height: 100,
            device_pixel_ratio: 1.0,
            orientation: Orientation::Portrait,
        }
    }

    #[tokio::test]
    async fn test_page_window_follows_scroll_and_clamps() {
        let page = RgbaImage::from_fn(10, 300, |_, y| Rgba([0, 0, (y / 100) as u8, 255]));
        let d = MockCaptureDriver::new(metrics()).with_page(page);

        d.scroll_to(100).await.unwrap();
        let shot = d.capture_screen().await.unwrap().decode().unwrap();
        assert_eq!(shot.dimensions(), (10, 100));
        assert_eq!(shot.get_pixel(0, 0), Rgba([0, 0, 1, 255]));

        d.scroll_to(1000).await.unwrap();
        assert_eq!(d.scroll_position(), 200);
    }

    #[tokio::test]
    async fn test_hidden_selectors_toggle() {
        let d = MockCaptureDriver::new(metrics());
        let sel = vec!["#header".to_string()];
        d.set_elements_hidden(&sel, true).await.unwrap();
        assert_eq!(d.hidden_selectors(), sel);
        d.set_elements_hidden(&sel, false).await.unwrap();
        assert!(d.hidden_selectors().is_empty());
    }

    #[tokio::test]
    async fn test_missing_screen_is_capture_failure() {
        let d = MockCaptureDriver::new(metrics());
        assert!(matches!(
            d.capture_screen().await,
            Err(VisregError::CaptureFailure { .. })
        ));
        assert_eq!(d.history(), vec!["capture_screen".to_string()]);
    }
}
