//! Full-page stitching.
//!
//! The document is captured one viewport at a time, top to bottom, and the
//! frames are pasted into a canvas of `inner_width*dpr x full_height*dpr`.
//! Seams sit on rounded frame boundaries so every canvas row belongs to
//! exactly one frame. The browser cannot scroll past the end of the page, so
//! the last frame shows the bottom of the document and is pasted
//! bottom-aligned.

use crate::capture::{CaptureDriver, DomMetrics};
use crate::compositor::ImageCompositor;
use crate::geometry::{scale_round, DeviceProfile, DeviceRectangles};
use crate::result::{VisregError, VisregResult};
use image::{imageops, DynamicImage, GenericImageView, RgbaImage};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default settle time between scroll and capture
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1500);

/// Default address/tool bar shadow on mobile browsers, in points
pub const DEFAULT_SHADOW_PADDING: u32 = 6;

/// Stitching settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StitchConfig {
    /// Wait after each scroll before capturing
    pub settle_delay: Duration,
    /// Selectors hidden from the second frame on (sticky headers)
    pub hide_after_first_scroll: Vec<String>,
    /// Rows below the address bar trimmed from the first frame (points, mobile only)
    pub address_bar_shadow_padding: u32,
    /// Rows above the tool bar trimmed from the last frame (points, mobile only)
    pub tool_bar_shadow_padding: u32,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            hide_after_first_scroll: Vec::new(),
            address_bar_shadow_padding: DEFAULT_SHADOW_PADDING,
            tool_bar_shadow_padding: DEFAULT_SHADOW_PADDING,
        }
    }
}

impl StitchConfig {
    /// Set settle delay
    #[must_use]
    pub const fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Set the selectors hidden after the first scroll
    #[must_use]
    pub fn with_hide_after_first_scroll(mut self, selectors: Vec<String>) -> Self {
        self.hide_after_first_scroll = selectors;
        self
    }

    /// Set both shadow paddings, in points
    #[must_use]
    pub const fn with_shadow_padding(mut self, address_bar: u32, tool_bar: u32) -> Self {
        self.address_bar_shadow_padding = address_bar;
        self.tool_bar_shadow_padding = tool_bar;
        self
    }

    /// Shadow rows to trim for `profile`, in device pixels
    #[must_use]
    pub fn shadow_trim(&self, profile: &DeviceProfile) -> ShadowTrim {
        if !profile.platform.is_mobile() {
            return ShadowTrim::default();
        }
        let dpr = profile.device_pixel_ratio;
        ShadowTrim {
            top: scale_round(self.address_bar_shadow_padding, dpr),
            bottom: scale_round(self.tool_bar_shadow_padding, dpr),
        }
    }
}

/// Rows left transparent at the page's top and bottom edges
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShadowTrim {
    /// Rows at the top of the first frame
    pub top: u32,
    /// Rows at the bottom of the last frame
    pub bottom: u32,
}

/// One scroll step, in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StitchStep {
    /// Zero-based step index
    pub index: usize,
    /// Requested scroll position
    pub scroll_y: u32,
    /// Where the frame starts on the canvas
    pub canvas_y: u32,
    /// Rows of the frame that belong to the page
    pub usable_height: u32,
}

/// Scroll plan for a document of `full_height` seen through a viewport of
/// `viewport_height`. Always at least one step.
pub fn plan(viewport_height: u32, full_height: u32) -> VisregResult<Vec<StitchStep>> {
    if viewport_height == 0 {
        return Err(VisregError::image_processing(
            "cannot stitch with a zero-height viewport",
        ));
    }
    let count = full_height.div_ceil(viewport_height).max(1);
    Ok((0..count)
        .map(|i| {
            let canvas_y = i * viewport_height;
            StitchStep {
                index: i as usize,
                scroll_y: canvas_y,
                canvas_y,
                usable_height: viewport_height.min(full_height.saturating_sub(canvas_y)),
            }
        })
        .collect())
}

/// One captured frame of a scroll sequence
#[derive(Debug, Clone)]
pub struct CaptureFrame {
    /// Viewport capture, device pixels
    pub image: DynamicImage,
    /// Canvas position in CSS pixels
    pub canvas_y_position: u32,
    /// Rows of the page this frame contributes, CSS pixels
    pub usable_height: u32,
}

/// Composited full page
#[derive(Debug, Clone)]
pub struct StitchedImage {
    /// Canvas
    pub image: RgbaImage,
    /// Width in device pixels
    pub width: u32,
    /// Height in device pixels
    pub height: u32,
}

/// Scroll, capture and composite a full page
#[derive(Debug, Clone, Default)]
pub struct FullPageStitcher {
    config: StitchConfig,
}

impl FullPageStitcher {
    /// Create a stitcher
    #[must_use]
    pub const fn new(config: StitchConfig) -> Self {
        Self { config }
    }

    /// Current settings
    #[must_use]
    pub const fn config(&self) -> &StitchConfig {
        &self.config
    }

    /// Capture every frame and composite them
    pub async fn stitch<D: CaptureDriver + ?Sized>(
        &self,
        driver: &D,
        metrics: &DomMetrics,
        rects: &DeviceRectangles,
        profile: &DeviceProfile,
    ) -> VisregResult<StitchedImage> {
        let frames = self.capture_frames(driver, metrics, rects).await?;
        let stitched = Self::composite(
            &frames,
            metrics.inner_width,
            metrics.scroll_height,
            profile.device_pixel_ratio,
            self.config.shadow_trim(profile),
        )?;
        info!(
            frames = frames.len(),
            width = stitched.width,
            height = stitched.height,
            "full page stitched"
        );
        Ok(stitched)
    }

    /// Run the scroll plan. Any failing step aborts the whole sequence;
    /// elements hidden along the way are shown again either way.
    pub async fn capture_frames<D: CaptureDriver + ?Sized>(
        &self,
        driver: &D,
        metrics: &DomMetrics,
        rects: &DeviceRectangles,
    ) -> VisregResult<Vec<CaptureFrame>> {
        let steps = plan(metrics.inner_height, metrics.scroll_height)?;
        let mut frames = Vec::with_capacity(steps.len());
        let mut hidden = false;

        let outcome = self
            .run_steps(driver, &steps, rects, &mut frames, &mut hidden)
            .await;

        if hidden {
            if let Err(err) = driver
                .set_elements_hidden(&self.config.hide_after_first_scroll, false)
                .await
            {
                warn!(%err, "failed to restore elements hidden during stitching");
            }
        }

        outcome?;
        Ok(frames)
    }

    async fn run_steps<D: CaptureDriver + ?Sized>(
        &self,
        driver: &D,
        steps: &[StitchStep],
        rects: &DeviceRectangles,
        frames: &mut Vec<CaptureFrame>,
        hidden: &mut bool,
    ) -> VisregResult<()> {
        for step in steps {
            driver.scroll_to(step.scroll_y).await?;
            if step.index == 1 && !self.config.hide_after_first_scroll.is_empty() {
                *hidden = true;
                driver
                    .set_elements_hidden(&self.config.hide_after_first_scroll, true)
                    .await?;
            }
            if !self.config.settle_delay.is_zero() {
                tokio::time::sleep(self.config.settle_delay).await;
            }

            let screen = driver.capture_screen().await?.decode()?;
            let image = ImageCompositor::crop(&screen, rects.viewport)?;
            debug!(
                step = step.index,
                scroll_y = step.scroll_y,
                usable_height = step.usable_height,
                "captured stitch frame"
            );
            frames.push(CaptureFrame {
                image,
                canvas_y_position: step.canvas_y,
                usable_height: step.usable_height,
            });
        }
        Ok(())
    }

    /// Paste `frames` into a `page_width x page_height` (CSS) canvas
    pub fn composite(
        frames: &[CaptureFrame],
        page_width: u32,
        page_height: u32,
        dpr: f64,
        trim: ShadowTrim,
    ) -> VisregResult<StitchedImage> {
        let Some(last) = frames.len().checked_sub(1) else {
            return Err(VisregError::image_processing("no frames to stitch"));
        };
        let width = scale_round(page_width, dpr);
        let height = scale_round(page_height, dpr);
        let mut canvas = RgbaImage::new(width, height);

        for (i, frame) in frames.iter().enumerate() {
            let dest_top = scale_round(frame.canvas_y_position, dpr).min(height);
            let dest_bottom = if i == last {
                height
            } else {
                scale_round(frame.canvas_y_position + frame.usable_height, dpr).min(height)
            };
            let rows = dest_bottom.saturating_sub(dest_top);
            let (frame_width, frame_height) = frame.image.dimensions();
            let available = rows.min(frame_height);
            if available < rows {
                warn!(
                    frame = i,
                    needed = rows,
                    available = frame_height,
                    "frame shorter than its canvas slot"
                );
            }

            let bottom_aligned = i == last && i > 0;
            let (src_y, dest_y) = if bottom_aligned {
                (frame_height - available, dest_bottom - available)
            } else {
                (0, dest_top)
            };

            let skip_top = if i == 0 { trim.top.min(available) } else { 0 };
            let skip_bottom = if i == last {
                trim.bottom.min(available - skip_top)
            } else {
                0
            };
            let copy_rows = available - skip_top - skip_bottom;
            let copy_width = frame_width.min(width);
            if copy_rows == 0 || copy_width == 0 {
                continue;
            }

            let piece = frame
                .image
                .crop_imm(0, src_y + skip_top, copy_width, copy_rows)
                .to_rgba8();
            imageops::replace(&mut canvas, &piece, 0, i64::from(dest_y + skip_top));
        }

        Ok(StitchedImage {
            image: canvas,
            width,
            height,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::capture::MockCaptureDriver;
    use crate::geometry::{Orientation, OsVersion, Platform};
    use image::Rgba;
    use proptest::prelude::*;

    fn metrics(inner_height: u32, scroll_height: u32) -> DomMetrics {
        DomMetrics {
            scroll_height,
            inner_width: 4,
            inner_height,
            device_pixel_ratio: 1.0,
            orientation: Orientation::Portrait,
        }
    }

    fn page(height: u32) -> RgbaImage {
        RgbaImage::from_fn(4, height, |_, y| {
            Rgba([(y % 256) as u8, (y / 256) as u8, 0, 255])
        })
    }

    fn row_id(image: &RgbaImage, y: u32) -> u32 {
        let p = image.get_pixel(0, y);
        u32::from(p[0]) + u32::from(p[1]) * 256
    }

    fn fast() -> StitchConfig {
        StitchConfig::default().with_settle_delay(Duration::ZERO)
    }

    fn solid(height: u32, color: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, height, Rgba(color)))
    }

    #[test]
    fn test_plan_three_steps() {
        let steps = plan(1000, 3000).unwrap();
        let ys: Vec<_> = steps.iter().map(|s| s.canvas_y).collect();
        assert_eq!(ys, vec![0, 1000, 2000]);
        assert!(steps.iter().all(|s| s.usable_height == 1000));
    }

    #[test]
    fn test_plan_short_last_step() {
        let steps = plan(1000, 2500).unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[2].usable_height, 500);
    }

    #[test]
    fn test_plan_edge_cases() {
        assert!(plan(0, 100).is_err());
        assert_eq!(plan(100, 0).unwrap().len(), 1);
        assert_eq!(plan(100, 50).unwrap()[0].usable_height, 50);
    }

    #[tokio::test]
    async fn test_stitch_3000_over_1000() {
        let driver = MockCaptureDriver::new(metrics(1000, 3000)).with_page(page(3000));
        let profile = DeviceProfile::desktop(4, 1000);
        let rects = DeviceRectangles::desktop(4, 1000);

        let frames = FullPageStitcher::new(fast())
            .capture_frames(&driver, &driver.metrics, &rects)
            .await
            .unwrap();
        let ys: Vec<_> = frames.iter().map(|f| f.canvas_y_position).collect();
        assert_eq!(ys, vec![0, 1000, 2000]);

        let stitched = FullPageStitcher::new(fast())
            .stitch(&driver, &driver.metrics, &rects, &profile)
            .await
            .unwrap();
        assert_eq!((stitched.width, stitched.height), (4, 3000));
        assert_eq!(row_id(&stitched.image, 2999), 2999);
    }

    #[tokio::test]
    async fn test_last_frame_bottom_aligned() {
        let driver = MockCaptureDriver::new(metrics(1000, 2500)).with_page(page(2500));
        let profile = DeviceProfile::desktop(4, 1000);
        let rects = DeviceRectangles::desktop(4, 1000);

        let stitched = FullPageStitcher::new(fast())
            .stitch(&driver, &driver.metrics, &rects, &profile)
            .await
            .unwrap();
        assert_eq!(stitched.height, 2500);
        for y in [0, 999, 1000, 1999, 2000, 2499] {
            assert_eq!(row_id(&stitched.image, y), y);
        }
        // browser clamped the last scroll
        assert_eq!(driver.scroll_position(), 1500);
    }

    #[tokio::test]
    async fn test_hide_after_first_scroll_and_restore() {
        let driver = MockCaptureDriver::new(metrics(100, 300)).with_page(page(300));
        let rects = DeviceRectangles::desktop(4, 100);
        let config = fast().with_hide_after_first_scroll(vec!["#sticky".into()]);

        FullPageStitcher::new(config)
            .capture_frames(&driver, &driver.metrics, &rects)
            .await
            .unwrap();

        let history = driver.history();
        let hide = history
            .iter()
            .position(|c| c == "set_elements_hidden:#sticky:true")
            .unwrap();
        let second_scroll = history.iter().position(|c| c == "scroll_to:100").unwrap();
        let first_capture = history.iter().position(|c| c == "capture_screen").unwrap();
        assert!(first_capture < second_scroll && second_scroll < hide);
        assert_eq!(history.last().unwrap(), "set_elements_hidden:#sticky:false");
        assert!(driver.hidden_selectors().is_empty());
    }

    #[tokio::test]
    async fn test_capture_error_aborts_stitch() {
        let driver = MockCaptureDriver::new(metrics(100, 300))
            .with_page(page(300))
            .failing_capture_at(1);
        let rects = DeviceRectangles::desktop(4, 100);
        let config = fast().with_hide_after_first_scroll(vec!["#sticky".into()]);

        let err = FullPageStitcher::new(config)
            .stitch(&driver, &driver.metrics, &rects, &DeviceProfile::desktop(4, 100))
            .await
            .unwrap_err();
        assert!(matches!(err, VisregError::CaptureFailure { .. }));
        assert!(!driver.was_called("scroll_to:200"));
        assert!(driver.hidden_selectors().is_empty());
    }

    #[test]
    fn test_shadow_trim_leaves_edges_transparent() {
        let frames = vec![
            CaptureFrame {
                image: solid(10, [255, 0, 0, 255]),
                canvas_y_position: 0,
                usable_height: 10,
            },
            CaptureFrame {
                image: solid(10, [0, 0, 255, 255]),
                canvas_y_position: 10,
                usable_height: 10,
            },
        ];
        let trim = ShadowTrim { top: 2, bottom: 3 };
        let s = FullPageStitcher::composite(&frames, 4, 20, 1.0, trim).unwrap();
        assert_eq!(s.image.get_pixel(0, 1)[3], 0);
        assert_eq!(*s.image.get_pixel(0, 2), Rgba([255, 0, 0, 255]));
        assert_eq!(*s.image.get_pixel(0, 16), Rgba([0, 0, 255, 255]));
        assert_eq!(s.image.get_pixel(0, 17)[3], 0);
    }

    #[test]
    fn test_shadow_trim_mobile_only() {
        let config = StitchConfig::default();
        assert_eq!(
            config.shadow_trim(&DeviceProfile::desktop(100, 100)),
            ShadowTrim::default()
        );
        let phone = DeviceProfile::mobile(
            Platform::Ios,
            OsVersion::new(16, 0, 0),
            (1170, 2532),
            (1170, 2000),
        )
        .with_device_pixel_ratio(3.0);
        assert_eq!(config.shadow_trim(&phone), ShadowTrim { top: 18, bottom: 18 });
    }

    #[test]
    fn test_composite_without_frames_fails() {
        assert!(FullPageStitcher::composite(&[], 4, 10, 1.0, ShadowTrim::default()).is_err());
    }

    /// Frame `index` whose rows carry their own source row number
    fn tagged(index: usize, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(2, height, |_, r| {
            Rgba([index as u8, (r % 256) as u8, (r / 256) as u8, 255])
        }))
    }

    proptest! {
        #[test]
        fn prop_every_row_comes_from_exactly_one_frame(
            units in 4u32..50,
            full_height in 1u32..3000,
            dpr in prop::sample::select(vec![1.0, 1.5, 2.0, 2.625, 3.0]),
        ) {
            let inner = units * 8;
            let frame_height = scale_round(inner, dpr);
            let frames: Vec<_> = plan(inner, full_height)
                .unwrap()
                .into_iter()
                .map(|s| CaptureFrame {
                    image: tagged(s.index, frame_height),
                    canvas_y_position: s.canvas_y,
                    usable_height: s.usable_height,
                })
                .collect();
            let last = frames.len() as u32 - 1;

            let s = FullPageStitcher::composite(&frames, 2, full_height, dpr, ShadowTrim::default())
                .unwrap();
            for y in 0..s.height {
                let p = *s.image.get_pixel(1, y);
                prop_assert_eq!(p, *s.image.get_pixel(0, y));
                prop_assert_eq!(p[3], 255);

                let frame = (y / frame_height).min(last);
                // the last of several frames is pinned to the document bottom
                let source_row = if frame == last && last > 0 {
                    frame_height - (s.height - y)
                } else {
                    y - frame * frame_height
                };
                prop_assert_eq!(u32::from(p[0]), frame);
                prop_assert_eq!(u32::from(p[1]) + u32::from(p[2]) * 256, source_row);
            }
        }

        #[test]
        fn prop_height_matches_document(
            units in 1u32..50,
            full_height in 1u32..3000,
            dpr in prop::sample::select(vec![1.0, 1.5, 2.0, 2.625, 3.0]),
        ) {
            // Multiples of 8 keep the device viewport height integral
            let inner = units * 8;
            let frame_height = scale_round(inner, dpr);
            let frames: Vec<_> = plan(inner, full_height)
                .unwrap()
                .into_iter()
                .map(|s| CaptureFrame {
                    image: solid(frame_height, [1, 2, 3, 255]),
                    canvas_y_position: s.canvas_y,
                    usable_height: s.usable_height,
                })
                .collect();

            let s = FullPageStitcher::composite(&frames, 1, full_height, dpr, ShadowTrim::default())
                .unwrap();
            let expected = f64::from(full_height) * dpr;
            prop_assert!((f64::from(s.height) - expected).abs() <= 1.0);
            prop_assert!((0..s.height).all(|y| s.image.get_pixel(0, y)[3] == 255));
        }
    }
}
