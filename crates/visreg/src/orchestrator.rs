//! Top-level comparison entry point.
//!
//! ```text
//! actual ──decode──┐
//!                  ├─ scale? ─ mask ─ PixelDiffEngine ─ ClusterWorker ─ result
//! baseline ─load───┘                         │
//!                                            └─ diff image / JSON report
//! ```

use crate::capture::{CaptureDriver, CaptureTarget, ScreenshotCaptureSession};
use crate::cluster::ClusterWorker;
use crate::compositor::{self, ImageCompositor};
use crate::config::CompareConfig;
use crate::engine::{DiffFlags, PixelDiffEngine, ToleranceDiffEngine};
use crate::geometry::{BoundingBox, DeviceContext, DeviceRectangles};
use crate::masking::{mask_pair, IgnoreRegion};
use crate::report::{ComparisonReport, FileData, ImageSize, ReportBoundingBoxes, ReportMetadata};
use crate::result::{VisregError, VisregResult};
use crate::store::{ArtifactKind, ArtifactStore, FsArtifactStore};
use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// The image under test
#[derive(Debug, Clone)]
pub enum ActualImage {
    /// Encoded PNG/JPEG bytes
    Encoded(Vec<u8>),
    /// Already decoded
    Decoded(DynamicImage),
}

impl From<Vec<u8>> for ActualImage {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Encoded(bytes)
    }
}

impl From<DynamicImage> for ActualImage {
    fn from(image: DynamicImage) -> Self {
        Self::Decoded(image)
    }
}

/// One compare invocation
#[derive(Debug, Clone)]
pub struct ComparisonRequest {
    /// Artifact name, without extension
    pub name: String,
    /// Image under test
    pub actual: ActualImage,
    /// Cosmetic copy stored as the actual artifact instead of `actual`
    pub report_image: Option<DynamicImage>,
    /// Regions masked out of both images
    pub ignore_regions: Vec<IgnoreRegion>,
    /// Device chrome, for device block-outs on full-screen images
    pub device_rectangles: Option<DeviceRectangles>,
    /// Overrides the configured diff flags
    pub diff_flags: Option<DiffFlags>,
    /// Overrides the configured pass tolerance
    pub tolerance: Option<f64>,
    /// Report context
    pub metadata: ReportMetadata,
}

impl ComparisonRequest {
    /// Request comparing `actual` against the baseline called `name`
    #[must_use]
    pub fn new(name: impl Into<String>, actual: impl Into<ActualImage>) -> Self {
        let name = name.into();
        Self {
            metadata: ReportMetadata::new(name.clone()),
            name,
            actual: actual.into(),
            report_image: None,
            ignore_regions: Vec::new(),
            device_rectangles: None,
            diff_flags: None,
            tolerance: None,
        }
    }

    /// Add an ignore or block-out region
    #[must_use]
    pub fn with_region(mut self, region: IgnoreRegion) -> Self {
        self.ignore_regions.push(region);
        self
    }

    /// Set all ignore regions
    #[must_use]
    pub fn with_regions(mut self, regions: Vec<IgnoreRegion>) -> Self {
        self.ignore_regions = regions;
        self
    }

    /// Attach device rectangles
    #[must_use]
    pub const fn with_device_rectangles(mut self, rects: DeviceRectangles) -> Self {
        self.device_rectangles = Some(rects);
        self
    }

    /// Override diff flags
    #[must_use]
    pub const fn with_diff_flags(mut self, flags: DiffFlags) -> Self {
        self.diff_flags = Some(flags);
        self
    }

    /// Override pass tolerance
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    /// Set report metadata
    #[must_use]
    pub fn with_metadata(mut self, metadata: ReportMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Set the cosmetic report image
    #[must_use]
    pub fn with_report_image(mut self, image: Option<DynamicImage>) -> Self {
        self.report_image = image;
        self
    }
}

/// Outcome of one comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    /// Unrounded mismatch, 0..=100
    pub raw_mismatch_percentage: f64,
    /// Reported mismatch (3 decimals unless raw reporting is on)
    pub mismatch_percentage: f64,
    /// One box per diff cluster, sorted by (top, left)
    pub diff_bounding_boxes: Vec<BoundingBox>,
    /// Masked regions
    pub ignored_boxes: Vec<BoundingBox>,
    /// The actual image was stored as the new baseline
    pub is_new_baseline: bool,
    /// No pixel differs
    pub is_exact_match: bool,
    /// Mismatch within tolerance
    pub passed: bool,
    /// Artifact locations
    pub file_data: FileData,
}

/// Round to three decimals
#[must_use]
pub fn round_mismatch(raw: f64) -> f64 {
    (raw * 1000.0).round() / 1000.0
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Drives one comparison from images to result
#[derive(Debug, Clone)]
pub struct ComparisonOrchestrator<E = ToleranceDiffEngine, S = FsArtifactStore> {
    engine: E,
    store: S,
    config: CompareConfig,
    worker: ClusterWorker,
}

impl ComparisonOrchestrator {
    /// Tolerance engine over the configured directories
    #[must_use]
    pub fn from_config(config: CompareConfig) -> Self {
        let store = config.artifact_store();
        Self::new(ToleranceDiffEngine::new(), store, config)
    }
}

impl<E: PixelDiffEngine, S: ArtifactStore> ComparisonOrchestrator<E, S> {
    /// Create an orchestrator
    #[must_use]
    pub fn new(engine: E, store: S, config: CompareConfig) -> Self {
        Self {
            engine,
            store,
            config,
            worker: ClusterWorker::new(),
        }
    }

    /// Replace the cluster worker
    #[must_use]
    pub const fn with_cluster_worker(mut self, worker: ClusterWorker) -> Self {
        self.worker = worker;
        self
    }

    /// Get configuration
    #[must_use]
    pub const fn config(&self) -> &CompareConfig {
        &self.config
    }

    /// Get the artifact store
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Capture `target` and compare it against the baseline `name`
    pub async fn check<D: CaptureDriver + ?Sized>(
        &self,
        driver: &D,
        context: &mut DeviceContext,
        target: CaptureTarget,
        name: &str,
        ignore_regions: Vec<IgnoreRegion>,
    ) -> VisregResult<ComparisonResult> {
        let mut session = ScreenshotCaptureSession::new(driver, self.config.capture_options());
        let capture = session.capture(&target, context).await?;
        let rects = context.rectangles();

        let request = ComparisonRequest::new(name, capture.image)
            .with_report_image(capture.report_copy)
            .with_regions(ignore_regions)
            .with_device_rectangles(rects);
        self.compare(request).await
    }

    /// Compare `request.actual` with its stored baseline
    pub async fn compare(&self, request: ComparisonRequest) -> VisregResult<ComparisonResult> {
        let ComparisonRequest {
            name,
            actual,
            report_image,
            mut ignore_regions,
            device_rectangles,
            diff_flags,
            tolerance,
            metadata,
        } = request;

        let actual = match actual {
            ActualImage::Encoded(bytes) => compositor::decode(&bytes, "actual")?,
            ActualImage::Decoded(image) => image,
        };
        let (actual_width, actual_height) = actual.dimensions();
        let mut file_data = FileData {
            actual_file_path: path_string(&self.store.path(ArtifactKind::Actual, &name)),
            baseline_file_path: path_string(&self.store.path(ArtifactKind::Baseline, &name)),
            diff_file_path: String::new(),
            file_name: format!("{name}.png"),
            size: ImageSize {
                width: actual_width,
                height: actual_height,
            },
        };

        let actual_png = compositor::encode_png(&actual)?;
        match &report_image {
            Some(copy) => self.persist(ArtifactKind::Actual, &name, &compositor::encode_png(copy)?),
            None => self.persist(ArtifactKind::Actual, &name, &actual_png),
        };

        let Some(baseline_bytes) = self.store.load(ArtifactKind::Baseline, &name)? else {
            if !self.config.auto_save_baseline {
                return Err(VisregError::BaselineMissing { name });
            }
            self.persist(ArtifactKind::Baseline, &name, &actual_png);
            info!(name = %name, "no baseline found, saved actual as new baseline");
            return Ok(ComparisonResult {
                raw_mismatch_percentage: 0.0,
                mismatch_percentage: 0.0,
                diff_bounding_boxes: Vec::new(),
                ignored_boxes: Vec::new(),
                is_new_baseline: true,
                is_exact_match: true,
                passed: true,
                file_data,
            });
        };
        let baseline = compositor::decode(&baseline_bytes, "baseline")?;

        let needs_scaling = actual.dimensions() != baseline.dimensions();
        let (actual, baseline) = if self.config.scale_images_to_same_size && needs_scaling {
            ImageCompositor::downscale_to_match(actual, baseline)
        } else {
            (actual, baseline)
        };
        let mut actual = actual.to_rgba8();
        let mut baseline = baseline.to_rgba8();

        if let Some(rects) = device_rectangles {
            let block_outs = self.config.block_outs();
            let screen = rects.screen_size;
            if !block_outs.is_empty() {
                if actual.dimensions() == (screen.width, screen.height) {
                    ignore_regions.extend(block_outs.regions(&rects));
                } else {
                    debug!(
                        name = %name,
                        "image does not cover the whole screen, skipping device block-outs"
                    );
                }
            }
        }
        let ignored_boxes = mask_pair(&mut actual, &mut baseline, &ignore_regions);

        let flags = diff_flags.unwrap_or(self.config.diff_flags);
        let output = self.engine.compare(&actual, &baseline, &flags)?;
        let raw = output.raw_mismatch_percentage.clamp(0.0, 100.0);
        let mismatch = if self.config.raw_mismatch_percentage {
            raw
        } else {
            round_mismatch(raw)
        };
        let tolerance = tolerance.unwrap_or(self.config.tolerance);
        let passed = mismatch <= tolerance;

        if mismatch > self.config.save_above_tolerance {
            let diff = ImageCompositor::render_diff_image(&actual, &output.diff_pixels);
            let png = compositor::encode_png(&DynamicImage::ImageRgba8(diff))?;
            if let Some(path) = self.persist(ArtifactKind::Diff, &name, &png) {
                file_data.diff_file_path = path_string(&path);
            }
        }

        let diff_bounding_boxes = if raw > 0.0 && !output.diff_pixels.is_empty() {
            self.worker
                .run(output.diff_pixels, self.config.cluster_proximity)
                .await?
        } else {
            Vec::new()
        };

        let result = ComparisonResult {
            raw_mismatch_percentage: raw,
            mismatch_percentage: mismatch,
            diff_bounding_boxes,
            ignored_boxes,
            is_new_baseline: false,
            is_exact_match: raw <= 0.0,
            passed,
            file_data,
        };

        if self.config.write_json_report {
            self.write_report(&name, metadata, &result);
        }

        info!(
            name = %name,
            mismatch = result.mismatch_percentage,
            boxes = result.diff_bounding_boxes.len(),
            passed = result.passed,
            "comparison finished"
        );
        Ok(result)
    }

    fn write_report(&self, name: &str, metadata: ReportMetadata, result: &ComparisonResult) {
        let report = ComparisonReport::new(
            metadata,
            ReportBoundingBoxes {
                diff_bounding_boxes: result.diff_bounding_boxes.clone(),
                ignored_boxes: result.ignored_boxes.clone(),
            },
            result.file_data.clone(),
            result.mismatch_percentage,
            result.raw_mismatch_percentage,
        );
        match report.to_json() {
            Ok(json) => {
                self.persist(ArtifactKind::Report, name, json.as_bytes());
            }
            Err(err) => warn!(name, %err, "failed to serialize comparison report"),
        }
    }

    /// Save an artifact; failures are logged and never fail the comparison
    fn persist(&self, kind: ArtifactKind, name: &str, bytes: &[u8]) -> Option<std::path::PathBuf> {
        match self.store.save(kind, name, bytes) {
            Ok(path) => Some(path),
            Err(err) => {
                warn!(kind = kind.as_str(), name, %err, "failed to persist artifact");
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::capture::{DomMetrics, MockCaptureDriver};
    use crate::engine::DiffPixel;
    use crate::geometry::{DeviceProfile, Orientation, Rectangle};
    use crate::masking::DeviceBlockOuts;
    use image::{Rgba, RgbaImage};
    use std::path::PathBuf;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn white(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, WHITE)
    }

    fn png(image: &RgbaImage) -> Vec<u8> {
        compositor::encode_png(&DynamicImage::ImageRgba8(image.clone())).unwrap()
    }

    fn paint(image: &mut RgbaImage, rect: Rectangle) {
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                image.put_pixel(x, y, RED);
            }
        }
    }

    fn orchestrator(root: &Path, config: CompareConfig) -> ComparisonOrchestrator {
        ComparisonOrchestrator::from_config(config.with_artifact_root(root))
    }

    fn seed_baseline(orch: &ComparisonOrchestrator, name: &str, image: &RgbaImage) {
        orch.store()
            .save(ArtifactKind::Baseline, name, &png(image))
            .unwrap();
    }

    #[tokio::test]
    async fn test_self_compare_strict_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), CompareConfig::default());
        let mut image = white(40, 30);
        paint(&mut image, Rectangle::new(5, 5, 10, 10));
        seed_baseline(&orch, "home", &image);

        let result = orch
            .compare(
                ComparisonRequest::new("home", png(&image)).with_diff_flags(DiffFlags::strict()),
            )
            .await
            .unwrap();
        assert!(result.raw_mismatch_percentage.abs() < f64::EPSILON);
        assert!(result.diff_bounding_boxes.is_empty());
        assert!(result.is_exact_match && result.passed && !result.is_new_baseline);
        assert!(result.file_data.diff_file_path.is_empty());
    }

    #[tokio::test]
    async fn test_missing_baseline_is_auto_saved() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), CompareConfig::default());
        let result = orch
            .compare(ComparisonRequest::new("fresh", png(&white(8, 8))))
            .await
            .unwrap();
        assert!(result.is_new_baseline);
        assert!(result.mismatch_percentage.abs() < f64::EPSILON);
        assert!(dir.path().join("baseline/fresh.png").exists());
        assert!(dir.path().join("actual/fresh.png").exists());
    }

    #[tokio::test]
    async fn test_missing_baseline_without_auto_save() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(
            dir.path(),
            CompareConfig::default().with_auto_save_baseline(false),
        );
        let err = orch
            .compare(ComparisonRequest::new("none", png(&white(8, 8))))
            .await
            .unwrap_err();
        assert!(matches!(err, VisregError::BaselineMissing { ref name } if name == "none"));
    }

    #[tokio::test]
    async fn test_two_distant_changes_give_two_boxes() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), CompareConfig::default());
        seed_baseline(&orch, "page", &white(50, 50));

        let mut actual = white(50, 50);
        paint(&mut actual, Rectangle::new(2, 2, 5, 5));
        paint(&mut actual, Rectangle::new(40, 40, 5, 5));
        let result = orch
            .compare(ComparisonRequest::new("page", png(&actual)))
            .await
            .unwrap();

        assert!((result.raw_mismatch_percentage - 2.0).abs() < 1e-9);
        assert_eq!(
            result.diff_bounding_boxes,
            vec![BoundingBox::new(2, 2, 6, 6), BoundingBox::new(40, 40, 44, 44)]
        );
        assert!(!result.passed);
        assert!(!result.is_exact_match);
        assert!(PathBuf::from(&result.file_data.diff_file_path).exists());
    }

    #[tokio::test]
    async fn test_ignore_region_masks_change() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), CompareConfig::default());
        seed_baseline(&orch, "page", &white(50, 50));

        let mut actual = white(50, 50);
        paint(&mut actual, Rectangle::new(2, 2, 5, 5));
        paint(&mut actual, Rectangle::new(40, 40, 5, 5));
        let request = ComparisonRequest::new("page", png(&actual))
            .with_region(IgnoreRegion::ignore(Rectangle::new(38, 38, 20, 20)));
        let result = orch.compare(request).await.unwrap();

        assert_eq!(result.diff_bounding_boxes, vec![BoundingBox::new(2, 2, 6, 6)]);
        assert_eq!(result.ignored_boxes, vec![BoundingBox::new(38, 38, 49, 49)]);
    }

    #[tokio::test]
    async fn test_rounding_and_raw_mode() {
        let dir = tempfile::tempdir().unwrap();
        let mut actual = white(30, 30);
        actual.put_pixel(3, 3, RED);

        let orch = orchestrator(dir.path(), CompareConfig::default());
        seed_baseline(&orch, "dot", &white(30, 30));
        let rounded = orch
            .compare(ComparisonRequest::new("dot", png(&actual)))
            .await
            .unwrap();
        assert!((rounded.mismatch_percentage - 0.111).abs() < 1e-12);

        let raw_orch = orchestrator(
            dir.path(),
            CompareConfig::default().with_raw_mismatch_percentage(true),
        );
        let raw = raw_orch
            .compare(ComparisonRequest::new("dot", png(&actual)))
            .await
            .unwrap();
        assert!((raw.mismatch_percentage - 100.0 / 900.0).abs() < 1e-12);
        assert_eq!(raw.diff_bounding_boxes, vec![BoundingBox::point(3, 3)]);
    }

    #[tokio::test]
    async fn test_tolerance_passes_small_diff() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), CompareConfig::default().with_tolerance(0.5));
        seed_baseline(&orch, "dot", &white(30, 30));
        let mut actual = white(30, 30);
        actual.put_pixel(3, 3, RED);
        let result = orch
            .compare(ComparisonRequest::new("dot", png(&actual)))
            .await
            .unwrap();
        assert!(result.passed);
        assert!(!result.is_exact_match);
    }

    #[tokio::test]
    async fn test_undecodable_actual() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), CompareConfig::default());
        let err = orch
            .compare(ComparisonRequest::new("x", b"not an image".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, VisregError::DecodeFailure { ref what, .. } if what == "actual"));
    }

    #[tokio::test]
    async fn test_same_size_scaling() {
        let dir = tempfile::tempdir().unwrap();
        let plain = orchestrator(dir.path(), CompareConfig::default());
        seed_baseline(&plain, "big", &white(100, 100));

        let unscaled = plain
            .compare(ComparisonRequest::new("big", png(&white(50, 50))))
            .await
            .unwrap();
        assert!((unscaled.raw_mismatch_percentage - 75.0).abs() < 1e-9);

        let scaling = orchestrator(
            dir.path(),
            CompareConfig::default().with_scale_images_to_same_size(true),
        );
        let scaled = scaling
            .compare(ComparisonRequest::new("big", png(&white(50, 50))))
            .await
            .unwrap();
        assert!(scaled.raw_mismatch_percentage.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_json_report_written() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), CompareConfig::default().with_json_report(true));
        seed_baseline(&orch, "page", &white(20, 20));
        let mut actual = white(20, 20);
        paint(&mut actual, Rectangle::new(0, 0, 2, 2));
        let request = ComparisonRequest::new("page", png(&actual))
            .with_metadata(ReportMetadata::new("page").with_framework("cucumber"));
        orch.compare(request).await.unwrap();

        let json = std::fs::read_to_string(dir.path().join("actual/page.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["framework"], "cucumber");
        assert_eq!(value["misMatchPercentage"], "1");
        assert_eq!(
            value["boundingBoxes"]["diffBoundingBoxes"][0],
            serde_json::json!({"left": 0, "top": 0, "right": 1, "bottom": 1})
        );
        assert_eq!(value["fileData"]["fileName"], "page.png");
    }

    struct ReadOnlyStore {
        baseline: Vec<u8>,
    }

    impl ArtifactStore for ReadOnlyStore {
        fn path(&self, kind: ArtifactKind, name: &str) -> PathBuf {
            PathBuf::from(format!("/readonly/{}/{name}", kind.as_str()))
        }

        fn load(&self, _: ArtifactKind, _: &str) -> VisregResult<Option<Vec<u8>>> {
            Ok(Some(self.baseline.clone()))
        }

        fn save(&self, kind: ArtifactKind, _: &str, _: &[u8]) -> VisregResult<PathBuf> {
            Err(VisregError::persist(kind.as_str(), "read-only"))
        }
    }

    #[tokio::test]
    async fn test_persist_failure_does_not_fail_compare() {
        let baseline = white(10, 10);
        let orch = ComparisonOrchestrator::new(
            ToleranceDiffEngine::new(),
            ReadOnlyStore {
                baseline: png(&baseline),
            },
            CompareConfig::default().with_json_report(true),
        );
        let mut actual = baseline.clone();
        actual.put_pixel(0, 0, RED);
        let result = orch
            .compare(ComparisonRequest::new("ro", png(&actual)))
            .await
            .unwrap();
        assert!((result.raw_mismatch_percentage - 1.0).abs() < 1e-9);
        assert!(result.file_data.diff_file_path.is_empty());
    }

    #[tokio::test]
    async fn test_cluster_worker_failure_is_fatal() {
        fn crash(_: &[DiffPixel], _: u32) -> Vec<BoundingBox> {
            panic!("worker died")
        }
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), CompareConfig::default())
            .with_cluster_worker(ClusterWorker::with_cluster_fn(crash));
        seed_baseline(&orch, "page", &white(10, 10));
        let mut actual = white(10, 10);
        actual.put_pixel(1, 1, RED);
        let err = orch
            .compare(ComparisonRequest::new("page", png(&actual)))
            .await
            .unwrap_err();
        assert!(matches!(err, VisregError::ClusterWorkerFailure { .. }));
    }

    #[tokio::test]
    async fn test_device_block_outs_on_full_screen_image() {
        let dir = tempfile::tempdir().unwrap();
        let config = CompareConfig::default().with_block_outs(DeviceBlockOuts {
            status_bar: true,
            ..DeviceBlockOuts::default()
        });
        let orch = orchestrator(dir.path(), config);
        seed_baseline(&orch, "screen", &white(20, 40));

        let mut rects = DeviceRectangles::desktop(20, 40);
        rects.status_bar_and_address_bar = Rectangle::sized(20, 4);
        let mut actual = white(20, 40);
        paint(&mut actual, Rectangle::new(0, 0, 20, 3));
        let result = orch
            .compare(ComparisonRequest::new("screen", png(&actual)).with_device_rectangles(rects))
            .await
            .unwrap();
        assert!(result.is_exact_match);
        assert_eq!(result.ignored_boxes, vec![BoundingBox::new(0, 0, 19, 3)]);
    }

    #[tokio::test]
    async fn test_check_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), CompareConfig::default());
        let metrics = DomMetrics {
            scroll_height: 30,
            inner_width: 30,
            inner_height: 30,
            device_pixel_ratio: 1.0,
            orientation: Orientation::Portrait,
        };
        let mut screen = white(30, 30);
        let driver = MockCaptureDriver::new(metrics).with_screen(screen.clone());
        let mut context = DeviceContext::new(DeviceProfile::desktop(30, 30));

        let first = orch
            .check(&driver, &mut context, CaptureTarget::Viewport, "e2e", Vec::new())
            .await
            .unwrap();
        assert!(first.is_new_baseline);

        paint(&mut screen, Rectangle::new(10, 10, 3, 3));
        let driver = MockCaptureDriver::new(metrics).with_screen(screen);
        let second = orch
            .check(&driver, &mut context, CaptureTarget::Viewport, "e2e", Vec::new())
            .await
            .unwrap();
        assert_eq!(second.diff_bounding_boxes, vec![BoundingBox::new(10, 10, 12, 12)]);
        assert!(!second.passed);
    }

    #[tokio::test]
    async fn test_repeated_webview_checks_calibrate_once() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), CompareConfig::default());
        let metrics = DomMetrics {
            scroll_height: 30,
            inner_width: 30,
            inner_height: 30,
            device_pixel_ratio: 1.0,
            orientation: Orientation::Portrait,
        };
        let driver = MockCaptureDriver::new(metrics)
            .with_capabilities(crate::capture::CaptureCapabilities {
                direct_region: false,
                native_webview: true,
            })
            .with_screen(white(30, 30));
        let mut context = DeviceContext::new(DeviceProfile::desktop(30, 30));
        let target = CaptureTarget::Element {
            rect: Rectangle::new(5, 5, 10, 10),
            in_native_webview: true,
        };

        for _ in 0..3 {
            let result = orch
                .check(&driver, &mut context, target, "webview", Vec::new())
                .await
                .unwrap();
            assert!(result.passed);
        }
        assert_eq!(driver.call_count("inject_calibration_overlay"), 1);
        assert_eq!(driver.call_count("tap"), 1);
    }
}
