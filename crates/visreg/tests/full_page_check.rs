//! End-to-end full-page checks against the mock driver.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use image::{GenericImageView, Rgba, RgbaImage};
use visreg::{
    BoundingBox, CaptureCapabilities, CaptureTarget, CompareConfig, ComparisonOrchestrator,
    DeviceContext, DeviceProfile, DomMetrics, IgnoreRegion, MockCaptureDriver, Orientation,
    OsVersion, Platform, Rectangle,
};

fn page() -> RgbaImage {
    RgbaImage::from_fn(200, 1000, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, (y / 256) as u8, 255])
    })
}

fn metrics() -> DomMetrics {
    DomMetrics {
        scroll_height: 500,
        inner_width: 100,
        inner_height: 200,
        device_pixel_ratio: 2.0,
        orientation: Orientation::Portrait,
    }
}

fn context() -> DeviceContext {
    let profile = DeviceProfile::mobile(
        Platform::Android,
        OsVersion::new(11, 0, 0),
        (200, 480),
        (200, 400),
    )
    .with_device_pixel_ratio(2.0)
    .with_native_web_screenshot(false);
    DeviceContext::new(profile)
}

fn config(root: &std::path::Path) -> CompareConfig {
    let mut config = CompareConfig::default()
        .with_artifact_root(root)
        .with_full_page_scroll_timeout_ms(0)
        .with_json_report(true);
    config.address_bar_shadow_padding = 0;
    config.tool_bar_shadow_padding = 0;
    config
}

#[tokio::test]
async fn test_full_page_baseline_is_the_whole_document() {
    let dir = tempfile::tempdir().unwrap();
    let orch = ComparisonOrchestrator::from_config(config(dir.path()));
    let driver = MockCaptureDriver::new(metrics()).with_page(page());
    let mut ctx = context();

    let result = orch
        .check(&driver, &mut ctx, CaptureTarget::FullPage, "landing", Vec::new())
        .await
        .unwrap();
    assert!(result.is_new_baseline);
    assert_eq!(driver.call_count("capture_screen"), 3);

    let baseline = image::open(dir.path().join("baseline/landing.png")).unwrap();
    assert_eq!(baseline.dimensions(), (200, 1000));
    let expected = page();
    for y in [0, 399, 400, 799, 800, 999] {
        assert_eq!(baseline.get_pixel(17, y), *expected.get_pixel(17, y), "row {y}");
    }
}

#[tokio::test]
async fn test_full_page_change_is_boxed_and_reported() {
    let dir = tempfile::tempdir().unwrap();
    let orch = ComparisonOrchestrator::from_config(config(dir.path()));
    let mut ctx = context();

    let driver = MockCaptureDriver::new(metrics()).with_page(page());
    orch.check(&driver, &mut ctx, CaptureTarget::FullPage, "landing", Vec::new())
        .await
        .unwrap();

    let mut changed = page();
    for y in 700..720 {
        for x in 50..90 {
            changed.put_pixel(x, y, Rgba([255, 255, 255, 255]));
        }
    }
    let driver = MockCaptureDriver::new(metrics()).with_page(changed.clone());
    let result = orch
        .check(&driver, &mut ctx, CaptureTarget::FullPage, "landing", Vec::new())
        .await
        .unwrap();

    assert!(!result.passed);
    assert_eq!(result.diff_bounding_boxes, vec![BoundingBox::new(50, 700, 89, 719)]);
    assert!(std::path::Path::new(&result.file_data.diff_file_path).exists());

    let report: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("actual/landing.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(report["tag"], "landing");
    assert_eq!(report["boundingBoxes"]["diffBoundingBoxes"][0]["top"], 700);

    let driver = MockCaptureDriver::new(metrics()).with_page(changed);
    let ignored = orch
        .check(
            &driver,
            &mut ctx,
            CaptureTarget::FullPage,
            "landing",
            vec![IgnoreRegion::ignore(Rectangle::new(40, 690, 60, 40))],
        )
        .await
        .unwrap();
    assert!(ignored.passed);
    assert!(ignored.diff_bounding_boxes.is_empty());
}

#[tokio::test]
async fn test_direct_capture_skips_scrolling() {
    let dir = tempfile::tempdir().unwrap();
    let orch = ComparisonOrchestrator::from_config(config(dir.path()));
    let mut ctx = context();
    let driver = MockCaptureDriver::new(metrics())
        .with_capabilities(CaptureCapabilities {
            direct_region: true,
            native_webview: false,
        })
        .with_region(page());

    orch.check(&driver, &mut ctx, CaptureTarget::FullPage, "direct", Vec::new())
        .await
        .unwrap();
    assert!(driver.was_called("capture_region:0,0,100,500"));
    assert!(!driver.was_called("scroll_to"));
}
