//! Visreg: visual regression engine for browser and mobile automation
//!
//! Screenshots taken during automation contain device chrome and only ever
//! show one viewport at a time. Visreg resolves the chrome geometry of the
//! device, normalizes captures to the requested region (stitching full pages
//! from scrolled frames), compares them against stored baselines and groups
//! the mismatched pixels into reviewable boxes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  ComparisonOrchestrator                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Geometry   │    │ Capture    │    │ Compositor │            │
//! │   │ Resolver   │───►│ Session    │───►│ / Stitcher │            │
//! │   └────────────┘    └────────────┘    └─────┬──────┘            │
//! │                                             ▼                    │
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Report /   │◄───│ Cluster    │◄───│ PixelDiff  │            │
//! │   │ Artifacts  │    │ Worker     │    │ Engine     │            │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

pub mod capture;
pub mod cluster;
mod compositor;
pub mod config;
mod engine;
pub mod geometry;
pub mod logging;
pub mod masking;
mod orchestrator;
pub mod report;
mod result;
pub mod stitch;
pub mod store;

pub use capture::{
    CaptureCapabilities, CaptureDriver, CaptureOptions, CaptureOutput, CaptureStrategy,
    CaptureTarget, DomMetrics, MockCaptureDriver, RawCapture, ScreenshotCaptureSession,
};
pub use cluster::{cluster_pixels, ClusterWorker, DEFAULT_PROXIMITY};
pub use compositor::{decode, encode_png, BezelMask, ComposedImage, ImageCompositor};
pub use config::CompareConfig;
pub use engine::{
    DiffFlags, DiffOutput, DiffPixel, PixelDiffEngine, Tolerance, ToleranceDiffEngine,
};
pub use geometry::{
    BoundingBox, DeviceContext, DeviceGeometryResolver, DeviceProfile, DeviceRectangles,
    Orientation, OsVersion, Platform, Rectangle,
};
pub use masking::{DeviceBlockOuts, IgnoreRegion, RegionSource};
pub use orchestrator::{
    round_mismatch, ActualImage, ComparisonOrchestrator, ComparisonRequest, ComparisonResult,
};
pub use report::{ComparisonReport, FileData, ImageSize, ReportBoundingBoxes, ReportMetadata};
pub use result::{VisregError, VisregResult};
pub use stitch::{CaptureFrame, FullPageStitcher, StitchConfig, StitchedImage};
pub use store::{ArtifactKind, ArtifactStore, FsArtifactStore};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        CaptureDriver, CaptureTarget, CompareConfig, ComparisonOrchestrator, ComparisonRequest,
        ComparisonResult, DeviceContext, DeviceProfile, DiffFlags, IgnoreRegion, Rectangle,
        VisregError, VisregResult,
    };
}
