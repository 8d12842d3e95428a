//! Comparison configuration.
//!
//! Loadable from YAML or JSON; every field is optional and falls back to its
//! default.

use crate::capture::CaptureOptions;
use crate::cluster::DEFAULT_PROXIMITY;
use crate::engine::DiffFlags;
use crate::masking::DeviceBlockOuts;
use crate::result::{VisregError, VisregResult};
use crate::stitch::{StitchConfig, DEFAULT_SHADOW_PADDING};
use crate::store::FsArtifactStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    /// Store the actual image as baseline when none exists
    pub auto_save_baseline: bool,
    /// Write the diff image only above this mismatch percentage
    pub save_above_tolerance: f64,
    /// Highest mismatch percentage that still passes
    pub tolerance: f64,
    /// Report the unrounded mismatch percentage
    pub raw_mismatch_percentage: bool,
    /// Downscale the larger image when sizes differ
    pub scale_images_to_same_size: bool,
    /// Cluster gap in pixels
    pub cluster_proximity: u32,
    /// Block out the status and address bar
    pub block_out_status_bar: bool,
    /// Block out the tool bar or home indicator
    pub block_out_tool_bar: bool,
    /// Block out tablet side bars
    pub block_out_side_bar: bool,
    /// Write a JSON side-car report
    pub write_json_report: bool,
    /// Comparison sensitivity
    pub diff_flags: DiffFlags,
    /// Settle time per full-page scroll step, milliseconds
    pub full_page_scroll_timeout_ms: u64,
    /// Selectors hidden from the second scroll step on
    pub hide_after_first_scroll: Vec<String>,
    /// Never use the direct region capture primitive
    pub force_legacy_capture: bool,
    /// Round the corners of iOS report images
    pub add_ios_bezel_corners: bool,
    /// Address bar shadow in points, mobile full-page only
    pub address_bar_shadow_padding: u32,
    /// Tool bar shadow in points, mobile full-page only
    pub tool_bar_shadow_padding: u32,
    /// Baseline image directory
    pub baseline_dir: PathBuf,
    /// Actual image directory
    pub actual_dir: PathBuf,
    /// Diff image directory
    pub diff_dir: PathBuf,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            auto_save_baseline: true,
            save_above_tolerance: 0.0,
            tolerance: 0.0,
            raw_mismatch_percentage: false,
            scale_images_to_same_size: false,
            cluster_proximity: DEFAULT_PROXIMITY,
            block_out_status_bar: false,
            block_out_tool_bar: false,
            block_out_side_bar: false,
            write_json_report: false,
            diff_flags: DiffFlags::default(),
            full_page_scroll_timeout_ms: 1500,
            hide_after_first_scroll: Vec::new(),
            force_legacy_capture: false,
            add_ios_bezel_corners: false,
            address_bar_shadow_padding: DEFAULT_SHADOW_PADDING,
            tool_bar_shadow_padding: DEFAULT_SHADOW_PADDING,
            baseline_dir: PathBuf::from(".visreg/baseline"),
            actual_dir: PathBuf::from(".visreg/actual"),
            diff_dir: PathBuf::from(".visreg/diff"),
        }
    }
}

impl CompareConfig {
    /// Load configuration from YAML string
    ///
    /// # Errors
    /// Returns error if YAML parsing fails
    pub fn from_yaml_str(yaml: &str) -> VisregResult<Self> {
        serde_yaml_ng::from_str(yaml)
            .map_err(|e| VisregError::config(format!("Failed to parse YAML config: {e}")))
    }

    /// Load configuration from JSON string
    ///
    /// # Errors
    /// Returns error if JSON parsing fails
    pub fn from_json_str(json: &str) -> VisregResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| VisregError::config(format!("Failed to parse JSON config: {e}")))
    }

    /// Load from a `.json`, `.yaml` or `.yml` file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn from_file(path: &Path) -> VisregResult<Self> {
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            Some("yaml" | "yml") => Self::from_yaml_str(&text),
            other => Err(VisregError::config(format!(
                "Unsupported config extension {other:?} for {}",
                path.display()
            ))),
        }
    }

    /// Serialize to YAML
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_yaml(&self) -> VisregResult<String> {
        serde_yaml_ng::to_string(self)
            .map_err(|e| VisregError::config(format!("Failed to serialize config: {e}")))
    }

    /// Set auto-save of missing baselines
    #[must_use]
    pub const fn with_auto_save_baseline(mut self, enabled: bool) -> Self {
        self.auto_save_baseline = enabled;
        self
    }

    /// Set pass tolerance, in percent
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the diff image threshold, in percent
    #[must_use]
    pub const fn with_save_above_tolerance(mut self, tolerance: f64) -> Self {
        self.save_above_tolerance = tolerance;
        self
    }

    /// Report unrounded mismatch
    #[must_use]
    pub const fn with_raw_mismatch_percentage(mut self, raw: bool) -> Self {
        self.raw_mismatch_percentage = raw;
        self
    }

    /// Enable same-size scaling
    #[must_use]
    pub const fn with_scale_images_to_same_size(mut self, scale: bool) -> Self {
        self.scale_images_to_same_size = scale;
        self
    }

    /// Set cluster proximity
    #[must_use]
    pub const fn with_cluster_proximity(mut self, proximity: u32) -> Self {
        self.cluster_proximity = proximity;
        self
    }

    /// Set diff flags
    #[must_use]
    pub const fn with_diff_flags(mut self, flags: DiffFlags) -> Self {
        self.diff_flags = flags;
        self
    }

    /// Set device block-outs
    #[must_use]
    pub const fn with_block_outs(mut self, block_outs: DeviceBlockOuts) -> Self {
        self.block_out_status_bar = block_outs.status_bar;
        self.block_out_tool_bar = block_outs.tool_bar;
        self.block_out_side_bar = block_outs.side_bar;
        self
    }

    /// Enable the JSON report
    #[must_use]
    pub const fn with_json_report(mut self, enabled: bool) -> Self {
        self.write_json_report = enabled;
        self
    }

    /// Set full-page settle delay
    #[must_use]
    pub const fn with_full_page_scroll_timeout_ms(mut self, ms: u64) -> Self {
        self.full_page_scroll_timeout_ms = ms;
        self
    }

    /// Force legacy capture
    #[must_use]
    pub const fn with_force_legacy_capture(mut self, legacy: bool) -> Self {
        self.force_legacy_capture = legacy;
        self
    }

    /// Put all artifact directories under `root`
    #[must_use]
    pub fn with_artifact_root(mut self, root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        self.baseline_dir = root.join("baseline");
        self.actual_dir = root.join("actual");
        self.diff_dir = root.join("diff");
        self
    }

    /// Device chrome block-outs
    #[must_use]
    pub const fn block_outs(&self) -> DeviceBlockOuts {
        DeviceBlockOuts {
            status_bar: self.block_out_status_bar,
            tool_bar: self.block_out_tool_bar,
            side_bar: self.block_out_side_bar,
        }
    }

    /// Capture settings
    #[must_use]
    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            force_legacy: self.force_legacy_capture,
            add_bezel_corners: self.add_ios_bezel_corners,
            stitch: StitchConfig::default()
                .with_settle_delay(Duration::from_millis(self.full_page_scroll_timeout_ms))
                .with_hide_after_first_scroll(self.hide_after_first_scroll.clone())
                .with_shadow_padding(self.address_bar_shadow_padding, self.tool_bar_shadow_padding),
        }
    }

    /// Filesystem store over the configured directories
    #[must_use]
    pub fn artifact_store(&self) -> FsArtifactStore {
        FsArtifactStore::new(&self.baseline_dir, &self.actual_dir, &self.diff_dir)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CompareConfig::default();
        assert!(config.auto_save_baseline);
        assert_eq!(config.cluster_proximity, 5);
        assert_eq!(config.full_page_scroll_timeout_ms, 1500);
        assert_eq!(config.address_bar_shadow_padding, 6);
        assert!(config.block_outs().is_empty());
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r"
tolerance: 0.5
block_out_status_bar: true
hide_after_first_scroll:
  - '#header'
diff_flags:
  ignoreAntialiasing: true
";
        let config = CompareConfig::from_yaml_str(yaml).unwrap();
        assert!((config.tolerance - 0.5).abs() < f64::EPSILON);
        assert!(config.block_outs().status_bar);
        assert!(config.diff_flags.ignore_antialiasing);
        assert_eq!(config.cluster_proximity, 5);

        let options = config.capture_options();
        assert_eq!(options.stitch.hide_after_first_scroll, vec!["#header"]);
        assert_eq!(options.stitch.settle_delay, Duration::from_millis(1500));
    }

    #[test]
    fn test_json_config() {
        let json = r#"{"raw_mismatch_percentage": true, "cluster_proximity": 12}"#;
        let config = CompareConfig::from_json_str(json).unwrap();
        assert!(config.raw_mismatch_percentage);
        assert_eq!(config.cluster_proximity, 12);
    }

    #[test]
    fn test_invalid_config_is_config_error() {
        let err = CompareConfig::from_yaml_str("tolerance: [").unwrap_err();
        assert!(matches!(err, VisregError::Config { .. }));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("visreg.yml");
        std::fs::write(&yaml, "write_json_report: true\n").unwrap();
        assert!(CompareConfig::from_file(&yaml).unwrap().write_json_report);

        let toml = dir.path().join("visreg.toml");
        std::fs::write(&toml, "").unwrap();
        assert!(CompareConfig::from_file(&toml).is_err());
    }

    #[test]
    fn test_artifact_root() {
        let config = CompareConfig::default().with_artifact_root("/tmp/run");
        assert_eq!(config.diff_dir, PathBuf::from("/tmp/run/diff"));
    }
}
