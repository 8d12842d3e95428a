//! JSON report consumed by the reporting layer.

use crate::geometry::BoundingBox;
use serde::{Deserialize, Serialize};

/// Caller-supplied context copied into the report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReportMetadata {
    /// Test description
    pub description: String,
    /// Test title
    pub test: String,
    /// Screenshot tag
    pub tag: String,
    /// Browser/device instance details
    pub instance_data: serde_json::Value,
    /// Command that produced the capture
    pub command_name: String,
    /// Test framework
    pub framework: String,
}

impl ReportMetadata {
    /// Metadata for `tag`
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Set test description and title
    #[must_use]
    pub fn with_test(mut self, description: impl Into<String>, test: impl Into<String>) -> Self {
        self.description = description.into();
        self.test = test.into();
        self
    }

    /// Set command name
    #[must_use]
    pub fn with_command_name(mut self, command: impl Into<String>) -> Self {
        self.command_name = command.into();
        self
    }

    /// Set framework
    #[must_use]
    pub fn with_framework(mut self, framework: impl Into<String>) -> Self {
        self.framework = framework.into();
        self
    }

    /// Set instance data
    #[must_use]
    pub fn with_instance_data(mut self, data: serde_json::Value) -> Self {
        self.instance_data = data;
        self
    }
}

/// Image dimensions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

/// Artifact locations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    /// Actual image path
    pub actual_file_path: String,
    /// Baseline image path
    pub baseline_file_path: String,
    /// Diff image path (empty when no diff was written)
    pub diff_file_path: String,
    /// File name shared by all artifacts
    pub file_name: String,
    /// Actual image size
    pub size: ImageSize,
}

/// Diff and ignored boxes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportBoundingBoxes {
    /// One box per diff cluster
    pub diff_bounding_boxes: Vec<BoundingBox>,
    /// Masked regions
    pub ignored_boxes: Vec<BoundingBox>,
}

/// Report side-car for one comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    /// Test description
    pub description: String,
    /// Test title
    pub test: String,
    /// Screenshot tag
    pub tag: String,
    /// Browser/device instance details
    pub instance_data: serde_json::Value,
    /// Command that produced the capture
    pub command_name: String,
    /// Test framework
    pub framework: String,
    /// Diff and ignored boxes
    pub bounding_boxes: ReportBoundingBoxes,
    /// Artifact locations
    pub file_data: FileData,
    /// Reported mismatch, as text
    pub mis_match_percentage: String,
    /// Unrounded mismatch
    pub raw_mis_match_percentage: f64,
}

impl ComparisonReport {
    /// Assemble a report
    #[must_use]
    pub fn new(
        metadata: ReportMetadata,
        bounding_boxes: ReportBoundingBoxes,
        file_data: FileData,
        mismatch_percentage: f64,
        raw_mismatch_percentage: f64,
    ) -> Self {
        Self {
            description: metadata.description,
            test: metadata.test,
            tag: metadata.tag,
            instance_data: metadata.instance_data,
            command_name: metadata.command_name,
            framework: metadata.framework,
            bounding_boxes,
            file_data,
            mis_match_percentage: mismatch_percentage.to_string(),
            raw_mis_match_percentage: raw_mismatch_percentage,
        }
    }

    /// Pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
