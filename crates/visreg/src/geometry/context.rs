//! Caller-owned geometry cache.

use super::{DeviceGeometryResolver, DeviceProfile, DeviceRectangles, Orientation};
use crate::capture::WebviewBounds;
use tracing::debug;

/// Device profile plus lazily resolved [`DeviceRectangles`].
///
/// Owned by the automation session and passed explicitly. Orientation or
/// execution-context changes only set the dirty flag; the rectangles are
/// recomputed in-line on the next read. Measured native webview bounds live
/// here too and are dropped with the same flag.
#[derive(Debug, Clone)]
pub struct DeviceContext {
    profile: DeviceProfile,
    cached: Option<DeviceRectangles>,
    dirty: bool,
    resolutions: u64,
    webview: Option<WebviewBounds>,
}

impl DeviceContext {
    /// Create a context; nothing is resolved until the first read
    #[must_use]
    pub const fn new(profile: DeviceProfile) -> Self {
        Self {
            profile,
            cached: None,
            dirty: true,
            resolutions: 0,
            webview: None,
        }
    }

    /// Current device profile
    #[must_use]
    pub const fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    /// Device rectangles, recomputed first if the dirty flag is set
    pub fn rectangles(&mut self) -> DeviceRectangles {
        match self.cached {
            Some(rects) if !self.dirty => rects,
            _ => {
                let rects = DeviceGeometryResolver::resolve(&self.profile);
                self.cached = Some(rects);
                self.dirty = false;
                self.resolutions += 1;
                debug!(resolutions = self.resolutions, "device rectangles recomputed");
                rects
            }
        }
    }

    /// Cached rectangles without recomputing; `None` when dirty
    #[must_use]
    pub fn cached(&self) -> Option<DeviceRectangles> {
        if self.dirty {
            None
        } else {
            self.cached
        }
    }

    /// Record an orientation change
    pub fn set_orientation(&mut self, orientation: Orientation) {
        if self.profile.orientation != orientation {
            self.profile = self.profile.with_orientation(orientation);
            self.mark_dirty();
        }
    }

    /// Replace the profile after an execution-context switch
    pub fn replace_profile(&mut self, profile: DeviceProfile) {
        if self.profile != profile {
            self.profile = profile;
            self.mark_dirty();
        }
    }

    /// Force recomputation on the next read
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        self.webview = None;
    }

    /// Calibrated webview bounds, kept until the context is marked dirty
    #[must_use]
    pub const fn webview_bounds(&self) -> Option<WebviewBounds> {
        self.webview
    }

    /// Remember calibrated webview bounds
    pub fn set_webview_bounds(&mut self, bounds: WebviewBounds) {
        self.webview = Some(bounds);
    }

    /// Whether the next read recomputes
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// How many times the rectangles have been resolved
    #[must_use]
    pub const fn resolutions(&self) -> u64 {
        self.resolutions
    }
}
