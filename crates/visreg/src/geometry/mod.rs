//! Device geometry: rectangles, device profiles and chrome offset resolution.
//!
//! Raw screenshots from mobile browsers include OS and browser chrome (status
//! bar, address bar, tool bar, home indicator). The resolver turns the screen
//! metrics reported at capture time into named [`DeviceRectangles`] so the
//! compositor can cut the web content out of a capture.

mod context;
mod resolver;
mod tables;

pub use context::DeviceContext;
pub use resolver::DeviceGeometryResolver;
pub use tables::{AndroidOffsets, IosDeviceClass, IosOffsets};

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rectangle {
    /// X coordinate of the top-left corner
    pub x: u32,
    /// Y coordinate of the top-left corner
    pub y: u32,
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl Rectangle {
    /// Create a new rectangle
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A rectangle anchored at the origin
    #[must_use]
    pub const fn sized(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Exclusive right edge
    #[must_use]
    pub const fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge
    #[must_use]
    pub const fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    /// True when the rectangle covers no pixels
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Pixel area
    #[must_use]
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Check if a point is inside the rectangle
    #[must_use]
    pub const fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    /// Intersection with `bounds`. Returns an empty rectangle at the clamped
    /// origin when the two do not overlap.
    #[must_use]
    pub fn clamp_to(&self, bounds: &Self) -> Self {
        let x = self.x.clamp(bounds.x, bounds.right());
        let y = self.y.clamp(bounds.y, bounds.bottom());
        let right = self.right().clamp(x, bounds.right());
        let bottom = self.bottom().clamp(y, bounds.bottom());
        Self::new(x, y, right - x, bottom - y)
    }

    /// Move by a signed offset, saturating at zero
    #[must_use]
    pub fn translate(&self, dx: i64, dy: i64) -> Self {
        let shift = |v: u32, d: i64| (i64::from(v) + d).clamp(0, i64::from(u32::MAX)) as u32;
        Self::new(shift(self.x, dx), shift(self.y, dy), self.width, self.height)
    }

    /// Convert from logical (CSS) pixels to device pixels.
    ///
    /// Every edge is rounded, never floored or ceiled, so repeated captures
    /// land on the same device pixel as the stored baseline.
    #[must_use]
    pub fn to_device(&self, dpr: f64) -> Self {
        let x = scale_round(self.x, dpr);
        let y = scale_round(self.y, dpr);
        let right = scale_round(self.right(), dpr);
        let bottom = scale_round(self.bottom(), dpr);
        Self::new(x, y, right.saturating_sub(x), bottom.saturating_sub(y))
    }

    /// Inclusive bounding box form of this rectangle, `None` when empty
    #[must_use]
    pub fn to_bounding_box(&self) -> Option<BoundingBox> {
        if self.is_empty() {
            return None;
        }
        Some(BoundingBox::new(
            self.x,
            self.y,
            self.right() - 1,
            self.bottom() - 1,
        ))
    }
}

/// Scale a logical length by the device pixel ratio, rounding to nearest
#[must_use]
pub fn scale_round(value: u32, dpr: f64) -> u32 {
    (f64::from(value) * dpr).round().max(0.0) as u32
}

/// Inclusive pixel bounding box as it appears in comparison reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Leftmost column
    pub left: u32,
    /// Topmost row
    pub top: u32,
    /// Rightmost column (inclusive)
    pub right: u32,
    /// Bottommost row (inclusive)
    pub bottom: u32,
}

impl BoundingBox {
    /// Create a new bounding box
    #[must_use]
    pub const fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Box covering a single pixel
    #[must_use]
    pub const fn point(x: u32, y: u32) -> Self {
        Self::new(x, y, x, y)
    }

    /// Grow to include a pixel
    pub fn include(&mut self, x: u32, y: u32) {
        self.left = self.left.min(x);
        self.top = self.top.min(y);
        self.right = self.right.max(x);
        self.bottom = self.bottom.max(y);
    }

    /// Smallest box covering both
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self::new(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }

    /// True when the boxes share at least one pixel
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.left <= other.right
            && other.left <= self.right
            && self.top <= other.bottom
            && other.top <= self.bottom
    }

    /// Check if a pixel lies inside the box
    #[must_use]
    pub const fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }

    /// Convert to a half-open rectangle
    #[must_use]
    pub const fn to_rectangle(&self) -> Rectangle {
        Rectangle::new(
            self.left,
            self.top,
            self.right - self.left + 1,
            self.bottom - self.top + 1,
        )
    }
}

/// Named chrome regions for one device in one orientation, in device pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRectangles {
    /// OS status bar
    pub status_bar: Rectangle,
    /// Status bar plus a top-anchored address bar
    pub status_bar_and_address_bar: Rectangle,
    /// Browser tool bar (or bottom address bar) below the viewport
    pub tool_bar: Rectangle,
    /// Home indicator area
    pub home_bar: Rectangle,
    /// Tablet side bar on the left of the viewport
    pub left_side_padding: Rectangle,
    /// Padding on the right of the viewport
    pub right_side_padding: Rectangle,
    /// OS-reserved inset (display notch) in landscape
    pub safe_area: Rectangle,
    /// Web content area
    pub viewport: Rectangle,
    /// Full screen
    pub screen_size: Rectangle,
}

impl DeviceRectangles {
    /// Desktop profile: no chrome, viewport fills the screen
    #[must_use]
    pub fn desktop(width: u32, height: u32) -> Self {
        let screen = Rectangle::sized(width, height);
        Self {
            viewport: screen,
            screen_size: screen,
            ..Self::default()
        }
    }

    /// All rectangles paired with their field names
    #[must_use]
    pub fn named(&self) -> [(&'static str, Rectangle); 9] {
        [
            ("statusBar", self.status_bar),
            ("statusBarAndAddressBar", self.status_bar_and_address_bar),
            ("toolBar", self.tool_bar),
            ("homeBar", self.home_bar),
            ("leftSidePadding", self.left_side_padding),
            ("rightSidePadding", self.right_side_padding),
            ("safeArea", self.safe_area),
            ("viewport", self.viewport),
            ("screenSize", self.screen_size),
        ]
    }

    /// Clamp every region into the screen bounds
    #[must_use]
    pub fn clamped(mut self) -> Self {
        let screen = self.screen_size;
        for rect in [
            &mut self.status_bar,
            &mut self.status_bar_and_address_bar,
            &mut self.tool_bar,
            &mut self.home_bar,
            &mut self.left_side_padding,
            &mut self.right_side_padding,
            &mut self.safe_area,
            &mut self.viewport,
        ] {
            *rect = rect.clamp_to(&screen);
        }
        self
    }
}

/// Operating platform of the device under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Android phone or tablet
    Android,
    /// iPhone or iPad
    Ios,
    /// Desktop browser
    #[default]
    Desktop,
    /// Anything else reported by the transport
    Other,
}

impl Platform {
    /// Parse a platform name as reported by automation capabilities
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "android" => Self::Android,
            "ios" | "iphone" | "ipad" | "ipados" => Self::Ios,
            "" | "desktop" | "windows" | "mac" | "macos" | "linux" => Self::Desktop,
            _ => Self::Other,
        }
    }

    /// Mobile platforms carry browser and OS chrome in native captures
    #[must_use]
    pub const fn is_mobile(&self) -> bool {
        matches!(self, Self::Android | Self::Ios)
    }
}

/// Screen orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Taller than wide
    #[default]
    Portrait,
    /// Wider than tall
    Landscape,
}

impl Orientation {
    /// Check if landscape
    #[must_use]
    pub const fn is_landscape(&self) -> bool {
        matches!(self, Self::Landscape)
    }
}

/// Major/minor/patch OS version
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct OsVersion {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
    /// Patch version
    pub patch: u32,
}

impl OsVersion {
    /// Create a new version
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a dotted version string; missing or non-numeric parts are zero
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut parts = raw
            .trim()
            .split('.')
            .map(|p| p.trim().parse::<u32>().unwrap_or(0));
        Self::new(
            parts.next().unwrap_or(0),
            parts.next().unwrap_or(0),
            parts.next().unwrap_or(0),
        )
    }
}

impl std::fmt::Display for OsVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Capture-time device context.
///
/// Screen and inner viewport sizes are in device pixels, exactly as the
/// capture primitive returns them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Platform
    pub platform: Platform,
    /// OS version
    pub os_version: OsVersion,
    /// Raw screen width
    pub screen_width: u32,
    /// Raw screen height
    pub screen_height: u32,
    /// Inner viewport width
    pub inner_width: u32,
    /// Inner viewport height
    pub inner_height: u32,
    /// Device pixel ratio (> 0)
    pub device_pixel_ratio: f64,
    /// Orientation at capture time
    pub orientation: Orientation,
    /// Hybrid app webview (no browser address bar)
    pub is_hybrid_app: bool,
    /// Android screenshots taken natively, including chrome
    pub native_web_screenshot: bool,
}

impl DeviceProfile {
    /// Desktop profile where the viewport fills the screen
    #[must_use]
    pub fn desktop(width: u32, height: u32) -> Self {
        Self {
            platform: Platform::Desktop,
            os_version: OsVersion::default(),
            screen_width: width,
            screen_height: height,
            inner_width: width,
            inner_height: height,
            device_pixel_ratio: 1.0,
            orientation: if width > height {
                Orientation::Landscape
            } else {
                Orientation::Portrait
            },
            is_hybrid_app: false,
            native_web_screenshot: false,
        }
    }

    /// Mobile profile with the screen and viewport sizes given in device px
    #[must_use]
    pub fn mobile(
        platform: Platform,
        os_version: OsVersion,
        screen: (u32, u32),
        inner: (u32, u32),
    ) -> Self {
        Self {
            platform,
            os_version,
            screen_width: screen.0,
            screen_height: screen.1,
            inner_width: inner.0,
            inner_height: inner.1,
            device_pixel_ratio: 1.0,
            orientation: Orientation::Portrait,
            is_hybrid_app: false,
            native_web_screenshot: true,
        }
    }

    /// Set device pixel ratio; non-positive values fall back to 1.0
    #[must_use]
    pub fn with_device_pixel_ratio(mut self, dpr: f64) -> Self {
        self.device_pixel_ratio = if dpr.is_finite() && dpr > 0.0 { dpr } else { 1.0 };
        self
    }

    /// Set orientation
    #[must_use]
    pub const fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Mark as hybrid app
    #[must_use]
    pub const fn with_hybrid_app(mut self, hybrid: bool) -> Self {
        self.is_hybrid_app = hybrid;
        self
    }

    /// Set native web screenshot mode
    #[must_use]
    pub const fn with_native_web_screenshot(mut self, native: bool) -> Self {
        self.native_web_screenshot = native;
        self
    }

    /// Screen size normalized so that width/height match the orientation.
    /// Some drivers report landscape screens pre-swapped.
    #[must_use]
    pub fn oriented_screen(&self) -> (u32, u32) {
        let (w, h) = (self.screen_width, self.screen_height);
        let wide = w > h;
        if wide == self.orientation.is_landscape() || w == h {
            (w, h)
        } else {
            (h, w)
        }
    }
}
