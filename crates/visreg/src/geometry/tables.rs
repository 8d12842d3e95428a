//! Browser and OS chrome offset tables.
//!
//! All values are logical points; the resolver scales them by the device
//! pixel ratio. Lookups have an explicit fallback order:
//!
//! - Android: exact API level, else the newest level below it. Levels older
//!   than the oldest entry are unsupported.
//! - iOS: exact portrait height, else the nearest known height within
//!   [`IOS_HEIGHT_TOLERANCE`], else the default height for the device class.

use super::{Orientation, OsVersion};

/// Chrome offsets for one Android API level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AndroidOffsets {
    /// OS status bar height
    pub status_bar: u32,
    /// Browser address bar height
    pub address_bar: u32,
    /// Default tool bar height, used when the computed one is negative
    pub tool_bar: u32,
}

impl AndroidOffsets {
    const fn new(status_bar: u32, address_bar: u32, tool_bar: u32) -> Self {
        Self {
            status_bar,
            address_bar,
            tool_bar,
        }
    }
}

/// Keyed by API level, ascending
const ANDROID_OFFSETS: &[(u32, AndroidOffsets)] = &[
    (19, AndroidOffsets::new(25, 56, 48)),
    (21, AndroidOffsets::new(24, 56, 48)),
    (23, AndroidOffsets::new(24, 56, 48)),
    (24, AndroidOffsets::new(24, 56, 48)),
    (26, AndroidOffsets::new(24, 56, 48)),
    (28, AndroidOffsets::new(24, 56, 48)),
    (29, AndroidOffsets::new(24, 56, 48)),
    (30, AndroidOffsets::new(24, 56, 48)),
    (31, AndroidOffsets::new(24, 56, 48)),
    (33, AndroidOffsets::new(28, 56, 48)),
    (34, AndroidOffsets::new(32, 56, 48)),
];

/// Lowest API level that is a real API level rather than a release number
const MIN_API_LEVEL: u32 = 19;

/// Map an Android version to its API level.
///
/// Majors below 19 are release numbers ("11.0" is API 30); anything from 19
/// up is already an API level.
#[must_use]
pub fn android_api_level(version: OsVersion) -> Option<u32> {
    if version.major >= MIN_API_LEVEL {
        return Some(version.major);
    }
    let level = match (version.major, version.minor) {
        (4, m) if m >= 4 => 19,
        (5, 0) => 21,
        (5, _) => 22,
        (6, _) => 23,
        (7, 0) => 24,
        (7, _) => 25,
        (8, 0) => 26,
        (8, _) => 27,
        (9, _) => 28,
        (10, _) => 29,
        (11, _) => 30,
        (12, 0) => 31,
        (12, _) => 32,
        (13, _) => 33,
        (14, _) => 34,
        (15, _) => 35,
        (16, _) => 36,
        (major, _) if major > 16 => 36,
        _ => return None,
    };
    Some(level)
}

/// Look up Android offsets for an API level
#[must_use]
pub fn android_offsets(api_level: u32) -> Option<AndroidOffsets> {
    ANDROID_OFFSETS
        .iter()
        .rev()
        .find(|(level, _)| *level <= api_level)
        .map(|(_, offsets)| *offsets)
}

/// Phone or tablet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IosDeviceClass {
    /// iPhone / iPod
    Phone,
    /// iPad
    Tablet,
}

impl IosDeviceClass {
    /// Classify by the longest logical screen side
    #[must_use]
    pub fn classify(logical_width: u32, logical_height: u32) -> Self {
        if logical_width.max(logical_height) < 1024 {
            Self::Phone
        } else {
            Self::Tablet
        }
    }

    const fn default_portrait_height(self) -> u32 {
        match self {
            Self::Phone => 844,
            Self::Tablet => 1024,
        }
    }
}

/// Chrome offsets for one iOS device size in one orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IosOffsets {
    /// OS status bar height
    pub status_bar: u32,
    /// Safari address bar height
    pub address_bar: u32,
    /// Home indicator height, zero on home-button devices
    pub home_bar: u32,
    /// Horizontal notch inset in landscape
    pub safe_area: u32,
}

impl IosOffsets {
    const fn new(status_bar: u32, address_bar: u32, home_bar: u32, safe_area: u32) -> Self {
        Self {
            status_bar,
            address_bar,
            home_bar,
            safe_area,
        }
    }
}

struct IosEntry {
    class: IosDeviceClass,
    portrait_height: u32,
    portrait: IosOffsets,
    landscape: IosOffsets,
}

const fn ios(
    class: IosDeviceClass,
    portrait_height: u32,
    portrait: IosOffsets,
    landscape: IosOffsets,
) -> IosEntry {
    IosEntry {
        class,
        portrait_height,
        portrait,
        landscape,
    }
}

use IosDeviceClass::{Phone, Tablet};

const IOS_OFFSETS: &[IosEntry] = &[
    // Home-button iPhones
    ios(Phone, 568, IosOffsets::new(20, 44, 0, 0), IosOffsets::new(0, 44, 0, 0)),
    ios(Phone, 667, IosOffsets::new(20, 50, 0, 0), IosOffsets::new(0, 50, 0, 0)),
    ios(Phone, 736, IosOffsets::new(20, 50, 0, 0), IosOffsets::new(0, 50, 0, 0)),
    // Notch and Dynamic Island iPhones
    ios(Phone, 812, IosOffsets::new(44, 50, 34, 0), IosOffsets::new(0, 50, 21, 44)),
    ios(Phone, 844, IosOffsets::new(47, 50, 34, 0), IosOffsets::new(0, 50, 21, 47)),
    ios(Phone, 852, IosOffsets::new(54, 50, 34, 0), IosOffsets::new(0, 50, 21, 59)),
    ios(Phone, 896, IosOffsets::new(48, 50, 34, 0), IosOffsets::new(0, 50, 21, 48)),
    ios(Phone, 926, IosOffsets::new(47, 50, 34, 0), IosOffsets::new(0, 50, 21, 47)),
    ios(Phone, 932, IosOffsets::new(54, 50, 34, 0), IosOffsets::new(0, 50, 21, 59)),
    // iPads
    ios(Tablet, 1024, IosOffsets::new(20, 50, 0, 0), IosOffsets::new(20, 50, 0, 0)),
    ios(Tablet, 1080, IosOffsets::new(20, 50, 0, 0), IosOffsets::new(20, 50, 0, 0)),
    ios(Tablet, 1112, IosOffsets::new(20, 50, 0, 0), IosOffsets::new(20, 50, 0, 0)),
    ios(Tablet, 1133, IosOffsets::new(24, 50, 20, 0), IosOffsets::new(24, 50, 20, 0)),
    ios(Tablet, 1180, IosOffsets::new(24, 50, 20, 0), IosOffsets::new(24, 50, 20, 0)),
    ios(Tablet, 1194, IosOffsets::new(24, 50, 20, 0), IosOffsets::new(24, 50, 20, 0)),
    ios(Tablet, 1366, IosOffsets::new(24, 50, 20, 0), IosOffsets::new(24, 50, 20, 0)),
];

/// Max distance in points for a "nearest known height" match
pub const IOS_HEIGHT_TOLERANCE: u32 = 16;

/// Portrait height of the 12.9" iPad Pro
pub const IPAD_PRO_12_9_HEIGHT: u32 = 1366;

/// Portrait height of the XR / 11 / XS Max iPhones
pub const IPHONE_896_HEIGHT: u32 = 896;

/// Oldest iOS major version with table coverage
pub const MIN_IOS_MAJOR: u32 = 12;

/// Resolved iOS table row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IosLookup {
    /// Portrait height the row is keyed by
    pub portrait_height: u32,
    /// Offsets for the requested orientation
    pub offsets: IosOffsets,
}

/// Look up iOS offsets for a device class, portrait height and orientation
#[must_use]
pub fn ios_offsets(
    class: IosDeviceClass,
    portrait_height: u32,
    orientation: Orientation,
) -> IosLookup {
    let candidates = || IOS_OFFSETS.iter().filter(|e| e.class == class);
    let entry = candidates()
        .min_by_key(|e| e.portrait_height.abs_diff(portrait_height))
        .filter(|e| e.portrait_height.abs_diff(portrait_height) <= IOS_HEIGHT_TOLERANCE)
        .or_else(|| {
            let fallback = class.default_portrait_height();
            candidates().find(|e| e.portrait_height == fallback)
        });

    match entry {
        Some(e) => IosLookup {
            portrait_height: e.portrait_height,
            offsets: if orientation.is_landscape() {
                e.landscape
            } else {
                e.portrait
            },
        },
        None => IosLookup {
            portrait_height,
            offsets: IosOffsets::new(0, 0, 0, 0),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_release_numbers_map_to_api_levels() {
        assert_eq!(android_api_level(OsVersion::new(11, 0, 0)), Some(30));
        assert_eq!(android_api_level(OsVersion::new(8, 1, 0)), Some(27));
        assert_eq!(android_api_level(OsVersion::new(4, 4, 2)), Some(19));
        assert_eq!(android_api_level(OsVersion::new(30, 0, 0)), Some(30));
        assert_eq!(android_api_level(OsVersion::new(4, 1, 0)), None);
    }

    #[test]
    fn test_android_falls_back_to_lower_level() {
        assert_eq!(android_offsets(25), android_offsets(24));
        assert_eq!(android_offsets(40), android_offsets(34));
        assert!(android_offsets(18).is_none());
    }

    #[test]
    fn test_android_api_30() {
        let offsets = android_offsets(30).unwrap();
        assert_eq!(offsets, AndroidOffsets::new(24, 56, 48));
    }

    #[test]
    fn test_ios_classify() {
        assert_eq!(IosDeviceClass::classify(414, 896), IosDeviceClass::Phone);
        assert_eq!(IosDeviceClass::classify(768, 1024), IosDeviceClass::Tablet);
    }

    #[test]
    fn test_ios_exact_and_nearest() {
        let exact = ios_offsets(Phone, 896, Orientation::Portrait);
        assert_eq!(exact.portrait_height, 896);
        assert_eq!(exact.offsets.status_bar, 48);

        let near = ios_offsets(Phone, 850, Orientation::Portrait);
        assert_eq!(near.portrait_height, 852);
    }

    #[test]
    fn test_ios_unknown_size_uses_class_default() {
        let phone = ios_offsets(Phone, 700, Orientation::Landscape);
        // 700 is 33pt from 667 and 36pt from 736
        assert_eq!(phone.portrait_height, 844);
        assert_eq!(phone.offsets.safe_area, 47);

        let tablet = ios_offsets(Tablet, 1600, Orientation::Portrait);
        assert_eq!(tablet.portrait_height, 1024);
    }
}
