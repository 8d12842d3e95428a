//! Table-driven chrome geometry per platform.

use super::tables::{
    android_api_level, android_offsets, ios_offsets, IosDeviceClass, IOS_HEIGHT_TOLERANCE,
    IPAD_PRO_12_9_HEIGHT, IPHONE_896_HEIGHT, MIN_IOS_MAJOR,
};
use super::{scale_round, DeviceProfile, DeviceRectangles, Platform, Rectangle};
use crate::result::{VisregError, VisregResult};
use tracing::{debug, warn};

/// Status bar reported by the first generation 12.9" iPad Pro
const IPAD_PRO_GEN1_STATUS_BAR: u32 = 20;

/// Status bar / safe area on 896-class iPhones running iOS 13
const IPHONE_896_IOS13_INSET: u32 = 44;

/// First iOS major with Safari's bottom address bar
const IOS_BOTTOM_ADDRESS_BAR_MAJOR: u32 = 15;

/// Maps device profiles to [`DeviceRectangles`]
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceGeometryResolver;

impl DeviceGeometryResolver {
    /// Resolve chrome rectangles. Never fails: profiles without table
    /// coverage get zero offsets with the viewport at the origin.
    #[must_use]
    pub fn resolve(profile: &DeviceProfile) -> DeviceRectangles {
        match Self::try_resolve(profile) {
            Ok(rects) => rects,
            Err(err) => {
                warn!(%err, "falling back to zero-offset desktop geometry");
                Self::zero_offsets(profile)
            }
        }
    }

    /// Resolve chrome rectangles, reporting unsupported profiles
    pub fn try_resolve(profile: &DeviceProfile) -> VisregResult<DeviceRectangles> {
        let rects = match profile.platform {
            Platform::Desktop => Self::zero_offsets(profile),
            Platform::Android => Self::android(profile)?,
            Platform::Ios => Self::ios(profile)?,
            Platform::Other => return Err(unsupported(profile)),
        };
        debug!(
            platform = ?profile.platform,
            version = %profile.os_version,
            viewport = ?rects.viewport,
            "resolved device rectangles"
        );
        Ok(rects.clamped())
    }

    fn zero_offsets(profile: &DeviceProfile) -> DeviceRectangles {
        let (width, height) = profile.oriented_screen();
        DeviceRectangles {
            viewport: Rectangle::sized(profile.inner_width, profile.inner_height),
            screen_size: Rectangle::sized(width, height),
            ..DeviceRectangles::default()
        }
        .clamped()
    }

    fn android(profile: &DeviceProfile) -> VisregResult<DeviceRectangles> {
        let table = android_api_level(profile.os_version)
            .and_then(android_offsets)
            .ok_or_else(|| unsupported(profile))?;

        // Chromedriver screenshots contain the viewport only
        if !profile.native_web_screenshot {
            return Ok(Self::zero_offsets(profile));
        }

        let dpr = profile.device_pixel_ratio;
        let (width, height) = profile.oriented_screen();
        let status = scale_round(table.status_bar, dpr);
        let address = if profile.is_hybrid_app {
            0
        } else {
            scale_round(table.address_bar, dpr)
        };
        let status_address = status.saturating_add(address);

        let computed =
            i64::from(height) - i64::from(profile.inner_height) - i64::from(status_address);
        let tool_bar_height = if computed < 0 {
            scale_round(table.tool_bar, dpr)
        } else {
            computed as u32
        };

        Ok(DeviceRectangles {
            status_bar: Rectangle::sized(width, status),
            status_bar_and_address_bar: Rectangle::sized(width, status_address),
            tool_bar: Rectangle::new(
                0,
                height.saturating_sub(tool_bar_height),
                width,
                tool_bar_height,
            ),
            viewport: Rectangle::new(0, status_address, profile.inner_width, profile.inner_height),
            screen_size: Rectangle::sized(width, height),
            ..DeviceRectangles::default()
        })
    }

    fn ios(profile: &DeviceProfile) -> VisregResult<DeviceRectangles> {
        let major = profile.os_version.major;
        if major < MIN_IOS_MAJOR {
            return Err(unsupported(profile));
        }

        let dpr = profile.device_pixel_ratio;
        let (width, height) = profile.oriented_screen();
        let logical_w = (f64::from(width) / dpr).round() as u32;
        let logical_h = (f64::from(height) / dpr).round() as u32;
        let class = IosDeviceClass::classify(logical_w, logical_h);
        let is_phone = class == IosDeviceClass::Phone;
        let landscape = profile.orientation.is_landscape();

        let lookup = ios_offsets(class, logical_w.max(logical_h), profile.orientation);
        if lookup.portrait_height.abs_diff(logical_w.max(logical_h)) > IOS_HEIGHT_TOLERANCE {
            debug!(
                requested = logical_w.max(logical_h),
                used = lookup.portrait_height,
                "unknown iOS screen size, using class default"
            );
        }
        let mut offsets = lookup.offsets;

        if is_phone && lookup.portrait_height == IPHONE_896_HEIGHT && major == 13 {
            if landscape {
                offsets.safe_area = IPHONE_896_IOS13_INSET;
            } else {
                offsets.status_bar = IPHONE_896_IOS13_INSET;
            }
        }

        let address_bar_on_top = !landscape && is_phone && major < IOS_BOTTOM_ADDRESS_BAR_MAJOR;
        let mut status = scale_round(offsets.status_bar, dpr);
        let address = if address_bar_on_top && !profile.is_hybrid_app {
            scale_round(offsets.address_bar, dpr)
        } else {
            0
        };

        if class == IosDeviceClass::Tablet
            && lookup.portrait_height == IPAD_PRO_12_9_HEIGHT
            && status.saturating_add(address).saturating_add(profile.inner_height) > height
        {
            status = scale_round(IPAD_PRO_GEN1_STATUS_BAR, dpr);
        }
        let top = status.saturating_add(address);

        let home_height = scale_round(offsets.home_bar, dpr);
        let home_bar = Rectangle::new(0, height.saturating_sub(home_height), width, home_height);
        let tool_height = i64::from(height) - i64::from(top) - i64::from(profile.inner_height);
        let tool_bar = if landscape || tool_height <= 0 {
            home_bar
        } else {
            Rectangle::new(
                0,
                top.saturating_add(profile.inner_height),
                width,
                tool_height as u32,
            )
        };

        let side = if !is_phone && landscape {
            width.saturating_sub(profile.inner_width)
        } else {
            0
        };
        let safe = if is_phone && landscape {
            scale_round(offsets.safe_area, dpr)
        } else {
            0
        };
        let viewport_x = if side > 0 {
            side
        } else {
            safe.min(width.saturating_sub(profile.inner_width))
        };

        Ok(DeviceRectangles {
            status_bar: Rectangle::sized(width, status),
            status_bar_and_address_bar: Rectangle::sized(width, top),
            tool_bar,
            home_bar,
            left_side_padding: Rectangle::new(0, top, side, profile.inner_height),
            right_side_padding: Rectangle::default(),
            safe_area: Rectangle::sized(safe, height),
            viewport: Rectangle::new(viewport_x, top, profile.inner_width, profile.inner_height),
            screen_size: Rectangle::sized(width, height),
        })
    }
}

fn unsupported(profile: &DeviceProfile) -> VisregError {
    VisregError::UnsupportedProfile {
        platform: format!("{:?}", profile.platform),
        version: profile.os_version.to_string(),
    }
}
