//! Framing rectangle: the part of the preview handed to the decoder

use qrscan_core::{Rect, ScanAreaConfig};
use qrscan_device::PreviewGeometry;

/// Margin fraction applied when no explicit scan area is set
pub const DEFAULT_MARGIN_FRACTION: f64 = 0.1;

/// Compute the decode region for the current preview layout.
///
/// - The usable area is `container ∩ surface`.
/// - An explicit size is centred in that area (margins never go negative).
/// - Without one, the area is inset by `margin_fraction` of its shorter side
///   and then squared off vertically if it is taller than wide.
/// - With an explicit size the rectangle is raised by `bottom_offset`; if
///   the raised rectangle leaves the usable area entirely, the unshifted
///   one is used instead.
///
/// Returns `None` until the preview has a visible area.
pub fn framing_rect(
    geometry: &PreviewGeometry,
    scan_area: Option<&ScanAreaConfig>,
    margin_fraction: f64,
) -> Option<Rect> {
    let visible = geometry.visible()?;

    let Some(area) = scan_area else {
        return Some(default_rect(visible, margin_fraction));
    };

    let centred = centred_rect(visible, area.width, area.height);
    let shifted = centred.offset(0, area.bottom_offset.saturating_neg());
    Some(shifted.intersect(&visible).unwrap_or(centred))
}

fn centred_rect(visible: Rect, width: i32, height: i32) -> Rect {
    let dx = (visible.width().saturating_sub(width) / 2).max(0);
    let dy = (visible.height().saturating_sub(height) / 2).max(0);
    visible.inset(dx, dy)
}

fn default_rect(visible: Rect, margin_fraction: f64) -> Rect {
    let w = f64::from(visible.width());
    let h = f64::from(visible.height());
    let margin = (w * margin_fraction).min(h * margin_fraction) as i32;

    let rect = visible.inset(margin, margin);
    if rect.height() > rect.width() {
        rect.inset(0, (rect.height() - rect.width()) / 2)
    } else {
        rect
    }
}
