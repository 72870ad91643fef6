//! Integer rectangles in preview pixel coordinates

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle, right/bottom exclusive.
///
/// Follows the platform view convention: `left`/`top` inclusive,
/// `right`/`bottom` exclusive, y grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rectangle anchored at the origin with the given size
    pub const fn from_size(width: i32, height: i32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    /// Overlapping region of two rectangles, `None` when they do not intersect
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let clipped = Rect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        (!clipped.is_empty()).then_some(clipped)
    }

    /// Shrink by `dx` on the left and right and `dy` on the top and bottom.
    /// Edges saturate at the `i32` range.
    pub fn inset(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(
            self.left.saturating_add(dx),
            self.top.saturating_add(dy),
            self.right.saturating_sub(dx),
            self.bottom.saturating_sub(dy),
        )
    }

    /// Move by `dx`/`dy`, saturating at the `i32` range
    pub fn offset(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(
            self.left.saturating_add(dx),
            self.top.saturating_add(dy),
            self.right.saturating_add(dx),
            self.bottom.saturating_add(dy),
        )
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        !other.is_empty()
            && other.left >= self.left
            && other.top >= self.top
            && other.right <= self.right
            && other.bottom <= self.bottom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersect_overlapping() {
        let a = Rect::new(0, 0, 100, 100);
        let b = Rect::new(50, 60, 150, 160);
        assert_eq!(a.intersect(&b), Some(Rect::new(50, 60, 100, 100)));
    }

    #[test]
    fn test_intersect_disjoint_and_touching() {
        let a = Rect::new(0, 0, 10, 10);
        assert_eq!(a.intersect(&Rect::new(20, 20, 30, 30)), None);
        // Shared edge only: exclusive right/bottom means no overlap
        assert_eq!(a.intersect(&Rect::new(10, 0, 20, 10)), None);
    }

    #[test]
    fn test_inset_and_offset() {
        let r = Rect::from_size(100, 80).inset(10, 5);
        assert_eq!(r, Rect::new(10, 5, 90, 75));
        assert_eq!(r.width(), 80);
        assert_eq!(r.height(), 70);
        assert_eq!(r.offset(0, -20), Rect::new(10, -15, 90, 55));
    }

    #[test]
    fn test_offset_saturates() {
        let r = Rect::from_size(100, 100).offset(0, i32::MAX);
        assert_eq!(r, Rect::new(0, i32::MAX, 100, i32::MAX));
        assert!(r.is_empty());
        assert_eq!(Rect::from_size(10, 10).offset(i32::MIN, 0).left, i32::MIN);
    }

    #[test]
    fn test_contains() {
        let r = Rect::new(10, 10, 20, 20);
        assert!(r.contains(10, 10));
        assert!(r.contains(19, 19));
        assert!(!r.contains(20, 15));
        assert!(r.contains_rect(&Rect::new(12, 12, 18, 18)));
        assert!(!r.contains_rect(&Rect::new(5, 12, 18, 18)));
    }
}
