//! Collision geometry shared by every gameplay system.
//!
//! Clients run the same formulas for movement prediction, so the closest-point
//! rule (clamp onto the rectangle) must not change.

use super::map::{OBSTACLE_BUFFER, WALL_RECTS};

/// Axis-aligned rectangle, origin at the top-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.w && y >= self.y && y <= self.y + self.h
    }
}

/// Closest point on `rect` to `(x, y)`
pub fn closest_point_on_rect(x: f32, y: f32, rect: &Rect) -> (f32, f32) {
    (
        x.clamp(rect.x, rect.x + rect.w),
        y.clamp(rect.y, rect.y + rect.h),
    )
}

/// Distance from a circle centre to the nearest point of `rect` (0 when inside)
pub fn circle_rect_distance(x: f32, y: f32, rect: &Rect) -> f32 {
    let (cx, cy) = closest_point_on_rect(x, y, rect);
    let dx = x - cx;
    let dy = y - cy;
    (dx * dx + dy * dy).sqrt()
}

/// Distance between two circle centres
pub fn circle_circle_distance(x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    let dx = x2 - x1;
    let dy = y2 - y1;
    (dx * dx + dy * dy).sqrt()
}

/// True when a circle of `radius` touches any obstacle in `rects`
pub fn collides_with_any(x: f32, y: f32, radius: f32, rects: &[Rect]) -> bool {
    rects
        .iter()
        .any(|rect| circle_rect_distance(x, y, rect) < radius + OBSTACLE_BUFFER)
}

/// True when a circle of `radius` touches a wall of the arena
pub fn collides_with_walls(x: f32, y: f32, radius: f32) -> bool {
    collides_with_any(x, y, radius, WALL_RECTS)
}

/// True when `(x, y)` lies inside any of `rects`
pub fn point_in_any(x: f32, y: f32, rects: &[Rect]) -> bool {
    rects.iter().any(|rect| rect.contains(x, y))
}

/// Unit vector from `(x1, y1)` towards `(x2, y2)` plus the distance.
/// `None` for coincident points or a non-finite distance.
pub fn direction_to(x1: f32, y1: f32, x2: f32, y2: f32) -> Option<(f32, f32, f32)> {
    let dist = circle_circle_distance(x1, y1, x2, y2);
    if !dist.is_finite() || dist < 0.001 {
        return None;
    }
    Some(((x2 - x1) / dist, (y2 - y1) / dist, dist))
}
