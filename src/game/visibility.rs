//! Foliage concealment

use super::entities::Player;
use super::geometry::{circle_circle_distance, point_in_any};
use super::map::FOLIAGE_RECTS;

/// Viewers closer than this always see a hidden player
pub const NEAR_REVEAL_RADIUS: f32 = 250.0;
/// Attacking reveals a hidden player for this long (ms)
pub const ATTACK_REVEAL_MS: u64 = 1500;

/// Whether `viewer` may see `target` at `now`. `None` is a spectator who has
/// not joined yet.
pub fn is_visible(viewer: Option<&Player>, target: &Player, now: u64) -> bool {
    if viewer.is_some_and(|v| v.id == target.id) {
        return true;
    }
    if !point_in_any(target.x, target.y, FOLIAGE_RECTS) {
        return true;
    }
    let revealed = target
        .last_attack_at
        .is_some_and(|t| now.saturating_sub(t) < ATTACK_REVEAL_MS);
    if revealed {
        return true;
    }
    viewer.is_some_and(|v| {
        circle_circle_distance(v.x, v.y, target.x, target.y) <= NEAR_REVEAL_RADIUS
    })
}
