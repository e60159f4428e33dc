//! Static arena layout

use super::geometry::Rect;

pub const WORLD_WIDTH: f32 = 5760.0;
pub const WORLD_HEIGHT: f32 = 3240.0;

/// Thickness of the boundary walls
pub const BORDER: f32 = 40.0;

/// Extra clearance added to every circle-vs-wall test
pub const OBSTACLE_BUFFER: f32 = 5.0;

/// Player collision radius
pub const PLAYER_RADIUS: f32 = 25.0;

/// Radius used for projectile-vs-wall tests
pub const PROJECTILE_WALL_RADIUS: f32 = 10.0;

const CX: f32 = WORLD_WIDTH / 2.0;
const CY: f32 = WORLD_HEIGHT / 2.0;

pub const WALL_RECTS: &[Rect] = &[
    // Centre cluster
    Rect::new(CX - 300.0, CY - 250.0, 120.0, 150.0),
    Rect::new(CX + 180.0, CY - 250.0, 120.0, 150.0),
    Rect::new(CX - 300.0, CY + 100.0, 120.0, 150.0),
    Rect::new(CX + 180.0, CY + 100.0, 120.0, 150.0),
    Rect::new(CX - 80.0, CY - 120.0, 160.0, 80.0),
    Rect::new(CX - 80.0, CY + 40.0, 160.0, 80.0),
    // Top-left
    Rect::new(500.0, 500.0, 300.0, 40.0),
    Rect::new(500.0, 500.0, 40.0, 300.0),
    Rect::new(1000.0, 800.0, 200.0, 200.0),
    // Top-right
    Rect::new(4500.0, 600.0, 400.0, 40.0),
    Rect::new(4700.0, 300.0, 40.0, 600.0),
    // Bottom-left
    Rect::new(600.0, 2500.0, 100.0, 500.0),
    Rect::new(1200.0, 2400.0, 400.0, 100.0),
    // Bottom-right
    Rect::new(4800.0, 2500.0, 300.0, 300.0),
    Rect::new(4200.0, 2800.0, 500.0, 50.0),
    // Mid-edge
    Rect::new(2700.0, 100.0, 400.0, 100.0),
    Rect::new(2700.0, 3040.0, 400.0, 100.0),
    // Pillars
    Rect::new(1500.0, 1500.0, 60.0, 60.0),
    Rect::new(4000.0, 1500.0, 60.0, 60.0),
    Rect::new(1500.0, 2000.0, 60.0, 60.0),
    Rect::new(4000.0, 2000.0, 60.0, 60.0),
    // Boundaries
    Rect::new(0.0, 0.0, WORLD_WIDTH, BORDER),
    Rect::new(0.0, WORLD_HEIGHT - BORDER, WORLD_WIDTH, BORDER),
    Rect::new(0.0, 0.0, BORDER, WORLD_HEIGHT),
    Rect::new(WORLD_WIDTH - BORDER, 0.0, BORDER, WORLD_HEIGHT),
];

/// Foliage that hides players from distant viewers
pub const FOLIAGE_RECTS: &[Rect] = &[
    Rect::new(800.0, 1200.0, 240.0, 180.0),
    Rect::new(4720.0, 1200.0, 240.0, 180.0),
    Rect::new(2000.0, 400.0, 300.0, 160.0),
    Rect::new(3460.0, 2680.0, 300.0, 160.0),
    Rect::new(1900.0, 2600.0, 220.0, 160.0),
    Rect::new(3640.0, 500.0, 220.0, 160.0),
    Rect::new(2600.0, 2200.0, 200.0, 200.0),
];

/// Goal lines for objective mode sit this far in from each side
pub const GOAL_LINE_INSET: f32 = 80.0;
/// Half height of the goal mouth
pub const GOAL_HALF_HEIGHT: f32 = 200.0;
/// Extra tolerance above and below the goal mouth
pub const GOAL_Y_BAND: f32 = 60.0;

pub const fn world_center() -> (f32, f32) {
    (CX, CY)
}

/// True when `(x, y)` lies outside the world rectangle
pub fn out_of_bounds(x: f32, y: f32) -> bool {
    x < 0.0 || y < 0.0 || x > WORLD_WIDTH || y > WORLD_HEIGHT
}

/// Clamp a position into the playable area inside the boundary walls
pub fn clamp_to_arena(x: f32, y: f32) -> (f32, f32) {
    (
        x.clamp(BORDER + PLAYER_RADIUS, WORLD_WIDTH - BORDER - PLAYER_RADIUS),
        y.clamp(BORDER + PLAYER_RADIUS, WORLD_HEIGHT - BORDER - PLAYER_RADIUS),
    )
}
