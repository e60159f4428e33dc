//! Objective-mode ball: projectile impulses, body pushes, integration and goals

use tracing::info;

use crate::ws::protocol::{CollisionKind, ServerMsg};

use super::entities::{Ball, GoalSide, Projectile};
use super::geometry::{circle_circle_distance, direction_to};
use super::map::{
    world_center, BORDER, GOAL_HALF_HEIGHT, GOAL_LINE_INSET, GOAL_Y_BAND, PLAYER_RADIUS,
    WORLD_HEIGHT, WORLD_WIDTH,
};
use super::world::World;

/// Impulse per point of projectile damage
pub const BALL_IMPULSE_FACTOR: f32 = 0.12;
/// Fastest the ball can be knocked (px per tick)
pub const BALL_MAX_SPEED: f32 = 30.0;
/// Speed a player's body gives the ball on contact (px per tick)
pub const BALL_CONTACT_SPEED: f32 = 8.0;
/// Share of speed kept when bouncing off the border
pub const BALL_BOUNCE_DAMPING: f32 = 0.8;

/// Which goal, if any, a ball centred at (x, y) is in
pub fn goal_at(x: f32, y: f32) -> Option<GoalSide> {
    let (_, cy) = world_center();
    if (y - cy).abs() > GOAL_HALF_HEIGHT + GOAL_Y_BAND {
        return None;
    }
    if x < GOAL_LINE_INSET {
        Some(GoalSide::Left)
    } else if x > WORLD_WIDTH - GOAL_LINE_INSET {
        Some(GoalSide::Right)
    } else {
        None
    }
}

/// Move the ball one tick: integrate, apply friction, bounce off the border
fn integrate(ball: &mut Ball) {
    ball.x += ball.vel_x;
    ball.y += ball.vel_y;
    ball.vel_x *= ball.friction;
    ball.vel_y *= ball.friction;

    let (min_x, max_x) = (BORDER + ball.radius, WORLD_WIDTH - BORDER - ball.radius);
    let (min_y, max_y) = (BORDER + ball.radius, WORLD_HEIGHT - BORDER - ball.radius);
    if ball.x < min_x || ball.x > max_x {
        ball.x = ball.x.clamp(min_x, max_x);
        ball.vel_x *= -BALL_BOUNCE_DAMPING;
    }
    if ball.y < min_y || ball.y > max_y {
        ball.y = ball.y.clamp(min_y, max_y);
        ball.vel_y *= -BALL_BOUNCE_DAMPING;
    }
}

fn ball_contact(x: f32, y: f32) -> ServerMsg {
    ServerMsg::Collision {
        x,
        y,
        kind: CollisionKind::Ball,
        damage: None,
        victim: None,
    }
}

impl World {
    /// Knock the ball if `proj` touches it. Returns true on contact.
    /// Persistent kinds push once per projectile.
    pub fn push_ball(&mut self, proj: &mut Projectile) -> bool {
        let Some(ball) = self.registry.ball.as_mut() else {
            return false;
        };
        let stats = proj.kind.stats();
        if circle_circle_distance(proj.x, proj.y, ball.x, ball.y) >= ball.radius + stats.radius {
            return false;
        }
        if stats.persistent_vs_ball && proj.touched_ball {
            return true;
        }
        proj.touched_ball = true;

        let moving = proj.vel_x != 0.0 || proj.vel_y != 0.0;
        let dir = if moving {
            direction_to(0.0, 0.0, proj.vel_x, proj.vel_y)
        } else {
            self.registry
                .players
                .get(&proj.owner_id)
                .and_then(|owner| direction_to(owner.x, owner.y, ball.x, ball.y))
        };
        let Some((dx, dy, _)) = dir else {
            return true;
        };

        let impulse = (stats.damage * BALL_IMPULSE_FACTOR / ball.mass).min(BALL_MAX_SPEED);
        ball.vel_x += dx * impulse;
        ball.vel_y += dy * impulse;
        let speed = (ball.vel_x * ball.vel_x + ball.vel_y * ball.vel_y).sqrt();
        if speed > BALL_MAX_SPEED {
            ball.vel_x *= BALL_MAX_SPEED / speed;
            ball.vel_y *= BALL_MAX_SPEED / speed;
        }
        let (bx, by) = (ball.x, ball.y);
        self.emit(ball_contact(bx, by));
        true
    }

    /// Players touching the ball shove it away from their centre.
    /// With several in contact the last one in id order wins.
    fn push_ball_by_contact(&mut self) {
        let Some(ball) = self.registry.ball.as_mut() else {
            return;
        };
        let reach = PLAYER_RADIUS + ball.radius;
        let push = self
            .registry
            .players
            .values()
            .filter(|p| p.is_active() && circle_circle_distance(p.x, p.y, ball.x, ball.y) < reach)
            .filter_map(|p| direction_to(p.x, p.y, ball.x, ball.y))
            .last();
        let Some((dx, dy, _)) = push else {
            return;
        };
        ball.vel_x = dx * BALL_CONTACT_SPEED;
        ball.vel_y = dy * BALL_CONTACT_SPEED;
        let (bx, by) = (ball.x, ball.y);
        self.emit(ball_contact(bx, by));
    }

    /// Advance the ball and score goals against the defending side
    pub fn update_ball(&mut self, _now: u64) {
        self.push_ball_by_contact();

        let Some(ball) = self.registry.ball.as_mut() else {
            return;
        };
        // Goal check runs before the border bounce so shots into the mouth count
        let (gx, gy) = (ball.x + ball.vel_x, ball.y + ball.vel_y);
        let Some(side) = goal_at(gx, gy) else {
            integrate(ball);
            return;
        };
        ball.reset();

        for player in self.registry.players.values_mut() {
            if player.goal_side == Some(side) && !player.is_waiting {
                player.lives = player.lives.saturating_sub(1);
                if player.lives == 0 {
                    player.alive = false;
                }
            }
        }
        info!(side = ?side, "Goal scored");
        self.emit(ServerMsg::Collision {
            x: gx,
            y: gy,
            kind: CollisionKind::Goal,
            damage: None,
            victim: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::{ProjectileKind, ProjectileSpec};
    use crate::game::world::test_support::*;
    use crate::ws::protocol::{Character, GameMode};

    fn objective_duel() -> (World, uuid::Uuid, uuid::Uuid) {
        let (mut world, a, b) = duel(Character::Vanguard, Character::Volt);
        world.mode = GameMode::Objective;
        world.registry.ball = Some(Ball::new());
        world.registry.players.get_mut(&a).unwrap().goal_side = Some(GoalSide::Left);
        world.registry.players.get_mut(&b).unwrap().goal_side = Some(GoalSide::Right);
        (world, a, b)
    }

    fn projectile_at(
        world: &mut World,
        kind: ProjectileKind,
        owner: uuid::Uuid,
        x: f32,
        y: f32,
    ) -> Projectile {
        let id = world.registry.spawn_projectile(ProjectileSpec {
            kind,
            owner_id: owner,
            x,
            y,
            direction: 0.0,
            now: T0,
        });
        world.registry.remove_projectile(id).unwrap()
    }

    #[test]
    fn slug_pushes_ball_along_travel() {
        let (mut world, a, _) = objective_duel();
        let (bx, by) = world_center();
        let mut slug = projectile_at(&mut world, ProjectileKind::Slug, a, bx - 50.0, by);
        assert!(world.push_ball(&mut slug));
        let ball = world.registry.ball.as_ref().unwrap();
        assert!((ball.vel_x - 25.0 * BALL_IMPULSE_FACTOR).abs() < 1e-4);
        assert_eq!(ball.vel_y, 0.0);
        assert!(world.drain_events().iter().any(|e| matches!(
            e,
            ServerMsg::Collision {
                kind: CollisionKind::Ball,
                ..
            }
        )));
    }

    #[test]
    fn player_body_shoves_ball_away() {
        let (mut world, a, _) = objective_duel();
        let (bx, by) = world_center();
        place(&mut world, a, bx, by + 40.0, 0.0);
        world.update_ball(T0);

        let ball = world.registry.ball.as_ref().unwrap();
        assert!(ball.vel_x.abs() < 1e-4);
        assert!((ball.vel_y + BALL_CONTACT_SPEED * ball.friction).abs() < 1e-4);
        assert!(ball.y < by);
        let events = world.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            ServerMsg::Collision {
                kind: CollisionKind::Ball,
                ..
            }
        )));
    }

    #[test]
    fn dead_players_do_not_push() {
        let (mut world, a, _) = objective_duel();
        let (bx, by) = world_center();
        place(&mut world, a, bx, by + 40.0, 0.0);
        world.registry.players.get_mut(&a).unwrap().alive = false;
        world.update_ball(T0);
        assert_eq!(world.registry.ball.as_ref().unwrap().vel_y, 0.0);
        assert!(world.drain_events().is_empty());
    }

    #[test]
    fn overflowing_shot_target_leaves_ball_intact() {
        let (mut world, a, _) = objective_duel();
        let (bx, by) = world_center();
        place(&mut world, a, bx - 120.0, by, 0.0);
        let msg: crate::ws::protocol::ClientMsg = serde_json::from_str(
            r#"{"event":"shoot","data":{"isSuper":false,"targetX":1e39,"targetY":1000}}"#,
        )
        .unwrap();
        assert!(world.handle_intent(a, msg, T0).is_err());

        for tick in 1..=400 {
            world.run_tick(T0 + tick * 16);
        }
        let ball = world.registry.ball.as_ref().unwrap();
        assert!(ball.x.is_finite() && ball.y.is_finite());
        assert!(ball.vel_x.is_finite() && ball.vel_y.is_finite());
    }

    #[test]
    fn cannon_impulse_is_capped() {
        let (mut world, a, _) = objective_duel();
        let (bx, by) = world_center();
        for _ in 0..5 {
            let mut cannon = projectile_at(&mut world, ProjectileKind::Cannon, a, bx, by);
            world.push_ball(&mut cannon);
        }
        let ball = world.registry.ball.as_ref().unwrap();
        assert!(ball.vel_x <= BALL_MAX_SPEED + 1e-4);
    }

    #[test]
    fn persistent_kinds_push_once() {
        let (mut world, a, _) = objective_duel();
        let (bx, by) = world_center();
        place(&mut world, a, bx - 80.0, by, 0.0);
        let mut swing = projectile_at(&mut world, ProjectileKind::Swing, a, bx - 30.0, by);
        assert!(world.push_ball(&mut swing));
        let first = world.registry.ball.as_ref().unwrap().vel_x;
        assert!(first > 0.0);
        world.push_ball(&mut swing);
        assert_eq!(world.registry.ball.as_ref().unwrap().vel_x, first);
    }

    #[test]
    fn ball_slows_and_bounces() {
        let mut ball = Ball::new();
        ball.vel_x = 10.0;
        integrate(&mut ball);
        assert!((ball.vel_x - 10.0 * ball.friction).abs() < 1e-4);

        ball.y = BORDER + ball.radius + 1.0;
        ball.vel_y = -5.0;
        integrate(&mut ball);
        assert!((ball.vel_y - 5.0 * ball.friction * BALL_BOUNCE_DAMPING).abs() < 1e-4);
        assert!(ball.y >= BORDER + ball.radius);
    }

    #[test]
    fn goal_costs_defenders_a_life_and_resets_ball() {
        let (mut world, a, b) = objective_duel();
        let (_, cy) = world_center();
        {
            let ball = world.registry.ball.as_mut().unwrap();
            ball.x = GOAL_LINE_INSET + 5.0;
            ball.y = cy + GOAL_HALF_HEIGHT + GOAL_Y_BAND - 10.0;
            ball.vel_x = -10.0;
        }
        world.update_ball(T0);

        assert_eq!(world.registry.players[&a].lives, 2);
        assert_eq!(world.registry.players[&b].lives, 3);
        let ball = world.registry.ball.as_ref().unwrap();
        assert_eq!((ball.x, ball.y), world_center());
        let events = world.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            ServerMsg::Collision {
                kind: CollisionKind::Goal,
                ..
            }
        )));
    }

    #[test]
    fn wide_shots_are_not_goals() {
        let (_, cy) = world_center();
        assert_eq!(goal_at(50.0, 300.0), None);
        assert_eq!(goal_at(50.0, cy), Some(GoalSide::Left));
        assert_eq!(goal_at(WORLD_WIDTH - 50.0, cy + GOAL_HALF_HEIGHT + 20.0), Some(GoalSide::Right));
        assert_eq!(goal_at(200.0, cy), None);
    }
}
