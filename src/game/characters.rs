//! Character stat blocks and passives

use crate::ws::protocol::Character;

use super::entities::ProjectileKind;

/// Passive trait carried by a character for its whole life
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Passive {
    /// Subtracts a fixed amount from every direct hit
    DamageReduction(f32),
    /// Negates the first direct hit of each life, then breaks
    OneTimeShield,
    /// Cannot be frozen
    FreezeImmune,
    None,
}

/// Per-character constants
#[derive(Debug, Clone, Copy)]
pub struct CharacterStats {
    pub max_health: f32,
    pub max_ammo: u32,
    /// Idle time before one ammo unit is restored (ms)
    pub reload_delay: u64,
    /// Movement speed in pixels per tick
    pub base_speed: f32,
    pub passive: Passive,
}

impl CharacterStats {
    pub fn for_character(character: Character) -> Self {
        match character {
            Character::Vanguard => Self {
                max_health: 120.0,
                max_ammo: 3,
                reload_delay: 2000,
                base_speed: 5.0,
                passive: Passive::DamageReduction(5.0),
            },
            Character::Volt => Self {
                max_health: 100.0,
                max_ammo: 3,
                reload_delay: 1800,
                base_speed: 5.5,
                passive: Passive::None,
            },
            Character::Frost => Self {
                max_health: 100.0,
                max_ammo: 4,
                reload_delay: 1500,
                base_speed: 5.5,
                passive: Passive::FreezeImmune,
            },
            Character::Cyclone => Self {
                max_health: 110.0,
                max_ammo: 3,
                reload_delay: 2000,
                base_speed: 5.0,
                passive: Passive::OneTimeShield,
            },
        }
    }
}

/// What a charged attack does for a character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuperKind {
    Projectile(ProjectileKind),
    /// Placed at the aim point rather than fired from the muzzle
    Area(ProjectileKind),
    Dash,
}

/// Attack table for a character
#[derive(Debug, Clone, Copy)]
pub struct Kit {
    pub basic: ProjectileKind,
    pub charged: SuperKind,
    /// Dash leaves ice trails behind it
    pub dash_trail: bool,
    /// Basic attack schedules a follow-up swing
    pub combo: bool,
    /// Spin status cannot take hold
    pub spin_immune: bool,
}

impl Kit {
    pub fn for_character(character: Character) -> Self {
        match character {
            Character::Vanguard => Self {
                basic: ProjectileKind::Slug,
                charged: SuperKind::Projectile(ProjectileKind::Cannon),
                dash_trail: false,
                combo: false,
                spin_immune: false,
            },
            Character::Volt => Self {
                basic: ProjectileKind::Bolt,
                charged: SuperKind::Area(ProjectileKind::Storm),
                dash_trail: false,
                combo: false,
                spin_immune: false,
            },
            Character::Frost => Self {
                basic: ProjectileKind::Shard,
                charged: SuperKind::Dash,
                dash_trail: true,
                combo: false,
                spin_immune: false,
            },
            Character::Cyclone => Self {
                basic: ProjectileKind::Swing,
                charged: SuperKind::Projectile(ProjectileKind::Tornado),
                dash_trail: false,
                combo: true,
                spin_immune: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_character_has_positive_stats() {
        for character in Character::ALL {
            let stats = CharacterStats::for_character(character);
            assert!(stats.max_health > 0.0);
            assert!(stats.max_ammo > 0);
            assert!(stats.base_speed > 0.0);
        }
    }

    #[test]
    fn only_frost_dashes() {
        for character in Character::ALL {
            let kit = Kit::for_character(character);
            assert_eq!(kit.charged == SuperKind::Dash, character == Character::Frost);
        }
    }
}
