use bevy::prelude::*;

/// Frame phases. `Input`..`Animate` run in `FixedUpdate`, `Combat` and
/// `Cull` in `FixedPostUpdate`; `main` chains them in this order.
#[derive(SystemSet, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SimStep {
    Input,
    Physics,
    Behavior,
    Animate,
    Combat,
    Cull,
}

/// Entity kind. Each archetype has its own state set and animation graph.
#[derive(Component, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Archetype {
    Player,
    Bat,
    Mushroom,
    Fireworm,
    FireProjectile,
}

impl Archetype {
    /// Key used for animation graph lookup and event payloads.
    pub fn key(self) -> &'static str {
        match self {
            Archetype::Player => "player",
            Archetype::Bat => "bat",
            Archetype::Mushroom => "mushroom",
            Archetype::Fireworm => "fireworm",
            Archetype::FireProjectile => "fire_projectile",
        }
    }
}

/// Sub-tile precision position (world units, y up). Center of the body.
#[derive(Component, Clone, Copy, Default, Debug)]
pub struct GamePosition {
    pub x: f32,
    pub y: f32,
}

impl GamePosition {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn vec(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Velocity in world units per second.
#[derive(Component, Clone, Copy, Default, Debug)]
pub struct Velocity {
    pub x: f32,
    pub y: f32,
}

/// Horizontal facing. Sprites are authored facing right.
#[derive(Component, Clone, Copy, Default, Debug)]
pub struct Facing {
    pub left: bool,
}

/// Body extents. `hitbox` is the inset rectangle used for tile and combat
/// overlap; `rect` is the full sprite-sized rectangle.
#[derive(Component, Clone, Copy, Debug)]
pub struct Body {
    pub size: Vec2,
    pub inset: Vec2,
}

impl Body {
    pub fn new(size: Vec2, inset: Vec2) -> Self {
        Self { size, inset }
    }

    pub fn rect(&self, pos: &GamePosition) -> Rect {
        Rect::from_center_size(pos.vec(), self.size)
    }

    pub fn hitbox(&self, pos: &GamePosition) -> Rect {
        Rect::from_center_size(pos.vec(), self.size - self.inset * 2.0)
    }
}

/// Solid-tile contact flags, refreshed by the physics probe each frame.
#[derive(Component, Clone, Copy, Default, Debug)]
pub struct ContactSides {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

/// Movement mode, chosen at construction. Ground bodies integrate gravity
/// and resolve against solid tiles; air bodies integrate velocity directly.
#[derive(Component, Clone, Copy, PartialEq, Eq, Debug)]
pub enum Locomotion {
    Ground,
    Air,
}

/// Live flag consumed by the registry cull pass.
#[derive(Component, Clone, Copy, Debug)]
pub struct Alive(pub bool);

impl Default for Alive {
    fn default() -> Self {
        Self(true)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Stat {
    Health,
    Mana,
    Shield,
    Damage,
    ManaRegain,
}

pub const STAT_COUNT: usize = 5;

impl Stat {
    fn index(self) -> usize {
        match self {
            Stat::Health => 0,
            Stat::Mana => 1,
            Stat::Shield => 2,
            Stat::Damage => 3,
            Stat::ManaRegain => 4,
        }
    }
}

#[derive(Clone, Copy, Default, Debug)]
pub struct StatRange {
    pub min: Option<f32>,
    pub max: Option<f32>,
}

impl StatRange {
    pub fn clamp(&self, value: f32) -> f32 {
        let mut value = value;
        if let Some(min) = self.min {
            value = value.max(min);
        }
        if let Some(max) = self.max {
            value = value.min(max);
        }
        value
    }
}

/// Fixed stat table with per-stat bounds. Every write clamps, so health can
/// never leave its configured range no matter who modifies it.
#[derive(Component, Clone, Debug)]
pub struct Stats {
    values: [f32; STAT_COUNT],
    bounds: [StatRange; STAT_COUNT],
}

impl Default for Stats {
    fn default() -> Self {
        let mut stats = Self {
            values: [0.0; STAT_COUNT],
            bounds: [StatRange::default(); STAT_COUNT],
        };
        stats.bounds[Stat::Health.index()] = StatRange {
            min: Some(0.0),
            max: Some(1.0),
        };
        stats.bounds[Stat::Mana.index()] = StatRange {
            min: Some(0.0),
            max: Some(1.0),
        };
        stats.bounds[Stat::Shield.index()] = StatRange {
            min: Some(0.0),
            max: None,
        };
        stats.bounds[Stat::Damage.index()] = StatRange {
            min: Some(0.0),
            max: None,
        };
        stats.values[Stat::Health.index()] = 1.0;
        stats
    }
}

impl Stats {
    pub fn with(mut self, stat: Stat, value: f32) -> Self {
        self.set(stat, value);
        self
    }

    pub fn with_bounds(mut self, stat: Stat, min: Option<f32>, max: Option<f32>) -> Self {
        self.bounds[stat.index()] = StatRange { min, max };
        self.set(stat, self.get(stat));
        self
    }

    pub fn get(&self, stat: Stat) -> f32 {
        self.values[stat.index()]
    }

    pub fn set(&mut self, stat: Stat, value: f32) {
        self.values[stat.index()] = self.bounds[stat.index()].clamp(value);
    }

    pub fn modify(&mut self, stat: Stat, delta: f32) {
        self.set(stat, self.get(stat) + delta);
    }

    pub fn can_afford(&self, stat: Stat, cost: f32) -> bool {
        self.get(stat) >= cost
    }

    pub fn take_damage(&mut self, amount: f32) {
        self.modify(Stat::Health, -amount.abs());
    }
}

/// Tuning constants handed in externally. Defaults match the built-in demo
/// level; a JSON config file can override any subset of fields.
#[derive(Resource, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub tile_size: f32,
    pub gravity: f32,
    pub max_fall_speed: f32,
    pub jump_velocity: f32,
    pub move_speed: f32,
    pub enemy_speed: f32,
    pub dash_speed: f32,
    pub wall_friction: f32,
    pub knockback_speed: f32,
    pub movement_start_delay_ms: f64,
    pub attack_cooldown_ms: f64,
    pub dash_cooldown_ms: f64,
    pub player_hit_invuln_ms: f64,
    pub projectile_speed: f32,
    pub projectile_damage: f32,
    pub projectile_range: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tile_size: 16.0,
            gravity: 1200.0,
            max_fall_speed: 1800.0,
            jump_velocity: 900.0,
            move_speed: 300.0,
            enemy_speed: 150.0,
            dash_speed: 2250.0,
            wall_friction: 0.1,
            knockback_speed: 600.0,
            movement_start_delay_ms: 200.0,
            attack_cooldown_ms: 300.0,
            dash_cooldown_ms: 2000.0,
            player_hit_invuln_ms: 2000.0,
            projectile_speed: 750.0,
            projectile_damage: 0.2,
            projectile_range: 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_clamps_to_bounds_after_every_modification() {
        let mut stats = Stats::default();
        stats.modify(Stat::Health, 5.0);
        assert_eq!(stats.get(Stat::Health), 1.0);

        stats.modify(Stat::Health, -3.0);
        assert_eq!(stats.get(Stat::Health), 0.0);
    }

    #[test]
    fn take_damage_uses_the_magnitude() {
        let mut stats = Stats::default();
        stats.take_damage(-0.3);
        assert!((stats.get(Stat::Health) - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn custom_bounds_apply_on_configuration() {
        let stats = Stats::default()
            .with(Stat::Shield, 2.0)
            .with_bounds(Stat::Shield, Some(0.0), Some(1.5));
        assert_eq!(stats.get(Stat::Shield), 1.5);
    }

    #[test]
    fn unbounded_stats_pass_values_through() {
        let mut stats = Stats::default();
        stats.set(Stat::ManaRegain, -4.0);
        assert_eq!(stats.get(Stat::ManaRegain), -4.0);
    }

    #[test]
    fn hitbox_is_inset_from_the_body_rect() {
        let body = Body::new(Vec2::new(40.0, 56.0), Vec2::new(6.0, 4.0));
        let pos = GamePosition::new(100.0, 50.0);

        let rect = body.rect(&pos);
        let hitbox = body.hitbox(&pos);
        assert_eq!(rect.width(), 40.0);
        assert_eq!(hitbox.width(), 28.0);
        assert_eq!(hitbox.height(), 48.0);
        assert_eq!(rect.center(), hitbox.center());
    }

    #[test]
    fn game_config_accepts_partial_json() {
        let config: GameConfig = serde_json::from_str(r#"{ "gravity": 900.0 }"#).unwrap();
        assert_eq!(config.gravity, 900.0);
        assert_eq!(config.tile_size, GameConfig::default().tile_size);
    }
}
