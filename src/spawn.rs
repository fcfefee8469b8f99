use std::sync::Arc;

use bevy::prelude::*;

use crate::animation::{AnimationController, AnimationLibrary};
use crate::components::{
    Alive, Archetype, Body, ContactSides, Facing, GameConfig, GamePosition, Locomotion, Velocity,
};
use crate::enemy::{
    bat_states, enemy_stats, fireworm_states, mushroom_states, AttackRule, ChaseRule, Combatant,
};
use crate::fsm::{Machine, StateSet};
use crate::player::{player_states, player_stats, PlayerControl};
use crate::registry::{ActorId, ActorRegistry};
use crate::tilemap::Tilemap;
use crate::timer::{GameClock, IntervalTimer};

/// One shared, immutable state set per archetype. Every instance of an
/// archetype points at the same graph.
#[derive(Resource)]
pub struct StateLibrary {
    pub player: Arc<StateSet>,
    pub bat: Arc<StateSet>,
    pub mushroom: Arc<StateSet>,
    pub fireworm: Arc<StateSet>,
}

impl Default for StateLibrary {
    fn default() -> Self {
        Self {
            player: player_states(),
            bat: bat_states(),
            mushroom: mushroom_states(),
            fireworm: fireworm_states(),
        }
    }
}

fn body_for(archetype: Archetype) -> Body {
    match archetype {
        Archetype::Player => Body::new(Vec2::new(40.0, 56.0), Vec2::new(6.0, 4.0)),
        Archetype::Bat => Body::new(Vec2::new(48.0, 32.0), Vec2::new(8.0, 4.0)),
        Archetype::Mushroom => Body::new(Vec2::new(48.0, 64.0), Vec2::new(10.0, 8.0)),
        Archetype::Fireworm => Body::new(Vec2::new(96.0, 48.0), Vec2::new(20.0, 8.0)),
        Archetype::FireProjectile => Body::new(Vec2::new(24.0, 16.0), Vec2::new(4.0, 2.0)),
    }
}

pub fn player_bundle(
    states: &StateLibrary,
    clock: &GameClock,
    config: &GameConfig,
    id: ActorId,
    pos: Vec2,
) -> impl Bundle {
    let machine = Machine::new(states.player.clone());
    let anim = AnimationController::new("player", machine.current());
    (
        Archetype::Player,
        id,
        GamePosition::new(pos.x, pos.y),
        Velocity::default(),
        Facing::default(),
        body_for(Archetype::Player),
        ContactSides::default(),
        Locomotion::Ground,
        Alive::default(),
        player_stats(),
        machine,
        anim,
        PlayerControl::new(clock, config),
    )
}

/// Invulnerability and attack cooldowns cover the base window plus the
/// respective animation, so an enemy is never re-engaged mid-flinch.
fn enemy_timers(
    library: &AnimationLibrary,
    archetype: Archetype,
    hit_ms: f64,
    attack_ms: f64,
) -> (IntervalTimer, IntervalTimer) {
    let key = archetype.key();
    let hit = IntervalTimer::stale(hit_ms + library.clip_duration_ms(key, "hit"));
    let attack = IntervalTimer::stale(attack_ms + library.clip_duration_ms(key, "attack"));
    (hit, attack)
}

pub fn enemy_bundle(
    states: &StateLibrary,
    library: &AnimationLibrary,
    archetype: Archetype,
    id: ActorId,
    pos: Vec2,
    target: Option<Entity>,
) -> impl Bundle {
    let body = body_for(archetype);
    let (set, locomotion, chase_radius, chase_rule, attack_rule) = match archetype {
        Archetype::Bat => (
            states.bat.clone(),
            Locomotion::Air,
            500.0,
            ChaseRule::Radial,
            AttackRule::Radial,
        ),
        Archetype::Mushroom => (
            states.mushroom.clone(),
            Locomotion::Ground,
            400.0,
            ChaseRule::HorizontalBand,
            AttackRule::MeleeOverlap,
        ),
        Archetype::Fireworm => (
            states.fireworm.clone(),
            Locomotion::Ground,
            800.0,
            ChaseRule::HorizontalBand,
            AttackRule::Horizontal {
                max_x: 400.0,
                max_y: body.size.y,
            },
        ),
        other => panic!("'{}' is not an enemy archetype", other.key()),
    };
    let (hit_timer, attack_timer) = enemy_timers(library, archetype, 2000.0, 1700.0);
    let attack_radius = (body.size.x - body.inset.x * 2.0) / 2.0;
    let machine = Machine::new(set);
    let anim = AnimationController::new(archetype.key(), machine.current());

    (
        archetype,
        id,
        GamePosition::new(pos.x, pos.y),
        Velocity::default(),
        Facing::default(),
        body,
        ContactSides::default(),
        locomotion,
        Alive::default(),
        enemy_stats(),
        machine,
        anim,
        Combatant {
            target_entity: target,
            target: None,
            hit_timer,
            attack_timer,
            chase_radius,
            attack_radius,
            chase_rule,
            attack_rule,
            home: pos,
            fired_this_attack: false,
            fire_request: None,
        },
    )
}

pub fn spawn_player(
    commands: &mut Commands,
    registry: &mut ActorRegistry,
    states: &StateLibrary,
    clock: &GameClock,
    config: &GameConfig,
    pos: Vec2,
) -> Entity {
    let id = registry.allocate();
    let entity = commands
        .spawn(player_bundle(states, clock, config, id, pos))
        .id();
    registry.bind(id, entity, Archetype::Player);
    entity
}

pub fn spawn_enemy(
    commands: &mut Commands,
    registry: &mut ActorRegistry,
    states: &StateLibrary,
    library: &AnimationLibrary,
    archetype: Archetype,
    pos: Vec2,
    target: Option<Entity>,
) -> Entity {
    let id = registry.allocate();
    let entity = commands
        .spawn(enemy_bundle(states, library, archetype, id, pos, target))
        .id();
    registry.bind(id, entity, archetype);
    entity
}

/// Populate the demo level: the player at the map's spawn point and a small
/// enemy roster targeting them.
fn spawn_level_actors(
    mut commands: Commands,
    mut registry: ResMut<ActorRegistry>,
    states: Res<StateLibrary>,
    library: Res<AnimationLibrary>,
    clock: Res<GameClock>,
    config: Res<GameConfig>,
    map: Res<Tilemap>,
) {
    let spawn = Vec2::new(map.player_spawn.0, map.player_spawn.1);
    let player = spawn_player(&mut commands, &mut registry, &states, &clock, &config, spawn);

    for (archetype, pos) in [
        (Archetype::Bat, Vec2::new(800.0, 240.0)),
        (Archetype::Mushroom, Vec2::new(600.0, 48.0)),
        (Archetype::Fireworm, Vec2::new(1200.0, 40.0)),
    ] {
        spawn_enemy(
            &mut commands,
            &mut registry,
            &states,
            &library,
            archetype,
            pos,
            Some(player),
        );
    }
}

pub struct SpawnPlugin;

impl Plugin for SpawnPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<StateLibrary>()
            .add_systems(Startup, spawn_level_actors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_sets_are_shared_across_instances() {
        let states = StateLibrary::default();
        let a = Machine::new(states.bat.clone());
        let b = Machine::new(states.bat.clone());
        assert_eq!(a.current(), "fly");
        assert_eq!(b.current(), "fly");
        assert_eq!(Arc::strong_count(&states.bat), 3);
    }

    #[test]
    fn enemy_timers_extend_past_the_animation() {
        let library = crate::animation::default_library();
        let (hit, attack) = enemy_timers(&library, Archetype::Mushroom, 2000.0, 1700.0);
        // Mushroom hit clip: 4 frames at 10 fps = 400 ms.
        assert_eq!(hit.interval_ms(), 2400.0);
        // Mushroom attack clip: 10 frames at 12 fps ~ 833 ms.
        assert!((attack.interval_ms() - 2533.333).abs() < 0.5);
    }

    #[test]
    #[should_panic(expected = "not an enemy archetype")]
    fn player_cannot_be_built_as_an_enemy() {
        let states = StateLibrary::default();
        let library = crate::animation::default_library();
        let _ = enemy_bundle(
            &states,
            &library,
            Archetype::Player,
            ActorId(1),
            Vec2::ZERO,
            None,
        );
    }
}
