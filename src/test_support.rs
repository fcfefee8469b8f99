//! Shared harness for the in-module tests: a fully-resourced `World` and a
//! `step` that runs one fixed frame through every system in schedule order.

use std::time::Duration;

use bevy::ecs::system::RunSystemOnce;
use bevy::prelude::*;

use crate::animation;
use crate::components::{Archetype, GameConfig};
use crate::events::GameEventBus;
use crate::input::PlayerInput;
use crate::registry::ActorRegistry;
use crate::spawn::{enemy_bundle, player_bundle, StateLibrary};
use crate::tilemap::Tilemap;
use crate::timer::GameClock;

/// A wide flat floor just below y = 0.
pub fn flat_floor_map() -> Tilemap {
    let mut map = Tilemap::new(16.0);
    for x in -50..150 {
        map.insert_tile(1, (x, -1), false);
    }
    map
}

pub fn world_with(map: Tilemap) -> World {
    let mut world = World::new();
    world.insert_resource(Time::<Fixed>::from_hz(60.0));
    world.insert_resource(GameClock::default());
    world.insert_resource(GameConfig::default());
    world.insert_resource(GameEventBus::default());
    world.insert_resource(PlayerInput::default());
    world.insert_resource(ActorRegistry::default());
    world.insert_resource(StateLibrary::default());
    world.insert_resource(animation::default_library());
    world.insert_resource(map);
    world
}

pub fn spawn_player_at(world: &mut World, pos: Vec2) -> Entity {
    let id = world.resource_mut::<ActorRegistry>().allocate();
    let clock = *world.resource::<GameClock>();
    let config = world.resource::<GameConfig>().clone();
    let bundle = player_bundle(world.resource::<StateLibrary>(), &clock, &config, id, pos);
    let entity = world.spawn(bundle).id();
    world
        .resource_mut::<ActorRegistry>()
        .bind(id, entity, Archetype::Player);
    entity
}

pub fn spawn_enemy_at(
    world: &mut World,
    archetype: Archetype,
    pos: Vec2,
    target: Option<Entity>,
) -> Entity {
    let id = world.resource_mut::<ActorRegistry>().allocate();
    let library = world.resource::<animation::AnimationLibrary>().clone();
    let bundle = enemy_bundle(
        world.resource::<StateLibrary>(),
        &library,
        archetype,
        id,
        pos,
        target,
    );
    let entity = world.spawn(bundle).id();
    world
        .resource_mut::<ActorRegistry>()
        .bind(id, entity, archetype);
    entity
}

/// One simulated frame, in the same order the app schedules run:
/// clock and targeting, player input, physics, state machines, projectiles,
/// animation, combat, cull.
pub fn step(world: &mut World) {
    world
        .resource_mut::<Time<Fixed>>()
        .advance_by(Duration::from_secs_f32(1.0 / 60.0));

    world.run_system_once(crate::timer::tick_clock).expect("clock");
    world.run_system_once(crate::ai::refresh_targets).expect("targets");
    world
        .run_system_once(crate::player::apply_player_input)
        .expect("input");
    world.run_system_once(crate::physics::apply_gravity).expect("gravity");
    world
        .run_system_once(crate::physics::resolve_movement)
        .expect("movement");
    world
        .run_system_once(crate::physics::probe_contacts)
        .expect("contacts");
    world
        .run_system_once(crate::fsm::drive_state_machines)
        .expect("state machines");
    world
        .run_system_once(crate::projectile::update_projectiles)
        .expect("projectiles");
    world
        .run_system_once(crate::projectile::spawn_requested_projectiles)
        .expect("projectile spawns");
    world
        .run_system_once(crate::animation::advance_animation_frames)
        .expect("animation");
    world
        .run_system_once(crate::combat::resolve_melee_combat)
        .expect("melee combat");
    world
        .run_system_once(crate::combat::resolve_projectile_hits)
        .expect("projectile combat");
    world.run_system_once(crate::registry::cull_dead).expect("cull");
}
