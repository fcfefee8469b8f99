use bevy::prelude::*;

use crate::components::{
    Body, ContactSides, Facing, GameConfig, GamePosition, Locomotion, SimStep, Velocity,
};
use crate::player::PlayerControl;
use crate::tilemap::Tilemap;

pub struct PhysicsPlugin;

impl Plugin for PhysicsPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            FixedUpdate,
            (apply_gravity, resolve_movement, probe_contacts)
                .chain()
                .in_set(SimStep::Physics),
        );
    }
}

/// Strict-inequality overlap: rectangles that merely touch do not collide,
/// so a hitbox clamped flush against a tile edge stays resolved.
pub fn rects_overlap(a: &Rect, b: &Rect) -> bool {
    a.min.x < b.max.x && a.max.x > b.min.x && a.min.y < b.max.y && a.max.y > b.min.y
}

fn shifted(rect: Rect, dx: f32, dy: f32) -> Rect {
    let delta = Vec2::new(dx, dy);
    Rect {
        min: rect.min + delta,
        max: rect.max + delta,
    }
}

/// Clamp `pos` so the hitbox's leading edge sits flush against the first
/// overlapping tile, and zero the axis velocity. Only the first overlapping
/// tile is resolved per axis per frame; fast motion can tunnel past thin
/// geometry.
pub fn resolve_horizontal(
    pos: &mut GamePosition,
    vel: &mut Velocity,
    body: &Body,
    tiles: &[Rect],
) {
    let hitbox = body.hitbox(pos);
    for tile in tiles {
        if !rects_overlap(&hitbox, tile) {
            continue;
        }
        if vel.x > 0.0 {
            pos.x -= hitbox.max.x - tile.min.x;
        } else if vel.x < 0.0 {
            pos.x += tile.max.x - hitbox.min.x;
        }
        vel.x = 0.0;
        break;
    }
}

pub fn resolve_vertical(pos: &mut GamePosition, vel: &mut Velocity, body: &Body, tiles: &[Rect]) {
    let hitbox = body.hitbox(pos);
    for tile in tiles {
        if !rects_overlap(&hitbox, tile) {
            continue;
        }
        if vel.y > 0.0 {
            pos.y -= hitbox.max.y - tile.min.y;
        } else if vel.y < 0.0 {
            pos.y += tile.max.y - hitbox.min.y;
        }
        vel.y = 0.0;
        break;
    }
}

pub fn apply_gravity(
    config: Res<GameConfig>,
    time: Res<Time<Fixed>>,
    mut query: Query<(
        &Locomotion,
        &mut Velocity,
        &ContactSides,
        Option<&PlayerControl>,
    )>,
) {
    let dt = time.delta_secs();
    for (locomotion, mut vel, contacts, control) in query.iter_mut() {
        if *locomotion == Locomotion::Air {
            continue;
        }
        // The dash pins vertical velocity for its whole duration.
        if control.is_some_and(|c| c.is_dashing) {
            vel.y = 0.0;
            continue;
        }
        if contacts.down && vel.y <= 0.0 {
            vel.y = 0.0;
            continue;
        }
        vel.y -= config.gravity * dt;
        vel.y = vel.y.max(-config.max_fall_speed);

        if control.is_some_and(|c| c.can_slide) {
            vel.y = vel.y.max(-config.max_fall_speed * config.wall_friction);
        }
    }
}

pub fn resolve_movement(
    time: Res<Time<Fixed>>,
    tilemap: Res<Tilemap>,
    mut query: Query<(&Locomotion, &mut GamePosition, &mut Velocity, &Body)>,
) {
    let dt = time.delta_secs();
    for (locomotion, mut pos, mut vel, body) in query.iter_mut() {
        match locomotion {
            // Flying bodies and projectiles pass through the tile grid.
            Locomotion::Air => {
                pos.x += vel.x * dt;
                pos.y += vel.y * dt;
            }
            Locomotion::Ground => {
                pos.x += vel.x * dt;
                let tiles = tilemap.physics_rects_around(body.hitbox(&pos));
                resolve_horizontal(&mut pos, &mut vel, body, &tiles);

                pos.y += vel.y * dt;
                let tiles = tilemap.physics_rects_around(body.hitbox(&pos));
                resolve_vertical(&mut pos, &mut vel, body, &tiles);
            }
        }
    }
}

/// Refresh contact flags by nudging the hitbox one pixel in each cardinal
/// direction, and derive the player's wall-slide availability.
pub fn probe_contacts(
    tilemap: Res<Tilemap>,
    mut query: Query<(
        &GamePosition,
        &Body,
        &Facing,
        &Velocity,
        &mut ContactSides,
        Option<&mut PlayerControl>,
    )>,
) {
    for (pos, body, facing, vel, mut contacts, control) in query.iter_mut() {
        let hitbox = body.hitbox(pos);
        let tiles = tilemap.physics_rects_around(hitbox);
        let touches = |probe: Rect| tiles.iter().any(|tile| rects_overlap(&probe, tile));

        contacts.left = touches(shifted(hitbox, -1.0, 0.0));
        contacts.right = touches(shifted(hitbox, 1.0, 0.0));
        contacts.up = touches(shifted(hitbox, 0.0, 1.0));
        contacts.down = touches(shifted(hitbox, 0.0, -1.0));

        if let Some(mut control) = control {
            let wall_contact = (contacts.left && facing.left) || (contacts.right && !facing.left);
            let beside_x = if facing.left {
                hitbox.min.x - tilemap.tile_size
            } else {
                hitbox.max.x
            };
            control.can_slide = vel.y < 0.0
                && wall_contact
                && !contacts.down
                && tilemap.is_solid_tile(Vec2::new(beside_x, hitbox.min.y));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::RunSystemOnce;
    use std::time::Duration;

    fn floor_map() -> Tilemap {
        let mut map = Tilemap::new(16.0);
        for x in -10..30 {
            map.insert_tile(1, (x, -1), false);
        }
        map
    }

    #[test]
    fn moving_right_clamps_the_hitbox_flush_against_the_tile() {
        // Solid tile with its left edge at x = 96; hitbox 20 wide.
        let mut map = Tilemap::new(16.0);
        map.insert_tile(1, (6, 0), false);
        let tile = map.tile_rect((6, 0));
        assert_eq!(tile.min.x, 96.0);

        let body = Body::new(Vec2::new(20.0, 14.0), Vec2::ZERO);
        let mut pos = GamePosition::new(90.0, 8.0);
        let mut vel = Velocity { x: 400.0, y: 0.0 };

        // One integration step carries the hitbox into the tile.
        pos.x += vel.x * (1.0 / 60.0);
        let tiles = map.physics_rects_around(body.hitbox(&pos));
        resolve_horizontal(&mut pos, &mut vel, &body, &tiles);

        let hitbox = body.hitbox(&pos);
        assert_eq!(hitbox.max.x, 96.0);
        assert_eq!(vel.x, 0.0);
    }

    #[test]
    fn moving_left_clamps_against_the_tile_right_edge() {
        let mut map = Tilemap::new(16.0);
        map.insert_tile(1, (0, 0), false);

        let body = Body::new(Vec2::new(12.0, 12.0), Vec2::ZERO);
        let mut pos = GamePosition::new(24.0, 8.0);
        let mut vel = Velocity { x: -600.0, y: 0.0 };

        pos.x += vel.x * (1.0 / 60.0);
        let tiles = map.physics_rects_around(body.hitbox(&pos));
        resolve_horizontal(&mut pos, &mut vel, &body, &tiles);

        assert_eq!(body.hitbox(&pos).min.x, 16.0);
        assert_eq!(vel.x, 0.0);
    }

    #[test]
    fn falling_body_lands_on_the_floor() {
        let map = floor_map();
        let body = Body::new(Vec2::new(12.0, 14.0), Vec2::ZERO);
        let mut pos = GamePosition::new(8.0, 20.0);
        let mut vel = Velocity { x: 0.0, y: -1200.0 };

        pos.y += vel.y * (1.0 / 60.0);
        let tiles = map.physics_rects_around(body.hitbox(&pos));
        resolve_vertical(&mut pos, &mut vel, &body, &tiles);

        assert_eq!(body.hitbox(&pos).min.y, 0.0);
        assert_eq!(vel.y, 0.0);
    }

    #[test]
    fn touching_rects_do_not_overlap() {
        let a = Rect::from_corners(Vec2::ZERO, Vec2::new(10.0, 10.0));
        let b = Rect::from_corners(Vec2::new(10.0, 0.0), Vec2::new(20.0, 10.0));
        assert!(!rects_overlap(&a, &b));
        assert!(rects_overlap(&a, &shifted(b, -0.5, 0.0)));
    }

    fn physics_world(map: Tilemap) -> World {
        let mut world = World::new();
        world.insert_resource(Time::<Fixed>::from_hz(60.0));
        world.insert_resource(GameConfig::default());
        world.insert_resource(map);
        world
    }

    fn step_physics(world: &mut World) {
        world
            .resource_mut::<Time<Fixed>>()
            .advance_by(Duration::from_secs_f32(1.0 / 60.0));
        world.run_system_once(apply_gravity).expect("gravity");
        world.run_system_once(resolve_movement).expect("movement");
        world.run_system_once(probe_contacts).expect("contacts");
    }

    fn spawn_ground_body(world: &mut World, pos: GamePosition) -> Entity {
        world
            .spawn((
                Locomotion::Ground,
                pos,
                Velocity::default(),
                Facing::default(),
                Body::new(Vec2::new(12.0, 14.0), Vec2::ZERO),
                ContactSides::default(),
            ))
            .id()
    }

    #[test]
    fn grounded_body_reports_down_contact_and_stops_falling() {
        let mut world = physics_world(floor_map());
        let entity = spawn_ground_body(&mut world, GamePosition::new(8.0, 40.0));

        for _ in 0..120 {
            step_physics(&mut world);
        }

        let contacts = *world.get::<ContactSides>(entity).unwrap();
        let pos = *world.get::<GamePosition>(entity).unwrap();
        let vel = *world.get::<Velocity>(entity).unwrap();
        assert!(contacts.down);
        assert_eq!(vel.y, 0.0);
        assert!((pos.y - 7.0).abs() < 1e-3);
    }

    #[test]
    fn air_bodies_ignore_gravity_and_tiles() {
        let mut map = floor_map();
        for y in 0..10 {
            map.insert_tile(1, (5, y), false);
        }
        let mut world = physics_world(map);
        let entity = world
            .spawn((
                Locomotion::Air,
                GamePosition::new(8.0, 40.0),
                Velocity { x: 120.0, y: 0.0 },
                Facing::default(),
                Body::new(Vec2::new(12.0, 12.0), Vec2::ZERO),
            ))
            .id();

        for _ in 0..60 {
            step_physics(&mut world);
        }

        let pos = *world.get::<GamePosition>(entity).unwrap();
        assert!((pos.x - 128.0).abs() < 0.5);
        assert_eq!(pos.y, 40.0);
    }

    #[test]
    fn side_contact_is_detected_against_a_wall() {
        let mut map = floor_map();
        for y in 0..5 {
            map.insert_tile(1, (2, y), false);
        }
        let mut world = physics_world(map);
        let entity = spawn_ground_body(&mut world, GamePosition::new(20.0, 7.0));
        world.get_mut::<Velocity>(entity).unwrap().x = 200.0;

        for _ in 0..20 {
            step_physics(&mut world);
        }

        let contacts = *world.get::<ContactSides>(entity).unwrap();
        let vel = *world.get::<Velocity>(entity).unwrap();
        assert!(contacts.right);
        assert!(contacts.down);
        assert_eq!(vel.x, 0.0);
    }
}
