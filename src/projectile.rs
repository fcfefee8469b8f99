use bevy::prelude::*;

use crate::animation::AnimationController;
use crate::components::{
    Alive, Archetype, Body, Facing, GameConfig, GamePosition, Locomotion, SimStep, Velocity,
};
use crate::enemy::Combatant;
use crate::registry::ActorRegistry;

/// A fired projectile. Once its range is spent or it connects, it switches
/// to the explosion clip, stops moving, and keeps rendering until that clip
/// finishes; the registry then culls it.
#[derive(Component, Clone, Copy, Debug)]
pub struct Projectile {
    pub range_remaining: f32,
    pub damage: f32,
    pub ready_to_kill: bool,
}

impl Projectile {
    /// Do not call on a projectile that is already exploding.
    pub fn mark_ready_to_kill(&mut self, vel: &mut Velocity, anim: &mut AnimationController) {
        self.ready_to_kill = true;
        vel.x = 0.0;
        vel.y = 0.0;
        anim.play("explosion");
    }
}

pub fn fireball_bundle(
    config: &GameConfig,
    id: crate::registry::ActorId,
    pos: Vec2,
    velocity: Vec2,
) -> impl Bundle {
    (
        Archetype::FireProjectile,
        id,
        GamePosition::new(pos.x, pos.y),
        Velocity {
            x: velocity.x,
            y: velocity.y,
        },
        Facing {
            left: velocity.x < 0.0,
        },
        Body::new(Vec2::new(24.0, 16.0), Vec2::new(4.0, 2.0)),
        Locomotion::Air,
        Alive::default(),
        AnimationController::new("fire_projectile", "flight"),
        Projectile {
            range_remaining: config.projectile_range,
            damage: config.projectile_damage,
            ready_to_kill: false,
        },
    )
}

/// Spend range against this frame's displacement and run the explosion
/// lifecycle. Runs after movement, so a range shorter than one frame's
/// travel detonates on the projectile's very first update.
pub fn update_projectiles(
    time: Res<Time<Fixed>>,
    mut query: Query<(
        &mut Projectile,
        &mut Velocity,
        &mut AnimationController,
        &mut Alive,
    )>,
) {
    let dt = time.delta_secs();
    for (mut projectile, mut vel, mut anim, mut alive) in query.iter_mut() {
        if projectile.ready_to_kill {
            if anim.finished() {
                alive.0 = false;
            }
            continue;
        }
        let displacement = Vec2::new(vel.x, vel.y).length() * dt;
        projectile.range_remaining -= displacement;
        if projectile.range_remaining <= 0.0 {
            projectile.mark_ready_to_kill(&mut vel, &mut anim);
        }
    }
}

/// Drain queued fireball requests into live projectile entities.
pub fn spawn_requested_projectiles(
    mut commands: Commands,
    config: Res<GameConfig>,
    mut registry: ResMut<ActorRegistry>,
    mut shooters: Query<&mut Combatant>,
) {
    for mut combatant in shooters.iter_mut() {
        let Some(request) = combatant.fire_request.take() else {
            continue;
        };
        let id = registry.allocate();
        let entity = commands
            .spawn(fireball_bundle(&config, id, request.pos, request.velocity))
            .id();
        registry.bind(id, entity, Archetype::FireProjectile);
    }
}

pub struct ProjectilePlugin;

impl Plugin for ProjectilePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            FixedUpdate,
            (update_projectiles, spawn_requested_projectiles)
                .chain()
                .in_set(SimStep::Behavior)
                .after(crate::fsm::drive_state_machines),
        );
    }
}
