use std::sync::Arc;

use bevy::prelude::*;
use serde_json::json;

use crate::animation::AnimationController;
use crate::components::{
    Body, ContactSides, Facing, GameConfig, GamePosition, SimStep, Stat, Stats, Velocity,
};
use crate::events::GameEventBus;
use crate::fsm::{AttackWindow, BehaviorState, Machine, StateCtx, StateSet};
use crate::input::PlayerInput;
use crate::registry::ActorId;
use crate::skill::Skill;
use crate::timer::{GameClock, IntervalTimer};

/// The dash holds 15% of the dash timer's interval.
const DASH_DURATION_RATIO: f64 = 0.15;

/// Player-only capability block: combat timers, dash/attack flags, skills,
/// and the wall-slide probe result. States and combat read through this.
#[derive(Component, Clone)]
pub struct PlayerControl {
    pub is_attacking: bool,
    pub is_dashing: bool,
    pub can_slide: bool,
    pub attack_timer: IntervalTimer,
    pub dash_timer: IntervalTimer,
    pub hit_timer: IntervalTimer,
    pub movement_start_timer: IntervalTimer,
    pub attack_size: Vec2,
    pub dash: Skill,
    pub heal: Skill,
}

impl PlayerControl {
    pub fn new(clock: &GameClock, config: &GameConfig) -> Self {
        Self {
            is_attacking: false,
            is_dashing: false,
            can_slide: false,
            attack_timer: IntervalTimer::stale(config.attack_cooldown_ms),
            dash_timer: IntervalTimer::stale(config.dash_cooldown_ms),
            hit_timer: IntervalTimer::stale(config.player_hit_invuln_ms),
            movement_start_timer: IntervalTimer::new(clock, config.movement_start_delay_ms),
            attack_size: Vec2::new(64.0, 86.0),
            dash: Skill::new(
                vec![(Stat::Mana, 0.3)],
                vec![(Stat::Damage, 0.1)],
                config.dash_cooldown_ms + 1000.0,
            ),
            heal: Skill::new(
                vec![(Stat::Mana, 0.1)],
                vec![(Stat::Health, 0.1), (Stat::Shield, 0.05)],
                1000.0,
            ),
        }
    }
}

pub fn player_stats() -> Stats {
    Stats::default()
        .with(Stat::Health, 1.0)
        .with(Stat::Mana, 1.0)
        .with(Stat::Damage, 0.5)
        .with(Stat::ManaRegain, 0.06)
}

/// Swing reach while attacking: a rectangle extending from the hitbox center
/// in the facing direction, anchored at the hitbox top. Outside the attack
/// posture this is just the body hitbox.
pub fn attack_hitbox(
    pos: &GamePosition,
    body: &Body,
    facing: &Facing,
    attack_size: Vec2,
    attacking: bool,
) -> Rect {
    let hitbox = body.hitbox(pos);
    if !attacking {
        return hitbox;
    }
    let min_x = if facing.left {
        hitbox.center().x - attack_size.x
    } else {
        hitbox.center().x
    };
    Rect::from_corners(
        Vec2::new(min_x, hitbox.max.y - attack_size.y),
        Vec2::new(min_x + attack_size.x, hitbox.max.y),
    )
}

struct Idle;

impl BehaviorState for Idle {
    fn name(&self) -> &'static str {
        "idle"
    }

    fn next(&self, ctx: &StateCtx) -> Option<&'static str> {
        if !ctx.grounded() {
            return Some("jump");
        }
        if ctx.vel.x != 0.0 {
            return Some("run");
        }
        None
    }
}

struct IdleTurn;

impl BehaviorState for IdleTurn {
    fn name(&self) -> &'static str {
        "idleturn"
    }

    fn next(&self, ctx: &StateCtx) -> Option<&'static str> {
        if !ctx.grounded() {
            return Some("jump");
        }
        if ctx.vel.x != 0.0 {
            return Some("run");
        }
        if ctx.animation_finished() {
            return Some("idle");
        }
        None
    }
}

struct Run;

impl BehaviorState for Run {
    fn name(&self) -> &'static str {
        "run"
    }

    fn next(&self, ctx: &StateCtx) -> Option<&'static str> {
        if !ctx.grounded() {
            return Some("jump");
        }
        if ctx.vel.x == 0.0 {
            return Some("idle");
        }
        None
    }
}

struct Jump;

impl BehaviorState for Jump {
    fn name(&self) -> &'static str {
        "jump"
    }

    fn next(&self, ctx: &StateCtx) -> Option<&'static str> {
        if ctx.grounded() {
            return Some("idle");
        }
        if ctx.vel.y < 0.0 {
            return Some("fall");
        }
        if ctx.can_slide() {
            return Some("wallslide");
        }
        None
    }
}

struct Fall;

impl BehaviorState for Fall {
    fn name(&self) -> &'static str {
        "fall"
    }

    fn next(&self, ctx: &StateCtx) -> Option<&'static str> {
        if ctx.grounded() {
            return Some("idle");
        }
        if ctx.can_slide() {
            return Some("wallslide");
        }
        None
    }
}

struct WallSlide;

impl BehaviorState for WallSlide {
    fn name(&self) -> &'static str {
        "wallslide"
    }

    fn next(&self, ctx: &StateCtx) -> Option<&'static str> {
        if !ctx.can_slide() {
            return Some(if ctx.grounded() { "idle" } else { "jump" });
        }
        None
    }

    fn exit(&self, ctx: &mut StateCtx) {
        ctx.facing.left = !ctx.facing.left;
    }
}

struct Attack;

impl BehaviorState for Attack {
    fn name(&self) -> &'static str {
        "attack"
    }

    fn attack_window(&self) -> Option<AttackWindow> {
        Some(AttackWindow::new(0, 0))
    }

    fn enter(&self, ctx: &mut StateCtx) {
        ctx.vel.x = 0.0;
    }

    fn next(&self, ctx: &StateCtx) -> Option<&'static str> {
        if ctx.animation_finished() {
            return Some(if ctx.grounded() { "idle" } else { "jump" });
        }
        None
    }
}

struct Hit;

impl BehaviorState for Hit {
    fn name(&self) -> &'static str {
        "hit"
    }

    fn enter(&self, ctx: &mut StateCtx) {
        ctx.vel.x = 0.0;
        ctx.vel.y = 0.0;
        if let Some(control) = ctx.player.as_deref_mut() {
            control.hit_timer.reset_to_now(ctx.clock);
        }
    }

    fn next(&self, ctx: &StateCtx) -> Option<&'static str> {
        if ctx.animation_finished() {
            return Some(if ctx.grounded() { "idle" } else { "jump" });
        }
        None
    }
}

struct SkillCast;

impl BehaviorState for SkillCast {
    fn name(&self) -> &'static str {
        "skillcast"
    }

    fn update(&self, ctx: &mut StateCtx) {
        ctx.vel.x = 0.0;
    }

    fn next(&self, ctx: &StateCtx) -> Option<&'static str> {
        if ctx.animation_finished() {
            return Some(if ctx.grounded() { "idle" } else { "jump" });
        }
        None
    }
}

pub fn player_states() -> Arc<StateSet> {
    StateSet::new(
        "player",
        vec![
            Arc::new(Idle),
            Arc::new(IdleTurn),
            Arc::new(Run),
            Arc::new(Jump),
            Arc::new(Fall),
            Arc::new(WallSlide),
            Arc::new(Attack),
            Arc::new(Hit),
            Arc::new(SkillCast),
        ],
    )
}

type PlayerQueryItem<'a> = (
    &'a ActorId,
    &'a mut Machine,
    &'a mut Velocity,
    &'a mut Facing,
    &'a ContactSides,
    &'a AnimationController,
    &'a mut Stats,
    &'a mut PlayerControl,
);

/// Translate pressed keys into velocity intent, turn-arounds, jumps, dashes
/// and skill use. Runs before physics, so intent applies this frame; state
/// transitions it requests are picked up by the machine drive.
pub fn apply_player_input(
    clock: Res<GameClock>,
    config: Res<GameConfig>,
    time: Res<Time<Fixed>>,
    input: Res<PlayerInput>,
    mut bus: ResMut<GameEventBus>,
    mut query: Query<PlayerQueryItem<'_>>,
) {
    let dt = time.delta_secs();
    for (actor, mut machine, mut vel, mut facing, contacts, anim, mut stats, mut control) in
        query.iter_mut()
    {
        if control.is_attacking && anim.finished() {
            control.is_attacking = false;
            control.attack_timer.reset_to_now(&clock);
        }

        let regain = stats.get(Stat::ManaRegain);
        if regain != 0.0 {
            stats.modify(Stat::Mana, regain * dt);
        }

        manage_dash(&clock, &config, &mut vel, &facing, contacts, &mut control);

        if control.is_dashing || machine.is("hit") || machine.is("skillcast") {
            continue;
        }

        if input.dash
            && !machine.is("wallslide")
            && control.dash_timer.has_reached_interval(&clock)
            && control.dash.apply(&mut stats, &clock)
        {
            control.is_dashing = true;
            control.dash_timer.reset_to_now(&clock);
            bus.emit("skill", json!({ "name": "dash" }), Some(actor.0));
        }

        let mut dir = 0.0f32;
        if input.left {
            if !facing.left {
                facing.left = true;
                machine.transition_to("idleturn");
            }
            if control.movement_start_timer.has_reached_interval(&clock) {
                dir = -1.0;
            }
        } else if input.right {
            if facing.left {
                facing.left = false;
                machine.transition_to("idleturn");
            }
            if control.movement_start_timer.has_reached_interval(&clock) {
                dir = 1.0;
            }
        } else {
            control.movement_start_timer.reset_to_now(&clock);
        }
        vel.x = dir * config.move_speed;

        if input.heal && control.heal.apply(&mut stats, &clock) {
            machine.transition_to("skillcast");
            bus.emit("skill", json!({ "name": "heal" }), Some(actor.0));
        }

        if input.jump && contacts.down && matches!(machine.current(), "idle" | "run" | "jump") {
            vel.y = config.jump_velocity;
        }

        if input.attack
            && !machine.is("hit")
            && !control.is_attacking
            && control.attack_timer.has_reached_interval(&clock)
        {
            machine.transition_to("attack");
            control.is_attacking = true;
        }

        if control.is_attacking {
            vel.x = 0.0;
        }
    }
}

/// Dash burst: fixed direction, vertical velocity pinned, ends at 15% of
/// the dash timer or on wall contact in the travel direction.
fn manage_dash(
    clock: &GameClock,
    config: &GameConfig,
    vel: &mut Velocity,
    facing: &Facing,
    contacts: &ContactSides,
    control: &mut PlayerControl,
) {
    if !control.is_dashing {
        return;
    }
    let dir = if facing.left { -1.0 } else { 1.0 };
    vel.x = config.dash_speed * dir;
    vel.y = 0.0;

    let into_wall = (contacts.left && facing.left) || (contacts.right && !facing.left);
    if control.dash_timer.has_reached(clock, DASH_DURATION_RATIO) || into_wall {
        control.is_dashing = false;
        vel.x = 0.0;
    }
}

pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(FixedUpdate, apply_player_input.in_set(SimStep::Input));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Archetype;
    use crate::test_support::{flat_floor_map, spawn_player_at, step, world_with};

    #[test]
    fn attack_hitbox_extends_in_the_facing_direction() {
        let pos = GamePosition::new(100.0, 50.0);
        let body = Body::new(Vec2::new(40.0, 56.0), Vec2::new(6.0, 4.0));
        let size = Vec2::new(64.0, 86.0);

        let right = attack_hitbox(&pos, &body, &Facing { left: false }, size, true);
        assert_eq!(right.min.x, 100.0);
        assert_eq!(right.max.x, 164.0);

        let left = attack_hitbox(&pos, &body, &Facing { left: true }, size, true);
        assert_eq!(left.max.x, 100.0);
        assert_eq!(left.min.x, 36.0);

        let passive = attack_hitbox(&pos, &body, &Facing { left: false }, size, false);
        assert_eq!(passive, body.hitbox(&pos));
    }

    #[test]
    fn player_state_set_starts_idle() {
        let machine = Machine::new(player_states());
        assert_eq!(machine.current(), "idle");
    }

    #[test]
    fn held_direction_moves_the_player_into_run() {
        let mut world = world_with(flat_floor_map());
        let player = spawn_player_at(&mut world, Vec2::new(100.0, 28.0));

        // Settle onto the floor first.
        for _ in 0..10 {
            step(&mut world);
        }
        world.resource_mut::<PlayerInput>().right = true;

        // The movement-start delay holds walking back for 200 ms.
        step(&mut world);
        assert_eq!(world.get::<Machine>(player).unwrap().current(), "idle");

        for _ in 0..30 {
            step(&mut world);
        }
        assert_eq!(world.get::<Machine>(player).unwrap().current(), "run");
        assert!(world.get::<GamePosition>(player).unwrap().x > 100.0);
    }

    #[test]
    fn jump_rises_then_falls_back_to_idle() {
        let mut world = world_with(flat_floor_map());
        let player = spawn_player_at(&mut world, Vec2::new(100.0, 28.0));
        for _ in 0..10 {
            step(&mut world);
        }

        world.resource_mut::<PlayerInput>().jump = true;
        step(&mut world);
        step(&mut world);
        world.resource_mut::<PlayerInput>().jump = false;
        assert_eq!(world.get::<Machine>(player).unwrap().current(), "jump");

        let mut saw_fall = false;
        for _ in 0..240 {
            step(&mut world);
            if world.get::<Machine>(player).unwrap().is("fall") {
                saw_fall = true;
            }
        }
        assert!(saw_fall);
        assert_eq!(world.get::<Machine>(player).unwrap().current(), "idle");
    }

    #[test]
    fn attack_locks_horizontal_velocity_until_the_swing_ends() {
        let mut world = world_with(flat_floor_map());
        let player = spawn_player_at(&mut world, Vec2::new(100.0, 28.0));
        for _ in 0..30 {
            step(&mut world);
        }

        {
            let mut input = world.resource_mut::<PlayerInput>();
            input.right = true;
            input.attack = true;
        }
        step(&mut world);
        assert_eq!(world.get::<Machine>(player).unwrap().current(), "attack");
        assert!(world.get::<PlayerControl>(player).unwrap().is_attacking);
        assert_eq!(world.get::<Velocity>(player).unwrap().x, 0.0);

        // 7 frames at 15 fps is ~470 ms; a second clears the swing.
        world.resource_mut::<PlayerInput>().attack = false;
        world.resource_mut::<PlayerInput>().right = false;
        for _ in 0..60 {
            step(&mut world);
        }
        assert!(!world.get::<PlayerControl>(player).unwrap().is_attacking);
        assert_eq!(world.get::<Machine>(player).unwrap().current(), "idle");
    }

    #[test]
    fn dash_burns_mana_and_ends_after_its_window() {
        let mut world = world_with(flat_floor_map());
        let player = spawn_player_at(&mut world, Vec2::new(100.0, 28.0));
        for _ in 0..10 {
            step(&mut world);
        }

        world.resource_mut::<PlayerInput>().dash = true;
        step(&mut world);
        world.resource_mut::<PlayerInput>().dash = false;

        let control = world.get::<PlayerControl>(player).unwrap().clone();
        assert!(control.is_dashing);
        let stats = world.get::<Stats>(player).unwrap().clone();
        assert!(stats.get(Stat::Mana) < 0.8);

        // 15% of the 2 s dash timer is 300 ms.
        for _ in 0..30 {
            step(&mut world);
        }
        assert!(!world.get::<PlayerControl>(player).unwrap().is_dashing);
        assert!(world.get::<GamePosition>(player).unwrap().x > 400.0);
    }

    #[test]
    fn falling_against_a_wall_enters_wallslide() {
        let mut map = flat_floor_map();
        for y in 0..12 {
            map.insert_tile(1, (6, y), false);
        }
        let mut world = world_with(map);
        // Hitbox half-width is 14, so x = 82 sits flush against the wall
        // face at x = 96.
        let player = spawn_player_at(&mut world, Vec2::new(82.0, 150.0));

        let mut slid = false;
        for _ in 0..40 {
            step(&mut world);
            if world.get::<Machine>(player).unwrap().is("wallslide") {
                slid = true;
                // Wall friction caps the slide speed.
                let vel = *world.get::<Velocity>(player).unwrap();
                assert!(vel.y >= -181.0);
            }
        }
        assert!(slid);
    }

    #[test]
    fn heal_enters_skillcast_and_restores_health() {
        let mut world = world_with(flat_floor_map());
        let player = spawn_player_at(&mut world, Vec2::new(100.0, 28.0));
        for _ in 0..10 {
            step(&mut world);
        }
        world
            .get_mut::<Stats>(player)
            .unwrap()
            .set(Stat::Health, 0.4);

        world.resource_mut::<PlayerInput>().heal = true;
        step(&mut world);
        world.resource_mut::<PlayerInput>().heal = false;

        assert_eq!(world.get::<Machine>(player).unwrap().current(), "skillcast");
        let stats = world.get::<Stats>(player).unwrap().clone();
        assert!((stats.get(Stat::Health) - 0.5).abs() < 1e-4);
        assert!((stats.get(Stat::Shield) - 0.05).abs() < 1e-4);
        assert_eq!(
            *world.get::<Archetype>(player).unwrap(),
            Archetype::Player
        );
    }
}
