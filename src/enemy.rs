use std::sync::Arc;

use bevy::prelude::*;
use serde_json::json;

use crate::components::{Body, Stat, Stats};
use crate::fsm::{attack_phase, AttackPhase, AttackWindow, BehaviorState, StateCtx, StateSet};
use crate::physics::rects_overlap;
use crate::timer::IntervalTimer;

/// Health at or below this routes an enemy's FSM into `death`.
pub const DEATH_THRESHOLD: f32 = 0.01;

/// What the combatant knows about its target this frame, refreshed by the
/// targeting system. Absence of a target is a normal condition and routes
/// behavior back toward idle/fly.
#[derive(Clone, Copy, Debug)]
pub struct TargetSnapshot {
    pub pos: Vec2,
    pub hitbox: Rect,
    /// The target's own hit-timer has not elapsed yet.
    pub invulnerable: bool,
}

#[derive(Clone, Copy, Debug)]
pub enum ChaseRule {
    /// Pursue within a straight-line radius (flyers).
    Radial,
    /// Pursue along x while the target sits within a vertical band.
    HorizontalBand,
}

#[derive(Clone, Copy, Debug)]
pub enum AttackRule {
    /// Strike within a straight-line radius.
    Radial,
    /// Strike when the body rectangle overlaps the target's hitbox.
    MeleeOverlap,
    /// Strike anywhere within a horizontal reach (ranged attackers).
    Horizontal { max_x: f32, max_y: f32 },
}

/// Queued fireball spawn, drained by the projectile system. States never
/// touch `Commands` directly.
#[derive(Clone, Copy, Debug)]
pub struct FireRequest {
    pub pos: Vec2,
    pub velocity: Vec2,
}

/// Enemy capability block: target knowledge, combat timers, and engagement
/// radii, selected at construction instead of by inheritance.
#[derive(Component, Clone)]
pub struct Combatant {
    pub target_entity: Option<Entity>,
    pub target: Option<TargetSnapshot>,
    pub hit_timer: IntervalTimer,
    pub attack_timer: IntervalTimer,
    pub chase_radius: f32,
    pub attack_radius: f32,
    pub chase_rule: ChaseRule,
    pub attack_rule: AttackRule,
    /// Default perch position flyers return to.
    pub home: Vec2,
    pub fired_this_attack: bool,
    pub fire_request: Option<FireRequest>,
}

impl Combatant {
    pub fn can_chase(&self, pos: Vec2, body: &Body) -> bool {
        let Some(target) = self.target else {
            return false;
        };
        match self.chase_rule {
            ChaseRule::Radial => pos.distance(target.pos) <= self.chase_radius,
            ChaseRule::HorizontalBand => {
                (target.pos.y - pos.y).abs() <= body.size.y
                    && (target.pos.x - pos.x).abs() <= self.chase_radius
            }
        }
    }

    pub fn can_attack(&self, pos: Vec2, rect: Rect) -> bool {
        let Some(target) = self.target else {
            return false;
        };
        match self.attack_rule {
            AttackRule::Radial => pos.distance(target.pos) <= self.attack_radius,
            AttackRule::MeleeOverlap => rects_overlap(&rect, &target.hitbox),
            AttackRule::Horizontal { max_x, max_y } => {
                (target.pos.x - pos.x).abs() <= max_x && (target.pos.y - pos.y).abs() <= max_y
            }
        }
    }

    pub fn target_invulnerable(&self) -> bool {
        self.target.is_some_and(|t| t.invulnerable)
    }
}

pub fn enemy_stats() -> Stats {
    Stats::default().with(Stat::Health, 1.0).with(Stat::Damage, 0.1)
}

struct GroundIdle;

impl BehaviorState for GroundIdle {
    fn name(&self) -> &'static str {
        "idle"
    }

    fn enter(&self, ctx: &mut StateCtx) {
        ctx.vel.x = 0.0;
        ctx.vel.y = 0.0;
    }

    fn next(&self, ctx: &StateCtx) -> Option<&'static str> {
        let combat = ctx.combat.as_deref()?;
        if combat.target.is_some()
            && combat.can_chase(ctx.position(), ctx.body)
            && !combat.target_invulnerable()
        {
            return Some("run");
        }
        None
    }
}

struct GroundRun;

impl BehaviorState for GroundRun {
    fn name(&self) -> &'static str {
        "run"
    }

    fn update(&self, ctx: &mut StateCtx) {
        let pos = ctx.position();
        let speed = ctx.config.enemy_speed;
        let Some(combat) = ctx.combat.as_deref() else {
            return;
        };
        let Some(target) = combat.target else {
            return;
        };
        let dx = target.pos.x - pos.x;
        ctx.vel.x = dx.signum() * speed;
        ctx.facing.left = dx < 0.0;
    }

    fn next(&self, ctx: &StateCtx) -> Option<&'static str> {
        let combat = ctx.combat.as_deref()?;
        if combat.target.is_none() || combat.target_invulnerable() {
            return Some("idle");
        }
        if combat.can_attack(ctx.position(), ctx.body_rect())
            && combat.attack_timer.has_reached_interval(ctx.clock)
        {
            return Some("attack");
        }
        if !combat.can_chase(ctx.position(), ctx.body) {
            return Some("idle");
        }
        None
    }

    fn exit(&self, ctx: &mut StateCtx) {
        ctx.vel.x = 0.0;
    }
}

struct GroundAttack {
    window: AttackWindow,
}

impl BehaviorState for GroundAttack {
    fn name(&self) -> &'static str {
        "attack"
    }

    fn attack_window(&self) -> Option<AttackWindow> {
        Some(self.window)
    }

    fn enter(&self, ctx: &mut StateCtx) {
        ctx.vel.x = 0.0;
        ctx.vel.y = 0.0;
        let clock = *ctx.clock;
        if let Some(combat) = ctx.combat.as_deref_mut() {
            combat.attack_timer.reset_to_now(&clock);
        }
    }

    fn next(&self, ctx: &StateCtx) -> Option<&'static str> {
        let combat = ctx.combat.as_deref()?;
        if combat.target.is_none() {
            return Some("idle");
        }
        if ctx.animation_finished() {
            return Some("idle");
        }
        None
    }
}

/// Ranged attack: holds position and spawns one fireball when the animation
/// reaches its active window.
struct WormAttack {
    window: AttackWindow,
}

impl BehaviorState for WormAttack {
    fn name(&self) -> &'static str {
        "attack"
    }

    fn attack_window(&self) -> Option<AttackWindow> {
        Some(self.window)
    }

    fn enter(&self, ctx: &mut StateCtx) {
        ctx.vel.x = 0.0;
        ctx.vel.y = 0.0;
        let clock = *ctx.clock;
        if let Some(combat) = ctx.combat.as_deref_mut() {
            combat.attack_timer.reset_to_now(&clock);
            combat.fired_this_attack = false;
        }
    }

    fn update(&self, ctx: &mut StateCtx) {
        if attack_phase(self.window, ctx.anim.frame) != AttackPhase::Active {
            return;
        }
        let hitbox = ctx.hitbox();
        let muzzle = if ctx.facing.left {
            Vec2::new(hitbox.min.x, hitbox.center().y)
        } else {
            Vec2::new(hitbox.max.x, hitbox.center().y)
        };
        let speed = ctx.config.projectile_speed;
        let velocity = Vec2::new(if ctx.facing.left { -speed } else { speed }, 0.0);

        if let Some(combat) = ctx.combat.as_deref_mut() {
            if !combat.fired_this_attack {
                combat.fired_this_attack = true;
                combat.fire_request = Some(FireRequest {
                    pos: muzzle,
                    velocity,
                });
            }
        }
    }

    fn next(&self, ctx: &StateCtx) -> Option<&'static str> {
        let combat = ctx.combat.as_deref()?;
        if combat.target.is_none() {
            return Some("idle");
        }
        if ctx.animation_finished() {
            return Some("idle");
        }
        None
    }
}

struct GroundHit;

impl BehaviorState for GroundHit {
    fn name(&self) -> &'static str {
        "hit"
    }

    fn enter(&self, ctx: &mut StateCtx) {
        ctx.vel.x = 0.0;
        let clock = *ctx.clock;
        if let Some(combat) = ctx.combat.as_deref_mut() {
            combat.hit_timer.reset_to_now(&clock);
        }
    }

    fn next(&self, ctx: &StateCtx) -> Option<&'static str> {
        if ctx.stats.get(Stat::Health) <= DEATH_THRESHOLD {
            return Some("death");
        }
        let combat = ctx.combat.as_deref()?;
        if combat.target.is_none() {
            return Some("idle");
        }
        if !ctx.animation_finished() {
            return None;
        }
        Some("idle")
    }
}

/// Terminal state. Flips the live flag once the death animation completes;
/// the registry culls the entity on the next frame.
struct EnemyDeath;

impl BehaviorState for EnemyDeath {
    fn name(&self) -> &'static str {
        "death"
    }

    fn enter(&self, ctx: &mut StateCtx) {
        ctx.vel.x = 0.0;
        ctx.vel.y = 0.0;
        let actor = ctx.actor.0;
        let archetype = ctx.archetype.key();
        ctx.bus
            .emit("death", json!({ "archetype": archetype }), Some(actor));
    }

    fn update(&self, ctx: &mut StateCtx) {
        if ctx.animation_finished() {
            ctx.alive.0 = false;
        }
    }

    fn next(&self, _ctx: &StateCtx) -> Option<&'static str> {
        None
    }
}

struct Fly;

impl BehaviorState for Fly {
    fn name(&self) -> &'static str {
        "fly"
    }

    fn update(&self, ctx: &mut StateCtx) {
        let pos = ctx.position();
        let speed = ctx.config.enemy_speed;
        let Some(combat) = ctx.combat.as_deref() else {
            return;
        };
        if !combat.attack_timer.has_reached_interval(ctx.clock) {
            ctx.vel.x = 0.0;
            ctx.vel.y = 0.0;
            return;
        }
        let delta = combat.home - pos;
        let distance = delta.length();
        if distance < 0.5 {
            ctx.vel.x = 0.0;
            ctx.vel.y = 0.0;
            return;
        }
        let dir = delta / distance;
        let velocity = dir * speed.min(distance);
        ctx.vel.x = velocity.x;
        ctx.vel.y = velocity.y;
        ctx.facing.left = dir.x < 0.0;
    }

    fn next(&self, ctx: &StateCtx) -> Option<&'static str> {
        let combat = ctx.combat.as_deref()?;
        let target = combat.target?;
        if ctx.position().distance(target.pos) <= combat.chase_radius {
            return Some("chase");
        }
        None
    }
}

struct Chase;

impl BehaviorState for Chase {
    fn name(&self) -> &'static str {
        "chase"
    }

    fn update(&self, ctx: &mut StateCtx) {
        let pos = ctx.position();
        let speed = ctx.config.enemy_speed;
        let half_width = ctx.body.size.x / 2.0;
        let Some(combat) = ctx.combat.as_deref() else {
            return;
        };
        let Some(target) = combat.target else {
            return;
        };
        // A recovering target can't be re-engaged: hold position.
        if !combat.attack_timer.has_reached_interval(ctx.clock) || target.invulnerable {
            ctx.vel.x = 0.0;
            ctx.vel.y = 0.0;
            return;
        }
        let dir = (target.pos - pos).normalize_or_zero();
        ctx.vel.x = dir.x * speed;
        ctx.vel.y = dir.y * speed;
        if pos.distance(target.pos) > half_width {
            ctx.facing.left = ctx.vel.x < 0.0;
        }
    }

    fn next(&self, ctx: &StateCtx) -> Option<&'static str> {
        let combat = ctx.combat.as_deref()?;
        let Some(target) = combat.target else {
            return Some("fly");
        };
        if target.invulnerable {
            return None;
        }
        let distance = ctx.position().distance(target.pos);
        if distance > combat.chase_radius {
            return Some("fly");
        }
        if distance <= combat.attack_radius && combat.attack_timer.has_reached_interval(ctx.clock)
        {
            return Some("attack");
        }
        None
    }
}

struct BatAttack {
    window: AttackWindow,
}

impl BehaviorState for BatAttack {
    fn name(&self) -> &'static str {
        "attack"
    }

    fn attack_window(&self) -> Option<AttackWindow> {
        Some(self.window)
    }

    fn enter(&self, ctx: &mut StateCtx) {
        ctx.vel.x = 0.0;
        ctx.vel.y = 0.0;
        let clock = *ctx.clock;
        if let Some(combat) = ctx.combat.as_deref_mut() {
            combat.attack_timer.reset_to_now(&clock);
        }
    }

    fn update(&self, ctx: &mut StateCtx) {
        let pos_x = ctx.pos.x;
        if let Some(target) = ctx.combat.as_deref().and_then(|c| c.target) {
            ctx.facing.left = target.pos.x < pos_x;
        }
    }

    fn next(&self, ctx: &StateCtx) -> Option<&'static str> {
        if !ctx.animation_finished() {
            return None;
        }
        let combat = ctx.combat.as_deref()?;
        let Some(target) = combat.target else {
            return Some("fly");
        };
        if ctx.position().distance(target.pos) > combat.chase_radius {
            return Some("fly");
        }
        Some("chase")
    }

    fn exit(&self, ctx: &mut StateCtx) {
        ctx.vel.x = 0.0;
        ctx.vel.y = 0.0;
    }
}

struct BatHit;

impl BehaviorState for BatHit {
    fn name(&self) -> &'static str {
        "hit"
    }

    fn enter(&self, ctx: &mut StateCtx) {
        ctx.vel.x = 0.0;
        ctx.vel.y = 0.0;
        let clock = *ctx.clock;
        if let Some(combat) = ctx.combat.as_deref_mut() {
            combat.hit_timer.reset_to_now(&clock);
        }
    }

    fn next(&self, ctx: &StateCtx) -> Option<&'static str> {
        if ctx.stats.get(Stat::Health) <= DEATH_THRESHOLD {
            return Some("death");
        }
        let combat = ctx.combat.as_deref()?;
        if combat.hit_timer.has_reached_interval(ctx.clock) {
            return Some("fly");
        }
        None
    }
}

pub fn bat_states() -> Arc<StateSet> {
    StateSet::new(
        "bat",
        vec![
            Arc::new(Fly),
            Arc::new(Chase),
            Arc::new(BatAttack {
                window: AttackWindow::new(7, 3),
            }),
            Arc::new(BatHit),
            Arc::new(EnemyDeath),
        ],
    )
}

pub fn mushroom_states() -> Arc<StateSet> {
    StateSet::new(
        "mushroom",
        vec![
            Arc::new(GroundIdle),
            Arc::new(GroundRun),
            Arc::new(GroundAttack {
                window: AttackWindow::new(6, 2),
            }),
            Arc::new(GroundHit),
            Arc::new(EnemyDeath),
        ],
    )
}

pub fn fireworm_states() -> Arc<StateSet> {
    StateSet::new(
        "fireworm",
        vec![
            Arc::new(GroundIdle),
            Arc::new(GroundRun),
            Arc::new(WormAttack {
                window: AttackWindow::new(8, 4),
            }),
            Arc::new(GroundHit),
            Arc::new(EnemyDeath),
        ],
    )
}
