use bevy::prelude::*;
use serde_json::json;

use crate::animation::AnimationController;
use crate::components::{Body, Facing, GameConfig, GamePosition, SimStep, Stat, Stats, Velocity};
use crate::enemy::Combatant;
use crate::events::GameEventBus;
use crate::fsm::{attack_phase, AttackPhase, Machine};
use crate::physics::rects_overlap;
use crate::player::{attack_hitbox, PlayerControl};
use crate::projectile::Projectile;
use crate::registry::ActorId;
use crate::timer::GameClock;

type PlayerCombatItem<'a> = (
    &'a ActorId,
    &'a GamePosition,
    &'a Body,
    &'a Facing,
    &'a mut Machine,
    &'a mut Stats,
    &'a mut Velocity,
    &'a mut PlayerControl,
);

type EnemyCombatItem<'a> = (
    &'a ActorId,
    &'a GamePosition,
    &'a Body,
    &'a mut Machine,
    &'a mut Stats,
    &'a mut Velocity,
    &'a mut Combatant,
    &'a AnimationController,
);

/// One-frame shove away from the attacker. The defender's hit state takes
/// over on the next drive pass.
fn apply_knockback(from: &GamePosition, to: &GamePosition, speed: f32, vel: &mut Velocity) {
    let dir = (to.vec() - from.vec()).normalize_or_zero();
    vel.x = dir.x * speed;
    vel.y = dir.y * speed;
}

/// Hit arbitration between the player and each enemy. At most one branch
/// fires per pair per frame, and the player's branch is checked first, so a
/// perfectly coincident exchange favors the player.
pub fn resolve_melee_combat(
    clock: Res<GameClock>,
    config: Res<GameConfig>,
    mut bus: ResMut<GameEventBus>,
    mut players: Query<PlayerCombatItem<'_>, Without<Combatant>>,
    mut enemies: Query<EnemyCombatItem<'_>, Without<PlayerControl>>,
) {
    for (p_id, p_pos, p_body, p_facing, mut p_machine, mut p_stats, mut p_vel, mut control) in
        players.iter_mut()
    {
        for (e_id, e_pos, e_body, mut e_machine, mut e_stats, mut e_vel, mut combatant, e_anim) in
            enemies.iter_mut()
        {
            let player_attacking = control.is_attacking || p_machine.is("attack");
            let enemy_attacking = e_machine.is("attack");
            if !player_attacking && !enemy_attacking {
                continue;
            }
            if e_machine.is("death") {
                continue;
            }

            let swing = attack_hitbox(p_pos, p_body, p_facing, control.attack_size, player_attacking);

            if player_attacking
                && !e_machine.is("hit")
                && combatant.hit_timer.has_reached_interval(&clock)
                && rects_overlap(&swing, &e_body.hitbox(e_pos))
            {
                let mut damage = p_stats.get(Stat::Damage);
                if control.is_dashing {
                    damage += control.dash.effect(Stat::Damage);
                }
                e_stats.take_damage(damage);
                combatant.hit_timer.reset_to_now(&clock);
                e_machine.transition_to("hit");
                apply_knockback(p_pos, e_pos, config.knockback_speed, &mut e_vel);
                bus.emit(
                    "damage",
                    json!({ "amount": damage, "attacker": p_id.0, "defender": e_id.0 }),
                    Some(e_id.0),
                );
            } else if enemy_attacking
                && control.hit_timer.has_reached_interval(&clock)
                && !control.is_dashing
            {
                let Some(window) = e_machine.state().attack_window() else {
                    continue;
                };
                if attack_phase(window, e_anim.frame) != AttackPhase::Active {
                    continue;
                }
                if !rects_overlap(&e_body.rect(e_pos), &p_body.hitbox(p_pos)) {
                    continue;
                }

                let damage = e_stats.get(Stat::Damage);
                p_stats.take_damage(damage);
                control.hit_timer.reset_to_now(&clock);
                p_machine.transition_to("hit");
                apply_knockback(e_pos, p_pos, config.knockback_speed, &mut p_vel);
                bus.emit(
                    "damage",
                    json!({ "amount": damage, "attacker": e_id.0, "defender": p_id.0 }),
                    Some(p_id.0),
                );
            }
        }
    }
}

/// Projectile vs player. A connecting projectile detonates in place; an
/// immune target (recent hit or dash) lets it fly on.
pub fn resolve_projectile_hits(
    clock: Res<GameClock>,
    mut bus: ResMut<GameEventBus>,
    mut projectiles: Query<(
        &ActorId,
        &GamePosition,
        &Body,
        &mut Velocity,
        &mut Projectile,
        &mut AnimationController,
    )>,
    mut players: Query<
        (
            &ActorId,
            &GamePosition,
            &Body,
            &mut Machine,
            &mut Stats,
            &mut PlayerControl,
        ),
        Without<Projectile>,
    >,
) {
    for (pr_id, pr_pos, pr_body, mut pr_vel, mut projectile, mut pr_anim) in
        projectiles.iter_mut()
    {
        if projectile.ready_to_kill {
            continue;
        }
        for (p_id, p_pos, p_body, mut p_machine, mut p_stats, mut control) in players.iter_mut() {
            if !rects_overlap(&pr_body.hitbox(pr_pos), &p_body.hitbox(p_pos)) {
                continue;
            }
            if !control.hit_timer.has_reached_interval(&clock) || control.is_dashing {
                continue;
            }

            projectile.mark_ready_to_kill(&mut pr_vel, &mut pr_anim);
            p_stats.take_damage(projectile.damage);
            control.hit_timer.reset_to_now(&clock);
            p_machine.transition_to("hit");
            bus.emit(
                "damage",
                json!({ "amount": projectile.damage, "attacker": pr_id.0, "defender": p_id.0 }),
                Some(p_id.0),
            );
            break;
        }
    }
}

pub struct CombatPlugin;

impl Plugin for CombatPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            FixedPostUpdate,
            (resolve_melee_combat, resolve_projectile_hits)
                .chain()
                .in_set(SimStep::Combat),
        );
    }
}
