use bevy::prelude::*;

use crate::components::{Alive, Body, GamePosition};
use crate::enemy::{Combatant, TargetSnapshot};
use crate::player::PlayerControl;
use crate::timer::GameClock;

pub struct AiPlugin;

impl Plugin for AiPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            FixedPreUpdate,
            refresh_targets.after(crate::timer::tick_clock),
        );
    }
}

/// Refresh every combatant's view of its target. A missing or dead target
/// clears the snapshot, which routes enemy behavior back toward idle/fly —
/// a normal condition, never an error.
pub fn refresh_targets(
    clock: Res<GameClock>,
    targets: Query<(&GamePosition, &Body, &PlayerControl, &Alive)>,
    mut combatants: Query<&mut Combatant>,
) {
    for mut combatant in combatants.iter_mut() {
        combatant.target = combatant.target_entity.and_then(|entity| {
            let (pos, body, control, alive) = targets.get(entity).ok()?;
            if !alive.0 {
                return None;
            }
            Some(TargetSnapshot {
                pos: pos.vec(),
                hitbox: body.hitbox(pos),
                invulnerable: !control.hit_timer.has_reached_interval(&clock),
            })
        });
    }
}
