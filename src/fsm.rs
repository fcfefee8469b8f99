use std::collections::HashMap;
use std::sync::Arc;

use bevy::prelude::*;
use serde_json::json;

use crate::animation::AnimationController;
use crate::components::{
    Alive, Archetype, Body, ContactSides, Facing, GameConfig, GamePosition, SimStep, Stats,
    Velocity,
};
use crate::enemy::Combatant;
use crate::events::GameEventBus;
use crate::player::PlayerControl;
use crate::registry::ActorId;
use crate::timer::GameClock;

/// Frame markers of an attack animation's damaging slice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttackWindow {
    pub startup_frame: usize,
    pub active_frame: usize,
}

impl AttackWindow {
    pub fn new(startup_frame: usize, active_frame: usize) -> Self {
        Self {
            startup_frame,
            active_frame,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttackPhase {
    Startup,
    Active,
    Finish,
}

/// Classify an attack animation frame. A window with `startup_frame == 0`
/// is active for the whole animation.
pub fn attack_phase(window: AttackWindow, frame: usize) -> AttackPhase {
    if window.startup_frame == 0 {
        return AttackPhase::Active;
    }
    if frame < window.startup_frame {
        AttackPhase::Startup
    } else if frame < window.startup_frame + window.active_frame {
        AttackPhase::Active
    } else {
        AttackPhase::Finish
    }
}

/// Mutable view over one entity, handed to state hooks. All per-instance
/// data lives here; the states themselves stay shared and stateless.
pub struct StateCtx<'a> {
    pub actor: ActorId,
    pub archetype: Archetype,
    pub clock: &'a GameClock,
    pub config: &'a GameConfig,
    pub pos: &'a mut GamePosition,
    pub vel: &'a mut Velocity,
    pub facing: &'a mut Facing,
    pub body: &'a Body,
    pub contacts: &'a ContactSides,
    pub anim: &'a mut AnimationController,
    pub stats: &'a mut Stats,
    pub alive: &'a mut Alive,
    pub combat: Option<&'a mut Combatant>,
    pub player: Option<&'a mut PlayerControl>,
    pub bus: &'a mut GameEventBus,
}

impl StateCtx<'_> {
    pub fn grounded(&self) -> bool {
        self.contacts.down
    }

    pub fn position(&self) -> Vec2 {
        self.pos.vec()
    }

    pub fn body_rect(&self) -> Rect {
        Rect::from_center_size(self.pos.vec(), self.body.size)
    }

    pub fn hitbox(&self) -> Rect {
        Rect::from_center_size(self.pos.vec(), self.body.size - self.body.inset * 2.0)
    }

    pub fn animation_finished(&self) -> bool {
        self.anim.finished()
    }

    /// Wall-slide capability, present on the player only.
    pub fn can_slide(&self) -> bool {
        self.player.as_deref().is_some_and(|p| p.can_slide)
    }
}

/// One node of an archetype's state graph. Implementations hold
/// configuration only; everything mutable lives on the entity.
pub trait BehaviorState: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Present on attack states that can land melee hits.
    fn attack_window(&self) -> Option<AttackWindow> {
        None
    }

    fn enter(&self, _ctx: &mut StateCtx) {}

    fn exit(&self, _ctx: &mut StateCtx) {}

    fn update(&self, _ctx: &mut StateCtx) {}

    /// Name of the state to transition to, or `None` to stay. Returned
    /// names must exist in the owning set.
    fn next(&self, ctx: &StateCtx) -> Option<&'static str>;
}

/// Immutable state graph shared by every instance of an archetype.
pub struct StateSet {
    key: &'static str,
    states: HashMap<&'static str, Arc<dyn BehaviorState>>,
    initial: &'static str,
}

impl StateSet {
    /// Panics on an empty set: that is a wiring error, not a runtime
    /// condition.
    pub fn new(key: &'static str, states: Vec<Arc<dyn BehaviorState>>) -> Arc<Self> {
        assert!(!states.is_empty(), "state set '{key}' has no states");
        let initial = states
            .iter()
            .find(|s| s.name() == "idle")
            .map_or(states[0].name(), |s| s.name());
        let mut map = HashMap::new();
        for state in states {
            let previous = map.insert(state.name(), state);
            assert!(
                previous.is_none(),
                "state set '{key}' defines a state twice"
            );
        }
        Arc::new(Self {
            key,
            states: map,
            initial,
        })
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn initial(&self) -> &'static str {
        self.initial
    }

    pub fn contains(&self, name: &str) -> bool {
        self.states.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn BehaviorState>> {
        self.states.get(name)
    }
}

/// Per-entity state machine: a shared set plus the current state name.
///
/// External transitions are queued and applied at the next drive pass, so
/// enter/exit hooks always run with the full entity context in hand.
#[derive(Component, Clone)]
pub struct Machine {
    set: Arc<StateSet>,
    current: &'static str,
    pending: Option<&'static str>,
}

impl Machine {
    pub fn new(set: Arc<StateSet>) -> Self {
        let current = set.initial();
        Self {
            set,
            current,
            pending: None,
        }
    }

    pub fn current(&self) -> &'static str {
        self.current
    }

    pub fn is(&self, name: &str) -> bool {
        self.current == name
    }

    pub fn state(&self) -> Arc<dyn BehaviorState> {
        self.set
            .get(self.current)
            .unwrap_or_else(|| panic!("machine '{}' lost state '{}'", self.set.key(), self.current))
            .clone()
    }

    /// Queue a transition. Panics if `name` is not part of the set — a
    /// misspelled state name must never be silently ignored. Requesting the
    /// current state is a no-op.
    pub fn transition_to(&mut self, name: &'static str) {
        assert!(
            self.set.contains(name),
            "state '{name}' is not defined for '{}'",
            self.set.key()
        );
        if name != self.current {
            self.pending = Some(name);
        }
    }

    pub fn pending(&self) -> Option<&'static str> {
        self.pending
    }

    fn take_pending(&mut self) -> Option<&'static str> {
        self.pending.take()
    }
}

/// Apply one transition: exit hook, state swap with animation reset, enter
/// hook. Transitioning to the current state does nothing.
fn apply_transition(machine: &mut Machine, next: &'static str, ctx: &mut StateCtx) {
    if next == machine.current {
        return;
    }
    let target = machine
        .set
        .get(next)
        .unwrap_or_else(|| {
            panic!(
                "state '{next}' is not defined for '{}'",
                machine.set.key()
            )
        })
        .clone();
    let previous = machine.state();

    previous.exit(ctx);
    ctx.bus.emit(
        "state_exit",
        json!({ "archetype": ctx.archetype.key(), "state": previous.name(), "next": next }),
        Some(ctx.actor.0),
    );

    machine.current = next;
    ctx.anim.play(next);

    ctx.bus.emit(
        "state_enter",
        json!({ "archetype": ctx.archetype.key(), "state": next, "previous": previous.name() }),
        Some(ctx.actor.0),
    );
    target.enter(ctx);
}

pub type MachineQueryItem<'a> = (
    &'a ActorId,
    &'a Archetype,
    &'a mut Machine,
    &'a mut GamePosition,
    &'a mut Velocity,
    &'a mut Facing,
    &'a Body,
    &'a ContactSides,
    &'a mut AnimationController,
    &'a mut Stats,
    &'a mut Alive,
    Option<&'a mut Combatant>,
    Option<&'a mut PlayerControl>,
);

/// Per frame, for every machine: apply any queued transition, evaluate the
/// current state's `next`, transition if it fired, then update the (possibly
/// new) current state.
pub fn drive_state_machines(
    clock: Res<GameClock>,
    config: Res<GameConfig>,
    mut bus: ResMut<GameEventBus>,
    mut query: Query<MachineQueryItem<'_>>,
) {
    for (
        actor,
        archetype,
        mut machine,
        mut pos,
        mut vel,
        mut facing,
        body,
        contacts,
        mut anim,
        mut stats,
        mut alive,
        mut combat,
        mut player,
    ) in query.iter_mut()
    {
        let mut ctx = StateCtx {
            actor: *actor,
            archetype: *archetype,
            clock: &clock,
            config: &config,
            pos: &mut pos,
            vel: &mut vel,
            facing: &mut facing,
            body,
            contacts,
            anim: &mut anim,
            stats: &mut stats,
            alive: &mut alive,
            combat: combat.as_deref_mut(),
            player: player.as_deref_mut(),
            bus: &mut bus,
        };

        if let Some(requested) = machine.take_pending() {
            apply_transition(&mut machine, requested, &mut ctx);
        }
        if let Some(next) = machine.state().next(&ctx) {
            apply_transition(&mut machine, next, &mut ctx);
        }
        machine.state().update(&mut ctx);
    }
}

pub struct FsmPlugin;

impl Plugin for FsmPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            FixedUpdate,
            drive_state_machines.in_set(SimStep::Behavior),
        );
    }
}
