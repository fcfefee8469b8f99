use crate::components::{Stat, Stats};
use crate::timer::{GameClock, IntervalTimer};

/// A combat ability: stat costs, stat effects, and a cooldown. The cooldown
/// starts stale so a fresh skill is usable immediately.
#[derive(Clone, Debug)]
pub struct Skill {
    costs: Vec<(Stat, f32)>,
    effects: Vec<(Stat, f32)>,
    cooldown: IntervalTimer,
}

impl Skill {
    pub fn new(costs: Vec<(Stat, f32)>, effects: Vec<(Stat, f32)>, cooldown_ms: f64) -> Self {
        Self {
            costs,
            effects,
            cooldown: IntervalTimer::stale(cooldown_ms),
        }
    }

    pub fn can_use(&self, stats: &Stats, clock: &GameClock) -> bool {
        let affordable = self
            .costs
            .iter()
            .all(|(stat, cost)| stats.can_afford(*stat, *cost));
        affordable && self.cooldown.has_reached_interval(clock)
    }

    /// Deduct costs, apply effects, and reset the cooldown — all or nothing.
    /// Returns false without touching anything when `can_use` fails.
    pub fn apply(&mut self, stats: &mut Stats, clock: &GameClock) -> bool {
        if !self.can_use(stats, clock) {
            return false;
        }
        for (stat, cost) in &self.costs {
            stats.modify(*stat, -cost);
        }
        for (stat, delta) in &self.effects {
            stats.modify(*stat, *delta);
        }
        self.cooldown.reset_to_now(clock);
        true
    }

    /// Effect delta for one stat, or zero if the skill does not touch it.
    pub fn effect(&self, stat: Stat) -> f32 {
        self.effects
            .iter()
            .find(|(s, _)| *s == stat)
            .map_or(0.0, |(_, delta)| *delta)
    }

    pub fn cooldown(&self) -> &IntervalTimer {
        &self.cooldown
    }
}
