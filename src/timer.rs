use bevy::prelude::*;

/// Accumulated fixed-step simulation time, in milliseconds.
///
/// Timers measure against this clock instead of the wall clock so headless
/// runs and tests stay deterministic.
#[derive(Resource, Default, Clone, Copy)]
pub struct GameClock {
    pub now_ms: f64,
}

impl GameClock {
    pub fn advance(&mut self, dt_secs: f32) {
        self.now_ms += dt_secs as f64 * 1000.0;
    }
}

pub struct ClockPlugin;

impl Plugin for ClockPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(GameClock::default())
            .add_systems(FixedPreUpdate, tick_clock);
    }
}

pub fn tick_clock(time: Res<Time<Fixed>>, mut clock: ResMut<GameClock>) {
    clock.advance(time.delta_secs());
}

/// Interval gate used for cooldowns and invulnerability windows.
#[derive(Clone, Copy, Debug)]
pub struct IntervalTimer {
    started_ms: f64,
    interval_ms: f64,
}

impl IntervalTimer {
    pub fn new(clock: &GameClock, interval_ms: f64) -> Self {
        Self {
            started_ms: clock.now_ms,
            interval_ms,
        }
    }

    /// Back-dated so the first `has_reached_interval` check already passes,
    /// even at clock zero.
    pub fn stale(interval_ms: f64) -> Self {
        Self {
            started_ms: -interval_ms,
            interval_ms,
        }
    }

    pub fn interval_ms(&self) -> f64 {
        self.interval_ms
    }

    pub fn has_reached_interval(&self, clock: &GameClock) -> bool {
        clock.now_ms - self.started_ms >= self.interval_ms
    }

    /// Sub-interval check: elapsed >= interval * ratio.
    ///
    /// Ratios outside [0, 1] are logged and read as "not yet reached".
    pub fn has_reached(&self, clock: &GameClock, ratio: f64) -> bool {
        if !(0.0..=1.0).contains(&ratio) {
            warn!("IntervalTimer::has_reached called with ratio {ratio} outside [0, 1]");
            return false;
        }
        clock.now_ms - self.started_ms >= self.interval_ms * ratio
    }

    pub fn reset_to_now(&mut self, clock: &GameClock) {
        self.started_ms = clock.now_ms;
    }
}
