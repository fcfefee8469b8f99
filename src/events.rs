use std::collections::VecDeque;

use bevy::prelude::*;
use serde::Serialize;

const MAX_EVENTS: usize = 256;

/// A simulation event: state transitions, damage, deaths, skill uses.
/// Consumers (UI, scripting, telemetry) drain `recent` at their own pace.
#[derive(Serialize, Clone)]
pub struct GameEvent {
    pub name: String,
    pub data: serde_json::Value,
    pub frame: u64,
    pub actor: Option<u64>,
}

#[derive(Resource, Default)]
pub struct GameEventBus {
    pub recent: VecDeque<GameEvent>,
    pub frame: u64,
    pub dropped: u64,
}

impl GameEventBus {
    pub fn emit(&mut self, name: impl Into<String>, data: serde_json::Value, actor: Option<u64>) {
        self.recent.push_back(GameEvent {
            name: name.into(),
            data,
            frame: self.frame,
            actor,
        });
        if self.recent.len() > MAX_EVENTS {
            let excess = self.recent.len() - MAX_EVENTS;
            for _ in 0..excess {
                self.recent.pop_front();
            }
            self.dropped = self.dropped.saturating_add(excess as u64);
        }
    }
}

pub struct GameEventsPlugin;

impl Plugin for GameEventsPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(GameEventBus::default())
            .add_systems(FixedPreUpdate, tick_event_frame);
    }
}

fn tick_event_frame(mut bus: ResMut<GameEventBus>) {
    bus.frame = bus.frame.saturating_add(1);
}
