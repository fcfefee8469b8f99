use std::collections::HashMap;

use bevy::prelude::*;

use crate::components::SimStep;

/// One animation clip. `next` names a follow-up clip that starts when a
/// non-looping clip runs out (e.g. `fall` -> `fall_loop`).
#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct AnimationClipDef {
    pub frame_count: usize,
    pub fps: f32,
    #[serde(default = "default_true")]
    pub looping: bool,
    #[serde(default)]
    pub next: Option<String>,
}

fn default_true() -> bool {
    true
}

impl AnimationClipDef {
    fn new(frame_count: usize, fps: f32, looping: bool) -> Self {
        Self {
            frame_count,
            fps,
            looping,
            next: None,
        }
    }

    fn with_next(mut self, next: &str) -> Self {
        self.next = Some(next.to_string());
        self
    }

    pub fn duration_ms(&self) -> f64 {
        self.frame_count as f64 / self.fps.max(0.001) as f64 * 1000.0
    }
}

#[derive(Clone, serde::Serialize, serde::Deserialize, Default)]
pub struct AnimationGraphDef {
    pub states: HashMap<String, AnimationClipDef>,
}

/// Clip data per archetype key. The presentation layer replaces this with
/// frames loaded from real assets; the defaults keep headless runs honest.
#[derive(Resource, Clone, serde::Serialize, serde::Deserialize, Default)]
pub struct AnimationLibrary {
    pub graphs: HashMap<String, AnimationGraphDef>,
}

impl AnimationLibrary {
    pub fn clip(&self, graph: &str, state: &str) -> Option<&AnimationClipDef> {
        self.graphs.get(graph)?.states.get(state)
    }

    pub fn clip_duration_ms(&self, graph: &str, state: &str) -> f64 {
        self.clip(graph, state).map_or(0.0, |c| c.duration_ms())
    }
}

/// Playback cursor owned by each entity. Frame advancement is dt-scaled:
/// clips store speed in frames per second.
#[derive(Component, Clone, Debug)]
pub struct AnimationController {
    pub graph: String,
    pub state: String,
    pub frame: usize,
    pub timer: f32,
    pub speed: f32,
    pub playing: bool,
}

impl AnimationController {
    pub fn new(graph: &str, state: &str) -> Self {
        Self {
            graph: graph.to_string(),
            state: state.to_string(),
            frame: 0,
            timer: 0.0,
            speed: 1.0,
            playing: true,
        }
    }

    /// Switch to another clip, rewinding to frame zero.
    pub fn play(&mut self, state: &str) {
        if self.state != state {
            self.state = state.to_string();
        }
        self.frame = 0;
        self.timer = 0.0;
        self.playing = true;
    }

    /// True once a non-looping clip has run out. Looping clips never finish.
    pub fn finished(&self) -> bool {
        !self.playing
    }
}

pub struct AnimationPlugin;

impl Plugin for AnimationPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(default_library()).add_systems(
            FixedUpdate,
            advance_animation_frames.in_set(SimStep::Animate),
        );
    }
}

pub fn advance_animation_frames(
    time: Res<Time<Fixed>>,
    library: Res<AnimationLibrary>,
    mut query: Query<&mut AnimationController>,
) {
    let dt = time.delta_secs();
    for mut anim in query.iter_mut() {
        if !anim.playing {
            continue;
        }
        let Some(clip) = library.clip(&anim.graph, &anim.state) else {
            continue;
        };
        let frame_count = clip.frame_count.max(1);
        let fps = clip.fps.max(0.001) * anim.speed.max(0.0);
        if fps <= 0.001 {
            continue;
        }
        let looping = clip.looping;
        let next = clip.next.clone();

        anim.timer += dt;
        let frame_time = 1.0 / fps;
        while anim.timer >= frame_time {
            anim.timer -= frame_time;
            if looping {
                anim.frame = (anim.frame + 1) % frame_count;
            } else if anim.frame + 1 < frame_count {
                anim.frame += 1;
            } else {
                match next.as_deref() {
                    Some(follow) if library.clip(&anim.graph, follow).is_some() => {
                        let follow = follow.to_string();
                        anim.play(&follow);
                    }
                    _ => {
                        anim.playing = false;
                        anim.frame = frame_count - 1;
                    }
                }
                break;
            }
        }
    }
}

pub fn default_library() -> AnimationLibrary {
    let mut graphs = HashMap::new();

    graphs.insert(
        "player".to_string(),
        AnimationGraphDef {
            states: HashMap::from([
                ("idle".to_string(), AnimationClipDef::new(6, 8.0, true)),
                ("idleturn".to_string(), AnimationClipDef::new(4, 12.0, false)),
                ("run".to_string(), AnimationClipDef::new(8, 12.0, true)),
                ("jump".to_string(), AnimationClipDef::new(3, 10.0, false)),
                (
                    "fall".to_string(),
                    AnimationClipDef::new(3, 10.0, false).with_next("fall_loop"),
                ),
                ("fall_loop".to_string(), AnimationClipDef::new(2, 8.0, true)),
                ("wallslide".to_string(), AnimationClipDef::new(3, 8.0, true)),
                ("attack".to_string(), AnimationClipDef::new(7, 15.0, false)),
                ("hit".to_string(), AnimationClipDef::new(4, 10.0, false)),
                ("skillcast".to_string(), AnimationClipDef::new(6, 12.0, false)),
            ]),
        },
    );

    graphs.insert(
        "bat".to_string(),
        AnimationGraphDef {
            states: HashMap::from([
                ("fly".to_string(), AnimationClipDef::new(6, 10.0, true)),
                ("chase".to_string(), AnimationClipDef::new(6, 12.0, true)),
                ("attack".to_string(), AnimationClipDef::new(12, 12.0, false)),
                ("hit".to_string(), AnimationClipDef::new(4, 10.0, false)),
                ("death".to_string(), AnimationClipDef::new(7, 10.0, false)),
            ]),
        },
    );

    graphs.insert(
        "mushroom".to_string(),
        AnimationGraphDef {
            states: HashMap::from([
                ("idle".to_string(), AnimationClipDef::new(4, 8.0, true)),
                ("run".to_string(), AnimationClipDef::new(8, 12.0, true)),
                ("attack".to_string(), AnimationClipDef::new(10, 12.0, false)),
                ("hit".to_string(), AnimationClipDef::new(4, 10.0, false)),
                ("death".to_string(), AnimationClipDef::new(8, 10.0, false)),
            ]),
        },
    );

    graphs.insert(
        "fireworm".to_string(),
        AnimationGraphDef {
            states: HashMap::from([
                ("idle".to_string(), AnimationClipDef::new(9, 8.0, true)),
                ("run".to_string(), AnimationClipDef::new(9, 12.0, true)),
                ("attack".to_string(), AnimationClipDef::new(16, 12.0, false)),
                ("hit".to_string(), AnimationClipDef::new(3, 10.0, false)),
                ("death".to_string(), AnimationClipDef::new(8, 10.0, false)),
            ]),
        },
    );

    graphs.insert(
        "fire_projectile".to_string(),
        AnimationGraphDef {
            states: HashMap::from([
                ("flight".to_string(), AnimationClipDef::new(6, 12.0, true)),
                ("explosion".to_string(), AnimationClipDef::new(7, 14.0, false)),
            ]),
        },
    );

    AnimationLibrary { graphs }
}
