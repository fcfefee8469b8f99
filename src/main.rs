mod ai;
mod animation;
mod combat;
mod components;
mod enemy;
mod events;
mod fsm;
mod input;
mod physics;
mod player;
mod projectile;
mod registry;
mod skill;
mod spawn;
#[cfg(test)]
mod test_support;
mod tilemap;
mod timer;

use bevy::prelude::*;

use components::{GameConfig, SimStep};
use tilemap::Tilemap;

/// Tuning config from `game.json` (or `DUSKHOLLOW_CONFIG`). A missing file
/// falls back to defaults; a malformed one is reported and ignored.
fn load_game_config() -> GameConfig {
    let path = std::env::var("DUSKHOLLOW_CONFIG")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "game.json".to_string());
    match std::fs::read_to_string(&path) {
        Ok(contents) => match serde_json::from_str::<GameConfig>(&contents) {
            Ok(config) => {
                println!("[Duskhollow] Loaded config from {path}");
                config
            }
            Err(e) => {
                eprintln!("[Duskhollow] Failed to parse {path}: {e}");
                GameConfig::default()
            }
        },
        Err(_) => GameConfig::default(),
    }
}

/// Map from `DUSKHOLLOW_MAP`, or the built-in test level. A map that fails
/// to load is the one fatal startup condition.
fn load_tilemap() -> Tilemap {
    let Some(path) = std::env::var("DUSKHOLLOW_MAP")
        .ok()
        .filter(|s| !s.is_empty())
    else {
        return Tilemap::test_level();
    };
    match Tilemap::load(std::path::Path::new(&path)) {
        Ok(map) => {
            println!("[Duskhollow] Loaded map from {path}");
            map
        }
        Err(e) => {
            eprintln!("[Duskhollow] {e}");
            std::process::exit(1);
        }
    }
}

fn main() {
    let config = load_game_config();
    let map = load_tilemap();

    let mut app = App::new();
    app.add_plugins(MinimalPlugins);
    app.insert_resource(config)
        .insert_resource(map)
        .insert_resource(Time::<Fixed>::from_hz(60.0))
        .configure_sets(
            FixedUpdate,
            (
                SimStep::Input,
                SimStep::Physics,
                SimStep::Behavior,
                SimStep::Animate,
            )
                .chain(),
        )
        .configure_sets(FixedPostUpdate, (SimStep::Combat, SimStep::Cull).chain())
        .add_plugins(timer::ClockPlugin)
        .add_plugins(events::GameEventsPlugin)
        .add_plugins(input::InputPlugin)
        .add_plugins(registry::RegistryPlugin)
        .add_plugins(ai::AiPlugin)
        .add_plugins(animation::AnimationPlugin)
        .add_plugins(physics::PhysicsPlugin)
        .add_plugins(fsm::FsmPlugin)
        .add_plugins(player::PlayerPlugin)
        .add_plugins(projectile::ProjectilePlugin)
        .add_plugins(combat::CombatPlugin)
        .add_plugins(spawn::SpawnPlugin);

    app.run();
}
