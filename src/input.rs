use bevy::prelude::*;

/// Pressed-key state consumed by the player systems. A keyboard system fills
/// it when a real input device is present; headless embedders and tests
/// write the fields directly.
#[derive(Resource, Default, Clone, Copy, Debug)]
pub struct PlayerInput {
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    pub attack: bool,
    pub dash: bool,
    pub heal: bool,
}

pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(PlayerInput::default())
            .add_systems(FixedPreUpdate, collect_keyboard_input);
    }
}

fn collect_keyboard_input(
    keyboard: Option<Res<ButtonInput<KeyCode>>>,
    mut input: ResMut<PlayerInput>,
) {
    let Some(keys) = keyboard else {
        return;
    };
    input.left = keys.pressed(KeyCode::ArrowLeft) || keys.pressed(KeyCode::KeyA);
    input.right = keys.pressed(KeyCode::ArrowRight) || keys.pressed(KeyCode::KeyD);
    input.jump = keys.pressed(KeyCode::ArrowUp) || keys.pressed(KeyCode::KeyW);
    input.attack = keys.pressed(KeyCode::KeyF) || keys.pressed(KeyCode::Enter);
    input.dash = keys.pressed(KeyCode::Space);
    input.heal = keys.pressed(KeyCode::KeyH);
}
