// Keyboard to logical action mapping, sampled once per frame.
use bevy::prelude::*;

pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<Actions>()
            .add_systems(PreUpdate, gather_actions);
    }
}

const FORWARD: [KeyCode; 2] = [KeyCode::ArrowUp, KeyCode::KeyW];
const BACKWARD: [KeyCode; 2] = [KeyCode::ArrowDown, KeyCode::KeyS];
const LEFTWARD: [KeyCode; 2] = [KeyCode::ArrowLeft, KeyCode::KeyA];
const RIGHTWARD: [KeyCode; 2] = [KeyCode::ArrowRight, KeyCode::KeyD];
const JUMP: [KeyCode; 1] = [KeyCode::Space];

/// The logical actions held this frame.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Actions {
    pub forward: bool,
    pub backward: bool,
    pub leftward: bool,
    pub rightward: bool,
    pub jump: bool,
}

impl Actions {
    pub fn any_direction(&self) -> bool {
        self.forward || self.backward || self.leftward || self.rightward
    }
}

fn gather_actions(keyboard: Option<Res<ButtonInput<KeyCode>>>, mut actions: ResMut<Actions>) {
    let Some(keyboard) = keyboard else {
        return;
    };
    *actions = Actions {
        forward: keyboard.any_pressed(FORWARD),
        backward: keyboard.any_pressed(BACKWARD),
        leftward: keyboard.any_pressed(LEFTWARD),
        rightward: keyboard.any_pressed(RIGHTWARD),
        jump: keyboard.any_pressed(JUMP),
    };
}
