// Main
mod controller;
mod hud;
mod input;
mod phase;
mod sensors;
mod store;
mod world;

use avian3d::prelude::*;
use bevy::prelude::*;
use controller::ControllerPlugin;
use hud::HudPlugin;
use input::InputPlugin;
use phase::GamePhase;
use sensors::SensorPlugin;
use store::StorePlugin;
use world::WorldPlugin;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Duck's Adventure".into(),
                ..default()
            }),
            ..default()
        }))
        .add_plugins(PhysicsPlugins::default())
        .init_state::<GamePhase>()
        .add_plugins((
            InputPlugin,
            StorePlugin,
            ControllerPlugin,
            SensorPlugin,
            WorldPlugin,
            HudPlugin,
        ))
        .run();
}
