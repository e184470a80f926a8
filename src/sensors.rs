// Sensor-driven interactive objects. Buttons count overlapping bodies from
// physics collision messages; plates are swept by the store from the crate
// positions published here.
use std::time::Duration;

use avian3d::prelude::*;
use bevy::prelude::*;

use crate::store::{DateProposalState, DateResponse, GameStore};

pub struct SensorPlugin;

impl Plugin for SensorPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (
                count_overlaps,
                press_puzzle_buttons,
                press_choice_buttons,
                track_crates,
            )
                .chain(),
        );
    }
}

/// Choice buttons ignore the sensor for this long after answering.
pub const CHOICE_COOLDOWN: Duration = Duration::from_millis(500);

/// Net balance of enter and exit events; never below zero.
#[derive(Component, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OverlapCounter(u32);

impl OverlapCounter {
    pub fn enter(&mut self) {
        self.0 += 1;
    }

    pub fn exit(&mut self) {
        self.0 = self.0.saturating_sub(1);
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }

    pub fn count(&self) -> u32 {
        self.0
    }
}

/// Stays down while anything rests on it.
#[derive(Component, Debug)]
pub struct PuzzleButton {
    pub id: &'static str,
    pressed: bool,
}

impl PuzzleButton {
    pub fn new(id: &'static str) -> Self {
        Self { id, pressed: false }
    }

    /// Returns the new state when the button flips.
    pub fn update(&mut self, overlaps: &OverlapCounter) -> Option<bool> {
        let occupied = overlaps.count() > 0;
        if occupied == self.pressed {
            return None;
        }
        self.pressed = occupied;
        Some(occupied)
    }
}

/// Momentary answer button on the proposal pedestal.
#[derive(Component, Debug)]
pub struct ChoiceButton {
    pub choice: DateResponse,
    cooldown: Option<Timer>,
}

impl ChoiceButton {
    pub fn new(choice: DateResponse) -> Self {
        Self {
            choice,
            cooldown: None,
        }
    }

    /// Returns the answer to submit, already resolved against the
    /// exhausted-script override. Re-arms after [`CHOICE_COOLDOWN`] with the
    /// overlap count zeroed, so a body still resting on the sensor has to
    /// step off and back on to answer again.
    pub fn update(
        &mut self,
        overlaps: &mut OverlapCounter,
        delta: Duration,
        date: &DateProposalState,
    ) -> Option<DateResponse> {
        if let Some(cooldown) = self.cooldown.as_mut() {
            if cooldown.tick(delta).just_finished() {
                self.cooldown = None;
                overlaps.reset();
            }
            return None;
        }
        if overlaps.count() == 0 {
            return None;
        }
        self.cooldown = Some(Timer::new(CHOICE_COOLDOWN, TimerMode::Once));
        Some(date.effective(self.choice))
    }
}

/// Publishes this body's position to the store under the crate id.
#[derive(Component)]
pub struct TrackedCrate(pub &'static str);

fn count_overlaps(
    mut started: MessageReader<CollisionStart>,
    mut ended: MessageReader<CollisionEnd>,
    mut sensors: Query<&mut OverlapCounter>,
) {
    for event in started.read() {
        for entity in [event.collider1, event.collider2] {
            if let Ok(mut counter) = sensors.get_mut(entity) {
                counter.enter();
            }
        }
    }
    for event in ended.read() {
        for entity in [event.collider1, event.collider2] {
            if let Ok(mut counter) = sensors.get_mut(entity) {
                counter.exit();
            }
        }
    }
}

fn press_puzzle_buttons(
    mut store: ResMut<GameStore>,
    mut buttons: Query<(&mut PuzzleButton, &OverlapCounter), Changed<OverlapCounter>>,
) {
    for (mut button, overlaps) in &mut buttons {
        if let Some(pressed) = button.update(overlaps) {
            debug!("{} pressed: {pressed}", button.id);
            store.update_pressure_plate(button.id, pressed);
        }
    }
}

fn press_choice_buttons(
    time: Res<Time>,
    mut store: ResMut<GameStore>,
    mut buttons: Query<(&mut ChoiceButton, &mut OverlapCounter)>,
) {
    for (mut button, mut overlaps) in &mut buttons {
        let answer = button.update(&mut overlaps, time.delta(), store.date());
        if let Some(answer) = answer {
            debug!("{} button answered {answer}", button.choice);
            store.handle_date_response(answer);
        }
    }
}

fn track_crates(
    mut store: ResMut<GameStore>,
    crates: Query<(&TrackedCrate, &Transform), Changed<Transform>>,
) {
    for (tracked, transform) in &crates {
        store.update_crate_position(tracked.0, transform.translation);
    }
}
