// Stage-1 puzzle entities and the pure derivations over them.
use bevy::prelude::*;

/// A crate counts as resting on a plate inside this horizontal radius.
pub const PLATE_RADIUS: f32 = 1.0;
/// Horizontal radius around the goal that completes the level.
pub const GOAL_RADIUS: f32 = 1.5;
/// Both must be held down at once to leave stage 1.
pub const WIN_BUTTONS: [&str; 2] = ["button-1", "button-2"];

#[derive(Debug, Clone, PartialEq)]
pub struct CrateState {
    pub id: &'static str,
    pub position: Vec3,
}

/// How a trigger learns that it is pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// Recomputed by the periodic crate sweep.
    Plate,
    /// Driven by physics sensor overlap events.
    Button,
}

/// A pressure plate or puzzle button wired to a door.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub id: &'static str,
    pub kind: TriggerKind,
    pub position: Vec3,
    pub door_id: &'static str,
    pub pressed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoorState {
    pub id: &'static str,
    pub position: Vec3,
    pub open: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoalState {
    pub position: Vec3,
    pub reached: bool,
}

/// Everything stage 1 is played with.
#[derive(Debug, Clone, PartialEq)]
pub struct Puzzle {
    pub crates: Vec<CrateState>,
    pub triggers: Vec<Trigger>,
    pub doors: Vec<DoorState>,
    pub goal: GoalState,
}

impl Default for Puzzle {
    fn default() -> Self {
        Self {
            crates: vec![
                CrateState {
                    id: "crate-1",
                    position: Vec3::new(3.0, 0.5, 2.0),
                },
                CrateState {
                    id: "crate-2",
                    position: Vec3::new(-2.0, 0.5, 3.0),
                },
                CrateState {
                    id: "crate-3",
                    position: Vec3::new(4.0, 0.5, -2.0),
                },
            ],
            triggers: vec![
                Trigger::new("plate-1", TriggerKind::Plate, Vec3::new(4.0, 0.1, 4.0), "door-1"),
                Trigger::new("plate-2", TriggerKind::Plate, Vec3::new(-4.0, 0.1, -4.0), "door-2"),
                Trigger::new("button-1", TriggerKind::Button, Vec3::new(6.0, 0.0, 0.0), "door-1"),
                Trigger::new("button-2", TriggerKind::Button, Vec3::new(-6.0, 0.0, 0.0), "door-1"),
            ],
            doors: vec![
                DoorState {
                    id: "door-1",
                    position: Vec3::new(0.0, 0.0, 5.0),
                    open: false,
                },
                DoorState {
                    id: "door-2",
                    position: Vec3::new(5.0, 0.0, 0.0),
                    open: false,
                },
            ],
            goal: GoalState {
                position: Vec3::new(8.0, 0.5, 8.0),
                reached: false,
            },
        }
    }
}

impl Trigger {
    fn new(id: &'static str, kind: TriggerKind, position: Vec3, door_id: &'static str) -> Self {
        Self {
            id,
            kind,
            position,
            door_id,
            pressed: false,
        }
    }
}

impl Puzzle {
    pub fn trigger(&self, id: &str) -> Option<&Trigger> {
        self.triggers.iter().find(|t| t.id == id)
    }

    pub fn door(&self, id: &str) -> Option<&DoorState> {
        self.doors.iter().find(|d| d.id == id)
    }

    /// Returns false for an unknown id.
    pub fn move_crate(&mut self, id: &str, position: Vec3) -> bool {
        match self.crates.iter_mut().find(|c| c.id == id) {
            Some(crate_state) => {
                crate_state.position = position;
                true
            }
            None => false,
        }
    }

    /// Returns false for an unknown id.
    pub fn set_pressed(&mut self, id: &str, pressed: bool) -> bool {
        match self.triggers.iter_mut().find(|t| t.id == id) {
            Some(trigger) => {
                trigger.pressed = pressed;
                true
            }
            None => false,
        }
    }

    /// Recomputes every plate from crate proximity. Buttons are left alone.
    pub fn sweep_plates(&mut self) {
        for trigger in &mut self.triggers {
            if trigger.kind == TriggerKind::Plate {
                trigger.pressed = any_crate_on(&self.crates, trigger.position);
            }
        }
    }

    /// Re-derives every door from scratch.
    pub fn derive_doors(&mut self) {
        for door in &mut self.doors {
            door.open = door_open(&self.triggers, door.id);
        }
    }

    pub fn win_buttons_pressed(&self) -> bool {
        WIN_BUTTONS
            .iter()
            .all(|id| self.trigger(id).is_some_and(|t| t.pressed))
    }
}

/// A door with no triggers wired to it stays shut.
pub fn door_open(triggers: &[Trigger], door_id: &str) -> bool {
    let mut wired = triggers.iter().filter(|t| t.door_id == door_id).peekable();
    wired.peek().is_some() && wired.all(|t| t.pressed)
}

pub fn any_crate_on(crates: &[CrateState], plate: Vec3) -> bool {
    crates
        .iter()
        .any(|c| horizontal_distance(c.position, plate) < PLATE_RADIUS)
}

/// Distance in the XZ plane.
pub fn horizontal_distance(a: Vec3, b: Vec3) -> f32 {
    Vec2::new(a.x - b.x, a.z - b.z).length()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press_all(puzzle: &mut Puzzle, ids: &[&str]) {
        for id in ids {
            assert!(puzzle.set_pressed(id, true));
        }
        puzzle.derive_doors();
    }

    #[test]
    fn door_needs_every_wired_trigger() {
        let mut puzzle = Puzzle::default();
        press_all(&mut puzzle, &["button-1", "button-2"]);
        assert!(!puzzle.door("door-1").unwrap().open);

        press_all(&mut puzzle, &["plate-1"]);
        assert!(puzzle.door("door-1").unwrap().open);
        assert!(!puzzle.door("door-2").unwrap().open);

        puzzle.set_pressed("button-2", false);
        puzzle.derive_doors();
        assert!(!puzzle.door("door-1").unwrap().open);
    }

    #[test]
    fn door_open_matches_and_for_every_combination() {
        let ids = ["plate-1", "button-1", "button-2"];
        for mask in 0..(1u8 << ids.len()) {
            let mut puzzle = Puzzle::default();
            for (bit, id) in ids.iter().enumerate() {
                puzzle.set_pressed(id, mask & (1 << bit) != 0);
            }
            puzzle.derive_doors();
            let expected = mask == 0b111;
            assert_eq!(puzzle.door("door-1").unwrap().open, expected, "mask {mask:03b}");
        }
    }

    #[test]
    fn unwired_door_stays_closed() {
        assert!(!door_open(&Puzzle::default().triggers, "door-9"));
    }

    #[test]
    fn crate_on_plate_presses_it() {
        let mut puzzle = Puzzle::default();
        assert!(puzzle.move_crate("crate-1", Vec3::new(4.0, 0.5, 4.0)));
        puzzle.sweep_plates();
        assert!(puzzle.trigger("plate-1").unwrap().pressed);

        puzzle.move_crate("crate-1", Vec3::new(10.0, 0.5, 10.0));
        puzzle.sweep_plates();
        assert!(!puzzle.trigger("plate-1").unwrap().pressed);
    }

    #[test]
    fn sweep_ignores_height_and_buttons() {
        let mut puzzle = Puzzle::default();
        puzzle.set_pressed("button-1", true);
        puzzle.move_crate("crate-2", Vec3::new(-4.5, 3.0, -4.2));
        puzzle.sweep_plates();
        assert!(puzzle.trigger("plate-2").unwrap().pressed);
        assert!(puzzle.trigger("button-1").unwrap().pressed);
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let mut puzzle = Puzzle::default();
        let before = puzzle.clone();
        assert!(!puzzle.move_crate("crate-42", Vec3::ZERO));
        assert!(!puzzle.set_pressed("plate-42", true));
        assert_eq!(puzzle, before);
    }
}
