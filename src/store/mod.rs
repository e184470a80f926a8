// The single authoritative game state. Controller, sensors and presentation
// all read from and write to the `GameStore` resource.
mod date;
pub mod puzzle;
mod timers;

use std::time::Duration;

use bevy::prelude::*;
use bevy::time::common_conditions::on_timer;

use crate::phase::{FIRST_STAGE, GamePhase, PROPOSAL_STAGE, Stage};
use date::ACCEPT_MESSAGE;
pub use date::{DateProposalState, DateResponse, PROPOSAL_PROMPT};
use puzzle::{GOAL_RADIUS, Puzzle, horizontal_distance};
use timers::{Deferred, Scheduler, TaskId};

pub struct StorePlugin;

impl Plugin for StorePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<GameStore>()
            .add_systems(Update, (advance_store_timers, sync_phase).chain())
            .add_systems(
                Update,
                sweep_pressure_plates.run_if(on_timer(PLATE_SWEEP_PERIOD)),
            );
    }
}

pub const PLATE_SWEEP_PERIOD: Duration = Duration::from_millis(100);
pub const MESSAGE_HOLD: Duration = Duration::from_secs(6);
pub const ACCEPT_HOLD: Duration = Duration::from_secs(8);
pub const WIN_MESSAGE_HOLD: Duration = Duration::from_secs(6);
/// Gap between the win message fading and the stage changing.
pub const WIN_ADVANCE_GAP: Duration = Duration::from_millis(300);

pub const WIN_MESSAGE: &str = "Good Job Bubba !! <3";

const WIN_SPAWN: Vec3 = Vec3::new(0.0, 1.0, 1.0);
/// Stage-2 pedestal; the choice buttons sit on its top face.
pub const PEDESTAL_RADIUS: f32 = 4.0;
pub const PEDESTAL_HEIGHT: f32 = 2.0;

/// Where a refused proposal sends the player: back on the pedestal, in
/// front of both buttons.
const DATE_RETRY_POINT: Vec3 = Vec3::new(0.0, PEDESTAL_HEIGHT + 1.0, 1.5);

pub fn spawn_point(stage: Stage) -> Vec3 {
    if stage == PROPOSAL_STAGE {
        Vec3::new(0.0, 3.0, 0.0)
    } else {
        Vec3::new(0.0, 1.0, 0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub position: Vec3,
    /// Euler angles; only yaw (y) and the wobble tilt (x) are used.
    pub rotation: Vec3,
    pub is_moving: bool,
    pub is_on_floor: bool,
    /// Fall debounce, cleared by a timer after each fall.
    pub has_fallen: bool,
}

impl PlayerState {
    fn at(position: Vec3) -> Self {
        Self {
            position,
            rotation: Vec3::ZERO,
            is_moving: false,
            is_on_floor: false,
            has_fallen: false,
        }
    }
}

/// The one on-screen message line. At most one hide timer is live.
#[derive(Debug, Default)]
struct MessageSlot {
    text: String,
    visible: bool,
    hide: Option<TaskId>,
}

#[derive(Resource)]
pub struct GameStore {
    phase: GamePhase,
    stage: Stage,
    player: PlayerState,
    puzzle: Puzzle,
    date: DateProposalState,
    message: MessageSlot,
    scheduler: Scheduler,
    win_triggered: bool,
    win_task: Option<TaskId>,
    teleport: Option<Vec3>,
    layout_revision: u32,
}

impl Default for GameStore {
    fn default() -> Self {
        Self {
            phase: GamePhase::Menu,
            stage: FIRST_STAGE,
            player: PlayerState::at(spawn_point(FIRST_STAGE)),
            puzzle: Puzzle::default(),
            date: DateProposalState::default(),
            message: MessageSlot::default(),
            scheduler: Scheduler::default(),
            win_triggered: false,
            win_task: None,
            teleport: None,
            layout_revision: 0,
        }
    }
}

impl GameStore {
    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn player(&self) -> &PlayerState {
        &self.player
    }

    pub fn puzzle(&self) -> &Puzzle {
        &self.puzzle
    }

    pub fn date(&self) -> &DateProposalState {
        &self.date
    }

    pub fn message(&self) -> &str {
        &self.message.text
    }

    pub fn message_visible(&self) -> bool {
        self.message.visible
    }

    /// Bumped whenever the level has to be rebuilt from the store.
    pub fn layout_revision(&self) -> u32 {
        self.layout_revision
    }

    pub fn pending_tasks(&self) -> usize {
        self.scheduler.len()
    }

    pub fn start(&mut self) {
        if self.phase != GamePhase::Menu {
            return;
        }
        info!("starting game");
        self.phase = GamePhase::Playing;
    }

    /// Back to a fresh stage 1: puzzle, dialogue, timers and player.
    pub fn restart(&mut self) {
        info!("restarting from stage {}", self.stage);
        self.scheduler.clear();
        self.message = MessageSlot::default();
        self.win_triggered = false;
        self.win_task = None;
        self.stage = FIRST_STAGE;
        self.puzzle = Puzzle::default();
        self.date = DateProposalState::default();
        self.place_player(spawn_point(FIRST_STAGE));
        self.player.has_fallen = false;
        self.phase = GamePhase::Playing;
        self.layout_revision += 1;
    }

    /// Leaves each stage's entity state alone; only the player, the
    /// message line and the stage counter change.
    pub fn next_stage(&mut self) {
        if let Some(task) = self.win_task.take() {
            self.scheduler.cancel(task);
        }
        self.stage += 1;
        info!("advancing to stage {}", self.stage);
        self.place_player(spawn_point(self.stage));
        self.clear_message();
        self.phase = GamePhase::Playing;
        self.layout_revision += 1;
    }

    pub fn game_over(&mut self) {
        if self.phase == GamePhase::Playing {
            info!("game over");
            self.phase = GamePhase::GameOver;
        }
    }

    pub fn complete_level(&mut self) {
        if self.phase == GamePhase::Playing {
            self.phase = GamePhase::LevelComplete;
        }
    }

    pub fn set_player_position(&mut self, position: Vec3) {
        self.player.position = position;
    }

    pub fn set_player_rotation(&mut self, rotation: Vec3) {
        self.player.rotation = rotation;
    }

    pub fn set_is_moving(&mut self, moving: bool) {
        self.player.is_moving = moving;
    }

    pub fn set_on_floor(&mut self, on_floor: bool) {
        self.player.is_on_floor = on_floor;
    }

    pub fn update_crate_position(&mut self, id: &str, position: Vec3) -> bool {
        self.puzzle.move_crate(id, position)
    }

    /// Sets one trigger, re-derives every door, then checks the stage-1 win
    /// pair. The win sequence starts at most once per run.
    pub fn update_pressure_plate(&mut self, id: &str, pressed: bool) -> bool {
        if !self.puzzle.set_pressed(id, pressed) {
            return false;
        }
        self.puzzle.derive_doors();

        if self.stage == FIRST_STAGE && !self.win_triggered && self.puzzle.win_buttons_pressed() {
            self.begin_win_sequence();
        }
        true
    }

    pub fn check_pressure_plates(&mut self) {
        self.puzzle.sweep_plates();
        self.puzzle.derive_doors();
    }

    pub fn check_goal(&mut self) {
        if self.phase != GamePhase::Playing || self.stage != FIRST_STAGE {
            return;
        }
        let goal = &mut self.puzzle.goal;
        if goal.reached {
            return;
        }
        if horizontal_distance(self.player.position, goal.position) < GOAL_RADIUS {
            goal.reached = true;
            info!("goal reached");
            self.complete_level();
        }
    }

    /// Respawns the player for the current stage. A non-empty message is
    /// shown for [`MESSAGE_HOLD`].
    pub fn reset_player_position(&mut self, message: &str) {
        self.place_player(spawn_point(self.stage));
        if message.is_empty() {
            self.clear_message();
        } else {
            self.show_message(message, MESSAGE_HOLD);
        }
    }

    /// Stage 2 only. Callers pass the button's effective answer.
    pub fn handle_date_response(&mut self, response: DateResponse) -> bool {
        if self.stage != PROPOSAL_STAGE {
            return false;
        }
        match response {
            DateResponse::Yes => {
                info!("date accepted");
                self.date.accept();
                self.show_message(ACCEPT_MESSAGE, ACCEPT_HOLD);
            }
            DateResponse::No => {
                let line = self.date.refuse();
                debug!("date refused {} times", self.date.no_click_count);
                self.place_player(DATE_RETRY_POINT);
                self.show_message(line, MESSAGE_HOLD);
            }
        }
        true
    }

    /// Arms the fall debounce. Returns false if it is already armed.
    pub fn mark_fallen(&mut self, cooldown: Duration) -> bool {
        if self.player.has_fallen {
            return false;
        }
        self.player.has_fallen = true;
        self.scheduler.schedule(cooldown, Deferred::ClearFallDebounce);
        true
    }

    /// Position the physics body must jump to, if a command moved the player.
    pub fn take_teleport(&mut self) -> Option<Vec3> {
        self.teleport.take()
    }

    pub fn advance_timers(&mut self, delta: Duration) {
        for action in self.scheduler.tick(delta) {
            match action {
                Deferred::HideMessage => {
                    self.message.visible = false;
                    self.message.hide = None;
                }
                Deferred::BeginStageAdvance => {
                    self.win_task = Some(
                        self.scheduler
                            .schedule(WIN_ADVANCE_GAP, Deferred::AdvanceStage),
                    );
                }
                Deferred::AdvanceStage => {
                    self.win_task = None;
                    self.next_stage();
                }
                Deferred::ClearFallDebounce => {
                    self.player.has_fallen = false;
                }
            }
        }
    }

    fn begin_win_sequence(&mut self) {
        info!("both buttons pressed, leaving stage {}", self.stage);
        self.win_triggered = true;
        self.place_player(WIN_SPAWN);
        self.show_message(WIN_MESSAGE, WIN_MESSAGE_HOLD);
        self.win_task = Some(
            self.scheduler
                .schedule(WIN_MESSAGE_HOLD, Deferred::BeginStageAdvance),
        );
    }

    fn place_player(&mut self, position: Vec3) {
        self.player.position = position;
        self.player.rotation = Vec3::ZERO;
        self.teleport = Some(position);
    }

    fn show_message(&mut self, text: &str, hold: Duration) {
        self.cancel_message_hide();
        self.message.text = text.to_owned();
        self.message.visible = true;
        self.message.hide = Some(self.scheduler.schedule(hold, Deferred::HideMessage));
    }

    fn clear_message(&mut self) {
        self.cancel_message_hide();
        self.message.text.clear();
        self.message.visible = false;
    }

    fn cancel_message_hide(&mut self) {
        if let Some(task) = self.message.hide.take() {
            self.scheduler.cancel(task);
        }
    }
}

fn advance_store_timers(mut store: ResMut<GameStore>, time: Res<Time>) {
    // Avoid flagging the store as changed on idle frames.
    if store.pending_tasks() == 0 {
        return;
    }
    store.advance_timers(time.delta());
}

fn sync_phase(
    store: Res<GameStore>,
    state: Res<State<GamePhase>>,
    mut next_state: ResMut<NextState<GamePhase>>,
) {
    if *state.get() != store.phase() {
        debug!("phase {} -> {}", state.get(), store.phase());
        next_state.set(store.phase());
    }
}

fn sweep_pressure_plates(mut store: ResMut<GameStore>) {
    store.check_pressure_plates();
}

#[cfg(test)]
mod tests {
    use super::date::ESCALATION_SCRIPT;
    use super::*;

    fn playing() -> GameStore {
        let mut store = GameStore::default();
        store.start();
        store
    }

    fn in_stage_two() -> GameStore {
        let mut store = playing();
        store.next_stage();
        store.take_teleport();
        store
    }

    #[test]
    fn start_only_leaves_the_menu() {
        let mut store = GameStore::default();
        assert_eq!(store.phase(), GamePhase::Menu);
        store.start();
        assert_eq!(store.phase(), GamePhase::Playing);

        store.game_over();
        store.start();
        assert_eq!(store.phase(), GamePhase::GameOver);
    }

    #[test]
    fn goal_is_one_way() {
        let mut store = playing();
        store.check_goal();
        assert_eq!(store.phase(), GamePhase::Playing);

        store.set_player_position(Vec3::new(8.5, 3.0, 7.5));
        store.check_goal();
        assert!(store.puzzle().goal.reached);
        assert_eq!(store.phase(), GamePhase::LevelComplete);

        store.set_player_position(Vec3::ZERO);
        for _ in 0..5 {
            store.check_goal();
        }
        assert!(store.puzzle().goal.reached);
        assert_eq!(store.phase(), GamePhase::LevelComplete);
    }

    #[test]
    fn goal_check_is_idle_outside_play() {
        let mut store = GameStore::default();
        store.set_player_position(Vec3::new(8.0, 0.5, 8.0));
        store.check_goal();
        assert!(!store.puzzle().goal.reached);
        assert_eq!(store.phase(), GamePhase::Menu);
    }

    #[test]
    fn crate_on_plate_scenario() {
        let mut store = playing();
        assert!(store.update_crate_position("crate-1", Vec3::new(4.0, 0.5, 4.0)));
        store.check_pressure_plates();
        assert!(store.puzzle().trigger("plate-1").unwrap().pressed);

        store.update_crate_position("crate-1", Vec3::new(10.0, 0.5, 10.0));
        store.check_pressure_plates();
        assert!(!store.puzzle().trigger("plate-1").unwrap().pressed);
    }

    #[test]
    fn plate_update_rederives_doors() {
        let mut store = playing();
        store.update_crate_position("crate-3", Vec3::new(-4.0, 0.5, -4.0));
        store.check_pressure_plates();
        assert!(store.puzzle().door("door-2").unwrap().open);
        assert!(!store.update_pressure_plate("button-9", true));
    }

    #[test]
    fn win_sequence_runs_once_and_advances_one_stage() {
        let mut store = playing();
        store.update_pressure_plate("button-1", true);
        assert!(!store.message_visible());
        store.update_pressure_plate("button-2", true);
        assert_eq!(store.message(), WIN_MESSAGE);
        assert!(store.message_visible());
        assert_eq!(store.take_teleport(), Some(WIN_SPAWN));

        // Toggling a button while the sequence is pending must not restart it.
        store.update_pressure_plate("button-2", false);
        store.update_pressure_plate("button-2", true);
        assert_eq!(store.pending_tasks(), 2);

        store.advance_timers(WIN_MESSAGE_HOLD);
        assert!(!store.message_visible());
        assert_eq!(store.stage(), FIRST_STAGE);

        store.advance_timers(WIN_ADVANCE_GAP);
        assert_eq!(store.stage(), PROPOSAL_STAGE);
        assert_eq!(store.phase(), GamePhase::Playing);
        assert_eq!(store.message(), "");

        store.advance_timers(Duration::from_secs(30));
        assert_eq!(store.stage(), PROPOSAL_STAGE);
    }

    #[test]
    fn manual_advance_cancels_the_pending_win_advance() {
        let mut store = playing();
        store.update_pressure_plate("button-1", true);
        store.update_pressure_plate("button-2", true);
        store.next_stage();
        store.advance_timers(Duration::from_secs(10));
        assert_eq!(store.stage(), PROPOSAL_STAGE);
    }

    #[test]
    fn later_message_does_not_cancel_the_win_advance() {
        let mut store = playing();
        store.update_pressure_plate("button-1", true);
        store.update_pressure_plate("button-2", true);
        store.advance_timers(Duration::from_secs(2));
        store.reset_player_position("oops");
        assert_eq!(store.message(), "oops");

        store.advance_timers(Duration::from_secs(4));
        store.advance_timers(WIN_ADVANCE_GAP);
        assert_eq!(store.stage(), PROPOSAL_STAGE);
    }

    #[test]
    fn newer_message_cancels_older_hide() {
        let mut store = playing();
        store.reset_player_position("first");
        store.advance_timers(Duration::from_secs(4));
        store.reset_player_position("second");
        assert_eq!(store.pending_tasks(), 1);

        store.advance_timers(Duration::from_secs(3));
        assert!(store.message_visible());
        assert_eq!(store.message(), "second");

        store.advance_timers(Duration::from_secs(3));
        assert!(!store.message_visible());
    }

    #[test]
    fn reset_without_message_hides_the_line() {
        let mut store = playing();
        store.reset_player_position("oops");
        store.reset_player_position("");
        assert!(!store.message_visible());
        assert_eq!(store.pending_tasks(), 0);
        assert_eq!(store.take_teleport(), Some(spawn_point(FIRST_STAGE)));
    }

    #[test]
    fn next_stage_keeps_stage_one_entities() {
        let mut store = playing();
        store.update_crate_position("crate-1", Vec3::new(4.0, 0.5, 4.0));
        store.check_pressure_plates();
        store.reset_player_position("oops");

        let revision = store.layout_revision();
        store.next_stage();
        assert_eq!(store.stage(), PROPOSAL_STAGE);
        assert_eq!(store.player().position, spawn_point(PROPOSAL_STAGE));
        assert!(!store.message_visible());
        assert!(store.puzzle().trigger("plate-1").unwrap().pressed);
        assert_eq!(store.layout_revision(), revision + 1);
    }

    #[test]
    fn date_answers_only_count_in_stage_two() {
        let mut store = playing();
        assert!(!store.handle_date_response(DateResponse::No));
        assert_eq!(store.date().no_click_count, 0);
    }

    #[test]
    fn stage_one_buttons_do_nothing_in_stage_two() {
        let mut store = in_stage_two();
        assert!(store.update_pressure_plate("button-1", true));
        assert!(store.update_pressure_plate("button-2", true));
        assert!(!store.message_visible());
        assert_ne!(store.message(), WIN_MESSAGE);
        assert_eq!(store.pending_tasks(), 0);

        store.advance_timers(Duration::from_secs(30));
        assert_eq!(store.stage(), PROPOSAL_STAGE);
    }

    #[test]
    fn goal_is_ignored_outside_stage_one() {
        let mut store = in_stage_two();
        let goal = store.puzzle().goal.position;
        store.set_player_position(goal);
        store.check_goal();
        assert_eq!(store.phase(), GamePhase::Playing);
        assert!(!store.puzzle().goal.reached);
    }

    #[test]
    fn refused_player_lands_back_on_the_pedestal() {
        let mut store = in_stage_two();
        store.handle_date_response(DateResponse::No);
        let landing = store.take_teleport().unwrap();
        assert!(landing.y >= PEDESTAL_HEIGHT);
        assert!(Vec2::new(landing.x, landing.z).length() < PEDESTAL_RADIUS);
    }

    #[test]
    fn yes_accepts_for_eight_seconds() {
        let mut store = in_stage_two();
        assert!(store.handle_date_response(DateResponse::Yes));
        assert!(store.date().date_accepted);
        assert_eq!(store.message(), ACCEPT_MESSAGE);

        store.advance_timers(Duration::from_secs(7));
        assert!(store.message_visible());
        store.advance_timers(Duration::from_secs(1));
        assert!(!store.message_visible());
    }

    #[test]
    fn refusals_escalate_deterministically() {
        let mut store = in_stage_two();
        for n in 1..=ESCALATION_SCRIPT.len() + 3 {
            store.handle_date_response(DateResponse::No);
            let index = (n - 1).min(ESCALATION_SCRIPT.len() - 1);
            assert_eq!(store.message(), ESCALATION_SCRIPT[index]);
            assert_eq!(store.date().both_buttons_yes, n >= ESCALATION_SCRIPT.len());
            assert_eq!(store.take_teleport(), Some(DATE_RETRY_POINT));
            assert_eq!(store.pending_tasks(), 1);
        }
        assert!(store.date().both_buttons_yes);
    }

    #[test]
    fn fall_debounce_clears_after_cooldown() {
        let mut store = playing();
        let cooldown = Duration::from_secs(2);
        assert!(store.mark_fallen(cooldown));
        assert!(!store.mark_fallen(cooldown));

        store.advance_timers(Duration::from_millis(1900));
        assert!(store.player().has_fallen);
        store.advance_timers(Duration::from_millis(100));
        assert!(!store.player().has_fallen);
        assert!(store.mark_fallen(cooldown));
    }

    #[test]
    fn restart_clears_everything_monotonic() {
        let mut store = in_stage_two();
        for _ in 0..ESCALATION_SCRIPT.len() {
            store.handle_date_response(DateResponse::No);
        }
        store.handle_date_response(DateResponse::Yes);

        store.restart();
        assert_eq!(store.stage(), FIRST_STAGE);
        assert_eq!(store.phase(), GamePhase::Playing);
        assert_eq!(store.date(), &DateProposalState::default());
        assert_eq!(store.puzzle(), &Puzzle::default());
        assert_eq!(store.pending_tasks(), 0);
        assert!(!store.message_visible());
        assert_eq!(store.take_teleport(), Some(spawn_point(FIRST_STAGE)));
    }

    #[test]
    fn restart_rearms_the_win_sequence() {
        let mut store = playing();
        store.update_pressure_plate("button-1", true);
        store.update_pressure_plate("button-2", true);
        store.restart();
        store.update_pressure_plate("button-1", true);
        store.update_pressure_plate("button-2", true);
        assert_eq!(store.message(), WIN_MESSAGE);
    }
}
