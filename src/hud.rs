// Heads-up display: title, stage indicator, per-phase panels and the
// message banner. Everything here reads the store; only the panel buttons
// and shortcuts issue commands.
use bevy::prelude::*;

use crate::phase::{GamePhase, PROPOSAL_STAGE};
use crate::store::{GameStore, PROPOSAL_PROMPT};

pub struct HudPlugin;

impl Plugin for HudPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_hud)
            .add_systems(OnEnter(GamePhase::Menu), |commands: Commands| {
                spawn_panel(commands, GamePhase::Menu)
            })
            .add_systems(OnEnter(GamePhase::LevelComplete), |commands: Commands| {
                spawn_panel(commands, GamePhase::LevelComplete)
            })
            .add_systems(OnEnter(GamePhase::GameOver), |commands: Commands| {
                spawn_panel(commands, GamePhase::GameOver)
            })
            .add_systems(
                Update,
                (
                    button_visuals,
                    button_actions,
                    shortcuts,
                    update_stage_label,
                    update_message,
                ),
            );
    }
}

const NORMAL_BUTTON: Color = Color::srgb(0.15, 0.15, 0.15);
const HOVERED_BUTTON: Color = Color::srgb(0.25, 0.25, 0.25);
const PRESSED_BUTTON: Color = Color::srgb(0.35, 0.35, 0.35);
const MESSAGE_COLOUR: Color = Color::srgb(1.0, 0.412, 0.706);
const PULSE_RATE: f32 = 3.0;
const PULSE_DEPTH: f32 = 0.05;

pub const CONTROLS_HELP: &str = "WASD / arrows to move, Space to jump, R to restart, Esc to give up";
const CHOICE_HELP: &str = "Waddle onto the green button for YES or the red one for NO";

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
enum PanelButton {
    Start,
    NextStage,
    TryAgain,
}

impl PanelButton {
    fn label(self) -> &'static str {
        match self {
            PanelButton::Start => "Start",
            PanelButton::NextStage => "Next Stage",
            PanelButton::TryAgain => "Try Again",
        }
    }
}

#[derive(Component)]
struct StageLabel;

#[derive(Component)]
struct MessageBanner;

#[derive(Component)]
struct ChoiceHelp;

/// The panel shown in each non-playing phase, if any.
fn panel_for(phase: GamePhase) -> Option<(&'static str, PanelButton)> {
    match phase {
        GamePhase::Menu => Some(("Duck's Adventure", PanelButton::Start)),
        GamePhase::LevelComplete => Some(("Level Complete!", PanelButton::NextStage)),
        GamePhase::GameOver => Some(("Game Over", PanelButton::TryAgain)),
        GamePhase::Playing => None,
    }
}

/// Space advances whatever the current panel offers.
fn shortcut_for(phase: GamePhase) -> Option<PanelButton> {
    panel_for(phase).map(|(_, button)| button)
}

fn apply(store: &mut GameStore, button: PanelButton) {
    match button {
        PanelButton::Start => store.start(),
        PanelButton::NextStage => store.next_stage(),
        PanelButton::TryAgain => store.restart(),
    }
}

fn spawn_hud(mut commands: Commands) {
    commands
        .spawn(Node {
            width: Val::Percent(100.0),
            height: Val::Percent(100.0),
            flex_direction: FlexDirection::Column,
            justify_content: JustifyContent::SpaceBetween,
            align_items: AlignItems::Center,
            padding: UiRect::all(Val::Px(16.0)),
            ..default()
        })
        .with_children(|parent| {
            parent
                .spawn(Node {
                    flex_direction: FlexDirection::Column,
                    align_items: AlignItems::Center,
                    row_gap: Val::Px(8.0),
                    ..default()
                })
                .with_children(|top| {
                    top.spawn((
                        Text::new("Duck's Adventure"),
                        TextFont {
                            font_size: 32.0,
                            ..default()
                        },
                        TextColor(Color::WHITE),
                    ));
                    top.spawn((
                        StageLabel,
                        Text::new("Stage 1"),
                        TextFont {
                            font_size: 20.0,
                            ..default()
                        },
                        TextColor(Color::srgba(1.0, 1.0, 1.0, 0.8)),
                    ));
                    top.spawn((
                        MessageBanner,
                        Text::new(""),
                        TextFont {
                            font_size: 28.0,
                            ..default()
                        },
                        TextColor(MESSAGE_COLOUR),
                        UiTransform::default(),
                        Visibility::Hidden,
                    ));
                    top.spawn((
                        ChoiceHelp,
                        Text::new(CHOICE_HELP),
                        TextFont {
                            font_size: 18.0,
                            ..default()
                        },
                        TextColor(Color::WHITE),
                        Visibility::Hidden,
                    ));
                });

            parent.spawn((
                Text::new(CONTROLS_HELP),
                TextFont {
                    font_size: 16.0,
                    ..default()
                },
                TextColor(Color::srgba(1.0, 1.0, 1.0, 0.7)),
            ));
        });
}

fn spawn_panel(mut commands: Commands, phase: GamePhase) {
    let Some((title, button)) = panel_for(phase) else {
        return;
    };
    debug!("showing {phase} panel");

    commands
        .spawn((
            DespawnOnExit(phase),
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                flex_direction: FlexDirection::Column,
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                row_gap: Val::Px(24.0),
                position_type: PositionType::Absolute,
                ..default()
            },
            BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.5)),
            GlobalZIndex(100),
        ))
        .with_children(|parent| {
            parent.spawn((
                Text::new(title),
                TextFont {
                    font_size: 40.0,
                    ..default()
                },
                TextColor(Color::WHITE),
            ));
            spawn_button(parent, button);
            parent.spawn((
                Text::new("or press Space"),
                TextFont {
                    font_size: 16.0,
                    ..default()
                },
                TextColor(Color::srgba(0.8, 0.8, 0.8, 1.0)),
            ));
        });
}

fn spawn_button(parent: &mut ChildSpawnerCommands, marker: PanelButton) {
    parent
        .spawn((
            marker,
            Button,
            Node {
                width: Val::Px(200.0),
                height: Val::Px(50.0),
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                border: UiRect::all(Val::Px(2.0)),
                ..default()
            },
            BorderColor::all(Color::srgba(1.0, 1.0, 1.0, 0.3)),
            BackgroundColor(NORMAL_BUTTON),
        ))
        .with_children(|btn| {
            btn.spawn((
                Text::new(marker.label()),
                TextFont {
                    font_size: 24.0,
                    ..default()
                },
                TextColor(Color::WHITE),
            ));
        });
}

fn button_visuals(
    mut query: Query<
        (&Interaction, &mut BackgroundColor, &mut BorderColor),
        (Changed<Interaction>, With<PanelButton>),
    >,
) {
    for (interaction, mut bg, mut border) in &mut query {
        match *interaction {
            Interaction::Pressed => {
                *bg = PRESSED_BUTTON.into();
                *border = BorderColor::all(Color::WHITE);
            }
            Interaction::Hovered => {
                *bg = HOVERED_BUTTON.into();
                *border = BorderColor::all(Color::WHITE);
            }
            Interaction::None => {
                *bg = NORMAL_BUTTON.into();
                *border = BorderColor::all(Color::srgba(1.0, 1.0, 1.0, 0.3));
            }
        }
    }
}

fn button_actions(
    query: Query<(&Interaction, &PanelButton), Changed<Interaction>>,
    mut store: ResMut<GameStore>,
) {
    for (interaction, button) in &query {
        if *interaction == Interaction::Pressed {
            apply(&mut store, *button);
        }
    }
}

fn shortcuts(keyboard: Option<Res<ButtonInput<KeyCode>>>, mut store: ResMut<GameStore>) {
    let Some(keyboard) = keyboard else {
        return;
    };
    if keyboard.just_pressed(KeyCode::KeyR) {
        info!("restart requested");
        store.restart();
    } else if keyboard.just_pressed(KeyCode::Escape) {
        store.game_over();
    } else if keyboard.just_pressed(KeyCode::Space) {
        if let Some(button) = shortcut_for(store.phase()) {
            apply(&mut store, button);
        }
    }
}

fn update_stage_label(store: Res<GameStore>, mut label: Query<&mut Text, With<StageLabel>>) {
    if !store.is_changed() {
        return;
    }
    let Ok(mut text) = label.single_mut() else {
        return;
    };
    let wanted = format!("Stage {}", store.stage());
    if text.0 != wanted {
        text.0 = wanted;
    }
}

/// The YES/NO hint stays up on the pedestal until the proposal is accepted.
fn choice_help_visible(store: &GameStore) -> bool {
    store.stage() == PROPOSAL_STAGE
        && store.phase() == GamePhase::Playing
        && !store.date().date_accepted
}

/// What the banner should say, if anything.
fn banner_text(store: &GameStore) -> Option<&str> {
    if store.message_visible() {
        Some(store.message())
    } else if store.stage() == PROPOSAL_STAGE && store.phase() == GamePhase::Playing {
        Some(PROPOSAL_PROMPT)
    } else {
        None
    }
}

fn update_message(
    time: Res<Time>,
    store: Res<GameStore>,
    mut banner: Query<
        (&mut Text, &mut UiTransform, &mut Visibility),
        (With<MessageBanner>, Without<ChoiceHelp>),
    >,
    mut help: Query<&mut Visibility, (With<ChoiceHelp>, Without<MessageBanner>)>,
) {
    if let Ok(mut visibility) = help.single_mut() {
        let wanted = if choice_help_visible(&store) {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
        visibility.set_if_neq(wanted);
    }

    let Ok((mut text, mut ui_transform, mut visibility)) = banner.single_mut() else {
        return;
    };
    let Some(message) = banner_text(&store) else {
        visibility.set_if_neq(Visibility::Hidden);
        return;
    };
    if text.0 != message {
        text.0 = message.to_string();
    }
    visibility.set_if_neq(Visibility::Inherited);

    // Only transient messages pulse; the proposal prompt sits still.
    let scale = if store.message_visible() {
        1.0 + (time.elapsed_secs() * PULSE_RATE).sin() * PULSE_DEPTH
    } else {
        1.0
    };
    ui_transform.scale = Vec2::splat(scale);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DateResponse;

    #[test]
    fn space_follows_the_phase_panel() {
        assert_eq!(shortcut_for(GamePhase::Menu), Some(PanelButton::Start));
        assert_eq!(
            shortcut_for(GamePhase::LevelComplete),
            Some(PanelButton::NextStage)
        );
        assert_eq!(shortcut_for(GamePhase::GameOver), Some(PanelButton::TryAgain));
        assert_eq!(shortcut_for(GamePhase::Playing), None);
    }

    #[test]
    fn panel_buttons_drive_the_store() {
        let mut store = GameStore::default();
        apply(&mut store, PanelButton::Start);
        assert_eq!(store.phase(), GamePhase::Playing);

        store.game_over();
        apply(&mut store, PanelButton::TryAgain);
        assert_eq!(store.phase(), GamePhase::Playing);
        assert_eq!(store.stage(), 1);

        store.complete_level();
        apply(&mut store, PanelButton::NextStage);
        assert_eq!(store.phase(), GamePhase::Playing);
        assert_eq!(store.stage(), PROPOSAL_STAGE);
    }

    #[test]
    fn choice_help_hides_once_accepted() {
        let mut store = GameStore::default();
        store.start();
        assert!(!choice_help_visible(&store));
        store.next_stage();
        assert!(choice_help_visible(&store));
        store.handle_date_response(DateResponse::Yes);
        assert!(!choice_help_visible(&store));
    }

    #[test]
    fn giving_up_shows_the_game_over_panel() {
        let mut store = GameStore::default();
        store.start();
        store.game_over();
        assert_eq!(store.phase(), GamePhase::GameOver);
        assert_eq!(shortcut_for(store.phase()), Some(PanelButton::TryAgain));
    }

    #[test]
    fn banner_prefers_messages_over_the_prompt() {
        let mut store = GameStore::default();
        assert_eq!(banner_text(&store), None);

        store.start();
        store.next_stage();
        assert_eq!(banner_text(&store), Some(PROPOSAL_PROMPT));

        store.handle_date_response(DateResponse::No);
        assert_ne!(banner_text(&store), Some(PROPOSAL_PROMPT));
        assert!(store.message_visible());
    }
}
