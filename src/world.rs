// Level construction and the read-only presentation of puzzle state.
// Scenery is spawned once; stage entities are rebuilt whenever the store's
// layout revision changes.
use std::f32::consts::PI;

use avian3d::prelude::*;
use bevy::ecs::system::EntityCommands;
use bevy::prelude::*;
use fast_poisson::Poisson2D;
use rand::Rng;

use crate::controller::STAGE_RADIUS;
use crate::phase::{FIRST_STAGE, PROPOSAL_STAGE};
use crate::sensors::{ChoiceButton, OverlapCounter, PuzzleButton, TrackedCrate};
use crate::store::puzzle::{Puzzle, TriggerKind};
use crate::store::{DateResponse, GameStore, PEDESTAL_HEIGHT, PEDESTAL_RADIUS};

pub struct WorldPlugin;

impl Plugin for WorldPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(ClearColor(SKY_COLOUR))
            .insert_resource(GlobalAmbientLight {
                color: Color::WHITE,
                brightness: 400.0,
                affects_lightmapped_meshes: true,
            })
            .init_resource::<BuiltLayout>()
            .add_systems(Startup, (load_level_assets, spawn_scenery))
            .add_systems(
                Update,
                (
                    rebuild_level,
                    (
                        animate_doors,
                        animate_plates,
                        light_buttons,
                        tint_choices,
                        hover_goal,
                    ),
                )
                    .chain(),
            );
    }
}

pub const SKY_COLOUR: Color = Color::srgb(0.647, 0.847, 1.0);

const DOOR_LIFT: f32 = 3.0;
const DOOR_SPEED: f32 = 0.05;
const PLATE_REST: f32 = 0.1;
const PLATE_SUNK: f32 = 0.05;
const PLATE_SPEED: f32 = 0.2;
const GOAL_HOVER: f32 = 0.3;
const GOAL_SPEED: f32 = 0.5;

const CRATE_SIZE: f32 = 0.8;
const BUTTON_RADIUS: f32 = 0.5;
const BUTTON_HEIGHT: f32 = 0.2;
const CHOICE_RADIUS: f32 = 0.8;

/// Loose crates stacked around the stage; they push around but press nothing.
const PROP_CRATES: [Vec3; 8] = [
    Vec3::new(-4.0, 0.5, -3.0),
    Vec3::new(-4.0, 1.5, -3.0),
    Vec3::new(5.0, 0.5, 5.0),
    Vec3::new(5.0, 1.5, 5.0),
    Vec3::new(5.0, 2.5, 5.0),
    Vec3::new(0.0, 0.5, 6.0),
    Vec3::new(2.0, 0.5, 6.0),
    Vec3::new(-2.0, 0.5, 6.0),
];

#[derive(Clone, Copy)]
enum TreeKind {
    Pine,
    Oak,
    Willow,
}

const TREES: [(TreeKind, Vec3); 6] = [
    (TreeKind::Pine, Vec3::new(-5.0, 0.0, -5.0)),
    (TreeKind::Oak, Vec3::new(6.0, 0.0, 1.0)),
    (TreeKind::Willow, Vec3::new(7.0, 0.0, -4.0)),
    (TreeKind::Pine, Vec3::new(-7.0, 0.0, 2.0)),
    (TreeKind::Oak, Vec3::new(0.0, 0.0, -7.0)),
    (TreeKind::Willow, Vec3::new(8.0, 0.0, 3.0)),
];

/// (patch count, radius, centre) for each grass field.
const GRASS_FIELDS: [(usize, f32, Vec2); 5] = [
    (50, STAGE_RADIUS - 2.0, Vec2::ZERO),
    (15, 3.0, Vec2::new(2.0, 4.0)),
    (12, 2.5, Vec2::new(-4.0, 2.0)),
    (18, 3.2, Vec2::new(3.0, -3.0)),
    (10, 2.0, Vec2::new(-3.0, -4.0)),
];
const BLADES_PER_PATCH: usize = 5;

const YES_BUTTON: Vec3 = Vec3::new(-1.5, PEDESTAL_HEIGHT, -1.0);
const NO_BUTTON: Vec3 = Vec3::new(1.5, PEDESTAL_HEIGHT, -1.0);

/// Marks everything owned by the current stage layout.
#[derive(Component)]
struct LevelEntity;

/// Layout revision the spawned level was built from.
#[derive(Resource, Default)]
struct BuiltLayout(Option<u32>);

#[derive(Component)]
struct DoorPanel {
    id: &'static str,
    closed_y: f32,
}

#[derive(Component)]
struct PlateTop {
    id: &'static str,
    base_y: f32,
}

#[derive(Component)]
struct GoalOrb {
    base_y: f32,
}

#[derive(Resource)]
struct LevelAssets {
    crate_mesh: Handle<Mesh>,
    crate_material: Handle<StandardMaterial>,
    plate_base: Handle<Mesh>,
    plate_top: Handle<Mesh>,
    button_base: Handle<Mesh>,
    button_top: Handle<Mesh>,
    choice_base: Handle<Mesh>,
    choice_top: Handle<Mesh>,
    door_post: Handle<Mesh>,
    door_lintel: Handle<Mesh>,
    door_panel: Handle<Mesh>,
    goal_base: Handle<Mesh>,
    goal_orb: Handle<Mesh>,
    goal_spark: Handle<Mesh>,
    pedestal: Handle<Mesh>,
    stone: Handle<StandardMaterial>,
    plate_idle: Handle<StandardMaterial>,
    plate_pressed: Handle<StandardMaterial>,
    button_idle: Handle<StandardMaterial>,
    button_active: Handle<StandardMaterial>,
    frame: Handle<StandardMaterial>,
    door: Handle<StandardMaterial>,
    goal_green: Handle<StandardMaterial>,
    gold: Handle<StandardMaterial>,
    pedestal_material: Handle<StandardMaterial>,
    yes: Handle<StandardMaterial>,
    no: Handle<StandardMaterial>,
}

fn load_level_assets(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let gold = materials.add(StandardMaterial {
        base_color: Color::srgb(1.0, 0.843, 0.0),
        emissive: LinearRgba::rgb(0.5, 0.42, 0.0),
        ..default()
    });

    commands.insert_resource(LevelAssets {
        crate_mesh: meshes.add(Cuboid::from_length(CRATE_SIZE)),
        crate_material: materials.add(Color::srgb(0.62, 0.42, 0.22)),
        plate_base: meshes.add(Cuboid::new(1.2, 0.1, 1.2)),
        plate_top: meshes.add(Cuboid::new(1.0, 0.1, 1.0)),
        button_base: meshes.add(Cylinder::new(BUTTON_RADIUS, BUTTON_HEIGHT)),
        button_top: meshes.add(Cylinder::new(BUTTON_RADIUS - 0.1, 0.1)),
        choice_base: meshes.add(Cylinder::new(CHOICE_RADIUS, 0.1)),
        choice_top: meshes.add(Cylinder::new(CHOICE_RADIUS - 0.1, 0.1)),
        door_post: meshes.add(Cuboid::new(0.25, 3.0, 0.2)),
        door_lintel: meshes.add(Cuboid::new(1.5, 0.25, 0.2)),
        door_panel: meshes.add(Cuboid::new(1.0, 2.0, 0.2)),
        goal_base: meshes.add(Cylinder::new(1.5, 0.2)),
        goal_orb: meshes.add(Sphere::new(0.7)),
        goal_spark: meshes.add(Sphere::new(0.15)),
        pedestal: meshes.add(Cylinder::new(PEDESTAL_RADIUS, PEDESTAL_HEIGHT)),
        stone: materials.add(Color::srgb_u8(0x55, 0x55, 0x55)),
        plate_idle: materials.add(Color::srgb_u8(0x88, 0x88, 0x88)),
        plate_pressed: materials.add(Color::srgb(1.0, 0.0, 0.0)),
        button_idle: materials.add(Color::srgb(1.0, 0.0, 0.0)),
        button_active: materials.add(Color::srgb(0.0, 1.0, 0.0)),
        frame: materials.add(Color::srgb_u8(0x8b, 0x45, 0x13)),
        door: materials.add(Color::srgb_u8(0xa0, 0x52, 0x2d)),
        goal_green: materials.add(Color::srgb_u8(0x4c, 0xaf, 0x50)),
        gold,
        pedestal_material: materials.add(Color::srgb_u8(0x77, 0x77, 0x77)),
        yes: materials.add(Color::srgb(0.0, 1.0, 0.0)),
        no: materials.add(Color::srgb(1.0, 0.0, 0.0)),
    });
}

fn spawn_scenery(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    // Stage disk, top face at y = 0.
    commands.spawn((
        Mesh3d(meshes.add(Cylinder::new(STAGE_RADIUS, 1.0))),
        MeshMaterial3d(materials.add(Color::srgb_u8(0x53, 0x8d, 0x4e))),
        Transform::from_xyz(0.0, -0.5, 0.0),
        RigidBody::Static,
        Collider::cylinder(STAGE_RADIUS, 1.0),
    ));

    // Water below the stage; it has no collider so falling through is a fall.
    commands.spawn((
        Mesh3d(meshes.add(Plane3d::default().mesh().size(50.0, 50.0))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgba_u8(0x4d, 0x80, 0xe4, 204),
            metallic: 0.2,
            perceptual_roughness: 0.7,
            alpha_mode: AlphaMode::Blend,
            ..default()
        })),
        Transform::from_xyz(0.0, -1.0, 0.0),
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: 8_000.0,
            color: SKY_COLOUR,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(5.0, 8.0, 5.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    let trunk_mesh = meshes.add(Cylinder::new(0.2, 1.5));
    let trunk = materials.add(Color::srgb_u8(0x6b, 0x42, 0x26));
    let pine_mesh = meshes.add(Cone {
        radius: 1.0,
        height: 2.5,
    });
    let round_mesh = meshes.add(Sphere::new(1.1));
    let pine = materials.add(Color::srgb_u8(0x2e, 0x6b, 0x3a));
    let oak = materials.add(Color::srgb_u8(0x4a, 0x8c, 0x2e));
    let willow = materials.add(Color::srgb_u8(0x7a, 0xa8, 0x4c));

    for (kind, position) in TREES {
        let (crown_mesh, crown_material, crown_scale) = match kind {
            TreeKind::Pine => (pine_mesh.clone(), pine.clone(), Vec3::ONE),
            TreeKind::Oak => (round_mesh.clone(), oak.clone(), Vec3::ONE),
            TreeKind::Willow => (round_mesh.clone(), willow.clone(), Vec3::new(1.0, 1.4, 1.0)),
        };
        commands
            .spawn((
                Transform::from_translation(position),
                Visibility::default(),
                RigidBody::Static,
            ))
            .with_children(|tree| {
                tree.spawn((
                    Transform::from_xyz(0.0, 1.5, 0.0),
                    Collider::cuboid(1.0, 3.0, 1.0),
                ));
                tree.spawn((
                    Mesh3d(trunk_mesh.clone()),
                    MeshMaterial3d(trunk.clone()),
                    Transform::from_xyz(0.0, 0.75, 0.0),
                ));
                tree.spawn((
                    Mesh3d(crown_mesh),
                    MeshMaterial3d(crown_material),
                    Transform::from_xyz(0.0, 2.6, 0.0).with_scale(crown_scale),
                ));
            });
    }

    spawn_grass(&mut commands, &mut meshes, &mut materials);
}

fn spawn_grass(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
) {
    let mut rng = rand::rng();
    let blade = meshes.add(Cuboid::new(0.05, 0.3, 0.05));
    let palette: Vec<Handle<StandardMaterial>> = (0..6)
        .map(|_| {
            let hue = rng.random_range(100.0..120.0);
            let saturation = rng.random_range(0.5..0.8);
            let lightness = rng.random_range(0.3..0.5);
            materials.add(Color::hsl(hue, saturation, lightness))
        })
        .collect();

    for (seed, (count, radius, centre)) in GRASS_FIELDS.into_iter().enumerate() {
        let spacing = (radius * 2.0) / (count as f32).sqrt() * 0.6;
        let patches = Poisson2D::new()
            .with_dimensions([radius * 2.0, radius * 2.0], spacing)
            .with_seed(seed as u64 + 7)
            .generate();

        let inside = patches
            .into_iter()
            .map(|[x, z]| Vec2::new(x - radius, z - radius))
            .filter(|offset| offset.length() <= radius)
            .take(count);

        for offset in inside {
            let patch = centre + offset;
            for _ in 0..BLADES_PER_PATCH {
                let angle = rng.random_range(0.0..PI * 2.0);
                let distance = rng.random_range(0.0..0.2);
                let height = rng.random_range(0.2..0.5);
                let material = palette[rng.random_range(0..palette.len())].clone();
                commands.spawn((
                    Mesh3d(blade.clone()),
                    MeshMaterial3d(material),
                    Transform::from_xyz(
                        patch.x + angle.cos() * distance,
                        0.15 * height / 0.3,
                        patch.y + angle.sin() * distance,
                    )
                    .with_rotation(Quat::from_rotation_y(rng.random_range(0.0..PI * 2.0)))
                    .with_scale(Vec3::new(1.0, height / 0.3, 1.0)),
                ));
            }
        }
    }
}

fn rebuild_level(
    mut commands: Commands,
    store: Res<GameStore>,
    assets: Res<LevelAssets>,
    mut built: ResMut<BuiltLayout>,
    existing: Query<Entity, With<LevelEntity>>,
) {
    let revision = store.layout_revision();
    if built.0 == Some(revision) {
        return;
    }
    built.0 = Some(revision);

    for entity in &existing {
        commands.entity(entity).despawn();
    }

    match store.stage() {
        FIRST_STAGE => spawn_crate_puzzle(&mut commands, &assets, store.puzzle()),
        PROPOSAL_STAGE => spawn_proposal(&mut commands, &assets),
        other => warn!("stage {other} has no layout"),
    }
}

fn spawn_crate_puzzle(commands: &mut Commands, assets: &LevelAssets, puzzle: &Puzzle) {
    for crate_state in &puzzle.crates {
        spawn_crate(commands, assets, crate_state.position)
            .insert(TrackedCrate(crate_state.id));
    }
    for position in PROP_CRATES {
        spawn_crate(commands, assets, position);
    }

    for trigger in &puzzle.triggers {
        let at = trigger.position;
        match trigger.kind {
            TriggerKind::Plate => {
                commands.spawn((
                    LevelEntity,
                    Mesh3d(assets.plate_base.clone()),
                    MeshMaterial3d(assets.stone.clone()),
                    Transform::from_translation(at),
                ));
                commands.spawn((
                    LevelEntity,
                    PlateTop {
                        id: trigger.id,
                        base_y: at.y,
                    },
                    Mesh3d(assets.plate_top.clone()),
                    MeshMaterial3d(assets.plate_idle.clone()),
                    Transform::from_xyz(at.x, at.y + PLATE_REST, at.z),
                ));
            }
            TriggerKind::Button => {
                commands.spawn((
                    LevelEntity,
                    Mesh3d(assets.button_base.clone()),
                    MeshMaterial3d(assets.stone.clone()),
                    Transform::from_xyz(at.x, at.y + BUTTON_HEIGHT / 2.0, at.z),
                    RigidBody::Static,
                    Collider::cylinder(BUTTON_RADIUS, BUTTON_HEIGHT),
                ));
                commands.spawn((
                    LevelEntity,
                    PuzzleButton::new(trigger.id),
                    OverlapCounter::default(),
                    Mesh3d(assets.button_top.clone()),
                    MeshMaterial3d(assets.button_idle.clone()),
                    Transform::from_xyz(at.x, at.y + BUTTON_HEIGHT + 0.05, at.z),
                    RigidBody::Static,
                    Collider::cylinder(BUTTON_RADIUS - 0.1, 0.2),
                    Sensor,
                    CollisionEventsEnabled,
                ));
            }
        }
    }

    for door in &puzzle.doors {
        let at = door.position;
        for side in [-1.0, 1.0] {
            commands.spawn((
                LevelEntity,
                Mesh3d(assets.door_post.clone()),
                MeshMaterial3d(assets.frame.clone()),
                Transform::from_xyz(at.x + side * 0.625, at.y + 1.5, at.z),
                RigidBody::Static,
                Collider::cuboid(0.25, 3.0, 0.2),
            ));
        }
        commands.spawn((
            LevelEntity,
            Mesh3d(assets.door_lintel.clone()),
            MeshMaterial3d(assets.frame.clone()),
            Transform::from_xyz(at.x, at.y + 2.875, at.z),
        ));
        let closed_y = at.y + 1.0;
        commands.spawn((
            LevelEntity,
            DoorPanel {
                id: door.id,
                closed_y,
            },
            Mesh3d(assets.door_panel.clone()),
            MeshMaterial3d(assets.door.clone()),
            Transform::from_xyz(at.x, closed_y, at.z),
            RigidBody::Kinematic,
            Collider::cuboid(1.0, 2.0, 0.2),
        ));
    }

    let goal = puzzle.goal.position;
    commands.spawn((
        LevelEntity,
        Mesh3d(assets.goal_base.clone()),
        MeshMaterial3d(assets.goal_green.clone()),
        Transform::from_xyz(goal.x, goal.y - 0.25, goal.z),
    ));
    commands
        .spawn((
            LevelEntity,
            GoalOrb {
                base_y: goal.y + 0.5,
            },
            Mesh3d(assets.goal_orb.clone()),
            MeshMaterial3d(assets.gold.clone()),
            Transform::from_xyz(goal.x, goal.y + 0.5, goal.z),
        ))
        .with_children(|orb| {
            for i in 0..8 {
                let angle = i as f32 / 8.0 * PI * 2.0;
                orb.spawn((
                    Mesh3d(assets.goal_spark.clone()),
                    MeshMaterial3d(assets.gold.clone()),
                    Transform::from_xyz(angle.cos() * 1.2, 0.0, angle.sin() * 1.2),
                ));
            }
        });
}

fn spawn_crate<'a>(
    commands: &'a mut Commands,
    assets: &LevelAssets,
    position: Vec3,
) -> EntityCommands<'a> {
    commands.spawn((
        LevelEntity,
        Mesh3d(assets.crate_mesh.clone()),
        MeshMaterial3d(assets.crate_material.clone()),
        Transform::from_translation(position),
        RigidBody::Dynamic,
        Collider::cuboid(CRATE_SIZE, CRATE_SIZE, CRATE_SIZE),
        Restitution::new(0.2),
        Friction::new(1.0),
        LinearDamping(0.5),
        AngularDamping(0.5),
    ))
}

fn spawn_proposal(commands: &mut Commands, assets: &LevelAssets) {
    commands.spawn((
        LevelEntity,
        Mesh3d(assets.pedestal.clone()),
        MeshMaterial3d(assets.pedestal_material.clone()),
        Transform::from_xyz(0.0, PEDESTAL_HEIGHT / 2.0, 0.0),
        RigidBody::Static,
        Collider::cylinder(PEDESTAL_RADIUS, PEDESTAL_HEIGHT),
    ));

    for (choice, at) in [(DateResponse::Yes, YES_BUTTON), (DateResponse::No, NO_BUTTON)] {
        commands.spawn((
            LevelEntity,
            Mesh3d(assets.choice_base.clone()),
            MeshMaterial3d(assets.stone.clone()),
            Transform::from_xyz(at.x, at.y + 0.05, at.z),
            RigidBody::Static,
            Collider::cylinder(CHOICE_RADIUS * 1.1, 0.1),
        ));
        commands.spawn((
            LevelEntity,
            ChoiceButton::new(choice),
            OverlapCounter::default(),
            Mesh3d(assets.choice_top.clone()),
            MeshMaterial3d(choice_material(assets, choice)),
            Transform::from_xyz(at.x, at.y + 0.15, at.z),
            RigidBody::Static,
            Collider::cylinder(CHOICE_RADIUS - 0.1, 0.2),
            Sensor,
            CollisionEventsEnabled,
        ));
    }
}

fn choice_material(assets: &LevelAssets, answer: DateResponse) -> Handle<StandardMaterial> {
    match answer {
        DateResponse::Yes => assets.yes.clone(),
        DateResponse::No => assets.no.clone(),
    }
}

fn animate_doors(store: Res<GameStore>, mut doors: Query<(&DoorPanel, &mut Transform)>) {
    for (panel, mut transform) in &mut doors {
        let open = store.puzzle().door(panel.id).is_some_and(|d| d.open);
        let target = panel.closed_y + if open { DOOR_LIFT } else { 0.0 };
        transform.translation.y = transform.translation.y.lerp(target, DOOR_SPEED);
    }
}

fn animate_plates(
    store: Res<GameStore>,
    assets: Res<LevelAssets>,
    mut plates: Query<(&PlateTop, &mut Transform, &mut MeshMaterial3d<StandardMaterial>)>,
) {
    for (plate, mut transform, mut material) in &mut plates {
        let pressed = store.puzzle().trigger(plate.id).is_some_and(|t| t.pressed);
        let target = plate.base_y + if pressed { PLATE_SUNK } else { PLATE_REST };
        transform.translation.y = transform.translation.y.lerp(target, PLATE_SPEED);
        let wanted = if pressed {
            &assets.plate_pressed
        } else {
            &assets.plate_idle
        };
        if material.0 != *wanted {
            material.0 = wanted.clone();
        }
    }
}

fn light_buttons(
    store: Res<GameStore>,
    assets: Res<LevelAssets>,
    mut buttons: Query<(&PuzzleButton, &mut MeshMaterial3d<StandardMaterial>)>,
) {
    for (button, mut material) in &mut buttons {
        let pressed = store.puzzle().trigger(button.id).is_some_and(|t| t.pressed);
        let wanted = if pressed {
            &assets.button_active
        } else {
            &assets.button_idle
        };
        if material.0 != *wanted {
            material.0 = wanted.clone();
        }
    }
}

/// The NO button turns green once it starts answering YES.
fn tint_choices(
    store: Res<GameStore>,
    assets: Res<LevelAssets>,
    mut buttons: Query<(&ChoiceButton, &mut MeshMaterial3d<StandardMaterial>)>,
) {
    for (button, mut material) in &mut buttons {
        let wanted = choice_material(&assets, store.date().effective(button.choice));
        if material.0 != wanted {
            material.0 = wanted;
        }
    }
}

fn hover_goal(time: Res<Time>, mut orbs: Query<(&GoalOrb, &mut Transform)>) {
    let t = time.elapsed_secs();
    for (orb, mut transform) in &mut orbs {
        transform.translation.y = orb.base_y + (t * GOAL_SPEED).sin() * GOAL_HOVER;
        transform.rotation = Quat::from_rotation_y(t * GOAL_SPEED);
    }
}
