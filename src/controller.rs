// Third-person duck controller: impulse movement, speed cap, jumping, facing,
// fall recovery, and the trailing camera.
use std::f32::consts::{PI, TAU};
use std::time::Duration;

use avian3d::prelude::*;
use bevy::prelude::*;

use crate::input::Actions;
use crate::phase::{FIRST_STAGE, GamePhase, PROPOSAL_STAGE, Stage};
use crate::store::{GameStore, spawn_point};

pub struct ControllerPlugin;

impl Plugin for ControllerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ControllerConfig>()
            .add_systems(Startup, (spawn_player, spawn_camera))
            .add_systems(
                FixedUpdate,
                (
                    apply_teleport,
                    drive_character.run_if(in_state(GamePhase::Playing)),
                )
                    .chain(),
            )
            .add_systems(Update, (pose_duck, follow_camera));
    }
}

pub const FALL_THRESHOLD_Y: f32 = -1.0;
pub const STAGE_RADIUS: f32 = 10.0;
/// How far past the stage edge the player may drift before it counts as a fall.
pub const FALL_MARGIN: f32 = 5.0;
pub const FALL_COOLDOWN: Duration = Duration::from_secs(2);
pub const FALL_MESSAGE: &str = "Oops I think you fell! \n cafeFell for me :3";

const CAMERA_OFFSET: Vec3 = Vec3::new(0.0, 5.0, 8.0);
const CAMERA_LOOK_LIFT: f32 = 0.5;
const CAMERA_SMOOTHING: f32 = 5.0;
const CAMERA_START: Vec3 = Vec3::new(10.0, 10.0, 10.0);

const WOBBLE_FREQUENCY: f32 = 10.0;
const WOBBLE_AMPLITUDE: f32 = 0.1;
const WOBBLE_DECAY: f32 = 5.0;
/// Horizontal speed on either axis above which the duck waddles.
const WOBBLE_SPEED: f32 = 0.1;
const MODEL_OFFSET: f32 = -0.5;
const WADDLE_HEIGHT: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageTuning {
    /// Impulse per second of held direction.
    pub move_strength: f32,
    pub max_speed: f32,
    pub jump_impulse: f32,
}

#[derive(Resource, Debug, Clone)]
pub struct ControllerConfig {
    pub default_stage: StageTuning,
    /// The proposal pedestal is small, so movement is toned down there.
    pub proposal_stage: StageTuning,
    pub rotation_speed: f32,
    pub grounded_epsilon: f32,
    pub body_mass: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            default_stage: StageTuning {
                move_strength: 12.0,
                max_speed: 3.0,
                jump_impulse: 2.5,
            },
            proposal_stage: StageTuning {
                move_strength: 12.0,
                max_speed: 2.0,
                jump_impulse: 1.5,
            },
            rotation_speed: 5.0,
            grounded_epsilon: 0.1,
            body_mass: 1.0,
        }
    }
}

impl ControllerConfig {
    pub fn tuning(&self, stage: Stage) -> StageTuning {
        if stage == PROPOSAL_STAGE {
            self.proposal_stage
        } else {
            self.default_stage
        }
    }
}

#[derive(Component)]
pub struct Player;

/// Facing state carried between ticks.
#[derive(Component, Default)]
pub struct Facing {
    pub yaw: f32,
    /// Forward tilt from the waddle.
    pub tilt: f32,
}

#[derive(Component)]
struct DuckModel;

/// Smoothed camera placement, kept apart from the camera transform so the
/// look-at target can lag as well.
#[derive(Component)]
pub struct FollowCamera {
    position: Vec3,
    target: Vec3,
}

/// Outcome of one movement tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorStep {
    pub velocity: Vec3,
    pub impulse: Vec3,
    pub grounded: bool,
    pub jumped: bool,
}

/// Horizontal impulse for the held directions, scaled by tick length.
pub fn movement_impulse(actions: &Actions, strength: f32, dt: f32) -> Vec3 {
    let step = strength * dt;
    let mut impulse = Vec3::ZERO;
    if actions.forward {
        impulse.z -= step;
    }
    if actions.backward {
        impulse.z += step;
    }
    if actions.leftward {
        impulse.x -= step;
    }
    if actions.rightward {
        impulse.x += step;
    }
    impulse
}

/// Rescales x/z down to `cap`; y is untouched.
pub fn clamp_horizontal_speed(velocity: Vec3, cap: f32) -> Vec3 {
    let horizontal = Vec2::new(velocity.x, velocity.z);
    let speed = horizontal.length();
    if speed <= cap {
        return velocity;
    }
    let scaled = horizontal * (cap / speed);
    Vec3::new(scaled.x, velocity.y, scaled.y)
}

/// Near-zero vertical speed stands in for ground contact.
pub fn is_grounded(velocity: Vec3, epsilon: f32) -> bool {
    velocity.y.abs() < epsilon
}

pub fn step_motor(
    actions: &Actions,
    velocity: Vec3,
    dt: f32,
    tuning: &StageTuning,
    config: &ControllerConfig,
) -> MotorStep {
    let impulse = movement_impulse(actions, tuning.move_strength, dt);
    let mut velocity = clamp_horizontal_speed(velocity + impulse / config.body_mass, tuning.max_speed);
    let mut grounded = is_grounded(velocity, config.grounded_epsilon);

    let mut jumped = false;
    if actions.jump && grounded {
        velocity.y += tuning.jump_impulse / config.body_mass;
        grounded = false;
        jumped = true;
    }

    MotorStep {
        velocity,
        impulse,
        grounded,
        jumped,
    }
}

/// Moves `current` toward `target` by fraction `t`, never the long way round.
pub fn turn_towards(current: f32, target: f32, t: f32) -> f32 {
    let current = current.rem_euclid(TAU);
    let mut delta = target - current;
    if delta > PI {
        delta -= TAU;
    }
    if delta < -PI {
        delta += TAU;
    }
    current + delta * t.clamp(0.0, 1.0)
}

pub fn wobble(tilt: f32, velocity: Vec3, elapsed: f32, dt: f32) -> f32 {
    if velocity.x.abs() > WOBBLE_SPEED || velocity.z.abs() > WOBBLE_SPEED {
        (elapsed * WOBBLE_FREQUENCY).sin() * WOBBLE_AMPLITUDE
    } else {
        tilt.lerp(0.0, (dt * WOBBLE_DECAY).min(1.0))
    }
}

/// Vertical bob of the duck model; only while walking on the ground.
pub fn waddle(moving: bool, on_floor: bool, elapsed: f32) -> f32 {
    if moving && on_floor {
        (elapsed * WOBBLE_FREQUENCY * 2.0).sin().abs() * WADDLE_HEIGHT
    } else {
        0.0
    }
}

/// Exponential approach; `rate * dt` is clamped so it never overshoots.
pub fn smooth_towards(current: Vec3, target: Vec3, rate: f32, dt: f32) -> Vec3 {
    current.lerp(target, (rate * dt).clamp(0.0, 1.0))
}

pub fn has_fallen_off(position: Vec3) -> bool {
    let from_centre = Vec2::new(position.x, position.z).length();
    position.y <= FALL_THRESHOLD_Y || from_centre > STAGE_RADIUS + FALL_MARGIN
}

/// Respawns the player once per fall. Returns true when it fired.
pub fn detect_fall(store: &mut GameStore, position: Vec3) -> bool {
    if !has_fallen_off(position) || !store.mark_fallen(FALL_COOLDOWN) {
        return false;
    }
    info!("player fell at {position}, respawning");
    store.reset_player_position(FALL_MESSAGE);
    true
}

fn spawn_player(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let feathers = materials.add(Color::srgb(1.0, 0.85, 0.2));
    let beak = materials.add(Color::srgb(1.0, 0.5, 0.1));

    commands
        .spawn((
            Player,
            Facing::default(),
            Transform::from_translation(spawn_point(FIRST_STAGE)),
            Visibility::default(),
            RigidBody::Dynamic,
            Collider::cylinder(0.3, 1.0),
            Mass(1.0),
            NoAutoMass,
            LockedAxes::ROTATION_LOCKED,
            LinearDamping(4.0),
            AngularDamping(1.0),
            Restitution::new(0.2),
        ))
        .with_children(|parent| {
            parent
                .spawn((DuckModel, Transform::from_xyz(0.0, MODEL_OFFSET, 0.0), Visibility::default()))
                .with_children(|duck| {
                    duck.spawn((
                        Mesh3d(meshes.add(Sphere::new(0.35))),
                        MeshMaterial3d(feathers.clone()),
                        Transform::from_xyz(0.0, 0.35, 0.0).with_scale(Vec3::new(1.0, 0.85, 1.2)),
                    ));
                    duck.spawn((
                        Mesh3d(meshes.add(Sphere::new(0.22))),
                        MeshMaterial3d(feathers.clone()),
                        Transform::from_xyz(0.0, 0.8, 0.15),
                    ));
                    duck.spawn((
                        Mesh3d(meshes.add(Cone {
                            radius: 0.08,
                            height: 0.2,
                        })),
                        MeshMaterial3d(beak),
                        Transform::from_xyz(0.0, 0.78, 0.42)
                            .with_rotation(Quat::from_rotation_x(PI / 2.0)),
                    ));
                });
        });
}

fn spawn_camera(mut commands: Commands) {
    commands.spawn((
        Camera3d::default(),
        Projection::from(PerspectiveProjection {
            fov: 42.0_f32.to_radians(),
            ..default()
        }),
        FollowCamera {
            position: CAMERA_START,
            target: Vec3::ZERO,
        },
        Transform::from_translation(CAMERA_START).looking_at(Vec3::ZERO, Vec3::Y),
    ));
}

fn apply_teleport(
    mut store: ResMut<GameStore>,
    mut player: Query<(&mut Transform, &mut LinearVelocity, &mut Facing), With<Player>>,
) {
    let Ok((mut transform, mut velocity, mut facing)) = player.single_mut() else {
        return;
    };
    let Some(target) = store.take_teleport() else {
        return;
    };
    transform.translation = target;
    velocity.0 = Vec3::ZERO;
    *facing = Facing::default();
}

fn drive_character(
    actions: Res<Actions>,
    config: Res<ControllerConfig>,
    time: Res<Time>,
    mut store: ResMut<GameStore>,
    mut player: Query<(&Transform, &mut LinearVelocity, &mut Facing), With<Player>>,
) {
    // No body yet: skip the tick and try again next frame.
    let Ok((transform, mut velocity, mut facing)) = player.single_mut() else {
        return;
    };

    let dt = time.delta_secs();
    let tuning = config.tuning(store.stage());
    let step = step_motor(&actions, velocity.0, dt, &tuning, &config);
    velocity.0 = step.velocity;
    if step.jumped {
        debug!("jump at {}", transform.translation);
    }

    if step.impulse.x != 0.0 || step.impulse.z != 0.0 {
        let heading = step.impulse.x.atan2(step.impulse.z);
        facing.yaw = turn_towards(facing.yaw, heading, dt * config.rotation_speed);
    }
    facing.tilt = wobble(facing.tilt, step.velocity, time.elapsed_secs(), dt);

    let position = transform.translation;
    store.set_player_position(position);
    store.set_player_rotation(Vec3::new(facing.tilt, facing.yaw, 0.0));
    store.set_is_moving(actions.any_direction());
    store.set_on_floor(step.grounded);
    store.check_goal();
    detect_fall(&mut store, position);
}

fn pose_duck(
    time: Res<Time>,
    store: Res<GameStore>,
    mut model: Query<&mut Transform, With<DuckModel>>,
) {
    let Ok(mut transform) = model.single_mut() else {
        return;
    };
    let player = store.player();
    transform.rotation = Quat::from_euler(EulerRot::YXZ, player.rotation.y, player.rotation.x, 0.0);
    transform.translation.y =
        MODEL_OFFSET + waddle(player.is_moving, player.is_on_floor, time.elapsed_secs());
}

fn follow_camera(
    time: Res<Time>,
    player: Query<&Transform, (With<Player>, Without<FollowCamera>)>,
    mut camera: Query<(&mut Transform, &mut FollowCamera)>,
) {
    let Ok(player) = player.single() else {
        return;
    };
    let Ok((mut transform, mut follow)) = camera.single_mut() else {
        return;
    };

    let dt = time.delta_secs();
    let desired = player.translation + CAMERA_OFFSET;
    let look_at = player.translation + Vec3::Y * CAMERA_LOOK_LIFT;
    follow.position = smooth_towards(follow.position, desired, CAMERA_SMOOTHING, dt);
    follow.target = smooth_towards(follow.target, look_at, CAMERA_SMOOTHING, dt);

    *transform = Transform::from_translation(follow.position).looking_at(follow.target, Vec3::Y);
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn held(forward: bool, backward: bool, leftward: bool, rightward: bool) -> Actions {
        Actions {
            forward,
            backward,
            leftward,
            rightward,
            jump: false,
        }
    }

    #[test]
    fn horizontal_speed_never_exceeds_cap() {
        let config = ControllerConfig::default();
        for stage in [FIRST_STAGE, PROPOSAL_STAGE] {
            let tuning = config.tuning(stage);
            for mask in 0..16u8 {
                let actions = held(mask & 1 != 0, mask & 2 != 0, mask & 4 != 0, mask & 8 != 0);
                let mut velocity = Vec3::new(0.0, -0.5, 0.0);
                for _ in 0..600 {
                    velocity = step_motor(&actions, velocity, DT, &tuning, &config).velocity;
                    let speed = Vec2::new(velocity.x, velocity.z).length();
                    assert!(speed <= tuning.max_speed + 1e-4, "stage {stage} mask {mask}: {speed}");
                }
            }
        }
    }

    #[test]
    fn clamp_keeps_vertical_component() {
        let clamped = clamp_horizontal_speed(Vec3::new(6.0, -4.0, 8.0), 3.0);
        assert!((Vec2::new(clamped.x, clamped.z).length() - 3.0).abs() < 1e-5);
        assert_eq!(clamped.y, -4.0);
        assert!((clamped.x / clamped.z - 0.75).abs() < 1e-5);
    }

    #[test]
    fn jump_only_from_the_ground_and_only_once() {
        let config = ControllerConfig::default();
        let tuning = config.tuning(FIRST_STAGE);
        let mut actions = Actions::default();
        actions.jump = true;

        let step = step_motor(&actions, Vec3::ZERO, DT, &tuning, &config);
        assert!(step.jumped);
        assert!(!step.grounded);
        assert_eq!(step.velocity.y, 2.5);

        let airborne = step_motor(&actions, step.velocity, DT, &tuning, &config);
        assert!(!airborne.jumped);
        assert_eq!(airborne.velocity.y, step.velocity.y);
    }

    #[test]
    fn proposal_stage_jumps_lower() {
        let config = ControllerConfig::default();
        let mut actions = Actions::default();
        actions.jump = true;
        let low = step_motor(&actions, Vec3::ZERO, DT, &config.tuning(PROPOSAL_STAGE), &config);
        let high = step_motor(&actions, Vec3::ZERO, DT, &config.tuning(FIRST_STAGE), &config);
        assert!(low.velocity.y < high.velocity.y);
    }

    #[test]
    fn impulse_scales_with_tick_length() {
        let actions = held(true, false, false, true);
        let short = movement_impulse(&actions, 12.0, 0.01);
        let long = movement_impulse(&actions, 12.0, 0.02);
        assert!((long - short * 2.0).length() < 1e-6);
        assert!(short.z < 0.0 && short.x > 0.0);
        assert_eq!(movement_impulse(&held(true, true, false, false), 12.0, 0.1), Vec3::ZERO);
    }

    #[test]
    fn turning_takes_the_short_way() {
        // From just past zero toward just below a full turn: go backwards.
        let turned = turn_towards(0.1, -0.1, 0.5);
        assert!((turned - 0.0).abs() < 1e-5);

        let turned = turn_towards(3.0, -3.0, 1.0);
        assert!((turned.rem_euclid(TAU) - (-3.0f32).rem_euclid(TAU)).abs() < 1e-4);
        assert!(turned > 3.0, "should cross PI rather than sweep back through zero");
    }

    #[test]
    fn waddle_only_on_the_ground() {
        assert_eq!(waddle(false, true, 0.3), 0.0);
        assert_eq!(waddle(true, false, 0.3), 0.0);
        let bob = waddle(true, true, 0.3);
        assert!(bob > 0.0 && bob <= WADDLE_HEIGHT);
    }

    #[test]
    fn wobble_settles_when_still() {
        let mut tilt = 0.1;
        for _ in 0..120 {
            tilt = wobble(tilt, Vec3::new(0.0, -1.0, 0.05), 0.0, DT);
        }
        assert!(tilt.abs() < 1e-3);
        let moving = wobble(0.0, Vec3::new(1.0, 0.0, 0.0), 0.05, DT);
        assert!((moving - (0.5f32).sin() * 0.1).abs() < 1e-6);
    }

    #[test]
    fn camera_smoothing_approaches_without_overshoot() {
        let target = Vec3::new(0.0, 5.0, 8.0);
        let mut camera = CAMERA_START;
        let mut last = camera.distance(target);
        for _ in 0..60 {
            camera = smooth_towards(camera, target, CAMERA_SMOOTHING, DT);
            let distance = camera.distance(target);
            assert!(distance < last);
            last = distance;
        }
        let snapped = smooth_towards(camera, target, CAMERA_SMOOTHING, 1.0);
        assert!(snapped.distance(target) < 1e-5);
    }

    #[test]
    fn fall_bounds() {
        assert!(has_fallen_off(Vec3::new(0.0, -1.0, 0.0)));
        assert!(has_fallen_off(Vec3::new(12.0, 1.0, 12.0)));
        assert!(!has_fallen_off(Vec3::new(10.0, 0.5, 0.0)));
    }

    #[test]
    fn fall_respawns_once_per_cooldown() {
        let mut store = GameStore::default();
        store.start();
        let below = Vec3::new(0.0, -2.0, 0.0);

        let fired = (0..10).filter(|_| detect_fall(&mut store, below)).count();
        assert_eq!(fired, 1);
        assert_eq!(store.take_teleport(), Some(spawn_point(FIRST_STAGE)));
        assert_eq!(store.take_teleport(), None);
        assert!(store.message_visible());
        assert_eq!(store.message(), FALL_MESSAGE);

        store.advance_timers(FALL_COOLDOWN);
        assert!(detect_fall(&mut store, below));
    }

    #[test]
    fn standing_on_stage_is_not_a_fall() {
        let mut store = GameStore::default();
        store.start();
        assert!(!detect_fall(&mut store, Vec3::new(3.0, 0.5, 3.0)));
        assert!(!store.player().has_fallen);
    }
}
