//! Scene Camera
//!
//! Z-up perspective camera with two modes: an orbit view that starts off to
//! the side of the terrain looking at its centre, and a player view that
//! walks over the terrain at a fixed eye height.
//!
//! Window-system agnostic: input arrives as deltas.

use glam::{Mat4, Quat, Vec3};

use crate::terrain::{HeightSampler, NO_HEIGHT};

/// Player eye is kept this far above the queried ground height.
pub const PLAYER_EYE_HEIGHT: f32 = 30.0;

/// Where the orbit view starts.
pub const ORBIT_START_POSITION: Vec3 = Vec3::new(-512.0, -794.0, 208.0);

/// Where the player view starts.
pub const PLAYER_START_POSITION: Vec3 = Vec3::new(0.0, 0.0, 208.0);

/// Pitch limit constant: -89 degrees in radians
const PITCH_LIMIT_MIN: f32 = -89.0 * std::f32::consts::PI / 180.0;
/// Pitch limit constant: +89 degrees in radians
const PITCH_LIMIT_MAX: f32 = 89.0 * std::f32::consts::PI / 180.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CameraMode {
    /// Circles the scene centre.
    #[default]
    Orbit,
    /// Walks over the terrain.
    Player,
}

/// Perspective camera with +Z up.
#[derive(Clone, Debug)]
pub struct SceneCamera {
    pub position: Vec3,
    /// Heading around +Z (radians), 0 looks toward +X
    pub yaw: f32,
    /// Elevation (radians), clamped to ±89°
    pub pitch: f32,
    /// Vertical field of view (radians)
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    /// Player walking speed (units per second)
    pub move_speed: f32,
    /// Radians per pixel of mouse movement
    pub look_sensitivity: f32,
    /// Point the orbit view circles
    pub orbit_target: Vec3,
    mode: CameraMode,
}

impl SceneCamera {
    /// Orbit view at [`ORBIT_START_POSITION`] looking at the origin.
    pub fn new(aspect: f32) -> Self {
        let mut camera = Self {
            position: ORBIT_START_POSITION,
            yaw: 0.0,
            pitch: 0.0,
            fov: 60.0_f32.to_radians(),
            aspect,
            near: 1.0,
            far: 20_000.0,
            move_speed: 120.0,
            look_sensitivity: 0.003,
            orbit_target: Vec3::ZERO,
            mode: CameraMode::Orbit,
        };
        camera.look_at(Vec3::ZERO);
        camera
    }

    pub fn mode(&self) -> CameraMode {
        self.mode
    }

    /// Update the aspect ratio after a resize. Zero-sized windows are ignored.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    /// Switch to the player view at [`PLAYER_START_POSITION`], looking level.
    pub fn enter_player_view(&mut self) {
        if self.mode == CameraMode::Player {
            return;
        }
        self.mode = CameraMode::Player;
        self.position = PLAYER_START_POSITION;
        self.pitch = 0.0;
        log::info!("[SceneCamera] switched to player view");
    }

    #[inline]
    pub fn forward(&self) -> Vec3 {
        Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.yaw.sin() * self.pitch.cos(),
            self.pitch.sin(),
        )
        .normalize()
    }

    /// Horizontal right vector.
    #[inline]
    pub fn right(&self) -> Vec3 {
        Vec3::new(self.yaw.sin(), -self.yaw.cos(), 0.0)
    }

    /// Point the camera at `target`.
    pub fn look_at(&mut self, target: Vec3) {
        let to_target = target - self.position;
        let distance = to_target.length();

        if distance > 0.001 {
            self.yaw = to_target.y.atan2(to_target.x);
            self.pitch = (to_target.z / distance)
                .asin()
                .clamp(PITCH_LIMIT_MIN, PITCH_LIMIT_MAX);
        }
    }

    /// Mouse look. Positive `dx` turns right, positive `dy` looks down.
    pub fn apply_mouse_delta(&mut self, dx: f32, dy: f32) {
        self.yaw -= dx * self.look_sensitivity;
        self.pitch = (self.pitch - dy * self.look_sensitivity).clamp(PITCH_LIMIT_MIN, PITCH_LIMIT_MAX);
    }

    /// Rotate the orbit view around `orbit_target` by `angle` radians.
    /// No effect in player view.
    pub fn orbit(&mut self, angle: f32) {
        if self.mode != CameraMode::Orbit {
            return;
        }
        let offset = self.position - self.orbit_target;
        self.position = self.orbit_target + Quat::from_rotation_z(angle) * offset;
        self.look_at(self.orbit_target);
    }

    /// Walk in the horizontal plane. `forward` and `right` are in [-1, 1].
    /// No effect in orbit view.
    pub fn walk(&mut self, forward: f32, right: f32, delta_time: f32) {
        if self.mode != CameraMode::Player {
            return;
        }
        let heading = Vec3::new(self.yaw.cos(), self.yaw.sin(), 0.0);
        let step = (heading * forward + self.right() * right) * self.move_speed * delta_time;
        self.position += step;
    }

    /// In player view, put the eye [`PLAYER_EYE_HEIGHT`] above the ground.
    ///
    /// Returns false, leaving the eye where it was, when not in player view
    /// or when the ground is unknown at the current position.
    pub fn follow_terrain(&mut self, ground: &dyn HeightSampler) -> bool {
        if self.mode != CameraMode::Player {
            return false;
        }
        let height = ground.sample_height(self.position.x, self.position.y);
        if height == NO_HEIGHT {
            return false;
        }
        self.position.z = height + PLAYER_EYE_HEIGHT;
        true
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), Vec3::Z)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}
