//! Procedural Hills
//!
//! Run with: `cargo run --bin hills-scene`
//!
//! Set `HILLS_CONFIG` to a JSON file to override scene settings, and
//! `RUST_LOG` to change the log filter (default `info`).
//!
//! Controls:
//! - F1: Toggle water
//! - F2: Toggle container ground
//! - F3: Toggle moving sun
//! - Tab: Select the next hill value
//! - [ / ]: Lower / raise the selected hill value
//! - Enter: Spawn (switch to the player view)
//! - Q/E: Orbit (orbit view)
//! - WASD: Walk (player view)
//! - Mouse right-drag: Look around
//! - ESC: Exit

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

use hills_engine::camera::CameraMode;
use hills_engine::config::SceneConfig;
use hills_engine::render::WgpuContext;
use hills_engine::scene::{AppScene, HillParameter, SceneEvent, StateBridge, build_scene};

/// Orbit speed for Q/E in radians per second.
const ORBIT_SPEED: f32 = 0.6;
/// Factor applied per [ / ] press.
const HILL_STEP: f32 = 1.25;

// ============================================================================
// INPUT STATE
// ============================================================================

#[derive(Default)]
struct HeldKeys {
    forward: bool,
    backward: bool,
    left: bool,
    right: bool,
    orbit_left: bool,
    orbit_right: bool,
}

impl HeldKeys {
    fn axis(positive: bool, negative: bool) -> f32 {
        (positive as i32 - negative as i32) as f32
    }
}

/// UI toggles, mirrored into [`SceneEvent`]s.
struct Toggles {
    water: bool,
    ground: bool,
    moving_sun: bool,
    selected: usize,
}

impl Default for Toggles {
    fn default() -> Self {
        Self {
            water: true,
            ground: true,
            moving_sun: false,
            selected: 0,
        }
    }
}

// ============================================================================
// APP STATE
// ============================================================================

struct AppState {
    window: Arc<Window>,
    gpu: WgpuContext,
    scene: AppScene,
    bridge: StateBridge,
    keys: HeldKeys,
    toggles: Toggles,
    looking: bool,
    last_cursor: Option<(f64, f64)>,
    last_frame: Instant,
}

impl AppState {
    fn new(window: Arc<Window>, config: &SceneConfig) -> Result<Self, String> {
        let mut gpu = WgpuContext::for_window(Arc::clone(&window), config.render.vsync)
            .map_err(|e| e.to_string())?;
        let (mut scene, bridge) = build_scene(&mut gpu, config).map_err(|e| e.to_string())?;

        let size = window.inner_size();
        scene.resize(size.width, size.height);

        Ok(Self {
            window,
            gpu,
            scene,
            bridge,
            keys: HeldKeys::default(),
            toggles: Toggles::default(),
            looking: false,
            last_cursor: None,
            last_frame: Instant::now(),
        })
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        self.gpu.resize(size.width, size.height);
        self.scene.resize(size.width, size.height);
    }

    fn apply(&mut self, event: SceneEvent) {
        self.bridge.apply(&mut self.scene, &mut self.gpu, event);
    }

    fn handle_key(&mut self, key: KeyCode, pressed: bool) {
        match key {
            KeyCode::KeyW => self.keys.forward = pressed,
            KeyCode::KeyS => self.keys.backward = pressed,
            KeyCode::KeyA => self.keys.left = pressed,
            KeyCode::KeyD => self.keys.right = pressed,
            KeyCode::KeyQ => self.keys.orbit_left = pressed,
            KeyCode::KeyE => self.keys.orbit_right = pressed,
            _ if !pressed => {}
            KeyCode::F1 => {
                self.toggles.water = !self.toggles.water;
                self.apply(SceneEvent::WaterToggled(self.toggles.water));
            }
            KeyCode::F2 => {
                self.toggles.ground = !self.toggles.ground;
                self.apply(SceneEvent::GroundEnvToggled(self.toggles.ground));
            }
            KeyCode::F3 => {
                self.toggles.moving_sun = !self.toggles.moving_sun;
                self.apply(SceneEvent::MovingSunToggled(self.toggles.moving_sun));
            }
            KeyCode::Tab => {
                self.toggles.selected = (self.toggles.selected + 1) % HillParameter::ALL.len();
                log::info!(
                    "[HillsScene] selected {:?}",
                    HillParameter::ALL[self.toggles.selected]
                );
            }
            KeyCode::BracketLeft => self.step_hill_value(1.0 / HILL_STEP),
            KeyCode::BracketRight => self.step_hill_value(HILL_STEP),
            KeyCode::Enter => self.apply(SceneEvent::Spawned),
            _ => {}
        }
    }

    fn step_hill_value(&mut self, factor: f32) {
        let parameter = HillParameter::ALL[self.toggles.selected];
        let Some(value) = self.bridge.hill_value(&self.scene, parameter) else {
            return;
        };
        let value = value * factor;
        log::info!("[HillsScene] {parameter:?} = {value}");
        self.apply(SceneEvent::HillValueChanged(parameter, value));
    }

    fn handle_mouse_move(&mut self, x: f64, y: f64) {
        if let (true, Some((last_x, last_y))) = (self.looking, self.last_cursor) {
            self.scene
                .camera_mut()
                .apply_mouse_delta((x - last_x) as f32, (y - last_y) as f32);
        }
        self.last_cursor = Some((x, y));
    }

    fn update(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32().min(0.1);
        self.last_frame = now;

        let camera = self.scene.camera_mut();
        match camera.mode() {
            CameraMode::Orbit => {
                let turn = HeldKeys::axis(self.keys.orbit_right, self.keys.orbit_left);
                camera.orbit(turn * ORBIT_SPEED * dt);
            }
            CameraMode::Player => {
                let forward = HeldKeys::axis(self.keys.forward, self.keys.backward);
                let right = HeldKeys::axis(self.keys.right, self.keys.left);
                camera.walk(forward, right, dt);
            }
        }

        self.scene.tick(&mut self.gpu);
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let camera = self.scene.camera();
        self.gpu.render_frame(
            self.scene.draw_list(),
            self.scene.uniforms(),
            camera.view_proj(),
            camera.position,
        )
    }
}

// ============================================================================
// APPLICATION
// ============================================================================

struct App {
    config: SceneConfig,
    state: Option<AppState>,
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        log::info!("[HillsScene] creating window...");
        let window_attrs = WindowAttributes::default()
            .with_title(self.config.render.title.clone())
            .with_inner_size(PhysicalSize::new(
                self.config.render.width,
                self.config.render.height,
            ));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("[HillsScene] failed to create window: {err}");
                event_loop.exit();
                return;
            }
        };

        match AppState::new(window, &self.config) {
            Ok(state) => {
                state.window.request_redraw();
                self.state = Some(state);
                log::info!("[HillsScene] ready. F1 water, F2 ground, F3 moving sun, Tab/[/] hills, Enter spawn");
            }
            Err(err) => {
                log::error!("[HillsScene] startup failed: {err}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(state) = &mut self.state else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                state.resize(new_size);
            }
            WindowEvent::KeyboardInput {
                event:
                    winit::event::KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: key_state,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                let pressed = key_state == ElementState::Pressed;

                if key == KeyCode::Escape && pressed {
                    event_loop.exit();
                    return;
                }

                state.handle_key(key, pressed);
            }
            WindowEvent::MouseInput {
                button: MouseButton::Right,
                state: btn_state,
                ..
            } => {
                state.looking = btn_state == ElementState::Pressed;
            }
            WindowEvent::CursorMoved { position, .. } => {
                state.handle_mouse_move(position.x, position.y);
            }
            WindowEvent::RedrawRequested => {
                state.update();

                match state.render() {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => state.resize(state.window.inner_size()),
                    Err(wgpu::SurfaceError::OutOfMemory) => event_loop.exit(),
                    Err(e) => log::warn!("[HillsScene] render error: {e:?}"),
                }

                state.window.request_redraw();
            }
            _ => {}
        }
    }
}

// ============================================================================
// MAIN
// ============================================================================

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("=== Procedural Hills ===");

    let config = match SceneConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            log::error!("[HillsScene] {err}");
            return ExitCode::FAILURE;
        }
    };

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(err) => {
            log::error!("[HillsScene] failed to create event loop: {err}");
            return ExitCode::FAILURE;
        }
    };
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App {
        config,
        state: None,
    };
    if let Err(err) = event_loop.run_app(&mut app) {
        log::error!("[HillsScene] event loop failed: {err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
