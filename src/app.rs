// app.rs
use std::sync::Arc;
use std::time::{Duration, Instant};

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::*,
    event_loop::ActiveEventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::demo::{self, DemoError};
use crate::renderer::{ContextError, WgpuDevice};
use crate::scene::Scene;
use crate::settings::RenderSettings;

/// Camera rotation speed while an arrow key is held, radians per second.
const CAMERA_TURN_RATE: f32 = 1.0;
const FRAME_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Demo(#[from] DemoError),
}

/// Arrow keys currently held down.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeldKeys {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl HeldKeys {
    /// Records a press or release; returns false for keys that do not steer the camera.
    pub fn set(&mut self, key: KeyCode, pressed: bool) -> bool {
        let slot = match key {
            KeyCode::ArrowUp => &mut self.up,
            KeyCode::ArrowDown => &mut self.down,
            KeyCode::ArrowLeft => &mut self.left,
            KeyCode::ArrowRight => &mut self.right,
            _ => return false,
        };
        *slot = pressed;
        true
    }

    /// Change of (angle_x, angle_y) over `dt` seconds. Opposite keys cancel.
    pub fn camera_delta(&self, dt: f32) -> (f32, f32) {
        let step = CAMERA_TURN_RATE * dt;
        (axis(self.up, self.down) * step, axis(self.left, self.right) * step)
    }
}

fn axis(positive: bool, negative: bool) -> f32 {
    match (positive, negative) {
        (true, false) => 1.0,
        (false, true) => -1.0,
        _ => 0.0,
    }
}

/// Accumulates frame times and reports the average at a fixed interval.
#[derive(Debug)]
struct FrameStats {
    since: Instant,
    frames: u32,
}

impl FrameStats {
    fn new(now: Instant) -> Self {
        Self { since: now, frames: 0 }
    }

    fn record(&mut self, now: Instant) {
        self.frames += 1;
        let elapsed = now.duration_since(self.since);
        if elapsed >= FRAME_LOG_INTERVAL {
            let ms = elapsed.as_secs_f64() * 1000.0 / f64::from(self.frames);
            log::info!("{:.2} ms/frame ({:.0} fps)", ms, 1000.0 / ms);
            *self = Self::new(now);
        }
    }
}

struct AppState {
    window: Arc<Window>,
    device: WgpuDevice,
    scene: Scene<WgpuDevice>,
    keys: HeldKeys,
    last_frame: Instant,
    stats: FrameStats,
}

impl AppState {
    fn new(event_loop: &ActiveEventLoop, settings: &RenderSettings) -> Result<Self, AppError> {
        let attributes = Window::default_attributes()
            .with_title("wgpu shadows")
            .with_inner_size(PhysicalSize::new(
                settings.resolution.width,
                settings.resolution.height,
            ));
        let window = Arc::new(event_loop.create_window(attributes)?);

        let mut device = pollster::block_on(WgpuDevice::new(Arc::clone(&window), settings))?;
        let mut scene = demo::build_demo_scene(&mut device, settings)?;
        let size = device.size();
        scene.set_viewport_size(size.width, size.height);

        let now = Instant::now();
        Ok(Self {
            window,
            device,
            scene,
            keys: HeldKeys::default(),
            last_frame: now,
            stats: FrameStats::new(now),
        })
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        self.device.resize(size);
        let size = self.device.size();
        self.scene.set_viewport_size(size.width, size.height);
    }

    /// Returns false when rendering cannot continue.
    fn redraw(&mut self) -> bool {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        let (dx, dy) = self.keys.camera_delta(dt);
        self.scene.change_camera_angle_x(dx);
        self.scene.change_camera_angle_y(dy);

        self.scene.update(dt);
        self.scene.draw(&mut self.device);

        match self.device.present() {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost or outdated, reconfiguring");
                self.device.reconfigure();
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Out of GPU memory");
                return false;
            }
            Err(err) => log::warn!("Skipped frame: {err}"),
        }

        self.stats.record(now);
        true
    }
}

pub struct App {
    settings: RenderSettings,
    state: Option<AppState>,
    error: Option<AppError>,
}

impl App {
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings,
            state: None,
            error: None,
        }
    }

    /// The start-up failure that ended the event loop, if any.
    pub fn take_error(&mut self) -> Option<AppError> {
        self.error.take()
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        match AppState::new(event_loop, &self.settings) {
            Ok(state) => {
                state.window.request_redraw();
                self.state = Some(state);
            }
            Err(err) => {
                log::error!("Start-up failed: {err}");
                self.error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if id != state.window.id() {
            return;
        }

        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                state.resize(size);
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                let size = state.window.inner_size();
                state.resize(size);
            }
            WindowEvent::RedrawRequested => {
                if state.redraw() {
                    state.window.request_redraw();
                } else {
                    event_loop.exit();
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                event_loop.exit();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: key_state,
                        ..
                    },
                ..
            } => {
                state.keys.set(key, key_state.is_pressed());
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrow_keys_turn_camera_at_one_radian_per_second() {
        let mut keys = HeldKeys::default();
        assert!(keys.set(KeyCode::ArrowLeft, true));
        assert!(keys.set(KeyCode::ArrowUp, true));
        assert_eq!(keys.camera_delta(0.5), (0.5, 0.5));

        keys.set(KeyCode::ArrowLeft, false);
        keys.set(KeyCode::ArrowRight, true);
        keys.set(KeyCode::ArrowUp, false);
        keys.set(KeyCode::ArrowDown, true);
        assert_eq!(keys.camera_delta(2.0), (-2.0, -2.0));
    }

    #[test]
    fn opposite_keys_cancel() {
        let mut keys = HeldKeys::default();
        keys.set(KeyCode::ArrowLeft, true);
        keys.set(KeyCode::ArrowRight, true);
        assert_eq!(keys.camera_delta(1.0), (0.0, 0.0));
    }

    #[test]
    fn other_keys_are_ignored() {
        let mut keys = HeldKeys::default();
        assert!(!keys.set(KeyCode::KeyW, true));
        assert_eq!(keys, HeldKeys::default());
    }
}
