use std::path::PathBuf;

use glam::Vec3;
use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default = "RenderSettings::default_shadow_map_size")]
    pub shadow_map_size: u32,
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default)]
    pub present_mode: PresentModeSetting,
    #[serde(default = "RenderSettings::default_clear_colour")]
    pub clear_colour: [f32; 4],
    #[serde(default)]
    pub light: LightSettings,
    #[serde(default)]
    pub camera: CameraSettings,
    #[serde(default = "RenderSettings::default_asset_dir")]
    pub asset_dir: PathBuf,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            shadow_map_size: Self::default_shadow_map_size(),
            resolution: Resolution::default(),
            present_mode: PresentModeSetting::default(),
            clear_colour: Self::default_clear_colour(),
            light: LightSettings::default(),
            camera: CameraSettings::default(),
            asset_dir: Self::default_asset_dir(),
        }
    }
}

impl RenderSettings {
    pub fn load() -> Self {
        Self::load_from_path("settings.json")
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RenderSettings>(&contents) {
                Ok(settings) => {
                    info!("Loaded render settings from {:?}", path);
                    settings.validate()
                }
                Err(err) => {
                    warn!(
                        "Failed to parse {:?} ({}). Falling back to default render settings.",
                        path, err
                    );
                    RenderSettings::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Render settings file {:?} not found. Using default settings.",
                    path
                );
                RenderSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default render settings.",
                    path, err
                );
                RenderSettings::default()
            }
        }
    }

    pub fn validate(mut self) -> Self {
        if self.shadow_map_size == 0 {
            warn!("Shadow map size must be greater than zero. Using default value.");
            self.shadow_map_size = Self::default_shadow_map_size();
        }

        if self.resolution.width == 0 || self.resolution.height == 0 {
            warn!("Resolution must be greater than zero. Using default resolution.");
            self.resolution = Resolution::default();
        }

        if !self.clear_colour.iter().all(|c| c.is_finite()) {
            warn!("Clear colour must be finite. Using default colour.");
            self.clear_colour = Self::default_clear_colour();
        }

        if !self.light.is_valid() {
            warn!("Light frustum is invalid (need half extent > 0 and near < far). Using default light.");
            self.light = LightSettings::default();
        }

        if !self.camera.is_valid() {
            warn!("Camera projection is invalid (need 0 < fov < 180, aspect > 0, 0 < near < far). Using default camera.");
            self.camera = CameraSettings::default();
        }

        self
    }

    pub fn present_mode(&self, available: &[wgpu::PresentMode]) -> wgpu::PresentMode {
        let desired = self.present_mode.to_wgpu();
        if available.contains(&desired) {
            return desired;
        }

        warn!(
            "Requested present mode {:?} is not supported. Falling back to FIFO.",
            desired
        );

        if available.contains(&wgpu::PresentMode::Fifo) {
            wgpu::PresentMode::Fifo
        } else {
            available
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo)
        }
    }

    const fn default_shadow_map_size() -> u32 {
        1080
    }

    const fn default_clear_colour() -> [f32; 4] {
        [0.0, 0.0, 1.0, 1.0]
    }

    fn default_asset_dir() -> PathBuf {
        PathBuf::from("assets")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1080,
        }
    }
}

/// Orthographic shadow-casting light looking at the origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightSettings {
    pub position: [f32; 3],
    /// Half width and half height of the orthographic volume.
    pub half_extent: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for LightSettings {
    fn default() -> Self {
        Self {
            position: [10.0, 10.0, 0.0],
            half_extent: 10.0,
            near: 1.0,
            far: 30.0,
        }
    }
}

impl LightSettings {
    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    fn is_valid(&self) -> bool {
        let position = self.position();
        position.is_finite()
            && position != Vec3::ZERO
            && self.half_extent.is_finite()
            && self.half_extent > 0.0
            && self.near.is_finite()
            && self.far.is_finite()
            && self.near < self.far
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Distance the orbit camera is pulled back along -z.
    pub distance: f32,
    pub fov_y_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            distance: 3.5,
            fov_y_degrees: 45.0,
            aspect: 1.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl CameraSettings {
    fn is_valid(&self) -> bool {
        self.distance.is_finite()
            && self.fov_y_degrees > 0.0
            && self.fov_y_degrees < 180.0
            && self.aspect.is_finite()
            && self.aspect > 0.0
            && self.near > 0.0
            && self.far.is_finite()
            && self.near < self.far
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentModeSetting {
    #[default]
    Fifo,
    FifoRelaxed,
    Immediate,
    Mailbox,
    AutoVsync,
    AutoNoVsync,
}

impl PresentModeSetting {
    fn to_wgpu(&self) -> wgpu::PresentMode {
        match self {
            PresentModeSetting::Fifo => wgpu::PresentMode::Fifo,
            PresentModeSetting::FifoRelaxed => wgpu::PresentMode::FifoRelaxed,
            PresentModeSetting::Immediate => wgpu::PresentMode::Immediate,
            PresentModeSetting::Mailbox => wgpu::PresentMode::Mailbox,
            PresentModeSetting::AutoVsync => wgpu::PresentMode::AutoVsync,
            PresentModeSetting::AutoNoVsync => wgpu::PresentMode::AutoNoVsync,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_settings() -> RenderSettings {
        RenderSettings {
            shadow_map_size: 0,
            resolution: Resolution {
                width: 0,
                height: 0,
            },
            present_mode: PresentModeSetting::Immediate,
            clear_colour: [f32::NAN, 0.0, 0.0, 1.0],
            light: LightSettings {
                position: [1.0, 1.0, 1.0],
                half_extent: -1.0,
                near: 5.0,
                far: 1.0,
            },
            camera: CameraSettings {
                fov_y_degrees: 0.0,
                near: 0.0,
                ..CameraSettings::default()
            },
            asset_dir: PathBuf::from("elsewhere"),
        }
    }

    #[test]
    fn validate_replaces_invalid_values_with_defaults() {
        let validated = invalid_settings().validate();
        let defaults = RenderSettings::default();

        assert_eq!(validated.shadow_map_size, defaults.shadow_map_size);
        assert_eq!(validated.resolution, defaults.resolution);
        assert_eq!(validated.clear_colour, defaults.clear_colour);
        assert_eq!(validated.light, defaults.light);
        assert_eq!(validated.camera, defaults.camera);
        assert_eq!(validated.asset_dir, PathBuf::from("elsewhere"));
    }

    #[test]
    fn validate_preserves_valid_values() {
        let valid = RenderSettings {
            shadow_map_size: 2048,
            resolution: Resolution {
                width: 1920,
                height: 1080,
            },
            present_mode: PresentModeSetting::Mailbox,
            light: LightSettings {
                position: [0.0, 20.0, 5.0],
                half_extent: 4.0,
                near: 0.5,
                far: 50.0,
            },
            ..RenderSettings::default()
        };

        assert_eq!(valid.clone().validate(), valid);
    }

    #[test]
    fn defaults_reproduce_the_fixed_scene() {
        let settings = RenderSettings::default();
        assert_eq!(settings.shadow_map_size, 1080);
        assert_eq!(settings.light.position(), Vec3::new(10.0, 10.0, 0.0));
        assert_eq!(settings.camera.distance, 3.5);
        assert_eq!(settings.clear_colour, [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let settings: RenderSettings =
            serde_json::from_str(r#"{ "shadow_map_size": 512, "camera": { "distance": 6.0 } }"#)
                .unwrap();
        assert_eq!(settings.shadow_map_size, 512);
        assert_eq!(settings.camera.distance, 6.0);
        assert_eq!(settings.camera.fov_y_degrees, 45.0);
        assert_eq!(settings.light, LightSettings::default());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let settings = RenderSettings::load_from_path("definitely/not/here/settings.json");
        assert_eq!(settings, RenderSettings::default());
    }

    #[test]
    fn present_mode_returns_desired_when_available() {
        let settings = RenderSettings {
            present_mode: PresentModeSetting::Mailbox,
            ..RenderSettings::default()
        };

        let available = [
            wgpu::PresentMode::Fifo,
            wgpu::PresentMode::Mailbox,
            wgpu::PresentMode::Immediate,
        ];

        assert_eq!(
            settings.present_mode(&available),
            wgpu::PresentMode::Mailbox
        );
    }

    #[test]
    fn present_mode_falls_back_to_fifo_when_desired_missing() {
        let settings = RenderSettings {
            present_mode: PresentModeSetting::Mailbox,
            ..RenderSettings::default()
        };

        let available = [wgpu::PresentMode::Fifo, wgpu::PresentMode::Immediate];

        assert_eq!(settings.present_mode(&available), wgpu::PresentMode::Fifo);
    }
}
