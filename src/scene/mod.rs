// scene/mod.rs

pub mod camera;
pub mod drawable;
pub mod light;
pub mod scene;
pub mod transform;

pub use camera::OrbitCamera;
pub use drawable::{Drawable, SceneObject};
pub use light::ShadowLight;
pub use scene::Scene;
pub use transform::Pose;
