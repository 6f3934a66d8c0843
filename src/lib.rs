pub mod app;
pub mod asset;
pub mod demo;
pub mod io;
pub mod renderer;
pub mod scene;
pub mod settings;

use app::App;
use settings::RenderSettings;
use winit::event_loop::EventLoop;

fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}

/// Opens the window and runs the demo scene until the window is closed.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    log::info!("Starting wgpu shadow renderer");

    let settings = RenderSettings::load();
    let event_loop = EventLoop::new()?;
    let mut app = App::new(settings);

    let result = event_loop.run_app(&mut app);

    if let Some(err) = app.take_error() {
        return Err(err.into());
    }
    if let Err(ref err) = result {
        log::error!("Application error: {}", err);
    }

    log::info!("Application shutdown complete");

    Ok(result?)
}
