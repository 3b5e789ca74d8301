use std::any::Any;
use std::env;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use pollster::block_on;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{ElementState, Event, KeyEvent, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::keyboard::{KeyCode as WinitKey, PhysicalKey};
use winit::window::WindowBuilder;

use umbra::{
    report, FrameControl, FrameError, Game, InputState, KeyCode, ObjModel, Renderer,
    SceneConfig,
};

const WINDOW_TITLE: &str = "umbra";
/// Aspect ratio used when no window is available.
const HEADLESS_SIZE: (u32, u32) = (1280, 720);

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let config = match &options.path {
        Some(path) => SceneConfig::load(path)?,
        None => SceneConfig::default(),
    };
    let model = config.load_model().context("failed to load mesh")?;
    info!(
        "loaded scene: {} mesh groups, {} depth targets",
        model.groups.len(),
        config.shadow.resolutions.len()
    );

    if options.summary_only {
        return run_headless(&config, &model);
    }
    match run_interactive(&config, &model) {
        Ok(()) => Ok(()),
        Err(err) if err.downcast_ref::<WindowInitError>().is_some() => {
            eprintln!(
                "{err}. Falling back to --summary-only mode (set DISPLAY or install X11 libs to enable rendering)."
            );
            run_headless(&config, &model)
        }
        Err(err) => Err(err),
    }
}

fn run_headless(config: &SceneConfig, model: &ObjModel) -> Result<()> {
    let (width, height) = HEADLESS_SIZE;
    let game = Game::new(config, width as f32 / height as f32)?;
    print!("{}", report::summary(config, model)?);
    println!("{}", game.overlay());
    Ok(())
}

fn run_interactive(config: &SceneConfig, model: &ObjModel) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(WINDOW_TITLE)
            .with_inner_size(LogicalSize::new(1280.0, 720.0))
            .build(&event_loop)
            .map_err(|err| WindowInitError::from_error("window", err))?,
    );

    let game = Game::new(config, aspect_ratio(window.inner_size()))?;
    let renderer = block_on(Renderer::new(Arc::clone(&window), game.scene(), model, config))?;

    let mut app = AppState {
        renderer,
        game,
        input: InputState::new(),
        last_frame: Instant::now(),
        title: String::new(),
        last_error: None,
    };
    app.refresh_title();

    event_loop.run(|event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);
        if let Err(err) = app.process_event(&event, elwt) {
            app.last_error = Some(err);
            elwt.exit();
        }
    })?;

    match app.last_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct AppState {
    renderer: Renderer,
    game: Game,
    input: InputState,
    last_frame: Instant,
    title: String,
    last_error: Option<anyhow::Error>,
}

impl AppState {
    fn process_event(&mut self, event: &Event<()>, elwt: &EventLoopWindowTarget<()>) -> Result<()> {
        match event {
            Event::WindowEvent { event, window_id } if *window_id == self.renderer.window().id() => {
                match event {
                    WindowEvent::CloseRequested => elwt.exit(),
                    WindowEvent::Resized(size) => self.renderer.resize(*size),
                    WindowEvent::KeyboardInput { event, .. } => self.handle_keyboard(event),
                    WindowEvent::MouseWheel { delta, .. } => {
                        let lines = match delta {
                            MouseScrollDelta::LineDelta(_, y) => *y,
                            MouseScrollDelta::PixelDelta(position) => position.y as f32 / 40.0,
                        };
                        self.input.add_scroll(lines);
                    }
                    WindowEvent::RedrawRequested => self.frame(elwt)?,
                    _ => {}
                }
            }
            Event::AboutToWait => self.renderer.window().request_redraw(),
            _ => {}
        }
        Ok(())
    }

    fn frame(&mut self, elwt: &EventLoopWindowTarget<()>) -> Result<()> {
        let now = Instant::now();
        let elapsed = now - self.last_frame;
        self.last_frame = now;

        let input = self.input.snapshot();
        if self.game.update(elapsed, &input) == FrameControl::Quit {
            elwt.exit();
            return Ok(());
        }

        let (scene, camera) = self.game.frame_parts();
        match self.renderer.render(scene, camera) {
            Ok(()) => {}
            Err(FrameError::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                let size = self.renderer.window().inner_size();
                self.renderer.resize(size);
            }
            Err(FrameError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                return Err(anyhow!("GPU is out of memory"));
            }
            Err(FrameError::Surface(wgpu::SurfaceError::Timeout)) => {
                info!("Surface timeout; retrying next frame");
            }
            Err(FrameError::Surface(err)) => warn!("skipping frame: {err}"),
            Err(err) => return Err(err.into()),
        }
        self.refresh_title();
        Ok(())
    }

    fn refresh_title(&mut self) {
        if self.title != self.game.overlay() {
            self.title = self.game.overlay().to_string();
            self.renderer
                .window()
                .set_title(&format!("{WINDOW_TITLE} - {}", self.title));
        }
    }

    fn handle_keyboard(&mut self, event: &KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        let Some(key) = map_keycode(code) else {
            return;
        };
        match event.state {
            ElementState::Pressed => self.input.set_key_down(key),
            ElementState::Released => self.input.set_key_up(key),
        }
    }
}

fn aspect_ratio(size: PhysicalSize<u32>) -> f32 {
    if size.height == 0 {
        1.0
    } else {
        size.width as f32 / size.height as f32
    }
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

/// Maps only the keys some [`umbra::Action`] is bound to.
fn map_keycode(code: WinitKey) -> Option<KeyCode> {
    let key = match code {
        WinitKey::Escape => KeyCode::Escape,
        WinitKey::KeyW => KeyCode::Character('W'),
        WinitKey::KeyS => KeyCode::Character('S'),
        WinitKey::KeyQ => KeyCode::Character('Q'),
        WinitKey::KeyE => KeyCode::Character('E'),
        WinitKey::KeyA => KeyCode::Character('A'),
        WinitKey::KeyD => KeyCode::Character('D'),
        WinitKey::Digit1 => KeyCode::Digit(1),
        WinitKey::Digit2 => KeyCode::Digit(2),
        WinitKey::Digit3 => KeyCode::Digit(3),
        WinitKey::Digit4 => KeyCode::Digit(4),
        WinitKey::Digit5 => KeyCode::Digit(5),
        WinitKey::Digit6 => KeyCode::Digit(6),
        WinitKey::Digit7 => KeyCode::Digit(7),
        WinitKey::Digit8 => KeyCode::Digit(8),
        WinitKey::Digit9 => KeyCode::Digit(9),
        WinitKey::F1 => KeyCode::Function(1),
        WinitKey::F2 => KeyCode::Function(2),
        _ => return None,
    };
    Some(key)
}

struct CliOptions {
    path: Option<PathBuf>,
    summary_only: bool,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        let mut path = None;
        let mut summary_only = false;
        for arg in env::args().skip(1) {
            match arg.as_str() {
                "--summary-only" => summary_only = true,
                other if other.starts_with("--") => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Usage: umbra [scene.xml] [--summary-only]"
                    ));
                }
                other if path.is_none() => path = Some(PathBuf::from(other)),
                other => {
                    return Err(anyhow!(
                        "Unexpected extra argument: {other}. Usage: umbra [scene.xml] [--summary-only]"
                    ));
                }
            }
        }
        Ok(Self { path, summary_only })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra::Action;

    #[test]
    fn mapped_keys_drive_actions() {
        let cases = [
            (WinitKey::Escape, Action::Quit),
            (WinitKey::KeyW, Action::MoveForward),
            (WinitKey::KeyD, Action::TurnRight),
            (WinitKey::Digit4, Action::SelectDepthMap(3)),
            (WinitKey::Digit9, Action::SelectDepthMap(8)),
            (WinitKey::F2, Action::PcfOn),
        ];
        for (winit_key, action) in cases {
            assert_eq!(map_keycode(winit_key), action.key(), "{winit_key:?}");
        }
    }

    #[test]
    fn unbound_keys_are_ignored() {
        for winit_key in [WinitKey::Space, WinitKey::Digit0, WinitKey::KeyZ, WinitKey::F3] {
            assert_eq!(map_keycode(winit_key), None);
        }
    }
}
